//! Runtime configuration consumed by the engine. Loading a `Config` from a
//! file is out of scope here — the caller builds one and hands it in,
//! exactly like it hands in an already-compiled plan.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DispatchMode {
    /// Work-stealing pool with worker stickiness.
    Stealing,
    /// Single worker thread, no stealing.
    Serial,
    /// Starts serial, escalates to stealing once queue depth crosses a
    /// threshold.
    Hybrid,
}

/// The latest client-visible state a commit waits for before returning.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommitResponse {
    /// Returns as soon as the commit is accepted, before it is durable.
    Accepted,
    /// Returns once the commit is visible to new transactions.
    Available,
    /// Returns once the commit is durable on the local KVS.
    Stored,
    /// Returns once the commit has propagated to every replica.
    Propagated,
}

/// Runtime configuration for the execution engine.
///
/// # Example
/// ```
/// use common::Config;
///
/// let config = Config::builder()
///     .worker_threads(4)
///     .scan_yield_interval(64)
///     .build();
/// ```
#[derive(Clone, Debug, Serialize, Deserialize, bon::Builder)]
pub struct Config {
    /// Number of worker threads in the scheduler's pool.
    /// Default follows the spec's `min(0.8 * physical_cores, 32)` rule;
    /// callers constructing this directly should apply that rule
    /// themselves via [`Config::default_worker_threads`].
    #[builder(default = Config::default_worker_threads())]
    pub worker_threads: usize,
    #[builder(default = DispatchMode::Stealing)]
    pub dispatch_mode: DispatchMode,
    /// Task-count threshold at which `Hybrid` dispatch escalates from
    /// serial to stealing.
    #[builder(default = 16)]
    pub hybrid_escalation_threshold: usize,
    /// Number of rows a scan processes before voluntarily yielding back to
    /// the scheduler. `0` means never yield.
    #[builder(default = 1024)]
    pub scan_yield_interval: u32,
    /// Offset applied to temporal literals lacking an explicit timezone.
    #[builder(default = 0)]
    pub zone_offset_minutes: i32,
    /// Whether non-lenient casts error instead of truncating on overflow.
    #[builder(default = true)]
    pub strict_casts: bool,
    /// Parallelism of partitioned operator steps.
    #[builder(default = 1)]
    pub default_partitions: usize,
    /// Rows per scan batch.
    #[builder(default = 1024)]
    pub scan_block_size: u32,
    /// Default parallel degree for a scan, absent a plan-level override.
    #[builder(default = 1)]
    pub scan_default_parallel: usize,
    /// Upper bound on concurrent result-set writers. Valid range is 1..=256;
    /// the builder does not enforce this, callers are expected to stay
    /// within it.
    #[builder(default = 1)]
    pub max_result_set_writers: usize,
    #[builder(default = CommitResponse::Stored)]
    pub commit_response: CommitResponse,
    /// Case-folding of unquoted identifiers. Has no effect here — SQL-text
    /// parsing sits above this engine's boundary — but is still a
    /// recognized config option, since a caller's parser layer reads it
    /// from the same `Config` value.
    #[builder(default = false)]
    pub lowercase_regular_identifiers: bool,
    /// Whether the planner may use `join_find` against an index.
    #[builder(default = true)]
    pub enable_index_join: bool,
    /// Whether the planner may use an index-driven join scan.
    #[builder(default = true)]
    pub enable_join_scan: bool,
}

impl Config {
    pub fn default_worker_threads() -> usize {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        ((cores as f64 * 0.8).floor() as usize).clamp(1, 32)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            worker_threads: Self::default_worker_threads(),
            dispatch_mode: DispatchMode::Stealing,
            hybrid_escalation_threshold: 16,
            scan_yield_interval: 1024,
            zone_offset_minutes: 0,
            strict_casts: true,
            default_partitions: 1,
            scan_block_size: 1024,
            scan_default_parallel: 1,
            max_result_set_writers: 1,
            commit_response: CommitResponse::Stored,
            lowercase_regular_identifiers: false,
            enable_index_join: true,
            enable_join_scan: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_worker_threads_is_at_least_one() {
        assert!(Config::default_worker_threads() >= 1);
    }

    #[test]
    fn builder_overrides_defaults() {
        let cfg = Config::builder().worker_threads(2).build();
        assert_eq!(cfg.worker_threads, 2);
        assert_eq!(cfg.scan_yield_interval, 1024);
    }

    #[test]
    fn builder_defaults_match_default_impl() {
        let built = Config::builder().build();
        let defaulted = Config::default();
        assert_eq!(built.commit_response, defaulted.commit_response);
        assert_eq!(built.max_result_set_writers, defaulted.max_result_set_writers);
        assert_eq!(built.enable_index_join, defaulted.enable_index_join);
        assert_eq!(built.enable_join_scan, defaulted.enable_join_scan);
        assert_eq!(built.lowercase_regular_identifiers, false);
    }
}
