//! Execution statistics collected per-operator during a scan of the
//! operator graph, analogous to what an EXPLAIN ANALYZE would report.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// # Examples
/// ```
/// use common::ExecutionStats;
/// use std::time::Duration;
///
/// let stats = ExecutionStats {
///     open_time: Duration::from_millis(5),
///     total_next_time: Duration::from_millis(150),
///     close_time: Duration::from_millis(2),
///     rows_produced: 1000,
///     rows_filtered: 500,
///     pages_scanned: 10,
/// };
/// assert_eq!(stats.total_time().as_millis(), 157);
/// ```
#[derive(Clone, Debug, Default)]
pub struct ExecutionStats {
    pub open_time: Duration,
    pub total_next_time: Duration,
    pub close_time: Duration,
    pub rows_produced: u64,
    pub rows_filtered: u64,
    pub pages_scanned: u64,
}

impl ExecutionStats {
    pub fn total_time(&self) -> Duration {
        self.open_time + self.total_next_time + self.close_time
    }

    pub fn format_duration(d: Duration) -> String {
        let micros = d.as_micros();
        if micros < 1000 {
            format!("{micros}µs")
        } else if micros < 1_000_000 {
            format!("{:.2}ms", micros as f64 / 1000.0)
        } else {
            format!("{:.3}s", micros as f64 / 1_000_000.0)
        }
    }
}

/// Per-request counters surfaced to the caller: write outcomes plus
/// scheduler task counters. Shared across worker threads of
/// one request, so every field is an independent atomic counter rather
/// than a struct behind a single lock.
#[derive(Debug, Default)]
pub struct RequestStats {
    pub inserted: AtomicU64,
    pub merged: AtomicU64,
    pub deleted: AtomicU64,
    pub tasks_executed: AtomicU64,
    pub stealing_count: AtomicU64,
    pub sticky_reassignment_count: AtomicU64,
}

impl RequestStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> RequestStatsSnapshot {
        RequestStatsSnapshot {
            inserted: self.inserted.load(Ordering::Relaxed),
            merged: self.merged.load(Ordering::Relaxed),
            deleted: self.deleted.load(Ordering::Relaxed),
            tasks_executed: self.tasks_executed.load(Ordering::Relaxed),
            stealing_count: self.stealing_count.load(Ordering::Relaxed),
            sticky_reassignment_count: self.sticky_reassignment_count.load(Ordering::Relaxed),
        }
    }

    pub fn incr_inserted(&self, n: u64) {
        self.inserted.fetch_add(n, Ordering::Relaxed);
    }

    pub fn incr_merged(&self, n: u64) {
        self.merged.fetch_add(n, Ordering::Relaxed);
    }

    pub fn incr_deleted(&self, n: u64) {
        self.deleted.fetch_add(n, Ordering::Relaxed);
    }

    pub fn incr_tasks_executed(&self, n: u64) {
        self.tasks_executed.fetch_add(n, Ordering::Relaxed);
    }

    pub fn incr_stealing(&self, n: u64) {
        self.stealing_count.fetch_add(n, Ordering::Relaxed);
    }

    pub fn incr_sticky_reassignment(&self, n: u64) {
        self.sticky_reassignment_count.fetch_add(n, Ordering::Relaxed);
    }
}

/// A point-in-time copy of `RequestStats`, cheap to hand back to a caller.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RequestStatsSnapshot {
    pub inserted: u64,
    pub merged: u64,
    pub deleted: u64,
    pub tasks_executed: u64,
    pub stealing_count: u64,
    pub sticky_reassignment_count: u64,
}
