//! Per-request diagnostics: an atomic status state machine plus task
//! counters. `RequestDetail` is the thing a caller can poll
//! (or that an admin view can dump) while a request is in flight; it is
//! distinct from `WorkContext`, which is purely the scheduler's own
//! per-task bookkeeping.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

use parking_lot::Mutex;

/// What a request is doing at the SQL-engine level, independent of the
/// plan it compiles down to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestKind {
    Unknown,
    Begin,
    ExecuteStatement,
    Commit,
    Rollback,
}

impl RequestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestKind::Unknown => "unknown",
            RequestKind::Begin => "begin",
            RequestKind::ExecuteStatement => "execute_statement",
            RequestKind::Commit => "commit",
            RequestKind::Rollback => "rollback",
        }
    }
}

/// Job status for the diagnostics info (original `request_detail_status`).
/// Transitions accepted -> submitted -> executing -> completing ->
/// finishing on the happy path; canceling and waiting_cc are side paths.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum RequestStatus {
    Undefined = 0,
    Accepted = 1,
    Submitted = 2,
    Executing = 3,
    WaitingCc = 4,
    Completing = 5,
    Finishing = 6,
    Canceling = 7,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Undefined => "undefined",
            RequestStatus::Accepted => "accepted",
            RequestStatus::Submitted => "submitted",
            RequestStatus::Executing => "executing",
            RequestStatus::WaitingCc => "waiting_cc",
            RequestStatus::Completing => "completing",
            RequestStatus::Finishing => "finishing",
            RequestStatus::Canceling => "canceling",
        }
    }

    fn from_u8(v: u8) -> Self {
        match v {
            1 => RequestStatus::Accepted,
            2 => RequestStatus::Submitted,
            3 => RequestStatus::Executing,
            4 => RequestStatus::WaitingCc,
            5 => RequestStatus::Completing,
            6 => RequestStatus::Finishing,
            7 => RequestStatus::Canceling,
            _ => RequestStatus::Undefined,
        }
    }
}

/// Which dispatch mode a hybrid-scheduled request actually ran under.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HybridExecutionMode {
    Undefined,
    Serial,
    Stealing,
}

/// The identifiers of transactions a request touched, in the order they
/// were first observed. A `deque`-backed append log in the original;
/// `Vec` under a lock serves the same purpose here.
#[derive(Debug, Default)]
pub struct AffectedTransactions(Mutex<Vec<String>>);

impl AffectedTransactions {
    pub fn add(&self, tx_id: impl Into<String>) {
        self.0.lock().push(tx_id.into());
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.0.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(1);

/// Diagnostics info object for one SQL request, shared (via `Arc`) across
/// every worker thread a request's tasks run on.
#[derive(Debug)]
pub struct RequestDetail {
    id: u64,
    kind: RequestKind,
    transaction_id: Mutex<String>,
    statement_text: Mutex<Option<String>>,
    status: AtomicU8,
    hybrid_execution_mode: Mutex<HybridExecutionMode>,
    affected_transactions: AffectedTransactions,
    task_duration_ns: AtomicU64,
    task_count: AtomicU64,
    task_stealing_count: AtomicU64,
    sticky_task_count: AtomicU64,
    sticky_task_worker_enforced_count: AtomicU64,
}

impl RequestDetail {
    pub fn new(kind: RequestKind) -> Self {
        Self {
            id: NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed),
            kind,
            transaction_id: Mutex::new(String::new()),
            statement_text: Mutex::new(None),
            status: AtomicU8::new(RequestStatus::Undefined as u8),
            hybrid_execution_mode: Mutex::new(HybridExecutionMode::Undefined),
            affected_transactions: AffectedTransactions::default(),
            task_duration_ns: AtomicU64::new(0),
            task_count: AtomicU64::new(0),
            task_stealing_count: AtomicU64::new(0),
            sticky_task_count: AtomicU64::new(0),
            sticky_task_worker_enforced_count: AtomicU64::new(0),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn kind(&self) -> RequestKind {
        self.kind
    }

    pub fn status(&self) -> RequestStatus {
        RequestStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    pub fn set_status(&self, status: RequestStatus) {
        self.status.store(status as u8, Ordering::Release);
    }

    pub fn transaction_id(&self) -> String {
        self.transaction_id.lock().clone()
    }

    pub fn set_transaction_id(&self, id: impl Into<String>) {
        *self.transaction_id.lock() = id.into();
    }

    pub fn statement_text(&self) -> Option<String> {
        self.statement_text.lock().clone()
    }

    pub fn set_statement_text(&self, text: impl Into<String>) {
        *self.statement_text.lock() = Some(text.into());
    }

    pub fn hybrid_execution_mode(&self) -> HybridExecutionMode {
        *self.hybrid_execution_mode.lock()
    }

    pub fn set_hybrid_execution_mode(&self, mode: HybridExecutionMode) {
        *self.hybrid_execution_mode.lock() = mode;
    }

    pub fn affected_txs(&self) -> &AffectedTransactions {
        &self.affected_transactions
    }

    pub fn record_task(&self, duration_ns: u64) {
        self.task_count.fetch_add(1, Ordering::Relaxed);
        self.task_duration_ns.fetch_add(duration_ns, Ordering::Relaxed);
    }

    pub fn record_steal(&self) {
        self.task_stealing_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sticky(&self) {
        self.sticky_task_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sticky_enforced(&self) {
        self.sticky_task_worker_enforced_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn task_count(&self) -> u64 {
        self.task_count.load(Ordering::Relaxed)
    }

    pub fn task_duration_ns(&self) -> u64 {
        self.task_duration_ns.load(Ordering::Relaxed)
    }

    pub fn task_stealing_count(&self) -> u64 {
        self.task_stealing_count.load(Ordering::Relaxed)
    }

    pub fn sticky_task_count(&self) -> u64 {
        self.sticky_task_count.load(Ordering::Relaxed)
    }

    pub fn sticky_task_worker_enforced_count(&self) -> u64 {
        self.sticky_task_worker_enforced_count.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_and_monotonic() {
        let a = RequestDetail::new(RequestKind::ExecuteStatement);
        let b = RequestDetail::new(RequestKind::ExecuteStatement);
        assert!(b.id() > a.id());
    }

    #[test]
    fn status_round_trips() {
        let req = RequestDetail::new(RequestKind::Begin);
        assert_eq!(req.status(), RequestStatus::Undefined);
        req.set_status(RequestStatus::Executing);
        assert_eq!(req.status(), RequestStatus::Executing);
    }

    #[test]
    fn affected_transactions_preserves_order() {
        let req = RequestDetail::new(RequestKind::ExecuteStatement);
        req.affected_txs().add("tx1");
        req.affected_txs().add("tx2");
        assert_eq!(req.affected_txs().snapshot(), vec!["tx1", "tx2"]);
    }

    #[test]
    fn counters_accumulate() {
        let req = RequestDetail::new(RequestKind::ExecuteStatement);
        req.record_task(100);
        req.record_task(50);
        req.record_steal();
        req.record_sticky();
        req.record_sticky_enforced();
        assert_eq!(req.task_count(), 2);
        assert_eq!(req.task_duration_ns(), 150);
        assert_eq!(req.task_stealing_count(), 1);
        assert_eq!(req.sticky_task_count(), 1);
        assert_eq!(req.sticky_task_worker_enforced_count(), 1);
    }
}
