//! Task dispatch for the execution engine: a work-stealing pool
//! (`crossbeam-deque`) with worker stickiness, a serial fallback, and a
//! hybrid mode that escalates between the two, plus the per-request
//! diagnostics (`RequestDetail`) a production engine exposes while a
//! request is in flight.
//!
//! The executor crate drives one `Plan` by submitting its independently
//! runnable pieces (e.g. one `Scan` partition, or one `Cogroup` input
//! branch) here as [`Task`]s rather than running them on its own thread;
//! this crate never looks inside a `Plan` itself.

pub mod pool;
pub mod request_detail;
pub mod task;

pub use pool::Scheduler;
pub use request_detail::{AffectedTransactions, HybridExecutionMode, RequestDetail, RequestKind, RequestStatus};
pub use task::{CancellationToken, Task, TaskOutcome, WorkContext};
