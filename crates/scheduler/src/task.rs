//! The unit of work the pool dispatches. A `Task` is one step of an
//! operator graph's execution (e.g. driving one `Scan` partition, or one
//! independent branch of a `Cogroup`); it may spawn further tasks instead
//! of finishing outright, which is how a single request fans out across
//! the worker pool without the caller having to pre-compute the whole
//! task DAG up front.
//!
//! Tasks borrow `'a` rather than requiring `'static`: a request's
//! collaborators (catalog, transaction, write engine, ...) are borrowed
//! for the lifetime of one `Engine::run` call, not owned, and
//! `run_stealing`'s `thread::scope` lets worker threads hold non-`'static`
//! borrows safely for the scope's duration.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::request_detail::RequestDetail;

/// What a task leaves behind for the scheduler to do next.
pub enum TaskOutcome<'a> {
    /// The task is finished; nothing more to schedule on its behalf.
    Done,
    /// The task produced more work, to be scheduled independently (e.g. a
    /// `Scan` that split its key range into sub-ranges, or a join probe
    /// that spawned one task per matching partition).
    Spawn(Vec<Task<'a>>),
}

/// Per-task execution context. Cheap to construct; handed to the task
/// closure by reference so it can check for cooperative cancellation and
/// report its own diagnostics.
pub struct WorkContext<'a> {
    pub worker_id: usize,
    pub request: &'a RequestDetail,
    cancelled: &'a AtomicBool,
}

impl<'a> WorkContext<'a> {
    pub fn new(worker_id: usize, request: &'a RequestDetail, cancelled: &'a AtomicBool) -> Self {
        Self { worker_id, request, cancelled }
    }

    /// Whether the request this task belongs to has been canceled.
    /// Long-running tasks (e.g. a `Scan` over a large range) should poll
    /// this between `scan_yield_interval`-sized chunks of work.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

type TaskFn<'a> = dyn FnOnce(&WorkContext<'_>) -> TaskOutcome<'a> + Send + 'a;

/// A schedulable unit of work. Tasks without a `preferred_worker` are
/// dispatched to whichever worker is free; tasks that declare one are
/// "sticky" (worker stickiness), typically because they touch
/// a transaction handle or cursor state a prior task already warmed up on
/// that worker.
pub struct Task<'a> {
    pub(crate) preferred_worker: Option<usize>,
    pub(crate) run: Box<TaskFn<'a>>,
}

impl<'a> Task<'a> {
    pub fn new(f: impl FnOnce(&WorkContext<'_>) -> TaskOutcome<'a> + Send + 'a) -> Self {
        Self { preferred_worker: None, run: Box::new(f) }
    }

    /// Pins this task to `worker_id` when the pool can honor it. The pool
    /// falls back to reassigning the task elsewhere (and recording the
    /// reassignment) rather than blocking indefinitely on one worker.
    pub fn sticky_to(mut self, worker_id: usize) -> Self {
        self.preferred_worker = Some(worker_id);
        self
    }
}

/// Shared per-request cancellation flag. A `Scheduler::run` call hands one
/// of these to every task; an external caller (e.g. a client disconnect
/// handler) can set it to abandon in-flight work cooperatively.
#[derive(Clone)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    pub(crate) fn flag(&self) -> &AtomicBool {
        &self.0
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}
