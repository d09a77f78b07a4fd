//! Worker pool and dispatch. Implements the three `common::DispatchMode`s:
//! `Stealing` (a `crossbeam-deque` work-stealing pool with stickiness),
//! `Serial` (no threads at all — the caller's own thread drains the task
//! queue), and `Hybrid` (starts serial, escalates to stealing once the
//! queue depth crosses `hybrid_escalation_threshold`).

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender};
use crossbeam_deque::{Injector, Steal, Stealer, Worker};
use parking_lot::{Condvar, Mutex};

use common::{Config, DispatchMode};

use crate::request_detail::{HybridExecutionMode, RequestDetail};
use crate::task::{CancellationToken, Task, TaskOutcome, WorkContext};

/// Runs task graphs to completion according to a `Config`'s dispatch mode.
/// Stateless beyond its config; one `Scheduler` can drive any number of
/// requests, each with its own `RequestDetail`/`CancellationToken`.
pub struct Scheduler {
    config: Config,
}

impl Scheduler {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Runs `tasks` (and anything they transitively spawn) to completion,
    /// blocking the calling thread until every task has finished or the
    /// cancellation token is observed. Individual task closures are
    /// responsible for checking `WorkContext::is_cancelled` and winding
    /// down early; the scheduler itself does not forcibly abort threads.
    ///
    /// Tasks borrow `'a` rather than `'static`, so a caller can dispatch
    /// work that holds borrowed request collaborators (a catalog, an open
    /// transaction, ...) without needing to `Arc` everything up front.
    pub fn run<'a>(&self, request: &RequestDetail, tasks: Vec<Task<'a>>, cancellation: &CancellationToken) {
        if tasks.is_empty() {
            return;
        }
        match self.config.dispatch_mode {
            DispatchMode::Serial => run_serial(request, tasks, cancellation),
            DispatchMode::Stealing => {
                run_stealing(request, tasks, cancellation, self.config.worker_threads)
            }
            DispatchMode::Hybrid => run_hybrid(
                request,
                tasks,
                cancellation,
                self.config.worker_threads,
                self.config.hybrid_escalation_threshold,
            ),
        }
    }
}

fn execute_one<'a>(task: Task<'a>, ctx: &WorkContext<'_>) -> Vec<Task<'a>> {
    let started = std::time::Instant::now();
    let outcome = (task.run)(ctx);
    ctx.request.record_task(started.elapsed().as_nanos() as u64);
    match outcome {
        TaskOutcome::Done => Vec::new(),
        TaskOutcome::Spawn(more) => more,
    }
}

/// No worker threads: the calling thread drains a local FIFO queue,
/// running spawned sub-tasks after whatever was already queued.
fn run_serial<'a>(request: &RequestDetail, tasks: Vec<Task<'a>>, cancellation: &CancellationToken) {
    let mut queue: VecDeque<Task<'a>> = tasks.into();
    let ctx = WorkContext::new(0, request, cancellation.flag());
    while let Some(task) = queue.pop_front() {
        if ctx.is_cancelled() {
            break;
        }
        queue.extend(execute_one(task, &ctx));
    }
}

struct Shared {
    pending: AtomicUsize,
    done: Mutex<bool>,
    condvar: Condvar,
}

impl Shared {
    fn new(initial: usize) -> Self {
        Self {
            pending: AtomicUsize::new(initial),
            done: Mutex::new(false),
            condvar: Condvar::new(),
        }
    }

    /// Called once a task finishes. Any sub-tasks it spawned were already
    /// added to `pending` individually via `Dispatcher::dispatch`, so this
    /// only ever accounts for the just-finished task itself.
    fn complete_one(&self) {
        let prev = self.pending.fetch_sub(1, Ordering::AcqRel);
        if prev == 1 {
            *self.done.lock() = true;
            self.condvar.notify_all();
        }
    }

    fn wait(&self) {
        let mut done = self.done.lock();
        while !*done {
            self.condvar.wait(&mut done);
        }
    }
}

/// Bundles the handles a worker thread needs to hand off a task (whether
/// from the initial batch or one a running task just spawned): the shared
/// injector, the per-worker sticky-inbox senders, and the pending-count
/// tracker that `Scheduler::run` blocks on.
struct Dispatcher<'a> {
    injector: Injector<Task<'a>>,
    sticky_senders: Vec<Sender<Task<'a>>>,
    shared: Shared,
}

impl<'a> Dispatcher<'a> {
    fn dispatch(&self, task: Task<'a>, request: &RequestDetail) {
        self.shared.pending.fetch_add(1, Ordering::AcqRel);
        match task.preferred_worker {
            Some(w) if w < self.sticky_senders.len() => {
                request.record_sticky();
                if self.sticky_senders[w].try_send(task).is_err() {
                    request.record_sticky_enforced();
                }
            }
            Some(_) => {
                request.record_sticky_enforced();
                self.injector.push(task);
            }
            None => self.injector.push(task),
        }
    }
}

/// A work-stealing pool over `crossbeam-deque`'s documented
/// `Injector`/`Worker`/`Stealer` triple: each worker drains its own local
/// deque first, then its sticky inbox, then the shared injector, then
/// round-robins stealing from its peers. Sticky tasks bypass all of that
/// via a direct per-worker channel; if the preferred worker index is out
/// of range the task falls back to the injector and the reassignment is
/// recorded.
fn run_stealing<'a>(
    request: &RequestDetail,
    tasks: Vec<Task<'a>>,
    cancellation: &CancellationToken,
    worker_threads: usize,
) {
    let worker_threads = worker_threads.max(1);
    let workers: Vec<Worker<Task<'a>>> = (0..worker_threads).map(|_| Worker::new_fifo()).collect();
    let stealers: Vec<Stealer<Task<'a>>> = workers.iter().map(Worker::stealer).collect();
    let channels: Vec<(Sender<Task<'a>>, Receiver<Task<'a>>)> =
        (0..worker_threads).map(|_| bounded(1024)).collect();
    let (senders, receivers): (Vec<_>, Vec<_>) = channels.into_iter().unzip();

    let dispatcher = Dispatcher {
        injector: Injector::new(),
        sticky_senders: senders,
        shared: Shared::new(0),
    };
    for task in tasks {
        dispatcher.dispatch(task, request);
    }

    thread::scope(|scope| {
        for (id, (worker, receiver)) in workers.into_iter().zip(receivers.into_iter()).enumerate() {
            let stealers = &stealers;
            let dispatcher = &dispatcher;
            let cancel_flag = cancellation.flag();
            scope.spawn(move || {
                worker_loop(id, worker, receiver, stealers, dispatcher, request, cancel_flag);
            });
        }
        dispatcher.shared.wait();
    });
}

fn worker_loop<'a>(
    id: usize,
    local: Worker<Task<'a>>,
    sticky_inbox: Receiver<Task<'a>>,
    stealers: &[Stealer<Task<'a>>],
    dispatcher: &Dispatcher<'a>,
    request: &RequestDetail,
    cancel_flag: &std::sync::atomic::AtomicBool,
) {
    loop {
        if *dispatcher.shared.done.lock() || cancel_flag.load(Ordering::Relaxed) {
            break;
        }
        let task = local
            .pop()
            .or_else(|| sticky_inbox.try_recv().ok())
            .or_else(|| loop {
                match dispatcher.injector.steal() {
                    Steal::Success(t) => break Some(t),
                    Steal::Empty => break None,
                    Steal::Retry => continue,
                }
            })
            .or_else(|| {
                for (idx, stealer) in stealers.iter().enumerate() {
                    if idx == id {
                        continue;
                    }
                    loop {
                        match stealer.steal() {
                            Steal::Success(t) => {
                                request.record_steal();
                                return Some(t);
                            }
                            Steal::Empty => break,
                            Steal::Retry => continue,
                        }
                    }
                }
                None
            });

        match task {
            Some(task) => {
                let ctx = WorkContext::new(id, request, cancel_flag);
                let started = std::time::Instant::now();
                let outcome = (task.run)(&ctx);
                request.record_task(started.elapsed().as_nanos() as u64);
                if let TaskOutcome::Spawn(more) = outcome {
                    for t in more {
                        dispatcher.dispatch(t, request);
                    }
                }
                dispatcher.shared.complete_one();
            }
            None => {
                if dispatcher.shared.pending.load(Ordering::Acquire) == 0 {
                    *dispatcher.shared.done.lock() = true;
                    dispatcher.shared.condvar.notify_all();
                    break;
                }
                thread::sleep(Duration::from_micros(50));
            }
        }
    }
}

/// Serial until the live task count reaches `escalation_threshold`, then
/// hands the remaining (and any newly spawned) work to a stealing pool.
fn run_hybrid<'a>(
    request: &RequestDetail,
    tasks: Vec<Task<'a>>,
    cancellation: &CancellationToken,
    worker_threads: usize,
    escalation_threshold: usize,
) {
    let mut queue: VecDeque<Task<'a>> = tasks.into();
    let ctx = WorkContext::new(0, request, cancellation.flag());
    request.set_hybrid_execution_mode(HybridExecutionMode::Serial);

    while let Some(task) = queue.pop_front() {
        if ctx.is_cancelled() {
            return;
        }
        if queue.len() + 1 >= escalation_threshold {
            queue.push_front(task);
            request.set_hybrid_execution_mode(HybridExecutionMode::Stealing);
            run_stealing(request, queue.into(), cancellation, worker_threads);
            return;
        }
        queue.extend(execute_one(task, &ctx));
    }
}
