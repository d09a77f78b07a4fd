//! Operator library: turns a compiled [`plan::Plan`] into a
//! tree of Volcano-style iterators and drives it against an open
//! transaction, writing through [`write`] and reading through [`kvs`].
//!
//! ```text
//! Plan
//!   ↓ build_executor
//! Box<dyn Executor>
//!   ↓ open() / next() / close()
//! rows
//! ```
//!
//! Every node pulls from its children lazily except where the spec itself
//! requires a barrier (`Cogroup` must see every input's current key to
//! merge; `Aggregate` folds a whole group before it can emit a row). Those
//! nodes materialize their input into memory; everything else streams.

pub mod aggregate;
pub mod apply;
pub mod builder;
pub mod cogroup;
pub mod dml;
pub mod filter;
pub mod join;
pub mod project;
pub mod scan;
pub mod target;
pub mod tablefunction;
#[cfg(test)]
pub mod testutil;

use catalog::Catalog;
use common::{Config, RequestStats, Row};
use kvs::{Database, Transaction};
use plan::VariableTable;
use scheduler::{CancellationToken, RequestDetail, Scheduler};
use write::WriteEngine;

pub use builder::build_executor;
pub use tablefunction::{TableFunctionRegistry, TableFunctionSource};

/// Volcano-style iterator interface every operator implements.
///
/// `open` runs top-down, `next` is pulled bottom-up until it returns
/// `None`, then `close` runs top-down again. `Send` lets the compiled
/// tree move into a scheduler `Task` closure and run on a worker thread
/// instead of the caller's own.
pub trait Executor: Send {
    fn open(&mut self, ctx: &ExecutionContext) -> common::DbResult<()>;
    fn next(&mut self, ctx: &ExecutionContext) -> common::DbResult<Option<Row>>;
    fn close(&mut self, ctx: &ExecutionContext) -> common::DbResult<()>;
}

/// Everything one request's operator tree needs, threaded by reference
/// through every node. One `ExecutionContext` is shared by every task of
/// a request: the transaction is internally thread-safe for
/// concurrent get/put/remove, the catalog and write engine are read-only
/// after build, and the scheduler handle lets an operator (namely
/// `Cogroup`) fan its independent inputs out across the worker pool.
pub struct ExecutionContext<'a> {
    pub catalog: &'a Catalog,
    pub db: &'a dyn Database,
    pub tx: &'a dyn Transaction,
    pub write: &'a WriteEngine,
    pub params: &'a VariableTable,
    pub config: &'a Config,
    pub stats: &'a RequestStats,
    pub functions: &'a dyn TableFunctionSource,
    pub scheduler: &'a Scheduler,
    pub request: &'a RequestDetail,
    pub cancellation: &'a CancellationToken,
}

impl<'a> ExecutionContext<'a> {
    /// A fresh per-evaluation scratchpad bound to this request's
    /// parameters. Each operator gets its own so one operator's
    /// `lost_precision` flag never leaks into another's.
    pub fn new_evaluator(&self) -> expr::EvaluatorContext {
        expr::EvaluatorContext::new(self.config.strict_casts, self.config.zone_offset_minutes)
            .with_params(self.params.as_slice().to_vec())
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

/// Drives `executor` to completion, collecting every row it produces.
/// Used both by tests and by the `engine` facade for the common case
/// where the caller wants a materialized result rather than a live
/// streaming handle.
pub fn run_to_completion(
    executor: &mut dyn Executor,
    ctx: &ExecutionContext,
) -> common::DbResult<Vec<Row>> {
    executor.open(ctx)?;
    let mut rows = Vec::new();
    while !ctx.is_cancelled() {
        match executor.next(ctx)? {
            Some(row) => rows.push(row),
            None => break,
        }
    }
    executor.close(ctx)?;
    Ok(rows)
}
