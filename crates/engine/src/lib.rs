//! The top-level facade: wires the catalog, a `kvs::Database`,
//! the write pipeline, and the scheduler into `execute(plan, params) ->
//! rows`, driven against a caller-supplied open transaction and streamed
//! to a caller-provided output channel.
//!
//! ```text
//! plan + params  ──►  Engine::execute  ──►  RequestOutcome { rows, stats }
//!                           │
//!                           ▼
//!                     open transaction (caller-owned)
//! ```

use std::sync::Arc;

use parking_lot::Mutex;

use catalog::Catalog;
use common::{Config, DbResult, RequestStats, RequestStatsSnapshot, Row};
use executor::{build_executor, ExecutionContext, Executor, TableFunctionRegistry};
use kvs::{Database, Transaction, TransactionMode};
use plan::{Plan, VariableTable};
use scheduler::{CancellationToken, RequestDetail, RequestKind, RequestStatus, Scheduler, Task, TaskOutcome};
use types::Any;
use write::WriteEngine;

/// Everything one request's execution handed back to the caller: the
/// materialized rows (empty for a pure write statement, unless it
/// re-emits the rows it wrote), a point-in-time snapshot of the write/
/// scheduler counters, and the diagnostics object the request ran under.
pub struct RequestOutcome {
    pub rows: Vec<Row>,
    pub stats: RequestStatsSnapshot,
    pub request: Arc<RequestDetail>,
}

/// Owns the long-lived collaborators behind one open database instance:
/// catalog, KVS handle, write-pipeline defaults (sequence/function
/// sources), table-valued function registry, and the scheduler pool. One
/// `Engine` serves any number of concurrent requests: the
/// catalog is read-only after `build`/DDL calls complete, and the
/// scheduler is stateless beyond its `Config`.
pub struct Engine {
    catalog: Catalog,
    db: Arc<dyn Database>,
    write: WriteEngine,
    functions: TableFunctionRegistry,
    scheduler: Scheduler,
    config: Config,
}

impl Engine {
    pub fn new(catalog: Catalog, db: Arc<dyn Database>, config: Config) -> Self {
        Self {
            catalog,
            db,
            write: WriteEngine::default(),
            functions: TableFunctionRegistry::new(),
            scheduler: Scheduler::new(config.clone()),
            config,
        }
    }

    /// Convenience constructor for the common case of driving the engine
    /// against the in-memory reference KVS (the real store is external,
    /// but nothing in this crate is exercisable without *some*
    /// implementation behind the trait).
    pub fn with_memory_kvs(catalog: Catalog, config: Config) -> Self {
        Self::new(catalog, Arc::new(kvs::InMemoryDatabase::new()), config)
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn catalog_mut(&mut self) -> &mut Catalog {
        &mut self.catalog
    }

    pub fn db(&self) -> &Arc<dyn Database> {
        &self.db
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Overrides the write pipeline's collaborators (sequence manager,
    /// function registry, `try_insert_on_upserting_secondary` toggle).
    pub fn with_write_engine(mut self, write: WriteEngine) -> Self {
        self.write = write;
        self
    }

    /// Thin pass-through to the `kvs` adapter contract: transaction
    /// lifetime itself is the caller's concern, since one SQL
    /// transaction may span many `execute` calls.
    pub fn begin_transaction(&self, mode: TransactionMode) -> DbResult<Arc<dyn Transaction>> {
        self.db.begin_transaction(mode)
    }

    /// Runs `plan` to completion against `tx`, materializing every row its
    /// terminal `Emit` produces (builder.rs's `Emit` unwraps to its child,
    /// so driving the built executor's `next()` loop *is* emission).
    ///
    /// On error the transaction is marked for abort: the
    /// *original* error is always what the caller sees, even if `abort`
    /// itself later fails or is a no-op because the transaction was
    /// already inactive.
    pub fn execute(
        &self,
        plan: &Plan,
        params: Vec<Any>,
        tx: &dyn Transaction,
    ) -> DbResult<RequestOutcome> {
        self.run(plan, params, tx, None)
    }

    /// Streaming variant: forwards each row to `sink` as the operator
    /// tree produces it instead of only materializing the full result set
    /// at the end. Rows are still collected into
    /// `RequestOutcome::rows` as well, for callers that want both (e.g.
    /// tests asserting on content while also exercising the channel path).
    /// If the receiving end of `sink` has been dropped, sends are
    /// silently ignored rather than treated as an execution error — a
    /// disconnected caller is not the engine's failure.
    pub fn execute_streaming(
        &self,
        plan: &Plan,
        params: Vec<Any>,
        tx: &dyn Transaction,
        sink: crossbeam_channel::Sender<Row>,
    ) -> DbResult<RequestOutcome> {
        self.run(plan, params, tx, Some(sink))
    }

    fn run(
        &self,
        plan: &Plan,
        params: Vec<Any>,
        tx: &dyn Transaction,
        sink: Option<crossbeam_channel::Sender<Row>>,
    ) -> DbResult<RequestOutcome> {
        let request = Arc::new(RequestDetail::new(RequestKind::ExecuteStatement));
        request.set_transaction_id(tx.id().to_string());
        request.affected_txs().add(tx.id().to_string());
        request.set_status(RequestStatus::Accepted);

        let var_table = VariableTable::new(params);
        let stats = RequestStats::new();
        let cancellation = CancellationToken::new();

        request.set_status(RequestStatus::Submitted);
        let ctx = ExecutionContext {
            catalog: &self.catalog,
            db: self.db.as_ref(),
            tx,
            write: &self.write,
            params: &var_table,
            config: &self.config,
            stats: &stats,
            functions: &self.functions,
            scheduler: &self.scheduler,
            request: &request,
            cancellation: &cancellation,
        };

        request.set_status(RequestStatus::Executing);
        let mut executor = match build_executor(plan) {
            Ok(executor) => executor,
            Err(err) => {
                self.fail(&request, tx, &cancellation);
                return Err(err);
            }
        };

        // Submitted as a single task rather than driven on the calling
        // thread directly, so dispatch-mode selection, the
        // scheduler's stealing/sticky counters, and
        // `hybrid_execution_mode` reflect what really ran this request
        // instead of staying dead on every request's hot path.
        let result: Mutex<Option<DbResult<Vec<Row>>>> = Mutex::new(None);
        let result_slot = &result;
        let task = Task::new(move |_work_ctx| {
            *result_slot.lock() = Some(drive(&mut *executor, &ctx, sink));
            TaskOutcome::Done
        });
        self.scheduler.run(&request, vec![task], &cancellation);
        let outcome = result
            .into_inner()
            .expect("scheduler always runs a dispatched task to completion before returning");

        match outcome {
            Ok(rows) => {
                request.set_status(RequestStatus::Completing);
                request.set_status(RequestStatus::Finishing);
                Ok(RequestOutcome {
                    rows,
                    stats: stats.snapshot(),
                    request,
                })
            }
            Err(err) => {
                self.fail(&request, tx, &cancellation);
                Err(err)
            }
        }
    }

    /// Marks a failed request `canceling` and aborts
    /// its transaction. Abort is idempotent on the `kvs::Transaction`
    /// trait, so a transaction another task already aborted tolerates a
    /// second call without raising its own error that might shadow the
    /// one this request is already returning.
    fn fail(&self, request: &RequestDetail, tx: &dyn Transaction, cancellation: &CancellationToken) {
        request.set_status(RequestStatus::Canceling);
        cancellation.cancel();
        let _ = tx.abort();
    }
}

/// Drives one operator tree's Volcano lifecycle, optionally forwarding
/// each row to a streaming sink as it is produced. `close` always runs
/// once `open` has succeeded, even if a later `next()` call errored, so an
/// operator that holds arena checkpoints or storage iterators gets a
/// chance to release them; the original error (not one from `close`) is
/// what propagates.
fn drive(
    executor: &mut dyn Executor,
    ctx: &ExecutionContext,
    sink: Option<crossbeam_channel::Sender<Row>>,
) -> DbResult<Vec<Row>> {
    executor.open(ctx)?;

    let mut rows = Vec::new();
    let outcome = loop {
        if ctx.is_cancelled() {
            break Ok(());
        }
        match executor.next(ctx) {
            Ok(Some(row)) => {
                if let Some(sink) = &sink {
                    let _ = sink.send(row.clone());
                }
                rows.push(row);
            }
            Ok(None) => break Ok(()),
            Err(err) => break Err(err),
        }
    };

    let close_result = executor.close(ctx);
    outcome?;
    close_result?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog::Column;
    use common::{TableId, WriteKind};
    use expr::{BinaryOp, Expr, LiteralValue};
    use kvs::TransactionMode;
    use plan::{Range, TableTarget};
    use types::{FieldType, OwnedValue};

    fn users_catalog() -> (Catalog, TableId) {
        let mut catalog = Catalog::new();
        let table_id = catalog
            .create_table(
                "users",
                vec![
                    Column::new("id", FieldType::Int4, false),
                    Column::new("name", FieldType::Character(types::LengthDetail { length: 32, varying: true }), true),
                ],
                vec![0],
            )
            .unwrap();
        (catalog, table_id)
    }

    #[test]
    fn insert_then_scan_round_trips_through_the_facade() {
        let (catalog, table_id) = users_catalog();
        let engine = Engine::with_memory_kvs(catalog, Config::builder().build());
        let tx = engine.begin_transaction(TransactionMode::short(false)).unwrap();

        let insert = Plan::Emit {
            input: Box::new(Plan::WriteNew {
                table: table_id,
                kind: WriteKind::Insert,
                tuples: vec![vec![
                    Some(Expr::lit(LiteralValue::Int4(1))),
                    Some(Expr::lit(LiteralValue::Character("alice".into()))),
                ]],
            }),
        };
        let outcome = engine.execute(&insert, vec![], tx.as_ref()).unwrap();
        assert_eq!(outcome.stats.inserted, 1);
        assert_eq!(outcome.request.status(), RequestStatus::Finishing);

        let scan = Plan::Emit {
            input: Box::new(Plan::Scan {
                target: TableTarget::primary(table_id),
                range: Range::all(),
            }),
        };
        let outcome = engine.execute(&scan, vec![], tx.as_ref()).unwrap();
        assert_eq!(outcome.rows.len(), 1);
        assert_eq!(outcome.rows[0].values[0], OwnedValue::Int4(1));

        tx.commit().unwrap();
    }

    #[test]
    fn duplicate_primary_key_fails_and_aborts_the_transaction() {
        let (catalog, table_id) = users_catalog();
        let engine = Engine::with_memory_kvs(catalog, Config::builder().build());
        let tx = engine.begin_transaction(TransactionMode::short(false)).unwrap();

        let insert_one = |value: i32| Plan::WriteNew {
            table: table_id,
            kind: WriteKind::Insert,
            tuples: vec![vec![Some(Expr::lit(LiteralValue::Int4(value))), None]],
        };

        engine.execute(&insert_one(1), vec![], tx.as_ref()).unwrap();
        let err = engine.execute(&insert_one(1), vec![], tx.as_ref()).unwrap_err();
        assert!(matches!(err, common::DbError::UniqueConstraintViolation(_)));
        assert!(!tx.is_active());

        // Abort is idempotent: a second one (as the facade itself would
        // have already issued) never raises its own error.
        assert!(tx.abort().is_ok());
    }

    #[test]
    fn execute_streaming_forwards_every_row_to_the_sink() {
        let (catalog, table_id) = users_catalog();
        let engine = Engine::with_memory_kvs(catalog, Config::builder().build());
        let tx = engine.begin_transaction(TransactionMode::short(false)).unwrap();

        for id in [1, 2, 3] {
            let insert = Plan::WriteNew {
                table: table_id,
                kind: WriteKind::Insert,
                tuples: vec![vec![Some(Expr::lit(LiteralValue::Int4(id))), None]],
            };
            engine.execute(&insert, vec![], tx.as_ref()).unwrap();
        }

        let (tx_sink, rx_sink) = crossbeam_channel::unbounded();
        let scan = Plan::Emit {
            input: Box::new(Plan::Filter {
                input: Box::new(Plan::Scan {
                    target: TableTarget::primary(table_id),
                    range: Range::all(),
                }),
                predicate: Expr::binary(BinaryOp::Gt, Expr::col(0), Expr::lit(LiteralValue::Int4(1))),
            }),
        };
        let outcome = engine.execute_streaming(&scan, vec![], tx.as_ref(), tx_sink).unwrap();
        assert_eq!(outcome.rows.len(), 2);
        let streamed: Vec<_> = rx_sink.try_iter().collect();
        assert_eq!(streamed.len(), 2);
    }

    #[test]
    fn ltx_write_outside_preserve_fails_and_deactivates_the_transaction() {
        let (mut catalog, users_id) = users_catalog();
        let orders_id = catalog
            .create_table("orders", vec![Column::new("id", FieldType::Int4, false)], vec![0])
            .unwrap();
        let engine = Engine::with_memory_kvs(catalog, Config::builder().build());

        // LTX preserves only `orders`; writing to `users` must fail
        // immediately and deactivate the transaction.
        let tx = engine
            .begin_transaction(TransactionMode::long(vec!["orders".into()]))
            .unwrap();

        let write_users = Plan::WriteNew {
            table: users_id,
            kind: WriteKind::Insert,
            tuples: vec![vec![Some(Expr::lit(LiteralValue::Int4(1))), None]],
        };
        let err = engine.execute(&write_users, vec![], tx.as_ref()).unwrap_err();
        assert!(matches!(err, common::DbError::WritePreserveViolation(_)));
        assert!(!tx.is_active());

        // The preserved table is unaffected by the other transaction's
        // failure; a fresh transaction can still write it.
        let tx2 = engine
            .begin_transaction(TransactionMode::long(vec!["orders".into()]))
            .unwrap();
        let write_orders = Plan::WriteNew {
            table: orders_id,
            kind: WriteKind::Insert,
            tuples: vec![vec![Some(Expr::lit(LiteralValue::Int4(1)))]],
        };
        let outcome = engine.execute(&write_orders, vec![], tx2.as_ref()).unwrap();
        assert_eq!(outcome.stats.inserted, 1);
    }
}
