//! Shared test scaffolding for the operator library: a canned-row source
//! executor and a fully wired `ExecutionContext` builder, so each
//! operator's own test module only has to describe its input/output
//! rows.

use std::collections::VecDeque;

use catalog::Catalog;
use common::{Config, DbResult, RequestStats, Row};
use kvs::{Database, InMemoryDatabase, TransactionMode};
use plan::VariableTable;
use scheduler::{CancellationToken, RequestDetail, RequestKind, Scheduler};
use write::WriteEngine;

use crate::{ExecutionContext, Executor, TableFunctionRegistry};

/// Replays a fixed `Vec<Row>`, ignoring the context entirely — stands in
/// for whatever upstream operator would have produced these rows.
pub struct RowSourceExec {
    rows: VecDeque<Row>,
}

impl Executor for RowSourceExec {
    fn open(&mut self, _ctx: &ExecutionContext) -> DbResult<()> {
        Ok(())
    }

    fn next(&mut self, _ctx: &ExecutionContext) -> DbResult<Option<Row>> {
        Ok(self.rows.pop_front())
    }

    fn close(&mut self, _ctx: &ExecutionContext) -> DbResult<()> {
        Ok(())
    }
}

pub fn row_source(rows: Vec<Row>) -> Box<dyn Executor> {
    Box::new(RowSourceExec { rows: rows.into() })
}

/// Owns every collaborator an `ExecutionContext` borrows from, so tests
/// can build one without repeating the wiring at every call site.
pub struct TestHarness {
    pub catalog: Catalog,
    pub db: InMemoryDatabase,
    pub tx: std::sync::Arc<dyn kvs::Transaction>,
    pub write: WriteEngine,
    pub params: VariableTable,
    pub config: Config,
    pub stats: RequestStats,
    pub functions: TableFunctionRegistry,
    pub scheduler: Scheduler,
    pub request: RequestDetail,
    pub cancellation: CancellationToken,
}

impl TestHarness {
    pub fn new(catalog: Catalog) -> Self {
        let db = InMemoryDatabase::new();
        let tx = db.begin_transaction(TransactionMode::short(false)).unwrap();
        let config = Config::builder().build();
        Self {
            catalog,
            db,
            tx,
            write: WriteEngine::default(),
            params: VariableTable::new(vec![]),
            config: config.clone(),
            stats: RequestStats::default(),
            functions: TableFunctionRegistry::new(),
            scheduler: Scheduler::new(config),
            request: RequestDetail::new(RequestKind::ExecuteStatement),
            cancellation: CancellationToken::new(),
        }
    }

    pub fn ctx(&self) -> ExecutionContext<'_> {
        ExecutionContext {
            catalog: &self.catalog,
            db: &self.db,
            tx: self.tx.as_ref(),
            write: &self.write,
            params: &self.params,
            config: &self.config,
            stats: &self.stats,
            functions: &self.functions,
            scheduler: &self.scheduler,
            request: &self.request,
            cancellation: &self.cancellation,
        }
    }
}

pub fn test_ctx() -> TestHarness {
    TestHarness::new(Catalog::new())
}
