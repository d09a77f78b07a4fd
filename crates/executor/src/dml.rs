//! `WriteExisting`/`WriteNew`: the operators that
//! feed rows into the [`write`] pipeline. `WriteNew` has no input — each
//! tuple is evaluated with no row context (parameters only, like `Find`'s
//! key) and materialized with column defaults applied. `WriteExisting`
//! re-evaluates `assignments` against the row its input produced and hands
//! old/new pairs to `write::update_record`, or the row alone to
//! `write::delete_record`.

use std::collections::VecDeque;

use common::{ColumnId, DbError, DbResult, RequestStats, Row, TableId, WriteKind};
use expr::Expr;
use types::{Any, OwnedValue};

use crate::{ExecutionContext, Executor};

fn record_outcome(stats: &RequestStats, outcome: write::WriteOutcome) {
    if outcome.inserted > 0 {
        stats.incr_inserted(outcome.inserted);
    }
    if outcome.merged > 0 {
        stats.incr_merged(outcome.merged);
    }
    if outcome.deleted > 0 {
        stats.incr_deleted(outcome.deleted);
    }
}

pub struct WriteNewExec {
    table: TableId,
    kind: WriteKind,
    tuples: Vec<Vec<Option<Expr>>>,
    rows: VecDeque<Row>,
}

impl WriteNewExec {
    pub fn new(table: TableId, kind: WriteKind, tuples: Vec<Vec<Option<Expr>>>) -> Self {
        Self {
            table,
            kind,
            tuples,
            rows: VecDeque::new(),
        }
    }
}

impl Executor for WriteNewExec {
    fn open(&mut self, ctx: &ExecutionContext) -> DbResult<()> {
        let table = ctx.catalog.table_by_id(self.table)?;
        let mut evaluator = ctx.new_evaluator();
        for tuple in &self.tuples {
            let mut values = Vec::with_capacity(tuple.len());
            for slot in tuple {
                let value = match slot {
                    Some(expr) => Some(evaluator.eval(expr, &[])?),
                    None => None,
                };
                values.push(value);
            }
            let row = write::materialize_row(table, &values, ctx.write)?;
            let outcome = write::process_record(ctx.db, ctx.tx, ctx.write, table, self.kind, &row)?;
            record_outcome(ctx.stats, outcome);
            self.rows.push_back(row);
        }
        Ok(())
    }

    fn next(&mut self, _ctx: &ExecutionContext) -> DbResult<Option<Row>> {
        Ok(self.rows.pop_front())
    }

    fn close(&mut self, _ctx: &ExecutionContext) -> DbResult<()> {
        self.rows.clear();
        Ok(())
    }
}

pub struct WriteExistingExec {
    input: Box<dyn Executor>,
    table: TableId,
    kind: WriteKind,
    assignments: Vec<(ColumnId, Expr)>,
}

impl WriteExistingExec {
    pub fn new(
        input: Box<dyn Executor>,
        table: TableId,
        kind: WriteKind,
        assignments: Vec<(ColumnId, Expr)>,
    ) -> Self {
        Self {
            input,
            table,
            kind,
            assignments,
        }
    }
}

impl Executor for WriteExistingExec {
    fn open(&mut self, ctx: &ExecutionContext) -> DbResult<()> {
        self.input.open(ctx)
    }

    fn next(&mut self, ctx: &ExecutionContext) -> DbResult<Option<Row>> {
        let Some(old_row) = self.input.next(ctx)? else {
            return Ok(None);
        };
        let table = ctx.catalog.table_by_id(self.table)?;
        let emitted = match self.kind {
            WriteKind::Delete => {
                let outcome = write::delete_record(ctx.db, ctx.tx, table, &old_row)?;
                record_outcome(ctx.stats, outcome);
                old_row
            }
            WriteKind::Update => {
                let input_values: Vec<Any> = old_row.values.iter().map(|v| v.to_any()).collect();
                let mut evaluator = ctx.new_evaluator();
                let mut new_values = old_row.values.clone();
                for (col, expr) in &self.assignments {
                    let value = evaluator.eval(expr, &input_values)?;
                    new_values[*col as usize] = OwnedValue::from_any(&value).unwrap_or(OwnedValue::Null);
                }
                let new_row = Row::new(new_values);
                let outcome = write::update_record(ctx.db, ctx.tx, table, &old_row, &new_row)?;
                record_outcome(ctx.stats, outcome);
                new_row
            }
            other => {
                return Err(DbError::Planning(format!(
                    "write_existing does not support write kind {other:?}"
                )));
            }
        };
        Ok(Some(emitted))
    }

    fn close(&mut self, ctx: &ExecutionContext) -> DbResult<()> {
        self.input.close(ctx)
    }
}
