//! `Filter`: keeps only rows for which `predicate`
//! evaluates to `Boolean(true)` — three-valued, so `NULL` and `false` are
//! both dropped.

use common::{DbResult, Row};
use expr::Expr;
use types::Any;

use crate::{ExecutionContext, Executor};

pub struct FilterExec {
    input: Box<dyn Executor>,
    predicate: Expr,
}

impl FilterExec {
    pub fn new(input: Box<dyn Executor>, predicate: Expr) -> Self {
        Self { input, predicate }
    }
}

impl Executor for FilterExec {
    fn open(&mut self, ctx: &ExecutionContext) -> DbResult<()> {
        self.input.open(ctx)
    }

    fn next(&mut self, ctx: &ExecutionContext) -> DbResult<Option<Row>> {
        let mut evaluator = ctx.new_evaluator();
        while let Some(row) = self.input.next(ctx)? {
            let values: Vec<Any> = row.values.iter().map(|v| v.to_any()).collect();
            if matches!(evaluator.eval(&self.predicate, &values)?, Any::Boolean(true)) {
                return Ok(Some(row));
            }
        }
        Ok(None)
    }

    fn close(&mut self, ctx: &ExecutionContext) -> DbResult<()> {
        self.input.close(ctx)
    }
}
