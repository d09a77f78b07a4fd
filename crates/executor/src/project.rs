//! `Project`: evaluates `exprs` against each input row
//! and emits the results as the new row shape.

use common::{DbResult, Row};
use expr::Expr;
use types::OwnedValue;

use crate::{ExecutionContext, Executor};

pub struct ProjectExec {
    input: Box<dyn Executor>,
    exprs: Vec<Expr>,
}

impl ProjectExec {
    pub fn new(input: Box<dyn Executor>, exprs: Vec<Expr>) -> Self {
        Self { input, exprs }
    }
}

impl Executor for ProjectExec {
    fn open(&mut self, ctx: &ExecutionContext) -> DbResult<()> {
        self.input.open(ctx)
    }

    fn next(&mut self, ctx: &ExecutionContext) -> DbResult<Option<Row>> {
        let Some(row) = self.input.next(ctx)? else {
            return Ok(None);
        };
        let input_values: Vec<_> = row.values.iter().map(|v| v.to_any()).collect();
        let mut evaluator = ctx.new_evaluator();
        let mut out = Vec::with_capacity(self.exprs.len());
        for expr in &self.exprs {
            let value = evaluator.eval(expr, &input_values)?;
            out.push(OwnedValue::from_any(&value).unwrap_or(OwnedValue::Null));
        }
        Ok(Some(Row::new(out)))
    }

    fn close(&mut self, ctx: &ExecutionContext) -> DbResult<()> {
        self.input.close(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{row_source, test_ctx};
    use expr::{BinaryOp, LiteralValue};

    #[test]
    fn project_reorders_and_computes() {
        let input = row_source(vec![Row::new(vec![OwnedValue::Int4(1), OwnedValue::Int4(2)])]);
        let exprs = vec![
            Expr::col(1),
            Expr::binary(BinaryOp::Add, Expr::col(0), Expr::lit(LiteralValue::Int4(10))),
        ];
        let mut exec = ProjectExec::new(input, exprs);
        let harness = test_ctx();
        let rows = crate::run_to_completion(&mut exec, &harness.ctx()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].values[0], OwnedValue::Int4(2));
        assert_eq!(rows[0].values[1], OwnedValue::Int4(11));
    }

    #[test]
    fn project_over_empty_input_yields_nothing() {
        let input = row_source(vec![]);
        let mut exec = ProjectExec::new(input, vec![Expr::col(0)]);
        let harness = test_ctx();
        let rows = crate::run_to_completion(&mut exec, &harness.ctx()).unwrap();
        assert!(rows.is_empty());
    }
}
