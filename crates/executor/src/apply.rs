//! `Apply`: invokes a table-valued function once per left
//! row, appending its output columns. `Cross` drops the left row entirely
//! when the function produces no rows; `Outer` emits it once, right side
//! padded with `NULL`.

use std::collections::VecDeque;

use common::{DbResult, Row};
use plan::{ApplyKind, TableFunctionCall};
use types::{Any, OwnedValue};

use crate::{ExecutionContext, Executor};

pub struct ApplyExec {
    input: Box<dyn Executor>,
    function: TableFunctionCall,
    kind: ApplyKind,
    buffer: VecDeque<Row>,
}

impl ApplyExec {
    pub fn new(input: Box<dyn Executor>, function: TableFunctionCall, kind: ApplyKind) -> Self {
        Self {
            input,
            function,
            kind,
            buffer: VecDeque::new(),
        }
    }
}

impl Executor for ApplyExec {
    fn open(&mut self, ctx: &ExecutionContext) -> DbResult<()> {
        self.input.open(ctx)
    }

    fn next(&mut self, ctx: &ExecutionContext) -> DbResult<Option<Row>> {
        while self.buffer.is_empty() {
            let Some(left_row) = self.input.next(ctx)? else {
                return Ok(None);
            };
            let left_values: Vec<Any> = left_row.values.iter().map(|v| v.to_any()).collect();
            let mut evaluator = ctx.new_evaluator();
            let args: Vec<Any> = self
                .function
                .args
                .iter()
                .map(|e| evaluator.eval(e, &left_values))
                .collect::<DbResult<_>>()?;
            let produced = ctx.functions.call(&self.function.name, &args)?;

            if produced.is_empty() {
                if matches!(self.kind, ApplyKind::Outer) {
                    let mut values = left_row.values.clone();
                    values.extend(std::iter::repeat(OwnedValue::Null).take(self.function.output_arity));
                    self.buffer.push_back(Row::new(values));
                }
                continue;
            }
            for tuple in produced {
                let mut values = left_row.values.clone();
                for value in tuple {
                    values.push(OwnedValue::from_any(&value).unwrap_or(OwnedValue::Null));
                }
                self.buffer.push_back(Row::new(values));
            }
        }
        Ok(self.buffer.pop_front())
    }

    fn close(&mut self, ctx: &ExecutionContext) -> DbResult<()> {
        self.buffer.clear();
        self.input.close(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{row_source, test_ctx};

    fn series_call() -> TableFunctionCall {
        TableFunctionCall {
            name: "generate_series".into(),
            args: vec![expr::Expr::col(0), expr::Expr::col(1)],
            output_arity: 1,
        }
    }

    #[test]
    fn cross_apply_drops_left_row_with_empty_series() {
        let input = row_source(vec![
            Row::new(vec![OwnedValue::Int4(1), OwnedValue::Int4(3)]),
            Row::new(vec![OwnedValue::Int4(5), OwnedValue::Int4(4)]),
        ]);
        let mut exec = ApplyExec::new(input, series_call(), ApplyKind::Cross);
        let harness = test_ctx();
        let rows = crate::run_to_completion(&mut exec, &harness.ctx()).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].values, vec![OwnedValue::Int4(1), OwnedValue::Int4(3), OwnedValue::Int8(1)]);
        assert_eq!(rows[2].values[2], OwnedValue::Int8(3));
    }

    #[test]
    fn outer_apply_pads_empty_series_with_null() {
        let input = row_source(vec![Row::new(vec![OwnedValue::Int4(5), OwnedValue::Int4(4)])]);
        let mut exec = ApplyExec::new(input, series_call(), ApplyKind::Outer);
        let harness = test_ctx();
        let rows = crate::run_to_completion(&mut exec, &harness.ctx()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].values[2], OwnedValue::Null);
    }
}
