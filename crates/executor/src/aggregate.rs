//! `Aggregate`: groups `input` rows by the
//! already-sorted `group_by` ordinals and folds `aggregates` over each
//! group, emitting one row per group — group-by columns first, then
//! aggregate results in declaration order. A group is only emitted for
//! keys the input actually produces: an ungrouped aggregate (`group_by`
//! empty) over zero input rows therefore emits zero rows, the same as any
//! other group that never shows up.

use std::collections::VecDeque;

use common::{DbError, DbResult, Row};
use expr::{BinaryOp, EvaluatorContext, Expr};
use plan::{AggregateExpr, AggregateFunc};
use types::{Any, OwnedValue};

use crate::{ExecutionContext, Executor};

pub struct AggregateExec {
    input: Box<dyn Executor>,
    group_by: Vec<usize>,
    aggregates: Vec<AggregateExpr>,
    buffer: VecDeque<Row>,
}

impl AggregateExec {
    pub fn new(input: Box<dyn Executor>, group_by: Vec<usize>, aggregates: Vec<AggregateExpr>) -> Self {
        Self {
            input,
            group_by,
            aggregates,
            buffer: VecDeque::new(),
        }
    }
}

/// Running state for one `AggregateExpr` within the group currently open.
struct Fold {
    func: AggregateFunc,
    arg: Option<usize>,
    count: u64,
    acc: Option<Any>,
}

impl Fold {
    fn new(expr: &AggregateExpr) -> Self {
        Self {
            func: expr.func,
            arg: expr.arg,
            count: 0,
            acc: None,
        }
    }

    fn arg_value(&self, row: &Row) -> DbResult<Any> {
        let ordinal = self.arg.ok_or_else(|| {
            DbError::Planning(format!("{:?} requires an argument column", self.func))
        })?;
        Ok(row.values.get(ordinal).map(|v| v.to_any()).unwrap_or(Any::Null))
    }

    fn accumulate(&mut self, row: &Row, evaluator: &mut EvaluatorContext) -> DbResult<()> {
        match self.func {
            AggregateFunc::CountStar => self.count += 1,
            AggregateFunc::Count => {
                if !self.arg_value(row)?.is_null() {
                    self.count += 1;
                }
            }
            AggregateFunc::Sum | AggregateFunc::Avg => {
                let value = self.arg_value(row)?;
                if value.is_null() {
                    return Ok(());
                }
                self.count += 1;
                self.acc = Some(match self.acc.take() {
                    None => value,
                    Some(acc) => evaluator.eval(
                        &Expr::binary(BinaryOp::Add, Expr::col(0), Expr::col(1)),
                        &[acc, value],
                    )?,
                });
            }
            AggregateFunc::Min => {
                let value = self.arg_value(row)?;
                if value.is_null() {
                    return Ok(());
                }
                self.acc = Some(match self.acc.take() {
                    None => value,
                    Some(acc) => {
                        if matches!(value.cmp_checked(&acc), Some(std::cmp::Ordering::Less)) {
                            value
                        } else {
                            acc
                        }
                    }
                });
            }
            AggregateFunc::Max => {
                let value = self.arg_value(row)?;
                if value.is_null() {
                    return Ok(());
                }
                self.acc = Some(match self.acc.take() {
                    None => value,
                    Some(acc) => {
                        if matches!(value.cmp_checked(&acc), Some(std::cmp::Ordering::Greater)) {
                            value
                        } else {
                            acc
                        }
                    }
                });
            }
        }
        Ok(())
    }

    fn finish(self, evaluator: &mut EvaluatorContext) -> DbResult<OwnedValue> {
        let any = match self.func {
            AggregateFunc::CountStar | AggregateFunc::Count => Any::Int8(self.count as i64),
            AggregateFunc::Sum | AggregateFunc::Min | AggregateFunc::Max => {
                self.acc.unwrap_or(Any::Null)
            }
            AggregateFunc::Avg => match self.acc {
                None => Any::Null,
                Some(sum) => evaluator.eval(
                    &Expr::binary(BinaryOp::Div, Expr::col(0), Expr::col(1)),
                    &[sum, Any::Int8(self.count as i64)],
                )?,
            },
        };
        Ok(OwnedValue::from_any(&any).unwrap_or(OwnedValue::Null))
    }
}

fn group_key(row: &Row, group_by: &[usize]) -> Vec<OwnedValue> {
    group_by.iter().map(|&ordinal| row.values[ordinal].clone()).collect()
}

fn finish_group(
    key: Vec<OwnedValue>,
    folds: Vec<Fold>,
    evaluator: &mut EvaluatorContext,
) -> DbResult<Row> {
    let mut values = key;
    for fold in folds {
        values.push(fold.finish(evaluator)?);
    }
    Ok(Row::new(values))
}

impl Executor for AggregateExec {
    fn open(&mut self, ctx: &ExecutionContext) -> DbResult<()> {
        self.input.open(ctx)?;
        let mut evaluator = ctx.new_evaluator();
        let mut current_key: Option<Vec<OwnedValue>> = None;
        let mut folds: Vec<Fold> = Vec::new();

        while let Some(row) = self.input.next(ctx)? {
            let key = group_key(&row, &self.group_by);
            if current_key.as_ref() != Some(&key) {
                if let Some(prev_key) = current_key.take() {
                    self.buffer
                        .push_back(finish_group(prev_key, std::mem::take(&mut folds), &mut evaluator)?);
                }
                current_key = Some(key);
                folds = self.aggregates.iter().map(Fold::new).collect();
            }
            for fold in &mut folds {
                fold.accumulate(&row, &mut evaluator)?;
            }
        }
        if let Some(key) = current_key {
            self.buffer.push_back(finish_group(key, folds, &mut evaluator)?);
        }
        self.input.close(ctx)?;
        Ok(())
    }

    fn next(&mut self, _ctx: &ExecutionContext) -> DbResult<Option<Row>> {
        Ok(self.buffer.pop_front())
    }

    fn close(&mut self, _ctx: &ExecutionContext) -> DbResult<()> {
        self.buffer.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{row_source, test_ctx};

    fn agg(func: AggregateFunc, arg: Option<usize>) -> AggregateExpr {
        AggregateExpr { func, arg }
    }

    #[test]
    fn groups_and_folds_sum_and_count() {
        let input = row_source(vec![
            Row::new(vec![OwnedValue::Int4(1), OwnedValue::Int4(10)]),
            Row::new(vec![OwnedValue::Int4(1), OwnedValue::Int4(20)]),
            Row::new(vec![OwnedValue::Int4(2), OwnedValue::Int4(5)]),
        ]);
        let mut exec = AggregateExec::new(
            input,
            vec![0],
            vec![agg(AggregateFunc::CountStar, None), agg(AggregateFunc::Sum, Some(1))],
        );
        let harness = test_ctx();
        let rows = crate::run_to_completion(&mut exec, &harness.ctx()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].values, vec![OwnedValue::Int4(1), OwnedValue::Int8(2), OwnedValue::Int8(30)]);
        assert_eq!(rows[1].values, vec![OwnedValue::Int4(2), OwnedValue::Int8(1), OwnedValue::Int8(5)]);
    }

    #[test]
    fn avg_divides_sum_by_non_null_count() {
        let input = row_source(vec![
            Row::new(vec![OwnedValue::Int4(1), OwnedValue::Int4(10)]),
            Row::new(vec![OwnedValue::Int4(1), OwnedValue::Null]),
            Row::new(vec![OwnedValue::Int4(1), OwnedValue::Int4(20)]),
        ]);
        let mut exec = AggregateExec::new(input, vec![0], vec![agg(AggregateFunc::Avg, Some(1))]);
        let harness = test_ctx();
        let rows = crate::run_to_completion(&mut exec, &harness.ctx()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].values[1], OwnedValue::Int8(15));
    }

    #[test]
    fn min_and_max_ignore_null() {
        let input = row_source(vec![
            Row::new(vec![OwnedValue::Int4(1), OwnedValue::Int4(10)]),
            Row::new(vec![OwnedValue::Int4(1), OwnedValue::Null]),
            Row::new(vec![OwnedValue::Int4(1), OwnedValue::Int4(3)]),
        ]);
        let mut exec = AggregateExec::new(
            input,
            vec![0],
            vec![agg(AggregateFunc::Min, Some(1)), agg(AggregateFunc::Max, Some(1))],
        );
        let harness = test_ctx();
        let rows = crate::run_to_completion(&mut exec, &harness.ctx()).unwrap();
        assert_eq!(rows[0].values[1], OwnedValue::Int4(3));
        assert_eq!(rows[0].values[2], OwnedValue::Int4(10));
    }

    #[test]
    fn empty_input_emits_no_groups() {
        let input = row_source(vec![]);
        let mut exec = AggregateExec::new(input, vec![], vec![agg(AggregateFunc::CountStar, None)]);
        let harness = test_ctx();
        let rows = crate::run_to_completion(&mut exec, &harness.ctx()).unwrap();
        assert!(rows.is_empty());
    }
}
