//! Recursively constructs an operator tree from a compiled [`plan::Plan`].
//! `Plan::Emit` has no operator of its own: the executor's
//! `next()` already is the request's result channel from the caller's
//! point of view, so `Emit` just unwraps to its child.

use common::DbResult;
use plan::Plan;

use crate::aggregate::AggregateExec;
use crate::apply::ApplyExec;
use crate::cogroup::CogroupExec;
use crate::dml::{WriteExistingExec, WriteNewExec};
use crate::filter::FilterExec;
use crate::join::JoinFindExec;
use crate::project::ProjectExec;
use crate::scan::{FindExec, ScanExec};
use crate::Executor;

pub fn build_executor(plan: &Plan) -> DbResult<Box<dyn Executor>> {
    Ok(match plan {
        Plan::Scan { target, range } => Box::new(ScanExec::new(target.clone(), range.clone())),

        Plan::Find { target, key } => Box::new(FindExec::new(target.clone(), key.clone())),

        Plan::Project { input, exprs } => {
            Box::new(ProjectExec::new(build_executor(input)?, exprs.clone()))
        }

        Plan::Filter { input, predicate } => {
            Box::new(FilterExec::new(build_executor(input)?, predicate.clone()))
        }

        Plan::JoinFind {
            left,
            target,
            join_key,
            condition,
            kind,
        } => Box::new(JoinFindExec::new(
            build_executor(left)?,
            target.clone(),
            join_key.clone(),
            condition.clone(),
            *kind,
        )),

        Plan::Cogroup {
            inputs,
            key_len,
            member_limit,
        } => {
            let built = inputs
                .iter()
                .map(build_executor)
                .collect::<DbResult<Vec<_>>>()?;
            Box::new(CogroupExec::new(built, *key_len, *member_limit))
        }

        Plan::Aggregate {
            input,
            group_by,
            aggregates,
        } => Box::new(AggregateExec::new(
            build_executor(input)?,
            group_by.clone(),
            aggregates.clone(),
        )),

        Plan::Apply {
            input,
            function,
            kind,
        } => Box::new(ApplyExec::new(build_executor(input)?, function.clone(), *kind)),

        Plan::Emit { input } => build_executor(input)?,

        Plan::WriteExisting {
            input,
            table,
            kind,
            assignments,
        } => Box::new(WriteExistingExec::new(
            build_executor(input)?,
            *table,
            *kind,
            assignments.clone(),
        )),

        Plan::WriteNew { table, kind, tuples } => {
            Box::new(WriteNewExec::new(*table, *kind, tuples.clone()))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::TableId;
    use expr::{BinaryOp, Expr, LiteralValue};
    use plan::{Range, TableTarget};

    #[test]
    fn builds_scan() {
        let plan = Plan::Scan {
            target: TableTarget::primary(TableId(1)),
            range: Range::all(),
        };
        assert!(build_executor(&plan).is_ok());
    }

    #[test]
    fn builds_filter_over_scan() {
        let plan = Plan::Filter {
            input: Box::new(Plan::Scan {
                target: TableTarget::primary(TableId(1)),
                range: Range::all(),
            }),
            predicate: Expr::binary(BinaryOp::Gt, Expr::col(0), Expr::lit(LiteralValue::Int4(0))),
        };
        assert!(build_executor(&plan).is_ok());
    }

    #[test]
    fn emit_unwraps_to_its_child_and_still_runs() {
        let mut catalog = catalog::Catalog::new();
        let table_id = catalog
            .create_table("t", vec![catalog::Column::new("id", types::FieldType::Int4, false)], vec![0])
            .unwrap();
        let plan = Plan::Emit {
            input: Box::new(Plan::Scan {
                target: TableTarget::primary(table_id),
                range: Range::all(),
            }),
        };
        let mut exec = build_executor(&plan).unwrap();
        let harness = crate::testutil::TestHarness::new(catalog);
        let rows = crate::run_to_completion(&mut *exec, &harness.ctx()).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn builds_write_new() {
        let plan = Plan::WriteNew {
            table: TableId(1),
            kind: common::WriteKind::Insert,
            tuples: vec![vec![Some(Expr::lit(LiteralValue::Int4(1)))]],
        };
        assert!(build_executor(&plan).is_ok());
    }
}
