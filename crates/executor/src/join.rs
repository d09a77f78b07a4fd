//! `JoinFind`: for every row from `left`, probes `target`
//! by `join_key` and joins matching rows on, honoring `kind`'s outer-join
//! padding rules. A `NULL` component anywhere in an evaluated `join_key`
//! never matches anything (the usual SQL join-key-is-NULL rule), the same
//! way `Find`'s point lookup would simply miss.

use std::collections::{HashSet, VecDeque};

use catalog::TableMeta;
use common::{DbResult, Row};
use expr::Expr;
use kvs::ScanBound;
use plan::{JoinKind, TableTarget};
use types::{Any, OwnedValue};
use write::codec;

use crate::target::{encode_key_tuple, prefix_range, row_from_primary_hit, row_from_secondary_hit};
use crate::{ExecutionContext, Executor};

pub struct JoinFindExec {
    left: Box<dyn Executor>,
    target: TableTarget,
    join_key: Vec<Expr>,
    condition: Option<Expr>,
    kind: JoinKind,
    buffer: VecDeque<Row>,
}

impl JoinFindExec {
    pub fn new(
        left: Box<dyn Executor>,
        target: TableTarget,
        join_key: Vec<Expr>,
        condition: Option<Expr>,
        kind: JoinKind,
    ) -> Self {
        Self { left, target, join_key, condition, kind, buffer: VecDeque::new() }
    }
}

/// Every row in `table` matching the probe key, re-resolved to full rows
/// along with the primary key bytes each one owns (used to track which
/// right rows a `RightOuter`/`FullOuter` join has matched).
fn probe(
    ctx: &ExecutionContext,
    table: &TableMeta,
    target: &TableTarget,
    values: &[Any],
) -> DbResult<Vec<(Vec<u8>, Row)>> {
    let mut out = Vec::new();
    match &target.index {
        None => {
            let primary = table.primary_target();
            let prefix = encode_key_tuple(&primary.key_fields[..values.len()], values);
            let (lo, hi) = prefix_range(prefix);
            let storage = ctx.db.get_or_create_storage(&primary.storage_name)?;
            for (key, value) in storage.scan(ctx.tx, lo, hi)? {
                let row = row_from_primary_hit(table, &key, &value)?;
                out.push((key, row));
            }
        }
        Some(index_name) => {
            let secondary = table.secondary_target(index_name)?;
            let prefix = encode_key_tuple(&secondary.key_fields[..values.len()], values);
            let (lo, hi) = prefix_range(prefix);
            let storage = ctx.db.get_or_create_storage(&secondary.storage_name)?;
            for (key, _value) in storage.scan(ctx.tx, lo, hi)? {
                if let Some(row) = row_from_secondary_hit(ctx, table, &secondary, &key)? {
                    let primary = table.primary_target();
                    let pk = codec::encode_primary_key(&primary, &row);
                    out.push((pk, row));
                }
            }
        }
    }
    Ok(out)
}

fn combined_matches(
    ctx: &ExecutionContext,
    condition: &Option<Expr>,
    left: &Row,
    right: &Row,
) -> DbResult<bool> {
    let Some(condition) = condition else {
        return Ok(true);
    };
    let mut values: Vec<Any> = left.values.iter().map(|v| v.to_any()).collect();
    values.extend(right.values.iter().map(|v| v.to_any()));
    let mut evaluator = ctx.new_evaluator();
    Ok(matches!(evaluator.eval(condition, &values)?, Any::Boolean(true)))
}

fn combine(left: &Row, right: &Row) -> Row {
    let mut values = left.values.clone();
    values.extend(right.values.iter().cloned());
    Row::new(values)
}

fn pad(left: &Row, right_width: usize) -> Row {
    let mut values = left.values.clone();
    values.extend(std::iter::repeat(OwnedValue::Null).take(right_width));
    values.into()
}

fn pad_left(left_width: usize, right: &Row) -> Row {
    let mut values: Vec<OwnedValue> = std::iter::repeat(OwnedValue::Null).take(left_width).collect();
    values.extend(right.values.iter().cloned());
    values.into()
}

impl Executor for JoinFindExec {
    fn open(&mut self, ctx: &ExecutionContext) -> DbResult<()> {
        let table = ctx.catalog.table_by_id(self.target.table)?.clone();
        let right_width = table.schema.columns.len();
        let wants_right_outer = matches!(self.kind, JoinKind::RightOuter | JoinKind::FullOuter);
        let wants_left_outer = matches!(self.kind, JoinKind::LeftOuter | JoinKind::FullOuter);

        self.left.open(ctx)?;
        let mut matched_pks: HashSet<Vec<u8>> = HashSet::new();
        let mut left_width = 0usize;

        while let Some(left_row) = self.left.next(ctx)? {
            left_width = left_row.values.len();
            let left_values: Vec<Any> = left_row.values.iter().map(|v| v.to_any()).collect();
            let mut evaluator = ctx.new_evaluator();
            let key_values: Vec<Any> = self
                .join_key
                .iter()
                .map(|e| evaluator.eval(e, &left_values))
                .collect::<DbResult<_>>()?;
            let has_null_key = key_values.iter().any(Any::is_null);

            let mut any_match = false;
            if !has_null_key {
                for (pk, right_row) in probe(ctx, &table, &self.target, &key_values)? {
                    if combined_matches(ctx, &self.condition, &left_row, &right_row)? {
                        any_match = true;
                        if wants_right_outer {
                            matched_pks.insert(pk);
                        }
                        self.buffer.push_back(combine(&left_row, &right_row));
                    }
                }
            }
            if !any_match && wants_left_outer {
                self.buffer.push_back(pad(&left_row, right_width));
            }
        }
        self.left.close(ctx)?;

        if wants_right_outer {
            let primary = table.primary_target();
            let storage = ctx.db.get_or_create_storage(&primary.storage_name)?;
            for (key, value) in storage.scan(ctx.tx, ScanBound::Unbounded, ScanBound::Unbounded)? {
                if matched_pks.contains(&key) {
                    continue;
                }
                let right_row = row_from_primary_hit(&table, &key, &value)?;
                self.buffer.push_back(pad_left(left_width, &right_row));
            }
        }
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
