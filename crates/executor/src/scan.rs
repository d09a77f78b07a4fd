//! `Scan` and `Find`: range and point reads against
//! either a table's primary storage or one of its secondary indexes.

use std::collections::VecDeque;

use catalog::TableMeta;
use common::{DbResult, Row};
use expr::Expr;
use kvs::ScanBound;
use plan::{Bound, Range, TableTarget};
use record::FieldInfo;
use types::Any;

use crate::target::{encode_key_tuple, prefix_range, row_from_primary_hit, row_from_secondary_hit};
use crate::{ExecutionContext, Executor};

fn resolve_table(ctx: &ExecutionContext, target: &TableTarget) -> DbResult<TableMeta> {
    Ok(ctx.catalog.table_by_id(target.table)?.clone())
}

/// Evaluates a range endpoint against the request's parameters (ranges
/// have no input row: they're fixed once per request) and turns it into
/// a KVS-level scan endpoint. `is_lower`
/// distinguishes the two directions in which a *prefixed* bound differs
/// from a plain one: lexicographically, any longer string sharing a
/// prefix always sorts after the bare prefix, so a prefix only needs the
/// `increment_bytes` trick on the exclusive-lower / inclusive-upper side;
/// the other combination is already what a plain bound gives you.
fn eval_bound(
    evaluator: &mut expr::EvaluatorContext,
    key_fields: &[FieldInfo],
    bound: &Bound,
    is_lower: bool,
) -> DbResult<Option<ScanBound>> {
    let (exprs, prefixed, inclusive) = match bound {
        Bound::Unbounded => return Ok(Some(ScanBound::Unbounded)),
        Bound::Inclusive(exprs) => (exprs, false, true),
        Bound::Exclusive(exprs) => (exprs, false, false),
        Bound::PrefixedInclusive(exprs) => (exprs, true, true),
        Bound::PrefixedExclusive(exprs) => (exprs, true, false),
    };
    let values: Vec<Any> = exprs
        .iter()
        .map(|e| evaluator.eval(e, &[]))
        .collect::<DbResult<_>>()?;
    let bytes = encode_key_tuple(&key_fields[..values.len()], &values);

    if !prefixed {
        return Ok(Some(if inclusive {
            ScanBound::Inclusive(bytes)
        } else {
            ScanBound::Exclusive(bytes)
        }));
    }
    let (lo, hi) = prefix_range(bytes);
    Ok(Some(match (is_lower, inclusive) {
        (true, true) => lo,   // PrefixedInclusive lower == Inclusive(prefix)
        (false, false) => hi, // PrefixedExclusive upper == Exclusive(prefix)
        (true, false) => hi,  // PrefixedExclusive lower: skip the whole prefix run
        (false, true) => hi,  // PrefixedInclusive upper: include the whole prefix run
    }))
}

/// Converts `range` into KVS scan bounds.
fn resolve_range(
    key_fields: &[FieldInfo],
    range: &Range,
    evaluator: &mut expr::EvaluatorContext,
) -> DbResult<(ScanBound, ScanBound)> {
    let lo = eval_bound(evaluator, key_fields, &range.lower, true)?.unwrap_or(ScanBound::Unbounded);
    let hi = eval_bound(evaluator, key_fields, &range.upper, false)?.unwrap_or(ScanBound::Unbounded);
    Ok((lo, hi))
}

/// Reads every row a `target`/`range` selects, re-resolving secondary
/// hits back to the full schema row.
fn materialize_scan(
    ctx: &ExecutionContext,
    table: &TableMeta,
    target: &TableTarget,
    range: &Range,
) -> DbResult<Vec<Row>> {
    let mut evaluator = ctx.new_evaluator();
    let mut out = Vec::new();
    let yield_interval = ctx.config.scan_yield_interval;

    match &target.index {
        None => {
            let primary = table.primary_target();
            let (lo, hi) = resolve_range(&primary.key_fields, range, &mut evaluator)?;
            let storage = ctx.db.get_or_create_storage(&primary.storage_name)?;
            for (i, (key, value)) in storage.scan(ctx.tx, lo, hi)?.enumerate() {
                if yield_interval != 0 && i > 0 && i as u32 % yield_interval == 0 && ctx.is_cancelled() {
                    break;
                }
                out.push(row_from_primary_hit(table, &key, &value)?);
            }
        }
        Some(index_name) => {
            let secondary = table.secondary_target(index_name)?;
            let (lo, hi) = resolve_range(&secondary.key_fields, range, &mut evaluator)?;
            let storage = ctx.db.get_or_create_storage(&secondary.storage_name)?;
            for (i, (key, _value)) in storage.scan(ctx.tx, lo, hi)?.enumerate() {
                if yield_interval != 0 && i > 0 && i as u32 % yield_interval == 0 && ctx.is_cancelled() {
                    break;
                }
                if let Some(row) = row_from_secondary_hit(ctx, table, &secondary, &key)? {
                    out.push(row);
                }
            }
        }
    }
    Ok(out)
}

/// Walks a key range, materializing every matching row up front. The
/// range is fixed before the first row is pulled (no input row to close
/// over), so there is nothing to stream on `open` — `next` just drains
/// the buffer.
pub struct ScanExec {
    target: TableTarget,
    range: Range,
    buffer: VecDeque<Row>,
}

impl ScanExec {
    pub fn new(target: TableTarget, range: Range) -> Self {
        Self { target, range, buffer: VecDeque::new() }
    }
}

impl Executor for ScanExec {
    fn open(&mut self, ctx: &ExecutionContext) -> DbResult<()> {
        let table = resolve_table(ctx, &self.target)?;
        self.buffer = materialize_scan(ctx, &table, &self.target, &self.range)?.into();
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

/// Point lookup (`find`): an exact-key equivalent of a
/// single-point `Scan` that skips cursor setup when the target is the
/// primary storage.
pub struct FindExec {
    target: TableTarget,
    key: Vec<Expr>,
    result: Option<Row>,
    done: bool,
}

impl FindExec {
    pub fn new(target: TableTarget, key: Vec<Expr>) -> Self {
        Self { target, key, result: None, done: false }
    }
}

impl Executor for FindExec {
    fn open(&mut self, ctx: &ExecutionContext) -> DbResult<()> {
        let table = resolve_table(ctx, &self.target)?;
        let mut evaluator = ctx.new_evaluator();
        let values: Vec<Any> = self
            .key
            .iter()
            .map(|e| evaluator.eval(e, &[]))
            .collect::<DbResult<_>>()?;

        self.result = match &self.target.index {
            None => {
                let primary = table.primary_target();
                let key_bytes = encode_key_tuple(&primary.key_fields, &values);
                let storage = ctx.db.get_or_create_storage(&primary.storage_name)?;
                match storage.get(ctx.tx, &key_bytes)? {
                    Some(value_bytes) => Some(row_from_primary_hit(&table, &key_bytes, &value_bytes)?),
                    None => None,
                }
            }
            Some(index_name) => {
                let secondary = table.secondary_target(index_name)?;
                let key_bytes = encode_key_tuple(&secondary.key_fields[..values.len()], &values);
                let storage = ctx.db.get_or_create_storage(&secondary.storage_name)?;
                let (lo, hi) = prefix_range(key_bytes);
                let mut hit = None;
                for (key, _value) in storage.scan(ctx.tx, lo, hi)? {
                    if let Some(row) = row_from_secondary_hit(ctx, &table, &secondary, &key)? {
                        hit = Some(row);
                        break;
                    }
                }
                hit
            }
        };
        Ok(())
    }

    fn next(&mut self, _ctx: &ExecutionContext) -> DbResult<Option<Row>> {
        if self.done {
            return Ok(None);
        }
        self.done = true;
        Ok(self.result.take())
    }

    fn close(&mut self, _ctx: &ExecutionContext) -> DbResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog::{Catalog, Column, IndexKind};
    use common::{Config, RequestStats, TableId, WriteKind};
    use kvs::{InMemoryDatabase, TransactionMode};
    use plan::VariableTable;
    use scheduler::{CancellationToken, RequestDetail, RequestKind, Scheduler};
    use types::{FieldType, LengthDetail, OwnedValue};
    use write::WriteEngine;

    fn setup() -> (Catalog, TableId, InMemoryDatabase) {
        let mut catalog = Catalog::new();
        let table_id = catalog
            .create_table(
                "widgets",
                vec![
                    Column::new("id", FieldType::Int4, false),
                    Column::new(
                        "name",
                        FieldType::Character(LengthDetail { length: 32, varying: true }),
                        true,
                    ),
                ],
                vec![0],
            )
            .unwrap();
        catalog
            .create_index("widgets", "idx_name", &["name"], IndexKind::BTree, false)
            .unwrap();
        (catalog, table_id, InMemoryDatabase::new())
    }

    fn insert(catalog: &Catalog, table_id: TableId, db: &InMemoryDatabase, id: i32, name: &str) {
        let table = catalog.table_by_id(table_id).unwrap();
        let tx = db.begin_transaction(TransactionMode::short(false)).unwrap();
        let write = WriteEngine::default();
        let row = Row::new(vec![OwnedValue::Int4(id), OwnedValue::Character(name.to_string())]);
        write::process_record(&db, tx.as_ref(), &write, table, WriteKind::Insert, &row).unwrap();
        tx.commit().unwrap();
    }

    fn run_scan(catalog: &Catalog, db: &InMemoryDatabase, target: TableTarget) -> Vec<Row> {
        let tx = db.begin_transaction(TransactionMode::short(true)).unwrap();
        let write = WriteEngine::default();
        let params = VariableTable::new(vec![]);
        let config = Config::builder().build();
        let stats = RequestStats::default();
        let functions = crate::TableFunctionRegistry::new();
        let scheduler = Scheduler::new(config.clone());
        let request = RequestDetail::new(RequestKind::ExecuteStatement);
        let cancellation = CancellationToken::new();
        let ctx = ExecutionContext {
            catalog,
            db: &db,
            tx: tx.as_ref(),
            write: &write,
            params: &params,
            config: &config,
            stats: &stats,
            functions: &functions,
            scheduler: &scheduler,
            request: &request,
            cancellation: &cancellation,
        };
        let mut exec = ScanExec::new(target, Range::all());
        let rows = crate::run_to_completion(&mut exec, &ctx).unwrap();
        tx.abort().unwrap();
        rows
    }

    #[test]
    fn scan_over_primary_returns_every_row() {
        let (catalog, table_id, db) = setup();
        insert(&catalog, table_id, &db, 1, "a");
        insert(&catalog, table_id, &db, 2, "b");
        let rows = run_scan(&catalog, &db, TableTarget::primary(table_id));
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn scan_over_secondary_resolves_full_row() {
        let (catalog, table_id, db) = setup();
        insert(&catalog, table_id, &db, 1, "a");
        let rows = run_scan(&catalog, &db, TableTarget::secondary(table_id, "idx_name"));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].values[0], OwnedValue::Int4(1));
    }

    #[test]
    fn find_on_primary_is_a_point_lookup() {
        let (catalog, table_id, db) = setup();
        insert(&catalog, table_id, &db, 7, "x");
        let tx = db.begin_transaction(TransactionMode::short(true)).unwrap();
        let write = WriteEngine::default();
        let params = VariableTable::new(vec![]);
        let config = Config::builder().build();
        let stats = RequestStats::default();
        let functions = crate::TableFunctionRegistry::new();
        let scheduler = Scheduler::new(config.clone());
        let request = RequestDetail::new(RequestKind::ExecuteStatement);
        let cancellation = CancellationToken::new();
        let ctx = ExecutionContext {
            catalog: &catalog,
            db: &db,
            tx: tx.as_ref(),
            write: &write,
            params: &params,
            config: &config,
            stats: &stats,
            functions: &functions,
            scheduler: &scheduler,
            request: &request,
            cancellation: &cancellation,
        };
        let mut exec = FindExec::new(
            TableTarget::primary(table_id),
            vec![Expr::lit(expr::LiteralValue::Int4(7))],
        );
        let rows = crate::run_to_completion(&mut exec, &ctx).unwrap();
        tx.abort().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].values[1], OwnedValue::Character("x".into()));
    }
}
