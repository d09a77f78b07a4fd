//! The primary+secondary write pipeline: `process_record` (insert /
//! insert_skip / insert_overwrite), `update`, `delete`, and row
//! materialization from write-tuple columns with default value policies.
//!
//! A lost race on `try_insert_on_upserting_secondary` reconciles against
//! the current row re-read after the failed insert, rather than the
//! pre-image the caller started with (see DESIGN.md).

pub mod codec;
pub mod function;
pub mod sequence;

use std::sync::Arc;

use catalog::{ColumnDefault, PrimaryTarget, SecondaryTarget, TableMeta};
use common::{DbError, DbResult, Row, WriteKind};
use kvs::{Database, PutOption, Transaction};
use types::{Any, OwnedValue};

pub use function::{FunctionRegistry, FunctionSource};
pub use sequence::{InMemorySequenceManager, SequenceSource};

/// Per-request write collaborators. One `WriteEngine` is shared by every
/// `write_new`/`write_existing` task of a request: per-table index
/// metadata and the sequence/function sources are read-only or internally
/// synchronized, so sharing is safe across worker threads.
pub struct WriteEngine {
    pub sequences: Arc<dyn SequenceSource>,
    pub functions: Arc<dyn FunctionSource>,
    /// Config option `try_insert_on_upserting_secondary`: attempt a
    /// create-only primary `put` before reconciling secondaries
    /// on an `insert_overwrite` with secondaries present.
    pub try_insert_on_upserting_secondary: bool,
}

impl WriteEngine {
    pub fn new(sequences: Arc<dyn SequenceSource>, functions: Arc<dyn FunctionSource>) -> Self {
        Self {
            sequences,
            functions,
            try_insert_on_upserting_secondary: true,
        }
    }
}

impl Default for WriteEngine {
    fn default() -> Self {
        Self::new(
            Arc::new(InMemorySequenceManager::new()),
            Arc::new(FunctionRegistry::new()),
        )
    }
}

/// Per-request write statistics: the counters a caller sees after a
/// request completes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteOutcome {
    pub inserted: u64,
    pub merged: u64,
    pub deleted: u64,
    pub skipped: u64,
}

impl WriteOutcome {
    fn inserted() -> Self {
        Self { inserted: 1, ..Default::default() }
    }
    fn merged() -> Self {
        Self { merged: 1, ..Default::default() }
    }
    fn deleted() -> Self {
        Self { deleted: 1, ..Default::default() }
    }
    fn skipped() -> Self {
        Self { skipped: 1, ..Default::default() }
    }
}

/// Materializes a full schema-ordered [`Row`] for a `WriteNew` tuple.
/// `tuple[i]` is `Some(value)` when the statement
/// supplied a (already assignment-converted) value for column `i`, `None`
/// when it was omitted and the column's [`ColumnDefault`] policy applies.
pub fn materialize_row(table: &TableMeta, tuple: &[Option<Any>], write: &WriteEngine) -> DbResult<Row> {
    let mut values = Vec::with_capacity(table.schema.columns.len());
    for (ordinal, column) in table.schema.columns.iter().enumerate() {
        let provided = tuple.get(ordinal).cloned().flatten();
        let value = match provided {
            Some(any) => OwnedValue::from_any(&any).ok_or_else(|| {
                DbError::Constraint(format!(
                    "column '{}' evaluated to a non-storable value",
                    column.name
                ))
            })?,
            None => default_value(column, write)?,
        };
        values.push(value);
    }
    Ok(Row::new(values))
}

fn default_value(column: &catalog::Column, write: &WriteEngine) -> DbResult<OwnedValue> {
    match &column.default {
        ColumnDefault::Nothing => {
            if column.nullable {
                Ok(OwnedValue::Null)
            } else {
                Err(DbError::NotNullConstraintViolation(format!(
                    "column '{}' is not nullable and no value was supplied",
                    column.name
                )))
            }
        }
        ColumnDefault::Immediate(value) => Ok(value.clone()),
        ColumnDefault::Sequence(id) => write.sequences.next(*id).map(OwnedValue::Int8),
        ColumnDefault::Function(id) => write.functions.call(*id),
    }
}

fn put_secondary(
    db: &dyn Database,
    tx: &dyn Transaction,
    target: &SecondaryTarget,
    encoded_pk: &[u8],
    row: &Row,
) -> DbResult<()> {
    let storage = db.get_or_create_storage(&target.storage_name)?;
    let key = codec::encode_secondary_key(target, row);
    let value = codec::encode_secondary_value(target, encoded_pk);
    storage.put(tx, &key, &value, PutOption::CreateOrUpdate)
}

/// Reconciles secondaries before an upsert's primary write lands.
/// Always places the new secondary entry; additionally removes the old
/// one when `primary_already_exists` and the old and new secondary key
/// images disagree.
fn update_secondaries_before_upsert(
    db: &dyn Database,
    tx: &dyn Transaction,
    table: &TableMeta,
    primary_target: &PrimaryTarget,
    secondary_targets: &[SecondaryTarget],
    encoded_pk: &[u8],
    new_row: &Row,
    primary_already_exists: bool,
) -> DbResult<()> {
    if primary_already_exists {
        let primary_storage = db.get_or_create_storage(&primary_target.storage_name)?;
        if let Some(old_value_bytes) = primary_storage.get(tx, encoded_pk)? {
            let old_row = codec::decode_full_row(table, encoded_pk, &old_value_bytes)?;
            for target in secondary_targets {
                let new_key = codec::encode_secondary_key(target, new_row);
                let old_key = codec::encode_secondary_key(target, &old_row);
                if new_key != old_key {
                    let storage = db.get_or_create_storage(&target.storage_name)?;
                    storage.remove(tx, &old_key)?;
                }
            }
        }
    }
    for target in secondary_targets {
        put_secondary(db, tx, target, encoded_pk, new_row)?;
    }
    Ok(())
}

/// Takes one already-materialized row and writes it against the primary index and
/// every secondary index of `table`, per `kind`.
#[tracing::instrument(level = "debug", skip(db, tx, write, row), fields(table = %table.name))]
pub fn process_record(
    db: &dyn Database,
    tx: &dyn Transaction,
    write: &WriteEngine,
    table: &TableMeta,
    kind: WriteKind,
    row: &Row,
) -> DbResult<WriteOutcome> {
    let primary_target = table.primary_target();
    let secondary_targets = table.secondary_targets()?;
    let primary_storage = db.get_or_create_storage(&primary_target.storage_name)?;
    let encoded_pk = codec::encode_primary_key(&primary_target, row);
    let value_bytes = codec::encode_primary_value(&primary_target, row)?;

    if kind == WriteKind::InsertOverwrite && !secondary_targets.is_empty() {
        let primary_already_exists = if write.try_insert_on_upserting_secondary {
            match primary_storage.put(tx, &encoded_pk, &value_bytes, PutOption::Create) {
                Ok(()) => false,
                Err(DbError::UniqueConstraintViolation(_)) => true,
                Err(err) => return Err(err),
            }
        } else {
            primary_storage.get(tx, &encoded_pk)?.is_some()
        };
        update_secondaries_before_upsert(
            db,
            tx,
            table,
            &primary_target,
            &secondary_targets,
            &encoded_pk,
            row,
            primary_already_exists,
        )?;
        if !primary_already_exists {
            // Fresh row: the try-insert above already wrote the primary
            // entry and the secondaries are in place.
            return Ok(WriteOutcome::inserted());
        }
        // Existing row: primary was not written by the try-insert (or we
        // never attempted it); overwrite it below with create_or_update.
        primary_storage.put(tx, &encoded_pk, &value_bytes, PutOption::CreateOrUpdate)?;
        return Ok(WriteOutcome::merged());
    }

    let put_option = match kind {
        WriteKind::Insert | WriteKind::InsertSkip => PutOption::Create,
        _ => PutOption::CreateOrUpdate,
    };
    match primary_storage.put(tx, &encoded_pk, &value_bytes, put_option) {
        Ok(()) => {}
        Err(DbError::UniqueConstraintViolation(msg)) => {
            return match kind {
                WriteKind::Insert => Err(DbError::UniqueConstraintViolation(msg)),
                WriteKind::InsertSkip => Ok(WriteOutcome::skipped()),
                _ => Err(DbError::UniqueConstraintViolation(msg)),
            };
        }
        Err(err) => return Err(err),
    }

    if kind == WriteKind::InsertOverwrite {
        // No secondaries: nothing further to synchronize.
        return Ok(WriteOutcome::merged());
    }

    for target in &secondary_targets {
        put_secondary(db, tx, target, &encoded_pk, row)?;
    }
    Ok(WriteOutcome::inserted())
}

/// Applies an UPDATE to a row already read from `table` (the
/// `write_existing` operator). `old_row` is the full schema row the input
/// operator produced; `new_row` is `old_row` with the statement's
/// assignments already folded in. Re-keys secondaries whose image changed,
/// and re-keys the primary itself if the update touched a primary-key
/// column.
#[tracing::instrument(level = "debug", skip(db, tx, old_row, new_row), fields(table = %table.name))]
pub fn update_record(
    db: &dyn Database,
    tx: &dyn Transaction,
    table: &TableMeta,
    old_row: &Row,
    new_row: &Row,
) -> DbResult<WriteOutcome> {
    let primary_target = table.primary_target();
    let secondary_targets = table.secondary_targets()?;
    let primary_storage = db.get_or_create_storage(&primary_target.storage_name)?;

    let old_pk = codec::encode_primary_key(&primary_target, old_row);
    let new_pk = codec::encode_primary_key(&primary_target, new_row);

    for target in &secondary_targets {
        let new_key = codec::encode_secondary_key(target, new_row);
        let old_key = codec::encode_secondary_key(target, old_row);
        if new_key != old_key {
            let storage = db.get_or_create_storage(&target.storage_name)?;
            storage.remove(tx, &old_key)?;
        }
    }

    if old_pk != new_pk {
        primary_storage.remove(tx, &old_pk)?;
    }
    let value_bytes = codec::encode_primary_value(&primary_target, new_row)?;
    primary_storage.put(tx, &new_pk, &value_bytes, PutOption::CreateOrUpdate)?;

    for target in &secondary_targets {
        put_secondary(db, tx, target, &new_pk, new_row)?;
    }
    Ok(WriteOutcome::merged())
}

/// Deletes the row `row` (already read from `table`) from the primary
/// index and every secondary index.
#[tracing::instrument(level = "debug", skip(db, tx, row), fields(table = %table.name))]
pub fn delete_record(
    db: &dyn Database,
    tx: &dyn Transaction,
    table: &TableMeta,
    row: &Row,
) -> DbResult<WriteOutcome> {
    let primary_target = table.primary_target();
    let secondary_targets = table.secondary_targets()?;
    let primary_storage = db.get_or_create_storage(&primary_target.storage_name)?;
    let pk = codec::encode_primary_key(&primary_target, row);
    primary_storage.remove(tx, &pk)?;
    for target in &secondary_targets {
        let storage = db.get_or_create_storage(&target.storage_name)?;
        let key = codec::encode_secondary_key(target, row);
        storage.remove(tx, &key)?;
    }
    Ok(WriteOutcome::deleted())
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog::{Catalog, Column, IndexKind};
    use kvs::{InMemoryDatabase, TransactionMode};
    use types::FieldType as FT;

    fn setup() -> (InMemoryDatabase, Catalog, TableMeta) {
        let db = InMemoryDatabase::new();
        let mut catalog = Catalog::new();
        let id = catalog
            .create_table(
                "t",
                vec![
                    Column::new("c0", FT::Int4, false),
                    Column::new("c1", FT::Int4, true),
                ],
                vec![0],
            )
            .unwrap();
        db.get_or_create_storage("t.primary").unwrap();
        let table = catalog.table_by_id(id).unwrap().clone();
        (db, catalog, table)
    }

    fn row(c0: i32, c1: i32) -> Row {
        Row::new(vec![OwnedValue::Int4(c0), OwnedValue::Int4(c1)])
    }

    #[test]
    fn insert_then_duplicate_insert_fails() {
        let (db, _catalog, table) = setup();
        let write = WriteEngine::default();
        let tx = db.begin_transaction(TransactionMode::short(false)).unwrap();
        let outcome = process_record(&db, &*tx, &write, &table, WriteKind::Insert, &row(1, 1)).unwrap();
        assert_eq!(outcome, WriteOutcome::inserted());
        let err = process_record(&db, &*tx, &write, &table, WriteKind::Insert, &row(1, 2)).unwrap_err();
        assert!(matches!(err, DbError::UniqueConstraintViolation(_)));
    }

    #[test]
    fn insert_skip_is_silent_on_duplicate() {
        let (db, _catalog, table) = setup();
        let write = WriteEngine::default();
        let tx = db.begin_transaction(TransactionMode::short(false)).unwrap();
        process_record(&db, &*tx, &write, &table, WriteKind::Insert, &row(1, 1)).unwrap();
        let outcome =
            process_record(&db, &*tx, &write, &table, WriteKind::InsertSkip, &row(1, 99)).unwrap();
        assert_eq!(outcome, WriteOutcome::skipped());
    }

    #[test]
    fn upsert_with_secondary_repoints_index() {
        let (db, mut catalog, _table) = setup();
        catalog
            .create_index("t", "by_c1", &["c1"], IndexKind::BTree, false)
            .unwrap();
        let table = catalog.table_by_id(common::TableId(1)).unwrap().clone();
        db.get_or_create_storage("t.by_c1").unwrap();
        let write = WriteEngine::default();
        let tx = db.begin_transaction(TransactionMode::short(false)).unwrap();

        process_record(&db, &*tx, &write, &table, WriteKind::Insert, &row(1, 10)).unwrap();
        let outcome =
            process_record(&db, &*tx, &write, &table, WriteKind::InsertOverwrite, &row(1, 20)).unwrap();
        assert_eq!(outcome, WriteOutcome::merged());

        let secondary = table.secondary_target("by_c1").unwrap();
        let storage = db.get_or_create_storage("t.by_c1").unwrap();
        let old_key = codec::encode_secondary_key(&secondary, &row(1, 10));
        let new_key = codec::encode_secondary_key(&secondary, &row(1, 20));
        assert_eq!(storage.get(&*tx, &old_key).unwrap(), None);
        assert!(storage.get(&*tx, &new_key).unwrap().is_some());

        let primary = table.primary_target();
        let primary_storage = db.get_or_create_storage("t.primary").unwrap();
        let pk = codec::encode_primary_key(&primary, &row(1, 20));
        let decoded = codec::decode_full_row(&table, &pk, &primary_storage.get(&*tx, &pk).unwrap().unwrap()).unwrap();
        assert_eq!(decoded, row(1, 20));
    }

    #[test]
    fn upsert_without_prior_row_inserts() {
        let (db, _catalog, table) = setup();
        let write = WriteEngine::default();
        let tx = db.begin_transaction(TransactionMode::short(false)).unwrap();
        let outcome =
            process_record(&db, &*tx, &write, &table, WriteKind::InsertOverwrite, &row(5, 5)).unwrap();
        assert_eq!(outcome, WriteOutcome::inserted());
    }

    #[test]
    fn delete_then_reinsert_succeeds() {
        let (db, _catalog, table) = setup();
        let write = WriteEngine::default();
        let tx = db.begin_transaction(TransactionMode::short(false)).unwrap();
        process_record(&db, &*tx, &write, &table, WriteKind::Insert, &row(1, 1)).unwrap();
        delete_record(&db, &*tx, &table, &row(1, 1)).unwrap();
        let outcome = process_record(&db, &*tx, &write, &table, WriteKind::Insert, &row(1, 2)).unwrap();
        assert_eq!(outcome, WriteOutcome::inserted());
    }

    #[test]
    fn not_nullable_column_without_default_errors() {
        let (_db, _catalog, table) = setup();
        let write = WriteEngine::default();
        let row = materialize_row(&table, &[Some(Any::Int4(1))], &write).unwrap_err();
        assert!(matches!(row, DbError::NotNullConstraintViolation(_)));
    }

    #[test]
    fn sequence_default_fills_omitted_column() {
        let mut catalog = Catalog::new();
        let id = catalog
            .create_table(
                "seqd",
                vec![
                    Column::new("id", FT::Int8, false)
                        .with_default(catalog::ColumnDefault::Sequence(common::SequenceId(1))),
                    Column::new("v", FT::Int4, true),
                ],
                vec![0],
            )
            .unwrap();
        let table = catalog.table_by_id(id).unwrap().clone();
        let write = WriteEngine::default();
        let row = materialize_row(&table, &[None, Some(Any::Int4(7))], &write).unwrap();
        assert_eq!(row.values[0], OwnedValue::Int8(1));
        assert_eq!(row.values[1], OwnedValue::Int4(7));
    }
}
