//! Shared helpers for resolving a [`plan::TableTarget`] against the KVS:
//! encoding scan ranges, and re-resolving a secondary-index hit back into
//! the table's full schema row: a secondary target is
//! re-resolved against the primary storage internally.

use catalog::{SecondaryTarget, TableMeta};
use common::{DbResult, Row};
use kvs::{Database, ScanBound, Transaction};
use record::FieldInfo;
use types::{coding, Any, Direction, FieldType, OwnedValue};
use write::codec;

use crate::ExecutionContext;

pub fn field_triples(fields: &[FieldInfo]) -> Vec<(FieldType, bool, Direction)> {
    fields
        .iter()
        .map(|f| (f.ty.clone(), f.nullable, f.direction))
        .collect()
}

/// Increments the last byte of `bytes` that is not already `0xFF`,
/// truncating everything after it and clearing the trailing run of
/// `0xFF` bytes to zero. Returns `None` if `bytes` is all `0xFF` (there is
/// no byte string greater than it with a bounded length), meaning the
/// caller's prefix range extends to the end of the keyspace.
pub fn increment_bytes(bytes: &[u8]) -> Option<Vec<u8>> {
    let mut out = bytes.to_vec();
    for i in (0..out.len()).rev() {
        if out[i] != 0xFF {
            out[i] += 1;
            out.truncate(i + 1);
            return Some(out);
        }
    }
    None
}

/// The `[lo, hi)` byte range covering every key whose encoded bytes start
/// with `prefix`.
pub fn prefix_range(prefix: Vec<u8>) -> (ScanBound, ScanBound) {
    let hi = match increment_bytes(&prefix) {
        Some(next) => ScanBound::Exclusive(next),
        None => ScanBound::Unbounded,
    };
    (ScanBound::Inclusive(prefix), hi)
}

/// Reassembles a table's full schema row from a primary-storage hit.
pub fn row_from_primary_hit(table: &TableMeta, key: &[u8], value: &[u8]) -> DbResult<Row> {
    codec::decode_full_row(table, key, value)
}

/// Reassembles a table's full schema row from a secondary-storage key by
/// decoding the secondary key's columns (which include the primary key,
/// per `catalog::TableMeta::secondary_target`), then looking that primary
/// key up. Returns `None` if the primary row is gone — a secondary entry
/// can outlive its owning row only transiently within a single write's
/// critical section, never across operator boundaries, but a defensive
/// reader tolerates it by skipping rather than erroring.
pub fn row_from_secondary_hit(
    ctx: &ExecutionContext,
    table: &TableMeta,
    secondary: &SecondaryTarget,
    key_bytes: &[u8],
) -> DbResult<Option<Row>> {
    let triples = field_triples(&secondary.key_fields);
    let values = coding::decode_fields(&triples, key_bytes);

    let mut partial = vec![OwnedValue::Null; table.schema.columns.len()];
    for (&col, any) in secondary.key_columns.iter().zip(values) {
        partial[col as usize] = OwnedValue::from_any(&any).unwrap_or(OwnedValue::Null);
    }
    let primary = table.primary_target();
    let pk_bytes = codec::encode_primary_key(&primary, &Row::new(partial));
    let storage = ctx.db.get_or_create_storage(&primary.storage_name)?;
    match storage.get(ctx.tx, &pk_bytes)? {
        Some(value_bytes) => Ok(Some(row_from_primary_hit(table, &pk_bytes, &value_bytes)?)),
        None => Ok(None),
    }
}

/// Encodes a positional key tuple (e.g. a `Find`'s `key: Vec<Expr>` or a
/// `JoinFind`'s `join_key`, already evaluated) against `key_fields`,
/// producing the same byte layout `encode_primary_key`/
/// `encode_secondary_key` would for a row carrying those values at the
/// corresponding key ordinals. The caller supplies values in key-column
/// order already, so no column repositioning is needed.
pub fn encode_key_tuple(key_fields: &[FieldInfo], values: &[Any]) -> Vec<u8> {
    let triples = field_triples(key_fields);
    coding::encode_fields(&triples, values)
}
