//! Row-to-bytes conversion for the primary and secondary storages.
//! Keys use `types::coding`'s order-preserving encoding
//! so a plain byte-range scan doubles as an index scan; values use
//! `bincode` since nothing ever orders by a value's bytes.

use catalog::{PrimaryTarget, SecondaryTarget, TableMeta};
use common::{ColumnId, DbError, DbResult, Row};
use record::FieldInfo;
use types::coding::{self, Direction};
use types::{Any, FieldType, OwnedValue};

fn field_triple(field: &FieldInfo) -> (FieldType, bool, Direction) {
    (field.ty.clone(), field.nullable, field.direction)
}

fn row_values(columns: &[ColumnId], row: &Row) -> Vec<Any> {
    columns
        .iter()
        .map(|&c| {
            row.get(c as usize)
                .map(|v| v.to_any())
                .unwrap_or(Any::Null)
        })
        .collect()
}

fn bincode_config() -> bincode::config::Configuration {
    bincode::config::standard()
}

pub fn encode_primary_key(target: &PrimaryTarget, row: &Row) -> Vec<u8> {
    let triples: Vec<_> = target.key_fields.iter().map(field_triple).collect();
    coding::encode_fields(&triples, &row_values(&target.key_columns, row))
}

pub fn encode_primary_value(target: &PrimaryTarget, row: &Row) -> DbResult<Vec<u8>> {
    let values: Vec<OwnedValue> = target
        .value_columns
        .iter()
        .map(|&c| row.get(c as usize).cloned().unwrap_or(OwnedValue::Null))
        .collect();
    bincode::serde::encode_to_vec(&values, bincode_config())
        .map_err(|err| DbError::Kvs(format!("encoding primary value: {err}")))
}

fn decode_primary_value(target: &PrimaryTarget, bytes: &[u8]) -> DbResult<Vec<OwnedValue>> {
    let (values, _): (Vec<OwnedValue>, usize) =
        bincode::serde::decode_from_slice(bytes, bincode_config())
            .map_err(|err| DbError::Kvs(format!("decoding primary value: {err}")))?;
    Ok(values)
}

pub fn encode_secondary_key(target: &SecondaryTarget, row: &Row) -> Vec<u8> {
    let triples: Vec<_> = target.key_fields.iter().map(field_triple).collect();
    coding::encode_fields(&triples, &row_values(&target.key_columns, row))
}

/// The secondary storage's value: empty for a non-unique index, the
/// encoded primary key for a unique one (so a unique-secondary hit can be
/// turned back into a primary lookup without re-scanning).
pub fn encode_secondary_value(target: &SecondaryTarget, primary_key_bytes: &[u8]) -> Vec<u8> {
    if target.unique {
        primary_key_bytes.to_vec()
    } else {
        Vec::new()
    }
}

/// Reassembles the full schema-ordered row from a primary storage hit.
pub fn decode_full_row(table: &TableMeta, key_bytes: &[u8], value_bytes: &[u8]) -> DbResult<Row> {
    let primary = table.primary_target();
    let key_triples: Vec<_> = primary.key_fields.iter().map(field_triple).collect();
    let key_values = coding::decode_fields(&key_triples, key_bytes);
    let values = decode_primary_value(&primary, value_bytes)?;

    let mut full = vec![OwnedValue::Null; table.schema.columns.len()];
    for (&col, any) in primary.key_columns.iter().zip(key_values) {
        full[col as usize] = OwnedValue::from_any(&any).unwrap_or(OwnedValue::Null);
    }
    for (&col, value) in primary.value_columns.iter().zip(values) {
        full[col as usize] = value;
    }
    Ok(Row::new(full))
}
