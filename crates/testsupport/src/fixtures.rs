//! Shared fixtures for cross-crate tests: catalog builders, row
//! constructors, and an in-memory-KVS-backed [`engine::Engine`] harness, so
//! each test only has to describe the scenario it actually exercises.

use std::sync::Arc;

use catalog::{Catalog, Column, IndexKind};
use common::{Config, Row, TableId};
use engine::Engine;
use kvs::{Transaction, TransactionMode};
use types::{FieldType, LengthDetail, OwnedValue};

/// A `VARCHAR(len)` column type, the shape most fixture tables use.
pub fn varchar(len: u32) -> FieldType {
    FieldType::Character(LengthDetail {
        length: len,
        varying: true,
    })
}

/// `users(id INT PRIMARY KEY, name VARCHAR(64))`, the shape most scan/
/// filter/project tests build on.
pub fn users_catalog() -> (Catalog, TableId) {
    let mut catalog = Catalog::new();
    let table_id = catalog
        .create_table(
            "users",
            vec![
                Column::new("id", FieldType::Int4, false),
                Column::new("name", varchar(64), true),
            ],
            vec![0],
        )
        .unwrap();
    (catalog, table_id)
}

/// `widgets(c0 INT PRIMARY KEY, c1 INT)` with a non-unique secondary index
/// on `c1` — the table shape used for testing upsert-into-secondary
/// behavior.
pub fn widgets_with_secondary_catalog() -> (Catalog, TableId) {
    let mut catalog = Catalog::new();
    let table_id = catalog
        .create_table(
            "widgets",
            vec![
                Column::new("c0", FieldType::Int4, false),
                Column::new("c1", FieldType::Int4, true),
            ],
            vec![0],
        )
        .unwrap();
    catalog
        .create_index("widgets", "idx_c1", &["c1"], IndexKind::BTree, false)
        .unwrap();
    (catalog, table_id)
}

/// Two independent single-PK tables with no relationship declared in the
/// catalog, for tests that join them by an expression at plan-construction
/// time rather than through a declared foreign key.
pub fn left_right_catalog() -> (Catalog, TableId, TableId) {
    let mut catalog = Catalog::new();
    let left = catalog
        .create_table(
            "left_t",
            vec![
                Column::new("c0", FieldType::Int4, false),
                Column::new("c1", FieldType::Int4, true),
            ],
            vec![0],
        )
        .unwrap();
    let right = catalog
        .create_table(
            "right_t",
            vec![
                Column::new("c0", FieldType::Int4, false),
                Column::new("c1", FieldType::Int4, true),
            ],
            vec![0],
        )
        .unwrap();
    (catalog, left, right)
}

/// Builds a row from integer values, the shorthand most join/scan tests
/// reach for.
pub fn int_row(values: &[i32]) -> Row {
    Row::new(values.iter().map(|&v| OwnedValue::Int4(v)).collect())
}

/// Builds a row whose first column is an int and the rest are text.
pub fn id_name_row(id: i32, name: &str) -> Row {
    Row::new(vec![OwnedValue::Int4(id), OwnedValue::Character(name.to_string())])
}

/// Spins up an [`Engine`] over the in-memory reference KVS. The
/// production adapter lives outside this workspace — the in-memory
/// database is the reference good enough to drive every testable
/// property end-to-end.
pub fn engine_with_catalog(catalog: Catalog) -> Engine {
    Engine::with_memory_kvs(catalog, Config::builder().build())
}

/// An [`Engine`] plus an already-open short (OCC) read/write transaction,
/// the default shape most tests want.
pub fn engine_with_short_tx(catalog: Catalog) -> (Engine, Arc<dyn Transaction>) {
    let engine = engine_with_catalog(catalog);
    let tx = engine
        .begin_transaction(TransactionMode::short(false))
        .unwrap();
    (engine, tx)
}
