//! Primary/secondary write targets: the field layout the write pipeline
//! needs to encode a key/value pair for a given storage.

use common::ColumnId;
use record::FieldInfo;

/// The primary storage target for a table: key fields are the primary key
/// columns in declaration order, value fields are every other column.
#[derive(Debug, Clone)]
pub struct PrimaryTarget {
    pub storage_name: String,
    pub key_columns: Vec<ColumnId>,
    pub value_columns: Vec<ColumnId>,
    pub key_fields: Vec<FieldInfo>,
    pub value_fields: Vec<FieldInfo>,
}

/// A secondary index's write target. The key is the index's own columns
/// followed by the primary key columns (so distinct rows with equal index
/// keys remain distinguishable); the value is empty for a non-unique index
/// and holds the encoded primary key for a unique one, matching how the
/// original engine looks up the owning row from a secondary hit.
#[derive(Debug, Clone)]
pub struct SecondaryTarget {
    pub storage_name: String,
    pub unique: bool,
    pub key_columns: Vec<ColumnId>,
    pub key_fields: Vec<FieldInfo>,
}
