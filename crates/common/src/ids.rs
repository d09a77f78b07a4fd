//! Small newtype identifiers shared across crates.

use serde::{Deserialize, Serialize};

/// Identifier for a column within a table schema.
pub type ColumnId = u16;

/// Logical identifier for a table registered in the catalog.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableId(pub u64);

/// Logical identifier for an index registered in the catalog.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexId(pub u64);

/// Identifier for a transaction, assigned by the `kvs` layer at
/// `begin_transaction` time.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionId(pub String);

/// Identifier for a sequence definition (`def_id`), resolved by a
/// `SequenceManager`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SequenceId(pub u64);

/// Identifier for a bound nullary function (e.g. `current_timestamp`)
/// resolved through a request's function context.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FunctionId(pub u64);

impl std::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
