//! Positional row representation backed by `types::OwnedValue`.

use serde::{Deserialize, Serialize};
use types::OwnedValue;

/// Examples:
/// - `Row::new(vec![OwnedValue::Int4(1)])`
/// - `Row::new(vec![OwnedValue::Character("alice".into()), OwnedValue::Boolean(true)])`
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq)]
pub struct Row {
    pub values: Vec<OwnedValue>,
}

impl Row {
    pub fn new(values: Vec<OwnedValue>) -> Self {
        Self { values }
    }

    pub fn into_values(self) -> Vec<OwnedValue> {
        self.values
    }

    pub fn get(&self, col: usize) -> Option<&OwnedValue> {
        self.values.get(col)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl From<Vec<OwnedValue>> for Row {
    fn from(values: Vec<OwnedValue>) -> Self {
        Row::new(values)
    }
}

/// Rectangular result set carrying column labels and rows.
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct RecordBatch {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}
