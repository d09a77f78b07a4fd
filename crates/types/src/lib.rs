//! Field kinds, the dynamic `Any` value, and order-preserving KVS coding.
//!
//! This crate has no knowledge of rows, tables, or transactions — it only
//! defines what a single value *is* and how it compares, converts, and
//! encodes. Everything above (record layout, catalog, evaluator) builds on
//! top of it.

pub mod coding;
pub mod kind;
pub mod value;

pub use coding::Direction;
pub use kind::{DecimalDetail, FieldKind, FieldType, LengthDetail, TemporalDetail};
pub use value::{Any, Decimal, EvalError, EvalErrorKind, OwnedValue};
