//! Property-based test generators for the record/value runtime: random
//! [`OwnedValue`]s, [`Row`]s, and the [`FieldType`]s they correspond to.

use common::Row;
use proptest::prelude::*;
use types::{Decimal, FieldType, LengthDetail, OwnedValue};

/// Strategy for generating random `OwnedValue` instances across the
/// fixed-width kinds (temporal/decimal kinds included, character/octet
/// kept short so generated rows stay cheap to compare).
pub fn arb_owned_value() -> impl Strategy<Value = OwnedValue> {
    prop_oneof![
        Just(OwnedValue::Null),
        any::<bool>().prop_map(OwnedValue::Boolean),
        any::<i8>().prop_map(OwnedValue::Int1),
        any::<i16>().prop_map(OwnedValue::Int2),
        any::<i32>().prop_map(OwnedValue::Int4),
        any::<i64>().prop_map(OwnedValue::Int8),
        (-1e6f32..1e6f32).prop_map(OwnedValue::Float4),
        (-1e6f64..1e6f64).prop_map(OwnedValue::Float8),
        (any::<i64>(), -4i8..=4i8)
            .prop_map(|(c, scale)| OwnedValue::Decimal(Decimal::new(c as i128, scale))),
        "[a-zA-Z0-9 ]{0,16}".prop_map(OwnedValue::Character),
        prop::collection::vec(any::<u8>(), 0..16).prop_map(OwnedValue::Octet),
    ]
}

/// Strategy for generating a random [`FieldType`], independent of any
/// particular value.
pub fn arb_field_type() -> impl Strategy<Value = FieldType> {
    prop_oneof![
        Just(FieldType::Boolean),
        Just(FieldType::Int1),
        Just(FieldType::Int2),
        Just(FieldType::Int4),
        Just(FieldType::Int8),
        Just(FieldType::Float4),
        Just(FieldType::Float8),
        (1u32..64).prop_map(|length| FieldType::Character(LengthDetail {
            length,
            varying: true,
        })),
    ]
}

/// Strategy for generating a [`Row`] of 1-8 columns of random values.
pub fn arb_row() -> impl Strategy<Value = Row> {
    prop::collection::vec(arb_owned_value(), 1..8).prop_map(Row::new)
}

/// Strategy for generating a `Row` with a fixed number of columns, for
/// properties that need rows to line up with a specific schema width.
pub fn arb_row_with_len(len: usize) -> impl Strategy<Value = Row> {
    prop::collection::vec(arb_owned_value(), len).prop_map(Row::new)
}
