//! Field kind tags and the `FieldType` tagged union.
//!
//! Mirrors the shape of a C++ `std::variant<std::monostate, ..., Option>`
//! keyed by kind: simple kinds carry no payload, complex kinds carry a
//! small `*Detail` struct. Rust lets us fold that into one enum instead of
//! an index into a variant of option pointers.

use serde::{Deserialize, Serialize};

/// Discriminant for [`FieldType`], independent of any carried detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldKind {
    Undefined,
    Boolean,
    Int1,
    Int2,
    Int4,
    Int8,
    Float4,
    Float8,
    Decimal,
    Character,
    Octet,
    Date,
    TimeOfDay,
    TimePoint,
    Blob,
    Clob,
}

/// Decimal precision/scale detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DecimalDetail {
    pub precision: u8,
    pub scale: i8,
}

/// Character/octet length detail. `varying = false` means fixed-length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LengthDetail {
    pub length: u32,
    pub varying: bool,
}

/// time_of_day / time_point timezone-awareness detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TemporalDetail {
    pub with_timezone: bool,
}

/// A field's static type: kind plus whatever detail that kind carries.
///
/// `reference_column_position` / `reference_column_name` / `pointer` from
/// the original kind set are internal-use-only in the C++ original and are
/// intentionally not represented here — callers never need them, and
/// leaving them out keeps `FieldType` a plain data type instead of a
/// pointer-carrying one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
    Undefined,
    Boolean,
    Int1,
    Int2,
    Int4,
    Int8,
    Float4,
    Float8,
    Decimal(DecimalDetail),
    Character(LengthDetail),
    Octet(LengthDetail),
    Date,
    TimeOfDay(TemporalDetail),
    TimePoint(TemporalDetail),
    Blob,
    Clob,
}

impl FieldType {
    pub fn kind(&self) -> FieldKind {
        match self {
            FieldType::Undefined => FieldKind::Undefined,
            FieldType::Boolean => FieldKind::Boolean,
            FieldType::Int1 => FieldKind::Int1,
            FieldType::Int2 => FieldKind::Int2,
            FieldType::Int4 => FieldKind::Int4,
            FieldType::Int8 => FieldKind::Int8,
            FieldType::Float4 => FieldKind::Float4,
            FieldType::Float8 => FieldKind::Float8,
            FieldType::Decimal(_) => FieldKind::Decimal,
            FieldType::Character(_) => FieldKind::Character,
            FieldType::Octet(_) => FieldKind::Octet,
            FieldType::Date => FieldKind::Date,
            FieldType::TimeOfDay(_) => FieldKind::TimeOfDay,
            FieldType::TimePoint(_) => FieldKind::TimePoint,
            FieldType::Blob => FieldKind::Blob,
            FieldType::Clob => FieldKind::Clob,
        }
    }

    /// Size in bytes of the runtime (in-memory, fixed-width) representation.
    /// Variable-length kinds (character/octet/blob/clob) store a handle,
    /// not inline bytes, so they report the handle size.
    pub fn runtime_size(&self) -> usize {
        match self.kind() {
            FieldKind::Undefined => 0,
            FieldKind::Boolean => 1,
            FieldKind::Int1 => 1,
            FieldKind::Int2 => 2,
            FieldKind::Int4 => 4,
            FieldKind::Int8 => 8,
            FieldKind::Float4 => 4,
            FieldKind::Float8 => 8,
            FieldKind::Decimal => 16 + 4,
            FieldKind::Character | FieldKind::Octet => 16,
            FieldKind::Date => 4,
            FieldKind::TimeOfDay => 8,
            FieldKind::TimePoint => 12,
            FieldKind::Blob | FieldKind::Clob => 16,
        }
    }

    pub fn runtime_alignment(&self) -> usize {
        match self.kind() {
            FieldKind::Undefined => 1,
            FieldKind::Boolean | FieldKind::Int1 => 1,
            FieldKind::Int2 => 2,
            FieldKind::Int4 | FieldKind::Float4 | FieldKind::Date => 4,
            FieldKind::Int8
            | FieldKind::Float8
            | FieldKind::TimeOfDay
            | FieldKind::TimePoint => 8,
            FieldKind::Decimal => 16,
            FieldKind::Character | FieldKind::Octet | FieldKind::Blob | FieldKind::Clob => 8,
        }
    }

    pub fn is_variable_length(&self) -> bool {
        matches!(
            self.kind(),
            FieldKind::Character | FieldKind::Octet | FieldKind::Blob | FieldKind::Clob
        )
    }
}
