//! A handle to one row's bytes inside an `Arena`, read/written through a
//! `RecordMeta` layout.

use common::Arena;
use std::sync::Arc;
use types::{Any, Decimal, FieldType};

use crate::record_meta::RecordMeta;

/// In debug builds this carries an identity tag for the arena it was
/// created from, so a `RowRef` accidentally used against the wrong arena
/// panics loudly instead of reading garbage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowRef {
    offset: usize,
    #[cfg(debug_assertions)]
    arena_tag: usize,
}

fn arena_tag(arena: &Arena) -> usize {
    arena as *const Arena as usize
}

impl RowRef {
    pub fn allocate(arena: &mut Arena, meta: &RecordMeta) -> Self {
        let offset = arena.allocate_zeroed(meta.record_size());
        Self {
            offset,
            #[cfg(debug_assertions)]
            arena_tag: arena_tag(arena),
        }
    }

    #[cfg(debug_assertions)]
    fn check(&self, arena: &Arena) {
        assert_eq!(
            self.arena_tag,
            arena_tag(arena),
            "RowRef used against the wrong arena"
        );
    }

    #[cfg(not(debug_assertions))]
    fn check(&self, _arena: &Arena) {}

    pub fn is_null(&self, arena: &Arena, meta: &RecordMeta, field: usize) -> bool {
        self.check(arena);
        match meta.nullity_bit(field) {
            None => false,
            Some(bit) => {
                let byte = arena.get(self.offset, meta.nullity_bitmap_bytes())[bit / 8];
                (byte >> (bit % 8)) & 1 == 1
            }
        }
    }

    fn set_null_bit(&self, arena: &mut Arena, meta: &RecordMeta, field: usize, null: bool) {
        if let Some(bit) = meta.nullity_bit(field) {
            let bitmap = arena.get_mut(self.offset, meta.nullity_bitmap_bytes());
            if null {
                bitmap[bit / 8] |= 1 << (bit % 8);
            } else {
                bitmap[bit / 8] &= !(1 << (bit % 8));
            }
        }
    }

    pub fn read(&self, arena: &Arena, meta: &RecordMeta, field: usize) -> Any {
        self.check(arena);
        if self.is_null(arena, meta, field) {
            return Any::Null;
        }
        let value_offset = self.offset + meta.value_offset(field);
        let ty = meta.field_type(field);
        let size = ty.runtime_size();
        let bytes = arena.get(value_offset, size);
        decode_fixed(arena, ty, bytes)
    }

    pub fn write(&self, arena: &mut Arena, meta: &RecordMeta, field: usize, value: &Any) {
        self.check(arena);
        if matches!(value, Any::Null) {
            self.set_null_bit(arena, meta, field, true);
            return;
        }
        self.set_null_bit(arena, meta, field, false);
        let ty = meta.field_type(field).clone();
        let encoded = encode_fixed(arena, &ty, value);
        let value_offset = self.offset + meta.value_offset(field);
        let slot = arena.get_mut(value_offset, encoded.len());
        slot.copy_from_slice(&encoded);
    }
}

fn encode_fixed(arena: &mut Arena, ty: &FieldType, value: &Any) -> Vec<u8> {
    match (ty, value) {
        (FieldType::Boolean, Any::Boolean(b)) => vec![if *b { 1 } else { 0 }],
        (FieldType::Int1, Any::Int1(v)) => v.to_le_bytes().to_vec(),
        (FieldType::Int2, Any::Int2(v)) => v.to_le_bytes().to_vec(),
        (FieldType::Int4, Any::Int4(v)) => v.to_le_bytes().to_vec(),
        (FieldType::Int8, Any::Int8(v)) => v.to_le_bytes().to_vec(),
        (FieldType::Float4, Any::Float4(v)) => v.to_le_bytes().to_vec(),
        (FieldType::Float8, Any::Float8(v)) => v.to_le_bytes().to_vec(),
        (FieldType::Decimal(_), Any::Decimal(d)) => {
            let mut out = Vec::with_capacity(20);
            out.extend_from_slice(&d.coefficient.to_le_bytes());
            out.extend_from_slice(&(d.scale as i32).to_le_bytes());
            out
        }
        (FieldType::Date, Any::Date(v)) => v.to_le_bytes().to_vec(),
        (FieldType::TimeOfDay(_), Any::TimeOfDay(v)) => v.to_le_bytes().to_vec(),
        (FieldType::TimePoint(_), Any::TimePoint(s, n)) => {
            let mut out = Vec::with_capacity(12);
            out.extend_from_slice(&s.to_le_bytes());
            out.extend_from_slice(&n.to_le_bytes());
            out
        }
        (FieldType::Character(_) | FieldType::Octet(_) | FieldType::Blob | FieldType::Clob, _) => {
            let bytes: &[u8] = match value {
                Any::Character(s) => s.as_bytes(),
                Any::Octet(b) => b,
                _ => panic!("value does not match field type"),
            };
            let data_offset = arena.allocate(bytes);
            let mut out = Vec::with_capacity(16);
            out.extend_from_slice(&(data_offset as u64).to_le_bytes());
            out.extend_from_slice(&(bytes.len() as u64).to_le_bytes());
            out
        }
        _ => panic!("value {value:?} does not match field type {ty:?}"),
    }
}

fn decode_fixed(arena: &Arena, ty: &FieldType, bytes: &[u8]) -> Any {
    match ty {
        FieldType::Boolean => Any::Boolean(bytes[0] != 0),
        FieldType::Int1 => Any::Int1(bytes[0] as i8),
        FieldType::Int2 => Any::Int2(i16::from_le_bytes(bytes.try_into().unwrap())),
        FieldType::Int4 => Any::Int4(i32::from_le_bytes(bytes.try_into().unwrap())),
        FieldType::Int8 => Any::Int8(i64::from_le_bytes(bytes.try_into().unwrap())),
        FieldType::Float4 => Any::Float4(f32::from_le_bytes(bytes.try_into().unwrap())),
        FieldType::Float8 => Any::Float8(f64::from_le_bytes(bytes.try_into().unwrap())),
        FieldType::Decimal(_) => {
            let coefficient = i128::from_le_bytes(bytes[0..16].try_into().unwrap());
            let scale = i32::from_le_bytes(bytes[16..20].try_into().unwrap()) as i8;
            Any::Decimal(Decimal::new(coefficient, scale))
        }
        FieldType::Date => Any::Date(i32::from_le_bytes(bytes.try_into().unwrap())),
        FieldType::TimeOfDay(_) => Any::TimeOfDay(i64::from_le_bytes(bytes.try_into().unwrap())),
        FieldType::TimePoint(_) => {
            let s = i64::from_le_bytes(bytes[0..8].try_into().unwrap());
            let n = u32::from_le_bytes(bytes[8..12].try_into().unwrap());
            Any::TimePoint(s, n)
        }
        FieldType::Character(_) | FieldType::Octet(_) | FieldType::Blob | FieldType::Clob => {
            let data_offset = u64::from_le_bytes(bytes[0..8].try_into().unwrap()) as usize;
            let len = u64::from_le_bytes(bytes[8..16].try_into().unwrap()) as usize;
            let data = arena.get(data_offset, len);
            match ty {
                FieldType::Character(_) | FieldType::Clob => {
                    Any::Character(Arc::from(std::str::from_utf8(data).unwrap_or("")))
                }
                _ => Any::Octet(Arc::from(data)),
            }
        }
        FieldType::Undefined => Any::Null,
    }
}
