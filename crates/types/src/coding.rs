//! Order-preserving binary encoding for KVS keys.
//!
//! Each encoder maps a value to a byte sequence such that unsigned
//! lexicographic comparison of the bytes matches the value's natural
//! ordering. This is what lets the KVS's plain byte-range `scan` double as
//! an ordered index scan.

use crate::kind::FieldType;
use crate::value::{Any, Decimal};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// Leading byte marking whether a nullable field's encoding is present.
/// NULL sorts first in ascending order.
const NULL_MARKER: u8 = 0x00;
const NOT_NULL_MARKER: u8 = 0x01;

fn invert(buf: &mut [u8], dir: Direction) {
    if dir == Direction::Descending {
        for b in buf.iter_mut() {
            *b = !*b;
        }
    }
}

/// Encode a single, possibly-null field into `out`, order-preserving.
pub fn encode_field(value: &Any, nullable: bool, dir: Direction, out: &mut Vec<u8>) {
    if nullable {
        if value.is_null() {
            out.push(match dir {
                Direction::Ascending => NULL_MARKER,
                Direction::Descending => !NULL_MARKER,
            });
            return;
        }
        out.push(match dir {
            Direction::Ascending => NOT_NULL_MARKER,
            Direction::Descending => !NOT_NULL_MARKER,
        });
    }
    encode_value(value, dir, out);
}

fn encode_value(value: &Any, dir: Direction, out: &mut Vec<u8>) {
    let start = out.len();
    match value {
        Any::Boolean(b) => out.push(if *b { 1 } else { 0 }),
        Any::Int1(v) => out.extend_from_slice(&sign_flip_i8(*v).to_be_bytes()),
        Any::Int2(v) => out.extend_from_slice(&sign_flip_i16(*v).to_be_bytes()),
        Any::Int4(v) => out.extend_from_slice(&sign_flip_i32(*v).to_be_bytes()),
        Any::Int8(v) => out.extend_from_slice(&sign_flip_i64(*v).to_be_bytes()),
        Any::Float4(v) => out.extend_from_slice(&encode_f32(*v).to_be_bytes()),
        Any::Float8(v) => out.extend_from_slice(&encode_f64(*v).to_be_bytes()),
        Any::Decimal(d) => encode_decimal(*d, out),
        Any::Character(s) => {
            out.extend_from_slice(s.as_bytes());
            // terminator byte must sort before any continuation byte; 0x00
            // is safe because field bytes never contain an embedded NUL
            // once UTF-8-validated text is excluded from using raw zero.
            out.push(0x00);
        }
        Any::Octet(b) => {
            // escape 0x00 as 0x00 0xFF, terminate with 0x00 0x00, so no
            // encoded payload byte sequence is a prefix of another's.
            for &byte in b.iter() {
                if byte == 0x00 {
                    out.push(0x00);
                    out.push(0xFF);
                } else {
                    out.push(byte);
                }
            }
            out.push(0x00);
            out.push(0x00);
        }
        Any::Date(d) => out.extend_from_slice(&sign_flip_i32(*d).to_be_bytes()),
        Any::TimeOfDay(t) => out.extend_from_slice(&sign_flip_i64(*t).to_be_bytes()),
        Any::TimePoint(s, n) => {
            out.extend_from_slice(&sign_flip_i64(*s).to_be_bytes());
            out.extend_from_slice(&n.to_be_bytes());
        }
        Any::Null | Any::Empty | Any::Error(_) | Any::Index(_) => {}
    }
    invert(&mut out[start..], dir);
}

fn sign_flip_i8(v: i8) -> u8 {
    (v as u8) ^ 0x80
}
fn sign_flip_i16(v: i16) -> u16 {
    (v as u16) ^ 0x8000
}
fn sign_flip_i32(v: i32) -> u32 {
    (v as u32) ^ 0x8000_0000
}
fn sign_flip_i64(v: i64) -> u64 {
    (v as u64) ^ 0x8000_0000_0000_0000
}

/// IEEE-754 bit pattern ordering trick: for non-negative floats, flipping
/// the sign bit preserves order; for negative floats, flipping all bits
/// reverses the (otherwise backwards) bit-pattern order into the correct
/// ascending order.
fn encode_f32(v: f32) -> u32 {
    let bits = v.to_bits();
    if bits & 0x8000_0000 != 0 {
        !bits
    } else {
        bits | 0x8000_0000
    }
}

fn encode_f64(v: f64) -> u64 {
    let bits = v.to_bits();
    if bits & 0x8000_0000_0000_0000 != 0 {
        !bits
    } else {
        bits | 0x8000_0000_0000_0000
    }
}

/// Decode one field previously written by [`encode_field`], advancing
/// `input` past the bytes it consumed. `ty` must match the type the field
/// was encoded with; a mismatch produces garbage rather than an error,
/// same as `encode_field` panicking on mismatch would — both sides are
/// internal callers working from the same catalog-declared layout.
pub fn decode_field(input: &mut &[u8], ty: &FieldType, nullable: bool, dir: Direction) -> Any {
    if nullable {
        let marker = take_byte(input);
        let is_null = match dir {
            Direction::Ascending => marker == NULL_MARKER,
            Direction::Descending => marker == !NULL_MARKER,
        };
        if is_null {
            return Any::Null;
        }
    }
    decode_value(input, ty, dir)
}

fn take_byte(input: &mut &[u8]) -> u8 {
    let b = input[0];
    *input = &input[1..];
    b
}

fn take_n(input: &mut &[u8], n: usize) -> Vec<u8> {
    let (head, rest) = input.split_at(n);
    *input = rest;
    head.to_vec()
}

fn unflip(buf: Vec<u8>, dir: Direction) -> Vec<u8> {
    match dir {
        Direction::Ascending => buf,
        Direction::Descending => buf.into_iter().map(|b| !b).collect(),
    }
}

fn take_terminated(input: &mut &[u8], dir: Direction) -> Vec<u8> {
    let mut bytes = Vec::new();
    loop {
        let b = unflip(vec![take_byte(input)], dir)[0];
        if b == 0x00 {
            break;
        }
        bytes.push(b);
    }
    bytes
}

fn take_octet_terminated(input: &mut &[u8], dir: Direction) -> Vec<u8> {
    let mut bytes = Vec::new();
    loop {
        let b = unflip(vec![take_byte(input)], dir)[0];
        if b == 0x00 {
            let next = unflip(vec![take_byte(input)], dir)[0];
            if next == 0x00 {
                break;
            }
            bytes.push(0x00);
        } else {
            bytes.push(b);
        }
    }
    bytes
}

fn unflip_i8(v: u8) -> i8 {
    (v ^ 0x80) as i8
}
fn unflip_i16(v: u16) -> i16 {
    (v ^ 0x8000) as i16
}
fn unflip_i32(v: u32) -> i32 {
    (v ^ 0x8000_0000) as i32
}
fn unflip_i64(v: u64) -> i64 {
    (v ^ 0x8000_0000_0000_0000) as i64
}

fn decode_f32(encoded: u32) -> f32 {
    if encoded & 0x8000_0000 != 0 {
        f32::from_bits(encoded & 0x7FFF_FFFF)
    } else {
        f32::from_bits(!encoded)
    }
}

fn decode_f64(encoded: u64) -> f64 {
    if encoded & 0x8000_0000_0000_0000 != 0 {
        f64::from_bits(encoded & 0x7FFF_FFFF_FFFF_FFFF)
    } else {
        f64::from_bits(!encoded)
    }
}

fn decode_decimal(input: &mut &[u8], dir: Direction) -> Decimal {
    let _sign_byte = unflip(take_n(input, 1), dir)[0];
    let flipped_bytes = unflip(take_n(input, 16), dir);
    let flipped = u128::from_be_bytes(flipped_bytes.try_into().unwrap());
    let coefficient = (flipped ^ (1u128 << 127)) as i128;
    let scale_bytes = unflip(take_n(input, 4), dir);
    let scale = unflip_i32(u32::from_be_bytes(scale_bytes.try_into().unwrap())) as i8;
    Decimal::new(coefficient, scale)
}

fn decode_value(input: &mut &[u8], ty: &FieldType, dir: Direction) -> Any {
    match ty {
        FieldType::Boolean => Any::Boolean(unflip(take_n(input, 1), dir)[0] != 0),
        FieldType::Int1 => Any::Int1(unflip_i8(unflip(take_n(input, 1), dir)[0])),
        FieldType::Int2 => {
            let bytes = unflip(take_n(input, 2), dir);
            Any::Int2(unflip_i16(u16::from_be_bytes(bytes.try_into().unwrap())))
        }
        FieldType::Int4 => {
            let bytes = unflip(take_n(input, 4), dir);
            Any::Int4(unflip_i32(u32::from_be_bytes(bytes.try_into().unwrap())))
        }
        FieldType::Int8 => {
            let bytes = unflip(take_n(input, 8), dir);
            Any::Int8(unflip_i64(u64::from_be_bytes(bytes.try_into().unwrap())))
        }
        FieldType::Float4 => {
            let bytes = unflip(take_n(input, 4), dir);
            Any::Float4(decode_f32(u32::from_be_bytes(bytes.try_into().unwrap())))
        }
        FieldType::Float8 => {
            let bytes = unflip(take_n(input, 8), dir);
            Any::Float8(decode_f64(u64::from_be_bytes(bytes.try_into().unwrap())))
        }
        FieldType::Decimal(_) => Any::Decimal(decode_decimal(input, dir)),
        FieldType::Character(_) | FieldType::Clob => {
            let bytes = take_terminated(input, dir);
            Any::Character(Arc::from(String::from_utf8_lossy(&bytes).into_owned()))
        }
        FieldType::Octet(_) | FieldType::Blob => {
            Any::Octet(Arc::from(take_octet_terminated(input, dir)))
        }
        FieldType::Date => {
            let bytes = unflip(take_n(input, 4), dir);
            Any::Date(unflip_i32(u32::from_be_bytes(bytes.try_into().unwrap())))
        }
        FieldType::TimeOfDay(_) => {
            let bytes = unflip(take_n(input, 8), dir);
            Any::TimeOfDay(unflip_i64(u64::from_be_bytes(bytes.try_into().unwrap())))
        }
        FieldType::TimePoint(_) => {
            let s_bytes = unflip(take_n(input, 8), dir);
            let s = unflip_i64(u64::from_be_bytes(s_bytes.try_into().unwrap()));
            let n_bytes = unflip(take_n(input, 4), dir);
            let n = u32::from_be_bytes(n_bytes.try_into().unwrap());
            Any::TimePoint(s, n)
        }
        FieldType::Undefined => Any::Null,
    }
}

fn encode_decimal(d: Decimal, out: &mut Vec<u8>) {
    // sign byte (0x00 negative, 0x01 zero, 0x02 positive) keeps all
    // negative encodings sorting before zero before positive regardless of
    // magnitude, then the 16-byte sign-flipped coefficient and the 4-byte
    // sign-flipped scale (more negative scale = smaller magnitude exponent
    // and must still sort consistently with the coefficient ordering for
    // same-scale comparisons, which is the only case the KVS needs: keys
    // within one column share a declared scale).
    let sign_byte = match d.coefficient.signum() {
        -1 => 0x00,
        0 => 0x01,
        _ => 0x02,
    };
    out.push(sign_byte);
    let flipped = (d.coefficient as u128) ^ (1u128 << 127);
    out.extend_from_slice(&flipped.to_be_bytes());
    out.extend_from_slice(&sign_flip_i32(d.scale as i32).to_be_bytes());
}

/// Encode a composite key: one `(type, nullable, direction)` triple per
/// column, values in the same order.
pub fn encode_fields(fields: &[(FieldType, bool, Direction)], values: &[Any]) -> Vec<u8> {
    let mut out = Vec::new();
    for ((ty, nullable, dir), value) in fields.iter().zip(values) {
        let _ = ty;
        encode_field(value, *nullable, *dir, &mut out);
    }
    out
}

/// Inverse of [`encode_fields`]: decode every column in order from `bytes`.
pub fn decode_fields(fields: &[(FieldType, bool, Direction)], bytes: &[u8]) -> Vec<Any> {
    let mut input = bytes;
    fields
        .iter()
        .map(|(ty, nullable, dir)| decode_field(&mut input, ty, *nullable, *dir))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn encode_i32(v: i32) -> Vec<u8> {
        let mut out = Vec::new();
        encode_value(&Any::Int4(v), Direction::Ascending, &mut out);
        out
    }

    #[test]
    fn int_order_preserved() {
        assert!(encode_i32(-5) < encode_i32(-1));
        assert!(encode_i32(-1) < encode_i32(0));
        assert!(encode_i32(0) < encode_i32(1));
        assert!(encode_i32(1) < encode_i32(1000));
    }

    #[test]
    fn float_order_preserved() {
        let mut neg = Vec::new();
        encode_value(&Any::Float8(-1.5), Direction::Ascending, &mut neg);
        let mut zero = Vec::new();
        encode_value(&Any::Float8(0.0), Direction::Ascending, &mut zero);
        let mut pos = Vec::new();
        encode_value(&Any::Float8(1.5), Direction::Ascending, &mut pos);
        assert!(neg < zero);
        assert!(zero < pos);
    }

    #[test]
    fn string_prefix_sorts_first() {
        let mut short = Vec::new();
        encode_value(&Any::Character("ab".into()), Direction::Ascending, &mut short);
        let mut long = Vec::new();
        encode_value(&Any::Character("abc".into()), Direction::Ascending, &mut long);
        assert!(short < long);
    }

    #[test]
    fn descending_reverses_order() {
        let mut a = Vec::new();
        encode_value(&Any::Int4(1), Direction::Descending, &mut a);
        let mut b = Vec::new();
        encode_value(&Any::Int4(2), Direction::Descending, &mut b);
        assert!(a > b);
    }

    #[test]
    fn null_sorts_before_any_value() {
        let mut n = Vec::new();
        encode_field(&Any::Null, true, Direction::Ascending, &mut n);
        let mut v = Vec::new();
        encode_field(&Any::Int4(i32::MIN), true, Direction::Ascending, &mut v);
        assert!(n < v);
    }

    proptest! {
        #[test]
        fn prop_int4_order_matches_native(a: i32, b: i32) {
            let ea = encode_i32(a);
            let eb = encode_i32(b);
            prop_assert_eq!(a.cmp(&b), ea.cmp(&eb));
        }
    }

    fn fields_round_trip(fields: &[(FieldType, bool, Direction)], values: Vec<Any>) {
        let encoded = encode_fields(fields, &values);
        let mut input: &[u8] = &encoded;
        for ((ty, nullable, dir), expected) in fields.iter().zip(values.iter()) {
            let decoded = decode_field(&mut input, ty, *nullable, *dir);
            assert!(
                decoded.eq_checked(expected).unwrap_or(false)
                    || (matches!(decoded, Any::Null) && matches!(expected, Any::Null)),
                "round trip mismatch: {decoded:?} != {expected:?}"
            );
        }
        assert!(input.is_empty(), "decode left {} unread bytes", input.len());
    }

    #[test]
    fn round_trips_fixed_width_key() {
        fields_round_trip(
            &[
                (FieldType::Int4, false, Direction::Ascending),
                (FieldType::Int8, true, Direction::Descending),
                (FieldType::Float8, false, Direction::Ascending),
                (FieldType::Boolean, false, Direction::Ascending),
            ],
            vec![
                Any::Int4(-42),
                Any::Null,
                Any::Float8(-3.5),
                Any::Boolean(true),
            ],
        );
    }

    #[test]
    fn round_trips_variable_length_key() {
        fields_round_trip(
            &[
                (
                    FieldType::Character(crate::kind::LengthDetail {
                        length: 64,
                        varying: true,
                    }),
                    false,
                    Direction::Ascending,
                ),
                (
                    FieldType::Octet(crate::kind::LengthDetail {
                        length: 64,
                        varying: true,
                    }),
                    false,
                    Direction::Descending,
                ),
            ],
            vec![
                Any::Character("hello, \u{1F600}".into()),
                Any::Octet(vec![0x00, 0xFF, 0x01, 0x00].into()),
            ],
        );
    }

    #[test]
    fn round_trips_decimal() {
        fields_round_trip(
            &[(
                FieldType::Decimal(crate::kind::DecimalDetail {
                    precision: 10,
                    scale: 2,
                }),
                false,
                Direction::Ascending,
            )],
            vec![Any::Decimal(Decimal::new(-12345, 2))],
        );
    }

    proptest! {
        #[test]
        fn prop_fixed_width_round_trips(a: i32, b: i64, c: f64, d: bool) {
            fields_round_trip(
                &[
                    (FieldType::Int4, false, Direction::Ascending),
                    (FieldType::Int8, false, Direction::Descending),
                    (FieldType::Float8, false, Direction::Ascending),
                    (FieldType::Boolean, false, Direction::Descending),
                ],
                vec![Any::Int4(a), Any::Int8(b), Any::Float8(c), Any::Boolean(d)],
            );
        }
    }
}
