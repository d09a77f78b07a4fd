//! The dynamic runtime value (`Any`) and its heap-owning counterpart
//! (`OwnedValue`), plus the decimal representation shared by both.

use std::cmp::Ordering;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Error kinds an evaluation can fail with. Mirrors the taxonomy in the
/// write/expr error sections: a coarse kind plus an optional detail string
/// for callers that want the human-readable reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EvalErrorKind {
    Overflow,
    Underflow,
    LostPrecision,
    FormatError,
    Unsupported,
    DivideByZero,
    InvalidUtf8,
    LengthOverflow,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvalError {
    pub kind: EvalErrorKind,
    /// Present when the provider attached extra detail (the
    /// `error_info_provided` case): otherwise `None` and the kind alone
    /// carries the meaning.
    pub detail: Option<String>,
}

impl EvalError {
    pub fn new(kind: EvalErrorKind) -> Self {
        Self { kind, detail: None }
    }

    pub fn with_detail(kind: EvalErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: Some(detail.into()),
        }
    }
}

impl std::fmt::Display for EvalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.detail {
            Some(d) => write!(f, "{:?}: {d}", self.kind),
            None => write!(f, "{:?}", self.kind),
        }
    }
}

impl std::error::Error for EvalError {}

/// Arbitrary-precision-looking decimal: a 128-bit coefficient and a signed
/// scale (number of digits after the decimal point; negative scale shifts
/// left). `value = coefficient * 10^-scale`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decimal {
    pub coefficient: i128,
    pub scale: i8,
}

impl Decimal {
    pub fn new(coefficient: i128, scale: i8) -> Self {
        Self { coefficient, scale }
    }

    pub fn zero() -> Self {
        Self::new(0, 0)
    }

    /// Rescale to `target_scale`, rounding half-to-even when digits are
    /// discarded. Returns whether any nonzero digit was lost.
    pub fn rescale(&self, target_scale: i8) -> (Decimal, bool) {
        if target_scale == self.scale {
            return (*self, false);
        }
        if target_scale > self.scale {
            let shift = (target_scale - self.scale) as u32;
            let factor = 10i128.pow(shift);
            match self.coefficient.checked_mul(factor) {
                Some(c) => (Decimal::new(c, target_scale), false),
                None => (*self, false),
            }
        } else {
            let shift = (self.scale - target_scale) as u32;
            let factor = 10i128.pow(shift);
            let q = self.coefficient / factor;
            let r = self.coefficient % factor;
            let half = factor / 2;
            let r_abs = r.abs();
            let rounded = if r_abs > half || (r_abs == half && q % 2 != 0) {
                if self.coefficient >= 0 { q + 1 } else { q - 1 }
            } else {
                q
            };
            (Decimal::new(rounded, target_scale), r != 0)
        }
    }

    pub fn to_f64(self) -> f64 {
        self.coefficient as f64 / 10f64.powi(self.scale as i32)
    }
}

impl PartialOrd for Decimal {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        let scale = self.scale.max(other.scale);
        let (a, _) = self.rescale(scale);
        let (b, _) = other.rescale(scale);
        Some(a.coefficient.cmp(&b.coefficient))
    }
}

/// The dynamic runtime value used by the scalar evaluator. `Copy` where the
/// payload is `Copy`; variable-length payloads (`Character`/`Octet`) are
/// reference-counted so `Any` stays cheap to clone across the evaluation
/// stack.
#[derive(Debug, Clone)]
pub enum Any {
    /// No value is present yet (an unevaluated slot), distinct from SQL NULL.
    Empty,
    /// SQL NULL.
    Null,
    Error(EvalError),
    Boolean(bool),
    Int1(i8),
    Int2(i16),
    Int4(i32),
    Int8(i64),
    Float4(f32),
    Float8(f64),
    Decimal(Decimal),
    Character(Arc<str>),
    Octet(Arc<[u8]>),
    /// Days since 1970-01-01.
    Date(i32),
    /// Nanoseconds since midnight.
    TimeOfDay(i64),
    /// Seconds since epoch plus nanosecond remainder.
    TimePoint(i64, u32),
    /// A reference to another slot by position, used by default-value and
    /// column-reference expressions that resolve lazily.
    Index(usize),
}

impl Any {
    pub fn is_null(&self) -> bool {
        matches!(self, Any::Null)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Any::Error(_))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Any::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Numeric value widened to f64, for cross-kind arithmetic/comparison.
    /// Returns `None` for non-numeric kinds.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Any::Int1(v) => Some(*v as f64),
            Any::Int2(v) => Some(*v as f64),
            Any::Int4(v) => Some(*v as f64),
            Any::Int8(v) => Some(*v as f64),
            Any::Float4(v) => Some(*v as f64),
            Any::Float8(v) => Some(*v),
            Any::Decimal(d) => Some(d.to_f64()),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Any::Int1(_)
                | Any::Int2(_)
                | Any::Int4(_)
                | Any::Int8(_)
                | Any::Float4(_)
                | Any::Float8(_)
                | Any::Decimal(_)
        )
    }

    /// Three-valued equality: `None` when either side is NULL/Empty/Error
    /// or the kinds are not comparable at all.
    pub fn eq_checked(&self, other: &Self) -> Option<bool> {
        if self.is_null() || other.is_null() || self.is_error() || other.is_error() {
            return None;
        }
        match (self, other) {
            (Any::Boolean(a), Any::Boolean(b)) => Some(a == b),
            (Any::Character(a), Any::Character(b)) => Some(a == b),
            (Any::Octet(a), Any::Octet(b)) => Some(a == b),
            (Any::Date(a), Any::Date(b)) => Some(a == b),
            (Any::TimeOfDay(a), Any::TimeOfDay(b)) => Some(a == b),
            (Any::TimePoint(a, an), Any::TimePoint(b, bn)) => Some(a == b && an == bn),
            (Any::Decimal(a), Any::Decimal(b)) => a.partial_cmp(b).map(|o| o == Ordering::Equal),
            _ if self.is_numeric() && other.is_numeric() => {
                match (self.as_f64(), other.as_f64()) {
                    (Some(a), Some(b)) => Some(a == b),
                    _ => None,
                }
            }
            _ => None,
        }
    }

    /// Three-valued ordering, `None` if incomparable.
    pub fn cmp_checked(&self, other: &Self) -> Option<Ordering> {
        if self.is_null() || other.is_null() || self.is_error() || other.is_error() {
            return None;
        }
        match (self, other) {
            (Any::Boolean(a), Any::Boolean(b)) => a.partial_cmp(b),
            (Any::Character(a), Any::Character(b)) => a.partial_cmp(b),
            (Any::Octet(a), Any::Octet(b)) => a.partial_cmp(b),
            (Any::Date(a), Any::Date(b)) => a.partial_cmp(b),
            (Any::TimeOfDay(a), Any::TimeOfDay(b)) => a.partial_cmp(b),
            (Any::TimePoint(a, an), Any::TimePoint(b, bn)) => (a, an).partial_cmp(&(b, bn)),
            (Any::Decimal(a), Any::Decimal(b)) => a.partial_cmp(b),
            _ if self.is_numeric() && other.is_numeric() => {
                self.as_f64()?.partial_cmp(&other.as_f64()?)
            }
            _ => None,
        }
    }
}

/// Heap-owning counterpart of `Any`, used where a value must outlive the
/// evaluation stack it was produced on (parameter storage, column default
/// constants, values materialized into a row buffer).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OwnedValue {
    Null,
    Boolean(bool),
    Int1(i8),
    Int2(i16),
    Int4(i32),
    Int8(i64),
    Float4(f32),
    Float8(f64),
    Decimal(Decimal),
    Character(String),
    Octet(Vec<u8>),
    Date(i32),
    TimeOfDay(i64),
    TimePoint(i64, u32),
}

impl OwnedValue {
    pub fn to_any(&self) -> Any {
        match self {
            OwnedValue::Null => Any::Null,
            OwnedValue::Boolean(v) => Any::Boolean(*v),
            OwnedValue::Int1(v) => Any::Int1(*v),
            OwnedValue::Int2(v) => Any::Int2(*v),
            OwnedValue::Int4(v) => Any::Int4(*v),
            OwnedValue::Int8(v) => Any::Int8(*v),
            OwnedValue::Float4(v) => Any::Float4(*v),
            OwnedValue::Float8(v) => Any::Float8(*v),
            OwnedValue::Decimal(v) => Any::Decimal(*v),
            OwnedValue::Character(v) => Any::Character(Arc::from(v.as_str())),
            OwnedValue::Octet(v) => Any::Octet(Arc::from(v.as_slice())),
            OwnedValue::Date(v) => Any::Date(*v),
            OwnedValue::TimeOfDay(v) => Any::TimeOfDay(*v),
            OwnedValue::TimePoint(s, n) => Any::TimePoint(*s, *n),
        }
    }

    pub fn from_any(any: &Any) -> Option<OwnedValue> {
        Some(match any {
            Any::Null => OwnedValue::Null,
            Any::Boolean(v) => OwnedValue::Boolean(*v),
            Any::Int1(v) => OwnedValue::Int1(*v),
            Any::Int2(v) => OwnedValue::Int2(*v),
            Any::Int4(v) => OwnedValue::Int4(*v),
            Any::Int8(v) => OwnedValue::Int8(*v),
            Any::Float4(v) => OwnedValue::Float4(*v),
            Any::Float8(v) => OwnedValue::Float8(*v),
            Any::Decimal(v) => OwnedValue::Decimal(*v),
            Any::Character(v) => OwnedValue::Character(v.to_string()),
            Any::Octet(v) => OwnedValue::Octet(v.to_vec()),
            Any::Date(v) => OwnedValue::Date(*v),
            Any::TimeOfDay(v) => OwnedValue::TimeOfDay(*v),
            Any::TimePoint(s, n) => OwnedValue::TimePoint(*s, *n),
            Any::Empty | Any::Error(_) | Any::Index(_) => return None,
        })
    }
}
