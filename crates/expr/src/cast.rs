//! Typed casts between `Any` values, with a lenient/non-lenient truncation
//! policy controlling whether an overflowing or precision-losing cast
//! errors or saturates/truncates silently (while still flagging
//! `lost_precision` in the evaluator context).

use common::{DbError, DbResult};
use types::{Any, Decimal, EvalError, EvalErrorKind, FieldType};

pub struct CastOutcome {
    pub value: Any,
    pub lost_precision: bool,
}

pub fn cast(value: &Any, target: &FieldType, lenient: bool) -> DbResult<CastOutcome> {
    if matches!(value, Any::Null) {
        return Ok(CastOutcome {
            value: Any::Null,
            lost_precision: false,
        });
    }
    cast_dispatch(value, target, lenient)
}

fn cast_dispatch(value: &Any, target: &FieldType, lenient: bool) -> DbResult<CastOutcome> {
    match target {
        FieldType::Boolean => cast_to_boolean(value),
        FieldType::Int1 => cast_to_int(value, i8::MIN as i64, i8::MAX as i64, lenient)
            .map(|(v, lost)| finish(Any::Int1(v as i8), lost)),
        FieldType::Int2 => cast_to_int(value, i16::MIN as i64, i16::MAX as i64, lenient)
            .map(|(v, lost)| finish(Any::Int2(v as i16), lost)),
        FieldType::Int4 => cast_to_int(value, i32::MIN as i64, i32::MAX as i64, lenient)
            .map(|(v, lost)| finish(Any::Int4(v as i32), lost)),
        FieldType::Int8 => cast_to_int(value, i64::MIN, i64::MAX, lenient)
            .map(|(v, lost)| finish(Any::Int8(v), lost)),
        FieldType::Float4 => cast_to_f64(value).map(|v| finish(Any::Float4(v as f32), false)),
        FieldType::Float8 => cast_to_f64(value).map(|v| finish(Any::Float8(v), false)),
        FieldType::Decimal(d) => cast_to_decimal(value, d.scale, lenient),
        FieldType::Character(detail) => cast_to_character(value, Some(*detail), lenient),
        FieldType::Clob => cast_to_character(value, None, lenient),
        FieldType::Octet(detail) => cast_to_octet(value, Some(*detail), lenient),
        FieldType::Blob => cast_to_octet(value, None, lenient),
        _ => Err(DbError::Expression(format!(
            "cast to {target:?} is not supported"
        ))),
    }
}

fn finish(value: Any, lost_precision: bool) -> CastOutcome {
    CastOutcome {
        value,
        lost_precision,
    }
}

fn cast_to_boolean(value: &Any) -> DbResult<CastOutcome> {
    match value {
        Any::Boolean(b) => Ok(finish(Any::Boolean(*b), false)),
        Any::Character(s) => {
            let lower = s.to_lowercase();
            if !lower.is_empty() && "true".starts_with(lower.as_str()) {
                Ok(finish(Any::Boolean(true), false))
            } else if !lower.is_empty() && "false".starts_with(lower.as_str()) {
                Ok(finish(Any::Boolean(false), false))
            } else {
                Err(format_error("cannot cast text to boolean"))
            }
        }
        _ => Err(unsupported("boolean")),
    }
}

fn cast_to_int(value: &Any, min: i64, max: i64, lenient: bool) -> DbResult<(i64, bool)> {
    let raw: i64 = match value {
        Any::Int1(v) => *v as i64,
        Any::Int2(v) => *v as i64,
        Any::Int4(v) => *v as i64,
        Any::Int8(v) => *v,
        Any::Float4(v) => *v as i64,
        Any::Float8(v) => *v as i64,
        Any::Decimal(d) => d.rescale(0).0.coefficient as i64,
        Any::Boolean(b) => {
            if *b {
                1
            } else {
                0
            }
        }
        Any::Character(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| format_error("cannot cast text to integer"))?,
        _ => return Err(unsupported("integer")),
    };
    if raw < min || raw > max {
        if lenient {
            Ok((raw.clamp(min, max), true))
        } else {
            Err(DbError::Expression(
                EvalError::new(EvalErrorKind::Overflow).to_string(),
            ))
        }
    } else {
        Ok((raw, false))
    }
}

fn cast_to_f64(value: &Any) -> DbResult<f64> {
    if let Some(v) = value.as_f64() {
        return Ok(v);
    }
    match value {
        Any::Boolean(b) => Ok(if *b { 1.0 } else { 0.0 }),
        Any::Character(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| format_error("cannot cast text to float")),
        _ => Err(unsupported("float")),
    }
}

fn cast_to_decimal(value: &Any, scale: i8, lenient: bool) -> DbResult<CastOutcome> {
    let d = match value {
        Any::Decimal(d) => *d,
        Any::Int1(v) => Decimal::new(*v as i128, 0),
        Any::Int2(v) => Decimal::new(*v as i128, 0),
        Any::Int4(v) => Decimal::new(*v as i128, 0),
        Any::Int8(v) => Decimal::new(*v as i128, 0),
        Any::Float4(v) => float_to_decimal(*v as f64),
        Any::Float8(v) => float_to_decimal(*v),
        Any::Character(s) => parse_decimal(s)?,
        _ => return Err(unsupported("decimal")),
    };
    let (rescaled, lost) = d.rescale(scale);
    if lost && !lenient {
        return Err(DbError::Expression(
            EvalError::new(EvalErrorKind::LostPrecision).to_string(),
        ));
    }
    Ok(finish(Any::Decimal(rescaled), lost))
}

fn float_to_decimal(v: f64) -> Decimal {
    let scale = 6i8;
    let coefficient = (v * 10f64.powi(scale as i32)).round() as i128;
    Decimal::new(coefficient, scale)
}

fn parse_decimal(s: &str) -> DbResult<Decimal> {
    let s = s.trim();
    let (sign, rest) = match s.strip_prefix('-') {
        Some(r) => (-1i128, r),
        None => (1i128, s.strip_prefix('+').unwrap_or(s)),
    };
    let (int_part, frac_part) = match rest.split_once('.') {
        Some((i, f)) => (i, f),
        None => (rest, ""),
    };
    let digits = format!("{int_part}{frac_part}");
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(format_error("cannot cast text to decimal"));
    }
    let coefficient: i128 = digits
        .parse()
        .map_err(|_| format_error("decimal literal too large"))?;
    Ok(Decimal::new(sign * coefficient, frac_part.len() as i8))
}

fn cast_to_character(
    value: &Any,
    detail: Option<types::LengthDetail>,
    lenient: bool,
) -> DbResult<CastOutcome> {
    let s = match value {
        Any::Character(s) => s.to_string(),
        Any::Boolean(b) => b.to_string(),
        Any::Int1(v) => v.to_string(),
        Any::Int2(v) => v.to_string(),
        Any::Int4(v) => v.to_string(),
        Any::Int8(v) => v.to_string(),
        Any::Float4(v) => v.to_string(),
        Any::Float8(v) => v.to_string(),
        Any::Decimal(d) => format_decimal(*d),
        Any::Date(d) => d.to_string(),
        _ => return Err(unsupported("character")),
    };
    match detail {
        None => Ok(finish(Any::Character(std::sync::Arc::from(s.as_str())), false)),
        Some(d) => {
            let (result, lost) =
                truncate_or_pad(&s.chars().collect::<Vec<_>>(), d.length as usize, !d.varying, lenient, ' ');
            if lost && !lenient {
                return Err(DbError::ValueTooLong(format!(
                    "character value exceeds declared length {}",
                    d.length
                )));
            }
            let text: String = result.into_iter().collect();
            Ok(CastOutcome {
                value: Any::Character(std::sync::Arc::from(text.as_str())),
                lost_precision: lost,
            })
        }
    }
}

/// `truncate_or_pad(value, target_len, add_padding, is_lenient)`:
/// truncates to `target_len` code points/bytes when longer,
/// right-pads with `pad` when shorter and `add_padding` (fixed-length
/// targets only). `lost_precision` is set on truncation unless lenient and
/// every dropped element was the pad value.
fn truncate_or_pad<T: Copy + PartialEq>(
    value: &[T],
    target_len: usize,
    add_padding: bool,
    is_lenient: bool,
    pad: T,
) -> (Vec<T>, bool) {
    if value.len() > target_len {
        let kept = &value[..target_len];
        let dropped = &value[target_len..];
        let lost = !(is_lenient && dropped.iter().all(|&c| c == pad));
        (kept.to_vec(), lost)
    } else if value.len() < target_len && add_padding {
        let mut out = value.to_vec();
        out.extend(std::iter::repeat(pad).take(target_len - value.len()));
        (out, false)
    } else {
        (value.to_vec(), false)
    }
}

fn format_decimal(d: Decimal) -> String {
    if d.scale <= 0 {
        return (d.coefficient * 10i128.pow((-d.scale) as u32)).to_string();
    }
    let scale = d.scale as u32;
    let factor = 10i128.pow(scale);
    let sign = if d.coefficient < 0 { "-" } else { "" };
    let abs = d.coefficient.abs();
    let int_part = abs / factor;
    let frac_part = abs % factor;
    format!("{sign}{int_part}.{frac_part:0width$}", width = scale as usize)
}

fn cast_to_octet(
    value: &Any,
    detail: Option<types::LengthDetail>,
    lenient: bool,
) -> DbResult<CastOutcome> {
    let bytes: Vec<u8> = match value {
        Any::Octet(b) => b.to_vec(),
        Any::Character(s) => s.as_bytes().to_vec(),
        _ => return Err(unsupported("octet")),
    };
    match detail {
        None => Ok(finish(Any::Octet(std::sync::Arc::from(bytes.as_slice())), false)),
        Some(d) => {
            let (result, lost) = truncate_or_pad(&bytes, d.length as usize, !d.varying, lenient, 0u8);
            if lost && !lenient {
                return Err(DbError::ValueTooLong(format!(
                    "octet value exceeds declared length {}",
                    d.length
                )));
            }
            Ok(CastOutcome {
                value: Any::Octet(std::sync::Arc::from(result.as_slice())),
                lost_precision: lost,
            })
        }
    }
}

fn unsupported(target: &str) -> DbError {
    DbError::UnsupportedRuntimeFeature(format!(
        "{}",
        EvalError::with_detail(EvalErrorKind::Unsupported, format!("cast to {target}"))
    ))
}

fn format_error(msg: &str) -> DbError {
    DbError::Expression(format!(
        "{}",
        EvalError::with_detail(EvalErrorKind::FormatError, msg)
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::FieldType;

    #[test]
    fn lenient_overflow_truncates() {
        let out = cast(&Any::Int4(1000), &FieldType::Int1, true).unwrap();
        assert!(out.lost_precision);
        assert!(matches!(out.value, Any::Int1(127)));
    }

    #[test]
    fn non_lenient_overflow_errors() {
        assert!(cast(&Any::Int4(1000), &FieldType::Int1, false).is_err());
    }

    #[test]
    fn decimal_round_trips_through_text() {
        let d = Decimal::new(12345, 2); // 123.45
        let text = cast(&Any::Decimal(d), &FieldType::Character(types::LengthDetail { length: 32, varying: true }), true).unwrap();
        match text.value {
            Any::Character(s) => assert_eq!(&*s, "123.45"),
            other => panic!("{other:?}"),
        }
    }
}
