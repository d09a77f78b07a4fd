//! Scalar expression evaluation against one row.

use common::{DbError, DbResult};
use types::{Any, Decimal};

use crate::ast::{BinaryOp, Expr, UnaryOp};
use crate::cast;
use crate::like::sql_like;

/// Per-evaluation scratch state. `lost_precision` is reset by the caller
/// before a top-level `eval` call and inspected afterward; it is not reset
/// automatically so a caller can evaluate several expressions against one
/// row and check the flag once at the end.
#[derive(Debug, Clone, Default)]
pub struct EvaluatorContext {
    pub lost_precision: bool,
    pub zone_offset_minutes: i32,
    pub strict_casts: bool,
    /// Bound parameters for the current request, addressed by `Expr::Param`.
    pub params: Vec<Any>,
}

impl EvaluatorContext {
    pub fn new(strict_casts: bool, zone_offset_minutes: i32) -> Self {
        Self {
            lost_precision: false,
            zone_offset_minutes,
            strict_casts,
            params: Vec::new(),
        }
    }

    pub fn with_params(mut self, params: Vec<Any>) -> Self {
        self.params = params;
        self
    }

    pub fn eval(&mut self, expr: &Expr, row: &[Any]) -> DbResult<Any> {
        match expr {
            Expr::Literal(lit) => Ok(lit.to_any()),
            Expr::Column(ordinal) => row
                .get(*ordinal)
                .cloned()
                .ok_or_else(|| DbError::Expression(format!("column ordinal {ordinal} out of range"))),
            Expr::Param(ordinal) => self.params.get(*ordinal).cloned().ok_or_else(|| {
                DbError::Expression(format!("parameter ordinal {ordinal} out of range"))
            }),
            Expr::Unary { op, expr } => {
                let v = self.eval(expr, row)?;
                self.eval_unary(*op, v)
            }
            Expr::Binary { op, left, right } => self.eval_binary(*op, left, right, row),
            Expr::Cast {
                expr,
                target,
                lenient,
            } => {
                let v = self.eval(expr, row)?;
                let outcome = cast::cast(&v, target, *lenient || !self.strict_casts)?;
                if outcome.lost_precision {
                    self.lost_precision = true;
                }
                Ok(outcome.value)
            }
            Expr::Like {
                expr,
                pattern,
                escape,
            } => {
                let text = self.eval(expr, row)?;
                let pat = self.eval(pattern, row)?;
                if text.is_null() || pat.is_null() {
                    return Ok(Any::Null);
                }
                let (Any::Character(t), Any::Character(p)) = (&text, &pat) else {
                    return Err(DbError::Expression("LIKE operands must be character".into()));
                };
                Ok(Any::Boolean(sql_like(t, p, *escape)?))
            }
        }
    }

    fn eval_unary(&mut self, op: UnaryOp, v: Any) -> DbResult<Any> {
        Ok(match op {
            UnaryOp::IsNull => Any::Boolean(v.is_null()),
            UnaryOp::IsNotNull => Any::Boolean(!v.is_null()),
            UnaryOp::Not => match v.as_bool() {
                Some(b) => Any::Boolean(!b),
                None if v.is_null() => Any::Null,
                None => return Err(DbError::Expression("NOT requires a boolean operand".into())),
            },
            UnaryOp::Neg => match v {
                Any::Null => Any::Null,
                Any::Int1(x) => Any::Int1(-x),
                Any::Int2(x) => Any::Int2(-x),
                Any::Int4(x) => Any::Int4(-x),
                Any::Int8(x) => Any::Int8(-x),
                Any::Float4(x) => Any::Float4(-x),
                Any::Float8(x) => Any::Float8(-x),
                Any::Decimal(d) => Any::Decimal(Decimal::new(-d.coefficient, d.scale)),
                _ => return Err(DbError::Expression("unary - requires a numeric operand".into())),
            },
            UnaryOp::Length => match v {
                Any::Null => Any::Null,
                Any::Character(s) => Any::Int4(s.chars().count() as i32),
                _ => return Err(DbError::Expression("LENGTH requires a character operand".into())),
            },
        })
    }

    fn eval_binary(&mut self, op: BinaryOp, left: &Expr, right: &Expr, row: &[Any]) -> DbResult<Any> {
        // AND/OR get proper three-valued short-circuit treatment before
        // falling into the strict-operand arithmetic/comparison path.
        match op {
            BinaryOp::And => {
                let l = self.eval(left, row)?;
                if l.as_bool() == Some(false) {
                    return Ok(Any::Boolean(false));
                }
                let r = self.eval(right, row)?;
                return Ok(match (l.as_bool(), r.as_bool()) {
                    (Some(true), Some(b)) => Any::Boolean(b),
                    (_, Some(false)) => Any::Boolean(false),
                    (None, _) | (_, None) => Any::Null,
                    (Some(a), Some(b)) => Any::Boolean(a && b),
                });
            }
            BinaryOp::Or => {
                let l = self.eval(left, row)?;
                if l.as_bool() == Some(true) {
                    return Ok(Any::Boolean(true));
                }
                let r = self.eval(right, row)?;
                return Ok(match (l.as_bool(), r.as_bool()) {
                    (Some(false), Some(b)) => Any::Boolean(b),
                    (_, Some(true)) => Any::Boolean(true),
                    (None, _) | (_, None) => Any::Null,
                    (Some(a), Some(b)) => Any::Boolean(a || b),
                });
            }
            _ => {}
        }

        let l = self.eval(left, row)?;
        let r = self.eval(right, row)?;
        if l.is_null() || r.is_null() {
            return Ok(Any::Null);
        }

        match op {
            BinaryOp::Eq => Ok(bool_or_null(l.eq_checked(&r))),
            BinaryOp::Ne => Ok(bool_or_null(l.eq_checked(&r).map(|b| !b))),
            BinaryOp::Lt => Ok(bool_or_null(
                l.cmp_checked(&r).map(|o| o == std::cmp::Ordering::Less),
            )),
            BinaryOp::Le => Ok(bool_or_null(
                l.cmp_checked(&r)
                    .map(|o| o != std::cmp::Ordering::Greater),
            )),
            BinaryOp::Gt => Ok(bool_or_null(
                l.cmp_checked(&r).map(|o| o == std::cmp::Ordering::Greater),
            )),
            BinaryOp::Ge => Ok(bool_or_null(
                l.cmp_checked(&r).map(|o| o != std::cmp::Ordering::Less),
            )),
            BinaryOp::Concat => match (&l, &r) {
                (Any::Character(a), Any::Character(b)) => {
                    Ok(Any::Character(std::sync::Arc::from(format!("{a}{b}").as_str())))
                }
                (Any::Octet(a), Any::Octet(b)) => {
                    let mut bytes = Vec::with_capacity(a.len() + b.len());
                    bytes.extend_from_slice(a);
                    bytes.extend_from_slice(b);
                    Ok(Any::Octet(std::sync::Arc::from(bytes.as_slice())))
                }
                _ => Err(DbError::Expression(
                    "|| requires character or binary operands of the same kind".into(),
                )),
            },
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => {
                self.eval_arithmetic(op, l, r)
            }
            BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
        }
    }

    fn eval_arithmetic(&mut self, op: BinaryOp, l: Any, r: Any) -> DbResult<Any> {
        if let (Any::Decimal(a), Any::Decimal(b)) = (&l, &r) {
            return self.decimal_arithmetic(op, *a, *b);
        }
        if let (Any::Decimal(_), _) | (_, Any::Decimal(_)) = (&l, &r) {
            let scale = match (&l, &r) {
                (Any::Decimal(d), _) | (_, Any::Decimal(d)) => d.scale,
                _ => 0,
            };
            let a = to_decimal(&l, scale);
            let b = to_decimal(&r, scale);
            return self.decimal_arithmetic(op, a, b);
        }
        if matches!(l, Any::Float4(_) | Any::Float8(_)) || matches!(r, Any::Float4(_) | Any::Float8(_)) {
            let a = l.as_f64().ok_or_else(|| DbError::Expression("non-numeric operand".into()))?;
            let b = r.as_f64().ok_or_else(|| DbError::Expression("non-numeric operand".into()))?;
            let v = match op {
                BinaryOp::Add => a + b,
                BinaryOp::Sub => a - b,
                BinaryOp::Mul => a * b,
                BinaryOp::Div => {
                    if b == 0.0 {
                        return Err(DbError::Expression(
                            types::EvalError::new(types::EvalErrorKind::DivideByZero).to_string(),
                        ));
                    }
                    a / b
                }
                BinaryOp::Mod => a % b,
                _ => unreachable!(),
            };
            return Ok(Any::Float8(v));
        }
        // integer family, promote to i64 and perform checked arithmetic
        let a = int_value(&l)?;
        let b = int_value(&r)?;
        let result = match op {
            BinaryOp::Add => a.checked_add(b),
            BinaryOp::Sub => a.checked_sub(b),
            BinaryOp::Mul => a.checked_mul(b),
            BinaryOp::Div => {
                if b == 0 {
                    return Err(DbError::Expression(
                        types::EvalError::new(types::EvalErrorKind::DivideByZero).to_string(),
                    ));
                }
                a.checked_div(b)
            }
            BinaryOp::Mod => {
                if b == 0 {
                    return Err(DbError::Expression(
                        types::EvalError::new(types::EvalErrorKind::DivideByZero).to_string(),
                    ));
                }
                a.checked_rem(b)
            }
            _ => unreachable!(),
        };
        match result {
            Some(v) => Ok(Any::Int8(v)),
            None => Err(DbError::Expression(
                types::EvalError::new(types::EvalErrorKind::Overflow).to_string(),
            )),
        }
    }

    fn decimal_arithmetic(&mut self, op: BinaryOp, a: Decimal, b: Decimal) -> DbResult<Any> {
        let scale = a.scale.max(b.scale);
        let (a, _) = a.rescale(scale);
        let (b, _) = b.rescale(scale);
        let value = match op {
            BinaryOp::Add => Decimal::new(a.coefficient + b.coefficient, scale),
            BinaryOp::Sub => Decimal::new(a.coefficient - b.coefficient, scale),
            BinaryOp::Mul => {
                let (rescaled, lost) =
                    Decimal::new(a.coefficient * b.coefficient, scale * 2).rescale(scale);
                if lost {
                    self.lost_precision = true;
                }
                rescaled
            }
            BinaryOp::Div => {
                if b.coefficient == 0 {
                    return Err(DbError::Expression(
                        types::EvalError::new(types::EvalErrorKind::DivideByZero).to_string(),
                    ));
                }
                let numerator = a.coefficient * 10i128.pow(scale as u32);
                Decimal::new(numerator / b.coefficient, scale)
            }
            BinaryOp::Mod => {
                if b.coefficient == 0 {
                    return Err(DbError::Expression(
                        types::EvalError::new(types::EvalErrorKind::DivideByZero).to_string(),
                    ));
                }
                Decimal::new(a.coefficient % b.coefficient, scale)
            }
            _ => unreachable!(),
        };
        Ok(Any::Decimal(value))
    }
}

fn to_decimal(v: &Any, scale: i8) -> Decimal {
    match v {
        Any::Decimal(d) => d.rescale(scale).0,
        _ => {
            let f = v.as_f64().unwrap_or(0.0);
            let coefficient = (f * 10f64.powi(scale as i32)).round() as i128;
            Decimal::new(coefficient, scale)
        }
    }
}

fn int_value(v: &Any) -> DbResult<i64> {
    match v {
        Any::Int1(x) => Ok(*x as i64),
        Any::Int2(x) => Ok(*x as i64),
        Any::Int4(x) => Ok(*x as i64),
        Any::Int8(x) => Ok(*x),
        _ => Err(DbError::Expression("non-integer operand".into())),
    }
}

fn bool_or_null(b: Option<bool>) -> Any {
    match b {
        Some(v) => Any::Boolean(v),
        None => Any::Null,
    }
}
