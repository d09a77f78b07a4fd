//! Scalar expression AST evaluated against one row at a time.

use serde::{Deserialize, Serialize};
use types::{Any, FieldType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Concat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Neg,
    Not,
    IsNull,
    IsNotNull,
    /// Character count (not byte count) of a character value.
    Length,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Expr {
    Literal(LiteralValue),
    /// Resolved column ordinal within the row being evaluated against.
    Column(usize),
    /// A bound parameter ordinal, resolved from the request's parameter
    /// list rather than from the current row.
    Param(usize),
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Cast {
        expr: Box<Expr>,
        target: FieldType,
        lenient: bool,
    },
    Like {
        expr: Box<Expr>,
        pattern: Box<Expr>,
        escape: Option<char>,
    },
}

/// A literal embedded in the AST. Kept separate from `types::Any` so the
/// AST stays `Serialize`/`Deserialize`/`Eq`-friendly without dragging
/// `Any`'s error/index variants along.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LiteralValue {
    Null,
    Boolean(bool),
    Int4(i32),
    Int8(i64),
    Float8(f64),
    Decimal { coefficient: i128, scale: i8 },
    Character(String),
}

impl LiteralValue {
    pub fn to_any(&self) -> Any {
        match self {
            LiteralValue::Null => Any::Null,
            LiteralValue::Boolean(b) => Any::Boolean(*b),
            LiteralValue::Int4(v) => Any::Int4(*v),
            LiteralValue::Int8(v) => Any::Int8(*v),
            LiteralValue::Float8(v) => Any::Float8(*v),
            LiteralValue::Decimal { coefficient, scale } => {
                Any::Decimal(types::Decimal::new(*coefficient, *scale))
            }
            LiteralValue::Character(s) => Any::Character(std::sync::Arc::from(s.as_str())),
        }
    }
}

impl Expr {
    pub fn lit(value: LiteralValue) -> Self {
        Expr::Literal(value)
    }

    pub fn col(ordinal: usize) -> Self {
        Expr::Column(ordinal)
    }

    pub fn param(ordinal: usize) -> Self {
        Expr::Param(ordinal)
    }

    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Self {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn unary(op: UnaryOp, expr: Expr) -> Self {
        Expr::Unary {
            op,
            expr: Box::new(expr),
        }
    }
}
