//! Scalar expression AST and evaluator: arithmetic, comparisons, boolean
//! logic with proper three-valued NULL propagation, typed casts, and
//! `LIKE ... ESCAPE`.

pub mod ast;
pub mod cast;
pub mod eval;
pub mod like;

pub use ast::{BinaryOp, Expr, LiteralValue, UnaryOp};
pub use eval::EvaluatorContext;
pub use like::sql_like;
