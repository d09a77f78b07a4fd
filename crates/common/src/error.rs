//! Canonical error type shared across the engine's crates.
//!
//! Grouped the way the write/evaluation error taxonomy groups its codes:
//! one `thiserror` variant per family, each carrying a message. A separate
//! `Status` distinguishes cases where the same code family needs a more
//! specific caller-visible outcome (e.g. a unique-constraint violation is
//! always `Status::UniqueConstraintViolation`, never a generic executor
//! failure).

use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    Ok,
    NotFound,
    AlreadyExists,
    ErrUniqueConstraintViolation,
    ErrNotNullConstraintViolation,
    ErrValueTooLong,
    ErrUnsupportedRuntimeFeature,
    ErrSerializationFailure,
    ErrWritePreserveViolation,
    ErrInactiveTransaction,
    ErrRestrictedReadArea,
    Err,
}

#[derive(Error, Debug)]
pub enum DbError {
    #[error("planning: {0}")]
    Planning(String),
    #[error("type error: {0}")]
    Type(String),
    #[error("symbol error: {0}")]
    Symbol(String),
    #[error("expression error: {0}")]
    Expression(String),
    #[error("constraint violation: {0}")]
    Constraint(String),
    #[error("unique constraint violation: {0}")]
    UniqueConstraintViolation(String),
    #[error("not-null constraint violation: {0}")]
    NotNullConstraintViolation(String),
    #[error("value too long: {0}")]
    ValueTooLong(String),
    #[error("unsupported runtime feature: {0}")]
    UnsupportedRuntimeFeature(String),
    #[error("catalog: {0}")]
    Catalog(String),
    #[error("kvs: {0}")]
    Kvs(String),
    #[error("serialization failure: {0}")]
    SerializationFailure(String),
    #[error("write preserve violation: {0}")]
    WritePreserveViolation(String),
    #[error("read operation on restricted read area: {0}")]
    RestrictedReadArea(String),
    #[error("inactive transaction: {0}")]
    InactiveTransaction(String),
    #[error("concurrency: {0}")]
    Concurrency(String),
    #[error("resource exhausted: {0}")]
    Resource(String),
    #[error("system: {0}")]
    System(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl DbError {
    /// The `Status` a caller should surface for this error, for the
    /// families where status and code diverge from a plain 1:1 mapping.
    pub fn status(&self) -> Status {
        match self {
            DbError::UniqueConstraintViolation(_) => Status::ErrUniqueConstraintViolation,
            DbError::NotNullConstraintViolation(_) => Status::ErrNotNullConstraintViolation,
            DbError::ValueTooLong(_) => Status::ErrValueTooLong,
            DbError::UnsupportedRuntimeFeature(_) => Status::ErrUnsupportedRuntimeFeature,
            DbError::SerializationFailure(_) => Status::ErrSerializationFailure,
            DbError::WritePreserveViolation(_) => Status::ErrWritePreserveViolation,
            DbError::InactiveTransaction(_) => Status::ErrInactiveTransaction,
            DbError::RestrictedReadArea(_) => Status::ErrRestrictedReadArea,
            _ => Status::Err,
        }
    }
}

pub type DbResult<T> = Result<T, DbError>;
