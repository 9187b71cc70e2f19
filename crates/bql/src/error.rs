//! Error taxonomy for the query engine.
//!
//! Each pipeline stage has its own structured error type; `BqlError` wraps
//! them with a stage prefix so callers see "parse error: ...",
//! "validation error: ..." or "execution error: ..." and can match on the
//! stage. No stage retries internally.

use thiserror::Error;

/// Top-level error returned by `Executor::execute`.
#[derive(Debug, Error)]
pub enum BqlError {
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("execution error: {0}")]
    Execution(#[from] ExecutionError),
}

impl From<StoreError> for BqlError {
    fn from(err: StoreError) -> Self {
        BqlError::Execution(ExecutionError::Store(err))
    }
}

/// A lexical or grammar violation, positioned at the offending token.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}, found '{token}' at position {position}")]
pub struct ParseError {
    /// What the parser expected or what rule was violated
    pub message: String,
    /// Literal text of the offending token (empty at end of input)
    pub token: String,
    /// Byte offset of the offending token in the query text
    pub position: usize,
}

/// A semantic violation found while checking a parsed query against the
/// field registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("unknown field '{field}' (valid fields: {})", .valid_fields.join(", "))]
    UnknownField {
        field: String,
        valid_fields: Vec<String>,
    },

    #[error("operator '{op}' not allowed for {field_type} field '{field}'")]
    OperatorNotAllowed {
        field: String,
        field_type: &'static str,
        op: String,
    },

    #[error("field '{field}' expects a {expected} value, got {found} '{raw}'")]
    ValueMismatch {
        field: String,
        expected: &'static str,
        found: &'static str,
        raw: String,
    },

    #[error("invalid value '{value}' for field '{field}' (allowed: {})", .allowed.join(", "))]
    InvalidEnumValue {
        field: String,
        value: String,
        allowed: Vec<String>,
    },

    #[error("IN is not allowed for {field_type} field '{field}'")]
    InNotAllowed {
        field: String,
        field_type: &'static str,
    },
}

/// A failure while running the compiled query against the store.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("query cancelled")]
    Cancelled,
}

/// A failure in the storage backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("corrupt row for issue {id}: {reason}")]
    CorruptRow { id: String, reason: String },
}
