//! Error types for query sequences
//!
//! Error codes:
//! - SEQ_UNSUPPORTED_LOOKUP (REJECT, raised when the filter is built)
//! - SEQ_ORDERING_CONFLICT (ERROR, raised while merging)
//! - SEQ_DOES_NOT_EXIST / SEQ_MULTIPLE_OBJECTS_RETURNED (ERROR, from get())
//! - SEQ_FIELD_ERROR (ERROR, surfaced verbatim from a source)
//! - SEQ_INVALID_VALUE (REJECT)
//! - SEQ_INDEX_OUT_OF_RANGE (ERROR)
//! - SEQ_SLICE_TAKEN (REJECT)
//! - SEQ_CONFIG_INVALID (REJECT)

use std::fmt;

use thiserror::Error;

/// Result type for sequence operations
pub type QueryResult<T> = Result<T, QueryError>;

/// Severity levels for sequence errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The request was malformed and nothing was evaluated
    Reject,
    /// Evaluation started and failed
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Reject => write!(f, "REJECT"),
            Severity::Error => write!(f, "ERROR"),
        }
    }
}

/// Sequence errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueryError {
    /// A `#` lookup outside the supported set
    #[error("Unsupported lookup '{lookup}' for source index filtering")]
    UnsupportedLookup { lookup: String },

    /// Two values cannot be put in a common order
    #[error("Ordering conflict: {0}")]
    OrderingConflict(String),

    /// get() matched nothing
    #[error("Matching record does not exist: {0}")]
    DoesNotExist(String),

    /// get() matched more than one record
    #[error("get() returned more than one record (found {found})")]
    MultipleObjectsReturned { found: usize },

    /// Unknown field path, reported by a source
    #[error("Cannot resolve field '{field}' on {schema}")]
    FieldError { schema: String, field: String },

    /// Malformed argument (bad slice, uncastable `#` value, ...)
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// Single index past the end of the sequence
    #[error("Index {0} out of range")]
    IndexOutOfRange(usize),

    /// Operation not allowed once the window is fixed
    #[error("Cannot {0} once a slice has been taken")]
    SliceTaken(&'static str),

    /// Configuration could not be loaded
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl QueryError {
    /// Create an unsupported lookup error
    pub fn unsupported_lookup(lookup: impl Into<String>) -> Self {
        QueryError::UnsupportedLookup {
            lookup: lookup.into(),
        }
    }

    /// Create a field error
    pub fn field(schema: impl Into<String>, field: impl Into<String>) -> Self {
        QueryError::FieldError {
            schema: schema.into(),
            field: field.into(),
        }
    }

    /// Create an invalid value error
    pub fn invalid(reason: impl Into<String>) -> Self {
        QueryError::InvalidValue(reason.into())
    }

    /// Returns the string code
    pub fn code(&self) -> &'static str {
        match self {
            QueryError::UnsupportedLookup { .. } => "SEQ_UNSUPPORTED_LOOKUP",
            QueryError::OrderingConflict(_) => "SEQ_ORDERING_CONFLICT",
            QueryError::DoesNotExist(_) => "SEQ_DOES_NOT_EXIST",
            QueryError::MultipleObjectsReturned { .. } => "SEQ_MULTIPLE_OBJECTS_RETURNED",
            QueryError::FieldError { .. } => "SEQ_FIELD_ERROR",
            QueryError::InvalidValue(_) => "SEQ_INVALID_VALUE",
            QueryError::IndexOutOfRange(_) => "SEQ_INDEX_OUT_OF_RANGE",
            QueryError::SliceTaken(_) => "SEQ_SLICE_TAKEN",
            QueryError::Config(_) => "SEQ_CONFIG_INVALID",
        }
    }

    /// Returns the severity level
    pub fn severity(&self) -> Severity {
        match self {
            QueryError::UnsupportedLookup { .. }
            | QueryError::InvalidValue(_)
            | QueryError::SliceTaken(_)
            | QueryError::Config(_) => Severity::Reject,
            _ => Severity::Error,
        }
    }
}
