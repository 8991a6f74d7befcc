//! Crate-wide error type.
//!
//! Each layer has its own error enum; they all convert into [`CoreError`] so
//! `?` works across layers. [`CoreError::code`] yields the stable code a
//! protocol front end reports to clients.

use crate::filter::{ParseError, ValidationError};
use crate::lock::LockError;
use crate::query::QueryError;
use crate::store::StoreError;

/// The result type used throughout the crate.
pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Lock(#[from] LockError),

    /// The caller's `If-Match` did not match the current ETag.
    #[error("precondition failed on {resource}: expected {expected}, found {actual}")]
    PreconditionFailed {
        resource: String,
        expected: String,
        actual: String,
    },

    #[error("not found: {resource}")]
    NotFound { resource: String },

    #[error("already exists: {resource}")]
    AlreadyExists { resource: String },

    #[error("conflict on {resource}: {message}")]
    Conflict { resource: String, message: String },

    #[error("storage error: {0}")]
    Storage(String),
}

/// Coarse classification of a [`CoreError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Parse,
    UnknownQueryKey,
    TypeMismatch,
    OutOfRange,
    QueryLimitExceeded,
    LockOverflow,
    PreconditionFailed,
    NotFound,
    AlreadyExists,
    Conflict,
    Storage,
}

impl CoreError {
    #[must_use]
    pub fn not_found(resource: impl ToString) -> Self {
        Self::NotFound {
            resource: resource.to_string(),
        }
    }

    #[must_use]
    pub fn conflict(resource: impl ToString, message: impl Into<String>) -> Self {
        Self::Conflict {
            resource: resource.to_string(),
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::Parse(ParseError::UnknownQueryKey { .. })
            | CoreError::Validation(ValidationError::UnknownQueryKey { .. }) => {
                ErrorKind::UnknownQueryKey
            }
            CoreError::Parse(_)
            | CoreError::Validation(ValidationError::OrderingOnBoolean { .. }) => ErrorKind::Parse,
            CoreError::Validation(ValidationError::TypeMismatch { .. }) => ErrorKind::TypeMismatch,
            CoreError::Validation(ValidationError::OutOfRange { .. }) => ErrorKind::OutOfRange,
            CoreError::Query(QueryError::LimitExceeded { .. })
            | CoreError::Query(QueryError::ExpandCountExceeded { .. }) => {
                ErrorKind::QueryLimitExceeded
            }
            CoreError::Query(_) => ErrorKind::Parse,
            CoreError::Lock(LockError::Poisoned(_)) | CoreError::Storage(_) => ErrorKind::Storage,
            CoreError::Lock(_) => ErrorKind::LockOverflow,
            CoreError::PreconditionFailed { .. } => ErrorKind::PreconditionFailed,
            CoreError::NotFound { .. } => ErrorKind::NotFound,
            CoreError::AlreadyExists { .. } => ErrorKind::AlreadyExists,
            CoreError::Conflict { .. } => ErrorKind::Conflict,
        }
    }

    /// Stable error code.
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::Parse(err) => match err {
                ParseError::Syntax { .. } => "FILTER_PARSE_ERROR",
                ParseError::UnknownQueryKey { .. } => "UNKNOWN_QUERY_KEY",
                ParseError::Unescape { .. } => "OPERATOR_AND_OPERAND_UNABLE_TO_UNESCAPE",
                ParseError::UnsupportedOperator(_) => "UNSUPPORTED_QUERY_OPERATOR",
                ParseError::UnsupportedFunction(_) => "UNSUPPORTED_QUERY_FUNCTION",
            },
            CoreError::Validation(err) => match err {
                ValidationError::UnknownQueryKey { .. } => "UNKNOWN_QUERY_KEY",
                ValidationError::TypeMismatch { .. } => "OPERATOR_AND_OPERAND_TYPE_MISMATCHED",
                ValidationError::OutOfRange { .. } => "UNSUPPORTED_OPERAND_FORMAT",
                ValidationError::OrderingOnBoolean { .. } => "FILTER_PARSE_ERROR",
            },
            CoreError::Query(err) => match err {
                QueryError::LimitExceeded { .. } | QueryError::Keyword(_) => "QUERY_INVALID_ERROR",
                QueryError::InvalidParam { .. } => "QUERY_PARSE_ERROR_WITH_PARAM",
                QueryError::ExpandCountExceeded { .. } => "EXPAND_COUNT_LIMITATION_EXCEEDED",
                QueryError::Expand(_) => "EXPAND_PARSE_ERROR",
                QueryError::OrderBy(_) => "ORDERBY_PARSE_ERROR",
                QueryError::Select(_) => "SELECT_PARSE_ERROR",
                QueryError::InlineCount(_) => "INLINECOUNT_PARSE_ERROR",
            },
            CoreError::Lock(LockError::Poisoned(_)) => "STORAGE_ERROR",
            CoreError::Lock(_) => "LOCK_OVERFLOW",
            CoreError::PreconditionFailed { .. } => "PRECONDITION_FAILED",
            CoreError::NotFound { .. } => "NOT_FOUND",
            CoreError::AlreadyExists { .. } => "ALREADY_EXISTS",
            CoreError::Conflict { .. } => "CONFLICT",
            CoreError::Storage(_) => "STORAGE_ERROR",
        }
    }

    /// Only lock overflow is worth retrying; the core itself never retries.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::LockOverflow
    }

    /// True for every error caused by the request itself.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            CoreError::Parse(_) | CoreError::Validation(_) | CoreError::Query(_)
        )
    }

    /// HTTP status a front end would answer with.
    pub fn http_status(&self) -> u16 {
        match self.kind() {
            ErrorKind::Parse
            | ErrorKind::UnknownQueryKey
            | ErrorKind::TypeMismatch
            | ErrorKind::OutOfRange
            | ErrorKind::QueryLimitExceeded => 400,
            ErrorKind::NotFound => 404,
            ErrorKind::AlreadyExists | ErrorKind::Conflict => 409,
            ErrorKind::PreconditionFailed => 412,
            ErrorKind::LockOverflow => 503,
            ErrorKind::Storage => 500,
        }
    }
}

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::AlreadyExists { key } => CoreError::AlreadyExists { resource: key },
            StoreError::NotFound { key } => CoreError::NotFound { resource: key },
            StoreError::VersionConflict {
                key,
                expected,
                actual,
            } => CoreError::Conflict {
                resource: key,
                message: format!("expected version {}, found {}", expected, actual),
            },
            StoreError::NotEmpty { key } => CoreError::Conflict {
                resource: key,
                message: "collection is not empty".into(),
            },
            StoreError::Invalid { key, message } => CoreError::Conflict {
                resource: key,
                message,
            },
            StoreError::Storage(message) => CoreError::Storage(message),
        }
    }
}
