use thiserror::Error;

/// Error type for document and resource store operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("{key} already exists")]
    AlreadyExists { key: String },

    #[error("{key} not found")]
    NotFound { key: String },

    /// Optimistic concurrency conflict.
    #[error("version conflict on {key}: expected {expected}, found {actual}")]
    VersionConflict {
        key: String,
        expected: u64,
        actual: u64,
    },

    /// A container still has children.
    #[error("{key} is not empty")]
    NotEmpty { key: String },

    #[error("invalid request on {key}: {message}")]
    Invalid { key: String, message: String },

    /// Storage-level error.
    #[error("storage error: {0}")]
    Storage(String),
}

impl StoreError {
    pub(crate) fn poisoned() -> Self {
        StoreError::Storage("lock poisoned".into())
    }
}
