use thiserror::Error;

/// Error type for lock operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LockError {
    /// The lock was not acquired before the caller's timeout.
    #[error("lock overflow on {key}: not acquired within {waited_ms}ms")]
    Overflow { key: String, waited_ms: u64 },

    /// The holder's lease ran out and another caller took the lock over.
    #[error("lock on {key} expired and was taken over")]
    Expired { key: String },

    /// The underlying primitive was poisoned (a thread panicked while holding it).
    #[error("lock poisoned: {0}")]
    Poisoned(String),
}

impl LockError {
    /// Overflow and expiry are transient; the caller may retry with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LockError::Overflow { .. } | LockError::Expired { .. })
    }
}
