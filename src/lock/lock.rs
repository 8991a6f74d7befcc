use std::time::Duration;

use super::LockError;

/// Fencing token identifying one tenure of a lock.
///
/// Tokens increase with every acquisition of the same lock, so a holder
/// whose lease was taken over can tell that it no longer owns the lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LockToken(pub u64);

/// Trait for a single lock instance.
///
/// Implementations provide a bounded blocking acquire, a non-blocking
/// try-acquire, and a token-checked release. In-memory locks use
/// `Mutex` + `Condvar`; distributed locks might use Redis, Postgres
/// advisory locks, etcd leases, etc.
pub trait Lock: Send + Sync {
    /// Acquire the lock, waiting at most `timeout`.
    ///
    /// Returns [`LockError::Overflow`] if the lock is still held when the
    /// timeout elapses.
    fn acquire(&self, timeout: Duration) -> Result<LockToken, LockError>;

    /// Try to acquire the lock without blocking.
    /// Returns `Ok(None)` if it is held by someone else.
    fn try_acquire(&self) -> Result<Option<LockToken>, LockError>;

    /// Release the lock if `token` still holds it.
    /// Returns `Ok(false)` when the tenure was already superseded.
    fn release(&self, token: LockToken) -> Result<bool, LockError>;

    /// Whether `token` is the current, unexpired holder.
    fn is_held_by(&self, token: LockToken) -> Result<bool, LockError>;

    /// Whether anyone currently holds the lock.
    fn is_held(&self) -> Result<bool, LockError>;
}
