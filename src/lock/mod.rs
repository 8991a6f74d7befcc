//! Per-resource exclusive locks with bounded waits.

mod error;
mod in_memory;
mod key;
#[allow(clippy::module_inception)]
mod lock;
mod lock_manager;

pub use error::LockError;
pub use in_memory::{InMemoryLock, InMemoryLockManager};
pub use key::{LockKind, ResourceKey};
pub use lock::{Lock, LockToken};
pub use lock_manager::{LockGuard, LockManager};
