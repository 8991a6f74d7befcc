use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::{Lock, LockError, LockKind, LockToken, ResourceKey};

/// Factory trait for obtaining per-resource locks.
///
/// The mutation coordinator asks a `LockManager` for the lock of each
/// resource it touches. The default `InMemoryLockManager` stores locks in a
/// `HashMap`; distributed implementations might talk to Redis, Postgres, etc.
pub trait LockManager: Send + Sync {
    /// The concrete lock type returned by this manager.
    type Lock: Lock;

    /// Get (or create) the lock for `key`.
    ///
    /// Repeated calls with the same key must return the same logical lock
    /// (i.e. the same `Arc` for in-memory, or the same distributed key).
    fn get_lock(&self, key: &ResourceKey) -> Result<Arc<Self::Lock>, LockError>;

    /// Forget the lock for `key` if nobody holds or waits for it.
    /// Called after every release.
    fn prune(&self, _key: &ResourceKey) {}

    /// Acquire the lock for `key`, waiting at most `timeout`.
    fn acquire(
        &self,
        key: &ResourceKey,
        kind: LockKind,
        timeout: Duration,
    ) -> Result<LockGuard<'_, Self>, LockError>
    where
        Self: Sized,
    {
        let lock = self.get_lock(key)?;
        match lock.acquire(timeout) {
            Ok(token) => {
                debug!(key = %key, ?kind, token = token.0, "lock acquired");
                Ok(LockGuard::new(self, lock, key.clone(), kind, token))
            }
            Err(err) => {
                drop(lock);
                self.prune(key);
                if let LockError::Overflow { waited_ms, .. } = &err {
                    warn!(key = %key, ?kind, waited_ms, "lock overflow");
                }
                Err(err)
            }
        }
    }

    /// Acquire the lock for `key` only if it is free right now.
    fn try_acquire(
        &self,
        key: &ResourceKey,
        kind: LockKind,
    ) -> Result<Option<LockGuard<'_, Self>>, LockError>
    where
        Self: Sized,
    {
        let lock = self.get_lock(key)?;
        match lock.try_acquire()? {
            Some(token) => {
                debug!(key = %key, ?kind, token = token.0, "lock acquired");
                Ok(Some(LockGuard::new(self, lock, key.clone(), kind, token)))
            }
            None => {
                drop(lock);
                self.prune(key);
                Ok(None)
            }
        }
    }

    /// Acquire several locks in ascending key order within one shared
    /// deadline. Duplicate keys are locked once. On failure every lock
    /// already taken is released.
    fn acquire_in_order(
        &self,
        keys: &[ResourceKey],
        kind: LockKind,
        timeout: Duration,
    ) -> Result<Vec<LockGuard<'_, Self>>, LockError>
    where
        Self: Sized,
    {
        let mut unique: Vec<&ResourceKey> = keys.iter().collect();
        unique.sort_unstable();
        unique.dedup();

        let deadline = Instant::now() + timeout;
        let mut guards = Vec::with_capacity(unique.len());
        for key in unique {
            let remaining = deadline.saturating_duration_since(Instant::now());
            guards.push(self.acquire(key, kind, remaining)?);
        }
        Ok(guards)
    }
}

/// Holds one lock tenure; releases it when dropped.
pub struct LockGuard<'a, M: LockManager> {
    manager: &'a M,
    lock: Option<Arc<M::Lock>>,
    key: ResourceKey,
    kind: LockKind,
    token: LockToken,
    acquired_at: Instant,
}

impl<'a, M: LockManager> LockGuard<'a, M> {
    fn new(
        manager: &'a M,
        lock: Arc<M::Lock>,
        key: ResourceKey,
        kind: LockKind,
        token: LockToken,
    ) -> Self {
        Self {
            manager,
            lock: Some(lock),
            key,
            kind,
            token,
            acquired_at: Instant::now(),
        }
    }

    pub fn key(&self) -> &ResourceKey {
        &self.key
    }

    pub fn kind(&self) -> LockKind {
        self.kind
    }

    pub fn token(&self) -> LockToken {
        self.token
    }

    /// Fail with [`LockError::Expired`] if this tenure has been taken over.
    pub fn ensure_held(&self) -> Result<(), LockError> {
        let held = match &self.lock {
            Some(lock) => lock.is_held_by(self.token)?,
            None => false,
        };
        if held {
            Ok(())
        } else {
            Err(LockError::Expired {
                key: self.key.to_string(),
            })
        }
    }

    /// Release explicitly. Returns `Ok(false)` if the tenure had already
    /// been superseded.
    pub fn release(mut self) -> Result<bool, LockError> {
        self.release_inner()
    }

    fn release_inner(&mut self) -> Result<bool, LockError> {
        let Some(lock) = self.lock.take() else {
            return Ok(false);
        };
        let released = lock.release(self.token);
        drop(lock);
        self.manager.prune(&self.key);
        debug!(
            key = %self.key,
            kind = ?self.kind,
            token = self.token.0,
            held_ms = self.acquired_at.elapsed().as_millis() as u64,
            "lock released"
        );
        released
    }
}

impl<M: LockManager> Drop for LockGuard<'_, M> {
    fn drop(&mut self) {
        if let Err(err) = self.release_inner() {
            warn!(key = %self.key, error = %err, "lock release failed");
        }
    }
}

impl<M: LockManager> std::fmt::Debug for LockGuard<'_, M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockGuard")
            .field("key", &self.key)
            .field("kind", &self.kind)
            .field("token", &self.token)
            .finish()
    }
}
