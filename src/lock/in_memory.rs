use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tracing::warn;

use super::{Lock, LockError, LockManager, LockToken, ResourceKey};

/// Upper bound for one acquire call, so deadline arithmetic never overflows.
const MAX_WAIT: Duration = Duration::from_secs(24 * 60 * 60);

struct Tenure {
    token: LockToken,
    since: Instant,
}

#[derive(Default)]
struct LockState {
    holder: Option<Tenure>,
    issued: u64,
}

/// In-memory lock backed by `Mutex` + `Condvar`.
///
/// A holder keeps the lock until it releases it or, when a lease is
/// configured, until the lease runs out. An expired tenure is taken over
/// by the next acquirer, which gets a higher fencing token.
pub struct InMemoryLock {
    key: String,
    lease: Option<Duration>,
    state: Mutex<LockState>,
    wake: Condvar,
}

impl InMemoryLock {
    pub fn new(key: impl Into<String>) -> Self {
        InMemoryLock {
            key: key.into(),
            lease: None,
            state: Mutex::new(LockState::default()),
            wake: Condvar::new(),
        }
    }

    pub fn with_lease(mut self, lease: Duration) -> Self {
        self.lease = Some(lease);
        self
    }

    fn state(&self) -> Result<MutexGuard<'_, LockState>, LockError> {
        self.state
            .lock()
            .map_err(|e| LockError::Poisoned(e.to_string()))
    }

    fn expired(&self, tenure: &Tenure) -> bool {
        matches!(self.lease, Some(lease) if tenure.since.elapsed() >= lease)
    }

    /// Whether the current holder (if any) blocks a new acquirer.
    fn blocked(&self, state: &LockState) -> bool {
        match &state.holder {
            None => false,
            Some(tenure) if self.expired(tenure) => {
                warn!(
                    key = %self.key,
                    token = tenure.token.0,
                    "lock lease expired, taking over"
                );
                false
            }
            Some(_) => true,
        }
    }

    fn grant(state: &mut LockState) -> LockToken {
        state.issued += 1;
        let token = LockToken(state.issued);
        state.holder = Some(Tenure {
            token,
            since: Instant::now(),
        });
        token
    }
}

impl Lock for InMemoryLock {
    fn acquire(&self, timeout: Duration) -> Result<LockToken, LockError> {
        let started = Instant::now();
        let deadline = started + timeout.min(MAX_WAIT);
        let mut state = self.state()?;
        while self.blocked(&state) {
            let now = Instant::now();
            if now >= deadline {
                return Err(LockError::Overflow {
                    key: self.key.clone(),
                    waited_ms: started.elapsed().as_millis() as u64,
                });
            }
            let mut wait = deadline - now;
            if let (Some(lease), Some(tenure)) = (self.lease, &state.holder) {
                wait = wait.min(lease.saturating_sub(tenure.since.elapsed()));
            }
            let (next, _) = self
                .wake
                .wait_timeout(state, wait)
                .map_err(|e| LockError::Poisoned(e.to_string()))?;
            state = next;
        }
        Ok(Self::grant(&mut state))
    }

    fn try_acquire(&self) -> Result<Option<LockToken>, LockError> {
        let mut state = self.state()?;
        if self.blocked(&state) {
            Ok(None)
        } else {
            Ok(Some(Self::grant(&mut state)))
        }
    }

    fn release(&self, token: LockToken) -> Result<bool, LockError> {
        let mut state = self.state()?;
        match &state.holder {
            Some(tenure) if tenure.token == token => {
                state.holder = None;
                self.wake.notify_one();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn is_held_by(&self, token: LockToken) -> Result<bool, LockError> {
        let state = self.state()?;
        Ok(matches!(&state.holder, Some(t) if t.token == token && !self.expired(t)))
    }

    fn is_held(&self) -> Result<bool, LockError> {
        let state = self.state()?;
        Ok(matches!(&state.holder, Some(t) if !self.expired(t)))
    }
}

/// In-memory lock manager backed by a `HashMap<ResourceKey, Arc<InMemoryLock>>`.
///
/// Lazily creates one `InMemoryLock` per key and returns the same `Arc` for
/// repeated lookups. Entries nobody holds or waits for are pruned on release.
pub struct InMemoryLockManager {
    lease: Option<Duration>,
    locks: Mutex<HashMap<ResourceKey, Arc<InMemoryLock>>>,
}

impl InMemoryLockManager {
    pub fn new() -> Self {
        InMemoryLockManager {
            lease: None,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Locks handed out by this manager expire after `lease`.
    pub fn with_lease(lease: Duration) -> Self {
        InMemoryLockManager {
            lease: Some(lease),
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Number of keys currently tracked.
    pub fn tracked(&self) -> usize {
        self.locks.lock().map(|locks| locks.len()).unwrap_or(0)
    }
}

impl Default for InMemoryLockManager {
    fn default() -> Self {
        Self::new()
    }
}

impl LockManager for InMemoryLockManager {
    type Lock = InMemoryLock;

    fn get_lock(&self, key: &ResourceKey) -> Result<Arc<InMemoryLock>, LockError> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|_| LockError::Poisoned("lock manager map poisoned".into()))?;
        Ok(locks
            .entry(key.clone())
            .or_insert_with(|| {
                let lock = InMemoryLock::new(key.to_string());
                Arc::new(match self.lease {
                    Some(lease) => lock.with_lease(lease),
                    None => lock,
                })
            })
            .clone())
    }

    fn prune(&self, key: &ResourceKey) {
        let Ok(mut locks) = self.locks.lock() else {
            return;
        };
        // Clones are only made under the map mutex, so a count of one
        // means no holder or waiter can appear while we decide.
        let idle = match locks.get(key) {
            Some(lock) => Arc::strong_count(lock) == 1 && !lock.is_held().unwrap_or(true),
            None => false,
        };
        if idle {
            locks.remove(key);
        }
    }
}
