//! Mutating operations run under the lock manager.
//!
//! Every mutation follows the same shape: acquire the lock(s) for the keys
//! it touches, re-check existence and ETag under the lock, write to the
//! store, release. Reads (PROPFIND, queries) take no lock.

mod dav;
mod entity;

use std::sync::Arc;
use std::time::Duration;

use crate::config::LockConfig;
use crate::error::{CoreError, Result};
use crate::lock::LockManager;
use crate::store::{ETag, IfMatch};

pub use dav::{Depth, PropfindEntry};

/// What a successful mutation did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOutcome {
    Created(ETag),
    /// The target existed and was overwritten.
    Replaced(ETag),
    Updated(ETag),
    Deleted { removed: usize },
}

impl MutationOutcome {
    pub fn etag(&self) -> Option<ETag> {
        match self {
            MutationOutcome::Created(tag)
            | MutationOutcome::Replaced(tag)
            | MutationOutcome::Updated(tag) => Some(*tag),
            MutationOutcome::Deleted { .. } => None,
        }
    }
}

/// Coordinates entity and resource mutations.
pub struct MutationCoordinator<M, D, R> {
    locks: Arc<M>,
    documents: Arc<D>,
    resources: Arc<R>,
    timeout: Duration,
}

impl<M: LockManager, D, R> MutationCoordinator<M, D, R> {
    pub fn new(locks: Arc<M>, documents: Arc<D>, resources: Arc<R>, config: &LockConfig) -> Self {
        Self {
            locks,
            documents,
            resources,
            timeout: config.timeout(),
        }
    }

    /// Override the lock acquisition timeout. Zero means "fail immediately
    /// if the lock is held".
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn documents(&self) -> &D {
        &self.documents
    }

    pub fn resources(&self) -> &R {
        &self.resources
    }

    pub fn locks(&self) -> &M {
        &self.locks
    }
}

/// Check an optional `If-Match` against the current ETag.
fn check_precondition(
    resource: &dyn std::fmt::Display,
    if_match: Option<&IfMatch>,
    current: Option<ETag>,
) -> Result<()> {
    let Some(if_match) = if_match else {
        return Ok(());
    };
    let satisfied = current.as_ref().is_some_and(|tag| if_match.matches(tag));
    if satisfied {
        Ok(())
    } else {
        Err(CoreError::PreconditionFailed {
            resource: resource.to_string(),
            expected: if_match.to_string(),
            actual: current.map_or_else(|| "none".to_string(), |tag| tag.to_string()),
        })
    }
}
