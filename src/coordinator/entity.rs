use serde_json::{Map, Value};
use tracing::info;

use super::{check_precondition, MutationCoordinator, MutationOutcome};
use crate::error::{CoreError, Result};
use crate::lock::{LockKind, LockManager, ResourceKey};
use crate::store::{DocumentKey, DocumentStore, IfMatch, StoreError};

impl<M: LockManager, D: DocumentStore, R> MutationCoordinator<M, D, R> {
    /// Create an entity. Of several racing creates exactly one wins; the
    /// others see `AlreadyExists` or, if they timed out while queued,
    /// lock overflow.
    pub fn create_entity(
        &self,
        key: &DocumentKey,
        body: Map<String, Value>,
    ) -> Result<MutationOutcome> {
        let _guard = self
            .locks
            .acquire(&key.lock_key(), LockKind::Structural, self.timeout)?;
        let doc = self.documents.write(key, body, Some(0))?;
        info!(entity = %key, version = doc.version, "entity created");
        Ok(MutationOutcome::Created(doc.etag()))
    }

    /// Replace an entity's body. The ETag is re-checked under the lock.
    pub fn update_entity(
        &self,
        key: &DocumentKey,
        body: Map<String, Value>,
        if_match: &IfMatch,
    ) -> Result<MutationOutcome> {
        let guard = self
            .locks
            .acquire(&key.lock_key(), LockKind::Content, self.timeout)?;
        let current = self
            .documents
            .get(key)?
            .ok_or_else(|| CoreError::not_found(key))?;
        check_precondition(key, Some(if_match), Some(current.etag()))?;
        guard.ensure_held()?;
        let doc = self.documents.write(key, body, Some(current.version))?;
        info!(entity = %key, version = doc.version, "entity updated");
        Ok(MutationOutcome::Updated(doc.etag()))
    }

    /// Merge `patch` into an entity's body; fields not named are kept.
    pub fn merge_entity(
        &self,
        key: &DocumentKey,
        patch: Map<String, Value>,
        if_match: &IfMatch,
    ) -> Result<MutationOutcome> {
        let guard = self
            .locks
            .acquire(&key.lock_key(), LockKind::Content, self.timeout)?;
        let current = self
            .documents
            .get(key)?
            .ok_or_else(|| CoreError::not_found(key))?;
        check_precondition(key, Some(if_match), Some(current.etag()))?;
        guard.ensure_held()?;
        let mut body = current.body;
        body.extend(patch);
        let doc = self.documents.write(key, body, Some(current.version))?;
        info!(entity = %key, version = doc.version, "entity merged");
        Ok(MutationOutcome::Updated(doc.etag()))
    }

    /// Delete an entity. Of several racing deletes exactly one succeeds;
    /// the rest see `NotFound`.
    pub fn delete_entity(&self, key: &DocumentKey, if_match: &IfMatch) -> Result<MutationOutcome> {
        let _guard = self
            .locks
            .acquire(&key.lock_key(), LockKind::Structural, self.timeout)?;
        let current = self
            .documents
            .get(key)?
            .ok_or_else(|| CoreError::not_found(key))?;
        check_precondition(key, Some(if_match), Some(current.etag()))?;
        self.documents.remove(key, Some(current.version))?;
        info!(entity = %key, "entity deleted");
        Ok(MutationOutcome::Deleted { removed: 1 })
    }

    /// Delete every entity of a set. Locks the set, then each member in key
    /// order; members already gone are skipped.
    pub fn delete_entity_set(&self, entity_type: &str) -> Result<MutationOutcome> {
        let _set = self.locks.acquire(
            &ResourceKey::entity_set(entity_type),
            LockKind::Structural,
            self.timeout,
        )?;
        let keys = self.documents.keys(entity_type)?;
        let lock_keys: Vec<ResourceKey> = keys.iter().map(DocumentKey::lock_key).collect();
        let _members = self
            .locks
            .acquire_in_order(&lock_keys, LockKind::Structural, self.timeout)?;

        let mut removed = 0;
        for key in &keys {
            match self.documents.remove(key, None) {
                Ok(_) => removed += 1,
                Err(StoreError::NotFound { .. }) => {}
                Err(err) => return Err(err.into()),
            }
        }
        info!(entity_type, removed, "entity set deleted");
        Ok(MutationOutcome::Deleted { removed })
    }

    /// Link two entities. Returns false if they were already linked.
    pub fn link_entities(&self, a: &DocumentKey, b: &DocumentKey) -> Result<bool> {
        let _guards = self.locks.acquire_in_order(
            &[a.lock_key(), b.lock_key()],
            LockKind::Content,
            self.timeout,
        )?;
        let added = self.documents.link(a, b)?;
        info!(source = %a, target = %b, added, "entities linked");
        Ok(added)
    }

    /// Returns false if the two were not linked.
    pub fn unlink_entities(&self, a: &DocumentKey, b: &DocumentKey) -> Result<bool> {
        let _guards = self.locks.acquire_in_order(
            &[a.lock_key(), b.lock_key()],
            LockKind::Content,
            self.timeout,
        )?;
        let removed = self.documents.unlink(a, b)?;
        info!(source = %a, target = %b, removed, "entities unlinked");
        Ok(removed)
    }
}
