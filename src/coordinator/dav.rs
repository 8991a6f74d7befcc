use std::collections::BTreeMap;

use tracing::info;

use super::{check_precondition, MutationCoordinator, MutationOutcome};
use crate::error::{CoreError, Result};
use crate::lock::{LockKind, LockManager, ResourceKey};
use crate::resource::{ResourceKind, ResourceNode, ResourceStore};
use crate::store::{IfMatch, StoreError};

/// How far a PROPFIND descends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Depth {
    Zero,
    One,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropfindEntry {
    Found(ResourceNode),
    /// Listed as a child but gone by the time it was read.
    Vanished(ResourceKey),
}

impl<M: LockManager, D, R: ResourceStore> MutationCoordinator<M, D, R> {
    /// Create a cell, box or collection.
    pub fn create_resource(
        &self,
        key: &ResourceKey,
        kind: ResourceKind,
    ) -> Result<MutationOutcome> {
        if !kind.is_container() {
            return Err(CoreError::conflict(key, "files are created with put_file"));
        }
        let _guard = self
            .locks
            .acquire(key, LockKind::Structural, self.timeout)?;
        let node = self.resources.insert(key, kind)?;
        info!(resource = %key, kind = ?node.kind, "resource created");
        Ok(MutationOutcome::Created(node.etag()))
    }

    /// Create or overwrite a file.
    pub fn put_file(
        &self,
        key: &ResourceKey,
        content_type: &str,
        body: Vec<u8>,
        if_match: Option<&IfMatch>,
    ) -> Result<MutationOutcome> {
        let _guard = self
            .locks
            .acquire(key, LockKind::Structural, self.timeout)?;
        let current = self.resources.get(key)?.map(|n| n.etag());
        check_precondition(key, if_match, current)?;
        let (node, created) = self.resources.put_file(key, content_type, body)?;
        info!(resource = %key, version = node.version, created, "file written");
        Ok(if created {
            MutationOutcome::Created(node.etag())
        } else {
            MutationOutcome::Replaced(node.etag())
        })
    }

    /// Move a resource and its subtree. Racing moves onto one destination
    /// with `overwrite` yield at most one `Created`; the rest `Replaced`.
    pub fn move_resource(
        &self,
        from: &ResourceKey,
        to: &ResourceKey,
        overwrite: bool,
        if_match: Option<&IfMatch>,
    ) -> Result<MutationOutcome> {
        if from == to || from.is_ancestor_of(to) || to.is_ancestor_of(from) {
            return Err(CoreError::conflict(
                to,
                format!("cannot move {} onto {}", from, to),
            ));
        }
        let _guards = self.locks.acquire_in_order(
            &[from.clone(), to.clone()],
            LockKind::Structural,
            self.timeout,
        )?;
        let source = self
            .resources
            .get(from)?
            .ok_or_else(|| CoreError::not_found(from))?;
        check_precondition(from, if_match, Some(source.etag()))?;
        if !overwrite {
            if let Some(existing) = self.resources.get(to)? {
                return Err(CoreError::PreconditionFailed {
                    resource: to.to_string(),
                    expected: "no existing resource".into(),
                    actual: existing.etag().to_string(),
                });
            }
        }

        let replaced = self.resources.rename(from, to, overwrite)?;
        let moved = self
            .resources
            .get(to)?
            .ok_or_else(|| CoreError::not_found(to))?;
        info!(from = %from, to = %to, replaced, "resource moved");
        Ok(if replaced {
            MutationOutcome::Replaced(moved.etag())
        } else {
            MutationOutcome::Created(moved.etag())
        })
    }

    /// Delete a resource. With `recursive`, the resource is locked first
    /// and then every descendant in key order, so a racing delete of a
    /// child ends in `NotFound` on whichever side loses.
    pub fn delete_resource(
        &self,
        key: &ResourceKey,
        recursive: bool,
        if_match: Option<&IfMatch>,
    ) -> Result<MutationOutcome> {
        let _guard = self
            .locks
            .acquire(key, LockKind::Structural, self.timeout)?;
        let current = self
            .resources
            .get(key)?
            .ok_or_else(|| CoreError::not_found(key))?;
        check_precondition(key, if_match, Some(current.etag()))?;

        let removed = if recursive {
            let below = self.resources.descendants(key)?;
            let _members = self
                .locks
                .acquire_in_order(&below, LockKind::Structural, self.timeout)?;
            self.resources.remove_subtree(key)?.len()
        } else {
            self.resources.remove(key)?;
            1
        };
        info!(resource = %key, removed, "resource deleted");
        Ok(MutationOutcome::Deleted { removed })
    }

    /// Set and remove dead properties.
    pub fn proppatch(
        &self,
        key: &ResourceKey,
        set: BTreeMap<String, String>,
        remove: &[String],
    ) -> Result<MutationOutcome> {
        let _guard = self.locks.acquire(key, LockKind::Content, self.timeout)?;
        let node = self.resources.update_properties(key, set, remove)?;
        info!(resource = %key, version = node.version, "properties updated");
        Ok(MutationOutcome::Updated(node.etag()))
    }

    /// List a resource and, at depth one, its children. Takes no lock;
    /// children deleted mid-listing are reported as vanished.
    pub fn propfind(&self, key: &ResourceKey, depth: Depth) -> Result<Vec<PropfindEntry>> {
        let node = self
            .resources
            .get(key)?
            .ok_or_else(|| CoreError::not_found(key))?;
        let mut entries = vec![PropfindEntry::Found(node)];
        if depth == Depth::Zero {
            return Ok(entries);
        }

        let children = match self.resources.children(key) {
            Ok(children) => children,
            Err(StoreError::NotFound { .. }) => Vec::new(),
            Err(err) => return Err(err.into()),
        };
        for child in children {
            entries.push(match self.resources.get(&child)? {
                Some(node) => PropfindEntry::Found(node),
                None => PropfindEntry::Vanished(child),
            });
        }
        Ok(entries)
    }
}
