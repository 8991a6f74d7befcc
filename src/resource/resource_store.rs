use std::collections::BTreeMap;

use super::{ResourceKind, ResourceNode};
use crate::lock::ResourceKey;
use crate::store::StoreError;

/// Hierarchical storage for cells, boxes, collections and files.
///
/// Every node except a root cell needs an existing container as its parent.
pub trait ResourceStore: Send + Sync {
    fn get(&self, key: &ResourceKey) -> Result<Option<ResourceNode>, StoreError>;

    /// Create a node. Fails if it exists or its parent does not.
    fn insert(&self, key: &ResourceKey, kind: ResourceKind) -> Result<ResourceNode, StoreError>;

    /// Create or replace a file. Returns the node and whether it was created.
    fn put_file(
        &self,
        key: &ResourceKey,
        content_type: &str,
        body: Vec<u8>,
    ) -> Result<(ResourceNode, bool), StoreError>;

    /// Set and remove dead properties in one step.
    fn update_properties(
        &self,
        key: &ResourceKey,
        set: BTreeMap<String, String>,
        remove: &[String],
    ) -> Result<ResourceNode, StoreError>;

    /// Remove a leaf node. Containers with children are rejected.
    fn remove(&self, key: &ResourceKey) -> Result<ResourceNode, StoreError>;

    /// Remove a node with everything below it. Returns the removed keys.
    fn remove_subtree(&self, key: &ResourceKey) -> Result<Vec<ResourceKey>, StoreError>;

    /// Direct children, in key order.
    fn children(&self, key: &ResourceKey) -> Result<Vec<ResourceKey>, StoreError>;

    /// Every node below `key`, in key order.
    fn descendants(&self, key: &ResourceKey) -> Result<Vec<ResourceKey>, StoreError>;

    /// Move `from` and its subtree to `to`. With `overwrite`, an existing
    /// node at `to` is replaced along with its subtree. Returns whether
    /// something was replaced.
    fn rename(
        &self,
        from: &ResourceKey,
        to: &ResourceKey,
        overwrite: bool,
    ) -> Result<bool, StoreError>;
}
