use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;

use super::{ResourceKind, ResourceNode, ResourceStore};
use crate::lock::ResourceKey;
use crate::store::StoreError;

type Nodes = BTreeMap<ResourceKey, ResourceNode>;

/// In-memory resource tree.
///
/// Keys order ancestor-first, so every subtree is one contiguous range of
/// the map.
#[derive(Clone, Default)]
pub struct InMemoryResourceStore {
    storage: Arc<RwLock<Nodes>>,
}

impl InMemoryResourceStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Nodes>, StoreError> {
        self.storage.read().map_err(|_| StoreError::poisoned())
    }

    fn write_lock(&self) -> Result<RwLockWriteGuard<'_, Nodes>, StoreError> {
        self.storage.write().map_err(|_| StoreError::poisoned())
    }
}

fn not_found(key: &ResourceKey) -> StoreError {
    StoreError::NotFound {
        key: key.to_string(),
    }
}

fn below<'a>(nodes: &'a Nodes, key: &'a ResourceKey) -> impl Iterator<Item = &'a ResourceKey> {
    nodes
        .range((Bound::Excluded(key.clone()), Bound::Unbounded))
        .map(|(k, _)| k)
        .take_while(move |k| key.is_ancestor_of(k))
}

fn check_parent(nodes: &Nodes, key: &ResourceKey) -> Result<(), StoreError> {
    let Some(parent) = key.parent() else {
        return Ok(());
    };
    match nodes.get(&parent) {
        None => Err(not_found(&parent)),
        Some(node) if !node.is_container() => Err(StoreError::Invalid {
            key: key.to_string(),
            message: format!("{} is not a collection", parent),
        }),
        Some(_) => Ok(()),
    }
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

impl ResourceStore for InMemoryResourceStore {
    fn get(&self, key: &ResourceKey) -> Result<Option<ResourceNode>, StoreError> {
        Ok(self.read()?.get(key).cloned())
    }

    fn insert(&self, key: &ResourceKey, kind: ResourceKind) -> Result<ResourceNode, StoreError> {
        let mut nodes = self.write_lock()?;
        if nodes.contains_key(key) {
            return Err(StoreError::AlreadyExists {
                key: key.to_string(),
            });
        }
        check_parent(&nodes, key)?;
        let now = now_millis();
        let node = ResourceNode {
            key: key.clone(),
            kind,
            body: Vec::new(),
            properties: BTreeMap::new(),
            version: 1,
            created: now,
            updated: now,
        };
        nodes.insert(key.clone(), node.clone());
        Ok(node)
    }

    fn put_file(
        &self,
        key: &ResourceKey,
        content_type: &str,
        body: Vec<u8>,
    ) -> Result<(ResourceNode, bool), StoreError> {
        let mut nodes = self.write_lock()?;
        let now = now_millis();
        if let Some(existing) = nodes.get_mut(key) {
            if existing.is_container() {
                return Err(StoreError::Invalid {
                    key: key.to_string(),
                    message: "a collection cannot be overwritten by a file".into(),
                });
            }
            existing.kind = ResourceKind::File {
                content_type: content_type.to_string(),
            };
            existing.body = body;
            existing.version += 1;
            existing.updated = now.max(existing.updated);
            return Ok((existing.clone(), false));
        }

        check_parent(&nodes, key)?;
        let node = ResourceNode {
            key: key.clone(),
            kind: ResourceKind::File {
                content_type: content_type.to_string(),
            },
            body,
            properties: BTreeMap::new(),
            version: 1,
            created: now,
            updated: now,
        };
        nodes.insert(key.clone(), node.clone());
        Ok((node, true))
    }

    fn update_properties(
        &self,
        key: &ResourceKey,
        set: BTreeMap<String, String>,
        remove: &[String],
    ) -> Result<ResourceNode, StoreError> {
        let mut nodes = self.write_lock()?;
        let node = nodes.get_mut(key).ok_or_else(|| not_found(key))?;
        node.properties.extend(set);
        for name in remove {
            node.properties.remove(name);
        }
        node.version += 1;
        node.updated = now_millis().max(node.updated);
        Ok(node.clone())
    }

    fn remove(&self, key: &ResourceKey) -> Result<ResourceNode, StoreError> {
        let mut nodes = self.write_lock()?;
        if !nodes.contains_key(key) {
            return Err(not_found(key));
        }
        if below(&nodes, key).next().is_some() {
            return Err(StoreError::NotEmpty {
                key: key.to_string(),
            });
        }
        nodes.remove(key).ok_or_else(|| not_found(key))
    }

    fn remove_subtree(&self, key: &ResourceKey) -> Result<Vec<ResourceKey>, StoreError> {
        let mut nodes = self.write_lock()?;
        if !nodes.contains_key(key) {
            return Err(not_found(key));
        }
        let mut removed = vec![key.clone()];
        removed.extend(below(&nodes, key).cloned());
        for k in &removed {
            nodes.remove(k);
        }
        Ok(removed)
    }

    fn children(&self, key: &ResourceKey) -> Result<Vec<ResourceKey>, StoreError> {
        let nodes = self.read()?;
        if !nodes.contains_key(key) {
            return Err(not_found(key));
        }
        let depth = key.depth() + 1;
        Ok(below(&nodes, key)
            .filter(|k| k.depth() == depth)
            .cloned()
            .collect())
    }

    fn descendants(&self, key: &ResourceKey) -> Result<Vec<ResourceKey>, StoreError> {
        let nodes = self.read()?;
        if !nodes.contains_key(key) {
            return Err(not_found(key));
        }
        Ok(below(&nodes, key).cloned().collect())
    }

    fn rename(
        &self,
        from: &ResourceKey,
        to: &ResourceKey,
        overwrite: bool,
    ) -> Result<bool, StoreError> {
        if from == to || from.is_ancestor_of(to) || to.is_ancestor_of(from) {
            return Err(StoreError::Invalid {
                key: to.to_string(),
                message: format!("cannot move {} onto {}", from, to),
            });
        }
        let mut nodes = self.write_lock()?;
        if !nodes.contains_key(from) {
            return Err(not_found(from));
        }
        check_parent(&nodes, to)?;

        let replaced = nodes.contains_key(to);
        if replaced {
            if !overwrite {
                return Err(StoreError::AlreadyExists {
                    key: to.to_string(),
                });
            }
            let mut doomed = vec![to.clone()];
            doomed.extend(below(&nodes, to).cloned());
            for k in &doomed {
                nodes.remove(k);
            }
        }

        let mut moving = vec![from.clone()];
        moving.extend(below(&nodes, from).cloned());
        let now = now_millis();
        for old in moving {
            let (Some(mut node), Some(new_key)) = (nodes.remove(&old), old.rebase(from, to)) else {
                continue;
            };
            if old == *from {
                node.version += 1;
                node.updated = now.max(node.updated);
            }
            node.key = new_key.clone();
            nodes.insert(new_key, node);
        }
        Ok(replaced)
    }
}
