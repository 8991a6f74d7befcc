use std::collections::BTreeMap;

use crate::lock::ResourceKey;
use crate::store::ETag;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionKind {
    /// Plain WebDAV collection.
    Dav,
    /// Collection exposing an OData entity container.
    OData,
    /// Collection hosting a service script.
    Service,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceKind {
    Cell,
    Box,
    Collection(CollectionKind),
    File { content_type: String },
}

impl ResourceKind {
    pub fn is_container(&self) -> bool {
        !matches!(self, ResourceKind::File { .. })
    }
}

/// One node of the cell / box / collection / file tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceNode {
    pub key: ResourceKey,
    pub kind: ResourceKind,
    /// File content; empty for containers.
    pub body: Vec<u8>,
    /// Dead properties set through PROPPATCH.
    pub properties: BTreeMap<String, String>,
    pub version: u64,
    pub created: i64,
    pub updated: i64,
}

impl ResourceNode {
    pub fn etag(&self) -> ETag {
        ETag::new(self.version, self.updated)
    }

    pub fn is_container(&self) -> bool {
        self.kind.is_container()
    }
}
