use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::edm::{ID_PROPERTY, METADATA_KEY, PUBLISHED_PROPERTY, UPDATED_PROPERTY};
use crate::lock::ResourceKey;

/// Identity of one entity: its entity set and `__id`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DocumentKey {
    pub entity_type: String,
    pub key: String,
}

impl DocumentKey {
    pub fn new(entity_type: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            key: key.into(),
        }
    }

    /// The lock guarding this entity.
    pub fn lock_key(&self) -> ResourceKey {
        ResourceKey::entity(&self.entity_type, &self.key)
    }
}

impl fmt::Display for DocumentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}('{}')", self.entity_type, self.key)
    }
}

/// Weak entity tag, rendered as `W/"{version}-{updated_millis}"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ETag {
    pub version: u64,
    pub updated: i64,
}

impl ETag {
    pub fn new(version: u64, updated: i64) -> Self {
        Self { version, updated }
    }

    /// Parse the rendered form. The `W/` prefix is optional.
    pub fn parse(raw: &str) -> Option<ETag> {
        let raw = raw.trim();
        let raw = raw.strip_prefix("W/").unwrap_or(raw);
        let inner = raw.strip_prefix('"')?.strip_suffix('"')?;
        let (version, updated) = inner.split_once('-')?;
        Some(ETag {
            version: version.parse().ok()?,
            updated: updated.parse().ok()?,
        })
    }
}

impl fmt::Display for ETag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "W/\"{}-{}\"", self.version, self.updated)
    }
}

/// An `If-Match` precondition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IfMatch {
    /// `*`: any current version.
    Any,
    Tag(ETag),
}

impl IfMatch {
    pub fn parse(raw: &str) -> Option<IfMatch> {
        if raw.trim() == "*" {
            Some(IfMatch::Any)
        } else {
            ETag::parse(raw).map(IfMatch::Tag)
        }
    }

    pub fn matches(&self, current: &ETag) -> bool {
        match self {
            IfMatch::Any => true,
            IfMatch::Tag(tag) => tag == current,
        }
    }
}

impl fmt::Display for IfMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IfMatch::Any => f.write_str("*"),
            IfMatch::Tag(tag) => tag.fmt(f),
        }
    }
}

/// One entity as held by a [`DocumentStore`](super::DocumentStore).
///
/// DateTime properties are stored as epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredDocument {
    pub key: DocumentKey,
    pub body: Map<String, Value>,
    pub published: i64,
    pub updated: i64,
    pub version: u64,
    /// Entities this one is linked to, in both directions.
    pub links: BTreeSet<DocumentKey>,
    /// Insertion order; the default result order.
    #[serde(skip)]
    pub(crate) seq: u64,
}

impl StoredDocument {
    pub fn etag(&self) -> ETag {
        ETag::new(self.version, self.updated)
    }

    /// Value of a body field or one of the system properties.
    pub fn field(&self, name: &str) -> Option<Value> {
        match name {
            ID_PROPERTY => Some(Value::String(self.key.key.clone())),
            PUBLISHED_PROPERTY => Some(Value::from(self.published)),
            UPDATED_PROPERTY => Some(Value::from(self.updated)),
            _ => self.body.get(name).cloned(),
        }
    }

    /// Body plus the system properties.
    pub fn to_json(&self) -> Map<String, Value> {
        let mut out = self.body.clone();
        self.insert_system_fields(&mut out);
        out
    }

    pub(crate) fn insert_system_fields(&self, out: &mut Map<String, Value>) {
        out.insert(ID_PROPERTY.into(), Value::String(self.key.key.clone()));
        out.insert(PUBLISHED_PROPERTY.into(), Value::from(self.published));
        out.insert(UPDATED_PROPERTY.into(), Value::from(self.updated));
    }
}

/// Drop caller-supplied system and metadata keys from a body.
pub(crate) fn strip_system_fields(body: &mut Map<String, Value>) {
    for name in [ID_PROPERTY, PUBLISHED_PROPERTY, UPDATED_PROPERTY, METADATA_KEY] {
        body.remove(name);
    }
}

/// One row of a query result.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultEntry {
    pub key: DocumentKey,
    pub etag: ETag,
    pub body: Map<String, Value>,
    /// Related entities per expanded navigation property.
    pub expanded: BTreeMap<String, Vec<Map<String, Value>>>,
}

/// A page of results plus, when requested, the total match count.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PagedResultSet {
    pub results: Vec<ResultEntry>,
    pub count: Option<u64>,
}

impl PagedResultSet {
    pub fn ids(&self) -> Vec<&str> {
        self.results.iter().map(|r| r.key.key.as_str()).collect()
    }
}
