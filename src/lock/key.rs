use std::fmt;

/// Hierarchical identity of a lockable resource, e.g. `cell/box/col/file`.
///
/// Keys order segment by segment, so an ancestor sorts before all of its
/// descendants. Acquiring several keys in ascending order is the crate-wide
/// rule that keeps multi-key operations deadlock free.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceKey {
    segments: Vec<String>,
}

/// Namespace segment for OData entity keys, so they never collide with DAV
/// paths (`$` is not a valid cell name character).
const ENTITY_NAMESPACE: &str = "$odata";

impl ResourceKey {
    pub fn root(segment: impl Into<String>) -> Self {
        Self {
            segments: vec![segment.into()],
        }
    }

    /// Build a key from a `/`-separated path. Empty segments are skipped.
    pub fn from_path(path: &str) -> Self {
        Self {
            segments: path
                .split('/')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    /// Key of every entity in an entity set.
    pub fn entity_set(entity_type: &str) -> Self {
        Self::root(ENTITY_NAMESPACE).child(entity_type)
    }

    /// Key of a single entity.
    pub fn entity(entity_type: &str, id: &str) -> Self {
        Self::entity_set(entity_type).child(id)
    }

    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment.into());
        Self { segments }
    }

    pub fn parent(&self) -> Option<Self> {
        if self.segments.len() <= 1 {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    pub fn name(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or("")
    }

    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// True when `self` is a strict ancestor of `other`.
    pub fn is_ancestor_of(&self, other: &ResourceKey) -> bool {
        other.segments.len() > self.segments.len() && other.segments.starts_with(&self.segments)
    }

    /// Re-root `self` from under `from` to under `to`.
    pub fn rebase(&self, from: &ResourceKey, to: &ResourceKey) -> Option<ResourceKey> {
        if self == from {
            return Some(to.clone());
        }
        if !from.is_ancestor_of(self) {
            return None;
        }
        let mut segments = to.segments.clone();
        segments.extend_from_slice(&self.segments[from.segments.len()..]);
        Some(ResourceKey { segments })
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.segments.join("/"))
    }
}

/// Why a lock is taken. Both kinds contend for the same per-key lock; the
/// kind is carried for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockKind {
    /// Create, delete, move.
    Structural,
    /// In-place update of content or properties.
    Content,
}
