use serde_json::{Map, Value};

use super::{DocumentKey, PagedResultSet, StoreError, StoredDocument};
use crate::query::BackendQuery;

/// The backing store the query translator targets.
///
/// Implementations must be safe to call concurrently; serialization of
/// conflicting mutations is the lock manager's job, not the store's.
pub trait DocumentStore: Send + Sync {
    /// Run a translated query.
    fn execute(&self, query: &BackendQuery) -> Result<PagedResultSet, StoreError>;

    fn get(&self, key: &DocumentKey) -> Result<Option<StoredDocument>, StoreError>;

    /// Write a document body with optimistic concurrency control.
    ///
    /// `expected_version` is `None` for an unconditional upsert, `Some(0)` for
    /// "must not exist yet", or `Some(v)` for "must currently be at `v`".
    fn write(
        &self,
        key: &DocumentKey,
        body: Map<String, Value>,
        expected_version: Option<u64>,
    ) -> Result<StoredDocument, StoreError>;

    /// Remove a document and every link pointing at it.
    fn remove(
        &self,
        key: &DocumentKey,
        expected_version: Option<u64>,
    ) -> Result<StoredDocument, StoreError>;

    /// Link two documents. Returns false if they were already linked.
    fn link(&self, a: &DocumentKey, b: &DocumentKey) -> Result<bool, StoreError>;

    /// Returns false if they were not linked.
    fn unlink(&self, a: &DocumentKey, b: &DocumentKey) -> Result<bool, StoreError>;

    /// Keys of every document in an entity set.
    fn keys(&self, entity_type: &str) -> Result<Vec<DocumentKey>, StoreError>;
}
