//! Document store - the backing store that translated queries run against.
//!
//! Entities are JSON bodies keyed by `(entity set, __id)`, versioned for
//! optimistic concurrency, and linked to each other for navigation queries.

mod document;
mod document_store;
mod error;
mod in_memory;

pub use document::{DocumentKey, ETag, IfMatch, PagedResultSet, ResultEntry, StoredDocument};
pub use document_store::DocumentStore;
pub use error::StoreError;
pub use in_memory::InMemoryDocumentStore;
