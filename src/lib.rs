pub mod config;
pub mod coordinator;
pub mod edm;
mod engine;
mod error;
pub mod filter;
pub mod lock;
pub mod query;
pub mod resource;
pub mod store;

pub use config::{ConfigError, CoreConfig, IndexLimits, LockConfig, QueryLimits};
pub use coordinator::{Depth, MutationCoordinator, MutationOutcome, PropfindEntry};
pub use edm::{EdmType, EntityTypeSchema, InMemorySchema, PropertyDescriptor, SchemaRegistry};
pub use engine::CoreEngine;
pub use error::{CoreError, ErrorKind, Result};
pub use filter::{parse, validate, FilterNode, ParseError, TypedFilterNode, ValidationError};
pub use lock::{
    InMemoryLockManager, LockError, LockGuard, LockKind, LockManager, ResourceKey,
};
pub use query::{translate, BackendQuery, Predicate, QueryError, QueryRequest};
pub use resource::{InMemoryResourceStore, ResourceKind, ResourceNode, ResourceStore};
pub use store::{
    DocumentKey, DocumentStore, ETag, IfMatch, InMemoryDocumentStore, PagedResultSet,
    StoreError,
};
