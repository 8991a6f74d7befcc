//! Resource tree: cells, boxes, collections and files addressed by
//! [`ResourceKey`](crate::lock::ResourceKey).

mod in_memory;
mod node;
mod resource_store;

pub use in_memory::InMemoryResourceStore;
pub use node::{CollectionKind, ResourceKind, ResourceNode};
pub use resource_store::ResourceStore;
