//! Query options and translation into a store query.

mod error;
mod options;
mod translate;

pub use error::QueryError;
pub use options::{
    percent_decode, Expansion, LinkAnchor, QueryOptions, QueryRequest, Selection, SortDirection,
    SortKey,
};
pub use translate::{translate, BackendQuery, Predicate, RangeBound};
