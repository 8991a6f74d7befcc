//! Edm type registry: declared property types, navigation properties, and the
//! canonical value ranges used when checking filter literals.

pub mod range;
mod schema;
mod types;

pub use schema::{
    is_navigation_property_name, is_reserved_name, system_property_type, EntityTypeSchema,
    InMemorySchema, SchemaRegistry, ID_PROPERTY, METADATA_KEY, PUBLISHED_PROPERTY,
    UPDATED_PROPERTY,
};
pub use types::{
    AssociationMultiplicity, EdmType, Multiplicity, NavigationProperty, PropertyDescriptor,
};
