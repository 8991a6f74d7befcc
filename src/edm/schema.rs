use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use serde_json::{Map, Value};

use super::types::{AssociationMultiplicity, EdmType, NavigationProperty, PropertyDescriptor};

pub const METADATA_KEY: &str = "__metadata";
pub const ID_PROPERTY: &str = "__id";
pub const PUBLISHED_PROPERTY: &str = "__published";
pub const UPDATED_PROPERTY: &str = "__updated";

/// Names that can never be used as a filter operand.
pub fn is_reserved_name(name: &str) -> bool {
    name == METADATA_KEY
}

/// Navigation keys are a single leading underscore followed by a type name.
pub fn is_navigation_property_name(name: &str) -> bool {
    name.len() > 1 && name.starts_with('_') && !name.starts_with("__")
}

/// Fixed type of the system properties every entity carries.
pub fn system_property_type(name: &str) -> Option<EdmType> {
    match name {
        ID_PROPERTY => Some(EdmType::String),
        PUBLISHED_PROPERTY | UPDATED_PROPERTY => Some(EdmType::DateTime),
        _ => None,
    }
}

/// Read-only view of the entity type schema used while checking a query.
pub trait SchemaRegistry: Send + Sync {
    fn has_entity_type(&self, entity_type: &str) -> bool;

    /// Resolve a property, including system properties. `None` means the
    /// name is unknown for this entity type.
    fn resolve_property(&self, entity_type: &str, name: &str) -> Option<PropertyDescriptor>;

    fn navigation_property(&self, entity_type: &str, name: &str) -> Option<NavigationProperty>;

    fn is_reserved_name(&self, name: &str) -> bool {
        is_reserved_name(name)
    }

    fn is_navigation_property_name(&self, name: &str) -> bool {
        is_navigation_property_name(name)
    }
}

/// Declared and dynamic properties of one entity type.
#[derive(Debug, Clone, Default)]
pub struct EntityTypeSchema {
    pub name: String,
    properties: BTreeMap<String, PropertyDescriptor>,
    navigation: BTreeMap<String, NavigationProperty>,
}

impl EntityTypeSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Declare a scalar property of the given type.
    pub fn declare(self, name: &str, edm_type: EdmType) -> Self {
        let descriptor = PropertyDescriptor::new(self.name.clone(), name, edm_type);
        self.with_property(descriptor)
    }

    /// Declare a list-valued property of the given type.
    pub fn declare_list(self, name: &str, edm_type: EdmType) -> Self {
        let descriptor = PropertyDescriptor::new(self.name.clone(), name, edm_type).list();
        self.with_property(descriptor)
    }

    /// Register a dynamic property with no recorded type yet.
    pub fn dynamic(self, name: &str) -> Self {
        let descriptor = PropertyDescriptor::dynamic(self.name.clone(), name, EdmType::Undeclared);
        self.with_property(descriptor)
    }

    /// Learn a dynamic property from a written value. Declared properties
    /// and already typed dynamic ones keep their type.
    fn observe(&mut self, name: &str, value: &Value) {
        if system_property_type(name).is_some() {
            return;
        }
        let observed = EdmType::of_value(value);
        match self.properties.get_mut(name) {
            Some(existing) => {
                if !existing.is_dynamic()
                    || existing.edm_type != EdmType::Undeclared
                    || observed == EdmType::Undeclared
                {
                    return;
                }
                existing.edm_type = observed;
            }
            None => {
                let descriptor = PropertyDescriptor::dynamic(self.name.clone(), name, observed);
                self.properties.insert(name.to_string(), descriptor);
            }
        }
        tracing::debug!(
            entity_type = %self.name,
            property = name,
            edm_type = %observed,
            "recorded dynamic property"
        );
    }

    pub fn with_property(mut self, mut descriptor: PropertyDescriptor) -> Self {
        descriptor.entity_type = self.name.clone();
        self.properties.insert(descriptor.name.clone(), descriptor);
        self
    }

    pub fn property(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.properties.get(name)
    }

    pub fn navigation(&self, name: &str) -> Option<&NavigationProperty> {
        self.navigation.get(name)
    }

    /// Fill the default of every declared property absent from `body`, then
    /// name the non-nullable properties that are still absent or null.
    pub fn apply_defaults(&self, body: &mut Map<String, Value>) -> Vec<String> {
        let mut missing = Vec::new();
        for descriptor in self.properties.values() {
            if let Some(default) = &descriptor.default_value {
                body.entry(descriptor.name.clone()).or_insert_with(|| default.clone());
            }
            let absent = body.get(&descriptor.name).map_or(true, Value::is_null);
            if absent && !descriptor.nullable {
                missing.push(descriptor.name.clone());
            }
        }
        missing
    }
}

/// In-memory schema registry.
///
/// Registration takes `&self` so a shared registry can learn dynamic
/// properties as documents are written.
#[derive(Default)]
pub struct InMemorySchema {
    types: RwLock<HashMap<String, EntityTypeSchema>>,
}

impl InMemorySchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an entity type. `false` when the registry lock is
    /// poisoned and nothing was registered.
    pub fn register(&self, schema: EntityTypeSchema) -> bool {
        let Ok(mut types) = self.types.write() else {
            return false;
        };
        types.insert(schema.name.clone(), schema);
        true
    }

    /// Record a dynamic property on an existing entity type, typed by the
    /// class of `value`. Declared properties keep their type.
    pub fn declare_dynamic(&self, entity_type: &str, name: &str, value: &Value) -> bool {
        let Ok(mut types) = self.types.write() else {
            return false;
        };
        match types.get_mut(entity_type) {
            Some(schema) => {
                schema.observe(name, value);
                true
            }
            None => false,
        }
    }

    /// Apply the declared defaults of `entity_type` to a body about to be
    /// written. `None` when the type is unknown or the registry is poisoned,
    /// otherwise the non-nullable properties left without a value.
    pub fn apply_defaults(
        &self,
        entity_type: &str,
        body: &mut Map<String, Value>,
    ) -> Option<Vec<String>> {
        let types = self.types.read().ok()?;
        Some(types.get(entity_type)?.apply_defaults(body))
    }

    /// Record every undeclared field of a written document body.
    pub fn record_dynamic(&self, entity_type: &str, body: &Map<String, Value>) -> bool {
        let Ok(mut types) = self.types.write() else {
            return false;
        };
        let Some(schema) = types.get_mut(entity_type) else {
            return false;
        };
        for (name, value) in body {
            if is_reserved_name(name) || is_navigation_property_name(name) {
                continue;
            }
            schema.observe(name, value);
        }
        true
    }

    /// Register the two navigation properties of an association between
    /// `left` and `right`.
    pub fn associate(
        &self,
        left: &str,
        left_multiplicity: AssociationMultiplicity,
        right: &str,
        right_multiplicity: AssociationMultiplicity,
    ) -> bool {
        let Ok(mut types) = self.types.write() else {
            return false;
        };
        if !types.contains_key(left) || !types.contains_key(right) {
            return false;
        }
        if let Some(schema) = types.get_mut(left) {
            let np = NavigationProperty::new(left, right, left_multiplicity, right_multiplicity);
            schema.navigation.insert(np.name.clone(), np);
        }
        if let Some(schema) = types.get_mut(right) {
            let np = NavigationProperty::new(right, left, right_multiplicity, left_multiplicity);
            schema.navigation.insert(np.name.clone(), np);
        }
        true
    }
}

impl SchemaRegistry for InMemorySchema {
    fn has_entity_type(&self, entity_type: &str) -> bool {
        self.types
            .read()
            .map(|types| types.contains_key(entity_type))
            .unwrap_or(false)
    }

    fn resolve_property(&self, entity_type: &str, name: &str) -> Option<PropertyDescriptor> {
        let types = self.types.read().ok()?;
        let schema = types.get(entity_type)?;
        if let Some(edm_type) = system_property_type(name) {
            return Some(PropertyDescriptor::new(entity_type, name, edm_type).not_null());
        }
        schema.property(name).cloned()
    }

    fn navigation_property(&self, entity_type: &str, name: &str) -> Option<NavigationProperty> {
        let types = self.types.read().ok()?;
        types.get(entity_type)?.navigation(name).cloned()
    }
}
