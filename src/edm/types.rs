use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Declared primitive type of a property.
///
/// `Undeclared` marks a dynamic property with no recorded value class: its
/// effective type is inferred from the literal it is compared against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdmType {
    String,
    Int32,
    Single,
    Double,
    Boolean,
    DateTime,
    Undeclared,
}

impl EdmType {
    pub fn name(&self) -> &'static str {
        match self {
            EdmType::String => "Edm.String",
            EdmType::Int32 => "Edm.Int32",
            EdmType::Single => "Edm.Single",
            EdmType::Double => "Edm.Double",
            EdmType::Boolean => "Edm.Boolean",
            EdmType::DateTime => "Edm.DateTime",
            EdmType::Undeclared => "Undeclared",
        }
    }

    /// Parse an `Edm.*` type name as it appears in schema documents.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Edm.String" => Some(EdmType::String),
            "Edm.Int32" => Some(EdmType::Int32),
            "Edm.Single" => Some(EdmType::Single),
            "Edm.Double" => Some(EdmType::Double),
            "Edm.Boolean" => Some(EdmType::Boolean),
            "Edm.DateTime" => Some(EdmType::DateTime),
            _ => None,
        }
    }

    /// Class of a written JSON value. Numbers are always `Double`; null,
    /// arrays and objects carry no class.
    pub fn of_value(value: &Value) -> Self {
        match value {
            Value::String(_) => EdmType::String,
            Value::Number(_) => EdmType::Double,
            Value::Bool(_) => EdmType::Boolean,
            Value::Null | Value::Array(_) | Value::Object(_) => EdmType::Undeclared,
        }
    }

    /// `lt`/`le`/`gt`/`ge` are defined for every type except Boolean.
    pub fn supports_ordering(&self) -> bool {
        !matches!(self, EdmType::Boolean)
    }
}

impl fmt::Display for EdmType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Multiplicity {
    #[default]
    Scalar,
    List,
}

/// A resolved `(entity type, property)` pair with its declared constraints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyDescriptor {
    pub entity_type: String,
    pub name: String,
    pub edm_type: EdmType,
    pub nullable: bool,
    /// Written in place of an absent value.
    pub default_value: Option<Value>,
    pub multiplicity: Multiplicity,
    /// Learned from written data rather than declared.
    pub dynamic: bool,
}

impl PropertyDescriptor {
    pub fn new(entity_type: impl Into<String>, name: impl Into<String>, edm_type: EdmType) -> Self {
        Self {
            entity_type: entity_type.into(),
            name: name.into(),
            edm_type,
            nullable: true,
            default_value: None,
            multiplicity: Multiplicity::Scalar,
            dynamic: false,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default_value = Some(value);
        self
    }

    /// A dynamic property whose type is the class of its first written
    /// value, or `Undeclared` when none has been recorded.
    pub fn dynamic(
        entity_type: impl Into<String>,
        name: impl Into<String>,
        edm_type: EdmType,
    ) -> Self {
        Self {
            dynamic: true,
            ..Self::new(entity_type, name, edm_type)
        }
    }

    pub fn list(mut self) -> Self {
        self.multiplicity = Multiplicity::List;
        self
    }

    pub fn is_list(&self) -> bool {
        self.multiplicity == Multiplicity::List
    }

    pub fn is_dynamic(&self) -> bool {
        self.dynamic
    }
}

/// Cardinality of one end of an association.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssociationMultiplicity {
    #[serde(rename = "0..1")]
    ZeroOrOne,
    #[serde(rename = "1")]
    One,
    #[serde(rename = "*")]
    Many,
}

impl AssociationMultiplicity {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssociationMultiplicity::ZeroOrOne => "0..1",
            AssociationMultiplicity::One => "1",
            AssociationMultiplicity::Many => "*",
        }
    }

    /// Upper bound of related entities, `None` when unbounded.
    pub fn max_related(&self) -> Option<usize> {
        match self {
            AssociationMultiplicity::ZeroOrOne | AssociationMultiplicity::One => Some(1),
            AssociationMultiplicity::Many => None,
        }
    }
}

impl fmt::Display for AssociationMultiplicity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Traversal from `source_type` to `target_type`, named `_<target_type>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationProperty {
    pub name: String,
    pub source_type: String,
    pub target_type: String,
    pub source_multiplicity: AssociationMultiplicity,
    pub target_multiplicity: AssociationMultiplicity,
}

impl NavigationProperty {
    pub fn new(
        source_type: impl Into<String>,
        target_type: impl Into<String>,
        source_multiplicity: AssociationMultiplicity,
        target_multiplicity: AssociationMultiplicity,
    ) -> Self {
        let target_type = target_type.into();
        Self {
            name: format!("_{}", target_type),
            source_type: source_type.into(),
            target_type,
            source_multiplicity,
            target_multiplicity,
        }
    }
}
