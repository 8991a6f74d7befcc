//! Type checking of a parsed filter against the Edm schema.
//!
//! Every comparison and call is resolved to a property, the effective Edm
//! type is decided (declared, or inferred from the literal for dynamic
//! properties), and the literal is checked for type compatibility and then
//! for range.

use thiserror::Error;

use super::ast::{ComparisonOp, FilterFunction, FilterNode, LogicalOp};
use super::literal::Literal;
use crate::edm::{range, EdmType, Multiplicity, SchemaRegistry};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("unknown query key '{property}' for entity type {entity_type}")]
    UnknownQueryKey {
        entity_type: String,
        property: String,
    },

    #[error("'{operator}' cannot apply {property} ({edm_type}) to a {literal} operand")]
    TypeMismatch {
        property: String,
        operator: String,
        edm_type: EdmType,
        literal: &'static str,
    },

    #[error("operand {literal} is out of range for {property} ({edm_type})")]
    OutOfRange {
        property: String,
        edm_type: EdmType,
        literal: String,
    },

    /// Ordering operators are not part of the grammar for Boolean operands.
    #[error("'{operator}' is not defined for Edm.Boolean property {property}")]
    OrderingOnBoolean { property: String, operator: String },
}

/// A property reference after schema resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedProperty {
    pub name: String,
    pub declared_type: EdmType,
    /// Declared type, or the type inferred from the literal for dynamic
    /// properties. `Undeclared` only when a dynamic property meets `null`.
    pub effective_type: EdmType,
    pub multiplicity: Multiplicity,
}

/// Literal value normalized to the property's effective type.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Double(f64),
    String(String),
    /// Epoch milliseconds.
    DateTime(i64),
}

impl TypedValue {
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value;
        match self {
            TypedValue::Null => Value::Null,
            TypedValue::Boolean(b) => Value::Bool(*b),
            TypedValue::Integer(i) | TypedValue::DateTime(i) => Value::from(*i),
            TypedValue::Double(d) => serde_json::Number::from_f64(*d)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            TypedValue::String(s) => Value::String(s.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypedFilterNode {
    Comparison {
        property: ResolvedProperty,
        op: ComparisonOp,
        value: TypedValue,
    },
    Logical {
        op: LogicalOp,
        left: Box<TypedFilterNode>,
        right: Box<TypedFilterNode>,
    },
    Call {
        function: FilterFunction,
        property: ResolvedProperty,
        value: String,
    },
    Group(Box<TypedFilterNode>),
}

/// Edm type implied by a literal's syntactic class, used for dynamic
/// properties. `null` implies nothing and yields `Undeclared`.
pub fn classify_literal(literal: &Literal) -> EdmType {
    match literal {
        Literal::Null => EdmType::Undeclared,
        Literal::Boolean(_) => EdmType::Boolean,
        Literal::String(_) => EdmType::String,
        Literal::Integer(_)
        | Literal::Int64(_)
        | Literal::Double { .. }
        | Literal::Decimal { .. } => EdmType::Double,
        Literal::Single { .. } => EdmType::Single,
        Literal::DateTime(_) | Literal::DateTimeOffset(_) => EdmType::DateTime,
    }
}

/// Validate `node` against the properties of `entity_type`.
pub fn validate(
    node: &FilterNode,
    entity_type: &str,
    registry: &dyn SchemaRegistry,
) -> Result<TypedFilterNode, ValidationError> {
    Validator {
        entity_type,
        registry,
    }
    .visit(node)
}

struct Validator<'a> {
    entity_type: &'a str,
    registry: &'a dyn SchemaRegistry,
}

impl Validator<'_> {
    fn visit(&self, node: &FilterNode) -> Result<TypedFilterNode, ValidationError> {
        match node {
            FilterNode::Comparison {
                property,
                op,
                literal,
            } => self.comparison(property, *op, literal),
            FilterNode::Call {
                function,
                property,
                literal,
            } => self.call(*function, property, literal),
            FilterNode::Logical { op, left, right } => Ok(TypedFilterNode::Logical {
                op: *op,
                left: Box::new(self.visit(left)?),
                right: Box::new(self.visit(right)?),
            }),
            FilterNode::Group(inner) => Ok(TypedFilterNode::Group(Box::new(self.visit(inner)?))),
        }
    }

    fn resolve(&self, name: &str, literal: &Literal) -> Result<ResolvedProperty, ValidationError> {
        let unknown = || ValidationError::UnknownQueryKey {
            entity_type: self.entity_type.to_string(),
            property: name.to_string(),
        };
        if self.registry.is_reserved_name(name) || self.registry.is_navigation_property_name(name) {
            return Err(unknown());
        }
        let descriptor = self
            .registry
            .resolve_property(self.entity_type, name)
            .ok_or_else(unknown)?;
        let effective_type = match descriptor.edm_type {
            EdmType::Undeclared => classify_literal(literal),
            declared => declared,
        };
        Ok(ResolvedProperty {
            name: descriptor.name,
            declared_type: descriptor.edm_type,
            effective_type,
            multiplicity: descriptor.multiplicity,
        })
    }

    fn comparison(
        &self,
        name: &str,
        op: ComparisonOp,
        literal: &Literal,
    ) -> Result<TypedFilterNode, ValidationError> {
        let property = self.resolve(name, literal)?;

        if op.is_ordering() && !property.effective_type.supports_ordering() {
            return Err(ValidationError::OrderingOnBoolean {
                property: property.name,
                operator: op.as_str().to_string(),
            });
        }

        let value = coerce(&property, op.as_str(), literal)?;
        tracing::trace!(
            property = %property.name,
            op = op.as_str(),
            ?value,
            "validated comparison"
        );
        Ok(TypedFilterNode::Comparison {
            property,
            op,
            value,
        })
    }

    fn call(
        &self,
        function: FilterFunction,
        name: &str,
        literal: &Literal,
    ) -> Result<TypedFilterNode, ValidationError> {
        let property = self.resolve(name, literal)?;
        match (property.effective_type, literal) {
            (EdmType::String, Literal::String(value)) => Ok(TypedFilterNode::Call {
                function,
                value: value.clone(),
                property,
            }),
            _ => Err(mismatch(&property, function.as_str(), literal)),
        }
    }
}

fn mismatch(property: &ResolvedProperty, operator: &str, literal: &Literal) -> ValidationError {
    ValidationError::TypeMismatch {
        property: property.name.clone(),
        operator: operator.to_string(),
        edm_type: property.effective_type,
        literal: literal.class_name(),
    }
}

fn out_of_range(property: &ResolvedProperty, literal: &Literal) -> ValidationError {
    ValidationError::OutOfRange {
        property: property.name.clone(),
        edm_type: property.effective_type,
        literal: literal.to_string(),
    }
}

/// Check `literal` against the effective type of `property`, type first and
/// range second.
fn coerce(
    property: &ResolvedProperty,
    operator: &str,
    literal: &Literal,
) -> Result<TypedValue, ValidationError> {
    if literal.is_null() {
        return Ok(TypedValue::Null);
    }

    let in_range = |ok: bool, value: TypedValue| {
        if ok {
            Ok(value)
        } else {
            Err(out_of_range(property, literal))
        }
    };

    match (property.effective_type, literal) {
        (EdmType::String, Literal::String(s)) => Ok(TypedValue::String(s.clone())),

        (EdmType::Boolean, Literal::Boolean(b)) => Ok(TypedValue::Boolean(*b)),

        (EdmType::Int32, Literal::Integer(v) | Literal::Int64(v)) => {
            in_range(range::int32_in_range(*v), TypedValue::Integer(*v))
        }

        (EdmType::Single, Literal::Integer(v) | Literal::Int64(v)) => in_range(
            range::single_text_in_range(&v.to_string()),
            TypedValue::Double(*v as f64),
        ),
        (EdmType::Single, Literal::Double { value, text }) => in_range(
            range::single_text_in_range(text),
            TypedValue::Double(*value),
        ),

        (EdmType::Double, Literal::Integer(v) | Literal::Int64(v)) => {
            let value = *v as f64;
            in_range(range::double_in_range(value), TypedValue::Double(value))
        }
        (EdmType::Double, Literal::Double { value, .. }) => {
            in_range(range::double_in_range(*value), TypedValue::Double(*value))
        }

        (
            EdmType::DateTime,
            Literal::Integer(ms)
            | Literal::Int64(ms)
            | Literal::DateTime(ms)
            | Literal::DateTimeOffset(ms),
        ) => in_range(range::datetime_in_range(*ms), TypedValue::DateTime(*ms)),

        (EdmType::Int32 | EdmType::DateTime, Literal::Double { text, .. })
            if is_integer_text(text) =>
        {
            Err(out_of_range(property, literal))
        }

        _ => Err(mismatch(property, operator, literal)),
    }
}

/// An unsuffixed integer too wide for `i64`, lexed as a double.
fn is_integer_text(text: &str) -> bool {
    let digits = text.strip_prefix('-').unwrap_or(text);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}
