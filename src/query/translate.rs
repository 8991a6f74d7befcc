//! Translation of a validated filter plus query options into a
//! [`BackendQuery`] for the document store.

use serde_json::Value;

use super::options::{Expansion, LinkAnchor, QueryOptions, Selection, SortKey};
use crate::filter::{ComparisonOp, FilterFunction, LogicalOp, TypedFilterNode, TypedValue};

#[derive(Debug, Clone, PartialEq)]
pub struct RangeBound {
    pub value: Value,
    pub inclusive: bool,
}

/// Store-side predicate tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    MatchAll,
    /// Exact match; on a list field any element may match.
    Term { field: String, value: Value },
    Range {
        field: String,
        lower: Option<RangeBound>,
        upper: Option<RangeBound>,
    },
    Prefix { field: String, prefix: String },
    Substring { field: String, needle: String },
    /// Field absent or null.
    Missing { field: String },
    /// Any string field contains the word.
    Keyword { word: String },
    /// The entity's link set contains the anchor.
    LinkedTo { entity_type: String, key: String },
    Not(Box<Predicate>),
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
}

/// Everything the store needs to answer a list query.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendQuery {
    pub entity_type: String,
    pub predicate: Predicate,
    pub top: u32,
    pub skip: u32,
    pub sort: Vec<SortKey>,
    pub expand: Vec<Expansion>,
    pub select: Selection,
    pub inline_count: bool,
}

impl BackendQuery {
    /// Unfiltered query over an entity set with the given page.
    pub fn all(entity_type: impl Into<String>, top: u32) -> Self {
        Self {
            entity_type: entity_type.into(),
            predicate: Predicate::MatchAll,
            top,
            skip: 0,
            sort: Vec::new(),
            expand: Vec::new(),
            select: Selection::All,
            inline_count: false,
        }
    }
}

/// Build the store query for `filter` (if any) and `options`.
///
/// Keywords and the link anchor are AND-ed with the filter predicate.
pub fn translate(filter: Option<&TypedFilterNode>, options: &QueryOptions) -> BackendQuery {
    let mut clauses = Vec::new();
    if let Some(filter) = filter {
        clauses.push(predicate_for(filter));
    }
    clauses.extend(
        options
            .keywords
            .iter()
            .map(|word| Predicate::Keyword { word: word.clone() }),
    );
    if let Some(LinkAnchor { entity_type, key }) = &options.anchor {
        clauses.push(Predicate::LinkedTo {
            entity_type: entity_type.clone(),
            key: key.clone(),
        });
    }

    let predicate = match clauses.len() {
        0 => Predicate::MatchAll,
        1 => clauses.remove(0),
        _ => Predicate::And(clauses),
    };

    BackendQuery {
        entity_type: options.entity_type.clone(),
        predicate,
        top: options.top,
        skip: options.skip,
        sort: options.orderby.clone(),
        expand: options.expand.clone(),
        select: options.select.clone(),
        inline_count: options.inline_count,
    }
}

fn predicate_for(node: &TypedFilterNode) -> Predicate {
    match node {
        TypedFilterNode::Comparison {
            property,
            op,
            value,
        } => comparison(&property.name, *op, value),
        TypedFilterNode::Logical { op, left, right } => {
            let children = vec![predicate_for(left), predicate_for(right)];
            match op {
                LogicalOp::And => Predicate::And(children),
                LogicalOp::Or => Predicate::Or(children),
            }
        }
        TypedFilterNode::Call {
            function: FilterFunction::StartsWith,
            property,
            value,
        } => Predicate::Prefix {
            field: property.name.clone(),
            prefix: value.clone(),
        },
        TypedFilterNode::Call {
            function: FilterFunction::SubstringOf,
            property,
            value,
        } => Predicate::Substring {
            field: property.name.clone(),
            needle: value.clone(),
        },
        TypedFilterNode::Group(inner) => predicate_for(inner),
    }
}

fn comparison(field: &str, op: ComparisonOp, value: &TypedValue) -> Predicate {
    let field = field.to_string();
    if *value == TypedValue::Null {
        let missing = Predicate::Missing { field };
        return match op {
            ComparisonOp::Ne => Predicate::Not(Box::new(missing)),
            _ => missing,
        };
    }
    let bound = |inclusive| {
        Some(RangeBound {
            value: value.to_json(),
            inclusive,
        })
    };
    match op {
        ComparisonOp::Eq => Predicate::Term {
            field,
            value: value.to_json(),
        },
        ComparisonOp::Ne => Predicate::Not(Box::new(Predicate::Term {
            field,
            value: value.to_json(),
        })),
        ComparisonOp::Gt => Predicate::Range {
            field,
            lower: bound(false),
            upper: None,
        },
        ComparisonOp::Ge => Predicate::Range {
            field,
            lower: bound(true),
            upper: None,
        },
        ComparisonOp::Lt => Predicate::Range {
            field,
            lower: None,
            upper: bound(false),
        },
        ComparisonOp::Le => Predicate::Range {
            field,
            lower: None,
            upper: bound(true),
        },
    }
}
