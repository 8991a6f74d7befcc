use std::fmt;

use super::literal::Literal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComparisonOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl ComparisonOp {
    pub fn from_keyword(word: &str) -> Option<Self> {
        match word {
            "eq" => Some(ComparisonOp::Eq),
            "ne" => Some(ComparisonOp::Ne),
            "gt" => Some(ComparisonOp::Gt),
            "ge" => Some(ComparisonOp::Ge),
            "lt" => Some(ComparisonOp::Lt),
            "le" => Some(ComparisonOp::Le),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ComparisonOp::Eq => "eq",
            ComparisonOp::Ne => "ne",
            ComparisonOp::Gt => "gt",
            ComparisonOp::Ge => "ge",
            ComparisonOp::Lt => "lt",
            ComparisonOp::Le => "le",
        }
    }

    /// True for `gt`, `ge`, `lt`, `le`.
    pub fn is_ordering(&self) -> bool {
        !matches!(self, ComparisonOp::Eq | ComparisonOp::Ne)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalOp {
    And,
    Or,
}

impl LogicalOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogicalOp::And => "and",
            LogicalOp::Or => "or",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterFunction {
    /// `startswith(property, 'prefix')`
    StartsWith,
    /// `substringof('needle', property)`
    SubstringOf,
}

impl FilterFunction {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterFunction::StartsWith => "startswith",
            FilterFunction::SubstringOf => "substringof",
        }
    }
}

/// Untyped `$filter` syntax tree.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterNode {
    Comparison {
        property: String,
        op: ComparisonOp,
        literal: Literal,
    },
    Logical {
        op: LogicalOp,
        left: Box<FilterNode>,
        right: Box<FilterNode>,
    },
    Call {
        function: FilterFunction,
        property: String,
        literal: Literal,
    },
    Group(Box<FilterNode>),
}

impl fmt::Display for FilterNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterNode::Comparison {
                property,
                op,
                literal,
            } => write!(f, "{} {} {}", property, op.as_str(), literal),
            FilterNode::Logical { op, left, right } => {
                write!(f, "{} {} {}", left, op.as_str(), right)
            }
            FilterNode::Call {
                function: FilterFunction::StartsWith,
                property,
                literal,
            } => write!(f, "startswith({},{})", property, literal),
            FilterNode::Call {
                function: FilterFunction::SubstringOf,
                property,
                literal,
            } => write!(f, "substringof({},{})", literal, property),
            FilterNode::Group(inner) => write!(f, "({})", inner),
        }
    }
}
