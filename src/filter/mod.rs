//! `$filter` expressions: lexing, parsing, and type validation.

mod ast;
mod error;
mod lexer;
pub mod literal;
mod parser;
mod validate;

pub use ast::{ComparisonOp, FilterFunction, FilterNode, LogicalOp};
pub use error::ParseError;
pub use literal::Literal;
pub use parser::{is_valid_property_name, parse, MAX_LOGICAL_OPERATORS};
pub use validate::{
    classify_literal, validate, ResolvedProperty, TypedFilterNode, TypedValue, ValidationError,
};
