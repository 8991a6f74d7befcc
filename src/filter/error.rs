use thiserror::Error;

/// Errors raised while turning `$filter` text into a [`FilterNode`](super::FilterNode).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Malformed grammar, unknown date pattern, stray `)`, and the like.
    #[error("filter parse error at offset {position}: {message}")]
    Syntax { position: usize, message: String },

    /// A reserved or navigation property name used as an operand.
    #[error("unknown query key: {name}")]
    UnknownQueryKey { name: String },

    /// A string literal whose backslash escapes cannot be decoded.
    #[error("unable to unescape operand '{operand}'")]
    Unescape { operand: String },

    #[error("unsupported query operator: {0}")]
    UnsupportedOperator(String),

    #[error("unsupported query function: {0}")]
    UnsupportedFunction(String),
}

impl ParseError {
    pub(crate) fn syntax(position: usize, message: impl Into<String>) -> Self {
        ParseError::Syntax {
            position,
            message: message.into(),
        }
    }

    pub(crate) fn unknown_key(name: impl Into<String>) -> Self {
        ParseError::UnknownQueryKey { name: name.into() }
    }
}
