use thiserror::Error;

/// Errors in the query options that accompany a filter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("${param}={value} is outside [0, {max}]")]
    LimitExceeded {
        param: &'static str,
        value: i64,
        max: u32,
    },

    #[error("${param} could not be parsed: '{value}'")]
    InvalidParam { param: &'static str, value: String },

    #[error("$expand names {count} navigation properties, the limit is {max}")]
    ExpandCountExceeded { count: usize, max: usize },

    #[error("invalid $expand: {0}")]
    Expand(String),

    #[error("invalid $orderby: {0}")]
    OrderBy(String),

    #[error("invalid $select: {0}")]
    Select(String),

    #[error("invalid $inlinecount: {0}")]
    InlineCount(String),

    #[error("invalid q: {0}")]
    Keyword(String),
}
