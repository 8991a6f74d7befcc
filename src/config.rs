//! Configuration consumed by the query and lock subsystems.
//!
//! Every field has a default, so an empty JSON object is a valid config.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid config document: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Ceilings applied to `$top`, `$skip`, `$expand` and `q`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryLimits {
    /// `$top` used when the request does not supply one.
    pub default_top: u32,
    pub top_max: u32,
    pub skip_max: u32,
    /// Maximum `$top` when `$expand` is present.
    pub expand_top_max: u32,
    /// Maximum number of navigation properties in one `$expand`.
    pub expand_property_max: usize,
    /// Related entities inlined per navigation property.
    pub expand_page_size: u32,
    /// Maximum byte length of the `q` keyword parameter.
    pub keyword_max_bytes: usize,
}

impl Default for QueryLimits {
    fn default() -> Self {
        Self {
            default_top: 25,
            top_max: 10_000,
            skip_max: 100_000,
            expand_top_max: 100,
            expand_property_max: 2,
            expand_page_size: 100,
            keyword_max_bytes: 255,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    /// How long an acquire waits before reporting overflow.
    pub timeout_ms: u64,
    /// How long a held lock survives before a waiter may take it over.
    pub lease_ms: u64,
}

impl LockConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn lease(&self) -> Duration {
        Duration::from_millis(self.lease_ms)
    }
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            lease_ms: 60_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexLimits {
    /// String values longer than this (in characters) are stored but not
    /// indexed for term, range or prefix matching.
    pub max_string_length: usize,
}

impl Default for IndexLimits {
    fn default() -> Self {
        Self {
            max_string_length: 4096,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub query: QueryLimits,
    pub lock: LockConfig,
    pub index: IndexLimits,
}

impl CoreConfig {
    /// Parse and validate a JSON config document.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: CoreConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let q = &self.query;
        if q.default_top > q.top_max {
            return Err(ConfigError::Invalid(format!(
                "query.default_top ({}) exceeds query.top_max ({})",
                q.default_top, q.top_max
            )));
        }
        if q.expand_top_max > q.top_max {
            return Err(ConfigError::Invalid(format!(
                "query.expand_top_max ({}) exceeds query.top_max ({})",
                q.expand_top_max, q.top_max
            )));
        }
        if self.lock.timeout_ms == 0 {
            return Err(ConfigError::Invalid("lock.timeout_ms must be positive".into()));
        }
        if self.lock.lease_ms < self.lock.timeout_ms {
            return Err(ConfigError::Invalid(
                "lock.lease_ms must not be shorter than lock.timeout_ms".into(),
            ));
        }
        Ok(())
    }
}
