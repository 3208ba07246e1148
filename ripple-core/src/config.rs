//! Runtime Configuration
//!
//! Process-wide switches that affect diagnostics, not semantics. The
//! configuration lives in a global `OnceLock<RwLock<_>>` slot, like the
//! merge strategy registry, and is read by value so a caller can never hold
//! the lock across user code.

use std::sync::OnceLock;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Global runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    /// Suppress all development warnings.
    pub silent: bool,

    /// Wrap instance initialization in a tracing span.
    pub performance: bool,

    /// Emit development warnings (misuse, naming conflicts, merge fallbacks).
    pub dev_mode: bool,

    /// Tag names that may not be used as component names, in addition to the
    /// built-in `slot` and `component`.
    pub reserved_tags: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            silent: false,
            performance: false,
            dev_mode: cfg!(debug_assertions),
            reserved_tags: Vec::new(),
        }
    }
}

impl Config {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Whether `tag` is reserved and cannot name a component.
    pub fn is_reserved_tag(&self, tag: &str) -> bool {
        self.reserved_tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }
}

static CONFIG: OnceLock<RwLock<Config>> = OnceLock::new();

fn slot() -> &'static RwLock<Config> {
    CONFIG.get_or_init(|| RwLock::new(Config::default()))
}

/// Snapshot of the current configuration.
pub fn config() -> Config {
    slot().read().clone()
}

/// Replace the global configuration.
pub fn set_config(config: Config) {
    *slot().write() = config;
}
