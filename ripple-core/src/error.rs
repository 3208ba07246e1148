//! Error types for the ripple runtime.
//!
//! Nothing in the reactive core is fatal. These errors are returned by the
//! few fallible entry points (configuration loading, name validation, merge
//! strategies) and are usually downgraded to a development warning by the
//! caller.

/// Errors produced by the ripple runtime.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid runtime configuration: {0}")]
    Config(#[from] serde_json::Error),

    #[error("invalid component name \"{name}\": {reason}")]
    InvalidComponentName { name: String, reason: String },

    #[error("option \"{key}\" expects {expected}, found {found}")]
    OptionType {
        key: String,
        expected: &'static str,
        found: &'static str,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
