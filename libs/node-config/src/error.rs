//! Configuration errors.

use thiserror::Error;

/// Errors from validating a spec or rendering its configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A spec field failed validation.
    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    /// Unknown configuration layout name.
    #[error("unknown configuration layout '{0}' (expected 'object' or 'list')")]
    UnknownLayout(String),

    /// The configuration could not be serialized or parsed.
    #[error("configuration serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}
