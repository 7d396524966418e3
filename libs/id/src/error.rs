//! Error types for node name parsing and validation.

use thiserror::Error;

/// Errors that can occur when parsing or generating node names.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NameError {
    /// The name string is empty.
    #[error("node name cannot be empty")]
    Empty,

    /// The name contains whitespace or a control character.
    #[error("node name contains invalid character {character:?} at byte {index}")]
    InvalidCharacter { character: char, index: usize },

    /// The prefix requested for generated names is unusable.
    #[error("invalid node name prefix '{prefix}': {reason}")]
    InvalidPrefix { prefix: String, reason: &'static str },
}

impl NameError {
    /// Returns true if this error indicates the input was empty.
    pub fn is_empty(&self) -> bool {
        matches!(self, NameError::Empty)
    }
}
