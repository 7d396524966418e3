//! The `NodeName` type.

use std::fmt;
use std::str::FromStr;

use crate::NameError;

/// Name of a secure overlay node.
///
/// Generated names look like `bridge-0a1b2c3d`. Parsed names only have to be
/// non-empty and free of whitespace and control characters, since the
/// control plane may report nodes that sealink did not create.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeName(String);

impl NodeName {
    /// Separator between the prefix and the random suffix.
    pub const SEPARATOR: char = '-';

    /// Generates a fresh name with the given prefix and a random 32-bit suffix.
    pub fn generate(prefix: &str) -> Result<Self, NameError> {
        Self::from_parts(prefix, rand::random::<u32>())
    }

    /// Builds a name from a prefix and an explicit suffix value.
    pub fn from_parts(prefix: &str, suffix: u32) -> Result<Self, NameError> {
        if prefix.is_empty() {
            return Err(NameError::InvalidPrefix {
                prefix: prefix.to_string(),
                reason: "prefix cannot be empty",
            });
        }
        if validate(prefix).is_err() {
            return Err(NameError::InvalidPrefix {
                prefix: prefix.to_string(),
                reason: "prefix contains whitespace or control characters",
            });
        }

        Ok(Self(format!("{prefix}{}{suffix:08x}", Self::SEPARATOR)))
    }

    /// Parses a node name.
    pub fn parse(s: &str) -> Result<Self, NameError> {
        validate(s)?;
        Ok(Self(s.to_string()))
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if this name was generated with the given prefix.
    #[must_use]
    pub fn has_prefix(&self, prefix: &str) -> bool {
        self.0
            .strip_prefix(prefix)
            .and_then(|rest| rest.strip_prefix(Self::SEPARATOR))
            .is_some_and(|suffix| {
                suffix.len() == 8 && suffix.chars().all(|c| c.is_ascii_hexdigit())
            })
    }
}

fn validate(s: &str) -> Result<(), NameError> {
    if s.is_empty() {
        return Err(NameError::Empty);
    }

    match s
        .char_indices()
        .find(|(_, c)| c.is_whitespace() || c.is_control())
    {
        Some((index, character)) => Err(NameError::InvalidCharacter { character, index }),
        None => Ok(()),
    }
}

impl fmt::Display for NodeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for NodeName {
    type Err = NameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for NodeName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl serde::Serialize for NodeName {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for NodeName {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}
