//! Strongly-typed identifier value objects.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::ValidationError;

/// Stable, opaque identifier for a user.
///
/// Identity is owned by the external auth provider; this service only
/// requires the identifier to be non-empty and reasonably sized.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Maximum accepted identifier length.
    const MAX_LEN: usize = 128;

    /// Creates a UserId after validating the raw value.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(ValidationError::empty_field("user_id"));
        }
        if value.len() > Self::MAX_LEN {
            return Err(ValidationError::invalid_format(
                "user_id",
                format!("exceeds {} characters", Self::MAX_LEN),
            ));
        }
        Ok(Self(value))
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
