//! Reflection errors.

use std::fmt;

/// Error raised by schema lookups, accessor invocation, and property-path
/// traversal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReflectionError {
    pub message: String,
}

impl ReflectionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for ReflectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ReflectionError {}

/// Result type alias for reflection operations.
pub type ReflectResult<T> = std::result::Result<T, ReflectionError>;
