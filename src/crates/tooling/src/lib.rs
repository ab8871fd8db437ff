//! Tooling utilities shared by the wizard driver crates
//!
//! # Modules
//!
//! - `validation` - Field rules evaluated against JSON values, with a fluent builder
//! - `logging` - Subscriber setup and structured logging helpers

pub mod logging;
pub mod validation;

use thiserror::Error;

/// Errors that can occur in the tooling crate
#[derive(Debug, Error)]
pub enum ToolingError {
    /// General error with message
    #[error("Tooling error: {0}")]
    General(String),

    /// A rule was declared with an unusable definition (bad regex, inverted range)
    #[error("Invalid rule: {0}")]
    InvalidRule(String),

    /// Logging subscriber could not be installed
    #[error("Logging setup failed: {0}")]
    Logging(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for tooling operations
pub type Result<T> = std::result::Result<T, ToolingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ToolingError::InvalidRule("pattern '(' does not compile".to_string());
        assert_eq!(
            err.to_string(),
            "Invalid rule: pattern '(' does not compile"
        );
    }
}
