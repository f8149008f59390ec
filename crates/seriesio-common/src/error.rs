//! Error types for SeriesIO
//!
//! This module defines the common error types used throughout the system.

use thiserror::Error;

/// Common result type for SeriesIO operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for SeriesIO
#[derive(Debug, Error)]
pub enum Error {
    // Checkpoint errors
    #[error("checkpoint I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("checkpoint corruption: {0}")]
    Corruption(String),

    // Metadata tree errors
    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("path not found: {0}")]
    PathNotFound(String),

    #[error("path already exists: {0}")]
    PathAlreadyExists(String),

    #[error("alias '{alias}' already maps to a different child under '{parent}'")]
    AliasConflict { alias: String, parent: String },

    // Internal errors
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a checkpoint corruption error
    pub fn corruption(msg: impl Into<String>) -> Self {
        Self::Corruption(msg.into())
    }

    /// Create an invalid path error
    pub fn invalid_path(msg: impl Into<String>) -> Self {
        Self::InvalidPath(msg.into())
    }

    /// Create a new internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Check if this is a not found error
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::PathNotFound(_))
    }

    /// Check if this error means the checkpoint cannot be trusted
    #[must_use]
    pub fn is_corruption(&self) -> bool {
        matches!(self, Self::Corruption(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_not_found() {
        assert!(Error::PathNotFound("root.sg1".into()).is_not_found());
        assert!(!Error::corruption("bad line").is_not_found());
    }

    #[test]
    fn test_error_corruption() {
        assert!(Error::corruption("leftover nodes").is_corruption());
        assert!(!Error::invalid_path("empty path").is_corruption());
    }

    #[test]
    fn test_error_display() {
        let err = Error::AliasConflict {
            alias: "temperature".into(),
            parent: "root.sg1.d1".into(),
        };
        assert_eq!(
            err.to_string(),
            "alias 'temperature' already maps to a different child under 'root.sg1.d1'"
        );
    }
}
