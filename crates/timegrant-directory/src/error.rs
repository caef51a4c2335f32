//! Error types for the directory module.

use thiserror::Error;

use timegrant_core::{AttributeId, SubjectId};

/// Errors reported by a directory.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// The subject is unknown to the directory.
    #[error("subject not found: {0}")]
    SubjectNotFound(SubjectId),

    /// The attribute is unknown to the directory.
    #[error("attribute not found: {0}")]
    AttributeNotFound(AttributeId),

    /// A color string that is not `RRGGBB` hex.
    #[error("invalid color: {0}")]
    InvalidColor(String),

    /// The backing system failed.
    #[error("directory backend error: {0}")]
    Backend(String),
}

/// Result type for directory operations.
pub type Result<T> = std::result::Result<T, DirectoryError>;
