//! Error types for the grant manager.

use thiserror::Error;

use timegrant_core::{CoreError, ParseError};
use timegrant_directory::DirectoryError;
use timegrant_store::StoreError;

/// Errors that can occur during grant manager operations.
#[derive(Debug, Error)]
pub enum GrantError {
    /// Bad duration or out-of-range expiry.
    #[error("grant error: {0}")]
    Core(#[from] CoreError),

    /// Reading or writing persisted state failed.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// The directory refused or failed a call.
    #[error("directory error: {0}")]
    Directory(#[from] DirectoryError),

    /// Invalid operation.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
}

impl From<ParseError> for GrantError {
    fn from(e: ParseError) -> Self {
        GrantError::Core(CoreError::Parse(e))
    }
}

impl GrantError {
    /// The duration parse error, if that is what this is.
    pub fn as_parse_error(&self) -> Option<&ParseError> {
        match self {
            GrantError::Core(CoreError::Parse(e)) => Some(e),
            _ => None,
        }
    }
}

/// Result type for grant manager operations.
pub type Result<T> = std::result::Result<T, GrantError>;
