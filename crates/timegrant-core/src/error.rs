//! Error types for timegrant core.

use thiserror::Error;

use crate::duration::DurationField;

/// Errors produced while parsing a duration string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// A unit letter appeared twice.
    #[error("illegal duplication: {field} field at index {index} [{input}]")]
    DuplicateField {
        field: DurationField,
        index: usize,
        input: String,
    },

    /// A character that is neither a digit, whitespace, nor a unit letter.
    #[error("unknown identifier [{unit}] at index {index}")]
    UnknownUnit { unit: char, index: usize },

    /// The value does not fit into 64 bits of seconds.
    #[error("duration overflows: [{input}]")]
    Overflow { input: String },
}

/// Core errors that can occur while building grant records.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("expiry out of range: {seconds}s after {from}")]
    ExpiryOutOfRange {
        seconds: u64,
        from: chrono::DateTime<chrono::Utc>,
    },

    #[error("invalid identifier: {0}")]
    InvalidId(String),
}
