//! Metadata Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use crate::MetadataStyle;
use derive_more::{Display, Error};

/// A metadata error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for codec operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The document is well-formed but is not in the expected format.
    #[display("not a {_0} document")]
    InvalidDocument(#[error(not(source))] MetadataStyle),
    /// The document could not be parsed.
    #[display("failed to parse {format} document")]
    Parse { format: MetadataStyle },
    /// Metadata could not be turned into a document.
    #[display("failed to serialize {format} document")]
    Serialize { format: MetadataStyle },
    /// A single field held a value the format does not allow.
    #[display("invalid value for field '{field}': {value}")]
    InvalidField {
        /// The field that failed to parse.
        field: &'static str,
        /// The offending value.
        value: String,
    },
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        // Documents are either valid or they're not.
        false
    }
}
