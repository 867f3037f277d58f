//! Archive Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.
//!
//! Every failure a backend can hit is reported through [`Result`]; nothing
//! in this crate panics on bad input. Callers that only care about "did it
//! work" can treat any `Err` as the boolean `false` of a write.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// An archive error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for archive operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Entry does not exist inside the container
    #[display("entry not found: {_0}")]
    EntryNotFound(#[error(not(source))] String),
    /// Entry exists but could not be read back intact (corrupt, truncated,
    /// or still undersized after retrying).
    #[display("failed to read entry: {_0}")]
    ReadFailure(#[error(not(source))] String),
    /// Container was left unchanged because the write could not complete.
    #[display("failed to write entry: {_0}")]
    WriteFailure(#[error(not(source))] String),
    /// The backend has no way of performing this operation.
    #[display("operation not supported by {_0} containers")]
    Unsupported(#[error(not(source))] &'static str),
    /// A mutating operation needs an external executable that isn't configured.
    #[display("external tool is not configured")]
    ToolNotConfigured,
    /// External executable exited unsuccessfully (`-1` when killed by signal).
    #[display("external tool exited with code: {_0}")]
    ToolFailed(#[error(not(source))] i32),
    /// No end-of-central-directory record could be located in the zip file.
    #[display("zip end-of-central-directory marker not found")]
    CommentMarkerNotFound,
    /// Zip comments are limited to a 16-bit length.
    #[display("comment is too long: {_0} bytes")]
    CommentTooLong(#[error(not(source))] usize),
    /// Copying between containers stopped part way through.
    #[display("copied {copied} of {total} entries")]
    PartialCopy { copied: usize, total: usize },
    /// Entry name contains invalid characters or escapes the container root
    #[display("invalid path: {}", _0.display())]
    InvalidPath(#[error(not(source))] PathBuf),
    /// The archive library rejected the container.
    #[display("malformed archive")]
    Archive,
    /// Underlying I/O error
    #[display("I/O error")]
    Io,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io | Self::ReadFailure(_) | Self::ToolFailed(_))
    }

    /// Returns `true` for the family of errors raised by entry reads, which
    /// callers may substitute with fallback data.
    pub fn is_read_failure(&self) -> bool {
        matches!(self, Self::EntryNotFound(_) | Self::ReadFailure(_))
    }
}
