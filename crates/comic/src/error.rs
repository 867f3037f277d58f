//! Comic Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction. Failures from the archive and
//! metadata crates are raised as children of the variant naming the subsystem
//! that failed.

use derive_more::{Display, Error};

/// A comic archive error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for facade operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Classifies the origin of a facade failure.
///
/// ### Dependency Errors
/// - [`ErrorKind::Backend`]
/// - [`ErrorKind::Codec`]
///
/// ### Operational Errors
/// - [`ErrorKind::NotWritable`]
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// A container operation via [`panels_archive::ArchiveBackend`] failed.
    #[display("archive backend operation failed")]
    Backend,
    /// Metadata could not be serialized by its codec.
    #[display("metadata codec failed")]
    Codec,
    /// The container cannot be modified at all.
    #[display("container is not writable")]
    NotWritable,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::Backend)
    }
}
