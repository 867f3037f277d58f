//! Archive backend trait and implementations.
//!
//! This module defines the [`ArchiveBackend`] trait, which provides a unified
//! interface for entry-level operations across different container formats
//! (zip archives, RAR archives, plain directories, etc.).

mod external;
mod folder;
#[cfg(any(test, feature = "mock"))]
mod mock;
mod unsupported;
mod zip;

pub use self::external::ExternalToolBackend;
pub use self::folder::FolderBackend;
#[cfg(any(test, feature = "mock"))]
pub use self::mock::MockBackend;
pub use self::unsupported::UnsupportedBackend;
pub use self::zip::ZipBackend;
use crate::ArchiveKind;
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::path::{Path, PathBuf};

/// Unified interface for comic containers.
///
/// All operations are synchronous and blocking. Nothing here locks the
/// container; two callers mutating the same path at once is undefined.
///
/// # Entry Names
/// Entries are identified by `/`-separated names relative to the container
/// root, exactly as the container lists them.
///
/// # Examples
///
/// ```no_run
/// use panels_archive::{ArchiveBackend, Registry, error::Result};
///
/// fn cover_size(path: &str) -> Result<usize> {
///     let backend = Registry::builtin().open(path);
///     let mut names = backend.list_entries()?;
///     names.sort();
///     match names.first() {
///         Some(first) => Ok(backend.read_entry(first)?.len()),
///         None => Ok(0),
///     }
/// }
/// ```
pub trait ArchiveBackend: Send + Sync {
    /// The container format handled by this backend.
    fn kind(&self) -> ArchiveKind;

    /// Location of the container on disk.
    fn path(&self) -> &Path;

    /// Point the backend at a new location after the container was renamed.
    fn set_path(&mut self, path: PathBuf);

    /// Whether the container has a container-level comment at all.
    fn supports_comment(&self) -> bool;

    /// Read the container-level comment.
    ///
    /// Containers without comment support return an empty string.
    fn comment(&self) -> Result<String>;

    /// Replace the container-level comment.
    ///
    /// Containers without comment support always fail.
    fn set_comment(&self, comment: &str) -> Result<()>;

    /// Read the full contents of an entry.
    ///
    /// Returns [`EntryNotFound`](ErrorKind::EntryNotFound) if the entry is
    /// absent and [`ReadFailure`](ErrorKind::ReadFailure) if it cannot be read
    /// back intact.
    fn read_entry(&self, name: &str) -> Result<Vec<u8>>;

    /// Create or overwrite an entry.
    ///
    /// Either the container reflects the new entry afterwards, or it is left
    /// unchanged.
    fn write_entry(&self, name: &str, data: &[u8]) -> Result<()>;

    /// Write several entries, stopping at the first failure.
    ///
    /// Writes that succeeded before the failure stay committed.
    fn write_entries(&self, entries: &[(&str, &[u8])]) -> Result<()> {
        for (name, data) in entries {
            self.write_entry(name, data)?;
        }
        Ok(())
    }

    /// Remove an entry. Raises [`EntryNotFound`](ErrorKind::EntryNotFound)
    /// when there is nothing to remove, where the container can tell.
    fn remove_entry(&self, name: &str) -> Result<()>;

    /// Remove several entries, stopping at the first failure.
    ///
    /// This is **not** transactional: removals that succeeded before the
    /// failure stay committed.
    fn remove_entries(&self, names: &[&str]) -> Result<()> {
        for name in names {
            self.remove_entry(name)?;
        }
        Ok(())
    }

    /// List every entry name in the container, in no particular order.
    ///
    /// Duplicates are passed through as the container reports them.
    fn list_entries(&self) -> Result<Vec<String>>;

    /// Whether both the container and its parent directory can be written.
    fn is_writable(&self) -> bool;

    /// Replace the contents of this container with every entry of `other`.
    ///
    /// Best effort: a failure part way through raises
    /// [`PartialCopy`](ErrorKind::PartialCopy) and leaves whatever was copied
    /// so far in place.
    fn copy_all_from(&self, other: &dyn ArchiveBackend) -> Result<()> {
        let existing = self.list_entries()?;
        let existing: Vec<&str> = existing.iter().map(String::as_str).collect();
        self.remove_entries(&existing).or_raise(|| ErrorKind::PartialCopy { copied: 0, total: existing.len() })?;

        let names = other.list_entries()?;
        let total = names.len();
        for (copied, name) in names.iter().enumerate() {
            let data = other.read_entry(name).or_raise(|| ErrorKind::PartialCopy { copied, total })?;
            self.write_entry(name, &data).or_raise(|| ErrorKind::PartialCopy { copied, total })?;
        }
        tracing::debug!(from = %other.path().display(), to = %self.path().display(), total, "Copied container contents");
        Ok(())
    }
}

/// Both the path and the directory holding it must allow writes.
pub(crate) fn path_is_writable(path: &Path) -> bool {
    let writable = |p: &Path| std::fs::metadata(p).map(|m| !m.permissions().readonly()).unwrap_or(false);
    let Ok(absolute) = std::path::absolute(path) else {
        return false;
    };
    writable(&absolute) && absolute.parent().is_some_and(writable)
}
