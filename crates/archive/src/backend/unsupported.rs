//! Null-object backend for paths no registered format recognises.
//!
//! Every read reports [`Unsupported`](ErrorKind::Unsupported), listings are
//! empty and nothing is ever writable, so callers holding one simply see a
//! container with no pages and no metadata.

use crate::error::{ErrorKind, Result};
use crate::{ArchiveBackend, ArchiveKind};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct UnsupportedBackend {
    path: PathBuf,
}
impl UnsupportedBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn refuse<T>(&self, operation: &str) -> Result<T> {
        tracing::debug!(path = %self.path.display(), operation, "Unsupported container");
        exn::bail!(ErrorKind::Unsupported(ArchiveKind::Unknown.as_str()))
    }
}

impl ArchiveBackend for UnsupportedBackend {
    fn kind(&self) -> ArchiveKind {
        ArchiveKind::Unknown
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn set_path(&mut self, path: PathBuf) {
        self.path = path;
    }

    fn supports_comment(&self) -> bool {
        false
    }

    fn comment(&self) -> Result<String> {
        Ok(String::new())
    }

    fn set_comment(&self, _comment: &str) -> Result<()> {
        self.refuse("set_comment")
    }

    fn read_entry(&self, _name: &str) -> Result<Vec<u8>> {
        self.refuse("read_entry")
    }

    fn write_entry(&self, _name: &str, _data: &[u8]) -> Result<()> {
        self.refuse("write_entry")
    }

    fn remove_entry(&self, _name: &str) -> Result<()> {
        self.refuse("remove_entry")
    }

    fn list_entries(&self) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    fn is_writable(&self) -> bool {
        false
    }

    fn copy_all_from(&self, _other: &dyn ArchiveBackend) -> Result<()> {
        self.refuse("copy_all_from")
    }
}
