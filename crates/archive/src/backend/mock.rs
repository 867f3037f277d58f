//! In-memory archive backend for testing.

use crate::error::{ErrorKind, Result};
use crate::path::{entry_name, validate as validate_path};
use crate::{ArchiveBackend, ArchiveKind};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

/// In-memory archive backend for testing.
///
/// Entries are stored in a `BTreeMap` behind a [`RwLock`], so all trait
/// methods can operate on `&self`. Individual entries can be made to fail on
/// read, write or removal to exercise error paths.
///
/// # Examples
///
/// ```
/// use panels_archive::ArchiveBackend;
/// use panels_archive::backend::MockBackend;
///
/// let backend = MockBackend::with_entries([
///     ("page01.jpg", b"one".to_vec()),
///     ("page02.jpg", b"two".to_vec()),
/// ])
/// .fail_remove("page02.jpg");
/// assert!(backend.remove_entries(&["page01.jpg", "page02.jpg"]).is_err());
/// assert_eq!(backend.list_entries().unwrap(), vec!["page02.jpg"]);
/// ```
#[derive(Debug)]
pub struct MockBackend {
    path: PathBuf,
    kind: ArchiveKind,
    supports_comment: bool,
    writable: bool,
    comment: RwLock<String>,
    entries: RwLock<BTreeMap<String, Vec<u8>>>,
    failing_reads: HashSet<String>,
    failing_writes: HashSet<String>,
    failing_removes: HashSet<String>,
}

impl MockBackend {
    /// Create a mock zip-like container pre-populated with entries.
    ///
    /// Panics if any name fails validation. If test setup is wrong, then the
    /// test should not pass.
    pub fn with_entries(entries: impl IntoIterator<Item = (impl Into<String>, impl Into<Vec<u8>>)>) -> Self {
        let mut map = BTreeMap::new();
        for (name, data) in entries {
            let name = name.into();
            let Ok(validated) = validate_path(&name) else {
                panic!("MockBackend::with_entries: invalid entry name {name}");
            };
            map.insert(entry_name(&validated), data.into());
        }
        Self {
            path: PathBuf::from("mock.cbz"),
            kind: ArchiveKind::Zip,
            supports_comment: true,
            writable: true,
            comment: RwLock::new(String::new()),
            entries: RwLock::new(map),
            failing_reads: HashSet::new(),
            failing_writes: HashSet::new(),
            failing_removes: HashSet::new(),
        }
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = path.into();
        self
    }

    pub fn with_kind(mut self, kind: ArchiveKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_comment(self, comment: impl Into<String>) -> Self {
        *self.comment.write().unwrap_or_else(PoisonError::into_inner) = comment.into();
        self
    }

    /// Behave like a container format without a comment field.
    pub fn without_comment_support(mut self) -> Self {
        self.supports_comment = false;
        self
    }

    /// Report the container as not writable. Writes still go through.
    pub fn read_only(mut self) -> Self {
        self.writable = false;
        self
    }

    /// Reading this entry raises [`ReadFailure`](ErrorKind::ReadFailure).
    pub fn fail_read(mut self, name: impl Into<String>) -> Self {
        self.failing_reads.insert(name.into());
        self
    }

    /// Writing this entry raises [`WriteFailure`](ErrorKind::WriteFailure).
    pub fn fail_write(mut self, name: impl Into<String>) -> Self {
        self.failing_writes.insert(name.into());
        self
    }

    /// Removing this entry raises [`WriteFailure`](ErrorKind::WriteFailure).
    pub fn fail_remove(mut self, name: impl Into<String>) -> Self {
        self.failing_removes.insert(name.into());
        self
    }
}
impl Default for MockBackend {
    fn default() -> Self {
        let entries: [(&str, Vec<u8>); 0] = [];
        Self::with_entries(entries)
    }
}

impl ArchiveBackend for MockBackend {
    fn kind(&self) -> ArchiveKind {
        self.kind
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn set_path(&mut self, path: PathBuf) {
        self.path = path;
    }

    fn supports_comment(&self) -> bool {
        self.supports_comment
    }

    fn comment(&self) -> Result<String> {
        if !self.supports_comment {
            return Ok(String::new());
        }
        Ok(self.comment.read().unwrap_or_else(PoisonError::into_inner).clone())
    }

    fn set_comment(&self, comment: &str) -> Result<()> {
        if !self.supports_comment {
            exn::bail!(ErrorKind::Unsupported(self.kind.as_str()));
        }
        *self.comment.write().unwrap_or_else(PoisonError::into_inner) = comment.to_string();
        Ok(())
    }

    fn read_entry(&self, name: &str) -> Result<Vec<u8>> {
        if self.failing_reads.contains(name) {
            exn::bail!(ErrorKind::ReadFailure(name.to_string()));
        }
        let guard = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        match guard.get(name) {
            Some(data) => Ok(data.clone()),
            None => exn::bail!(ErrorKind::EntryNotFound(name.to_string())),
        }
    }

    fn write_entry(&self, name: &str, data: &[u8]) -> Result<()> {
        let validated = validate_path(name)?;
        if self.failing_writes.contains(name) {
            exn::bail!(ErrorKind::WriteFailure(name.to_string()));
        }
        let mut guard = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        guard.insert(entry_name(&validated), data.to_vec());
        Ok(())
    }

    fn remove_entry(&self, name: &str) -> Result<()> {
        if self.failing_removes.contains(name) {
            exn::bail!(ErrorKind::WriteFailure(name.to_string()));
        }
        let mut guard = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        match guard.remove(name) {
            Some(_) => Ok(()),
            None => exn::bail!(ErrorKind::EntryNotFound(name.to_string())),
        }
    }

    fn list_entries(&self) -> Result<Vec<String>> {
        Ok(self.entries.read().unwrap_or_else(PoisonError::into_inner).keys().cloned().collect())
    }

    fn is_writable(&self) -> bool {
        self.writable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_and_read() {
        let backend = MockBackend::default();
        backend.write_entry("ComicInfo.xml", b"<ComicInfo/>").unwrap();
        assert_eq!(backend.read_entry("ComicInfo.xml").unwrap(), b"<ComicInfo/>");
        assert!(matches!(&*backend.read_entry("missing.xml").unwrap_err(), ErrorKind::EntryNotFound(_)));
    }

    #[test]
    fn test_remove_entries_is_not_transactional() {
        let backend = MockBackend::with_entries([("a.jpg", b"a".to_vec()), ("b.jpg", b"b".to_vec()), ("c.jpg", b"c".to_vec())])
            .fail_remove("b.jpg");
        let err = backend.remove_entries(&["a.jpg", "b.jpg", "c.jpg"]).unwrap_err();
        assert!(matches!(&*err, ErrorKind::WriteFailure(name) if name == "b.jpg"));
        // The first removal stays committed, the third never ran.
        assert_eq!(backend.list_entries().unwrap(), vec!["b.jpg", "c.jpg"]);
    }

    #[test]
    fn test_comment_support() {
        let backend = MockBackend::default().with_comment("hello");
        assert_eq!(backend.comment().unwrap(), "hello");
        let backend = MockBackend::default().without_comment_support().with_kind(ArchiveKind::Folder);
        assert_eq!(backend.comment().unwrap(), "");
        assert!(matches!(&*backend.set_comment("x").unwrap_err(), ErrorKind::Unsupported("Folder")));
    }

    #[test]
    fn test_copy_all_from_replaces_contents() {
        let source = MockBackend::with_entries([("page01.jpg", b"1".to_vec()), ("page02.jpg", b"2".to_vec())]);
        let target = MockBackend::with_entries([("old.jpg", b"old".to_vec())]);
        target.copy_all_from(&source).unwrap();
        assert_eq!(target.list_entries().unwrap(), vec!["page01.jpg", "page02.jpg"]);
    }

    #[test]
    fn test_copy_all_from_reports_partial_copy() {
        let source = MockBackend::with_entries([("page01.jpg", b"1".to_vec()), ("page02.jpg", b"2".to_vec())])
            .fail_read("page02.jpg");
        let target = MockBackend::default();
        let err = target.copy_all_from(&source).unwrap_err();
        assert!(matches!(&*err, ErrorKind::PartialCopy { copied: 1, total: 2 }));
        assert_eq!(target.list_entries().unwrap(), vec!["page01.jpg"]);
    }

    #[test]
    #[should_panic(expected = "invalid entry name")]
    fn test_with_entries_panics_on_bad_name() {
        MockBackend::with_entries([("../escape", b"bad".to_vec())]);
    }
}
