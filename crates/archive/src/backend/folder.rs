//! Plain directory backend.
//!
//! A folder of images is treated as a container whose entries are the files
//! beneath it. The container comment lives in a sentinel file at the root.

use crate::backend::{ArchiveBackend, path_is_writable};
use crate::error::{ErrorKind, Result};
use crate::path::{entry_name, validate as validate_path};
use crate::{ArchiveKind, Signature};
use exn::ResultExt;
use std::fs::{self, DirEntry};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::instrument;

/// File at the folder root that stores the container comment.
pub const COMMENT_FILE_NAME: &str = "ComicTaggerFolderComment.txt";

enum WalkEntry {
    File(String),
    Descend(PathBuf),
    Skip,
}

/// Directory-as-container backend.
///
/// # Examples
///
/// ```no_run
/// use panels_archive::ArchiveBackend;
/// use panels_archive::backend::FolderBackend;
///
/// # fn example() -> panels_archive::error::Result<()> {
/// let backend = FolderBackend::new("/comics/Saga 001");
/// backend.set_comment("{}")?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct FolderBackend {
    root: PathBuf,
}
impl FolderBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn matches(signature: &Signature) -> bool {
        matches!(signature, Signature::Directory(_))
    }

    /// Validate an entry name and join it onto the folder root.
    fn absolute_path(&self, name: &str) -> Result<PathBuf> {
        Ok(self.root.join(validate_path(name)?))
    }

    fn process_entry(&self, entry: DirEntry) -> Result<WalkEntry> {
        let path = entry.path();
        let file_type = entry.file_type().or_raise(|| ErrorKind::Io)?;
        if file_type.is_dir() {
            return Ok(WalkEntry::Descend(path));
        }
        // Follow symlinks so linked images still count as pages.
        if !path.is_file() {
            return Ok(WalkEntry::Skip);
        }
        let relative = path
            .strip_prefix(&self.root)
            .or_raise(|| ErrorKind::InvalidPath(path.clone()))?;
        let name = entry_name(relative);
        if name == COMMENT_FILE_NAME {
            return Ok(WalkEntry::Skip);
        }
        Ok(WalkEntry::File(name))
    }

    /// Atomically replace the file at `target` with `data`.
    fn write_file(target: &Path, data: &[u8]) -> Result<()> {
        let parent = target.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent).or_raise(|| ErrorKind::Io)?;
        let mut temp = tempfile::Builder::new()
            .prefix(".panels-")
            .suffix(".tmp")
            .tempfile_in(parent)
            .or_raise(|| ErrorKind::Io)?;
        temp.write_all(data).or_raise(|| ErrorKind::Io)?;
        temp.persist(target).or_raise(|| ErrorKind::Io)?;
        Ok(())
    }
}

impl ArchiveBackend for FolderBackend {
    fn kind(&self) -> ArchiveKind {
        ArchiveKind::Folder
    }

    fn path(&self) -> &Path {
        &self.root
    }

    fn set_path(&mut self, path: PathBuf) {
        self.root = path;
    }

    fn supports_comment(&self) -> bool {
        true
    }

    fn comment(&self) -> Result<String> {
        match fs::read(self.root.join(COMMENT_FILE_NAME)) {
            Ok(bytes) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(e).or_raise(|| ErrorKind::Io),
        }
    }

    fn set_comment(&self, comment: &str) -> Result<()> {
        Self::write_file(&self.root.join(COMMENT_FILE_NAME), comment.as_bytes())
            .or_raise(|| ErrorKind::WriteFailure(COMMENT_FILE_NAME.to_string()))
    }

    fn read_entry(&self, name: &str) -> Result<Vec<u8>> {
        let path = self.absolute_path(name)?;
        match fs::read(&path) {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => exn::bail!(ErrorKind::EntryNotFound(name.to_string())),
            Err(e) => Err(e).or_raise(|| ErrorKind::ReadFailure(name.to_string())),
        }
    }

    #[instrument(level = "debug", skip(self, data), fields(root = %self.root.display(), size = data.len()))]
    fn write_entry(&self, name: &str, data: &[u8]) -> Result<()> {
        let path = self.absolute_path(name)?;
        Self::write_file(&path, data).or_raise(|| ErrorKind::WriteFailure(name.to_string()))
    }

    fn remove_entry(&self, name: &str) -> Result<()> {
        let path = self.absolute_path(name)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => exn::bail!(ErrorKind::EntryNotFound(name.to_string())),
            Err(e) => Err(e).or_raise(|| ErrorKind::WriteFailure(name.to_string())),
        }
    }

    fn list_entries(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let mut stack = vec![self.root.clone()];
        while let Some(current) = stack.pop() {
            let entries = fs::read_dir(&current).or_raise(|| ErrorKind::Io)?;
            for entry in entries {
                let entry = entry.or_raise(|| ErrorKind::Io)?;
                match self.process_entry(entry)? {
                    WalkEntry::File(name) => names.push(name),
                    WalkEntry::Descend(dir) => stack.push(dir),
                    WalkEntry::Skip => {},
                }
            }
        }
        Ok(names)
    }

    fn is_writable(&self) -> bool {
        path_is_writable(&self.root)
    }
}
