//! Archive models.

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::Path;

/// Number of leading bytes read from a file before picking a backend.
pub const SIGNATURE_PROBE_LEN: usize = 30;

/// String key/value settings handed to a backend on construction. A missing
/// key means the feature it controls is disabled.
pub type Settings = BTreeMap<String, String>;

/// The container formats this crate knows how to open.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ArchiveKind {
    /// A plain directory of images.
    Folder,
    /// Zip archive (.cbz)
    Zip,
    /// RAR archive (.cbr), mutated through an external executable
    Rar,
    /// Nothing matched; every operation degrades to a no-op.
    #[default]
    Unknown,
}
impl ArchiveKind {
    /// Returns the display name of the container format.
    pub fn as_str(&self) -> &'static str {
        match self {
            ArchiveKind::Folder => "Folder",
            ArchiveKind::Zip => "ZIP",
            ArchiveKind::Rar => "RAR",
            ArchiveKind::Unknown => "Unknown",
        }
    }

    /// Returns the key used for this format's section in configuration.
    pub fn settings_key(&self) -> &'static str {
        match self {
            ArchiveKind::Folder => "folder",
            ArchiveKind::Zip => "zip",
            ArchiveKind::Rar => "rar",
            ArchiveKind::Unknown => "unknown",
        }
    }
}
impl Display for ArchiveKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}

/// What a signature predicate gets to look at: either the fact that the path
/// is a directory, or the first [`SIGNATURE_PROBE_LEN`] bytes of the file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Signature<'a> {
    Directory(&'a Path),
    Bytes(&'a [u8]),
}

/// An entry as reported by a container listing that carries declared sizes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryInfo {
    /// `/`-separated name relative to the container root
    pub name: String,
    /// Uncompressed size the container claims for the entry
    pub size: u64,
}
impl EntryInfo {
    pub fn new(name: impl Into<String>, size: u64) -> Self {
        Self { name: name.into(), size }
    }
}
