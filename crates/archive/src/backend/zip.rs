//! Zip archive backend.
//!
//! The zip format has no way to delete an entry or edit the archive comment in
//! place, so this backend carries two workarounds:
//!
//! - **Rebuild-on-mutation.** Removing or overwriting entries streams every
//!   other entry (compressed bytes copied verbatim) into a temporary archive
//!   next to the original, which is then renamed over it. Every single-entry
//!   write therefore costs a full pass over the archive.
//! - **Raw comment patch.** The comment lives in the trailing
//!   end-of-central-directory record, so it is rewritten directly in the file
//!   bytes rather than through the zip library.

use crate::backend::{ArchiveBackend, path_is_writable};
use crate::error::{ErrorKind, Result};
use crate::{ArchiveKind, Signature};
use exn::{OptionExt, ResultExt};
use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::instrument;
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// End-of-central-directory signature.
const EOCD_MAGIC: [u8; 4] = [0x50, 0x4B, 0x05, 0x06];
/// Fixed part of the end-of-central-directory record.
const EOCD_LEN: u64 = 22;
/// Offset of the comment length field within the record.
const EOCD_COMMENT_LEN_OFFSET: u64 = 20;
/// How far back from EOF the record can possibly start.
const EOCD_SEARCH_LIMIT: u64 = EOCD_LEN + u16::MAX as u64;

/// Zip archive backend (.cbz).
///
/// # Examples
///
/// ```no_run
/// use panels_archive::ArchiveBackend;
/// use panels_archive::backend::ZipBackend;
///
/// # fn example() -> panels_archive::error::Result<()> {
/// let backend = ZipBackend::new("/comics/Saga 001.cbz");
/// backend.write_entry("ComicInfo.xml", b"<ComicInfo/>")?;
/// assert!(backend.list_entries()?.contains(&"ComicInfo.xml".to_string()));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ZipBackend {
    path: PathBuf,
}
impl ZipBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Create an empty zip archive at `path`, replacing anything already there.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file = File::create(&path).or_raise(|| ErrorKind::Io)?;
        ZipWriter::new(file).finish().or_raise(|| ErrorKind::Archive)?;
        Ok(Self { path })
    }

    /// Signature check: `PK` followed by one of the local-file, empty-archive
    /// or spanned-archive markers.
    pub fn matches(signature: &Signature) -> bool {
        match signature {
            Signature::Bytes(bytes) => {
                bytes.len() >= 4
                    && bytes[0] == b'P'
                    && bytes[1] == b'K'
                    && matches!((bytes[2], bytes[3]), (3, 4) | (5, 6) | (7, 8))
            },
            Signature::Directory(_) => false,
        }
    }

    fn open(&self) -> Result<ZipArchive<File>> {
        let file = File::open(&self.path).or_raise(|| ErrorKind::Io)?;
        ZipArchive::new(file).or_raise(|| ErrorKind::Archive)
    }

    /// Recreate the archive without the entries in `exclude`, optionally
    /// appending new entries, then swap it in place of the original.
    ///
    /// The temporary archive lives in the same directory so the final rename
    /// never crosses filesystems. If anything fails, the temporary file is
    /// dropped (and deleted) and the original is untouched.
    #[instrument(level = "debug", skip_all, fields(path = %self.path.display(), excluded = exclude.len(), appended = append.len()))]
    fn rebuild(&self, exclude: &HashSet<&str>, append: &[(&str, &[u8])]) -> Result<()> {
        let mut source = self.open()?;
        let comment = source.comment().to_vec();
        let mut temp = self.temp_archive()?;

        {
            let mut writer = ZipWriter::new(temp.as_file_mut());
            for index in 0..source.len() {
                let entry = source.by_index_raw(index).or_raise(|| ErrorKind::Archive)?;
                if exclude.contains(entry.name()) {
                    continue;
                }
                writer.raw_copy_file(entry).or_raise(|| ErrorKind::Archive)?;
            }
            let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
            for (name, data) in append {
                writer.start_file(*name, options).or_raise(|| ErrorKind::Archive)?;
                writer.write_all(data).or_raise(|| ErrorKind::Io)?;
            }
            writer.finish().or_raise(|| ErrorKind::Archive)?;
        }
        if !comment.is_empty() {
            write_comment(temp.path(), &comment)?;
        }
        temp.persist(&self.path).or_raise(|| ErrorKind::Io)?;
        Ok(())
    }

    /// Empty temporary file beside the archive, carrying over the archive's
    /// permissions so the eventual rename does not change them.
    fn temp_archive(&self) -> Result<NamedTempFile> {
        let parent = self.parent_dir()?;
        let temp = tempfile::Builder::new()
            .prefix(".panels-")
            .suffix(".tmp")
            .tempfile_in(&parent)
            .or_raise(|| ErrorKind::Io)?;
        if let Ok(metadata) = std::fs::metadata(&self.path) {
            temp.as_file().set_permissions(metadata.permissions()).or_raise(|| ErrorKind::Io)?;
        }
        Ok(temp)
    }

    fn parent_dir(&self) -> Result<PathBuf> {
        let absolute = std::path::absolute(&self.path).or_raise(|| ErrorKind::Io)?;
        match absolute.parent() {
            Some(parent) => Ok(parent.to_path_buf()),
            None => exn::bail!(ErrorKind::InvalidPath(self.path.clone())),
        }
    }
}

impl ArchiveBackend for ZipBackend {
    fn kind(&self) -> ArchiveKind {
        ArchiveKind::Zip
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn set_path(&mut self, path: PathBuf) {
        self.path = path;
    }

    fn supports_comment(&self) -> bool {
        true
    }

    fn comment(&self) -> Result<String> {
        let archive = self.open()?;
        Ok(String::from_utf8_lossy(archive.comment()).into_owned())
    }

    fn set_comment(&self, comment: &str) -> Result<()> {
        write_comment(&self.path, comment.as_bytes())
    }

    fn read_entry(&self, name: &str) -> Result<Vec<u8>> {
        let mut archive = self.open().or_raise(|| ErrorKind::ReadFailure(name.to_string()))?;
        let mut entry = match archive.by_name(name) {
            Ok(entry) => entry,
            Err(ZipError::FileNotFound) => exn::bail!(ErrorKind::EntryNotFound(name.to_string())),
            Err(e) => {
                tracing::info!(path = %self.path.display(), entry = name, error = %e, "Bad zip file");
                return Err(e).or_raise(|| ErrorKind::ReadFailure(name.to_string()));
            },
        };
        let mut data = Vec::with_capacity(usize::try_from(entry.size()).unwrap_or_default());
        entry.read_to_end(&mut data).or_raise(|| ErrorKind::ReadFailure(name.to_string()))?;
        Ok(data)
    }

    fn write_entry(&self, name: &str, data: &[u8]) -> Result<()> {
        self.rebuild(&HashSet::from([name]), &[(name, data)])
            .or_raise(|| ErrorKind::WriteFailure(name.to_string()))
    }

    fn write_entries(&self, entries: &[(&str, &[u8])]) -> Result<()> {
        let names: HashSet<&str> = entries.iter().map(|(name, _)| *name).collect();
        // Later duplicates win, matching the effect of sequential writes.
        let mut seen = HashSet::new();
        let mut unique: Vec<(&str, &[u8])> = entries.iter().rev().filter(|(n, _)| seen.insert(*n)).copied().collect();
        unique.reverse();
        self.rebuild(&names, &unique).or_raise(|| ErrorKind::WriteFailure(format!("{} entries", unique.len())))
    }

    fn remove_entry(&self, name: &str) -> Result<()> {
        if self.open()?.index_for_name(name).is_none() {
            exn::bail!(ErrorKind::EntryNotFound(name.to_string()));
        }
        self.rebuild(&HashSet::from([name]), &[]).or_raise(|| ErrorKind::WriteFailure(name.to_string()))
    }

    fn list_entries(&self) -> Result<Vec<String>> {
        let archive = self.open().inspect_err(|e| {
            tracing::info!(path = %self.path.display(), error = %e, "Unable to list zip file");
        })?;
        Ok(archive.file_names().map(str::to_string).collect())
    }

    fn is_writable(&self) -> bool {
        path_is_writable(&self.path)
    }

    /// Builds the replacement archive in one pass instead of one rebuild per
    /// entry. Unlike the generic copy, a failure leaves this archive untouched.
    fn copy_all_from(&self, other: &dyn ArchiveBackend) -> Result<()> {
        let names = other.list_entries()?;
        let total = names.len();
        let mut entries = Vec::with_capacity(total);
        for (copied, name) in names.iter().enumerate() {
            let data = other.read_entry(name).or_raise(|| ErrorKind::PartialCopy { copied, total })?;
            entries.push((name.as_str(), data));
        }

        let mut temp = self.temp_archive()?;
        {
            let mut writer = ZipWriter::new(temp.as_file_mut());
            let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
            for (name, data) in &entries {
                writer.start_file(*name, options).or_raise(|| ErrorKind::Archive)?;
                writer.write_all(data).or_raise(|| ErrorKind::Io)?;
            }
            writer.finish().or_raise(|| ErrorKind::Archive)?;
        }
        temp.persist(&self.path).or_raise(|| ErrorKind::Io)?;
        tracing::debug!(from = %other.path().display(), to = %self.path.display(), total, "Copied container contents");
        Ok(())
    }
}

/// Overwrite the comment of the zip file at `path` directly in its bytes.
///
/// Walks backwards from the end of the file looking for the
/// end-of-central-directory signature, then rewrites the little-endian
/// comment length that sits 20 bytes in and everything after it.
#[instrument(level = "debug", skip(comment), fields(path = %path.display(), comment_len = comment.len()))]
pub(crate) fn write_comment(path: &Path, comment: &[u8]) -> Result<()> {
    let Ok(comment_len) = u16::try_from(comment.len()) else {
        exn::bail!(ErrorKind::CommentTooLong(comment.len()));
    };
    let mut file = OpenOptions::new().read(true).write(true).open(path).or_raise(|| ErrorKind::Io)?;
    let file_len = file.metadata().or_raise(|| ErrorKind::Io)?.len();
    if file_len < EOCD_LEN {
        exn::bail!(ErrorKind::CommentMarkerNotFound);
    }

    let tail_start = file_len.saturating_sub(EOCD_SEARCH_LIMIT);
    let mut tail = Vec::new();
    file.seek(SeekFrom::Start(tail_start)).or_raise(|| ErrorKind::Io)?;
    file.read_to_end(&mut tail).or_raise(|| ErrorKind::Io)?;
    let record = find_eocd(&tail, file_len - tail_start).ok_or_raise(|| ErrorKind::CommentMarkerNotFound)?;

    let length_field = tail_start + record as u64 + EOCD_COMMENT_LEN_OFFSET;
    file.seek(SeekFrom::Start(length_field)).or_raise(|| ErrorKind::Io)?;
    file.write_all(&comment_len.to_le_bytes()).or_raise(|| ErrorKind::Io)?;
    file.write_all(comment).or_raise(|| ErrorKind::Io)?;
    file.set_len(length_field + 2 + comment.len() as u64).or_raise(|| ErrorKind::Io)?;
    file.sync_all().or_raise(|| ErrorKind::Io)?;
    Ok(())
}

/// Position of the end-of-central-directory record within `tail`.
///
/// Scans backwards. The old comment may itself contain the signature bytes, so
/// a record whose comment length reaches exactly to EOF is preferred; failing
/// that, the last signature in the file is used.
fn find_eocd(tail: &[u8], tail_len: u64) -> Option<usize> {
    let mut first_found = None;
    let last_start = tail.len().checked_sub(EOCD_LEN as usize)?;
    for start in (0..=last_start).rev() {
        if tail[start..start + 4] != EOCD_MAGIC {
            continue;
        }
        first_found.get_or_insert(start);
        let field = start + EOCD_COMMENT_LEN_OFFSET as usize;
        let declared = u16::from_le_bytes([tail[field], tail[field + 1]]) as u64;
        if start as u64 + EOCD_LEN + declared == tail_len {
            return Some(start);
        }
    }
    first_found
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn build_zip(path: &Path, entries: &[(&str, &[u8])], comment: Option<&str>) {
        let mut writer = ZipWriter::new(File::create(path).unwrap());
        for (name, data) in entries {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(data).unwrap();
        }
        if let Some(comment) = comment {
            writer.set_comment(comment.to_string());
        }
        writer.finish().unwrap();
    }

    fn sorted(mut names: Vec<String>) -> Vec<String> {
        names.sort();
        names
    }

    #[rstest]
    #[case(b"PK\x03\x04\x14\x00", true)]
    #[case(b"PK\x05\x06\x00\x00", true)]
    #[case(b"PK\x07\x08", true)]
    #[case(b"PK\x01\x02", false)]
    #[case(b"Rar!\x1a\x07\x00", false)]
    #[case(b"PK", false)]
    #[case(b"", false)]
    fn test_signature(#[case] bytes: &[u8], #[case] expected: bool) {
        assert_eq!(ZipBackend::matches(&Signature::Bytes(bytes)), expected);
    }

    #[test]
    fn test_read_entry() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("comic.cbz");
        build_zip(&path, &[("page01.jpg", b"one"), ("page02.jpg", b"two")], None);
        let backend = ZipBackend::new(&path);
        assert_eq!(backend.read_entry("page02.jpg").unwrap(), b"two");
        let err = backend.read_entry("missing.jpg").unwrap_err();
        assert!(matches!(&*err, ErrorKind::EntryNotFound(_)));
    }

    #[test]
    fn test_read_entry_from_garbage_is_read_failure() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("comic.cbz");
        std::fs::write(&path, b"PK\x03\x04 definitely not a zip").unwrap();
        let err = ZipBackend::new(&path).read_entry("page01.jpg").unwrap_err();
        assert!(err.is_read_failure());
    }

    #[test]
    fn test_write_entry_replaces_existing() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("comic.cbz");
        build_zip(&path, &[("page01.jpg", b"one"), ("ComicInfo.xml", b"old")], None);
        let backend = ZipBackend::new(&path);
        backend.write_entry("ComicInfo.xml", b"new").unwrap();
        assert_eq!(backend.read_entry("ComicInfo.xml").unwrap(), b"new");
        assert_eq!(backend.read_entry("page01.jpg").unwrap(), b"one");
        assert_eq!(sorted(backend.list_entries().unwrap()), vec!["ComicInfo.xml", "page01.jpg"]);
    }

    #[test]
    fn test_write_entries_single_rebuild() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("comic.cbz");
        build_zip(&path, &[("page01.jpg", b"one")], None);
        let backend = ZipBackend::new(&path);
        backend.write_entries(&[("a.xml", b"a"), ("b.xml", b"b"), ("a.xml", b"c")]).unwrap();
        assert_eq!(sorted(backend.list_entries().unwrap()), vec!["a.xml", "b.xml", "page01.jpg"]);
        assert_eq!(backend.read_entry("a.xml").unwrap(), b"c");
    }

    #[test]
    fn test_remove_entry_preserves_comment() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("comic.cbz");
        build_zip(&path, &[("page01.jpg", b"one"), ("CoMet.xml", b"<comet/>")], Some("keep me"));
        let backend = ZipBackend::new(&path);
        backend.remove_entry("CoMet.xml").unwrap();
        assert_eq!(backend.list_entries().unwrap(), vec!["page01.jpg"]);
        assert_eq!(backend.comment().unwrap(), "keep me");
    }

    #[test]
    fn test_remove_missing_entry() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("comic.cbz");
        build_zip(&path, &[("page01.jpg", b"one")], Some("keep me"));
        let before = std::fs::read(&path).unwrap();
        let err = ZipBackend::new(&path).remove_entry("ComicInfo.xml").unwrap_err();
        assert!(matches!(&*err, ErrorKind::EntryNotFound(name) if name == "ComicInfo.xml"));
        assert_eq!(std::fs::read(&path).unwrap(), before);
    }

    #[cfg(unix)]
    #[test]
    fn test_rebuild_keeps_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("comic.cbz");
        build_zip(&path, &[("page01.jpg", b"one")], None);
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();
        let backend = ZipBackend::new(&path);

        backend.write_entry("ComicInfo.xml", b"<ComicInfo/>").unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().permissions().mode() & 0o777, 0o644);

        let other = tempfile::tempdir().unwrap();
        std::fs::write(other.path().join("page01.jpg"), b"one").unwrap();
        backend.copy_all_from(&crate::backend::FolderBackend::new(other.path())).unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().permissions().mode() & 0o777, 0o644);
    }

    #[test]
    fn test_failed_rebuild_leaves_original() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("comic.cbz");
        std::fs::write(&path, b"PK\x03\x04 not really a zip").unwrap();
        let backend = ZipBackend::new(&path);
        assert!(backend.write_entry("ComicInfo.xml", b"data").is_err());
        assert_eq!(std::fs::read(&path).unwrap(), b"PK\x03\x04 not really a zip");
        // No temporary files left behind
        assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_comment_patch_on_empty_comment() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("comic.cbz");
        build_zip(&path, &[("page01.jpg", b"one"), ("page02.jpg", b"two")], None);
        let before = std::fs::read(&path).unwrap();
        let backend = ZipBackend::new(&path);
        backend.set_comment("abc").unwrap();
        assert_eq!(backend.comment().unwrap(), "abc");
        assert_eq!(sorted(backend.list_entries().unwrap()), vec!["page01.jpg", "page02.jpg"]);
        assert_eq!(backend.read_entry("page01.jpg").unwrap(), b"one");
        // Only the length field and the trailing bytes differ
        let after = std::fs::read(&path).unwrap();
        assert_eq!(after.len(), before.len() + 3);
        assert_eq!(after[..before.len() - 2], before[..before.len() - 2]);
        assert_eq!(&after[after.len() - 3..], b"abc");
    }

    #[test]
    fn test_comment_patch_shrinks_and_clears() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("comic.cbz");
        build_zip(&path, &[("page01.jpg", b"one")], Some("a much longer comment than before"));
        let backend = ZipBackend::new(&path);
        backend.set_comment("short").unwrap();
        assert_eq!(backend.comment().unwrap(), "short");
        backend.set_comment("").unwrap();
        assert_eq!(backend.comment().unwrap(), "");
        assert_eq!(backend.read_entry("page01.jpg").unwrap(), b"one");
    }

    #[test]
    fn test_comment_containing_signature() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("comic.cbz");
        build_zip(&path, &[("page01.jpg", b"one")], None);
        let backend = ZipBackend::new(&path);
        backend.set_comment("tricky PK\u{5}\u{6} comment padding padding padding").unwrap();
        backend.set_comment("plain").unwrap();
        assert_eq!(backend.comment().unwrap(), "plain");
    }

    #[test]
    fn test_comment_patch_without_marker() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("comic.cbz");
        std::fs::write(&path, vec![0u8; 64]).unwrap();
        let err = ZipBackend::new(&path).set_comment("abc").unwrap_err();
        assert!(matches!(&*err, ErrorKind::CommentMarkerNotFound));
    }

    #[test]
    fn test_comment_too_long() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("comic.cbz");
        build_zip(&path, &[("page01.jpg", b"one")], None);
        let err = ZipBackend::new(&path).set_comment(&"x".repeat(70_000)).unwrap_err();
        assert!(matches!(&*err, ErrorKind::CommentTooLong(70_000)));
    }

    #[test]
    fn test_create_and_copy_all_from() {
        let temp_dir = tempfile::tempdir().unwrap();
        let source_path = temp_dir.path().join("source.cbz");
        build_zip(&source_path, &[("page01.jpg", b"one"), ("sub/page02.jpg", b"two")], None);
        let target = ZipBackend::create(temp_dir.path().join("target.cbz")).unwrap();
        assert!(target.list_entries().unwrap().is_empty());
        target.copy_all_from(&ZipBackend::new(&source_path)).unwrap();
        assert_eq!(sorted(target.list_entries().unwrap()), vec!["page01.jpg", "sub/page02.jpg"]);
        assert_eq!(target.read_entry("sub/page02.jpg").unwrap(), b"two");
    }

    #[test]
    fn test_set_path_follows_rename() {
        let temp_dir = tempfile::tempdir().unwrap();
        let old = temp_dir.path().join("old.cbz");
        let new = temp_dir.path().join("new.cbz");
        build_zip(&old, &[("page01.jpg", b"one")], None);
        let mut backend = ZipBackend::new(&old);
        std::fs::rename(&old, &new).unwrap();
        backend.set_path(new.clone());
        assert_eq!(backend.path(), new);
        assert_eq!(backend.read_entry("page01.jpg").unwrap(), b"one");
    }
}
