//! RAR archives through an external executable.
//!
//! Nothing here links against a RAR library. Listing, reading and comment
//! extraction shell out to a reader (`unrar`, or `rar` itself), and every
//! mutation shells out to the configured `rar` executable.
//!
//! # Settings
//!
//! | Key            | Meaning                                                |
//! |----------------|--------------------------------------------------------|
//! | `tool_path`    | Writer executable. Without it the archive is read-only |
//! | `tool_options` | Extra whitespace-separated switches for mutations      |
//! | `reader_path`  | Reader executable, defaults to `tool_path` then `PATH` |

use crate::backend::{ArchiveBackend, path_is_writable};
use crate::error::{ErrorKind, Result};
use crate::path::validate as validate_path;
use crate::{ArchiveKind, EntryInfo, Settings, Signature};
use exn::{OptionExt, ResultExt};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::time::Duration;
use tracing::instrument;

const RAR_MAGIC: &[u8] = b"Rar!\x1a\x07";
const READ_ATTEMPTS: usize = 7;
const READ_BACKOFF: Duration = Duration::from_secs(1);
const READER_EXECUTABLES: [&str; 2] = ["unrar", "rar"];

/// RAR archive backend (.cbr).
///
/// # Examples
///
/// ```no_run
/// use panels_archive::{ArchiveBackend, Settings};
/// use panels_archive::backend::ExternalToolBackend;
///
/// # fn example() -> panels_archive::error::Result<()> {
/// let settings = Settings::from([("tool_path".to_string(), "/usr/bin/rar".to_string())]);
/// let backend = ExternalToolBackend::new("/comics/Saga 001.cbr", &settings);
/// backend.write_entry("ComicInfo.xml", b"<ComicInfo/>")?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ExternalToolBackend {
    path: PathBuf,
    tool: Option<PathBuf>,
    options: Vec<String>,
    reader: Option<PathBuf>,
    backoff: Duration,
}
impl ExternalToolBackend {
    pub fn new(path: impl Into<PathBuf>, settings: &Settings) -> Self {
        let setting = |key: &str| settings.get(key).map(|v| v.trim()).filter(|v| !v.is_empty());
        let tool = setting("tool_path").map(PathBuf::from);
        let options = setting("tool_options")
            .map(|v| v.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();
        let reader = setting("reader_path").map(PathBuf::from).or_else(|| tool.clone()).or_else(Self::discover_reader);
        Self { path: path.into(), tool, options, reader, backoff: READ_BACKOFF }
    }

    pub fn matches(signature: &Signature) -> bool {
        matches!(signature, Signature::Bytes(bytes) if bytes.starts_with(RAR_MAGIC))
    }

    fn discover_reader() -> Option<PathBuf> {
        for exe in READER_EXECUTABLES {
            if let Ok(path) = which::which(exe) {
                return Some(path);
            }
        }
        tracing::info!("No RAR reader found in PATH");
        None
    }

    fn tool(&self) -> Result<&Path> {
        self.tool.as_deref().ok_or_raise(|| ErrorKind::ToolNotConfigured)
    }

    fn reader(&self) -> Result<&Path> {
        self.reader.as_deref().ok_or_raise(|| ErrorKind::ToolNotConfigured)
    }

    /// The tool is sometimes run from a scratch directory, so it always gets
    /// an absolute archive path.
    fn archive_path(&self) -> Result<PathBuf> {
        std::path::absolute(&self.path).or_raise(|| ErrorKind::InvalidPath(self.path.clone()))
    }

    /// Technical listing of every file entry with its declared size.
    pub fn list_info(&self) -> Result<Vec<EntryInfo>> {
        let archive = self.archive_path()?;
        let output = run(self.reader()?, [OsStr::new("lt"), OsStr::new("-c-"), archive.as_os_str()], None)?;
        Ok(parse_technical_listing(&String::from_utf8_lossy(&output.stdout)))
    }

    fn mutate(&self, args: Vec<&OsStr>, cwd: Option<&Path>) -> Result<()> {
        let tool = self.tool()?;
        run(tool, args, cwd)?;
        Ok(())
    }
}

impl ArchiveBackend for ExternalToolBackend {
    fn kind(&self) -> ArchiveKind {
        ArchiveKind::Rar
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

    /// A missing reader or a failed extraction both read as "no comment".
    fn comment(&self) -> Result<String> {
        let extract = || -> Result<String> {
            let archive = self.archive_path()?;
            let temp_dir = tempfile::tempdir().or_raise(|| ErrorKind::Io)?;
            let target = temp_dir.path().join("comment.txt");
            let args = [OsStr::new("cw"), OsStr::new("-y"), OsStr::new("-inul"), archive.as_os_str(), target.as_os_str()];
            run(self.reader()?, args, None)?;
            match std::fs::read(&target) {
                Ok(bytes) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
                // No comment file is written for archives without a comment.
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
                Err(e) => Err(e).or_raise(|| ErrorKind::Io),
            }
        };
        Ok(extract().unwrap_or_else(|e| {
            tracing::debug!(path = %self.path.display(), error = %e, "Unable to read RAR comment");
            String::new()
        }))
    }

    #[instrument(level = "debug", skip(self, comment), fields(path = %self.path.display()))]
    fn set_comment(&self, comment: &str) -> Result<()> {
        self.tool()?;
        let archive = self.archive_path()?;
        let temp = tempfile::NamedTempFile::new().or_raise(|| ErrorKind::Io)?;
        std::fs::write(temp.path(), comment).or_raise(|| ErrorKind::Io)?;
        let mut switch = std::ffi::OsString::from("-z");
        switch.push(temp.path());
        let mut args = vec![OsStr::new("c"), OsStr::new("-c-"), switch.as_os_str()];
        args.extend(self.options.iter().map(OsStr::new));
        args.push(archive.as_os_str());
        self.mutate(args, None)
    }

    #[instrument(level = "debug", skip(self), fields(path = %self.path.display()))]
    fn read_entry(&self, name: &str) -> Result<Vec<u8>> {
        let listing = self.list_info().or_raise(|| ErrorKind::ReadFailure(name.to_string()))?;
        let Some(info) = listing.iter().find(|info| info.name == name) else {
            exn::bail!(ErrorKind::EntryNotFound(name.to_string()));
        };
        let reader = self.reader()?;
        let archive = self.archive_path()?;
        let args = [OsStr::new("p"), OsStr::new("-inul"), OsStr::new("-c-"), OsStr::new("--"), archive.as_os_str(), OsStr::new(name)];
        with_retries(READ_ATTEMPTS, self.backoff, |attempt| {
            let output = run(reader, args, None)?;
            if output.stdout.len() as u64 != info.size {
                tracing::warn!(
                    path = %self.path.display(),
                    entry = name,
                    expected = info.size,
                    actual = output.stdout.len(),
                    attempt,
                    "Entry is not the expected size"
                );
                exn::bail!(ErrorKind::ReadFailure(name.to_string()));
            }
            Ok(output.stdout)
        })
        .or_raise(|| ErrorKind::ReadFailure(name.to_string()))
    }

    #[instrument(level = "debug", skip(self, data), fields(path = %self.path.display(), size = data.len()))]
    fn write_entry(&self, name: &str, data: &[u8]) -> Result<()> {
        self.tool()?;
        let relative = validate_path(name)?;
        let archive = self.archive_path()?;
        let staging = tempfile::tempdir().or_raise(|| ErrorKind::Io)?;
        let staged = staging.path().join(&relative);
        if let Some(parent) = staged.parent() {
            std::fs::create_dir_all(parent).or_raise(|| ErrorKind::Io)?;
        }
        std::fs::write(&staged, data).or_raise(|| ErrorKind::Io)?;

        let mut args = vec![OsStr::new("a"), OsStr::new("-c-")];
        args.extend(self.options.iter().map(OsStr::new));
        args.extend([OsStr::new("--"), archive.as_os_str(), relative.as_os_str()]);
        self.mutate(args, Some(staging.path())).or_raise(|| ErrorKind::WriteFailure(name.to_string()))
    }

    #[instrument(level = "debug", skip(self), fields(path = %self.path.display()))]
    fn remove_entry(&self, name: &str) -> Result<()> {
        self.tool()?;
        let archive = self.archive_path()?;
        let mut args = vec![OsStr::new("d"), OsStr::new("-c-")];
        args.extend(self.options.iter().map(OsStr::new));
        args.extend([OsStr::new("--"), archive.as_os_str(), OsStr::new(name)]);
        self.mutate(args, None).or_raise(|| ErrorKind::WriteFailure(name.to_string()))
    }

    fn list_entries(&self) -> Result<Vec<String>> {
        Ok(self.list_info()?.into_iter().map(|info| info.name).collect())
    }

    fn is_writable(&self) -> bool {
        self.tool.is_some() && path_is_writable(&self.path)
    }
}

/// Run an executable to completion, capturing its output.
///
/// A non-zero exit raises [`ToolFailed`](ErrorKind::ToolFailed) carrying the
/// exit code, or `-1` when the process was killed by a signal.
fn run<I, S>(program: &Path, args: I, cwd: Option<&Path>) -> Result<Output>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut command = Command::new(program);
    command.args(args).stdin(Stdio::null());
    if let Some(cwd) = cwd {
        command.current_dir(cwd);
    }
    let output = command.output().or_raise(|| ErrorKind::Io)?;
    if !output.status.success() {
        let code = output.status.code().unwrap_or(-1);
        tracing::debug!(
            program = %program.display(),
            code,
            stderr = %String::from_utf8_lossy(&output.stderr).trim(),
            "External tool failed"
        );
        exn::bail!(ErrorKind::ToolFailed(code));
    }
    Ok(output)
}

/// Retry `op` up to `attempts` times, sleeping `delay` between tries.
///
/// Only errors that report themselves as retryable are retried; anything else
/// is returned straight away. `op` receives the 1-based attempt number.
pub(crate) fn with_retries<T>(attempts: usize, delay: Duration, mut op: impl FnMut(usize) -> Result<T>) -> Result<T> {
    let mut attempt = 1;
    loop {
        match op(attempt) {
            Ok(value) => {
                if attempt > 1 {
                    tracing::debug!(attempts = attempt, "Succeeded after retrying");
                }
                return Ok(value);
            },
            Err(e) if attempt < attempts && e.is_retryable() => {
                tracing::debug!(attempt, error = %e, "Retrying after failure");
                std::thread::sleep(delay);
                attempt += 1;
            },
            Err(e) => return Err(e),
        }
    }
}

/// Parse the `Name:`/`Type:`/`Size:` blocks of a technical listing, keeping
/// only regular files.
fn parse_technical_listing(listing: &str) -> Vec<EntryInfo> {
    struct Block<'a> {
        name: &'a str,
        is_file: bool,
        size: u64,
    }
    fn finish(block: Option<Block<'_>>, entries: &mut Vec<EntryInfo>) {
        if let Some(block) = block
            && block.is_file
        {
            entries.push(EntryInfo::new(block.name, block.size));
        }
    }

    let mut entries = Vec::new();
    let mut current: Option<Block> = None;
    for line in listing.lines() {
        let Some((key, value)) = line.trim().split_once(':') else {
            continue;
        };
        let value = value.trim();
        match key {
            "Name" => {
                finish(current.take(), &mut entries);
                current = Some(Block { name: value, is_file: false, size: 0 });
            },
            "Type" => {
                if let Some(block) = current.as_mut() {
                    block.is_file = value == "File";
                }
            },
            "Size" => {
                if let Some(block) = current.as_mut() {
                    block.size = value.parse().unwrap_or_default();
                }
            },
            _ => {},
        }
    }
    finish(current, &mut entries);
    entries
}
