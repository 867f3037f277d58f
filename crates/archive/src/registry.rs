//! Picks a backend for a path by sniffing its first bytes.

use crate::backend::{ExternalToolBackend, FolderBackend, UnsupportedBackend, ZipBackend};
use crate::{ArchiveKind, BackendHandle, SIGNATURE_PROBE_LEN, Settings, Signature};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::instrument;

/// A container format the registry can open.
#[derive(Clone, Copy)]
pub struct Variant {
    pub kind: ArchiveKind,
    /// Decides from the signature alone; must never open the container.
    pub matches: fn(&Signature) -> bool,
    pub open: fn(PathBuf, &Settings) -> BackendHandle,
}

/// Ordered list of variants; the first whose signature matches wins.
///
/// # Examples
///
/// ```no_run
/// use panels_archive::{ArchiveKind, Registry, Settings};
///
/// let rar = Settings::from([("tool_path".to_string(), "/usr/bin/rar".to_string())]);
/// let registry = Registry::builtin().with_settings(ArchiveKind::Rar, rar);
/// let backend = registry.open("/comics/Saga 001.cbr");
/// println!("{}", backend.kind());
/// ```
#[derive(Clone)]
pub struct Registry {
    variants: Vec<Variant>,
    settings: BTreeMap<ArchiveKind, Settings>,
}
impl Registry {
    /// Folder, then Zip, then RAR.
    pub fn builtin() -> Self {
        Self {
            variants: vec![
                Variant {
                    kind: ArchiveKind::Folder,
                    matches: FolderBackend::matches,
                    open: |path, _| Box::new(FolderBackend::new(path)),
                },
                Variant {
                    kind: ArchiveKind::Zip,
                    matches: ZipBackend::matches,
                    open: |path, _| Box::new(ZipBackend::new(path)),
                },
                Variant {
                    kind: ArchiveKind::Rar,
                    matches: ExternalToolBackend::matches,
                    open: |path, settings| Box::new(ExternalToolBackend::new(path, settings)),
                },
            ],
            settings: BTreeMap::new(),
        }
    }

    /// Attach settings for one container format, replacing any already set.
    pub fn with_settings(mut self, kind: ArchiveKind, settings: Settings) -> Self {
        self.settings.insert(kind, settings);
        self
    }

    /// Append a variant, consulted after every variant already registered.
    pub fn register(mut self, variant: Variant) -> Self {
        self.variants.push(variant);
        self
    }

    pub fn settings(&self, kind: ArchiveKind) -> Option<&Settings> {
        self.settings.get(&kind)
    }

    /// Open the backend for `path`.
    ///
    /// Never fails: unreadable or unrecognised paths get an
    /// [`UnsupportedBackend`].
    #[instrument(level = "debug", skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(&self, path: impl AsRef<Path>) -> BackendHandle {
        let path = path.as_ref();
        let empty = Settings::new();
        let probe = if path.is_dir() {
            None
        } else {
            match read_probe(path) {
                Ok(bytes) => Some(bytes),
                Err(e) => {
                    tracing::debug!(error = %e, "Unable to read container signature");
                    return Box::new(UnsupportedBackend::new(path));
                },
            }
        };
        let signature = match &probe {
            Some(bytes) => Signature::Bytes(bytes),
            None => Signature::Directory(path),
        };
        for variant in &self.variants {
            if (variant.matches)(&signature) {
                tracing::trace!(kind = %variant.kind, "Matched container signature");
                let settings = self.settings.get(&variant.kind).unwrap_or(&empty);
                return (variant.open)(path.to_path_buf(), settings);
            }
        }
        Box::new(UnsupportedBackend::new(path))
    }
}
impl Default for Registry {
    fn default() -> Self {
        Self::builtin()
    }
}

fn read_probe(path: &Path) -> std::io::Result<Vec<u8>> {
    let mut buffer = Vec::with_capacity(SIGNATURE_PROBE_LEN);
    File::open(path)?.take(SIGNATURE_PROBE_LEN as u64).read_to_end(&mut buffer)?;
    Ok(buffer)
}
