//! Layered configuration for panels.
//!
//! Sources, lowest precedence first:
//!
//! 1. built-in defaults (no backend settings, embedded fallback image);
//! 2. a configuration file, either given explicitly or `config.toml` in the
//!    platform's per-user configuration directory (TOML, YAML or JSON,
//!    chosen by extension);
//! 3. environment variables prefixed with `PANELS_`, with `__` separating
//!    nested keys (`PANELS_BACKENDS__RAR__TOOL_PATH=/usr/bin/rar`).
//!
//! ```toml
//! fallback_image = "/usr/share/panels/missing-page.png"
//!
//! [backends.rar]
//! tool_path = "/usr/bin/rar"
//! tool_options = "-m0"
//! ```

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::{OptionExt, ResultExt};
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use panels_archive::{ArchiveKind, Registry, Settings};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::instrument;

const ENV_PREFIX: &str = "PANELS_";
const CONFIG_FILE_NAME: &str = "config.toml";
const CONFIGURABLE_KINDS: [ArchiveKind; 3] = [ArchiveKind::Folder, ArchiveKind::Zip, ArchiveKind::Rar];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Per-backend settings keyed by `folder`, `zip` or `rar`.
    pub backends: BTreeMap<String, Settings>,
    /// Image substituted for unreadable pages instead of the embedded one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_image: Option<PathBuf>,
}

impl Config {
    /// Load from the per-user configuration directory and the environment.
    ///
    /// A missing `config.toml` is not an error; only the platform lacking a
    /// configuration directory at all is.
    pub fn load() -> Result<Self> {
        let file = Self::default_path().ok_or_raise(|| ErrorKind::NoConfigDir)?;
        Self::extract(Self::figment(&file))
    }

    /// Load from an explicit file and the environment. The file must exist.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            exn::bail!(ErrorKind::FileNotFound(path.to_path_buf()));
        }
        Self::extract(Self::figment(path))
    }

    /// `config.toml` inside the platform's per-user configuration directory.
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "panels").map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
    }

    fn figment(file: &Path) -> Figment {
        let figment = Figment::from(Serialized::defaults(Config::default()));
        let extension = file.extension().and_then(|e| e.to_str()).map(str::to_lowercase);
        let figment = match extension.as_deref() {
            Some("yaml" | "yml") => figment.merge(Yaml::file(file)),
            Some("json") => figment.merge(Json::file(file)),
            _ => figment.merge(Toml::file(file)),
        };
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    #[instrument(level = "debug", skip_all)]
    fn extract(figment: Figment) -> Result<Self> {
        let config: Config = figment.extract().or_raise(|| ErrorKind::Load)?;
        for key in config.backends.keys() {
            if !CONFIGURABLE_KINDS.iter().any(|kind| kind.settings_key() == key) {
                tracing::warn!(backend = %key, "Ignoring settings for unknown backend");
            }
        }
        Ok(config)
    }

    /// Settings for one backend kind, if any were configured.
    pub fn backend(&self, kind: ArchiveKind) -> Option<&Settings> {
        self.backends.get(kind.settings_key())
    }

    /// The builtin registry with every configured backend's settings attached.
    pub fn registry(&self) -> Registry {
        CONFIGURABLE_KINDS.into_iter().fold(Registry::builtin(), |registry, kind| match self.backend(kind) {
            Some(settings) => registry.with_settings(kind, settings.clone()),
            None => registry,
        })
    }

    /// Install the configured fallback image process-wide.
    ///
    /// Returns `false` when there is nothing to install or the fallback was
    /// already initialized.
    pub fn install_fallback_image(&self) -> Result<bool> {
        let Some(path) = &self.fallback_image else {
            return Ok(false);
        };
        let image = std::fs::read(path).or_raise(|| ErrorKind::FallbackImage(path.clone()))?;
        match panels_comic::set_fallback_image(image) {
            Ok(()) => Ok(true),
            Err(_) => {
                tracing::warn!(path = %path.display(), "Fallback image already initialized");
                Ok(false)
            },
        }
    }
}
