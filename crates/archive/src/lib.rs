//! Byte-level access to comic archive containers.
//!
//! Zip archives, RAR archives (through an external executable) and plain
//! directories all sit behind the [`ArchiveBackend`] trait. The [`Registry`]
//! picks the right implementation for a path by sniffing its first bytes.

pub mod backend;
pub mod error;
mod models;
mod path;
mod registry;

pub use crate::backend::ArchiveBackend;
pub use crate::models::{ArchiveKind, EntryInfo, SIGNATURE_PROBE_LEN, Settings, Signature};
pub use crate::path::validate as validate_entry;
pub use crate::registry::{Registry, Variant};

pub type BackendHandle = Box<dyn ArchiveBackend>;
