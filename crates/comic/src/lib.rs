//! Comic archives as a whole: pages in reading order plus whatever metadata
//! is embedded in the container.
//!
//! [`ComicArchive`] wraps one [`panels_archive`] backend and reconciles the
//! [`panels_metadata`] codecs against the container's real contents.

mod archive;
mod cache;
pub mod error;
mod logo;
pub mod pages;
mod probe;

pub use crate::archive::ComicArchive;
pub use crate::cache::Detection;
pub use crate::logo::{fallback_image, set_fallback_image};
pub use crate::probe::{ImageProbe, NoProbe};
