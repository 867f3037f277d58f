//! Process-wide fallback image.
//!
//! Substituted for pages that can't be read. The image is chosen at most once:
//! either explicitly through [`set_fallback_image`] before first use, or lazily
//! from the `nocover.png` embedded at compile time with
//! [`rust-embed`](rust_embed). It never changes afterwards.

use rust_embed::Embed;
use std::sync::OnceLock;

const EMBEDDED_NAME: &str = "nocover.png";

#[derive(Embed)]
#[folder = "../../assets/"]
struct Assets;

static FALLBACK: OnceLock<Vec<u8>> = OnceLock::new();

/// Install a custom fallback image.
///
/// Returns the rejected bytes if the fallback was already initialized, either
/// by an earlier call or because a page already needed it.
pub fn set_fallback_image(image: Vec<u8>) -> Result<(), Vec<u8>> {
    FALLBACK.set(image)
}

/// The fallback image bytes, initializing from the embedded asset if nothing
/// was installed.
pub fn fallback_image() -> &'static [u8] {
    FALLBACK.get_or_init(|| match Assets::get(EMBEDDED_NAME) {
        Some(file) => file.data.into_owned(),
        None => {
            tracing::warn!(asset = EMBEDDED_NAME, "Embedded fallback image missing");
            Vec::new()
        },
    })
}
