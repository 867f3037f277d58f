//! Entry name validation.
//!
//! Entry names are always `/`-separated, relative to the container root. The
//! directory backend maps them onto the filesystem, so they must never be
//! allowed to climb out of the comic's folder.

use std::path::{Component, Path, PathBuf};

use crate::error::{ErrorKind, Result};

/// Validates an entry name and resolves it into a relative path.
///
/// > **Note:** Null bytes are explicitly rejected, `..` is resolved but may
/// >           never leave the container root.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use panels_archive::validate_entry;
/// assert!(validate_entry("ComicInfo.xml").is_ok());
/// assert!(validate_entry("chapter 1/page01.jpg").is_ok());
/// assert!(validate_entry("../outside.jpg").is_err());
/// assert_eq!(validate_entry("./extras//../page01.jpg").unwrap(), Path::new("page01.jpg"));
/// ```
pub fn validate(name: impl AsRef<Path>) -> Result<PathBuf> {
    let name = name.as_ref();
    let mut components = Vec::new();
    for component in name.components() {
        match component {
            Component::Normal(s) => {
                // Null bytes pass through Path::components() on Unix but cause
                // truncation in C-based syscalls.
                if s.as_encoded_bytes().contains(&0) {
                    exn::bail!(ErrorKind::InvalidPath(name.to_path_buf()));
                }
                components.push(s)
            },
            Component::CurDir | Component::RootDir => {},
            Component::Prefix(_) => exn::bail!(ErrorKind::InvalidPath(name.to_path_buf())),
            Component::ParentDir => {
                if components.pop().is_none() {
                    exn::bail!(ErrorKind::InvalidPath(name.to_path_buf()));
                }
            },
        }
    }
    if components.is_empty() {
        exn::bail!(ErrorKind::InvalidPath(name.to_path_buf()));
    }
    Ok(components.into_iter().collect())
}

/// Joins the components of a relative path with `/`, the separator every
/// container format uses for entry names regardless of platform.
pub(crate) fn entry_name(relative: &Path) -> String {
    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("ComicInfo.xml", "ComicInfo.xml")]
    #[case("chapter1/page01.jpg", "chapter1/page01.jpg")]
    #[case("a//b//c.png", "a/b/c.png")]
    #[case("a/./b/./c.png", "a/b/c.png")]
    #[case("extras/../page01.jpg", "page01.jpg")]
    #[case("covers/", "covers")]
    fn test_valid_entries(#[case] name: &str, #[case] expected: &str) {
        assert_eq!(validate(name).unwrap(), Path::new(expected));
    }

    #[rstest]
    #[case("../ComicInfo.xml")]
    #[case("a/../../b.jpg")]
    #[case("..")]
    #[case("a\0b")]
    #[case("")]
    #[case("./")]
    #[case("//")]
    fn test_invalid_entries(#[case] name: &str) {
        assert!(validate(name).is_err());
    }

    #[test]
    fn test_entry_name_uses_forward_slashes() {
        let relative: PathBuf = ["chapter 1", "page01.jpg"].iter().collect();
        assert_eq!(entry_name(&relative), "chapter 1/page01.jpg");
    }
}
