//! Metadata codecs.
//!
//! Each supported format is a unit struct implementing [`Codec`]. Callers
//! usually go through [`MetadataStyle`], which dispatches to the right codec
//! with an exhaustive `match`.

mod cbi;
mod cix;
mod comet;

pub use self::cbi::ComicBookInfo;
pub use self::cix::ComicInfo;
pub use self::comet::CoMet;
use crate::GenericMetadata;
use crate::error::{Error, ErrorKind, Result};
use panels_archive::ArchiveBackend;
use quick_xml::Reader;
use quick_xml::events::Event;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// Where a container keeps a format's document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MetadataLocation {
    /// The container-level comment.
    Comment,
    /// A named entry inside the container.
    Entry(String),
}

/// Parser and serializer for one metadata format.
pub trait Codec: Send + Sync {
    fn style(&self) -> MetadataStyle;

    /// Look for this format's document in a container.
    ///
    /// Any failure to inspect the container counts as "not present".
    fn detect(&self, backend: &dyn ArchiveBackend) -> Option<MetadataLocation>;

    /// Whether `raw` is a document in this format. Never fails.
    fn validate(&self, raw: &str) -> bool;

    fn parse(&self, raw: &str) -> Result<GenericMetadata>;

    fn serialize(&self, metadata: &GenericMetadata) -> Result<String>;
}

/// The metadata formats that can be embedded in a comic archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MetadataStyle {
    /// ComicBookInfo: JSON in the container comment
    Cbi,
    /// ComicInfo: `ComicInfo.xml` entry
    Cix,
    /// CoMet: XML entry with no fixed name
    Comet,
}
impl MetadataStyle {
    pub const ALL: [MetadataStyle; 3] = [MetadataStyle::Cbi, MetadataStyle::Cix, MetadataStyle::Comet];

    /// Returns the full display name of the format.
    pub fn as_str(&self) -> &'static str {
        match self {
            MetadataStyle::Cbi => "ComicBookInfo",
            MetadataStyle::Cix => "ComicInfo",
            MetadataStyle::Comet => "CoMet",
        }
    }

    /// Returns the abbreviated name of the format.
    pub fn short_name(&self) -> &'static str {
        match self {
            MetadataStyle::Cbi => "CBI",
            MetadataStyle::Cix => "CIX",
            MetadataStyle::Comet => "CoMet",
        }
    }

    pub fn codec(&self) -> &'static dyn Codec {
        match self {
            MetadataStyle::Cbi => &ComicBookInfo,
            MetadataStyle::Cix => &ComicInfo,
            MetadataStyle::Comet => &CoMet,
        }
    }

    /// Whether the format lives in the container comment rather than an entry.
    pub fn uses_comment(&self) -> bool {
        matches!(self, MetadataStyle::Cbi)
    }
}
impl FromStr for MetadataStyle {
    type Err = Error;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s.trim().to_lowercase().as_str() {
            "cbi" | "comicbookinfo" => Self::Cbi,
            "cix" | "cr" | "comicinfo" | "comicrack" => Self::Cix,
            "comet" | "cmt" => Self::Comet,
            _ => exn::bail!(ErrorKind::InvalidField {
                field: "metadata style",
                value: s.to_string()
            }),
        })
    }
}
impl Display for MetadataStyle {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}

/// Credit roles as the XML formats name them, each with the roles written
/// into it. One credit may land under several (an "Artist" pencils and inks).
pub(crate) const CREDIT_ROLES: [(&str, &[&str]); 7] = [
    ("Writer", &["writer", "plotter", "scripter"]),
    ("Penciller", &["penciller", "penciler", "artist", "breakdowns"]),
    ("Inker", &["inker", "artist", "finishes"]),
    ("Colorist", &["colorist", "colourist", "colorer", "colors"]),
    ("Letterer", &["letterer"]),
    ("Cover", &["cover", "covers", "coverartist", "cover artist"]),
    ("Editor", &["editor"]),
];

/// Local name of the root element, or `None` if the document is not
/// well-formed XML.
pub(crate) fn root_element(raw: &str) -> Option<String> {
    let mut reader = Reader::from_str(raw);
    reader.config_mut().check_end_names = true;
    let mut root = None;
    let mut depth = 0usize;
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                if root.is_none() {
                    root = Some(String::from_utf8_lossy(e.local_name().as_ref()).into_owned());
                }
                depth += 1;
            },
            Ok(Event::Empty(e)) => {
                if root.is_none() {
                    root = Some(String::from_utf8_lossy(e.local_name().as_ref()).into_owned());
                }
            },
            Ok(Event::End(_)) => depth = depth.saturating_sub(1),
            Ok(Event::Eof) => break,
            Ok(_) => {},
            Err(_) => return None,
        }
    }
    match depth {
        0 => root,
        _ => None,
    }
}

/// Trim a text field, treating blank values as absent.
pub(crate) fn clean(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Parse a numeric text field, treating anything unparseable as absent.
pub(crate) fn number<T: FromStr>(value: Option<&String>) -> Option<T> {
    value.and_then(|v| v.trim().parse().ok())
}

/// Split a comma-separated list, dropping blank items.
pub(crate) fn split_list(value: Option<&str>) -> impl Iterator<Item = &str> {
    value.into_iter().flat_map(|v| v.split(',')).map(str::trim).filter(|v| !v.is_empty())
}

/// Join items into a comma-separated list, or `None` if there are none.
pub(crate) fn join_list<'a>(items: impl IntoIterator<Item = &'a str>) -> Option<String> {
    let joined = items.into_iter().collect::<Vec<_>>().join(", ");
    (!joined.is_empty()).then_some(joined)
}
