use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use crate::error::{Error, ErrorKind};

/// What a page is, drawn from the ComicInfo page-type vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageType {
    FrontCover,
    InnerCover,
    Roundup,
    Story,
    Advertisement,
    Editorial,
    Letters,
    Preview,
    BackCover,
    Other,
    /// Page should be hidden by readers (scanner credits, duplicates).
    Deleted,
}
impl PageType {
    /// Returns the identifier used in metadata documents.
    pub fn as_str(&self) -> &'static str {
        match self {
            PageType::FrontCover => "FrontCover",
            PageType::InnerCover => "InnerCover",
            PageType::Roundup => "Roundup",
            PageType::Story => "Story",
            PageType::Advertisement => "Advertisement",
            PageType::Editorial => "Editorial",
            PageType::Letters => "Letters",
            PageType::Preview => "Preview",
            PageType::BackCover => "BackCover",
            PageType::Other => "Other",
            PageType::Deleted => "Deleted",
        }
    }
}
impl FromStr for PageType {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let sanitized = s.trim().to_lowercase().replace([' ', '_', '-'], "");
        Ok(match sanitized.as_str() {
            "frontcover" => Self::FrontCover,
            "innercover" => Self::InnerCover,
            "roundup" => Self::Roundup,
            "story" => Self::Story,
            "advertisement" => Self::Advertisement,
            "editorial" => Self::Editorial,
            "letters" => Self::Letters,
            "preview" => Self::Preview,
            "backcover" => Self::BackCover,
            "other" => Self::Other,
            "deleted" => Self::Deleted,
            _ => exn::bail!(ErrorKind::InvalidField {
                field: "page type",
                value: s.to_string()
            }),
        })
    }
}
impl Display for PageType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}

/// One image of the container, in page order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Page {
    /// 0-based position in the container's sorted image list
    pub image: usize,
    pub kind: Option<PageType>,
    pub double_page: bool,
    /// Size of the image entry in bytes
    pub image_size: Option<u64>,
    pub key: Option<String>,
    pub bookmark: Option<String>,
    pub image_width: Option<u32>,
    pub image_height: Option<u32>,
}
impl Page {
    pub fn new(image: usize) -> Self {
        Self { image, ..Self::default() }
    }

    pub fn with_kind(mut self, kind: PageType) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn is_cover(&self) -> bool {
        self.kind == Some(PageType::FrontCover)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("FrontCover", PageType::FrontCover)]
    #[case("front cover", PageType::FrontCover)]
    #[case("Back_Cover", PageType::BackCover)]
    #[case("DELETED", PageType::Deleted)]
    #[case(" Story ", PageType::Story)]
    fn test_page_type_parse(#[case] input: &str, #[case] expected: PageType) {
        assert_eq!(input.parse::<PageType>().unwrap(), expected);
    }

    #[test]
    fn test_page_type_parse_unknown() {
        let err = "Centerfold".parse::<PageType>().unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidField { field: "page type", .. }));
    }

    #[test]
    fn test_page_type_display_round_trips() {
        for kind in [PageType::FrontCover, PageType::InnerCover, PageType::Letters, PageType::Other] {
            assert_eq!(kind.to_string().parse::<PageType>().unwrap(), kind);
        }
    }
}
