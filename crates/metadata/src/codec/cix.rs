//! ComicInfo: the `ComicInfo.xml` entry popularised by ComicRack.

use super::{CREDIT_ROLES, Codec, MetadataLocation, MetadataStyle, clean, join_list, number, root_element, split_list};
use crate::error::{ErrorKind, Result};
use crate::models::{Credit, GenericMetadata, Page};
use exn::ResultExt;
use panels_archive::ArchiveBackend;
use quick_xml::se::Serializer;
use serde::{Deserialize, Serialize};
use tracing::instrument;

const XML_DECLARATION: &str = "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n";
const XMLNS_XSI: &str = "http://www.w3.org/2001/XMLSchema-instance";
const XMLNS_XSD: &str = "http://www.w3.org/2001/XMLSchema";

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename = "ComicInfo", rename_all = "PascalCase")]
struct Document {
    #[serde(rename = "@xmlns:xsi", default, skip_serializing_if = "Option::is_none")]
    xmlns_xsi: Option<String>,
    #[serde(rename = "@xmlns:xsd", default, skip_serializing_if = "Option::is_none")]
    xmlns_xsd: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    series: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    count: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    volume: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    year: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    month: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    writer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    penciller: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    inker: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    colorist: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    letterer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    cover_artist: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    editor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    publisher: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    imprint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    genre: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tags: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    web: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    page_count: Option<String>,
    #[serde(rename = "LanguageISO", default, skip_serializing_if = "Option::is_none")]
    language_iso: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    characters: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    teams: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    locations: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    scan_information: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    story_arc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    age_rating: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    community_rating: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pages: Option<Pages>,
}
impl Document {
    /// Credit element for a [`CREDIT_ROLES`] role.
    fn credit_field(&mut self, role: &str) -> Option<&mut Option<String>> {
        Some(match role {
            "Writer" => &mut self.writer,
            "Penciller" => &mut self.penciller,
            "Inker" => &mut self.inker,
            "Colorist" => &mut self.colorist,
            "Letterer" => &mut self.letterer,
            "Cover" => &mut self.cover_artist,
            "Editor" => &mut self.editor,
            _ => return None,
        })
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Pages {
    #[serde(rename = "Page", default)]
    pages: Vec<PageElement>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct PageElement {
    #[serde(rename = "@Image", default, skip_serializing_if = "Option::is_none")]
    image: Option<String>,
    #[serde(rename = "@Type", default, skip_serializing_if = "Option::is_none")]
    kind: Option<String>,
    #[serde(rename = "@DoublePage", default, skip_serializing_if = "Option::is_none")]
    double_page: Option<String>,
    #[serde(rename = "@ImageSize", default, skip_serializing_if = "Option::is_none")]
    image_size: Option<String>,
    #[serde(rename = "@Key", default, skip_serializing_if = "Option::is_none")]
    key: Option<String>,
    #[serde(rename = "@Bookmark", default, skip_serializing_if = "Option::is_none")]
    bookmark: Option<String>,
    #[serde(rename = "@ImageWidth", default, skip_serializing_if = "Option::is_none")]
    image_width: Option<String>,
    #[serde(rename = "@ImageHeight", default, skip_serializing_if = "Option::is_none")]
    image_height: Option<String>,
}
impl PageElement {
    fn into_page(self, position: usize) -> Page {
        Page {
            image: number(self.image.as_ref()).unwrap_or(position),
            kind: clean(self.kind).and_then(|kind| {
                kind.parse()
                    .inspect_err(|_| tracing::debug!(kind = %kind, "Ignoring unknown page type"))
                    .ok()
            }),
            double_page: self.double_page.is_some_and(|v| v.trim().eq_ignore_ascii_case("true")),
            image_size: number(self.image_size.as_ref()),
            key: clean(self.key),
            bookmark: clean(self.bookmark),
            image_width: number(self.image_width.as_ref()),
            image_height: number(self.image_height.as_ref()),
        }
    }

    fn from_page(page: &Page) -> Self {
        Self {
            image: Some(page.image.to_string()),
            kind: page.kind.map(|kind| kind.as_str().to_string()),
            double_page: page.double_page.then(|| "true".to_string()),
            image_size: page.image_size.map(|v| v.to_string()),
            key: page.key.clone(),
            bookmark: page.bookmark.clone(),
            image_width: page.image_width.map(|v| v.to_string()),
            image_height: page.image_height.map(|v| v.to_string()),
        }
    }
}

/// ComicInfo codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct ComicInfo;
impl ComicInfo {
    /// Fixed name of the entry holding the document.
    pub const ENTRY_NAME: &'static str = "ComicInfo.xml";
}

impl Codec for ComicInfo {
    fn style(&self) -> MetadataStyle {
        MetadataStyle::Cix
    }

    fn detect(&self, backend: &dyn ArchiveBackend) -> Option<MetadataLocation> {
        match backend.list_entries() {
            Ok(names) if names.iter().any(|n| n == Self::ENTRY_NAME) => {
                Some(MetadataLocation::Entry(Self::ENTRY_NAME.to_string()))
            },
            Ok(_) => None,
            Err(e) => {
                tracing::debug!(path = %backend.path().display(), error = %e, "Unable to list container");
                None
            },
        }
    }

    fn validate(&self, raw: &str) -> bool {
        root_element(raw).is_some_and(|root| root == "ComicInfo")
    }

    #[instrument(level = "debug", skip_all, fields(size = raw.len()))]
    fn parse(&self, raw: &str) -> Result<GenericMetadata> {
        if !self.validate(raw) {
            exn::bail!(ErrorKind::InvalidDocument(MetadataStyle::Cix));
        }
        let mut doc: Document =
            quick_xml::de::from_str(raw).or_raise(|| ErrorKind::Parse { format: MetadataStyle::Cix })?;

        let mut credits = Vec::new();
        for (role, _) in CREDIT_ROLES {
            let Some(field) = doc.credit_field(role) else {
                continue;
            };
            credits.extend(split_list(field.as_deref()).map(|person| Credit::new(person, role)));
        }
        let pages = doc
            .pages
            .take()
            .map(|p| p.pages.into_iter().enumerate().map(|(i, page)| page.into_page(i)).collect())
            .unwrap_or_default();

        Ok(GenericMetadata {
            series: clean(doc.series),
            title: clean(doc.title),
            issue: clean(doc.number),
            issue_count: number(doc.count.as_ref()),
            volume: number(doc.volume.as_ref()),
            year: number(doc.year.as_ref()),
            month: number(doc.month.as_ref()),
            publisher: clean(doc.publisher),
            imprint: clean(doc.imprint),
            genre: clean(doc.genre),
            language: clean(doc.language_iso),
            critical_rating: number(doc.community_rating.as_ref()),
            comments: clean(doc.summary),
            notes: clean(doc.notes),
            web: clean(doc.web),
            format: clean(doc.format),
            story_arc: clean(doc.story_arc),
            characters: clean(doc.characters),
            teams: clean(doc.teams),
            locations: clean(doc.locations),
            scan_info: clean(doc.scan_information),
            age_rating: clean(doc.age_rating),
            credits,
            tags: split_list(doc.tags.as_deref()).map(str::to_string).collect(),
            page_count: number(doc.page_count.as_ref()),
            pages,
            ..GenericMetadata::default()
        })
    }

    #[instrument(level = "debug", skip_all, fields(pages = metadata.pages.len()))]
    fn serialize(&self, metadata: &GenericMetadata) -> Result<String> {
        let md = metadata;
        let mut doc = Document {
            xmlns_xsi: Some(XMLNS_XSI.to_string()),
            xmlns_xsd: Some(XMLNS_XSD.to_string()),
            title: md.title.clone(),
            series: md.series.clone(),
            number: md.issue.clone(),
            count: md.issue_count.map(|v| v.to_string()),
            volume: md.volume.map(|v| v.to_string()),
            summary: md.comments.clone(),
            notes: md.notes.clone(),
            year: md.year.map(|v| v.to_string()),
            month: md.month.map(|v| v.to_string()),
            publisher: md.publisher.clone(),
            imprint: md.imprint.clone(),
            genre: md.genre.clone(),
            tags: join_list(md.tags.iter().map(String::as_str)),
            web: md.web.clone(),
            page_count: md.page_count.map(|v| v.to_string()),
            language_iso: md.language.clone(),
            format: md.format.clone(),
            characters: md.characters.clone(),
            teams: md.teams.clone(),
            locations: md.locations.clone(),
            scan_information: md.scan_info.clone(),
            story_arc: md.story_arc.clone(),
            age_rating: md.age_rating.clone(),
            community_rating: md.critical_rating.map(|v| v.to_string()),
            pages: (!md.pages.is_empty())
                .then(|| Pages { pages: md.pages.iter().map(PageElement::from_page).collect() }),
            ..Document::default()
        };
        for (role, written) in CREDIT_ROLES {
            let people = join_list(md.credits_for(written).map(|c| c.person.as_str()));
            if let Some(field) = doc.credit_field(role) {
                *field = people;
            }
        }

        let mut xml = String::from(XML_DECLARATION);
        let mut serializer = Serializer::new(&mut xml);
        serializer.indent(' ', 2);
        doc.serialize(serializer).or_raise(|| ErrorKind::Serialize { format: MetadataStyle::Cix })?;
        xml.push('\n');
        Ok(xml)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PageType;
    use panels_archive::backend::MockBackend;

    const FIXTURE: &str = r#"<?xml version="1.0"?>
<ComicInfo xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xmlns:xsd="http://www.w3.org/2001/XMLSchema">
  <Title>The Dark Knight Returns</Title>
  <Series>Batman: The Dark Knight</Series>
  <Number>1</Number>
  <Count>4</Count>
  <Year>1986</Year>
  <Month>2</Month>
  <Writer>Frank Miller</Writer>
  <Penciller>Frank Miller</Penciller>
  <Inker>Klaus Janson, Frank Miller</Inker>
  <Colorist>Lynn Varley</Colorist>
  <CoverArtist>Frank Miller</CoverArtist>
  <Publisher>DC Comics</Publisher>
  <Tags>noir, classic</Tags>
  <PageCount>3</PageCount>
  <LanguageISO>en</LanguageISO>
  <CommunityRating>5</CommunityRating>
  <Pages>
    <Page Image="0" Type="FrontCover" ImageSize="123456" ImageWidth="1280" ImageHeight="1968" />
    <Page Image="1" DoublePage="True" />
    <Page Image="2" Type="Centerfold" Bookmark="End" />
  </Pages>
</ComicInfo>
"#;

    #[test]
    fn test_parse_fixture() {
        let md = ComicInfo.parse(FIXTURE).unwrap();
        assert_eq!(md.title.as_deref(), Some("The Dark Knight Returns"));
        assert_eq!(md.issue.as_deref(), Some("1"));
        assert_eq!(md.issue_count, Some(4));
        assert_eq!(md.year, Some(1986));
        assert_eq!(md.language.as_deref(), Some("en"));
        assert_eq!(md.critical_rating, Some(5.0));
        assert_eq!(md.page_count, Some(3));
        assert_eq!(md.tags.iter().collect::<Vec<_>>(), vec!["classic", "noir"]);
        let inkers: Vec<_> = md.credits_for(&["Inker"]).map(|c| c.person.as_str()).collect();
        assert_eq!(inkers, vec!["Klaus Janson", "Frank Miller"]);
        assert_eq!(md.credits_for(&["Cover"]).count(), 1);

        assert_eq!(md.pages.len(), 3);
        assert_eq!(md.pages[0].kind, Some(PageType::FrontCover));
        assert_eq!(md.pages[0].image_size, Some(123_456));
        assert_eq!(md.pages[0].image_width, Some(1280));
        assert!(md.pages[1].double_page);
        // Unknown page types are dropped, not fatal
        assert_eq!(md.pages[2].kind, None);
        assert_eq!(md.pages[2].bookmark.as_deref(), Some("End"));
    }

    #[test]
    fn test_round_trip() {
        let mut md = GenericMetadata {
            series: Some("Saga".into()),
            title: Some("Chapter One".into()),
            issue: Some("1".into()),
            issue_count: Some(54),
            volume: Some(1),
            year: Some(2012),
            month: Some(3),
            publisher: Some("Image".into()),
            imprint: Some("Image".into()),
            genre: Some("Science Fiction".into()),
            language: Some("en".into()),
            critical_rating: Some(4.5),
            comments: Some("Star-crossed <lovers> & more.".into()),
            notes: Some("Tagged by hand".into()),
            web: Some("https://example.com/saga/1".into()),
            format: Some("Series".into()),
            story_arc: Some("Chapter One".into()),
            characters: Some("Alana, Marko".into()),
            age_rating: Some("Mature 17+".into()),
            page_count: Some(3),
            ..Default::default()
        };
        md.add_credit("Brian K. Vaughan", "Writer", false);
        md.add_credit("Fiona Staples", "Penciller", false);
        md.add_credit("Fonografiks", "Letterer", false);
        md.add_credit("Fiona Staples", "Cover", false);
        md.tags.insert("space opera".into());
        md.set_default_page_list(3);
        md.pages[1].image_size = Some(2048);
        md.pages[2].kind = Some(PageType::BackCover);

        let raw = ComicInfo.serialize(&md).unwrap();
        assert!(raw.starts_with("<?xml"));
        assert!(ComicInfo.validate(&raw));
        assert_eq!(ComicInfo.parse(&raw).unwrap(), md);
    }

    #[test]
    fn test_artist_credit_fills_both_art_roles() {
        let mut md = GenericMetadata::default();
        md.add_credit("Fiona Staples", "Artist", false);
        let raw = ComicInfo.serialize(&md).unwrap();
        assert!(raw.contains("<Penciller>Fiona Staples</Penciller>"));
        assert!(raw.contains("<Inker>Fiona Staples</Inker>"));
        assert!(!raw.contains("<Pages"));
    }

    #[test]
    fn test_validate() {
        assert!(ComicInfo.validate("<ComicInfo/>"));
        assert!(!ComicInfo.validate("<comet></comet>"));
        assert!(!ComicInfo.validate("<ComicInfo><Title></ComicInfo>"));
        assert!(matches!(
            &*ComicInfo.parse("<ComicBook/>").unwrap_err(),
            ErrorKind::InvalidDocument(MetadataStyle::Cix)
        ));
    }

    #[test]
    fn test_detect() {
        let backend =
            MockBackend::with_entries([("page01.jpg", b"".to_vec()), (ComicInfo::ENTRY_NAME, b"<ComicInfo/>".to_vec())]);
        assert_eq!(ComicInfo.detect(&backend), Some(MetadataLocation::Entry(ComicInfo::ENTRY_NAME.to_string())));
        let backend = MockBackend::with_entries([("page01.jpg", b"".to_vec()), ("comicinfo.xml.bak", b"".to_vec())]);
        assert_eq!(ComicInfo.detect(&backend), None);
    }
}
