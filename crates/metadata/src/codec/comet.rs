//! CoMet: an XML document stored as an entry whose name is not fixed.

use super::{CREDIT_ROLES, Codec, MetadataLocation, MetadataStyle, clean, join_list, number, root_element, split_list};
use crate::error::{ErrorKind, Result};
use crate::models::{Credit, GenericMetadata};
use exn::ResultExt;
use panels_archive::ArchiveBackend;
use quick_xml::se::Serializer;
use serde::{Deserialize, Serialize};
use tracing::instrument;

const XML_DECLARATION: &str = "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n";
const XMLNS_COMET: &str = "http://www.denvog.com/comet/";
const XMLNS_XSI: &str = "http://www.w3.org/2001/XMLSchema-instance";
const SCHEMA_LOCATION: &str = "http://www.denvog.com/comet/comet.xsd";

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename = "comet", rename_all = "camelCase")]
struct Document {
    #[serde(rename = "@xmlns:comet", default, skip_serializing_if = "Option::is_none")]
    xmlns_comet: Option<String>,
    #[serde(rename = "@xmlns:xsi", default, skip_serializing_if = "Option::is_none")]
    xmlns_xsi: Option<String>,
    #[serde(rename = "@xsi:schemaLocation", default, skip_serializing_if = "Option::is_none")]
    schema_location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    series: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    issue: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    volume: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    publisher: Option<String>,
    /// `YYYY-MM`, or just `YYYY`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    date: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    genre: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    character: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    rating: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pages: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    writer: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    penciller: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    inker: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    colorist: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    letterer: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    cover_designer: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    editor: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    cover_image: Option<String>,
}
impl Document {
    /// Credit lists in [`CREDIT_ROLES`] order.
    fn credit_lists(&mut self) -> [&mut Vec<String>; 7] {
        [
            &mut self.writer,
            &mut self.penciller,
            &mut self.inker,
            &mut self.colorist,
            &mut self.letterer,
            &mut self.cover_designer,
            &mut self.editor,
        ]
    }
}

/// Split a `YYYY-MM` date into its parts. Either half may be missing or
/// unparseable.
fn split_date(date: Option<&str>) -> (Option<u32>, Option<u32>) {
    let Some(date) = date.map(str::trim) else {
        return (None, None);
    };
    let mut parts = date.splitn(3, '-');
    let year = parts.next().and_then(|y| y.trim().parse().ok());
    let month = parts.next().and_then(|m| m.trim().parse().ok()).filter(|m| (1..=12).contains(m));
    (year, month)
}

fn join_date(year: Option<u32>, month: Option<u32>) -> Option<String> {
    match (year, month) {
        (Some(year), Some(month)) => Some(format!("{year:04}-{month:02}")),
        (Some(year), None) => Some(format!("{year:04}")),
        (None, _) => None,
    }
}

/// CoMet codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct CoMet;
impl CoMet {
    /// Entry name used when a container has no CoMet document yet.
    pub const DEFAULT_ENTRY_NAME: &'static str = "CoMet.xml";
}

impl Codec for CoMet {
    fn style(&self) -> MetadataStyle {
        MetadataStyle::Comet
    }

    /// Scans root-level `.xml` entries in name order and returns the first
    /// one holding a CoMet document.
    #[instrument(level = "debug", skip_all, fields(path = %backend.path().display()))]
    fn detect(&self, backend: &dyn ArchiveBackend) -> Option<MetadataLocation> {
        let mut names = backend
            .list_entries()
            .inspect_err(|e| tracing::debug!(error = %e, "Unable to list container"))
            .ok()?;
        names.retain(|name| !name.contains('/') && name.to_lowercase().ends_with(".xml"));
        names.sort();
        names.into_iter().find_map(|name| {
            let raw = backend
                .read_entry(&name)
                .inspect_err(|e| tracing::debug!(entry = %name, error = %e, "Skipping unreadable entry"))
                .ok()?;
            self.validate(&String::from_utf8_lossy(&raw)).then_some(MetadataLocation::Entry(name))
        })
    }

    fn validate(&self, raw: &str) -> bool {
        root_element(raw).is_some_and(|root| root == "comet")
    }

    #[instrument(level = "debug", skip_all, fields(size = raw.len()))]
    fn parse(&self, raw: &str) -> Result<GenericMetadata> {
        if !self.validate(raw) {
            exn::bail!(ErrorKind::InvalidDocument(MetadataStyle::Comet));
        }
        let mut doc: Document =
            quick_xml::de::from_str(raw).or_raise(|| ErrorKind::Parse { format: MetadataStyle::Comet })?;

        let mut credits = Vec::new();
        for ((role, _), people) in CREDIT_ROLES.into_iter().zip(doc.credit_lists()) {
            credits.extend(people.iter().filter_map(|p| clean(Some(p.clone()))).map(|p| Credit::new(p, role)));
        }
        let (year, month) = split_date(doc.date.as_deref());
        let genres: Vec<String> = doc.genre.into_iter().filter_map(|g| clean(Some(g))).collect();
        let characters: Vec<String> = doc.character.into_iter().filter_map(|c| clean(Some(c))).collect();

        Ok(GenericMetadata {
            series: clean(doc.series),
            title: clean(doc.title),
            issue: clean(doc.issue),
            volume: number(doc.volume.as_ref()),
            year,
            month,
            publisher: clean(doc.publisher),
            genre: join_list(genres.iter().map(String::as_str)),
            language: clean(doc.language),
            comments: clean(doc.description),
            format: clean(doc.format),
            characters: join_list(characters.iter().map(String::as_str)),
            age_rating: clean(doc.rating),
            cover_image: clean(doc.cover_image),
            credits,
            page_count: number(doc.pages.as_ref()),
            ..GenericMetadata::default()
        })
    }

    #[instrument(level = "debug", skip_all)]
    fn serialize(&self, metadata: &GenericMetadata) -> Result<String> {
        let md = metadata;
        let mut doc = Document {
            xmlns_comet: Some(XMLNS_COMET.to_string()),
            xmlns_xsi: Some(XMLNS_XSI.to_string()),
            schema_location: Some(format!("{XMLNS_COMET} {SCHEMA_LOCATION}")),
            title: md.title.clone(),
            description: md.comments.clone(),
            series: md.series.clone(),
            issue: md.issue.clone(),
            volume: md.volume.map(|v| v.to_string()),
            publisher: md.publisher.clone(),
            date: join_date(md.year, md.month),
            genre: split_list(md.genre.as_deref()).map(str::to_string).collect(),
            character: split_list(md.characters.as_deref()).map(str::to_string).collect(),
            format: md.format.clone(),
            language: md.language.clone(),
            rating: md.age_rating.clone(),
            pages: md.page_count.map(|v| v.to_string()),
            cover_image: md.cover_image.clone(),
            ..Document::default()
        };
        for ((_, written), people) in CREDIT_ROLES.into_iter().zip(doc.credit_lists()) {
            people.extend(md.credits_for(written).map(|c| c.person.clone()));
        }

        let mut xml = String::from(XML_DECLARATION);
        let mut serializer = Serializer::new(&mut xml);
        serializer.indent(' ', 2);
        doc.serialize(serializer).or_raise(|| ErrorKind::Serialize { format: MetadataStyle::Comet })?;
        xml.push('\n');
        Ok(xml)
    }
}
