//! ComicBookInfo: a JSON envelope stored in the container comment.
//!
//! ```json
//! {
//!   "appID": "Panels/0.1.0",
//!   "lastModified": "2024-03-01T12:00:00Z",
//!   "ComicBookInfo/1.0": { "series": "Saga", "issue": "1", "language": "English", ... }
//! }
//! ```

use super::{Codec, MetadataLocation, MetadataStyle, clean};
use crate::error::{ErrorKind, Result};
use crate::models::{Credit, GenericMetadata, lang};
use exn::ResultExt;
use panels_archive::ArchiveBackend;
use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::instrument;

const PAYLOAD_KEY: &str = "ComicBookInfo/1.0";
const APP_ID: &str = concat!("Panels/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    #[serde(rename = "appID", default, skip_serializing_if = "Option::is_none")]
    app_id: Option<String>,
    #[serde(rename = "lastModified", default, skip_serializing_if = "Option::is_none")]
    last_modified: Option<String>,
    #[serde(rename = "ComicBookInfo/1.0")]
    info: Info,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Info {
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "loose_string")]
    series: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "loose_string")]
    title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "loose_string")]
    issue: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "loose_string")]
    publisher: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "loose_u32")]
    publication_month: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "loose_u32")]
    publication_year: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "loose_u32")]
    number_of_issues: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "loose_string")]
    comments: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "loose_string")]
    genre: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "loose_u32")]
    volume: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "loose_u32")]
    number_of_volumes: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "loose_string")]
    language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "loose_string")]
    country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "loose_f64")]
    rating: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty", deserialize_with = "loose_vec")]
    credits: Vec<CbiCredit>,
    #[serde(default, skip_serializing_if = "Vec::is_empty", deserialize_with = "loose_vec")]
    tags: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CbiCredit {
    person: String,
    role: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    primary: bool,
}

/// Scalar as written by whichever tagger produced the document: numbers
/// appear as strings and strings as numbers often enough to matter.
#[derive(Deserialize)]
#[serde(untagged)]
enum Loose {
    Integer(i64),
    Float(f64),
    Text(String),
    Other(IgnoredAny),
}

fn loose_string<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<String>, D::Error> {
    Ok(match Option::<Loose>::deserialize(deserializer)? {
        Some(Loose::Integer(n)) => Some(n.to_string()),
        Some(Loose::Float(n)) => Some(n.to_string()),
        Some(Loose::Text(s)) => clean(Some(s)),
        Some(Loose::Other(_)) | None => None,
    })
}

fn loose_u32<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<u32>, D::Error> {
    Ok(match Option::<Loose>::deserialize(deserializer)? {
        Some(Loose::Integer(n)) => u32::try_from(n).ok(),
        Some(Loose::Text(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

fn loose_f64<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<f64>, D::Error> {
    Ok(match Option::<Loose>::deserialize(deserializer)? {
        Some(Loose::Integer(n)) => Some(n as f64),
        Some(Loose::Float(n)) => Some(n),
        Some(Loose::Text(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

/// `null` where a list belongs reads as an empty list.
fn loose_vec<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// ComicBookInfo codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct ComicBookInfo;

impl Codec for ComicBookInfo {
    fn style(&self) -> MetadataStyle {
        MetadataStyle::Cbi
    }

    fn detect(&self, backend: &dyn ArchiveBackend) -> Option<MetadataLocation> {
        if !backend.supports_comment() {
            return None;
        }
        match backend.comment() {
            Ok(comment) if self.validate(&comment) => Some(MetadataLocation::Comment),
            Ok(_) => None,
            Err(e) => {
                tracing::debug!(path = %backend.path().display(), error = %e, "Unable to read container comment");
                None
            },
        }
    }

    fn validate(&self, raw: &str) -> bool {
        serde_json::from_str::<serde_json::Value>(raw).is_ok_and(|value| value.get(PAYLOAD_KEY).is_some())
    }

    #[instrument(level = "debug", skip_all, fields(size = raw.len()))]
    fn parse(&self, raw: &str) -> Result<GenericMetadata> {
        if !self.validate(raw) {
            exn::bail!(ErrorKind::InvalidDocument(MetadataStyle::Cbi));
        }
        let envelope: Envelope =
            serde_json::from_str(raw).or_raise(|| ErrorKind::Parse { format: MetadataStyle::Cbi })?;
        let info = envelope.info;
        let language = info.language.and_then(|name| match lang::name_to_iso(&name) {
            Some(iso) => Some(iso.to_string()),
            None => {
                tracing::debug!(language = %name, "Unrecognised language name");
                None
            },
        });
        Ok(GenericMetadata {
            series: info.series,
            title: info.title,
            issue: info.issue,
            publisher: info.publisher,
            month: info.publication_month,
            year: info.publication_year,
            issue_count: info.number_of_issues,
            comments: info.comments,
            genre: info.genre,
            volume: info.volume,
            volume_count: info.number_of_volumes,
            language,
            country: info.country,
            critical_rating: info.rating,
            credits: info
                .credits
                .into_iter()
                .map(|c| Credit { person: c.person, role: c.role, primary: c.primary })
                .collect(),
            tags: info.tags.into_iter().filter_map(|t| clean(Some(t))).collect(),
            ..GenericMetadata::default()
        })
    }

    #[instrument(level = "debug", skip_all)]
    fn serialize(&self, metadata: &GenericMetadata) -> Result<String> {
        let md = metadata.clone();
        let envelope = Envelope {
            app_id: Some(APP_ID.to_string()),
            last_modified: OffsetDateTime::now_utc().format(&Rfc3339).ok(),
            info: Info {
                series: md.series,
                title: md.title,
                issue: md.issue,
                publisher: md.publisher,
                publication_month: md.month,
                publication_year: md.year,
                number_of_issues: md.issue_count,
                comments: md.comments,
                genre: md.genre,
                volume: md.volume,
                number_of_volumes: md.volume_count,
                language: md.language.as_deref().and_then(lang::iso_to_name).map(str::to_string),
                country: md.country,
                rating: md.critical_rating,
                credits: md
                    .credits
                    .into_iter()
                    .map(|c| CbiCredit { person: c.person, role: c.role, primary: c.primary })
                    .collect(),
                tags: md.tags.into_iter().collect(),
            },
        };
        serde_json::to_string(&envelope).or_raise(|| ErrorKind::Serialize { format: MetadataStyle::Cbi })
    }
}
