use panels_metadata::{GenericMetadata, MetadataLocation, MetadataStyle};
use std::collections::BTreeMap;

/// What is known about one metadata style in a container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Detection {
    /// Not looked for yet.
    #[default]
    Unprobed,
    Absent,
    Present(MetadataLocation),
}

/// Everything [`ComicArchive`](crate::ComicArchive) memoizes about its
/// container.
///
/// Never patched field by field after a mutation: the facade swaps in a fresh
/// value and re-seeds only what the mutation itself established.
#[derive(Debug, Default)]
pub(crate) struct Cache {
    pub(crate) detection: BTreeMap<MetadataStyle, Detection>,
    pub(crate) metadata: BTreeMap<MetadataStyle, GenericMetadata>,
    pub(crate) pages: Option<Vec<String>>,
}
impl Cache {
    pub(crate) fn detection(&self, style: MetadataStyle) -> Detection {
        self.detection.get(&style).cloned().unwrap_or_default()
    }

    /// Fresh cache recording a single style's outcome.
    pub(crate) fn after_mutation(style: MetadataStyle, detection: Detection, metadata: Option<GenericMetadata>) -> Self {
        let mut cache = Self::default();
        cache.detection.insert(style, detection);
        if let Some(metadata) = metadata {
            cache.metadata.insert(style, metadata);
        }
        cache
    }
}
