use crate::cache::{Cache, Detection};
use crate::error::{ErrorKind, Result};
use crate::logo::fallback_image;
use crate::pages;
use crate::probe::{ImageProbe, NoProbe};
use exn::ResultExt;
use panels_archive::backend::ZipBackend;
use panels_archive::{ArchiveBackend, ArchiveKind, BackendHandle, Registry};
use panels_metadata::{CoMet, ComicInfo, GenericMetadata, MetadataLocation, MetadataStyle, PageType};
use std::path::{Path, PathBuf};
use tracing::instrument;

/// A comic container and the metadata embedded in it.
///
/// Detection results, parsed metadata and the page list are memoized. Every
/// successful mutation replaces that cache wholesale, so nothing read before a
/// write is ever served after it.
///
/// Callers are expected to give each container a single `ComicArchive`:
/// nothing here guards against two of them mutating the same path.
///
/// # Examples
///
/// ```no_run
/// use panels_archive::Registry;
/// use panels_comic::ComicArchive;
/// use panels_metadata::MetadataStyle;
///
/// let mut comic = ComicArchive::open("/comics/Saga 001.cbz", &Registry::builtin());
/// if comic.has_metadata(MetadataStyle::Cix) {
///     let md = comic.read_metadata(MetadataStyle::Cix);
///     println!("{:?} #{:?}", md.series, md.issue);
/// }
/// ```
pub struct ComicArchive {
    backend: BackendHandle,
    cache: Cache,
    probe: Box<dyn ImageProbe>,
}

impl ComicArchive {
    /// Open `path` with whichever backend the registry picks for it.
    pub fn open(path: impl AsRef<Path>, registry: &Registry) -> Self {
        Self::from_backend(registry.open(path))
    }

    pub fn from_backend(backend: BackendHandle) -> Self {
        Self { backend, cache: Cache::default(), probe: Box::new(NoProbe) }
    }

    /// Use `probe` to measure pages when writing ComicInfo.
    pub fn with_probe(mut self, probe: impl ImageProbe + 'static) -> Self {
        self.probe = Box::new(probe);
        self
    }

    pub fn path(&self) -> &Path {
        self.backend.path()
    }

    pub fn kind(&self) -> ArchiveKind {
        self.backend.kind()
    }

    pub fn backend(&self) -> &dyn ArchiveBackend {
        self.backend.as_ref()
    }

    /// Follow the container after it was moved on disk.
    pub fn rename(&mut self, path: impl Into<PathBuf>) {
        self.backend.set_path(path.into());
    }

    pub fn is_writable(&self) -> bool {
        self.backend.is_writable()
    }

    /// The comment-based style also needs a container with comment support.
    pub fn is_writable_for_style(&self, style: MetadataStyle) -> bool {
        if style.uses_comment() && !self.backend.supports_comment() {
            return false;
        }
        self.is_writable()
    }

    /// A recognised container holding at least one page.
    pub fn seems_to_be_a_comic_archive(&mut self) -> bool {
        self.kind() != ArchiveKind::Unknown && self.page_count() > 0
    }

    /// Image entries in reading order.
    ///
    /// A container that can't be listed has no pages.
    pub fn page_names(&mut self) -> &[String] {
        let backend = &self.backend;
        self.cache.pages.get_or_insert_with(|| match backend.list_entries() {
            Ok(entries) => pages::page_names(entries),
            Err(e) => {
                tracing::warn!(path = %backend.path().display(), error = %e, "Unable to list container pages");
                Vec::new()
            },
        })
    }

    pub fn page_count(&mut self) -> usize {
        self.page_names().len()
    }

    pub fn page_name(&mut self, index: usize) -> Option<&str> {
        self.page_names().get(index).map(String::as_str)
    }

    /// Image bytes for page `index`, or `None` past the last page.
    ///
    /// Pages that exist but can't be read come back as the
    /// [fallback image](crate::fallback_image).
    pub fn page(&mut self, index: usize) -> Option<Vec<u8>> {
        let name = self.page_name(index)?.to_string();
        match self.backend.read_entry(&name) {
            Ok(data) => Some(data),
            Err(e) => {
                tracing::info!(path = %self.path().display(), entry = %name, error = %e, "Substituting fallback page");
                Some(fallback_image().to_vec())
            },
        }
    }

    /// Index of a page that was probably added by the scanner, if any.
    pub fn scanner_page_index(&mut self) -> Option<usize> {
        pages::scanner_page_index(self.page_names())
    }

    /// Where the container keeps `style`, probing it on first use.
    fn detect(&mut self, style: MetadataStyle) -> Option<MetadataLocation> {
        let detection = match self.cache.detection(style) {
            Detection::Unprobed => {
                let found = if self.seems_to_be_a_comic_archive() {
                    style.codec().detect(self.backend.as_ref())
                } else {
                    None
                };
                let detection = match found {
                    Some(location) => Detection::Present(location),
                    None => Detection::Absent,
                };
                self.cache.detection.insert(style, detection.clone());
                detection
            },
            known => known,
        };
        match detection {
            Detection::Present(location) => Some(location),
            _ => None,
        }
    }

    /// Whether the container holds a `style` document.
    pub fn has_metadata(&mut self, style: MetadataStyle) -> bool {
        self.detect(style).is_some()
    }

    fn read_raw(&mut self, style: MetadataStyle) -> Option<String> {
        let location = self.detect(style)?;
        let raw = match &location {
            MetadataLocation::Comment => self.backend.comment(),
            MetadataLocation::Entry(name) => {
                self.backend.read_entry(name).map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
            },
        };
        raw.inspect_err(|e| {
            tracing::info!(path = %self.path().display(), style = %style, error = %e, "Unable to read raw metadata");
        })
        .ok()
    }

    /// Metadata stored as `style`, parsed once and memoized.
    ///
    /// Missing or unparseable documents read as empty metadata. The page list
    /// always matches the container: a stored list of the wrong length is
    /// thrown away and a default one generated in its place.
    #[instrument(level = "debug", skip(self), fields(path = %self.path().display()))]
    pub fn read_metadata(&mut self, style: MetadataStyle) -> &GenericMetadata {
        let metadata = match self.cache.metadata.remove(&style) {
            Some(metadata) => metadata,
            None => {
                let mut metadata = match self.read_raw(style) {
                    Some(raw) => style.codec().parse(&raw).unwrap_or_else(|e| {
                        tracing::warn!(style = %style, error = %e, "Discarding unparseable metadata");
                        GenericMetadata::default()
                    }),
                    None => GenericMetadata::default(),
                };
                self.reconcile_pages(&mut metadata);
                metadata
            },
        };
        self.cache.metadata.entry(style).or_insert(metadata)
    }

    /// Read every style in `styles` into the cache.
    pub fn load_cache(&mut self, styles: impl IntoIterator<Item = MetadataStyle>) {
        for style in styles {
            self.read_metadata(style);
        }
    }

    fn reconcile_pages(&mut self, metadata: &mut GenericMetadata) {
        let count = self.page_count();
        if !metadata.pages.is_empty() && metadata.pages.len() != count {
            tracing::debug!(stored = metadata.pages.len(), count, "Discarding mismatched page list");
            metadata.pages.clear();
        }
        if metadata.pages.is_empty() {
            metadata.set_default_page_list(count);
        }

        // Formats naming the cover by filename.
        let Some(cover) = metadata.cover_image.as_deref() else {
            return;
        };
        let cover_index = self.page_names().iter().position(|name| name == cover);
        if let Some(index) = cover_index.filter(|&i| i != 0)
            && index < metadata.pages.len()
        {
            metadata.pages[0].kind = None;
            metadata.pages[index].kind = Some(PageType::FrontCover);
        }
    }

    /// Fill in what the container knows about its own pages.
    ///
    /// Always sets the page count. With `calc_page_sizes`, every page lacking
    /// a size or dimensions is read back to measure it.
    pub fn apply_archive_info(&mut self, metadata: &mut GenericMetadata, calc_page_sizes: bool) {
        metadata.page_count = u32::try_from(self.page_count()).ok();
        if !calc_page_sizes {
            return;
        }
        for page in metadata.pages.iter_mut() {
            let measured = page.image_width.is_some() && page.image_height.is_some();
            if page.image_size.is_some() && measured {
                continue;
            }
            let Some(name) = self.page_name(page.image).map(str::to_string) else {
                continue;
            };
            let data = match self.backend.read_entry(&name) {
                Ok(data) => data,
                Err(e) => {
                    tracing::debug!(entry = %name, error = %e, "Unable to measure page");
                    continue;
                },
            };
            page.image_size.get_or_insert(data.len() as u64);
            if !measured && let Some((width, height)) = self.probe.dimensions(&data) {
                page.image_width = Some(width);
                page.image_height = Some(height);
            }
        }
    }

    /// Embed `metadata` as `style`.
    ///
    /// The page count (and, for ComicInfo, page sizes) comes from the
    /// container rather than `metadata`. CoMet records the cover by filename
    /// when it isn't the first page.
    #[instrument(level = "debug", skip(self, metadata), fields(path = %self.path().display()))]
    pub fn write_metadata(&mut self, style: MetadataStyle, metadata: &GenericMetadata) -> Result<()> {
        if !self.is_writable_for_style(style) {
            exn::bail!(ErrorKind::NotWritable);
        }
        let location = match style {
            MetadataStyle::Cbi => MetadataLocation::Comment,
            MetadataStyle::Cix => MetadataLocation::Entry(ComicInfo::ENTRY_NAME.to_string()),
            MetadataStyle::Comet => self
                .detect(style)
                .unwrap_or_else(|| MetadataLocation::Entry(CoMet::DEFAULT_ENTRY_NAME.to_string())),
        };

        let mut metadata = metadata.clone();
        self.apply_archive_info(&mut metadata, style == MetadataStyle::Cix);
        if style == MetadataStyle::Comet {
            let cover = metadata.cover_page_index_list()[0];
            metadata.cover_image = if cover == 0 { None } else { self.page_name(cover).map(str::to_string) };
        }

        let raw = style.codec().serialize(&metadata).or_raise(|| ErrorKind::Codec)?;
        let written = match &location {
            MetadataLocation::Comment => self.backend.set_comment(&raw),
            MetadataLocation::Entry(name) => self.backend.write_entry(name, raw.as_bytes()),
        };
        written.or_raise(|| ErrorKind::Backend)?;
        tracing::info!(style = %style, size = raw.len(), "Wrote metadata");

        // Memoize what a fresh read would return, not the caller's copy, since
        // no format stores every field.
        let stored = style.codec().parse(&raw).inspect_err(|e| {
            tracing::warn!(style = %style, error = %e, "Unable to re-read written metadata");
        });
        self.cache = Cache::after_mutation(style, Detection::Present(location), None);
        if let Ok(mut stored) = stored {
            self.reconcile_pages(&mut stored);
            self.cache.metadata.insert(style, stored);
        }
        Ok(())
    }

    /// Remove the `style` document. Succeeds without doing anything when
    /// there is none.
    #[instrument(level = "debug", skip(self), fields(path = %self.path().display()))]
    pub fn remove_metadata(&mut self, style: MetadataStyle) -> Result<()> {
        let Some(location) = self.detect(style) else {
            return Ok(());
        };
        let removed = match &location {
            MetadataLocation::Comment => self.backend.set_comment(""),
            MetadataLocation::Entry(name) => self.backend.remove_entry(name),
        };
        removed.or_raise(|| ErrorKind::Backend)?;
        tracing::info!(style = %style, "Removed metadata");
        self.cache = Cache::after_mutation(style, Detection::Absent, None);
        Ok(())
    }

    /// Write a zip copy of this container to `path`, comment included.
    ///
    /// Does nothing for containers that already are zip archives.
    #[instrument(level = "debug", skip_all, fields(path = %path.as_ref().display()))]
    pub fn export_as_zip(&self, path: impl AsRef<Path>) -> Result<()> {
        if self.kind() == ArchiveKind::Zip {
            return Ok(());
        }
        let zip = ZipBackend::create(path.as_ref()).or_raise(|| ErrorKind::Backend)?;
        zip.copy_all_from(self.backend.as_ref()).or_raise(|| ErrorKind::Backend)?;
        if let Ok(comment) = self.backend.comment()
            && !comment.is_empty()
        {
            zip.set_comment(&comment).or_raise(|| ErrorKind::Backend)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use panels_archive::backend::{FolderBackend, MockBackend};
    use panels_metadata::Page;
    use rstest::rstest;
    use std::fs::File;
    use std::io::Write;
    use zip::ZipWriter;
    use zip::write::SimpleFileOptions;

    fn comic_pages(count: usize) -> Vec<(String, Vec<u8>)> {
        (1..=count).map(|i| (format!("page{i:02}.jpg"), vec![0xff; i * 10])).collect()
    }

    fn mock_comic(count: usize) -> ComicArchive {
        let backend = MockBackend::with_entries(comic_pages(count)).with_kind(ArchiveKind::Zip);
        ComicArchive::from_backend(Box::new(backend))
    }

    fn zip_comic(dir: &Path, count: usize) -> ComicArchive {
        let path = dir.join("comic.cbz");
        let mut writer = ZipWriter::new(File::create(&path).unwrap());
        for (name, data) in comic_pages(count) {
            writer.start_file(name, SimpleFileOptions::default()).unwrap();
            writer.write_all(&data).unwrap();
        }
        writer.finish().unwrap();
        ComicArchive::open(&path, &Registry::builtin())
    }

    fn sample_metadata() -> GenericMetadata {
        let mut md = GenericMetadata {
            series: Some("Saga".into()),
            title: Some("Chapter One".into()),
            issue: Some("1".into()),
            volume: Some(1),
            year: Some(2012),
            month: Some(3),
            publisher: Some("Image".into()),
            genre: Some("Science Fiction".into()),
            language: Some("en".into()),
            comments: Some("Star-crossed lovers.".into()),
            ..Default::default()
        };
        md.add_credit("Brian K. Vaughan", "Writer", false);
        md.add_credit("Fiona Staples", "Penciller", false);
        md
    }

    #[rstest]
    #[case(MetadataStyle::Cbi)]
    #[case(MetadataStyle::Cix)]
    #[case(MetadataStyle::Comet)]
    fn round_trip_through_zip(#[case] style: MetadataStyle) {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut comic = zip_comic(temp_dir.path(), 4);
        assert_eq!(comic.kind(), ArchiveKind::Zip);
        assert!(!comic.has_metadata(style));

        let written = sample_metadata();
        comic.write_metadata(style, &written).unwrap();

        let mut fresh = ComicArchive::open(comic.path(), &Registry::builtin());
        assert!(fresh.has_metadata(style));
        let read = fresh.read_metadata(style).clone();
        assert_eq!(read.series, written.series);
        assert_eq!(read.title, written.title);
        assert_eq!(read.issue, written.issue);
        assert_eq!(read.volume, written.volume);
        assert_eq!(read.year, written.year);
        assert_eq!(read.month, written.month);
        assert_eq!(read.publisher, written.publisher);
        assert_eq!(read.genre, written.genre);
        assert_eq!(read.language, written.language);
        assert_eq!(read.comments, written.comments);
        assert_eq!(read.credits, written.credits);
        assert_eq!(read.pages.len(), 4);
        assert_eq!(read.cover_page_index_list(), vec![0]);
        // The memoized copy agrees with a fresh read
        assert_eq!(*comic.read_metadata(style), read);
    }

    #[rstest]
    #[case(MetadataStyle::Cbi)]
    #[case(MetadataStyle::Cix)]
    #[case(MetadataStyle::Comet)]
    fn memoized_write_drops_unstored_fields(#[case] style: MetadataStyle) {
        let mut comic = mock_comic(4);
        let mut md = GenericMetadata { imprint: Some("Vertigo".into()), ..sample_metadata() };
        md.set_default_page_list(4);
        md.pages[2].kind = Some(PageType::Story);
        comic.write_metadata(style, &md).unwrap();
        let memoized = comic.read_metadata(style).clone();

        comic.cache = Cache::default();
        assert_eq!(*comic.read_metadata(style), memoized);
    }

    #[rstest]
    #[case(MetadataStyle::Cbi)]
    #[case(MetadataStyle::Cix)]
    #[case(MetadataStyle::Comet)]
    fn remove_clears_detection(#[case] style: MetadataStyle) {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut comic = zip_comic(temp_dir.path(), 3);
        comic.write_metadata(style, &sample_metadata()).unwrap();
        assert!(comic.has_metadata(style));

        comic.remove_metadata(style).unwrap();
        assert!(!comic.has_metadata(style));
        assert!(comic.read_metadata(style).is_empty());
        let mut fresh = ComicArchive::open(comic.path(), &Registry::builtin());
        assert!(!fresh.has_metadata(style));
        assert_eq!(fresh.page_count(), 3);
        // Removing again is a no-op
        comic.remove_metadata(style).unwrap();
    }

    #[test]
    fn mismatched_cix_page_list_is_regenerated() {
        let mut md = sample_metadata();
        md.pages = (0..5).map(Page::new).collect();
        md.pages[2].kind = Some(PageType::FrontCover);
        let raw = MetadataStyle::Cix.codec().serialize(&md).unwrap();

        let mut entries = comic_pages(3);
        entries.push((ComicInfo::ENTRY_NAME.to_string(), raw.into_bytes()));
        let mut comic = ComicArchive::from_backend(Box::new(MockBackend::with_entries(entries)));

        let read = comic.read_metadata(MetadataStyle::Cix);
        assert_eq!(read.series.as_deref(), Some("Saga"));
        assert_eq!(read.pages.len(), 3);
        assert_eq!(read.pages[0].kind, Some(PageType::FrontCover));
        assert!(read.pages[1..].iter().all(|p| p.kind.is_none()));
    }

    #[test]
    fn matching_cix_page_list_is_kept() {
        let mut md = sample_metadata();
        md.set_default_page_list(3);
        md.pages[2].kind = Some(PageType::BackCover);
        let raw = MetadataStyle::Cix.codec().serialize(&md).unwrap();

        let mut entries = comic_pages(3);
        entries.push((ComicInfo::ENTRY_NAME.to_string(), raw.into_bytes()));
        let mut comic = ComicArchive::from_backend(Box::new(MockBackend::with_entries(entries)));
        assert_eq!(comic.read_metadata(MetadataStyle::Cix).pages[2].kind, Some(PageType::BackCover));
    }

    #[test]
    fn comet_cover_round_trip() {
        let mut comic = mock_comic(6);
        let mut md = sample_metadata();
        md.set_default_page_list(6);
        md.pages[0].kind = None;
        md.pages[3].kind = Some(PageType::FrontCover);
        comic.write_metadata(MetadataStyle::Comet, &md).unwrap();
        assert!(comic.backend().list_entries().unwrap().contains(&CoMet::DEFAULT_ENTRY_NAME.to_string()));

        // Drop the memoized copy to force a parse
        comic.cache = Cache::default();
        let read = comic.read_metadata(MetadataStyle::Comet);
        assert_eq!(read.cover_image.as_deref(), Some("page04.jpg"));
        assert_eq!(read.cover_page_index_list(), vec![3]);
        assert_eq!(read.pages.iter().filter(|p| p.is_cover()).count(), 1);
    }

    #[test]
    fn comet_cover_moved_back_to_first_page() {
        let mut comic = mock_comic(6);
        let mut md = sample_metadata();
        md.set_default_page_list(6);
        md.pages[0].kind = None;
        md.pages[3].kind = Some(PageType::FrontCover);
        comic.write_metadata(MetadataStyle::Comet, &md).unwrap();

        comic.cache = Cache::default();
        let mut md = comic.read_metadata(MetadataStyle::Comet).clone();
        assert_eq!(md.cover_image.as_deref(), Some("page04.jpg"));
        md.pages[3].kind = None;
        md.pages[0].kind = Some(PageType::FrontCover);
        comic.write_metadata(MetadataStyle::Comet, &md).unwrap();

        comic.cache = Cache::default();
        let read = comic.read_metadata(MetadataStyle::Comet);
        assert_eq!(read.cover_image, None);
        assert_eq!(read.cover_page_index_list(), vec![0]);
    }

    #[test]
    fn comet_rewrites_existing_entry() {
        let mut entries = comic_pages(2);
        entries.push(("meta.xml".to_string(), b"<comet><title>Old</title></comet>".to_vec()));
        let mut comic = ComicArchive::from_backend(Box::new(MockBackend::with_entries(entries)));
        assert_eq!(comic.read_metadata(MetadataStyle::Comet).title.as_deref(), Some("Old"));

        comic.write_metadata(MetadataStyle::Comet, &sample_metadata()).unwrap();
        let names = comic.backend().list_entries().unwrap();
        assert!(names.contains(&"meta.xml".to_string()));
        assert!(!names.contains(&CoMet::DEFAULT_ENTRY_NAME.to_string()));
    }

    #[test]
    fn cix_write_measures_pages() {
        let probe = |data: &[u8]| Some((data.len() as u32, 2 * data.len() as u32));
        let mut comic = mock_comic(3).with_probe(probe);
        let mut md = sample_metadata();
        md.set_default_page_list(3);
        md.pages[1].image_size = Some(999);
        comic.write_metadata(MetadataStyle::Cix, &md).unwrap();

        comic.cache = Cache::default();
        let read = comic.read_metadata(MetadataStyle::Cix);
        assert_eq!(read.page_count, Some(3));
        assert_eq!(read.pages[0].image_size, Some(10));
        assert_eq!(read.pages[0].image_width, Some(10));
        assert_eq!(read.pages[0].image_height, Some(20));
        assert_eq!(read.pages[1].image_size, Some(999));
        assert_eq!(read.pages[2].image_size, Some(30));
    }

    #[test]
    fn write_injects_live_page_count() {
        let mut comic = mock_comic(4);
        let md = GenericMetadata { page_count: Some(99), ..sample_metadata() };
        comic.write_metadata(MetadataStyle::Cix, &md).unwrap();
        comic.cache = Cache::default();
        assert_eq!(comic.read_metadata(MetadataStyle::Cix).page_count, Some(4));
    }

    #[test]
    fn write_failure_keeps_cache() {
        let backend = MockBackend::with_entries(comic_pages(2)).fail_write(ComicInfo::ENTRY_NAME);
        let mut comic = ComicArchive::from_backend(Box::new(backend));
        assert!(!comic.has_metadata(MetadataStyle::Cix));
        let err = comic.write_metadata(MetadataStyle::Cix, &sample_metadata()).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Backend));
        assert!(!comic.has_metadata(MetadataStyle::Cix));
    }

    #[test]
    fn read_only_container_is_not_writable() {
        let backend = MockBackend::with_entries(comic_pages(2)).read_only();
        let mut comic = ComicArchive::from_backend(Box::new(backend));
        let err = comic.write_metadata(MetadataStyle::Cix, &sample_metadata()).unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotWritable));
    }

    #[test]
    fn cbi_needs_comment_support() {
        let backend = MockBackend::with_entries(comic_pages(2)).without_comment_support();
        let comic = ComicArchive::from_backend(Box::new(backend));
        assert!(comic.is_writable());
        assert!(!comic.is_writable_for_style(MetadataStyle::Cbi));
        assert!(comic.is_writable_for_style(MetadataStyle::Cix));
    }

    #[test]
    fn unparseable_metadata_reads_empty() {
        let mut entries = comic_pages(2);
        entries.push((ComicInfo::ENTRY_NAME.to_string(), b"<ComicInfo><Title>broken".to_vec()));
        let mut comic = ComicArchive::from_backend(Box::new(MockBackend::with_entries(entries)));
        assert!(comic.has_metadata(MetadataStyle::Cix));
        let read = comic.read_metadata(MetadataStyle::Cix);
        assert!(read.is_empty());
        assert_eq!(read.pages.len(), 2);
    }

    #[test]
    fn cbi_comment_detection() {
        let cbi = MetadataStyle::Cbi.codec().serialize(&sample_metadata()).unwrap();
        let backend = MockBackend::with_entries(comic_pages(2)).with_comment(cbi);
        let mut comic = ComicArchive::from_backend(Box::new(backend));
        assert!(comic.has_metadata(MetadataStyle::Cbi));
        assert_eq!(comic.read_metadata(MetadataStyle::Cbi).language.as_deref(), Some("en"));

        let backend = MockBackend::with_entries(comic_pages(2)).with_comment("scanned by someone");
        let mut comic = ComicArchive::from_backend(Box::new(backend));
        assert!(!comic.has_metadata(MetadataStyle::Cbi));
    }

    #[test]
    fn containers_without_pages_have_no_metadata() {
        let backend = MockBackend::with_entries([(ComicInfo::ENTRY_NAME, b"<ComicInfo/>".to_vec())]);
        let mut comic = ComicArchive::from_backend(Box::new(backend));
        assert!(!comic.seems_to_be_a_comic_archive());
        assert!(!comic.has_metadata(MetadataStyle::Cix));

        let backend = MockBackend::with_entries(comic_pages(2)).with_kind(ArchiveKind::Unknown);
        let mut comic = ComicArchive::from_backend(Box::new(backend));
        assert!(!comic.seems_to_be_a_comic_archive());
    }

    #[test]
    fn pages_and_fallback() {
        let mut entries = comic_pages(2);
        entries.push((".DS_Store.png".to_string(), vec![]));
        entries.push(("notes.txt".to_string(), vec![]));
        let backend = MockBackend::with_entries(entries).fail_read("page02.jpg");
        let mut comic = ComicArchive::from_backend(Box::new(backend));

        assert_eq!(comic.page_names(), ["page01.jpg".to_string(), "page02.jpg".to_string()]);
        assert_eq!(comic.page_name(1), Some("page02.jpg"));
        assert_eq!(comic.page(0), Some(vec![0xff; 10]));
        assert_eq!(comic.page(1).as_deref(), Some(fallback_image()));
        assert_eq!(comic.page(2), None);
        assert_eq!(comic.page_name(2), None);
    }

    #[test]
    fn scanner_page() {
        let mut entries = comic_pages(5);
        entries.push(("scan_extra_page.jpg".to_string(), vec![1]));
        let backend = MockBackend::with_entries(entries);
        let mut comic = ComicArchive::from_backend(Box::new(backend));
        assert_eq!(comic.scanner_page_index(), Some(5));
        assert_eq!(mock_comic(4).scanner_page_index(), None);
    }

    #[test]
    fn load_cache_memoizes_every_style() {
        let mut comic = mock_comic(2);
        comic.load_cache(MetadataStyle::ALL);
        assert_eq!(comic.cache.metadata.len(), 3);
        assert!(comic.cache.metadata.values().all(GenericMetadata::is_empty));
    }

    #[test]
    fn rename_follows_container() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut comic = zip_comic(temp_dir.path(), 2);
        let moved = temp_dir.path().join("moved.cbz");
        std::fs::rename(comic.path(), &moved).unwrap();
        comic.rename(&moved);
        assert_eq!(comic.path(), moved);
        comic.write_metadata(MetadataStyle::Cix, &sample_metadata()).unwrap();
        assert!(ComicArchive::open(&moved, &Registry::builtin()).has_metadata(MetadataStyle::Cix));
    }

    #[test]
    fn export_folder_as_zip() {
        let temp_dir = tempfile::tempdir().unwrap();
        let folder = temp_dir.path().join("comic");
        std::fs::create_dir(&folder).unwrap();
        for (name, data) in comic_pages(3) {
            std::fs::write(folder.join(name), data).unwrap();
        }
        let mut comic = ComicArchive::from_backend(Box::new(FolderBackend::new(&folder)));
        comic.write_metadata(MetadataStyle::Cbi, &sample_metadata()).unwrap();
        comic.write_metadata(MetadataStyle::Cix, &sample_metadata()).unwrap();

        let target = temp_dir.path().join("comic.cbz");
        comic.export_as_zip(&target).unwrap();

        let mut exported = ComicArchive::open(&target, &Registry::builtin());
        assert_eq!(exported.kind(), ArchiveKind::Zip);
        assert_eq!(exported.page_count(), 3);
        assert!(exported.has_metadata(MetadataStyle::Cix));
        assert!(exported.has_metadata(MetadataStyle::Cbi));
        assert_eq!(exported.page(2), Some(vec![0xff; 30]));
    }

    #[test]
    fn export_zip_is_noop() {
        let temp_dir = tempfile::tempdir().unwrap();
        let comic = zip_comic(temp_dir.path(), 1);
        let target = temp_dir.path().join("copy.cbz");
        comic.export_as_zip(&target).unwrap();
        assert!(!target.exists());
    }

    #[test]
    fn unsupported_container() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("comic.pdf");
        std::fs::write(&path, b"%PDF-1.7").unwrap();
        let mut comic = ComicArchive::open(&path, &Registry::builtin());
        assert_eq!(comic.kind(), ArchiveKind::Unknown);
        assert_eq!(comic.page_count(), 0);
        assert!(!comic.is_writable());
        assert!(!comic.has_metadata(MetadataStyle::Cix));
        assert!(comic.read_metadata(MetadataStyle::Cix).is_empty());
    }
}
