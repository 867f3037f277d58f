use super::{Credit, Page, PageType};
use std::collections::BTreeSet;

/// Format-neutral comic metadata.
///
/// Every codec reads into and writes out of this one structure. A field a
/// format cannot represent is simply left unset on parse and ignored on
/// serialize. Missing metadata is [`GenericMetadata::default()`], never a
/// `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenericMetadata {
    pub series: Option<String>,
    pub title: Option<String>,
    /// Issue identifier; not necessarily numeric ("1/2", "Annual 3")
    pub issue: Option<String>,
    pub issue_count: Option<u32>,
    pub volume: Option<u32>,
    pub volume_count: Option<u32>,
    pub year: Option<u32>,
    pub month: Option<u32>,
    pub publisher: Option<String>,
    pub imprint: Option<String>,
    pub genre: Option<String>,
    /// ISO 639-1 language code
    pub language: Option<String>,
    pub country: Option<String>,
    pub critical_rating: Option<f64>,
    pub comments: Option<String>,
    pub notes: Option<String>,
    pub web: Option<String>,
    pub format: Option<String>,
    pub story_arc: Option<String>,
    pub characters: Option<String>,
    pub teams: Option<String>,
    pub locations: Option<String>,
    pub scan_info: Option<String>,
    pub age_rating: Option<String>,
    /// Cover filename, for formats that identify the cover by name
    pub cover_image: Option<String>,
    pub credits: Vec<Credit>,
    pub tags: BTreeSet<String>,
    pub page_count: Option<u32>,
    pub pages: Vec<Page>,
}

impl GenericMetadata {
    /// `true` until a descriptive field has been populated.
    ///
    /// Page count and page list describe the container rather than the comic,
    /// so they don't count.
    pub fn is_empty(&self) -> bool {
        let strings = [
            &self.series,
            &self.title,
            &self.issue,
            &self.publisher,
            &self.imprint,
            &self.genre,
            &self.language,
            &self.country,
            &self.comments,
            &self.notes,
            &self.web,
            &self.format,
            &self.story_arc,
            &self.characters,
            &self.teams,
            &self.locations,
            &self.scan_info,
            &self.age_rating,
            &self.cover_image,
        ];
        let numbers = [self.issue_count, self.volume, self.volume_count, self.year, self.month];
        strings.iter().all(|s| s.is_none())
            && numbers.iter().all(Option::is_none)
            && self.critical_rating.is_none()
            && self.credits.is_empty()
            && self.tags.is_empty()
    }

    /// Replace the page list with `count` sequential pages, the first of
    /// which is the front cover.
    pub fn set_default_page_list(&mut self, count: usize) {
        self.pages = (0..count)
            .map(|i| match i {
                0 => Page::new(i).with_kind(PageType::FrontCover),
                _ => Page::new(i),
            })
            .collect();
    }

    /// Indices of every page typed as a front cover, or `[0]` if none is.
    pub fn cover_page_index_list(&self) -> Vec<usize> {
        let covers: Vec<usize> = self.pages.iter().filter(|p| p.is_cover()).map(|p| p.image).collect();
        if covers.is_empty() { vec![0] } else { covers }
    }

    pub fn add_credit(&mut self, person: impl Into<String>, role: impl Into<String>, primary: bool) {
        let mut credit = Credit::new(person, role);
        credit.primary = primary;
        self.credits.push(credit);
    }

    /// Credits whose role matches any of `roles`, case-insensitively.
    pub fn credits_for<'a>(&'a self, roles: &'a [&str]) -> impl Iterator<Item = &'a Credit> + 'a {
        self.credits.iter().filter(move |c| roles.iter().any(|role| c.has_role(role)))
    }

    /// Copy every populated field of `other` over this one.
    ///
    /// Credits, tags and pages are replaced wholesale, and only when `other`
    /// has any.
    pub fn overlay(&mut self, other: &GenericMetadata) {
        macro_rules! take {
            ($($field:ident),+ $(,)?) => {
                $(if other.$field.is_some() {
                    self.$field = other.$field.clone();
                })+
            };
        }
        take!(
            series,
            title,
            issue,
            issue_count,
            volume,
            volume_count,
            year,
            month,
            publisher,
            imprint,
            genre,
            language,
            country,
            critical_rating,
            comments,
            notes,
            web,
            format,
            story_arc,
            characters,
            teams,
            locations,
            scan_info,
            age_rating,
            cover_image,
            page_count,
        );
        if !other.credits.is_empty() {
            self.credits = other.credits.clone();
        }
        if !other.tags.is_empty() {
            self.tags = other.tags.clone();
        }
        if !other.pages.is_empty() {
            self.pages = other.pages.clone();
        }
    }
}
