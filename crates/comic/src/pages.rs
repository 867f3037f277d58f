//! Page discovery and ordering.
//!
//! Pages are the image entries of a container, in natural, case-insensitive
//! order, so `page2.jpg` comes before `page10.jpg` and `Page3.jpg` sorts next
//! to `page3.jpg`.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::iter::Peekable;
use std::str::Chars;

/// Extensions (lowercase, without the dot) that count as pages.
pub const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "gif", "webp"];

/// Containers with fewer pages than this never get a scanner-page guess.
const SCANNER_MIN_PAGES: usize = 5;
/// Mode filename length at or below which names are assumed to be bare digits.
const BARE_DIGITS_MAX_LEN: usize = 7;

fn basename(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

/// Whether an entry name is a page image. Hidden files never are.
pub fn is_image(name: &str) -> bool {
    let base = basename(name);
    if base.starts_with('.') {
        return false;
    }
    match base.rsplit_once('.') {
        Some((_, ext)) => IMAGE_EXTENSIONS.iter().any(|e| ext.eq_ignore_ascii_case(e)),
        None => false,
    }
}

/// Filter a container listing down to its pages, in reading order.
pub fn page_names(entries: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut pages: Vec<String> = entries.into_iter().filter(|name| is_image(name)).collect();
    pages.sort_by(|a, b| natural_cmp(a, b));
    pages
}

enum Chunk {
    Digits(String),
    Text(String),
}

fn next_chunk(chars: &mut Peekable<Chars<'_>>) -> Option<Chunk> {
    let digits = chars.peek()?.is_ascii_digit();
    let mut chunk = String::new();
    while let Some(c) = chars.next_if(|c| c.is_ascii_digit() == digits) {
        chunk.extend(c.to_lowercase());
    }
    Some(if digits { Chunk::Digits(chunk) } else { Chunk::Text(chunk) })
}

/// Compare digit runs by value without parsing, so arbitrarily long runs work.
fn cmp_digits(a: &str, b: &str) -> Ordering {
    let a_trimmed = a.trim_start_matches('0');
    let b_trimmed = b.trim_start_matches('0');
    a_trimmed
        .len()
        .cmp(&b_trimmed.len())
        .then_with(|| a_trimmed.cmp(b_trimmed))
        // Fewer leading zeros first.
        .then_with(|| a.len().cmp(&b.len()))
}

/// Natural, case-insensitive ordering of entry names.
///
/// Names that compare equal ignoring case fall back to a plain comparison so
/// the ordering is total.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut left = a.chars().peekable();
    let mut right = b.chars().peekable();
    loop {
        let ordering = match (next_chunk(&mut left), next_chunk(&mut right)) {
            (None, None) => return a.cmp(b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(Chunk::Digits(x)), Some(Chunk::Digits(y))) => cmp_digits(&x, &y),
            (Some(Chunk::Digits(_)), Some(Chunk::Text(_))) => Ordering::Less,
            (Some(Chunk::Text(_)), Some(Chunk::Digits(_))) => Ordering::Greater,
            (Some(Chunk::Text(x)), Some(Chunk::Text(y))) => x.cmp(&y),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
}

/// Guess whether the last page was added by whoever scanned the comic.
///
/// Filenames are bucketed by length and the most common length wins (ties go
/// to the longer length). The last page is flagged when the common-length
/// names share no prefix and look like bare digits while the last name is
/// longer, or when the last name doesn't start with the prefix they share.
pub fn scanner_page_index(pages: &[String]) -> Option<usize> {
    if pages.len() < SCANNER_MIN_PAGES {
        return None;
    }
    let names: Vec<&str> = pages.iter().map(|p| basename(p)).collect();

    let mut buckets: BTreeMap<usize, usize> = BTreeMap::new();
    for name in &names {
        *buckets.entry(name.chars().count()).or_default() += 1;
    }
    let (mode_length, _) = buckets.into_iter().max_by_key(|&(length, count)| (count, length))?;

    let common: Vec<&str> = names.iter().copied().filter(|n| n.chars().count() == mode_length).collect();
    let prefix = common_prefix(&common);
    let last_index = pages.len() - 1;
    let last = names[last_index];

    if mode_length <= BARE_DIGITS_MAX_LEN && prefix.is_empty() {
        (last.chars().count() > mode_length).then_some(last_index)
    } else {
        (!last.starts_with(prefix)).then_some(last_index)
    }
}

fn common_prefix<'a>(names: &[&'a str]) -> &'a str {
    let Some((first, rest)) = names.split_first() else {
        return "";
    };
    let mut end = first.len();
    for name in rest {
        end = first
            .char_indices()
            .zip(name.chars())
            .take_while(|((i, a), b)| *i < end && a == b)
            .map(|((i, a), _)| i + a.len_utf8())
            .last()
            .unwrap_or(0);
    }
    &first[..end]
}
