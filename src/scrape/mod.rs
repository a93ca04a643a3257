//! Chapter discovery and extraction for template-inconsistent fiction sites.
//!
//! This module defines the shared chapter data types, the URL helpers used
//! by discovery, and the `ChapterSource` seam the batch job consumes. The
//! heuristic engines live in the submodules: link discovery and URL
//! synthesis in `discover`, novel title resolution in `title`, chapter
//! content extraction in `extract`.

pub mod discover;
pub mod extract;
pub mod title;

use crate::error::FetchError;
use crate::fetch::PageFetcher;
use async_trait::async_trait;
use regex::Regex;
use scraper::Html;
use serde::Serialize;
use std::sync::LazyLock;

/// Chapter number assigned when no number can be parsed from a URL.
/// Sorts after every real chapter number.
pub const SENTINEL_CHAPTER: u32 = u32::MAX;

/// Numeric chapter-path pattern, e.g. `/chapter-12`, `/chapter_12`, `/chapter12`.
static CHAPTER_NUMBER_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)chapter[_-]?(\d+)").unwrap());

/// An identified, ordered pointer to a chapter's source location.
///
/// Identity is the normalized URL (fragment and query stripped). Created
/// during discovery and immutable thereafter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChapterRef {
    /// Normalized chapter URL.
    pub url: String,

    /// Chapter number parsed from the URL, or [`SENTINEL_CHAPTER`].
    pub number: u32,

    /// Link text captured at discovery time, if any.
    pub title: Option<String>,
}

impl ChapterRef {
    /// Creates a reference for a URL, parsing the chapter number from it.
    pub fn from_url(url: String) -> Self {
        let number = chapter_number(&url);
        Self {
            url,
            number,
            title: None,
        }
    }

    /// Human-readable chapter label, e.g. `Chapter 12`.
    pub fn label(&self) -> String {
        chapter_label(self.number)
    }
}

/// Extracted chapter text, ready for synthesis.
#[derive(Debug, Clone, Serialize)]
pub struct ChapterContent {
    /// Chapter number carried over from the reference.
    pub number: u32,

    /// Chapter title; falls back to `Chapter <n>` when extraction finds none.
    pub title: String,

    /// Plain text body, paragraphs separated by a blank line. Empty when
    /// extraction found nothing usable (a soft failure, not an error).
    pub body: String,

    /// URL the content was extracted from.
    pub url: String,
}

impl ChapterContent {
    /// Returns true if extraction found no usable body.
    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }
}

/// One chapter's worth of work: a number and the candidate URLs to try in
/// order until one yields content.
///
/// Discovery produces single-candidate slots; the URL synthesizer produces
/// several speculative candidates per number, most of which are expected
/// to fail.
#[derive(Debug, Clone)]
pub struct ChapterSlot {
    /// Chapter number this slot stands for.
    pub number: u32,

    /// Candidate URLs in preference order. Never empty.
    pub candidates: Vec<ChapterRef>,
}

impl ChapterSlot {
    /// Wraps a discovered reference as a single-candidate slot.
    pub fn single(chapter: ChapterRef) -> Self {
        Self {
            number: chapter.number,
            candidates: vec![chapter],
        }
    }
}

/// Parameters that select which chapters of a work to process.
#[derive(Debug, Clone)]
pub struct ChapterQuery {
    /// Page to discover chapter links from (usually the table of contents).
    pub start_url: String,

    /// Base URL for resolving relative links. Derived from `start_url`
    /// when not set.
    pub base_url: Option<String>,

    /// First chapter to include (1-based).
    pub start_chapter: u32,

    /// Last chapter to include, inclusive.
    pub end_chapter: Option<u32>,

    /// Alternative to `end_chapter`: number of chapters from the start.
    pub num_chapters: Option<u32>,
}

impl ChapterQuery {
    /// Creates a query covering everything reachable from `start_url`.
    pub fn new(start_url: impl Into<String>) -> Self {
        Self {
            start_url: start_url.into(),
            base_url: None,
            start_chapter: 1,
            end_chapter: None,
            num_chapters: None,
        }
    }

    /// Effective base URL: explicit, or derived from the start URL.
    pub fn effective_base_url(&self) -> String {
        self.base_url
            .clone()
            .unwrap_or_else(|| derive_base_url(&self.start_url))
    }

    /// Last chapter number for synthesized URL generation.
    pub fn synthesis_end_chapter(&self) -> u32 {
        self.end_chapter.unwrap_or_else(|| {
            let count = self.num_chapters.unwrap_or(1).max(1);
            self.start_chapter.saturating_add(count - 1)
        })
    }
}

/// Parses a chapter number from a URL via the numeric chapter-path
/// pattern. Returns [`SENTINEL_CHAPTER`] if absent.
pub fn chapter_number(url: &str) -> u32 {
    CHAPTER_NUMBER_PATTERN
        .captures(url)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(SENTINEL_CHAPTER)
}

/// Human-readable chapter label for a (possibly sentinel) number.
pub fn chapter_label(number: u32) -> String {
    if number == SENTINEL_CHAPTER {
        "Chapter ?".to_string()
    } else {
        format!("Chapter {}", number)
    }
}

/// Derives a base URL from a start URL by dropping the final path
/// segment.
pub fn derive_base_url(start_url: &str) -> String {
    match start_url.rfind('/') {
        Some(idx) => start_url[..idx].to_string(),
        None => start_url.to_string(),
    }
}

/// Resolves an anchor href against a base URL.
///
/// Root-relative hrefs are concatenated onto the base, bare relative
/// hrefs are joined with a slash, absolute hrefs pass through, and
/// fragment-only hrefs are discarded.
pub fn resolve_href(base_url: &str, href: &str) -> Option<String> {
    if href.starts_with('#') {
        return None;
    }
    if href.starts_with("http://") || href.starts_with("https://") {
        return Some(href.to_string());
    }
    if href.starts_with('/') {
        return Some(format!("{}{}", base_url, href));
    }
    Some(format!("{}/{}", base_url, href.trim_start_matches('/')))
}

/// Strips the fragment and query from a resolved URL.
pub fn normalize_url(url: &str) -> String {
    let without_fragment = url.split('#').next().unwrap_or(url);
    let without_query = without_fragment.split('?').next().unwrap_or(without_fragment);
    without_query.to_string()
}

/// Title-cases a URL slug: separators become spaces, each word is
/// capitalized.
pub fn title_case_slug(slug: &str) -> String {
    slug.split(['-', '_'])
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Keeps the references matching the query's chapter range.
///
/// Sentinel-numbered references are dropped here: a range filter cannot
/// be applied to a chapter whose number is unknown.
pub fn filter_range(chapters: Vec<ChapterRef>, query: &ChapterQuery) -> Vec<ChapterRef> {
    let mut kept: Vec<ChapterRef> = chapters
        .into_iter()
        .filter(|c| c.number != SENTINEL_CHAPTER && c.number >= query.start_chapter)
        .collect();

    if let Some(end) = query.end_chapter {
        kept.retain(|c| c.number <= end);
    } else if let Some(count) = query.num_chapters {
        kept.truncate(count as usize);
    }

    kept
}

/// Source of chapter references and content for the batch job.
///
/// The production implementation scrapes live sites; tests substitute
/// their own.
#[async_trait]
pub trait ChapterSource: Send + Sync {
    /// Resolves the ordered chapter plan for a query: discovered links
    /// when the start page yields any, synthesized candidates otherwise.
    async fn resolve(&self, query: &ChapterQuery) -> Result<Vec<ChapterSlot>, FetchError>;

    /// Fetches and extracts one chapter. An empty body signals that the
    /// page was reachable but no usable content was found.
    async fn fetch_chapter(&self, chapter: &ChapterRef) -> Result<ChapterContent, FetchError>;
}

/// Live-site chapter source backed by a [`PageFetcher`].
pub struct SiteSource {
    fetcher: PageFetcher,
}

impl SiteSource {
    /// Creates a source around the given fetcher.
    pub fn new(fetcher: PageFetcher) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl ChapterSource for SiteSource {
    async fn resolve(&self, query: &ChapterQuery) -> Result<Vec<ChapterSlot>, FetchError> {
        let base_url = query.effective_base_url();

        // A failed start-page fetch is not fatal: synthesized candidate
        // URLs may still reach the chapters directly.
        let discovered = match self.fetcher.fetch(&query.start_url).await {
            Ok(html) => {
                let doc = Html::parse_document(&html);
                discover::discover_chapter_links(&doc, &base_url)
            }
            Err(_) => Vec::new(),
        };

        let in_range = filter_range(discovered, query);
        if !in_range.is_empty() {
            return Ok(in_range.into_iter().map(ChapterSlot::single).collect());
        }

        Ok(discover::synthesize_slots(
            &query.start_url,
            &base_url,
            query.start_chapter,
            query.synthesis_end_chapter(),
        ))
    }

    async fn fetch_chapter(&self, chapter: &ChapterRef) -> Result<ChapterContent, FetchError> {
        let html = self.fetcher.fetch(&chapter.url).await?;
        let doc = Html::parse_document(&html);
        let (body, extracted_title) = extract::extract_chapter(&doc, &chapter.url);

        Ok(ChapterContent {
            number: chapter.number,
            title: extracted_title.unwrap_or_else(|| chapter.label()),
            body,
            url: chapter.url.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chapter_number_variants() {
        assert_eq!(chapter_number("https://site.com/novel/chapter-7"), 7);
        assert_eq!(chapter_number("https://site.com/novel/chapter_42"), 42);
        assert_eq!(chapter_number("https://site.com/novel/chapter199"), 199);
        assert_eq!(chapter_number("https://site.com/novel/Chapter-3"), 3);
    }

    #[test]
    fn test_chapter_number_sentinel() {
        assert_eq!(chapter_number("https://site.com/about"), SENTINEL_CHAPTER);
        assert_eq!(chapter_number("https://site.com/novel/epilogue"), SENTINEL_CHAPTER);
    }

    #[test]
    fn test_derive_base_url() {
        assert_eq!(
            derive_base_url("https://site.com/b/my-novel/chapters"),
            "https://site.com/b/my-novel"
        );
        assert_eq!(derive_base_url("no-slash"), "no-slash");
    }

    #[test]
    fn test_resolve_href() {
        assert_eq!(
            resolve_href("https://site.com", "/chapter-1").unwrap(),
            "https://site.com/chapter-1"
        );
        assert_eq!(
            resolve_href("https://site.com", "chapter-2").unwrap(),
            "https://site.com/chapter-2"
        );
        assert_eq!(
            resolve_href("https://site.com", "https://other.com/chapter-3").unwrap(),
            "https://other.com/chapter-3"
        );
        assert_eq!(resolve_href("https://site.com", "#comments"), None);
    }

    #[test]
    fn test_normalize_url_strips_fragment_and_query() {
        assert_eq!(
            normalize_url("https://site.com/chapter-1?page=2#top"),
            "https://site.com/chapter-1"
        );
        assert_eq!(
            normalize_url("https://site.com/chapter-1"),
            "https://site.com/chapter-1"
        );
    }

    #[test]
    fn test_title_case_slug() {
        assert_eq!(title_case_slug("my-great-novel"), "My Great Novel");
        assert_eq!(title_case_slug("the_long_road"), "The Long Road");
        assert_eq!(title_case_slug("solo"), "Solo");
    }

    #[test]
    fn test_filter_range_drops_sentinels_and_applies_bounds() {
        let refs = vec![
            ChapterRef::from_url("https://s.com/chapter-1".into()),
            ChapterRef::from_url("https://s.com/chapter-5".into()),
            ChapterRef::from_url("https://s.com/epilogue".into()),
            ChapterRef::from_url("https://s.com/chapter-9".into()),
        ];
        let mut query = ChapterQuery::new("https://s.com/toc");
        query.start_chapter = 2;
        query.end_chapter = Some(8);

        let kept = filter_range(refs, &query);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].number, 5);
    }

    #[test]
    fn test_filter_range_num_chapters_truncates() {
        let refs: Vec<ChapterRef> = (1..=6)
            .map(|n| ChapterRef::from_url(format!("https://s.com/chapter-{}", n)))
            .collect();
        let mut query = ChapterQuery::new("https://s.com/toc");
        query.num_chapters = Some(3);

        let kept = filter_range(refs, &query);
        assert_eq!(kept.iter().map(|c| c.number).collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[test]
    fn test_synthesis_end_chapter() {
        let mut query = ChapterQuery::new("https://s.com/novel");
        assert_eq!(query.synthesis_end_chapter(), 1);

        query.num_chapters = Some(10);
        assert_eq!(query.synthesis_end_chapter(), 10);

        query.start_chapter = 5;
        assert_eq!(query.synthesis_end_chapter(), 14);

        query.end_chapter = Some(7);
        assert_eq!(query.synthesis_end_chapter(), 7);
    }
}
