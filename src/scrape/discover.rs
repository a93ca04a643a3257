//! Chapter link discovery and speculative URL synthesis.
//!
//! Discovery scans every anchor on a page, classifies chapter links by
//! keyword and path patterns, normalizes and deduplicates them, and
//! orders them by parsed chapter number. When a page yields no links at
//! all, the synthesizer generates candidate URLs from common naming
//! patterns instead.

use super::{
    ChapterRef, ChapterSlot, chapter_number, normalize_url, resolve_href,
};
use regex::Regex;
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::sync::LazyLock;

/// Anchors with an href attribute.
static ANCHOR_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").unwrap());

/// Chapter keyword pattern, matched against both the href and the link text.
static CHAPTER_KEYWORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)chapter|ch\.|episode").unwrap());

/// Numeric chapter-path pattern on the href.
static CHAPTER_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)/chapter[_-]?\d+").unwrap());

/// Scans a page's outbound links and returns the chapter references,
/// deduplicated by normalized URL and sorted ascending by chapter number.
///
/// The sort is stable, so references whose URL encodes no number keep
/// their discovery order behind all numbered ones.
pub fn discover_chapter_links(doc: &Html, base_url: &str) -> Vec<ChapterRef> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut chapters: Vec<ChapterRef> = Vec::new();

    for anchor in doc.select(&ANCHOR_SELECTOR) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let text = anchor.text().collect::<String>().trim().to_string();

        let is_chapter = CHAPTER_KEYWORD.is_match(href)
            || CHAPTER_KEYWORD.is_match(&text)
            || CHAPTER_PATH.is_match(href);
        if !is_chapter {
            continue;
        }

        let Some(resolved) = resolve_href(base_url, href) else {
            continue;
        };
        let url = normalize_url(&resolved);

        if !url.to_lowercase().contains("chapter") {
            continue;
        }
        if !seen.insert(url.clone()) {
            continue;
        }

        chapters.push(ChapterRef {
            number: chapter_number(&url),
            url,
            title: (!text.is_empty()).then_some(text),
        });
    }

    chapters.sort_by_key(|c| c.number);
    chapters
}

/// Candidate URLs for one chapter number, covering the common naming
/// patterns against both the original and the derived base URL.
pub fn candidate_urls(start_url: &str, base_url: &str, number: u32) -> Vec<String> {
    let start = start_url.trim_end_matches('/');
    let base = base_url.trim_end_matches('/');

    vec![
        format!("{start}/{number}"),
        format!("{start}-{number}"),
        format!("{start}-chapter-{number}"),
        format!("{start}/chapter-{number}"),
        format!("{base}/{number}"),
        format!("{base}/chapter-{number}"),
    ]
}

/// Generates one candidate slot per chapter number in `start..=end`.
///
/// Used only when discovery yields nothing; downstream fetches consume
/// the candidates speculatively and tolerate most of them failing.
pub fn synthesize_slots(
    start_url: &str,
    base_url: &str,
    start: u32,
    end: u32,
) -> Vec<ChapterSlot> {
    (start..=end)
        .map(|number| {
            let mut seen: HashSet<String> = HashSet::new();
            let candidates = candidate_urls(start_url, base_url, number)
                .into_iter()
                .filter(|url| seen.insert(url.clone()))
                .map(|url| ChapterRef {
                    url,
                    number,
                    title: None,
                })
                .collect();

            ChapterSlot { number, candidates }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrape::SENTINEL_CHAPTER;

    fn discover(html: &str, base: &str) -> Vec<ChapterRef> {
        let doc = Html::parse_document(html);
        discover_chapter_links(&doc, base)
    }

    #[test]
    fn test_discovery_orders_by_chapter_number() {
        let html = r#"
            <html><body>
                <a href="/chapter-3">Chapter 3</a>
                <a href="/chapter-1">Chapter 1</a>
                <a href="/chapter-2">Chapter 2</a>
                <a href="/about">About</a>
                <a href="/contact">Contact</a>
            </body></html>
        "#;
        let chapters = discover(html, "https://site.com");
        let urls: Vec<&str> = chapters.iter().map(|c| c.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://site.com/chapter-1",
                "https://site.com/chapter-2",
                "https://site.com/chapter-3",
            ]
        );
    }

    #[test]
    fn test_discovery_deduplicates_normalized_urls() {
        let html = r#"
            <html><body>
                <a href="/chapter-2?ref=toc">Chapter 2</a>
                <a href="/chapter-2#comments">Chapter 2 again</a>
                <a href="https://site.com/chapter-2">Chapter 2 absolute</a>
            </body></html>
        "#;
        let chapters = discover(html, "https://site.com");
        assert_eq!(chapters.len(), 1);
        assert_eq!(chapters[0].url, "https://site.com/chapter-2");
        assert_eq!(chapters[0].number, 2);
    }

    #[test]
    fn test_discovery_sentinel_sorts_last_in_discovery_order() {
        let html = r#"
            <html><body>
                <a href="/chapter-extra-b">Extra B</a>
                <a href="/chapter-5">Chapter 5</a>
                <a href="/chapter-extra-a">Extra A</a>
            </body></html>
        "#;
        let chapters = discover(html, "https://site.com");
        assert_eq!(chapters[0].number, 5);
        assert_eq!(chapters[1].number, SENTINEL_CHAPTER);
        assert_eq!(chapters[1].url, "https://site.com/chapter-extra-b");
        assert_eq!(chapters[2].url, "https://site.com/chapter-extra-a");
    }

    #[test]
    fn test_discovery_requires_chapter_in_resolved_url() {
        // "Episode" keyword classifies the link, but the resolved URL
        // never contains "chapter", so it is rejected.
        let html = r#"<a href="/ep/12">Episode 12</a>"#;
        assert!(discover(html, "https://site.com").is_empty());
    }

    #[test]
    fn test_discovery_discards_fragment_only_links() {
        let html = r##"<a href="#chapter-list">Chapters</a>"##;
        assert!(discover(html, "https://site.com").is_empty());
    }

    #[test]
    fn test_discovery_joins_bare_relative_hrefs() {
        let html = r#"<a href="chapter-4">Chapter 4</a>"#;
        let chapters = discover(html, "https://site.com/b/novel");
        assert_eq!(chapters[0].url, "https://site.com/b/novel/chapter-4");
    }

    #[test]
    fn test_candidate_urls_patterns() {
        let urls = candidate_urls("https://site.com/novel", "https://site.com", 7);
        assert_eq!(
            urls,
            vec![
                "https://site.com/novel/7",
                "https://site.com/novel-7",
                "https://site.com/novel-chapter-7",
                "https://site.com/novel/chapter-7",
                "https://site.com/7",
                "https://site.com/chapter-7",
            ]
        );
    }

    #[test]
    fn test_synthesize_slots_range_and_dedup() {
        // start_url == base_url makes several patterns collide; each slot
        // should carry only distinct candidates.
        let slots = synthesize_slots("https://site.com", "https://site.com", 1, 3);
        assert_eq!(slots.len(), 3);
        assert_eq!(slots[0].number, 1);
        assert_eq!(slots[2].number, 3);
        for slot in &slots {
            let mut unique: HashSet<&str> =
                HashSet::with_capacity(slot.candidates.len());
            for c in &slot.candidates {
                assert!(unique.insert(c.url.as_str()));
                assert_eq!(c.number, slot.number);
            }
            assert_eq!(slot.candidates.len(), 4);
        }
    }
}
