//! Novel title resolution via an ordered fallback chain.
//!
//! Each heuristic is an independent strategy function; the resolver
//! tries them in order and stops at the first match.

use super::title_case_slug;
use regex::Regex;
use scraper::{Html, Selector};
use std::sync::LazyLock;

/// Headings longer than this cannot be a title.
const MAX_TITLE_CHARS: usize = 200;

static OG_TITLE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"meta[property="og:title"]"#).unwrap());

static H1_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h1").unwrap());

static TITLE_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("title").unwrap());

/// Trailing site-branding suffixes stripped from candidate titles.
static BRANDING_SUFFIXES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)\s*-\s*NovelBin.*$").unwrap(),
        Regex::new(r"(?i)\s*-\s*Read.*$").unwrap(),
    ]
});

/// Path segment following a "book" marker, e.g. `/b/my-novel/`.
static BOOK_PATH_SEGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/b/([^/]+)").unwrap());

/// Strips trailing site-branding suffixes from a title. Idempotent:
/// stripping twice yields the same result as stripping once.
pub fn strip_branding(title: &str) -> String {
    let mut out = title.to_string();
    for pattern in BRANDING_SUFFIXES.iter() {
        out = pattern.replace(&out, "").into_owned();
    }
    out.trim().to_string()
}

type Strategy = fn(&Html, &str) -> Option<String>;

fn from_canonical_metadata(doc: &Html, _url: &str) -> Option<String> {
    let meta = doc.select(&OG_TITLE_SELECTOR).next()?;
    let content = meta.value().attr("content")?;
    let title = strip_branding(content);
    (!title.is_empty()).then_some(title)
}

fn from_primary_heading(doc: &Html, _url: &str) -> Option<String> {
    let heading = doc.select(&H1_SELECTOR).next()?;
    let title = heading.text().collect::<String>().trim().to_string();
    (!title.is_empty() && title.chars().count() < MAX_TITLE_CHARS).then_some(title)
}

fn from_book_path(_doc: &Html, url: &str) -> Option<String> {
    let captures = BOOK_PATH_SEGMENT.captures(url)?;
    let slug = captures.get(1)?.as_str();
    let title = title_case_slug(slug);
    (!title.is_empty()).then_some(title)
}

fn from_title_element(doc: &Html, _url: &str) -> Option<String> {
    let element = doc.select(&TITLE_SELECTOR).next()?;
    let text = element.text().collect::<String>().trim().to_string();
    let title = strip_branding(&text);
    (!title.is_empty()).then_some(title)
}

/// Ordered fallback chain for the work's title. First match wins.
const STRATEGIES: [Strategy; 4] = [
    from_canonical_metadata,
    from_primary_heading,
    from_book_path,
    from_title_element,
];

/// Derives the novel title from a page, or `None` if every heuristic
/// comes up empty.
pub fn resolve_novel_title(doc: &Html, url: &str) -> Option<String> {
    STRATEGIES.iter().find_map(|strategy| strategy(doc, url))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(html: &str, url: &str) -> Option<String> {
        let doc = Html::parse_document(html);
        resolve_novel_title(&doc, url)
    }

    #[test]
    fn test_metadata_title_wins_over_heading() {
        let html = r#"
            <html><head>
                <meta property="og:title" content="Shadow Slave - NovelBin.com">
            </head><body><h1>Something Else</h1></body></html>
        "#;
        assert_eq!(
            resolve(html, "https://site.com/b/shadow-slave"),
            Some("Shadow Slave".to_string())
        );
    }

    #[test]
    fn test_heading_fallback_rejects_overlong_text() {
        let long = "x".repeat(300);
        let html = format!("<html><body><h1>{}</h1></body></html>", long);
        // The heading is too long, so the /b/ path segment wins.
        assert_eq!(
            resolve(&html, "https://site.com/b/my-novel/chapters"),
            Some("My Novel".to_string())
        );
    }

    #[test]
    fn test_title_element_is_last_resort() {
        let html = "<html><head><title>My Novel - Read Online - SiteName</title></head><body></body></html>";
        assert_eq!(
            resolve(html, "https://site.com/novel"),
            Some("My Novel".to_string())
        );
    }

    #[test]
    fn test_no_signal_yields_none() {
        let html = "<html><body><p>nothing here</p></body></html>";
        assert_eq!(resolve(html, "https://site.com/x"), None);
    }

    #[test]
    fn test_strip_branding_is_idempotent() {
        let once = strip_branding("My Novel - Read Online - SiteName");
        let twice = strip_branding(&once);
        assert_eq!(once, "My Novel");
        assert_eq!(once, twice);

        let once = strip_branding("Another Story - NovelBin full chapters");
        assert_eq!(once, "Another Story");
        assert_eq!(strip_branding(&once), once);
    }

    #[test]
    fn test_strip_branding_keeps_unbranded_titles() {
        assert_eq!(strip_branding("Plain Title"), "Plain Title");
    }
}
