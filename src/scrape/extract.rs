//! Chapter title and body extraction from arbitrary markup.
//!
//! Sites carrying serialized fiction rarely share a template, so both
//! the title and the body are located through ordered fallback chains:
//! specific selectors first, then structural heuristics, then coarse
//! last resorts. Boilerplate filtering and text cleanup run on whatever
//! the chain produced. An empty body is a signalled soft failure, not an
//! error.

use super::{title, title_case_slug};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;

/// Headings longer than this cannot be a chapter title.
const MAX_TITLE_CHARS: usize = 200;

/// Paragraph fragments at or below this length are discarded as noise.
const MIN_FRAGMENT_CHARS: usize = 20;

/// Specific chapter-title selectors, in precedence order.
static TITLE_SELECTORS: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    [
        "h1.chapter-title",
        "h1#chapter-title",
        "h2.chapter-title",
        "div.chapter-title h1",
        "div.chapter-title h2",
        "h1.chr-title",
        "h1#chr-title",
        "h2.chapter-heading",
        "div.chapter-heading",
        "div.chr-title h1",
        "div.chr-title h2",
        "div.chapter-header h1",
        "div.chapter-header h2",
    ]
    .iter()
    .map(|s| Selector::parse(s).unwrap())
    .collect()
});

/// Recognized content containers searched for nested headings.
static CONTENT_AREA_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(
        "div.chapter-content, div#chapter-content, div.chapter-body, div#chapter-body, \
         div#chr-content, div.chr-c, article, div.read-content",
    )
    .unwrap()
});

/// Specific content-container selectors, in precedence order.
static CONTENT_SELECTORS: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    [
        "div.chapter-content",
        "div#chapter-content",
        "div.chapter-body",
        "div#chapter-body",
        "div.content",
        "div#content",
        "div.text-content",
        "article",
        "div.read-content",
        "div.chapter-text",
        "div#chr-content",
        "div.chr-c",
        "div#chaptercontent",
    ]
    .iter()
    .map(|s| Selector::parse(s).unwrap())
    .collect()
});

/// Site-specific containers preferred over whatever the generic chain
/// picked, when present.
static SITE_OVERRIDE_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("div#chr-content, div.chr-c, div#chaptercontent, div.chapter-content")
        .unwrap()
});

static HEADINGS_WIDE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h1, h2, h3").unwrap());

static HEADINGS_TOP: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h1, h2").unwrap());

static DIV_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("div").unwrap());

static BODY_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("body").unwrap());

static PARAGRAPH_LEVEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("p, div").unwrap());

/// Boilerplate phrases that disqualify a heading as a chapter title.
static TITLE_BOILERPLATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)novelbin|read online|table of contents|home|novel$|^novel\s").unwrap()
});

/// Wider variant used when scanning arbitrary headings.
static TITLE_BOILERPLATE_WIDE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)novelbin|read online|table of contents|home|menu|navigation|^novel\s")
        .unwrap()
});

/// Leading `Chapter <n>:` prefix stripped from accepted titles.
static CHAPTER_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^chapter\s+\d+[:\s]+").unwrap());

/// A heading that looks chapter-like.
static CHAPTER_LIKE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)chapter|episode|part").unwrap());

/// A heading carrying an explicit chapter or episode number.
static CHAPTER_NUMBERED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)chapter\s+\d+|episode\s+\d+").unwrap());

/// Container class hints for heading residency checks.
static CONTAINER_CLASS_HINT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)content|chapter|read").unwrap());

/// Container class hints for the body fallback scan.
static BODY_CLASS_HINT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)content|chapter|text").unwrap());

/// Site-furniture phrases filtered out of paragraph fragments.
static FRAGMENT_BOILERPLATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)previous|next|chapter|table of contents|advertisement").unwrap()
});

/// `chapter-<n>-<slug>` URL tail used as a last-resort title source.
static URL_TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)chapter[_-]\d+[_-](.+)").unwrap());

static DIGITS_ONLY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+$").unwrap());

// Text cleanup patterns.
static CHAPTER_HEADING_NOISE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)chapter \d+").unwrap());
static NAV_NOISE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)next chapter|previous chapter|table of contents|advertisement").unwrap()
});
static JS_NOTICE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)please enable javascript").unwrap());
static URL_TOKEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"http\S+").unwrap());
static EMAIL_TOKEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\S+@\S+").unwrap());
static HORIZONTAL_SPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\S\n]+").unwrap());
static NEWLINE_PADDING: LazyLock<Regex> = LazyLock::new(|| Regex::new(r" *\n *").unwrap());
static EXTRA_NEWLINES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());

/// The small fixed set of HTML entities unescaped during cleanup.
const HTML_ENTITIES: [(&str, &str); 3] = [("&nbsp;", " "), ("&quot;", "\""), ("&amp;", "&")];

/// Extracts a chapter's body and title from a page.
///
/// Returns an empty body (and whatever title was found) when no usable
/// content exists.
pub fn extract_chapter(doc: &Html, url: &str) -> (String, Option<String>) {
    let novel_title = title::resolve_novel_title(doc, url);
    let chapter_title =
        extract_chapter_title(doc, novel_title.as_deref()).or_else(|| title_from_url(url));
    let body = extract_body(doc);
    (body, chapter_title)
}

fn element_text(element: ElementRef) -> String {
    element.text().collect::<String>().trim().to_string()
}

fn strip_chapter_prefix(text: &str) -> String {
    CHAPTER_PREFIX.replace(text, "").trim().to_string()
}

fn equals_novel_title(text: &str, novel_title: Option<&str>) -> bool {
    novel_title.is_some_and(|novel| text.to_lowercase() == novel.to_lowercase())
}

/// Step one: the fixed list of specific title selectors.
fn title_from_specific_selectors(doc: &Html, novel_title: Option<&str>) -> Option<String> {
    for selector in TITLE_SELECTORS.iter() {
        let Some(element) = doc.select(selector).next() else {
            continue;
        };
        let text = element_text(element);
        if text.is_empty() || text.chars().count() >= MAX_TITLE_CHARS {
            continue;
        }
        if equals_novel_title(&text, novel_title) {
            continue;
        }
        if TITLE_BOILERPLATE.is_match(&text) {
            continue;
        }
        let stripped = strip_chapter_prefix(&text);
        if stripped.chars().count() > 2 {
            return Some(stripped);
        }
    }
    None
}

/// Step two: headings nested inside a recognized content container.
fn title_from_content_headings(doc: &Html, novel_title: Option<&str>) -> Option<String> {
    let area = doc.select(&CONTENT_AREA_SELECTOR).next()?;
    for heading in area.select(&HEADINGS_WIDE).take(3) {
        let text = element_text(heading);
        let len = text.chars().count();
        if len <= 2 || len >= MAX_TITLE_CHARS {
            continue;
        }
        if equals_novel_title(&text, novel_title) {
            continue;
        }
        if CHAPTER_LIKE.is_match(&text) || len < 100 {
            let stripped = strip_chapter_prefix(&text);
            if !stripped.is_empty() {
                return Some(stripped);
            }
        }
    }
    None
}

/// True if the element sits inside a div/article whose class hints at
/// content.
fn inside_content_container(element: ElementRef) -> bool {
    element.ancestors().any(|node| {
        node.value().as_element().is_some_and(|el| {
            matches!(el.name(), "div" | "article")
                && el.attr("class").is_some_and(|c| CONTAINER_CLASS_HINT.is_match(c))
        })
    })
}

/// Step three: any heading on the page, with stricter requirements.
fn title_from_any_heading(doc: &Html, novel_title: Option<&str>) -> Option<String> {
    for heading in doc.select(&HEADINGS_TOP).take(5) {
        let text = element_text(heading);
        let len = text.chars().count();
        if len <= 2 || len >= MAX_TITLE_CHARS {
            continue;
        }
        if equals_novel_title(&text, novel_title) {
            continue;
        }
        if TITLE_BOILERPLATE_WIDE.is_match(&text) {
            continue;
        }
        if CHAPTER_NUMBERED.is_match(&text) || inside_content_container(heading) {
            let stripped = strip_chapter_prefix(&text);
            if !stripped.is_empty() {
                return Some(stripped);
            }
        }
    }
    None
}

/// Resolves the chapter title through the heading-based fallback chain.
pub fn extract_chapter_title(doc: &Html, novel_title: Option<&str>) -> Option<String> {
    title_from_specific_selectors(doc, novel_title)
        .or_else(|| title_from_content_headings(doc, novel_title))
        .or_else(|| title_from_any_heading(doc, novel_title))
}

/// Last resort: a title parsed from a `chapter-<n>-<slug>` URL tail.
pub fn title_from_url(url: &str) -> Option<String> {
    let captures = URL_TITLE.captures(url)?;
    let slug = captures.get(1)?.as_str();
    let candidate = title_case_slug(slug);
    (candidate.chars().count() > 3 && !DIGITS_ONLY.is_match(&candidate)).then_some(candidate)
}

/// Locates the content container and collects its usable text.
fn extract_body(doc: &Html) -> String {
    let container = CONTENT_SELECTORS
        .iter()
        .find_map(|selector| doc.select(selector).next())
        .or_else(|| {
            doc.select(&DIV_SELECTOR).find(|div| {
                div.value()
                    .attr("class")
                    .is_some_and(|c| BODY_CLASS_HINT.is_match(c))
            })
        })
        .or_else(|| doc.select(&BODY_SELECTOR).next());

    let Some(mut container) = container else {
        return String::new();
    };

    if let Some(site_container) = doc.select(&SITE_OVERRIDE_SELECTOR).next() {
        container = site_container;
    }

    let mut fragments: Vec<String> = container
        .select(&PARAGRAPH_LEVEL)
        .filter_map(|element| {
            let text = element_text(element);
            (text.chars().count() > MIN_FRAGMENT_CHARS && !FRAGMENT_BOILERPLATE.is_match(&text))
                .then_some(text)
        })
        .collect();

    // No paragraph-level elements qualified; fall back to splitting the
    // container's full text on line breaks.
    if fragments.is_empty() {
        let full_text = container.text().collect::<Vec<_>>().join("\n");
        if full_text.trim().chars().count() > 50 {
            fragments = full_text
                .lines()
                .map(str::trim)
                .filter(|line| line.chars().count() > MIN_FRAGMENT_CHARS)
                .map(String::from)
                .collect();
        }
    }

    clean_text(&fragments.join("\n\n"))
}

/// Text-cleanup pipeline run over extracted chapter text.
///
/// Unescapes a small fixed set of HTML entities, strips embedded
/// chapter/navigation/ads boilerplate, URLs and email-like tokens,
/// collapses horizontal whitespace runs, and normalizes blank lines.
/// Idempotent: running it on its own output yields no further change.
pub fn clean_text(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let mut out = text.to_string();
    for (entity, replacement) in HTML_ENTITIES {
        out = out.replace(entity, replacement);
    }
    out = CHAPTER_HEADING_NOISE.replace_all(&out, "").into_owned();
    out = NAV_NOISE.replace_all(&out, "").into_owned();
    out = JS_NOTICE.replace_all(&out, "").into_owned();
    out = URL_TOKEN.replace_all(&out, "").into_owned();
    out = EMAIL_TOKEN.replace_all(&out, "").into_owned();
    out = HORIZONTAL_SPACE.replace_all(&out, " ").into_owned();
    out = NEWLINE_PADDING.replace_all(&out, "\n").into_owned();
    out = EXTRA_NEWLINES.replace_all(&out, "\n\n").into_owned();
    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(html: &str, url: &str) -> (String, Option<String>) {
        let doc = Html::parse_document(html);
        extract_chapter(&doc, url)
    }

    const LONG_PARA: &str =
        "The road wound down into the valley, and the lanterns of the town glittered far below.";

    #[test]
    fn test_title_from_specific_selector_with_prefix_stripped() {
        let html = format!(
            r#"<html><head><meta property="og:title" content="My Novel"></head><body>
                <h1 class="chapter-title">Chapter 12: The Long Road</h1>
                <div class="chapter-content"><p>{}</p></div>
            </body></html>"#,
            LONG_PARA
        );
        let (_, chapter_title) = extract(&html, "https://site.com/chapter-12");
        assert_eq!(chapter_title.as_deref(), Some("The Long Road"));
    }

    #[test]
    fn test_title_rejects_novel_title_match() {
        let html = format!(
            r#"<html><head><meta property="og:title" content="My Novel"></head><body>
                <h1 class="chapter-title">My Novel</h1>
                <div class="chapter-content">
                    <h2>Chapter 3: Homecoming Road</h2>
                    <p>{}</p>
                </div>
            </body></html>"#,
            LONG_PARA
        );
        let (_, chapter_title) = extract(&html, "https://site.com/chapter-3");
        assert_eq!(chapter_title.as_deref(), Some("Homecoming Road"));
    }

    #[test]
    fn test_title_rejects_boilerplate_headings() {
        let html = format!(
            r#"<html><head><meta property="og:title" content="My Novel"></head><body>
                <h1 class="chapter-title">Read Online Free</h1>
                <div class="chapter-content">
                    <h2>Chapter 9: Ashfall</h2>
                    <p>{}</p>
                </div>
            </body></html>"#,
            LONG_PARA
        );
        let (_, chapter_title) = extract(&html, "https://site.com/chapter-9");
        assert_eq!(chapter_title.as_deref(), Some("Ashfall"));
    }

    #[test]
    fn test_title_from_numbered_heading_anywhere() {
        let html = format!(
            r#"<html><body>
                <h2>Chapter 21: Night Market</h2>
                <div class="chapter-content"><p>{}</p></div>
            </body></html>"#,
            LONG_PARA
        );
        let (_, chapter_title) = extract(&html, "https://site.com/chapter-21");
        assert_eq!(chapter_title.as_deref(), Some("Night Market"));
    }

    #[test]
    fn test_title_from_url_slug() {
        let html = format!(
            r#"<html><body><div class="chapter-content"><p>{}</p></div></body></html>"#,
            LONG_PARA
        );
        let (_, chapter_title) = extract(&html, "https://site.com/chapter-4-the-hidden-door");
        assert_eq!(chapter_title.as_deref(), Some("The Hidden Door"));
    }

    #[test]
    fn test_title_from_url_rejects_bare_numbers() {
        assert_eq!(title_from_url("https://site.com/chapter-4-2"), None);
        assert_eq!(
            title_from_url("https://site.com/chapter-4-epilogue"),
            Some("Epilogue".to_string())
        );
    }

    #[test]
    fn test_body_filters_short_and_boilerplate_fragments() {
        let html = format!(
            r#"<html><body><div id="chr-content">
                <p>{}</p>
                <p>Short.</p>
                <p>Advertisement: buy premium access now for the best reading experience</p>
                <p>{} Second paragraph of the story text, still going strong.</p>
            </div></body></html>"#,
            LONG_PARA, LONG_PARA
        );
        let (body, _) = extract(&html, "https://site.com/chapter-1");
        assert!(body.contains("lanterns of the town"));
        assert!(!body.contains("Short."));
        assert!(!body.contains("Advertisement"));
        assert_eq!(body.matches("\n\n").count(), 1);
    }

    #[test]
    fn test_body_prefers_site_override_container() {
        let html = format!(
            r#"<html><body>
                <article><p>Sidebar recap text that is long enough to qualify as a fragment.</p></article>
                <div id="chr-content"><p>{}</p></div>
            </body></html>"#,
            LONG_PARA
        );
        let (body, _) = extract(&html, "https://site.com/chapter-1");
        assert!(body.contains("lanterns"));
        assert!(!body.contains("Sidebar recap"));
    }

    #[test]
    fn test_body_line_split_fallback() {
        // Text sits directly in the container with <br> separation, so no
        // paragraph-level element qualifies.
        let html = r#"<html><body><div class="chapter-content">
The first long line of narration carries the scene onward through the dark.<br>
The second long line of narration answers it from across the river.
        </div></body></html>"#;
        let (body, _) = extract(html, "https://site.com/chapter-1");
        assert!(body.contains("first long line"));
        assert!(body.contains("second long line"));
    }

    #[test]
    fn test_empty_page_is_soft_failure() {
        let (body, chapter_title) = extract("<html><body></body></html>", "https://site.com/x");
        assert!(body.is_empty());
        assert!(chapter_title.is_none());
    }

    #[test]
    fn test_clean_text_strips_noise() {
        let cleaned = clean_text(
            "Chapter 7 The rain fell.   Visit http://ads.example.com now\n\n\n\nContact us at spam@example.com today &amp; enjoy &quot;premium&quot; reading&nbsp;here",
        );
        assert!(!cleaned.contains("Chapter 7"));
        assert!(!cleaned.contains("http"));
        assert!(!cleaned.contains("@"));
        assert!(cleaned.contains("The rain fell."));
        assert!(cleaned.contains("& enjoy \"premium\" reading here"));
        assert!(!cleaned.contains("\n\n\n"));
    }

    #[test]
    fn test_clean_text_is_idempotent() {
        let samples = [
            "Chapter 3 Once upon a time.\n\nNext Chapter\n\n\nThe end came slowly.",
            "A   spaced    line\nwith http://x.example trailing words",
            "Already clean text.\n\nWith two paragraphs.",
        ];
        for sample in samples {
            let once = clean_text(sample);
            let twice = clean_text(&once);
            assert_eq!(once, twice, "cleanup not idempotent for {:?}", sample);
        }
    }

    #[test]
    fn test_clean_text_preserves_paragraph_separation() {
        let cleaned = clean_text("First paragraph here.\n\nSecond paragraph here.");
        assert_eq!(cleaned, "First paragraph here.\n\nSecond paragraph here.");
    }
}
