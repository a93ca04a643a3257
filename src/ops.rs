//! High-level operations consumed by the CLI or a thin API layer.
//!
//! Each operation mirrors one exposed endpoint of the system: chapter
//! URL resolution, single and batch chapter extraction, and artifact
//! listing/lookup. Failures use the structured [`OpError`] codes rather
//! than ad hoc messages.

use crate::error::OpError;
use crate::fetch::PageFetcher;
use crate::scrape::{
    self, ChapterContent, ChapterQuery, ChapterRef, ChapterSlot, chapter_label, discover,
    extract, title,
};
use scraper::Html;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Result of chapter URL resolution for a start page.
#[derive(Debug, Clone)]
pub struct Discovery {
    /// The work's title, when any heuristic found one.
    pub novel_title: Option<String>,

    /// Ordered, deduplicated chapter references.
    pub chapters: Vec<ChapterRef>,
}

/// Resolves the ordered chapter URL list for a start URL.
pub async fn resolve_chapter_urls(
    fetcher: &PageFetcher,
    start_url: &str,
    base_url: Option<&str>,
) -> Result<Discovery, OpError> {
    url::Url::parse(start_url).map_err(|_| OpError::InvalidUrl(start_url.to_string()))?;

    let html = fetcher.fetch(start_url).await?;
    let base = base_url
        .map(str::to_string)
        .unwrap_or_else(|| scrape::derive_base_url(start_url));

    let doc = Html::parse_document(&html);
    Ok(Discovery {
        novel_title: title::resolve_novel_title(&doc, start_url),
        chapters: discover::discover_chapter_links(&doc, &base),
    })
}

/// Extracts a single chapter by URL. An empty body is reported as
/// [`OpError::ExtractionEmpty`].
pub async fn extract_single(
    fetcher: &PageFetcher,
    url: &str,
) -> Result<ChapterContent, OpError> {
    url::Url::parse(url).map_err(|_| OpError::InvalidUrl(url.to_string()))?;

    let html = fetcher.fetch(url).await?;
    let (body, chapter_title) = {
        let doc = Html::parse_document(&html);
        extract::extract_chapter(&doc, url)
    };

    if body.is_empty() {
        return Err(OpError::ExtractionEmpty {
            url: url.to_string(),
        });
    }

    Ok(ChapterContent {
        number: scrape::chapter_number(url),
        title: chapter_title.unwrap_or_else(|| "Chapter".to_string()),
        body,
        url: url.to_string(),
    })
}

/// Extracts a batch of chapters, either from an explicit URL list
/// (sorted by parsed number and range-filtered) or from candidate URLs
/// generated for the query's range.
///
/// Chapters that yield nothing are included in the result with an empty
/// body and a "(Not Found)" title so callers can see which units failed.
pub async fn extract_batch(
    fetcher: &PageFetcher,
    query: &ChapterQuery,
    explicit_urls: Option<&[String]>,
) -> Result<Vec<ChapterContent>, OpError> {
    let slots: Vec<ChapterSlot> = match explicit_urls {
        Some(urls) => {
            let mut refs: Vec<ChapterRef> = urls
                .iter()
                .map(|u| ChapterRef::from_url(scrape::normalize_url(u)))
                .collect();
            refs.sort_by_key(|r| r.number);
            scrape::filter_range(refs, query)
                .into_iter()
                .map(ChapterSlot::single)
                .collect()
        }
        None => discover::synthesize_slots(
            &query.start_url,
            &query.effective_base_url(),
            query.start_chapter,
            query.synthesis_end_chapter(),
        ),
    };

    let mut results = Vec::with_capacity(slots.len());
    for slot in &slots {
        results.push(extract_slot(fetcher, slot).await);
    }
    Ok(results)
}

/// Tries a slot's candidates in order until one yields content.
async fn extract_slot(fetcher: &PageFetcher, slot: &ChapterSlot) -> ChapterContent {
    let mut attempted_url = slot
        .candidates
        .first()
        .map(|c| c.url.clone())
        .unwrap_or_default();

    for candidate in &slot.candidates {
        attempted_url = candidate.url.clone();

        let Ok(html) = fetcher.fetch(&candidate.url).await else {
            continue;
        };
        let (body, chapter_title) = {
            let doc = Html::parse_document(&html);
            extract::extract_chapter(&doc, &candidate.url)
        };
        if body.is_empty() {
            continue;
        }

        return ChapterContent {
            number: slot.number,
            title: chapter_title.unwrap_or_else(|| chapter_label(slot.number)),
            body,
            url: candidate.url.clone(),
        };
    }

    ChapterContent {
        number: slot.number,
        title: format!("{} (Not Found)", chapter_label(slot.number)),
        body: String::new(),
        url: attempted_url,
    }
}

/// A produced audio artifact.
#[derive(Debug, Clone)]
pub struct ArtifactInfo {
    pub filename: String,
    pub size_bytes: u64,
    pub modified: SystemTime,
}

/// Lists the audio artifacts in the output directory, newest first.
pub fn list_artifacts(dir: &Path) -> Result<Vec<ArtifactInfo>, OpError> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut artifacts = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("mp3") {
            continue;
        }
        let Some(filename) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let metadata = entry.metadata()?;
        artifacts.push(ArtifactInfo {
            filename: filename.to_string(),
            size_bytes: metadata.len(),
            modified: metadata.modified()?,
        });
    }

    artifacts.sort_by(|a, b| b.modified.cmp(&a.modified));
    Ok(artifacts)
}

/// Resolves an artifact path by name. Names carrying path separators or
/// traversal are rejected.
pub fn artifact_path(dir: &Path, name: &str) -> Result<PathBuf, OpError> {
    if name.is_empty() || name.contains('/') || name.contains('\\') || name.contains("..") {
        return Err(OpError::InvalidName(name.to_string()));
    }

    let path = dir.join(name);
    if !path.is_file() {
        return Err(OpError::NotFound(name.to_string()));
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScrapingConfig;
    use tempfile::TempDir;

    fn idle_fetcher() -> PageFetcher {
        let mut config = ScrapingConfig::default();
        config.min_request_delay_sec = 0.0;
        config.max_request_delay_sec = 0.0;
        PageFetcher::new(config).unwrap()
    }

    #[tokio::test]
    async fn test_resolve_rejects_invalid_url() {
        let fetcher = idle_fetcher();
        let err = resolve_chapter_urls(&fetcher, "not a url", None)
            .await
            .unwrap_err();
        assert!(matches!(err, OpError::InvalidUrl(_)));
    }

    #[tokio::test]
    async fn test_extract_single_rejects_invalid_url() {
        let fetcher = idle_fetcher();
        let err = extract_single(&fetcher, "::::").await.unwrap_err();
        assert!(matches!(err, OpError::InvalidUrl(_)));
    }

    #[test]
    fn test_list_artifacts_filters_non_audio() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("batch_1_chapters_1_to_10.mp3"), b"a").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"b").unwrap();
        std::fs::write(dir.path().join("chapter_0001.mp3"), b"c").unwrap();

        let artifacts = list_artifacts(dir.path()).unwrap();
        let mut names: Vec<&str> = artifacts.iter().map(|a| a.filename.as_str()).collect();
        names.sort();
        assert_eq!(names, vec!["batch_1_chapters_1_to_10.mp3", "chapter_0001.mp3"]);
    }

    #[test]
    fn test_list_artifacts_missing_dir_is_empty() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope");
        assert!(list_artifacts(&missing).unwrap().is_empty());
    }

    #[test]
    fn test_artifact_path_rejects_traversal() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            artifact_path(dir.path(), "../secret.mp3"),
            Err(OpError::InvalidName(_))
        ));
        assert!(matches!(
            artifact_path(dir.path(), "a/b.mp3"),
            Err(OpError::InvalidName(_))
        ));
    }

    #[test]
    fn test_artifact_path_resolves_existing_files() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("batch_1_chapters_1_to_10.mp3");
        std::fs::write(&file, b"audio").unwrap();

        let resolved = artifact_path(dir.path(), "batch_1_chapters_1_to_10.mp3").unwrap();
        assert_eq!(resolved, file);

        assert!(matches!(
            artifact_path(dir.path(), "missing.mp3"),
            Err(OpError::NotFound(_))
        ));
    }
}
