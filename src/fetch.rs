//! Rate-limited page fetching with anti-bot block recovery.
//!
//! Each fetch sleeps a randomized interval first to keep request pacing
//! humanlike. An HTTP 403 triggers a single recovery attempt: the session
//! is rebuilt (fresh cookie jar), a longer randomized backoff is applied,
//! and the request is retried exactly once. A second 403 is reported as a
//! block; no further retries are made.

use crate::config::ScrapingConfig;
use crate::error::FetchError;
use rand::Rng;
use reqwest::StatusCode;
use std::sync::Mutex;
use std::time::Duration;

/// How a response status is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Disposition {
    /// Success; use the body.
    Body,
    /// Anti-bot block on the first attempt; rebuild the session and retry.
    RetryOnce,
    /// Anti-bot block that survived the retry.
    Blocked,
    /// Any other non-success status.
    Fatal(u16),
}

/// Classifies a response status. Pure so the retry policy is testable
/// without a server.
fn classify_status(status: StatusCode, after_retry: bool) -> Disposition {
    if status.is_success() {
        return Disposition::Body;
    }
    if status == StatusCode::FORBIDDEN {
        return if after_retry {
            Disposition::Blocked
        } else {
            Disposition::RetryOnce
        };
    }
    Disposition::Fatal(status.as_u16())
}

/// Samples a delay uniformly from `[min_sec, max_sec]`.
fn jitter_delay(min_sec: f64, max_sec: f64) -> Duration {
    if max_sec <= min_sec {
        return Duration::from_secs_f64(min_sec.max(0.0));
    }
    Duration::from_secs_f64(rand::rng().random_range(min_sec..=max_sec))
}

/// Builds the HTTP client used for page fetches.
fn build_client(timeout_sec: u64) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36")
        .cookie_store(true)
        .timeout(Duration::from_secs(timeout_sec))
        .build()
}

/// Rate-limited page fetcher with single-retry block recovery.
pub struct PageFetcher {
    client: Mutex<reqwest::Client>,
    config: ScrapingConfig,
}

impl PageFetcher {
    /// Creates a fetcher with the given scraping configuration.
    pub fn new(config: ScrapingConfig) -> Result<Self, reqwest::Error> {
        let client = build_client(config.request_timeout_sec)?;
        Ok(Self {
            client: Mutex::new(client),
            config,
        })
    }

    /// Returns a handle to the current client session.
    fn client(&self) -> reqwest::Client {
        self.client.lock().expect("fetch client lock poisoned").clone()
    }

    /// Discards the current session and starts a fresh one (new cookie
    /// jar). Used after an anti-bot block response.
    fn reset_session(&self) {
        if let Ok(fresh) = build_client(self.config.request_timeout_sec) {
            *self.client.lock().expect("fetch client lock poisoned") = fresh;
        }
    }

    /// Sleeps the randomized pre-request interval.
    async fn pace(&self, min_sec: f64, max_sec: f64) {
        let delay = jitter_delay(min_sec, max_sec);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    /// Fetches a page and returns its raw HTML.
    ///
    /// Redirects are followed; the body belongs to the final URL.
    pub async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        self.pace(
            self.config.min_request_delay_sec,
            self.config.max_request_delay_sec,
        )
        .await;

        let response = self
            .client()
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Transient(e.to_string()))?;

        match classify_status(response.status(), false) {
            Disposition::Body => response
                .text()
                .await
                .map_err(|e| FetchError::Transient(e.to_string())),
            Disposition::RetryOnce => self.retry_after_block(url).await,
            Disposition::Fatal(status) => Err(FetchError::Fatal(status)),
            Disposition::Blocked => Err(FetchError::Blocked),
        }
    }

    /// The single recovery attempt after a 403: fresh session, longer
    /// backoff, one more request. A transport failure here is reported as
    /// `Blocked` since the block is the proximate cause.
    async fn retry_after_block(&self, url: &str) -> Result<String, FetchError> {
        self.pace(
            self.config.block_backoff_min_sec,
            self.config.block_backoff_max_sec,
        )
        .await;
        self.reset_session();

        let response = self
            .client()
            .get(url)
            .send()
            .await
            .map_err(|_| FetchError::Blocked)?;

        match classify_status(response.status(), true) {
            Disposition::Body => response
                .text()
                .await
                .map_err(|e| FetchError::Transient(e.to_string())),
            Disposition::Fatal(status) => Err(FetchError::Fatal(status)),
            Disposition::Blocked | Disposition::RetryOnce => Err(FetchError::Blocked),
        }
    }
}
