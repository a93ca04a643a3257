//! Error types for the Kataribe application.
//!
//! Uses `thiserror` for structured error definitions that provide
//! clear context about what went wrong.

use crate::job::JobStatus;
use thiserror::Error;

/// Failure modes for a single page fetch.
///
/// All three variants are per-call failures: the batch job treats the
/// affected chapter as unavailable and keeps going.
#[derive(Error, Debug)]
pub enum FetchError {
    /// Timeout, connection failure, or another transport-level fault.
    #[error("transport failure: {0}")]
    Transient(String),

    /// Anti-bot block (HTTP 403) that persisted through the single retry.
    #[error("blocked by anti-bot protection after retry")]
    Blocked,

    /// Any other non-success HTTP status.
    #[error("unexpected HTTP status {0}")]
    Fatal(u16),
}

/// Error type for speech synthesis requests.
#[derive(Error, Debug)]
pub enum SynthesisError {
    /// HTTP request to the TTS backend failed
    #[error("TTS request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Backend returned an error response
    #[error("TTS backend error (HTTP {status}): {detail}")]
    Api { status: u16, detail: String },

    /// Backend returned a success status but no audio bytes
    #[error("TTS backend returned empty audio")]
    EmptyAudio,
}

/// Error type for audio batch assembly.
#[derive(Error, Debug)]
pub enum AssemblyError {
    /// No per-chapter artifacts were given to assemble.
    #[error("no audio parts to assemble")]
    NoInput,

    /// Filesystem failure while reading parts or writing the batch.
    #[error("assembly I/O failure: {0}")]
    Io(#[from] std::io::Error),

    /// ffmpeg exited unsuccessfully.
    #[error("ffmpeg concat failed: {0}")]
    Ffmpeg(String),
}

/// Rejected job control command. The job state is left unchanged.
#[derive(Error, Debug)]
pub enum JobError {
    #[error("cannot {command} while job is {status}")]
    InvalidTransition {
        command: &'static str,
        status: JobStatus,
    },
}

/// Error type for the exposed operations (`ops` module).
///
/// These are the structured failure codes a thin API layer would map to
/// its own responses.
#[derive(Error, Debug)]
pub enum OpError {
    /// Page fetch failed.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Extraction found no usable body at the URL.
    #[error("no usable chapter content at {url}")]
    ExtractionEmpty { url: String },

    /// The given URL could not be parsed.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// Artifact name contains path separators or traversal.
    #[error("invalid artifact name: {0}")]
    InvalidName(String),

    /// No artifact with that name exists.
    #[error("artifact not found: {0}")]
    NotFound(String),

    /// Filesystem failure while listing or resolving artifacts.
    #[error("artifact I/O failure: {0}")]
    Io(#[from] std::io::Error),
}

/// Error type for configuration operations.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse config file
    #[error("Failed to parse config: {0}")]
    ParseError(String),

    /// Invalid configuration value
    #[error("Invalid config value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Config directory not found
    #[error("Could not determine config directory")]
    NoConfigDir,
}

/// Result type alias using anyhow for application-level error handling.
pub type Result<T> = anyhow::Result<T>;
