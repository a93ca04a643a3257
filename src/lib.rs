//! Kataribe - web fiction audiobook maker.
//!
//! This library provides functionality for:
//! - Discovering sequentially-numbered chapters on template-inconsistent
//!   fiction sites and extracting their text via heuristic fallback chains
//! - Driving a pausable/cancellable background job that narrates chapters
//!   through a TTS backend and merges the audio into batch artifacts

pub mod assemble;
pub mod config;
pub mod console;
pub mod error;
pub mod fetch;
pub mod job;
pub mod ops;
pub mod scrape;
pub mod tts;

// Re-export commonly used types
pub use assemble::AudioBatch;
pub use config::Config;
pub use console::Console;
pub use error::{AssemblyError, ConfigError, FetchError, JobError, OpError, SynthesisError};
pub use fetch::PageFetcher;
pub use job::{JobController, JobRequest, JobSnapshot, JobStatus};
pub use scrape::{ChapterContent, ChapterQuery, ChapterRef, ChapterSource, SiteSource};
pub use tts::{HttpSynthesizer, Synthesizer, VoiceParams};
