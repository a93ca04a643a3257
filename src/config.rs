//! Configuration management for Kataribe.
//!
//! Handles loading, saving, and validating configuration from
//! platform-specific config directories.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application name used for config directory.
const APP_NAME: &str = "Kataribe";

/// Default config filename.
const CONFIG_FILENAME: &str = "config.toml";

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Web scraping settings.
    pub scraping: ScrapingConfig,

    /// Speech synthesis backend settings.
    pub tts: TtsConfig,

    /// Batch job settings.
    pub job: JobConfig,

    /// File paths.
    pub paths: PathsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scraping: ScrapingConfig::default(),
            tts: TtsConfig::default(),
            job: JobConfig::default(),
            paths: PathsConfig::default(),
        }
    }
}

/// Web scraping configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapingConfig {
    /// Lower bound of the randomized delay before each request, in seconds.
    pub min_request_delay_sec: f64,

    /// Upper bound of the randomized delay before each request, in seconds.
    pub max_request_delay_sec: f64,

    /// Lower bound of the backoff after an anti-bot block, in seconds.
    pub block_backoff_min_sec: f64,

    /// Upper bound of the backoff after an anti-bot block, in seconds.
    pub block_backoff_max_sec: f64,

    /// Per-request timeout in seconds.
    pub request_timeout_sec: u64,

    /// Enable scraper debug logging.
    pub debug: bool,
}

impl Default for ScrapingConfig {
    fn default() -> Self {
        Self {
            min_request_delay_sec: 1.5,
            max_request_delay_sec: 4.0,
            block_backoff_min_sec: 3.0,
            block_backoff_max_sec: 5.0,
            request_timeout_sec: 20,
            debug: false,
        }
    }
}

/// Speech synthesis backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TtsConfig {
    /// Base URL of the TTS backend.
    pub endpoint: String,

    /// Default voice identifier.
    pub voice: String,

    /// Default speaking rate adjustment in percent.
    pub rate: i32,

    /// Default pitch adjustment in percent.
    pub pitch: i32,

    /// Default volume adjustment in percent.
    pub volume: i32,

    /// Per-request timeout in seconds. Synthesis of a full chapter can
    /// take far longer than a page fetch.
    pub request_timeout_sec: u64,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8000".to_string(),
            voice: "en-US-AndrewNeural".to_string(),
            rate: 0,
            pitch: 0,
            volume: 0,
            request_timeout_sec: 120,
        }
    }
}

/// Batch job configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JobConfig {
    /// Number of chapters merged into one audio batch.
    pub batch_size: usize,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self { batch_size: 10 }
    }
}

/// File path configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Directory for per-chapter and batch audio artifacts.
    pub audio_output_directory: PathBuf,

    /// Explicit path to an ffmpeg binary for audio-aware batch assembly.
    /// If not set, ffmpeg is looked up on PATH; if that fails too, batch
    /// assembly degrades to raw byte concatenation.
    pub ffmpeg_command: Option<String>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            audio_output_directory: PathBuf::from("output/audio"),
            ffmpeg_command: None,
        }
    }
}

impl Config {
    /// Returns the platform-specific config directory path.
    pub fn config_dir() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|p| p.join(APP_NAME))
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Returns the full path to the config file.
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        Ok(Self::config_dir()?.join(CONFIG_FILENAME))
    }

    /// Loads configuration from the default location.
    ///
    /// If the config file doesn't exist, creates a default one.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::config_path()?;
        Self::load_from(&path)
    }

    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            let config = Config::default();
            config.save_to(path)?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(path)?;
        let config: Config =
            toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        Ok(config)
    }

    /// Saves configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::config_path()?;
        self.save_to(&path)
    }

    /// Saves configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scraping.min_request_delay_sec < 0.0
            || self.scraping.max_request_delay_sec < self.scraping.min_request_delay_sec
        {
            return Err(ConfigError::InvalidValue {
                key: "scraping.max_request_delay_sec".to_string(),
                message: "delay bounds must satisfy 0 <= min <= max".to_string(),
            });
        }

        if self.scraping.block_backoff_min_sec < 0.0
            || self.scraping.block_backoff_max_sec < self.scraping.block_backoff_min_sec
        {
            return Err(ConfigError::InvalidValue {
                key: "scraping.block_backoff_max_sec".to_string(),
                message: "backoff bounds must satisfy 0 <= min <= max".to_string(),
            });
        }

        if self.scraping.request_timeout_sec == 0 {
            return Err(ConfigError::InvalidValue {
                key: "scraping.request_timeout_sec".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }

        if self.tts.endpoint.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "tts.endpoint".to_string(),
                message: "must not be empty".to_string(),
            });
        }

        if self.job.batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "job.batch_size".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.job.batch_size, 10);
        assert_eq!(config.scraping.min_request_delay_sec, 1.5);
        assert_eq!(config.scraping.max_request_delay_sec, 4.0);
        assert_eq!(config.tts.voice, "en-US-AndrewNeural");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_round_trip() {
        let mut config = Config::default();
        config.tts.endpoint = "http://tts.local:9000".to_string();
        config.job.batch_size = 5;
        let file = NamedTempFile::new().unwrap();

        config.save_to(file.path()).unwrap();

        let loaded = Config::load_from(file.path()).unwrap();
        assert_eq!(loaded.tts.endpoint, config.tts.endpoint);
        assert_eq!(loaded.job.batch_size, 5);
    }

    #[test]
    fn test_config_validation_rejects_inverted_delays() {
        let mut config = Config::default();
        config.scraping.min_request_delay_sec = 5.0;
        config.scraping.max_request_delay_sec = 1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_rejects_zero_batch() {
        let mut config = Config::default();
        config.job.batch_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_rejects_empty_endpoint() {
        let mut config = Config::default();
        config.tts.endpoint = "  ".to_string();
        assert!(config.validate().is_err());
    }
}
