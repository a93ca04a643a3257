//! Speech synthesis backend client.
//!
//! The batch job talks to synthesis through the [`Synthesizer`] trait;
//! the production implementation posts chapter text to an HTTP TTS
//! backend and returns the audio bytes. Prosody adjustments are carried
//! in an SSML envelope, built only when at least one adjustment is
//! non-zero.

use crate::config::TtsConfig;
use crate::error::SynthesisError;
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

/// Voice and prosody parameters for a synthesis request.
#[derive(Debug, Clone)]
pub struct VoiceParams {
    /// Voice identifier understood by the backend.
    pub voice: String,

    /// Speaking rate adjustment in percent.
    pub rate: i32,

    /// Pitch adjustment in percent.
    pub pitch: i32,

    /// Volume adjustment in percent.
    pub volume: i32,
}

impl VoiceParams {
    /// Builds parameters from configuration defaults.
    pub fn from_config(config: &TtsConfig) -> Self {
        Self {
            voice: config.voice.clone(),
            rate: config.rate,
            pitch: config.pitch,
            volume: config.volume,
        }
    }

    /// Returns true if any prosody adjustment is non-zero.
    pub fn has_prosody(&self) -> bool {
        self.rate != 0 || self.pitch != 0 || self.volume != 0
    }
}

/// Escapes text for embedding in an SSML envelope.
fn escape_markup(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

/// Wraps text in an SSML prosody envelope when any adjustment is
/// non-zero; plain text passes through untouched. Adjustments are
/// formatted as signed percentages.
pub fn build_ssml(text: &str, params: &VoiceParams) -> String {
    if !params.has_prosody() {
        return text.to_string();
    }

    let mut attrs: Vec<String> = Vec::new();
    if params.rate != 0 {
        attrs.push(format!(r#"rate="{:+}%""#, params.rate));
    }
    if params.pitch != 0 {
        attrs.push(format!(r#"pitch="{:+}%""#, params.pitch));
    }
    if params.volume != 0 {
        attrs.push(format!(r#"volume="{:+}%""#, params.volume));
    }

    format!(
        "<speak><prosody {}>{}</prosody></speak>",
        attrs.join(" "),
        escape_markup(text)
    )
}

/// Trait for speech synthesis backends.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Synthesizes narration for the given text, returning audio bytes.
    async fn synthesize(
        &self,
        text: &str,
        params: &VoiceParams,
    ) -> Result<Vec<u8>, SynthesisError>;
}

/// Request body for the TTS backend.
#[derive(Debug, Serialize)]
struct TtsRequest<'a> {
    text: &'a str,
    voice: &'a str,
    rate: i32,
    pitch: i32,
    volume: i32,
}

/// HTTP client for an edge-TTS-style synthesis backend.
pub struct HttpSynthesizer {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpSynthesizer {
    /// Creates a client for the configured backend.
    pub fn new(config: &TtsConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_sec))
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl Synthesizer for HttpSynthesizer {
    async fn synthesize(
        &self,
        text: &str,
        params: &VoiceParams,
    ) -> Result<Vec<u8>, SynthesisError> {
        let payload = build_ssml(text, params);
        let request = TtsRequest {
            text: &payload,
            voice: &params.voice,
            rate: params.rate,
            pitch: params.pitch,
            volume: params.volume,
        };

        let url = format!("{}/api/generate", self.endpoint);
        let response = self.client.post(&url).json(&request).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let detail = response.text().await.unwrap_or_default();
            return Err(SynthesisError::Api { status, detail });
        }

        let audio = response.bytes().await?.to_vec();
        if audio.is_empty() {
            return Err(SynthesisError::EmptyAudio);
        }

        Ok(audio)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(rate: i32, pitch: i32, volume: i32) -> VoiceParams {
        VoiceParams {
            voice: "en-US-AndrewNeural".to_string(),
            rate,
            pitch,
            volume,
        }
    }

    #[test]
    fn test_plain_text_without_prosody() {
        let text = "Hello <world> & friends";
        assert_eq!(build_ssml(text, &params(0, 0, 0)), text);
    }

    #[test]
    fn test_ssml_with_signed_percentages() {
        let ssml = build_ssml("Hello", &params(10, -5, 0));
        assert_eq!(
            ssml,
            r#"<speak><prosody rate="+10%" pitch="-5%">Hello</prosody></speak>"#
        );
    }

    #[test]
    fn test_ssml_escapes_text() {
        let ssml = build_ssml("a < b & \"c\"", &params(0, 0, 20));
        assert!(ssml.contains("a &lt; b &amp; &quot;c&quot;"));
        assert!(ssml.contains(r#"volume="+20%""#));
    }

    #[test]
    fn test_has_prosody() {
        assert!(!params(0, 0, 0).has_prosody());
        assert!(params(1, 0, 0).has_prosody());
        assert!(params(0, -1, 0).has_prosody());
        assert!(params(0, 0, 3).has_prosody());
    }
}
