//! Text-to-speech for the vocalized term.

use crate::config::LexiconConfig;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;

const TRANSLATE_TTS: &str = "https://translate.google.com/translate_tts";

/// Errors from speech synthesis.
#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("nothing to synthesize")]
    EmptyText,

    #[error("network error: {0}")]
    Network(String),

    #[error("speech backend returned status {status}")]
    Status { status: u16 },

    #[error("speech backend returned no audio")]
    EmptyAudio,

    #[error("failed to write audio: {0}")]
    Io(#[from] std::io::Error),
}

/// The synthesized audio, stored in a single overwritten slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioArtifact {
    pub path: PathBuf,
    pub bytes: Vec<u8>,
}

/// A backend that speaks text.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize `text` in `language`, replacing any previous artifact.
    async fn synthesize(&self, text: &str, language: &str) -> Result<AudioArtifact, SynthesisError>;
}

/// Google Translate's speech endpoint, producing MP3.
///
/// One request per call, no chunking.
pub struct GoogleTts {
    client: reqwest::Client,
    endpoint: String,
    output: PathBuf,
}

impl GoogleTts {
    pub fn new(client: reqwest::Client, output: impl Into<PathBuf>) -> Self {
        Self {
            client,
            endpoint: TRANSLATE_TTS.to_string(),
            output: output.into(),
        }
    }

    pub fn from_config(config: &LexiconConfig) -> Self {
        Self::new(config.http_client(), &config.audio_path)
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    fn query<'a>(text: &'a str, language: &'a str) -> [(&'static str, &'a str); 4] {
        [
            ("ie", "UTF-8"),
            ("client", "tw-ob"),
            ("tl", language),
            ("q", text),
        ]
    }
}

#[async_trait]
impl SpeechSynthesizer for GoogleTts {
    async fn synthesize(&self, text: &str, language: &str) -> Result<AudioArtifact, SynthesisError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(SynthesisError::EmptyText);
        }

        let response = self
            .client
            .get(&self.endpoint)
            .query(&Self::query(text, language))
            .send()
            .await
            .map_err(|e| SynthesisError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(SynthesisError::Status {
                status: response.status().as_u16(),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| SynthesisError::Network(e.to_string()))?
            .to_vec();
        if bytes.is_empty() {
            return Err(SynthesisError::EmptyAudio);
        }

        tokio::fs::write(&self.output, &bytes).await?;
        tracing::debug!(path = %self.output.display(), bytes = bytes.len(), "audio written");

        Ok(AudioArtifact {
            path: self.output.clone(),
            bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_from_config() {
        let config = LexiconConfig::new("sk").with_audio_path("/tmp/lexicon.mp3");
        assert_eq!(GoogleTts::from_config(&config).output(), Path::new("/tmp/lexicon.mp3"));
    }

    #[test]
    fn test_query_parameters() {
        let query = GoogleTts::query("تَوْهِين", "ar");
        assert!(query.contains(&("tl", "ar")));
        assert!(query.contains(&("q", "تَوْهِين")));
        assert!(query.contains(&("client", "tw-ob")));
    }

    #[tokio::test]
    async fn test_blank_text_rejected_without_request() {
        let tts = GoogleTts::new(reqwest::Client::new(), "unused.mp3")
            .with_endpoint("http://127.0.0.1:9/never");
        let err = tts.synthesize("   ", "ar").await.unwrap_err();
        assert!(matches!(err, SynthesisError::EmptyText));
    }
}
