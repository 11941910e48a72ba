//! Process-wide configuration.
//!
//! `LexiconConfig` is built once at startup (usually from the environment)
//! and handed by reference to every backend constructor.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors while assembling configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} environment variable not set")]
    MissingVar(&'static str),
}

/// Credentials, model identifiers and paths for every backend.
#[derive(Debug, Clone)]
pub struct LexiconConfig {
    /// Key for chat completions and DALL-E.
    pub openai_api_key: String,

    /// Bearer token for Ideogram. Provider B is unavailable without it.
    pub ideogram_api_key: Option<String>,

    /// Google Cloud project hosting the Imagen model.
    pub google_project_id: Option<String>,

    /// Vertex AI region.
    pub google_location: String,

    /// OAuth access token for Vertex AI (e.g. `gcloud auth print-access-token`).
    pub google_access_token: Option<String>,

    /// Chat model used for stories and tashkeel.
    pub text_model: String,

    pub dalle_model: String,
    pub dalle_size: String,
    pub ideogram_model: String,
    pub ideogram_style: String,
    pub imagen_model: String,

    /// Language code passed to speech synthesis.
    pub speech_language: String,

    /// Single audio slot, overwritten by every run.
    pub audio_path: PathBuf,

    /// Timeout applied to every outbound HTTP request.
    pub request_timeout: Duration,
}

impl LexiconConfig {
    /// Create a config with defaults and the given OpenAI key.
    pub fn new(openai_api_key: impl Into<String>) -> Self {
        Self {
            openai_api_key: openai_api_key.into(),
            ideogram_api_key: None,
            google_project_id: None,
            google_location: "us-central1".to_string(),
            google_access_token: None,
            text_model: "gpt-4o".to_string(),
            dalle_model: "dall-e-3".to_string(),
            dalle_size: "1024x1024".to_string(),
            ideogram_model: "ideogram-3.0".to_string(),
            ideogram_style: "AUTO".to_string(),
            imagen_model: "imagen-3.0-fast-generate-preview-0514".to_string(),
            speech_language: "ar".to_string(),
            audio_path: PathBuf::from("audio.mp3"),
            request_timeout: Duration::from_secs(120),
        }
    }

    /// Build a config from environment variables.
    ///
    /// `OPENAI_API_KEY` is required. `IDEOGRAM_API_KEY`, `GOOGLE_PROJECT_ID`,
    /// `GOOGLE_LOCATION`, `GOOGLE_ACCESS_TOKEN` and `LEXICON_AUDIO_PATH` are
    /// optional; empty values count as unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let mut config = Self::new(var("OPENAI_API_KEY").ok_or(ConfigError::MissingVar("OPENAI_API_KEY"))?);
        config.ideogram_api_key = var("IDEOGRAM_API_KEY");
        config.google_project_id = var("GOOGLE_PROJECT_ID");
        config.google_access_token = var("GOOGLE_ACCESS_TOKEN");
        if let Some(location) = var("GOOGLE_LOCATION") {
            config.google_location = location;
        }
        if let Some(path) = var("LEXICON_AUDIO_PATH") {
            config.audio_path = PathBuf::from(path);
        }
        Ok(config)
    }

    pub fn with_ideogram_key(mut self, key: impl Into<String>) -> Self {
        self.ideogram_api_key = Some(key.into());
        self
    }

    /// Set the Google project and access token used by Vertex AI.
    pub fn with_google(mut self, project_id: impl Into<String>, access_token: impl Into<String>) -> Self {
        self.google_project_id = Some(project_id.into());
        self.google_access_token = Some(access_token.into());
        self
    }

    pub fn with_google_location(mut self, location: impl Into<String>) -> Self {
        self.google_location = location.into();
        self
    }

    pub fn with_text_model(mut self, model: impl Into<String>) -> Self {
        self.text_model = model.into();
        self
    }

    pub fn with_dalle_model(mut self, model: impl Into<String>) -> Self {
        self.dalle_model = model.into();
        self
    }

    pub fn with_dalle_size(mut self, size: impl Into<String>) -> Self {
        self.dalle_size = size.into();
        self
    }

    pub fn with_ideogram_model(mut self, model: impl Into<String>) -> Self {
        self.ideogram_model = model.into();
        self
    }

    pub fn with_ideogram_style(mut self, style: impl Into<String>) -> Self {
        self.ideogram_style = style.into();
        self
    }

    pub fn with_imagen_model(mut self, model: impl Into<String>) -> Self {
        self.imagen_model = model.into();
        self
    }

    pub fn with_speech_language(mut self, language: impl Into<String>) -> Self {
        self.speech_language = language.into();
        self
    }

    pub fn with_audio_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.audio_path = path.into();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Build an HTTP client with the configured connect and request timeouts.
    pub fn try_http_client(&self) -> Result<reqwest::Client, reqwest::Error> {
        reqwest::Client::builder()
            .timeout(self.request_timeout)
            .connect_timeout(CONNECT_TIMEOUT.min(self.request_timeout))
            .build()
    }

    /// Like [`try_http_client`](Self::try_http_client), logging and falling
    /// back to reqwest's defaults if the builder fails.
    pub fn http_client(&self) -> reqwest::Client {
        self.try_http_client().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "HTTP client build failed, falling back to defaults without timeouts");
            reqwest::Client::new()
        })
    }
}
