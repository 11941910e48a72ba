//! Provider B: Ideogram.

use super::{ImageProvider, ImageProviderError, ImageReference, ImageRequest, ProviderChoice};
use crate::config::LexiconConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

const ENDPOINT: &str = "https://api.ideogram.ai/generate";

/// Typography-aware generation, used for legible calligraphy labels.
///
/// Non-2xx responses degrade to "no image" with a warning instead of
/// aborting the run. Transport and parse failures stay fatal, the same as
/// for the other providers. The asymmetry is deliberate and kept as is.
pub struct IdeogramProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    style: String,
    endpoint: String,
}

impl IdeogramProvider {
    pub fn new(
        client: reqwest::Client,
        api_key: impl Into<String>,
        model: impl Into<String>,
        style: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            model: model.into(),
            style: style.into(),
            endpoint: ENDPOINT.to_string(),
        }
    }

    /// Build from config. `None` when no Ideogram key is configured.
    pub fn from_config(config: &LexiconConfig) -> Option<Self> {
        let key = config.ideogram_api_key.as_ref()?;
        Some(Self::new(
            config.http_client(),
            key,
            &config.ideogram_model,
            &config.ideogram_style,
        ))
    }

    /// Send requests somewhere other than the public API.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Prompt asking for bold calligraphy labels for both root and term.
    pub fn prompt(request: &ImageRequest) -> String {
        format!(
            "Black-and-white line drawing, humorous minimalist cartoon: {}. \
             Include bold Arabic calligraphy label for root '{}' and term '{}' below.",
            request.story, request.root, request.term
        )
    }

    fn payload(&self, request: &ImageRequest) -> ApiGenerateRequest {
        ApiGenerateRequest {
            prompt: Self::prompt(request),
            model: self.model.clone(),
            style: self.style.clone(),
        }
    }
}

#[async_trait]
impl ImageProvider for IdeogramProvider {
    async fn generate(&self, request: &ImageRequest) -> Result<ImageReference, ImageProviderError> {
        tracing::debug!(model = %self.model, style = %self.style, "requesting Ideogram image");

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&self.payload(request))
            .send()
            .await
            .map_err(|e| ImageProviderError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ImageProviderError::Status { status, body });
        }

        let body: ApiGenerateResponse = response
            .json()
            .await
            .map_err(|e| ImageProviderError::Parse(e.to_string()))?;

        first_url(body)
            .map(ImageReference::Url)
            .ok_or(ImageProviderError::MissingImage)
    }

    fn choice(&self) -> ProviderChoice {
        ProviderChoice::Ideogram
    }

    fn degrades_on(&self, error: &ImageProviderError) -> bool {
        matches!(error, ImageProviderError::Status { .. })
    }
}

fn first_url(body: ApiGenerateResponse) -> Option<String> {
    body.data.into_iter().next().and_then(|d| d.url)
}

#[derive(Debug, Serialize)]
struct ApiGenerateRequest {
    prompt: String,
    model: String,
    style: String,
}

#[derive(Debug, Deserialize)]
struct ApiGenerateResponse {
    #[serde(default)]
    data: Vec<ApiImage>,
}

#[derive(Debug, Deserialize)]
struct ApiImage {
    #[serde(default)]
    url: Option<String>,
}
