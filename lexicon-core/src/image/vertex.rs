//! Provider C: Imagen on Google Vertex AI.

use super::{ImageProvider, ImageProviderError, ImageReference, ImageRequest, ProviderChoice};
use crate::config::LexiconConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Cloud-hosted generation against a pre-trained Imagen model.
///
/// Returns the image in-line, so nothing needs fetching downstream.
/// Failures abort the run.
pub struct VertexProvider {
    client: reqwest::Client,
    access_token: String,
    endpoint: String,
}

impl VertexProvider {
    pub fn new(
        client: reqwest::Client,
        access_token: impl Into<String>,
        project_id: &str,
        location: &str,
        model: &str,
    ) -> Self {
        Self {
            client,
            access_token: access_token.into(),
            endpoint: predict_endpoint(project_id, location, model),
        }
    }

    /// Build from config. `None` unless both project and token are set.
    pub fn from_config(config: &LexiconConfig) -> Option<Self> {
        let project = config.google_project_id.as_deref()?;
        let token = config.google_access_token.as_ref()?;
        Some(Self::new(
            config.http_client(),
            token,
            project,
            &config.google_location,
            &config.imagen_model,
        ))
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn prompt(request: &ImageRequest) -> String {
        format!(
            "Black-and-white minimalist cartoon: {}. \
             Label with Arabic root '{}' in calligraphy and '{}' below.",
            request.story, request.root, request.term
        )
    }

    fn payload(request: &ImageRequest) -> ApiPredictRequest {
        ApiPredictRequest {
            instances: vec![ApiInstance {
                prompt: Self::prompt(request),
            }],
            parameters: ApiParameters {
                sample_count: 1,
                aspect_ratio: "1:1".to_string(),
            },
        }
    }
}

fn predict_endpoint(project_id: &str, location: &str, model: &str) -> String {
    format!(
        "https://{location}-aiplatform.googleapis.com/v1/projects/{project_id}/locations/{location}/publishers/google/models/{model}:predict"
    )
}

#[async_trait]
impl ImageProvider for VertexProvider {
    async fn generate(&self, request: &ImageRequest) -> Result<ImageReference, ImageProviderError> {
        tracing::debug!(endpoint = %self.endpoint, "requesting Imagen prediction");

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.access_token)
            .json(&Self::payload(request))
            .send()
            .await
            .map_err(|e| ImageProviderError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ImageProviderError::Status { status, body });
        }

        let body: ApiPredictResponse = response
            .json()
            .await
            .map_err(|e| ImageProviderError::Parse(e.to_string()))?;

        first_image(body).ok_or(ImageProviderError::MissingImage)
    }

    fn choice(&self) -> ProviderChoice {
        ProviderChoice::Vertex
    }
}

fn first_image(body: ApiPredictResponse) -> Option<ImageReference> {
    let prediction = body.predictions.into_iter().next()?;
    let data = prediction.bytes_base64_encoded?;
    let media_type = prediction
        .mime_type
        .unwrap_or_else(|| "image/png".to_string());
    Some(ImageReference::Inline { media_type, data })
}

#[derive(Debug, Serialize)]
struct ApiPredictRequest {
    instances: Vec<ApiInstance>,
    parameters: ApiParameters,
}

#[derive(Debug, Serialize)]
struct ApiInstance {
    prompt: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiParameters {
    sample_count: u32,
    aspect_ratio: String,
}

#[derive(Debug, Deserialize)]
struct ApiPredictResponse {
    #[serde(default)]
    predictions: Vec<ApiPrediction>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiPrediction {
    #[serde(default)]
    bytes_base64_encoded: Option<String>,
    #[serde(default)]
    mime_type: Option<String>,
}
