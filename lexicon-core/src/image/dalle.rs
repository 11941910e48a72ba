//! Provider A: OpenAI DALL-E.

use super::{ImageProvider, ImageProviderError, ImageReference, ImageRequest, ProviderChoice};
use crate::config::LexiconConfig;
use async_trait::async_trait;
use openai::OpenAi;

/// General-purpose diffusion through the OpenAI images endpoint.
///
/// Failures are not handled here; they abort the run.
pub struct DalleProvider {
    client: OpenAi,
    model: String,
    size: String,
}

impl DalleProvider {
    pub fn new(client: OpenAi, model: impl Into<String>, size: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
            size: size.into(),
        }
    }

    pub fn from_config(config: &LexiconConfig) -> Self {
        let client = OpenAi::new(&config.openai_api_key).with_timeout(config.request_timeout);
        Self::new(client, &config.dalle_model, &config.dalle_size)
    }

    /// Prompt for a single square cartoon labelled with the root.
    pub fn prompt(request: &ImageRequest) -> String {
        format!(
            "Black-and-white cartoon in minimalist style: {}. \
             Label with Arabic root '{}' in bold calligraphy and technical word below.",
            request.story, request.root
        )
    }

    fn image_request(&self, request: &ImageRequest) -> openai::ImageRequest {
        openai::ImageRequest::new(&self.model, Self::prompt(request))
            .with_count(1)
            .with_size(&self.size)
    }
}

#[async_trait]
impl ImageProvider for DalleProvider {
    async fn generate(&self, request: &ImageRequest) -> Result<ImageReference, ImageProviderError> {
        tracing::debug!(model = %self.model, size = %self.size, "requesting DALL-E image");

        let response = self.client.generate_image(self.image_request(request)).await?;
        let url = response.first_url().ok_or(ImageProviderError::MissingImage)?;
        Ok(ImageReference::Url(url.to_string()))
    }

    fn choice(&self) -> ProviderChoice {
        ProviderChoice::Dalle
    }
}
