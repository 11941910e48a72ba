//! Language-generation backend seam.
//!
//! Story generation and diacritization both send a single instruction and
//! take the raw completion back, so the backend is one small trait.

use crate::config::LexiconConfig;
use async_trait::async_trait;
use openai::{ChatRequest, Message, OpenAi};
use thiserror::Error;

/// Errors from the language-generation backend.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("language backend error: {0}")]
    Backend(#[from] openai::Error),

    #[error("language backend returned an empty completion")]
    EmptyCompletion,

    #[error("{0}")]
    Other(String),
}

/// A backend that turns one instruction into one completion.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Submit an instruction and return the completion text unmodified.
    async fn generate(&self, instruction: &str) -> Result<String, GenerationError>;

    /// Backend name for logs.
    fn name(&self) -> &str;
}

/// Chat completions on OpenAI.
pub struct OpenAiTextGenerator {
    client: OpenAi,
    model: String,
}

impl OpenAiTextGenerator {
    pub fn new(client: OpenAi, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    pub fn from_config(config: &LexiconConfig) -> Self {
        let client = OpenAi::new(&config.openai_api_key).with_timeout(config.request_timeout);
        Self::new(client, &config.text_model)
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl TextGenerator for OpenAiTextGenerator {
    async fn generate(&self, instruction: &str) -> Result<String, GenerationError> {
        tracing::debug!(model = %self.model, chars = instruction.chars().count(), "chat completion");

        let request = ChatRequest::new(vec![Message::user(instruction)]).with_model(&self.model);
        let text = self.client.complete(request).await?.text();

        if text.trim().is_empty() {
            return Err(GenerationError::EmptyCompletion);
        }
        Ok(text)
    }

    fn name(&self) -> &str {
        "openai"
    }
}
