//! Image provider abstraction.
//!
//! Every backend takes the same (story, root, term) triple and normalizes
//! its output into an [`ImageReference`]: either a remote URL or an inline
//! base-64 payload. Which provider runs is always the caller's choice;
//! there is no automatic failover between them.

mod dalle;
mod ideogram;
mod vertex;

pub use dalle::DalleProvider;
pub use ideogram::IdeogramProvider;
pub use vertex::VertexProvider;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors from image backends.
#[derive(Debug, Error)]
pub enum ImageProviderError {
    #[error("network error: {0}")]
    Network(String),

    #[error("provider returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to parse provider response: {0}")]
    Parse(String),

    #[error("provider response contained no image")]
    MissingImage,

    #[error("OpenAI error: {0}")]
    OpenAi(#[from] openai::Error),
}

/// Where a generated image can be found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageReference {
    /// A remote image to fetch.
    Url(String),
    /// Base-64 image bytes carried in-line.
    Inline { media_type: String, data: String },
}

impl ImageReference {
    /// Classify a string: `data:image...` URIs are inline, anything else a URL.
    pub fn parse(reference: &str) -> Self {
        if let Some(rest) = reference.strip_prefix("data:image") {
            if let Some((media, data)) = rest.split_once(";base64,") {
                return ImageReference::Inline {
                    media_type: format!("image{media}"),
                    data: data.to_string(),
                };
            }
        }
        ImageReference::Url(reference.to_string())
    }

    /// Inline payload from raw base-64 data.
    pub fn inline(media_type: impl Into<String>, data: impl Into<String>) -> Self {
        ImageReference::Inline {
            media_type: media_type.into(),
            data: data.into(),
        }
    }

    pub fn is_inline(&self) -> bool {
        matches!(self, ImageReference::Inline { .. })
    }

    /// The URL, or a `data:` URI for inline payloads.
    pub fn as_uri(&self) -> String {
        match self {
            ImageReference::Url(url) => url.clone(),
            ImageReference::Inline { media_type, data } => format!("data:{media_type};base64,{data}"),
        }
    }

    /// Decoded bytes of an inline payload. `None` for URLs.
    pub fn decode_inline(&self) -> Option<Result<Vec<u8>, base64::DecodeError>> {
        match self {
            ImageReference::Url(_) => None,
            ImageReference::Inline { data, .. } => Some(STANDARD.decode(data)),
        }
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageReference::Url(url) => f.write_str(url),
            ImageReference::Inline { media_type, data } => {
                write!(f, "<inline {media_type}, {} base-64 chars>", data.len())
            }
        }
    }
}

/// The uniform input every provider receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRequest {
    pub story: String,
    pub root: String,
    pub term: String,
}

impl ImageRequest {
    pub fn new(story: impl Into<String>, root: impl Into<String>, term: impl Into<String>) -> Self {
        Self {
            story: story.into(),
            root: root.into(),
            term: term.into(),
        }
    }
}

/// The three interchangeable backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderChoice {
    /// Provider A: general-purpose diffusion (OpenAI DALL-E).
    Dalle,
    /// Provider B: typography-aware generation (Ideogram).
    Ideogram,
    /// Provider C: cloud-hosted generation (Google Vertex AI Imagen).
    Vertex,
}

impl ProviderChoice {
    pub const ALL: [ProviderChoice; 3] = [
        ProviderChoice::Dalle,
        ProviderChoice::Ideogram,
        ProviderChoice::Vertex,
    ];

    /// Human-facing label.
    pub fn label(self) -> &'static str {
        match self {
            ProviderChoice::Dalle => "DALL-E (OpenAI)",
            ProviderChoice::Ideogram => "Ideogram",
            ProviderChoice::Vertex => "Google Vertex AI",
        }
    }

    /// Short name accepted on the command line.
    pub fn key(self) -> &'static str {
        match self {
            ProviderChoice::Dalle => "dalle",
            ProviderChoice::Ideogram => "ideogram",
            ProviderChoice::Vertex => "vertex",
        }
    }
}

impl fmt::Display for ProviderChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown image provider '{0}' (expected dalle, ideogram or vertex)")]
pub struct UnknownProvider(pub String);

impl FromStr for ProviderChoice {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dalle" | "dall-e" | "openai" | "a" => Ok(ProviderChoice::Dalle),
            "ideogram" | "b" => Ok(ProviderChoice::Ideogram),
            "vertex" | "google" | "imagen" | "c" => Ok(ProviderChoice::Vertex),
            _ => Err(UnknownProvider(s.to_string())),
        }
    }
}

/// A backend that turns a story into an illustration.
#[async_trait]
pub trait ImageProvider: Send + Sync {
    /// Generate one image for the request.
    async fn generate(&self, request: &ImageRequest) -> Result<ImageReference, ImageProviderError>;

    /// Which choice this provider answers to.
    fn choice(&self) -> ProviderChoice;

    /// Whether this failure should become a warning with no image rather
    /// than aborting the run.
    fn degrades_on(&self, _error: &ImageProviderError) -> bool {
        false
    }
}
