//! Pipeline - the orchestrator for one mnemonic generation.
//!
//! A run walks a fixed sequence of stages, each awaited before the next
//! starts:
//!
//! ```text
//! Idle -> AwaitingInput -> GeneratingStory -> GeneratingImage
//!      -> Diacritizing -> Synthesizing -> Complete
//! ```
//!
//! Any generating state may move to `Failed(stage, error)`. Nothing is
//! retried, and outputs of stages that already finished are handed back
//! with the error.

use crate::config::LexiconConfig;
use crate::diacritize::{Diacritizer, VocalizedText};
use crate::image::{
    DalleProvider, IdeogramProvider, ImageProvider, ImageProviderError, ImageReference,
    ImageRequest, ProviderChoice, VertexProvider,
};
use crate::llm::{GenerationError, OpenAiTextGenerator, TextGenerator};
use crate::narrative::NarrativeGenerator;
use crate::registry::{TermEntry, ValidationError};
use crate::speech::{AudioArtifact, GoogleTts, SpeechSynthesizer, SynthesisError};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// A generating step of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Story,
    Image,
    Diacritization,
    Synthesis,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Story => "story generation",
            Stage::Image => "image generation",
            Stage::Diacritization => "diacritization",
            Stage::Synthesis => "speech synthesis",
        })
    }
}

/// Where a run currently is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    AwaitingInput,
    GeneratingStory,
    GeneratingImage,
    Diacritizing,
    Synthesizing,
    Complete,
    Failed { stage: Stage, error: String },
}

impl PipelineState {
    fn generating(stage: Stage) -> Self {
        match stage {
            Stage::Story => PipelineState::GeneratingStory,
            Stage::Image => PipelineState::GeneratingImage,
            Stage::Diacritization => PipelineState::Diacritizing,
            Stage::Synthesis => PipelineState::Synthesizing,
        }
    }
}

/// The cause of a stage failure.
#[derive(Debug, Error)]
pub enum StageFailure {
    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Image(#[from] ImageProviderError),

    #[error(transparent)]
    Synthesis(#[from] SynthesisError),
}

/// A non-fatal problem the caller should show to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageWarning {
    pub stage: Stage,
    pub message: String,
}

impl fmt::Display for StageWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed: {}", self.stage, self.message)
    }
}

/// Outputs already produced when a run aborted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartialResult {
    pub story: Option<String>,
    pub image: Option<ImageReference>,
    pub vocalized: Option<VocalizedText>,
    pub warnings: Vec<StageWarning>,
}

/// Errors from a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Rejected before any backend was contacted.
    #[error("invalid input: {0}")]
    Validation(#[from] ValidationError),

    /// A stage failed; later stages did not run.
    #[error("{stage} failed: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: StageFailure,
        partial: Box<PartialResult>,
    },
}

impl PipelineError {
    /// The failing stage, if the error came from one.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            PipelineError::Validation(_) => None,
            PipelineError::Stage { stage, .. } => Some(*stage),
        }
    }

    /// Outputs produced before the failure.
    pub fn partial(&self) -> Option<&PartialResult> {
        match self {
            PipelineError::Validation(_) => None,
            PipelineError::Stage { partial, .. } => Some(partial),
        }
    }
}

/// Everything a successful run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineResult {
    pub term: TermEntry,
    pub provider: ProviderChoice,
    pub story: String,
    /// `None` when the provider degraded instead of failing.
    pub image: Option<ImageReference>,
    pub vocalized: VocalizedText,
    pub audio: AudioArtifact,
    pub warnings: Vec<StageWarning>,
}

type Observer = Box<dyn Fn(&PipelineState) + Send + Sync>;

/// Chains story, image, tashkeel and speech backends for one term at a time.
pub struct Pipeline {
    narrative: NarrativeGenerator,
    diacritizer: Diacritizer,
    providers: HashMap<ProviderChoice, Box<dyn ImageProvider>>,
    speech: Box<dyn SpeechSynthesizer>,
    language: String,
    observer: Option<Observer>,
}

impl Pipeline {
    /// Create a pipeline with no image providers registered.
    ///
    /// The text generator is shared by story generation and diacritization.
    pub fn new(text: Arc<dyn TextGenerator>, speech: Box<dyn SpeechSynthesizer>) -> Self {
        Self {
            narrative: NarrativeGenerator::new(Arc::clone(&text)),
            diacritizer: Diacritizer::new(text),
            providers: HashMap::new(),
            speech,
            language: "ar".to_string(),
            observer: None,
        }
    }

    /// Wire the real backends.
    ///
    /// Providers without credentials are left unregistered; choosing one
    /// fails validation.
    pub fn from_config(config: &LexiconConfig) -> Self {
        let text: Arc<dyn TextGenerator> = Arc::new(OpenAiTextGenerator::from_config(config));
        let mut pipeline = Self::new(text, Box::new(GoogleTts::from_config(config)))
            .with_language(&config.speech_language)
            .with_provider(Box::new(DalleProvider::from_config(config)));

        if let Some(ideogram) = IdeogramProvider::from_config(config) {
            pipeline = pipeline.with_provider(Box::new(ideogram));
        }
        if let Some(vertex) = VertexProvider::from_config(config) {
            pipeline = pipeline.with_provider(Box::new(vertex));
        }
        pipeline
    }

    /// Register an image provider under its own choice, replacing any other.
    pub fn with_provider(mut self, provider: Box<dyn ImageProvider>) -> Self {
        self.providers.insert(provider.choice(), provider);
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// Receive every state transition.
    pub fn with_observer(mut self, observer: impl Fn(&PipelineState) + Send + Sync + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    /// Registered providers in display order.
    pub fn available_providers(&self) -> Vec<ProviderChoice> {
        ProviderChoice::ALL
            .into_iter()
            .filter(|c| self.providers.contains_key(c))
            .collect()
    }

    pub fn has_provider(&self, choice: ProviderChoice) -> bool {
        self.providers.contains_key(&choice)
    }

    fn transition(&self, state: PipelineState) {
        match &state {
            PipelineState::Failed { stage, error } => {
                tracing::error!(%stage, %error, "pipeline failed");
            }
            other => tracing::info!(state = ?other, "pipeline state"),
        }
        if let Some(observer) = &self.observer {
            observer(&state);
        }
    }

    fn fail(&self, stage: Stage, source: StageFailure, partial: PartialResult) -> PipelineError {
        self.transition(PipelineState::Failed {
            stage,
            error: source.to_string(),
        });
        PipelineError::Stage {
            stage,
            source,
            partial: Box::new(partial),
        }
    }

    /// Run the full pipeline for one term with the chosen image provider.
    pub async fn run(
        &self,
        entry: &TermEntry,
        choice: ProviderChoice,
    ) -> Result<PipelineResult, PipelineError> {
        self.transition(PipelineState::Idle);
        self.transition(PipelineState::AwaitingInput);

        entry.validate()?;
        let provider = self
            .providers
            .get(&choice)
            .ok_or_else(|| ValidationError::ProviderNotConfigured(choice.label().to_string()))?;

        let mut partial = PartialResult::default();

        self.transition(PipelineState::generating(Stage::Story));
        let story = match self
            .narrative
            .generate_story(&entry.term, &entry.root, &entry.root_meaning)
            .await
        {
            Ok(story) => story.text,
            Err(e) => return Err(self.fail(Stage::Story, e.into(), partial)),
        };
        partial.story = Some(story.clone());

        self.transition(PipelineState::generating(Stage::Image));
        let request = ImageRequest::new(&story, &entry.root, &entry.term);
        match provider.generate(&request).await {
            Ok(image) => partial.image = Some(image),
            Err(e) if provider.degrades_on(&e) => {
                tracing::warn!(provider = %choice, error = %e, "image generation degraded, continuing without image");
                partial.warnings.push(StageWarning {
                    stage: Stage::Image,
                    message: format!("{} API error: {e}", choice.label()),
                });
            }
            Err(e) => return Err(self.fail(Stage::Image, e.into(), partial)),
        }

        self.transition(PipelineState::generating(Stage::Diacritization));
        let vocalized = match self.diacritizer.diacritize(&entry.arabic).await {
            Ok(v) => v,
            Err(e) => return Err(self.fail(Stage::Diacritization, e.into(), partial)),
        };
        partial.vocalized = Some(vocalized.clone());

        self.transition(PipelineState::generating(Stage::Synthesis));
        let audio = match self.speech.synthesize(&vocalized.text, &self.language).await {
            Ok(audio) => audio,
            Err(e) => return Err(self.fail(Stage::Synthesis, e.into(), partial)),
        };

        self.transition(PipelineState::Complete);

        Ok(PipelineResult {
            term: entry.clone(),
            provider: choice,
            story,
            image: partial.image,
            vocalized,
            audio,
            warnings: partial.warnings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_names() {
        assert_eq!(Stage::Story.to_string(), "story generation");
        assert_eq!(Stage::Image.to_string(), "image generation");
        assert_eq!(Stage::Diacritization.to_string(), "diacritization");
        assert_eq!(Stage::Synthesis.to_string(), "speech synthesis");
    }

    #[test]
    fn test_from_config_registers_only_configured_providers() {
        let pipeline = Pipeline::from_config(&LexiconConfig::new("sk"));
        assert_eq!(pipeline.available_providers(), vec![ProviderChoice::Dalle]);

        let config = LexiconConfig::new("sk")
            .with_ideogram_key("ideo")
            .with_google("colossus", "ya29");
        let pipeline = Pipeline::from_config(&config);
        assert_eq!(pipeline.available_providers(), ProviderChoice::ALL.to_vec());
    }

    #[test]
    fn test_stage_error_display() {
        let err = PipelineError::Stage {
            stage: Stage::Synthesis,
            source: SynthesisError::EmptyAudio.into(),
            partial: Box::default(),
        };
        assert_eq!(err.to_string(), "speech synthesis failed: speech backend returned no audio");
        assert_eq!(err.stage(), Some(Stage::Synthesis));
        assert!(err.partial().is_some());
    }
}
