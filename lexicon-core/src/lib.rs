//! Arabic root mnemonics for fiber optic vocabulary.
//!
//! This crate provides:
//! - A registry of technical terms and their triliteral roots
//! - Mnemonic story generation through a language backend
//! - Illustrations from three interchangeable image providers
//! - Tashkeel restoration with display shaping
//! - Pronunciation audio
//! - A `Pipeline` that runs all of the above for one term
//!
//! # Quick Start
//!
//! ```ignore
//! use lexicon_core::{registry, LexiconConfig, Pipeline, ProviderChoice};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = LexiconConfig::from_env()?;
//!     let pipeline = Pipeline::from_config(&config);
//!
//!     let entry = registry::lookup("Attenuation").expect("registry term");
//!     let result = pipeline.run(&entry, ProviderChoice::Dalle).await?;
//!
//!     println!("{}", result.story);
//!     println!("{}", result.vocalized.shaped);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod diacritize;
pub mod image;
pub mod llm;
pub mod narrative;
pub mod pipeline;
pub mod registry;
pub mod speech;
pub mod testing;

// Primary public API
pub use config::{ConfigError, LexiconConfig};
pub use diacritize::{Diacritizer, VocalizedText};
pub use image::{ImageProvider, ImageProviderError, ImageReference, ImageRequest, ProviderChoice};
pub use llm::{GenerationError, TextGenerator};
pub use narrative::{MnemonicStory, NarrativeGenerator};
pub use pipeline::{
    PartialResult, Pipeline, PipelineError, PipelineResult, PipelineState, Stage, StageFailure,
    StageWarning,
};
pub use registry::{Field, TermEntry, ValidationError};
pub use speech::{AudioArtifact, SpeechSynthesizer, SynthesisError};
pub use testing::{MockImageProvider, MockSpeech, MockTextGenerator, TestHarness};
