//! Mnemonic story generation.

use crate::llm::{GenerationError, TextGenerator};
use std::sync::Arc;

/// A generated mnemonic, consumed immediately by image generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MnemonicStory {
    pub text: String,
}

/// Instruction asking for a humorous root-to-term mnemonic.
pub fn story_instruction(term: &str, root: &str, root_meaning: &str) -> String {
    format!(
        "Create a humorous mnemonic story like 'Fun with Chinese Characters': \
         Arabic root {root} means '{root_meaning}'. \
         Link to fiber optic term '{term}' with a visual metaphor."
    )
}

/// Writes mnemonic stories through a language backend.
pub struct NarrativeGenerator {
    generator: Arc<dyn TextGenerator>,
}

impl NarrativeGenerator {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    /// Generate one story. The completion is returned as-is.
    pub async fn generate_story(
        &self,
        term: &str,
        root: &str,
        root_meaning: &str,
    ) -> Result<MnemonicStory, GenerationError> {
        let instruction = story_instruction(term, root, root_meaning);
        let text = self.generator.generate(&instruction).await?;
        Ok(MnemonicStory { text })
    }
}
