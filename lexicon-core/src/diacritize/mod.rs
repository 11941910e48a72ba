//! Tashkeel restoration.
//!
//! A language backend adds the vowel marks; the result is then shaped for
//! display. Both forms are returned because they have different consumers:
//! speech synthesis needs the logical text, screens need the shaped one.

pub mod shaping;

use crate::llm::{GenerationError, TextGenerator};
use std::sync::Arc;

/// Diacritized Arabic in logical and display order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VocalizedText {
    /// Diacritized text in logical order. Feed this to speech synthesis.
    pub text: String,
    /// Presentation-form, visually ordered text. Display only.
    pub shaped: String,
}

impl VocalizedText {
    /// Wrap diacritized text, computing its display form.
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let shaped = shaping::shape_for_display(&text);
        Self { text, shaped }
    }
}

/// Instruction asking the backend to add tashkeel.
pub fn tashkeel_instruction(arabic_text: &str) -> String {
    format!("Add accurate Tashkeel (diacritics) to this Arabic text for pronunciation: {arabic_text}")
}

/// Restores vowel marks through a language backend.
pub struct Diacritizer {
    generator: Arc<dyn TextGenerator>,
}

impl Diacritizer {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    /// Diacritize plain Arabic text.
    ///
    /// The raw completion is taken as the diacritized text. Failures are
    /// returned as-is; there is no fallback to the unvowelled input.
    pub async fn diacritize(&self, plain_arabic: &str) -> Result<VocalizedText, GenerationError> {
        let voweled = self
            .generator
            .generate(&tashkeel_instruction(plain_arabic))
            .await?;
        Ok(VocalizedText::new(voweled))
    }
}
