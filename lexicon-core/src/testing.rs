//! Testing utilities for the lexicon pipeline.
//!
//! This module provides tools for deterministic tests without network access:
//! - `MockTextGenerator`, `MockImageProvider`, `MockSpeech` scripted backends
//! - `TestHarness` wiring all three into a `Pipeline`
//!
//! Every mock is a cheap handle over shared state, so a clone kept by the
//! test observes the calls made through the copy owned by the pipeline.

use crate::image::{ImageProvider, ImageProviderError, ImageReference, ImageRequest, ProviderChoice};
use crate::llm::{GenerationError, TextGenerator};
use crate::pipeline::Pipeline;
use crate::speech::{AudioArtifact, SpeechSynthesizer, SynthesisError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug, Clone)]
enum Reply {
    Text(String),
    Fail(String),
}

#[derive(Debug, Default)]
struct TextState {
    script: VecDeque<Reply>,
    instructions: Vec<String>,
}

/// A language backend that returns scripted completions in order.
///
/// When the script runs out it answers with a fixed echo of the instruction.
#[derive(Debug, Clone, Default)]
pub struct MockTextGenerator {
    state: Arc<Mutex<TextState>>,
}

impl MockTextGenerator {
    /// Create a mock with scripted completions.
    pub fn new<S: Into<String>>(responses: impl IntoIterator<Item = S>) -> Self {
        let script = responses.into_iter().map(|r| Reply::Text(r.into())).collect();
        Self {
            state: Arc::new(Mutex::new(TextState {
                script,
                instructions: Vec::new(),
            })),
        }
    }

    /// Queue a completion after the existing script.
    pub fn push_response(&self, text: impl Into<String>) -> &Self {
        lock(&self.state).script.push_back(Reply::Text(text.into()));
        self
    }

    /// Queue a failure after the existing script.
    pub fn push_failure(&self, message: impl Into<String>) -> &Self {
        lock(&self.state).script.push_back(Reply::Fail(message.into()));
        self
    }

    /// Make the very next call fail.
    pub fn fail_next(&self, message: impl Into<String>) -> &Self {
        lock(&self.state).script.push_front(Reply::Fail(message.into()));
        self
    }

    /// Number of calls received.
    pub fn call_count(&self) -> usize {
        lock(&self.state).instructions.len()
    }

    /// Every instruction received, in order.
    pub fn instructions(&self) -> Vec<String> {
        lock(&self.state).instructions.clone()
    }
}

#[async_trait]
impl TextGenerator for MockTextGenerator {
    async fn generate(&self, instruction: &str) -> Result<String, GenerationError> {
        let mut state = lock(&self.state);
        state.instructions.push(instruction.to_string());

        match state.script.pop_front() {
            Some(Reply::Text(text)) => Ok(text),
            Some(Reply::Fail(message)) => Err(GenerationError::Other(message)),
            None => Ok(format!("mock completion for: {instruction}")),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// How a mock image provider fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockImageFailure {
    /// Non-2xx response with this status.
    Status(u16),
    /// Transport failure.
    Network(String),
}

impl MockImageFailure {
    fn to_error(&self) -> ImageProviderError {
        match self {
            MockImageFailure::Status(status) => ImageProviderError::Status {
                status: *status,
                body: "mock failure".to_string(),
            },
            MockImageFailure::Network(message) => ImageProviderError::Network(message.clone()),
        }
    }
}

#[derive(Debug)]
struct ImageState {
    outcome: Result<ImageReference, MockImageFailure>,
    degrade_on_status: bool,
    requests: Vec<ImageRequest>,
}

/// An image provider returning a fixed reference or a fixed failure.
#[derive(Debug, Clone)]
pub struct MockImageProvider {
    choice: ProviderChoice,
    state: Arc<Mutex<ImageState>>,
}

impl MockImageProvider {
    /// Return `reference` on every call.
    pub fn returning(choice: ProviderChoice, reference: ImageReference) -> Self {
        Self::with_outcome(choice, Ok(reference))
    }

    /// Fail on every call.
    pub fn failing(choice: ProviderChoice, failure: MockImageFailure) -> Self {
        Self::with_outcome(choice, Err(failure))
    }

    /// A provider shaped like the real one for `choice`: a URL for
    /// DALL-E and Ideogram, an inline PNG for Vertex.
    pub fn for_choice(choice: ProviderChoice) -> Self {
        let reference = match choice {
            ProviderChoice::Dalle => ImageReference::Url("https://images.example.com/dalle.png".into()),
            ProviderChoice::Ideogram => {
                ImageReference::Url("https://images.example.com/ideogram.png".into())
            }
            ProviderChoice::Vertex => ImageReference::inline("image/png", "iVBORw0KGgo="),
        };
        let mock = Self::returning(choice, reference);
        if choice == ProviderChoice::Ideogram {
            mock.set_degrade_on_status(true);
        }
        mock
    }

    fn with_outcome(choice: ProviderChoice, outcome: Result<ImageReference, MockImageFailure>) -> Self {
        Self {
            choice,
            state: Arc::new(Mutex::new(ImageState {
                outcome,
                degrade_on_status: false,
                requests: Vec::new(),
            })),
        }
    }

    /// Treat status failures as degradable, like the Ideogram provider.
    pub fn degrading(self) -> Self {
        self.set_degrade_on_status(true);
        self
    }

    fn set_degrade_on_status(&self, degrade: bool) {
        lock(&self.state).degrade_on_status = degrade;
    }

    /// Switch this provider to fail from now on.
    pub fn fail_with(&self, failure: MockImageFailure) {
        lock(&self.state).outcome = Err(failure);
    }

    /// Requests received, in order.
    pub fn requests(&self) -> Vec<ImageRequest> {
        lock(&self.state).requests.clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.state).requests.len()
    }
}

#[async_trait]
impl ImageProvider for MockImageProvider {
    async fn generate(&self, request: &ImageRequest) -> Result<ImageReference, ImageProviderError> {
        let mut state = lock(&self.state);
        state.requests.push(request.clone());
        state.outcome.clone().map_err(|failure| failure.to_error())
    }

    fn choice(&self) -> ProviderChoice {
        self.choice
    }

    fn degrades_on(&self, error: &ImageProviderError) -> bool {
        lock(&self.state).degrade_on_status && matches!(error, ImageProviderError::Status { .. })
    }
}

#[derive(Debug, Default)]
struct SpeechState {
    fail: Option<u16>,
    calls: Vec<(String, String)>,
}

/// A speech backend that returns an in-memory artifact.
#[derive(Debug, Clone, Default)]
pub struct MockSpeech {
    state: Arc<Mutex<SpeechState>>,
}

impl MockSpeech {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every call with the given status.
    pub fn fail_with_status(&self, status: u16) {
        lock(&self.state).fail = Some(status);
    }

    /// (text, language) pairs received, in order.
    pub fn calls(&self) -> Vec<(String, String)> {
        lock(&self.state).calls.clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.state).calls.len()
    }
}

#[async_trait]
impl SpeechSynthesizer for MockSpeech {
    async fn synthesize(&self, text: &str, language: &str) -> Result<AudioArtifact, SynthesisError> {
        let mut state = lock(&self.state);
        state.calls.push((text.to_string(), language.to_string()));

        if let Some(status) = state.fail {
            return Err(SynthesisError::Status { status });
        }
        Ok(AudioArtifact {
            path: PathBuf::from("mock-audio.mp3"),
            bytes: format!("ID3:{text}").into_bytes(),
        })
    }
}

/// Test harness wiring mocks for every backend into a pipeline.
pub struct TestHarness {
    pub text: MockTextGenerator,
    pub dalle: MockImageProvider,
    pub ideogram: MockImageProvider,
    pub vertex: MockImageProvider,
    pub speech: MockSpeech,
}

impl TestHarness {
    /// All three providers succeed; the text backend echoes until scripted.
    pub fn new() -> Self {
        Self {
            text: MockTextGenerator::default(),
            dalle: MockImageProvider::for_choice(ProviderChoice::Dalle),
            ideogram: MockImageProvider::for_choice(ProviderChoice::Ideogram),
            vertex: MockImageProvider::for_choice(ProviderChoice::Vertex),
            speech: MockSpeech::new(),
        }
    }

    /// Script the story and the diacritized text for the next run.
    pub fn expect_run(&mut self, story: impl Into<String>, voweled: impl Into<String>) -> &mut Self {
        self.text.push_response(story).push_response(voweled);
        self
    }

    /// Build a pipeline over the harness mocks.
    pub fn pipeline(&self) -> Pipeline {
        Pipeline::new(Arc::new(self.text.clone()), Box::new(self.speech.clone()))
            .with_provider(Box::new(self.dalle.clone()))
            .with_provider(Box::new(self.ideogram.clone()))
            .with_provider(Box::new(self.vertex.clone()))
    }

    /// The mock registered for `choice`.
    pub fn provider(&self, choice: ProviderChoice) -> &MockImageProvider {
        match choice {
            ProviderChoice::Dalle => &self.dalle,
            ProviderChoice::Ideogram => &self.ideogram,
            ProviderChoice::Vertex => &self.vertex,
        }
    }

    /// Image calls across every provider.
    pub fn image_calls(&self) -> usize {
        self.dalle.call_count() + self.ideogram.call_count() + self.vertex.call_count()
    }

    /// Calls made to any backend.
    pub fn external_calls(&self) -> usize {
        self.text.call_count() + self.image_calls() + self.speech.call_count()
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
