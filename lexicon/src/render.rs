//! Terminal rendering of pipeline output.

use lexicon_core::{
    ImageReference, PartialResult, PipelineError, PipelineResult, PipelineState, ProviderChoice,
    ValidationError,
};
use std::path::Path;

/// Observer hook: announce each stage as it starts.
pub fn progress(state: &PipelineState) {
    let message = match state {
        PipelineState::GeneratingStory => "Writing mnemonic story...",
        PipelineState::GeneratingImage => "Drawing illustration...",
        PipelineState::Diacritizing => "Adding tashkeel...",
        PipelineState::Synthesizing => "Synthesizing pronunciation...",
        _ => return,
    };
    println!("[WORKING] {message}");
}

pub fn caption(term: &str, provider: ProviderChoice) -> String {
    format!("Generated for {term} via {provider}")
}

/// Lines describing where the illustration can be seen.
pub fn image_lines(
    image: Option<&ImageReference>,
    term: &str,
    provider: ProviderChoice,
) -> Vec<String> {
    match image {
        Some(ImageReference::Url(url)) => vec![url.clone(), caption(term, provider)],
        Some(inline) => vec![
            format!("Inline image received: {inline}"),
            caption(term, provider),
        ],
        None => vec!["No image produced.".to_string()],
    }
}

fn section(title: &str) {
    println!();
    println!("== {title} ==");
}

/// Print a completed run.
pub fn print_result(result: &PipelineResult) {
    section("Mnemonic Story");
    println!("{}", result.story.trim());

    section("Visual Illustration");
    for line in image_lines(result.image.as_ref(), &result.term.term, result.provider) {
        println!("{line}");
    }

    section("Pronunciation (with Tashkeel)");
    println!("{}", result.vocalized.shaped);
    println!("Audio: {}", result.audio.path.display());

    for warning in &result.warnings {
        println!("[ERROR] {warning}");
    }
    println!();
}

/// Lines for whatever a failed run had produced.
pub fn partial_lines(partial: &PartialResult) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(story) = &partial.story {
        lines.push("== Mnemonic Story ==".to_string());
        lines.push(story.trim().to_string());
    }
    if let Some(image) = &partial.image {
        lines.push("== Visual Illustration ==".to_string());
        lines.push(image.to_string());
    }
    if let Some(vocalized) = &partial.vocalized {
        lines.push("== Pronunciation (with Tashkeel) ==".to_string());
        lines.push(vocalized.shaped.clone());
    }
    for warning in &partial.warnings {
        lines.push(format!("[ERROR] {warning}"));
    }
    lines
}

/// The message shown for a failed run.
pub fn failure_message(err: &PipelineError) -> String {
    match err {
        PipelineError::Validation(ValidationError::MissingFields(fields)) => {
            let names: Vec<_> = fields.iter().map(ToString::to_string).collect();
            format!("Fill in all fields! Missing: {}", names.join(", "))
        }
        PipelineError::Validation(other) => other.to_string(),
        PipelineError::Stage { .. } => err.to_string(),
    }
}

/// Print partial output, then the error.
pub fn print_failure(err: &PipelineError) {
    if let Some(partial) = err.partial() {
        for line in partial_lines(partial) {
            println!("{line}");
        }
    }
    println!("[ERROR] {}", failure_message(err));
}

/// Write the illustration to disk: inline payloads are decoded, URLs fetched
/// with `client`.
pub async fn save_image(
    client: &reqwest::Client,
    image: &ImageReference,
    path: &Path,
) -> Result<usize, Box<dyn std::error::Error>> {
    let bytes = match image.decode_inline() {
        Some(decoded) => decoded?,
        None => {
            let response = client.get(image.as_uri()).send().await?.error_for_status()?;
            response.bytes().await?.to_vec()
        }
    };
    tokio::fs::write(path, &bytes).await?;
    Ok(bytes.len())
}
