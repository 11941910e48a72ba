//! Pipeline flow tests against mock and loopback backends.
//!
//! No API keys or internet access needed. Real adapters are exercised
//! against a one-shot HTTP server on 127.0.0.1.

use lexicon_core::diacritize::shaping::shape_for_display;
use lexicon_core::image::{DalleProvider, IdeogramProvider, VertexProvider};
use lexicon_core::speech::GoogleTts;
use lexicon_core::testing::{MockImageFailure, MockImageProvider, MockSpeech, MockTextGenerator};
use lexicon_core::{
    registry, Field, ImageReference, Pipeline, PipelineError, PipelineState, ProviderChoice,
    SpeechSynthesizer, Stage, StageFailure, TermEntry, TestHarness, ValidationError,
};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;

const STORY: &str = "A weary knight named Tawheen drags a fading torch down a glass tunnel.";
const VOWELED: &str = "تَوْهِين";

fn attenuation() -> TermEntry {
    registry::lookup("Attenuation").unwrap()
}

// =============================================================================
// LOOPBACK SERVER
// =============================================================================

/// Serve exactly one HTTP response; the raw request is sent on the channel.
async fn serve_once(
    status_line: &'static str,
    content_type: &'static str,
    body: Vec<u8>,
) -> (String, oneshot::Receiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let request = read_request(&mut socket).await;
        let head = format!(
            "HTTP/1.1 {status_line}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            body.len()
        );
        socket.write_all(head.as_bytes()).await.unwrap();
        socket.write_all(&body).await.unwrap();
        let _ = socket.shutdown().await;
        let _ = tx.send(request);
    });

    (format!("http://{addr}"), rx)
}

async fn read_request(socket: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    loop {
        let n = socket.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);

        let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
            continue;
        };
        let head = String::from_utf8_lossy(&buf[..end]).to_string();
        let content_length = head
            .lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
            .and_then(|(_, value)| value.trim().parse::<usize>().ok())
            .unwrap_or(0);

        while buf.len() < end + 4 + content_length {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
        }
        break;
    }

    String::from_utf8_lossy(&buf).to_string()
}

/// Loopback requests must not be routed through an ambient proxy.
fn local_client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

fn recording_observer(pipeline: Pipeline) -> (Pipeline, Arc<Mutex<Vec<PipelineState>>>) {
    let states = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&states);
    let pipeline = pipeline.with_observer(move |state| sink.lock().unwrap().push(state.clone()));
    (pipeline, states)
}

// =============================================================================
// HAPPY PATH
// =============================================================================

#[tokio::test]
async fn test_attenuation_with_dalle() {
    let mut harness = TestHarness::new();
    harness.expect_run(STORY, VOWELED);

    let result = harness
        .pipeline()
        .run(&attenuation(), ProviderChoice::Dalle)
        .await
        .expect("pipeline should complete");

    assert!(!result.story.is_empty());
    let image = result.image.expect("DALL-E should produce an image");
    assert!(image.as_uri().starts_with("http"));
    assert!(!result.vocalized.shaped.is_empty());
    assert_eq!(result.vocalized.shaped, shape_for_display(VOWELED));
    assert!(!result.audio.bytes.is_empty());
    assert!(result.warnings.is_empty());
    assert_eq!(harness.speech.call_count(), 1);
}

#[tokio::test]
async fn test_exactly_one_call_per_stage() {
    for choice in ProviderChoice::ALL {
        let mut harness = TestHarness::new();
        harness.expect_run(STORY, VOWELED);

        harness.pipeline().run(&attenuation(), choice).await.unwrap();

        let instructions = harness.text.instructions();
        assert_eq!(instructions.len(), 2, "one story call and one tashkeel call");
        assert!(instructions[0].contains("T-W-H-N"));
        assert!(instructions[0].contains("Attenuation"));
        assert!(instructions[1].contains("توهين"));
        assert_eq!(harness.image_calls(), 1);
        assert_eq!(harness.provider(choice).call_count(), 1);
        assert_eq!(harness.speech.call_count(), 1);
    }
}

#[tokio::test]
async fn test_story_feeds_image_request() {
    let mut harness = TestHarness::new();
    harness.expect_run(STORY, VOWELED);

    harness
        .pipeline()
        .run(&attenuation(), ProviderChoice::Ideogram)
        .await
        .unwrap();

    let requests = harness.ideogram.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].story, STORY);
    assert_eq!(requests[0].root, "T-W-H-N");
    assert_eq!(requests[0].term, "Attenuation");
}

#[tokio::test]
async fn test_speech_gets_unshaped_text() {
    let mut harness = TestHarness::new();
    harness.expect_run(STORY, VOWELED);

    let result = harness
        .pipeline()
        .with_language("ar")
        .run(&attenuation(), ProviderChoice::Dalle)
        .await
        .unwrap();

    assert_eq!(
        harness.speech.calls(),
        vec![(VOWELED.to_string(), "ar".to_string())]
    );
    assert_eq!(result.vocalized.text, VOWELED);
    assert_ne!(result.vocalized.text, result.vocalized.shaped);
}

#[tokio::test]
async fn test_provider_substitution_changes_only_image() {
    let mut results = Vec::new();
    for choice in ProviderChoice::ALL {
        let mut harness = TestHarness::new();
        harness.expect_run(STORY, VOWELED);
        let result = harness.pipeline().run(&attenuation(), choice).await.unwrap();
        results.push((harness.provider(choice).requests(), result));
    }

    let (first_requests, first) = &results[0];
    for (requests, result) in &results[1..] {
        assert_eq!(requests, first_requests);
        assert_eq!(result.story, first.story);
        assert_eq!(result.vocalized, first.vocalized);
        assert_eq!(result.audio, first.audio);
    }

    assert!(!results[0].1.image.as_ref().unwrap().is_inline());
    assert!(!results[1].1.image.as_ref().unwrap().is_inline());
    assert!(results[2].1.image.as_ref().unwrap().is_inline());
}

#[tokio::test]
async fn test_state_transitions_in_order() {
    let mut harness = TestHarness::new();
    harness.expect_run(STORY, VOWELED);
    let (pipeline, states) = recording_observer(harness.pipeline());

    pipeline.run(&attenuation(), ProviderChoice::Vertex).await.unwrap();

    assert_eq!(
        *states.lock().unwrap(),
        vec![
            PipelineState::Idle,
            PipelineState::AwaitingInput,
            PipelineState::GeneratingStory,
            PipelineState::GeneratingImage,
            PipelineState::Diacritizing,
            PipelineState::Synthesizing,
            PipelineState::Complete,
        ]
    );
}

// =============================================================================
// VALIDATION
// =============================================================================

#[tokio::test]
async fn test_missing_fields_make_no_calls() {
    let blanks = [
        (TermEntry::new("", "T-W-H-N", "To weaken", "توهين"), Field::Term),
        (TermEntry::new("Attenuation", " ", "To weaken", "توهين"), Field::Root),
        (TermEntry::new("Attenuation", "T-W-H-N", "", "توهين"), Field::RootMeaning),
        (TermEntry::new("Attenuation", "T-W-H-N", "To weaken", ""), Field::Arabic),
    ];

    for (entry, field) in blanks {
        let harness = TestHarness::new();
        let err = harness
            .pipeline()
            .run(&entry, ProviderChoice::Dalle)
            .await
            .unwrap_err();

        match err {
            PipelineError::Validation(ValidationError::MissingFields(fields)) => {
                assert_eq!(fields, vec![field]);
            }
            other => panic!("expected validation error, got {other:?}"),
        }
        assert_eq!(harness.external_calls(), 0);
    }
}

#[tokio::test]
async fn test_custom_term_without_meaning() {
    let harness = TestHarness::new();
    let custom = TermEntry::new("Connector", "W-S-L", "", "موصل");

    let err = harness
        .pipeline()
        .run(&custom, ProviderChoice::Ideogram)
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Validation(_)));
    assert!(err.stage().is_none());
    assert_eq!(harness.external_calls(), 0);
}

#[tokio::test]
async fn test_unconfigured_provider_fails_fast() {
    let text = MockTextGenerator::default();
    let speech = MockSpeech::new();
    let pipeline = Pipeline::new(Arc::new(text.clone()), Box::new(speech.clone()))
        .with_provider(Box::new(MockImageProvider::for_choice(ProviderChoice::Dalle)));

    let err = pipeline
        .run(&attenuation(), ProviderChoice::Vertex)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Validation(ValidationError::ProviderNotConfigured(_))
    ));
    assert_eq!(text.call_count(), 0);
    assert_eq!(speech.call_count(), 0);
}

// =============================================================================
// FAILURES
// =============================================================================

#[tokio::test]
async fn test_ideogram_500_degrades_and_continues() {
    let mut harness = TestHarness::new();
    harness.expect_run(STORY, VOWELED);
    harness.ideogram.fail_with(MockImageFailure::Status(500));

    let result = harness
        .pipeline()
        .run(&attenuation(), ProviderChoice::Ideogram)
        .await
        .expect("a degraded image must not abort the run");

    assert_eq!(result.story, STORY);
    assert!(result.image.is_none());
    assert_eq!(result.warnings.len(), 1);
    assert_eq!(result.warnings[0].stage, Stage::Image);
    assert!(result.warnings[0].message.contains("Ideogram"));
    assert_eq!(result.vocalized.text, VOWELED);
    assert_eq!(harness.speech.call_count(), 1);
}

#[tokio::test]
async fn test_dalle_failure_is_fatal_and_keeps_story() {
    let mut harness = TestHarness::new();
    harness.expect_run(STORY, VOWELED);
    harness.dalle.fail_with(MockImageFailure::Status(500));

    let err = harness
        .pipeline()
        .run(&attenuation(), ProviderChoice::Dalle)
        .await
        .unwrap_err();

    assert_eq!(err.stage(), Some(Stage::Image));
    let partial = err.partial().unwrap();
    assert_eq!(partial.story.as_deref(), Some(STORY));
    assert!(partial.image.is_none());
    assert!(partial.vocalized.is_none());
    assert_eq!(harness.text.call_count(), 1);
    assert_eq!(harness.speech.call_count(), 0);
}

#[tokio::test]
async fn test_ideogram_network_failure_is_fatal() {
    let mut harness = TestHarness::new();
    harness.expect_run(STORY, VOWELED);
    harness
        .ideogram
        .fail_with(MockImageFailure::Network("connection reset".into()));

    let err = harness
        .pipeline()
        .run(&attenuation(), ProviderChoice::Ideogram)
        .await
        .unwrap_err();

    assert_eq!(err.stage(), Some(Stage::Image));
}

#[tokio::test]
async fn test_story_failure_stops_everything() {
    let harness = TestHarness::new();
    harness.text.fail_next("503 Service Unavailable");
    let (pipeline, states) = recording_observer(harness.pipeline());

    let err = pipeline
        .run(&attenuation(), ProviderChoice::Dalle)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Stage {
            stage: Stage::Story,
            source: StageFailure::Generation(_),
            ..
        }
    ));
    assert_eq!(err.partial().unwrap().story, None);
    assert_eq!(harness.image_calls(), 0);
    assert_eq!(harness.speech.call_count(), 0);
    assert!(matches!(
        states.lock().unwrap().last(),
        Some(PipelineState::Failed {
            stage: Stage::Story,
            ..
        })
    ));
}

#[tokio::test]
async fn test_diacritization_failure_keeps_story_and_image() {
    let harness = TestHarness::new();
    harness.text.push_response(STORY).push_failure("model overloaded");

    let err = harness
        .pipeline()
        .run(&attenuation(), ProviderChoice::Vertex)
        .await
        .unwrap_err();

    assert_eq!(err.stage(), Some(Stage::Diacritization));
    let partial = err.partial().unwrap();
    assert_eq!(partial.story.as_deref(), Some(STORY));
    assert!(partial.image.as_ref().unwrap().is_inline());
    assert!(partial.vocalized.is_none());
    assert_eq!(harness.speech.call_count(), 0);
}

#[tokio::test]
async fn test_synthesis_failure_keeps_vocalized_text() {
    let mut harness = TestHarness::new();
    harness.expect_run(STORY, VOWELED);
    harness.speech.fail_with_status(503);

    let err = harness
        .pipeline()
        .run(&attenuation(), ProviderChoice::Dalle)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Stage {
            stage: Stage::Synthesis,
            source: StageFailure::Synthesis(_),
            ..
        }
    ));
    let partial = err.partial().unwrap();
    assert_eq!(partial.vocalized.as_ref().unwrap().text, VOWELED);
    assert!(partial.image.is_some());
}

#[tokio::test]
async fn test_next_run_starts_clean_after_failure() {
    let harness = TestHarness::new();
    harness.text.fail_next("timeout");
    let pipeline = harness.pipeline();

    assert!(pipeline.run(&attenuation(), ProviderChoice::Dalle).await.is_err());

    harness.text.push_response(STORY).push_response(VOWELED);
    let result = pipeline
        .run(&attenuation(), ProviderChoice::Dalle)
        .await
        .unwrap();
    assert_eq!(result.story, STORY);
    assert!(result.warnings.is_empty());
}

// =============================================================================
// REAL ADAPTERS ON LOOPBACK
// =============================================================================

#[tokio::test]
async fn test_real_ideogram_500_degrades() {
    let (url, request) = serve_once(
        "500 Internal Server Error",
        "application/json",
        br#"{"error": "internal"}"#.to_vec(),
    )
    .await;

    let text = MockTextGenerator::new(vec![STORY, VOWELED]);
    let speech = MockSpeech::new();
    let ideogram = IdeogramProvider::new(local_client(), "ideo-key", "ideogram-3.0", "AUTO")
        .with_endpoint(url);
    let pipeline = Pipeline::new(Arc::new(text), Box::new(speech.clone())).with_provider(Box::new(ideogram));

    let result = pipeline
        .run(&attenuation(), ProviderChoice::Ideogram)
        .await
        .unwrap();

    assert!(result.image.is_none());
    assert_eq!(result.warnings[0].stage, Stage::Image);
    assert_eq!(speech.call_count(), 1);

    let raw = request.await.unwrap();
    assert!(raw.starts_with("POST "));
    assert!(raw.to_ascii_lowercase().contains("authorization: bearer ideo-key"));
    assert!(raw.contains(r#""style":"AUTO""#));
}

#[tokio::test]
async fn test_real_ideogram_success() {
    let (url, _request) = serve_once(
        "200 OK",
        "application/json",
        br#"{"created": "now", "data": [{"url": "https://ideogram.example/img.png"}]}"#.to_vec(),
    )
    .await;

    let text = MockTextGenerator::new(vec![STORY, VOWELED]);
    let ideogram = IdeogramProvider::new(local_client(), "k", "ideogram-3.0", "AUTO")
        .with_endpoint(url);
    let pipeline = Pipeline::new(Arc::new(text), Box::new(MockSpeech::new())).with_provider(Box::new(ideogram));

    let result = pipeline
        .run(&attenuation(), ProviderChoice::Ideogram)
        .await
        .unwrap();
    assert_eq!(
        result.image,
        Some(ImageReference::Url("https://ideogram.example/img.png".into()))
    );
}

#[tokio::test]
async fn test_real_dalle_500_is_fatal() {
    let (url, _request) = serve_once(
        "500 Internal Server Error",
        "application/json",
        br#"{"error": {"message": "boom"}}"#.to_vec(),
    )
    .await;

    let client = openai::OpenAi::new("sk-test")
        .with_http_client(local_client())
        .with_base_url(url);
    let dalle = DalleProvider::new(client, "dall-e-3", "1024x1024");
    let text = MockTextGenerator::new(vec![STORY, VOWELED]);
    let pipeline = Pipeline::new(Arc::new(text), Box::new(MockSpeech::new())).with_provider(Box::new(dalle));

    let err = pipeline
        .run(&attenuation(), ProviderChoice::Dalle)
        .await
        .unwrap_err();
    assert_eq!(err.stage(), Some(Stage::Image));
    assert_eq!(err.partial().unwrap().story.as_deref(), Some(STORY));
}

#[tokio::test]
async fn test_real_dalle_returns_url() {
    let (url, request) = serve_once(
        "200 OK",
        "application/json",
        br#"{"created": 1, "data": [{"url": "https://oaidalle.example/1.png"}]}"#.to_vec(),
    )
    .await;

    let client = openai::OpenAi::new("sk-test")
        .with_http_client(local_client())
        .with_base_url(url);
    let dalle = DalleProvider::new(client, "dall-e-3", "1024x1024");
    let text = MockTextGenerator::new(vec![STORY, VOWELED]);
    let pipeline = Pipeline::new(Arc::new(text), Box::new(MockSpeech::new())).with_provider(Box::new(dalle));

    let result = pipeline.run(&attenuation(), ProviderChoice::Dalle).await.unwrap();
    assert_eq!(
        result.image,
        Some(ImageReference::Url("https://oaidalle.example/1.png".into()))
    );

    let raw = request.await.unwrap();
    assert!(raw.starts_with("POST /images/generations"));
    assert!(raw.contains(r#""n":1"#));
    assert!(raw.contains(r#""size":"1024x1024""#));
}

#[tokio::test]
async fn test_real_vertex_returns_inline_payload() {
    let (url, request) = serve_once(
        "200 OK",
        "application/json",
        br#"{"predictions": [{"bytesBase64Encoded": "aGVsbG8=", "mimeType": "image/png"}]}"#.to_vec(),
    )
    .await;

    let vertex = VertexProvider::new(local_client(), "ya29", "colossus", "us-central1", "imagen")
        .with_endpoint(url);
    let text = MockTextGenerator::new(vec![STORY, VOWELED]);
    let pipeline = Pipeline::new(Arc::new(text), Box::new(MockSpeech::new())).with_provider(Box::new(vertex));

    let result = pipeline.run(&attenuation(), ProviderChoice::Vertex).await.unwrap();
    let image = result.image.unwrap();
    assert_eq!(image.as_uri(), "data:image/png;base64,aGVsbG8=");
    assert_eq!(image.decode_inline().unwrap().unwrap(), b"hello");

    let raw = request.await.unwrap();
    assert!(raw.contains(r#""aspectRatio":"1:1""#));
    assert!(raw.contains(r#""sampleCount":1"#));
}

#[tokio::test]
async fn test_google_tts_overwrites_single_slot() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = temp_dir.path().join("audio.mp3");

    for payload in [b"ID3-first-take".to_vec(), b"ID3-2".to_vec()] {
        let (url, request) = serve_once("200 OK", "audio/mpeg", payload.clone()).await;
        let tts = GoogleTts::new(local_client(), &path).with_endpoint(url);

        let audio = tts.synthesize(VOWELED, "ar").await.unwrap();
        assert_eq!(audio.path, path);
        assert_eq!(audio.bytes, payload);
        assert_eq!(tokio::fs::read(&path).await.unwrap(), payload);

        let raw = request.await.unwrap();
        assert!(raw.starts_with("GET /?"));
        assert!(raw.contains("tl=ar"));
        assert!(raw.contains("client=tw-ob"));
    }
}

#[tokio::test]
async fn test_google_tts_error_status() {
    let (url, _request) = serve_once("429 Too Many Requests", "text/plain", b"slow down".to_vec()).await;
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = temp_dir.path().join("audio.mp3");
    let tts = GoogleTts::new(local_client(), &path).with_endpoint(url);

    let err = tts.synthesize(VOWELED, "ar").await.unwrap_err();
    assert_eq!(err.to_string(), "speech backend returned status 429");
    assert!(!path.exists());
}
