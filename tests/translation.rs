//! Translation chain integration tests
//!
//! Remote translation APIs are played by in-process axum servers.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::{Json, Router, extract::State, http::StatusCode, routing::post};
use parley::Error;
use parley::translation::{
    BackendKind, GoogleBackend, LibreTranslateBackend, OutputMode, PRIMARY_CONFIDENCE,
    TranslationBackend, TranslationInput, Translator, TranslatorSettings,
};
use secrecy::SecretString;
use serde_json::{Value, json};

mod common;
use common::{
    MockSpeechEngine, MockVoiceEngine, spawn_server, spawn_silent_server, test_config,
    test_runtime, tone,
};

type Requests = Arc<Mutex<Vec<Value>>>;

/// A LibreTranslate stand-in that always answers `reply`
async fn mock_libretranslate(reply: &'static str) -> (url::Url, Requests) {
    let requests: Requests = Arc::default();
    let router = Router::new()
        .route(
            "/translate",
            post(
                move |State(seen): State<Requests>, Json(body): Json<Value>| async move {
                    seen.lock().unwrap().push(body);
                    Json(json!({ "translatedText": reply }))
                },
            ),
        )
        .with_state(Arc::clone(&requests));
    (spawn_server(router).await, requests)
}

fn text(s: &str) -> TranslationInput {
    TranslationInput::Text(s.to_string())
}

#[tokio::test]
async fn test_fallback_when_primary_unready() {
    let dir = tempfile::tempdir().unwrap();
    let (url, requests) = mock_libretranslate("hola").await;
    let runtime = test_runtime(
        dir.path(),
        &[("LIBRETRANSLATE_URL", url.as_str())],
        Arc::new(MockSpeechEngine::new("unused").unloaded()),
        Arc::new(MockVoiceEngine::new()),
    );

    let translation = runtime
        .translator()
        .translate(&text("hello"), "en", "es", OutputMode::Text)
        .await
        .unwrap();

    let result = translation.result;
    assert_eq!(result.translated_text, "hola");
    assert_eq!(result.original_text, "hello");
    assert_eq!(result.source_language, "en");
    assert_eq!(result.target_language, "es");
    assert_eq!(result.backend, BackendKind::LibreTranslate);
    assert!(result.confidence < PRIMARY_CONFIDENCE);
    assert!(translation.audio.is_none());

    let requests = requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0]["q"], "hello");
    assert_eq!(requests[0]["source"], "en");
    assert_eq!(requests[0]["target"], "es");
}

#[tokio::test]
async fn test_primary_preferred_when_ready() {
    let dir = tempfile::tempdir().unwrap();
    let (url, requests) = mock_libretranslate("hola").await;
    let speech = Arc::new(MockSpeechEngine::new("hola desde el modelo"));
    let runtime = test_runtime(
        dir.path(),
        &[("LIBRETRANSLATE_URL", url.as_str())],
        Arc::clone(&speech),
        Arc::new(MockVoiceEngine::new()),
    );

    let result = runtime
        .translator()
        .translate(&text("hello"), "en", "es", OutputMode::Text)
        .await
        .unwrap()
        .result;

    assert_eq!(result.backend, BackendKind::OnDevice);
    assert_eq!(result.translated_text, "hola desde el modelo");
    assert!((result.confidence - 0.95).abs() < f32::EPSILON);
    assert!(requests.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_speech_output_from_primary() {
    let dir = tempfile::tempdir().unwrap();
    let runtime = test_runtime(
        dir.path(),
        &[],
        Arc::new(MockSpeechEngine::new("hola")),
        Arc::new(MockVoiceEngine::new()),
    );

    let translation = runtime
        .translator()
        .translate(&TranslationInput::Audio(tone(0.5)), "en", "es", OutputMode::Speech)
        .await
        .unwrap();

    assert_eq!(translation.result.original_text, "hello");
    assert!(translation.audio.is_some_and(|a| !a.is_empty()));
}

#[tokio::test]
async fn test_auto_detects_spoken_language() {
    let dir = tempfile::tempdir().unwrap();
    let runtime = test_runtime(
        dir.path(),
        &[],
        Arc::new(MockSpeechEngine::new("hola")),
        Arc::new(MockVoiceEngine::new()),
    );

    let result = runtime
        .translator()
        .translate(&TranslationInput::Audio(tone(0.5)), "auto", "es", OutputMode::Text)
        .await
        .unwrap()
        .result;

    // Model reports ISO 639-3, the app speaks ISO 639-1
    assert_eq!(result.source_language, "en");
}

#[tokio::test]
async fn test_auto_detection_assumes_english_by_default() {
    let dir = tempfile::tempdir().unwrap();
    let runtime = test_runtime(
        dir.path(),
        &[],
        Arc::new(MockSpeechEngine::new("hola")),
        Arc::new(MockVoiceEngine::new()),
    );
    let result = runtime
        .translator()
        .translate(&text("hello"), "auto", "es", OutputMode::Text)
        .await
        .unwrap()
        .result;
    assert_eq!(result.source_language, "en");

    // No detector at all: the chain still runs instead of failing detection
    let dir = tempfile::tempdir().unwrap();
    let runtime = test_runtime(
        dir.path(),
        &[],
        Arc::new(MockSpeechEngine::new("hola").unloaded()),
        Arc::new(MockVoiceEngine::new()),
    );
    let err = runtime
        .translator()
        .translate(&TranslationInput::Audio(tone(0.5)), "auto", "es", OutputMode::Text)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::TranslationUnavailable(_)));
}

#[tokio::test]
async fn test_strict_detection_is_opt_in() {
    let dir = tempfile::tempdir().unwrap();
    let runtime = test_runtime(
        dir.path(),
        &[("PARLEY_DETECTION_FALLBACK", "strict")],
        Arc::new(MockSpeechEngine::new("hola")),
        Arc::new(MockVoiceEngine::new()),
    );

    let err = runtime
        .translator()
        .translate(&text("hello"), "auto", "es", OutputMode::Text)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::LanguageDetection(_)));
}

#[tokio::test]
async fn test_every_backend_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let runtime = test_runtime(
        dir.path(),
        &[],
        Arc::new(MockSpeechEngine::new("hola").unloaded()),
        Arc::new(MockVoiceEngine::new()),
    );

    let err = runtime
        .translator()
        .translate(&text("hello"), "en", "es", OutputMode::Text)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::TranslationUnavailable(msg) if msg.contains("on_device")));
    assert!(runtime.translator().history().is_empty());
}

#[tokio::test]
async fn test_failing_remote_moves_to_next() {
    let broken = Router::new().route(
        "/translate",
        post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
    );
    let broken_url = spawn_server(broken).await;

    let google = Router::new().route(
        "/v2",
        post(|| async {
            Json(json!({ "data": { "translations": [ { "translatedText": "bonjour" } ] } }))
        }),
    );
    let google_url = spawn_server(google).await.join("v2").unwrap();

    let translator = Translator::new(TranslatorSettings::default())
        .with_backend(TranslationBackend::LibreTranslate(
            LibreTranslateBackend::new(&broken_url, None, Duration::from_secs(5)).unwrap(),
        ))
        .with_backend(TranslationBackend::Google(
            GoogleBackend::with_endpoint(
                google_url,
                SecretString::from("test-key"),
                Duration::from_secs(5),
            )
            .unwrap(),
        ));

    let result = translator
        .translate(&text("hello"), "en", "fr", OutputMode::Text)
        .await
        .unwrap()
        .result;

    assert_eq!(result.translated_text, "bonjour");
    assert_eq!(result.backend, BackendKind::Google);
    assert!(result.confidence < PRIMARY_CONFIDENCE);
}

#[tokio::test]
async fn test_history_is_newest_first() {
    let dir = tempfile::tempdir().unwrap();
    let runtime = test_runtime(
        dir.path(),
        &[],
        Arc::new(MockSpeechEngine::new("hola")),
        Arc::new(MockVoiceEngine::new()),
    );
    let translator = runtime.translator();

    for word in ["one", "two", "three"] {
        translator
            .translate(&text(word), "en", "es", OutputMode::Text)
            .await
            .unwrap();
    }

    let history = translator.history();
    let originals: Vec<&str> = history.iter().map(|r| r.original_text.as_str()).collect();
    assert_eq!(originals, ["three", "two", "one"]);

    translator.clear_history();
    assert!(translator.history().is_empty());
}

#[tokio::test]
async fn test_unresponsive_sidecar_cannot_stall_translation() {
    let dir = tempfile::tempdir().unwrap();
    let silent = spawn_silent_server().await;
    let config = test_config(
        dir.path(),
        &[
            ("PARLEY_SIDECAR_URL", silent.as_str()),
            ("PARLEY_TIMEOUT_MS", "200"),
        ],
    );
    let runtime = parley::Runtime::build(config).unwrap();

    let started = Instant::now();
    let outcome = tokio::time::timeout(
        Duration::from_secs(3),
        runtime
            .translator()
            .translate(&text("hello"), "en", "es", OutputMode::Text),
    )
    .await
    .expect("translation never returned");

    assert!(matches!(outcome, Err(Error::TranslationUnavailable(_))));
    assert!(started.elapsed() < Duration::from_secs(2));
}
