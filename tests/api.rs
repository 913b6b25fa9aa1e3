//! HTTP API integration tests

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use parley::api::ApiServer;
use serde_json::{Value, json};
use tower::ServiceExt;

mod common;
use common::{MockSpeechEngine, MockVoiceEngine, test_runtime, write_sample};

fn test_router(dir: &std::path::Path, speech: MockSpeechEngine) -> Router {
    let runtime = test_runtime(dir, &[], Arc::new(speech), Arc::new(MockVoiceEngine::new()));
    ApiServer::new(Arc::new(runtime), 0).router()
}

async fn call(router: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn test_health() {
    let dir = tempfile::tempdir().unwrap();
    let router = test_router(dir.path(), MockSpeechEngine::new("hola"));

    let (status, body) = call(&router, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_ready_degraded_without_speech_model() {
    let dir = tempfile::tempdir().unwrap();
    let router = test_router(dir.path(), MockSpeechEngine::new("hola").unloaded());

    let (status, body) = call(&router, Method::GET, "/ready", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["backends"], json!(["on_device"]));
}

#[tokio::test]
async fn test_languages() {
    let dir = tempfile::tempdir().unwrap();
    let router = test_router(dir.path(), MockSpeechEngine::new("hola"));

    let (status, body) = call(&router, Method::GET, "/api/languages", None).await;
    assert_eq!(status, StatusCode::OK);
    let languages = body["languages"].as_array().unwrap();
    assert!(languages.iter().any(|l| l["code"] == "es"));
}

#[tokio::test]
async fn test_translate_text_and_history() {
    let dir = tempfile::tempdir().unwrap();
    let router = test_router(dir.path(), MockSpeechEngine::new("hola"));

    let (status, body) = call(
        &router,
        Method::POST,
        "/api/translate",
        Some(json!({ "text": "hello", "source": "en", "target": "es" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"]["translated_text"], "hola");
    assert_eq!(body["result"]["backend"], "on_device");
    assert!(body.get("audio").is_none());

    let (_, history) = call(&router, Method::GET, "/api/translations", None).await;
    assert_eq!(history["total"], 1);

    let (status, _) = call(&router, Method::DELETE, "/api/translations", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, history) = call(&router, Method::GET, "/api/translations", None).await;
    assert_eq!(history["total"], 0);
}

#[tokio::test]
async fn test_translate_requires_one_input() {
    let dir = tempfile::tempdir().unwrap();
    let router = test_router(dir.path(), MockSpeechEngine::new("hola"));

    let (status, body) = call(
        &router,
        Method::POST,
        "/api/translate",
        Some(json!({ "target": "es" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "invalid_input");
}

#[tokio::test]
async fn test_translate_unavailable_error_body() {
    let dir = tempfile::tempdir().unwrap();
    let router = test_router(dir.path(), MockSpeechEngine::new("hola").unloaded());

    let (status, body) = call(
        &router,
        Method::POST,
        "/api/translate",
        Some(json!({ "text": "hello", "source": "en", "target": "es" })),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"]["code"], "translation_unavailable");
    assert!(body["error"]["message"].as_str().unwrap().contains("on_device"));
}

#[tokio::test]
async fn test_profile_crud() {
    let dir = tempfile::tempdir().unwrap();
    let router = test_router(dir.path(), MockSpeechEngine::new("hola"));
    let sample = write_sample(dir.path(), "voice.wav");

    let (status, created) = call(
        &router,
        Method::POST,
        "/api/profiles",
        Some(json!({ "name": "Ada", "samples": [sample], "language": "es" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(created["name"], "Ada");
    assert_eq!(created["language"], "es");
    assert_eq!(created["samples"], 1);
    assert!(created.get("embedding").is_none());
    let id = created["id"].as_str().unwrap().to_string();

    let (status, activated) =
        call(&router, Method::POST, &format!("/api/profiles/{id}/activate"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(activated["active"], true);

    let (status, renamed) = call(
        &router,
        Method::PATCH,
        &format!("/api/profiles/{id}"),
        Some(json!({ "name": "Ada L." })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(renamed["name"], "Ada L.");

    let (_, list) = call(&router, Method::GET, "/api/profiles", None).await;
    assert_eq!(list["total"], 1);

    let (status, spoken) = call(
        &router,
        Method::POST,
        &format!("/api/profiles/{id}/speak"),
        Some(json!({ "text": "hola" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(!spoken["audio"].as_str().unwrap().is_empty());

    let (_, deleted) = call(&router, Method::DELETE, &format!("/api/profiles/{id}"), None).await;
    assert_eq!(deleted["deleted"], true);
    let (_, deleted) = call(&router, Method::DELETE, &format!("/api/profiles/{id}"), None).await;
    assert_eq!(deleted["deleted"], false);
}

#[tokio::test]
async fn test_missing_profile_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let router = test_router(dir.path(), MockSpeechEngine::new("hola"));

    let (status, body) = call(&router, Method::GET, "/api/profiles/nope", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "profile_not_found");
}

#[tokio::test]
async fn test_unknown_model_kind() {
    let dir = tempfile::tempdir().unwrap();
    let router = test_router(dir.path(), MockSpeechEngine::new("hola"));

    let (status, body) = call(&router, Method::POST, "/api/models/vision/unload", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "unknown_model");

    let (status, body) = call(&router, Method::POST, "/api/models/speech/unload", None).await;
    assert_eq!(status, StatusCode::OK);
    let speech = body["models"]
        .as_array()
        .unwrap()
        .iter()
        .find(|m| m["kind"] == "speech")
        .unwrap()
        .clone();
    assert_eq!(speech["loaded"], false);
}
