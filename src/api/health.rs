//! Health check endpoints

use std::sync::Arc;

use axum::{Json, Router, extract::State, http::StatusCode, routing::get};
use serde::Serialize;

use super::ApiState;
use crate::runtime::ModelStatus;
use crate::translation::BackendKind;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Detailed readiness response
#[derive(Serialize)]
pub struct ReadinessResponse {
    pub status: &'static str,
    pub models: Vec<ModelStatus>,
    pub backends: Vec<BackendKind>,
    pub queued_synthesis: usize,
}

/// Liveness probe - is the service running?
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Readiness probe - can a translation be served right now?
///
/// Degraded when the speech model is down and no remote backend is
/// configured to take over.
async fn ready(State(state): State<Arc<ApiState>>) -> (StatusCode, Json<ReadinessResponse>) {
    let runtime = &state.runtime;
    let models = runtime.model_status().await;
    let backends: Vec<BackendKind> = runtime.translator().backends().collect();

    let speech_loaded = models.iter().any(|m| m.kind == crate::engine::ModelKind::Speech && m.loaded);
    let has_remote = backends.iter().any(|b| *b != BackendKind::OnDevice);
    let all_ok = speech_loaded || has_remote;

    let (status, http_status) = if all_ok {
        ("ok", StatusCode::OK)
    } else {
        ("degraded", StatusCode::SERVICE_UNAVAILABLE)
    };

    (
        http_status,
        Json(ReadinessResponse {
            status,
            models,
            backends,
            queued_synthesis: runtime.queue().len(),
        }),
    )
}

/// Health check routes
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready))
        .with_state(state)
}
