//! Model lifecycle endpoints

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};

use super::{ApiError, ApiResult, ApiState};
use crate::engine::ModelKind;
use crate::runtime::ModelStatus;

#[derive(Deserialize)]
pub struct LoadModelRequest {
    /// Weights to load
    pub path: PathBuf,
}

#[derive(Serialize)]
pub struct ModelsResponse {
    pub models: Vec<ModelStatus>,
}

fn parse_kind(kind: &str) -> Result<ModelKind, ApiError> {
    match kind {
        "speech" => Ok(ModelKind::Speech),
        "voice" => Ok(ModelKind::Voice),
        other => Err(ApiError::bad_request(
            "unknown_model",
            format!("unknown model kind: {other}"),
        )),
    }
}

async fn list(State(state): State<Arc<ApiState>>) -> ApiResult<ModelsResponse> {
    Ok(Json(ModelsResponse {
        models: state.runtime.model_status().await,
    }))
}

async fn load(
    State(state): State<Arc<ApiState>>,
    Path(kind): Path<String>,
    Json(request): Json<LoadModelRequest>,
) -> ApiResult<ModelsResponse> {
    let kind = parse_kind(&kind)?;
    state.runtime.load_model(kind, &request.path).await?;
    list(State(state)).await
}

async fn unload(
    State(state): State<Arc<ApiState>>,
    Path(kind): Path<String>,
) -> ApiResult<ModelsResponse> {
    let kind = parse_kind(&kind)?;
    state.runtime.unload_model(kind).await?;
    list(State(state)).await
}

/// Model routes, nested under `/api/models`
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/", get(list))
        .route("/{kind}/load", post(load))
        .route("/{kind}/unload", post(unload))
        .with_state(state)
}
