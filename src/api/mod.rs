//! HTTP control API for parley

pub mod health;
pub mod models;
pub mod profiles;
pub mod translate;

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::runtime::Runtime;
use crate::{Error, Result};

/// Shared state for API handlers
pub struct ApiState {
    pub runtime: Arc<Runtime>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

/// Error returned by handlers, rendered as `{ "error": { code, message } }`
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorResponse,
}

impl ApiError {
    /// A client error with an explicit code
    pub fn bad_request(code: &str, message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            body: ErrorResponse {
                error: ErrorDetail {
                    code: code.to_string(),
                    message: message.into(),
                },
            },
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        let (status, code) = match &error {
            Error::BackendNotReady(_) => (StatusCode::SERVICE_UNAVAILABLE, "backend_not_ready"),
            Error::ModelNotFound(_) => (StatusCode::NOT_FOUND, "model_not_found"),
            Error::ModelLoadFailed(_) => (StatusCode::INTERNAL_SERVER_ERROR, "model_load_failed"),
            Error::AudioLoadFailed(_) => (StatusCode::BAD_REQUEST, "audio_load_failed"),
            Error::EmbeddingExtractionFailed(_) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "embedding_extraction_failed")
            }
            Error::MalformedEmbedding(_) => (StatusCode::UNPROCESSABLE_ENTITY, "malformed_embedding"),
            Error::ProfileNotFound(_) => (StatusCode::NOT_FOUND, "profile_not_found"),
            Error::SynthesisFailed(_) => (StatusCode::BAD_GATEWAY, "synthesis_failed"),
            Error::TranslationUnavailable(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, "translation_unavailable")
            }
            Error::LanguageDetection(_) => (StatusCode::UNPROCESSABLE_ENTITY, "language_detection"),
            Error::Cancelled => (StatusCode::CONFLICT, "cancelled"),
            Error::QueueFull { .. } => (StatusCode::TOO_MANY_REQUESTS, "queue_full"),
            Error::Timeout { .. } => (StatusCode::GATEWAY_TIMEOUT, "timeout"),
            Error::InvalidState(_) => (StatusCode::CONFLICT, "invalid_state"),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        };

        if status.is_server_error() {
            tracing::warn!(code, error = %error, "request failed");
        }

        Self {
            status,
            body: ErrorResponse {
                error: ErrorDetail {
                    code: code.to_string(),
                    message: error.to_string(),
                },
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

/// Handler result
pub type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

/// HTTP API server
pub struct ApiServer {
    state: Arc<ApiState>,
    port: u16,
}

impl ApiServer {
    #[must_use]
    pub fn new(runtime: Arc<Runtime>, port: u16) -> Self {
        Self {
            state: Arc::new(ApiState { runtime }),
            port,
        }
    }

    /// Build the router with all routes
    pub fn router(&self) -> Router {
        let router = Router::new()
            .nest("/api/profiles", profiles::router(Arc::clone(&self.state)))
            .nest("/api/models", models::router(Arc::clone(&self.state)))
            .merge(translate::router(Arc::clone(&self.state)))
            .merge(health::router(Arc::clone(&self.state)));

        // CORS layer for cross-origin requests from frontend
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        router.layer(cors).layer(TraceLayer::new_for_http())
    }

    /// Run the API server
    ///
    /// # Errors
    ///
    /// Returns error if server fails to bind or run
    pub async fn run(self) -> Result<()> {
        let addr = format!("0.0.0.0:{}", self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| Error::Config(format!("failed to bind API server: {e}")))?;

        tracing::info!(port = self.port, "API server listening");

        axum::serve(listener, self.router())
            .await
            .map_err(|e| Error::Config(format!("API server error: {e}")))?;

        Ok(())
    }

    /// Run the API server in a background task
    #[must_use]
    pub fn spawn(self) -> tokio::task::JoinHandle<Result<()>> {
        tokio::spawn(async move { self.run().await })
    }
}
