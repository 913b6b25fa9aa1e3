//! Voice profile endpoints

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ApiResult, ApiState};
use crate::Error;
use crate::audio::samples_to_wav;
use crate::voice::{
    ProfileOptions, ProfileUpdate, QualityTier, SynthesisOptions, VoiceCharacteristics,
    VoiceProfile,
};

// --- Request/Response types ---

/// A profile without its embedding
#[derive(Serialize)]
pub struct ProfileSummary {
    pub id: String,
    pub name: String,
    pub language: String,
    pub samples: usize,
    pub characteristics: VoiceCharacteristics,
    pub quality: QualityTier,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&VoiceProfile> for ProfileSummary {
    fn from(profile: &VoiceProfile) -> Self {
        Self {
            id: profile.id.clone(),
            name: profile.name.clone(),
            language: profile.language.clone(),
            samples: profile.samples.len(),
            characteristics: profile.characteristics.clone(),
            quality: profile.quality,
            active: profile.active,
            created_at: profile.created_at,
            updated_at: profile.updated_at,
        }
    }
}

#[derive(Serialize)]
pub struct ProfileListResponse {
    pub profiles: Vec<ProfileSummary>,
    pub total: usize,
}

/// Create a profile from WAV samples on the server's filesystem
#[derive(Deserialize)]
pub struct CreateProfileRequest {
    pub name: String,
    pub samples: Vec<PathBuf>,
    #[serde(flatten)]
    pub options: ProfileOptions,
}

#[derive(Serialize)]
pub struct DeleteResponse {
    pub deleted: bool,
}

#[derive(Deserialize)]
pub struct CompareQuery {
    pub a: String,
    pub b: String,
}

#[derive(Serialize)]
pub struct CompareResponse {
    pub similarity: f32,
}

/// Speak text in a profile's voice
#[derive(Deserialize)]
pub struct SpeakRequest {
    pub text: String,
    /// Defaults to the profile's language
    pub language: Option<String>,
    pub characteristics: Option<VoiceCharacteristics>,
    pub quality: Option<QualityTier>,
}

#[derive(Serialize)]
pub struct SpeakResponse {
    /// Base64-encoded WAV
    pub audio: String,
    pub similarity: f32,
    pub duration_secs: f64,
}

// --- Handlers ---

async fn list(State(state): State<Arc<ApiState>>) -> Json<ProfileListResponse> {
    let profiles: Vec<ProfileSummary> = state
        .runtime
        .store()
        .list()
        .iter()
        .map(|p| ProfileSummary::from(p.as_ref()))
        .collect();
    let total = profiles.len();
    Json(ProfileListResponse { profiles, total })
}

async fn create(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<CreateProfileRequest>,
) -> ApiResult<ProfileSummary> {
    let profile = state
        .runtime
        .store()
        .create_profile(&request.name, &request.samples, request.options)
        .await?;
    Ok(Json(ProfileSummary::from(&profile)))
}

async fn get_profile(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
) -> ApiResult<ProfileSummary> {
    let profile = state
        .runtime
        .store()
        .get(&id)
        .ok_or(Error::ProfileNotFound(id))?;
    Ok(Json(ProfileSummary::from(profile.as_ref())))
}

async fn update(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
    Json(update): Json<ProfileUpdate>,
) -> ApiResult<ProfileSummary> {
    let profile = state.runtime.store().update(&id, update)?;
    Ok(Json(ProfileSummary::from(&profile)))
}

async fn delete(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
) -> ApiResult<DeleteResponse> {
    let deleted = state.runtime.store().delete(&id).await?;
    Ok(Json(DeleteResponse { deleted }))
}

async fn activate(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
) -> ApiResult<ProfileSummary> {
    let store = state.runtime.store();
    store.set_active(&id)?;
    let profile = store.get(&id).ok_or(Error::ProfileNotFound(id))?;
    Ok(Json(ProfileSummary::from(profile.as_ref())))
}

async fn compare(
    State(state): State<Arc<ApiState>>,
    Query(query): Query<CompareQuery>,
) -> Json<CompareResponse> {
    Json(CompareResponse {
        similarity: state.runtime.store().compare(&query.a, &query.b),
    })
}

async fn speak(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
    Json(request): Json<SpeakRequest>,
) -> ApiResult<SpeakResponse> {
    let runtime = &state.runtime;
    let language = match request.language {
        Some(language) => language,
        None => runtime
            .store()
            .get(&id)
            .map(|p| p.language.clone())
            .ok_or_else(|| Error::ProfileNotFound(id.clone()))?,
    };

    let cloned = runtime
        .queue()
        .submit(
            request.text,
            id,
            SynthesisOptions {
                language,
                characteristics: request.characteristics,
                quality: request.quality,
                ..SynthesisOptions::default()
            },
        )
        .await?;

    let wav = samples_to_wav(&cloned.audio.samples, cloned.audio.sample_rate)?;
    Ok(Json(SpeakResponse {
        audio: base64::engine::general_purpose::STANDARD.encode(wav),
        similarity: cloned.similarity,
        duration_secs: cloned.duration_secs,
    }))
}

/// Profile routes, nested under `/api/profiles`
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/", get(list).post(create))
        .route("/compare", get(compare))
        .route("/{id}", get(get_profile).patch(update).delete(delete))
        .route("/{id}/activate", post(activate))
        .route("/{id}/speak", post(speak))
        .with_state(state)
}
