//! Translation endpoints

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use base64::Engine;
use serde::{Deserialize, Serialize};

use super::{ApiError, ApiResult, ApiState};
use crate::audio::{AudioBuffer, samples_to_wav, wav_to_buffer};
use crate::translation::{
    Language, OutputMode, TranslationInput, TranslationResult, language, supported_languages,
};
use crate::voice::{QualityTier, SynthesisOptions, VoiceCharacteristics, VoiceSource};

/// Translate request; exactly one of `text` or `audio` is required
#[derive(Deserialize)]
pub struct TranslateRequest {
    pub text: Option<String>,
    /// Base64-encoded WAV
    pub audio: Option<String>,
    #[serde(default = "auto")]
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub output: OutputMode,
    /// Speak the translation in this profile's voice
    pub profile_id: Option<String>,
    pub characteristics: Option<VoiceCharacteristics>,
    pub quality: Option<QualityTier>,
}

fn auto() -> String {
    language::AUTO.to_string()
}

#[derive(Serialize)]
pub struct TranslateResponse {
    pub result: TranslationResult,
    /// Base64-encoded WAV of the spoken translation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<String>,
    /// Similarity of cloned speech to the profile voice
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f32>,
}

#[derive(Serialize)]
pub struct LanguagesResponse {
    pub languages: &'static [Language],
}

#[derive(Serialize)]
pub struct HistoryResponse {
    pub translations: Vec<TranslationResult>,
    pub total: usize,
}

fn decode_audio(encoded: &str) -> Result<AudioBuffer, ApiError> {
    let wav = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .map_err(|e| ApiError::bad_request("invalid_audio", format!("invalid base64: {e}")))?;
    Ok(wav_to_buffer(&wav)?)
}

fn encode_audio(audio: &AudioBuffer) -> Result<String, ApiError> {
    let wav = samples_to_wav(&audio.samples, audio.sample_rate)?;
    Ok(base64::engine::general_purpose::STANDARD.encode(wav))
}

async fn languages() -> Json<LanguagesResponse> {
    Json(LanguagesResponse {
        languages: supported_languages(),
    })
}

async fn translate(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<TranslateRequest>,
) -> ApiResult<TranslateResponse> {
    let input = match (request.text, request.audio.as_deref()) {
        (Some(text), None) => TranslationInput::Text(text),
        (None, Some(audio)) => TranslationInput::Audio(decode_audio(audio)?),
        _ => {
            return Err(ApiError::bad_request(
                "invalid_input",
                "provide exactly one of text or audio",
            ));
        }
    };

    let runtime = &state.runtime;
    if let Some(profile_id) = request.profile_id {
        let options = SynthesisOptions {
            characteristics: request.characteristics,
            quality: request.quality,
            ..SynthesisOptions::default()
        };
        let (translation, cloned) = runtime
            .translator()
            .translate_and_clone(
                runtime.queue(),
                &input,
                &request.source,
                &request.target,
                VoiceSource::Profile(profile_id),
                options,
            )
            .await?;

        return Ok(Json(TranslateResponse {
            result: translation.result,
            audio: Some(encode_audio(&cloned.audio)?),
            similarity: Some(cloned.similarity),
        }));
    }

    let translation = runtime
        .translator()
        .translate(&input, &request.source, &request.target, request.output)
        .await?;

    Ok(Json(TranslateResponse {
        audio: translation.audio.as_ref().map(encode_audio).transpose()?,
        result: translation.result,
        similarity: None,
    }))
}

async fn history(State(state): State<Arc<ApiState>>) -> Json<HistoryResponse> {
    let translations = state.runtime.translator().history();
    let total = translations.len();
    Json(HistoryResponse {
        translations,
        total,
    })
}

async fn clear_history(State(state): State<Arc<ApiState>>) -> StatusCode {
    state.runtime.translator().clear_history();
    StatusCode::NO_CONTENT
}

/// Translation routes
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/api/languages", get(languages))
        .route("/api/translate", post(translate))
        .route("/api/translations", get(history).delete(clear_history))
        .with_state(state)
}
