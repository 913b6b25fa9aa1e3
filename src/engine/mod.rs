//! Capability providers for on-device inference
//!
//! Speech translation and voice cloning models sit behind request/response
//! traits. The pipeline never holds a model directly: it goes through an
//! [`InferenceResource`], which owns the session and its load state.

mod resource;
mod sidecar;

pub use resource::{EngineGuard, InferenceResource};
pub use sidecar::SidecarEngine;

use std::future::Future;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::audio::AudioBuffer;
use crate::voice::Emotion;
use crate::{Error, Result};

/// Which model a session carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    /// Multilingual speech/text translation model
    Speech,
    /// Speaker embedding, synthesis, and conversion models
    Voice,
}

impl ModelKind {
    /// Stable lowercase name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Speech => "speech",
            Self::Voice => "voice",
        }
    }
}

impl std::fmt::Display for ModelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A loadable model session
#[async_trait]
pub trait ModelSession: Send + Sync {
    /// Name used in logs and errors
    fn name(&self) -> &str;

    /// Live readiness query
    async fn is_loaded(&self) -> bool;

    /// Load weights from `model_path`
    ///
    /// # Errors
    ///
    /// Returns `ModelNotFound` if nothing exists at the path and
    /// `ModelLoadFailed` if the session cannot be created
    async fn load(&self, model_path: &Path) -> Result<()>;

    /// Release the session
    ///
    /// # Errors
    ///
    /// Returns error if the provider fails to release its resources
    async fn unload(&self) -> Result<()>;
}

/// Output of one translation-model invocation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpeechTranslation {
    /// Recognized source text, when the model reports it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_text: Option<String>,
    /// Translated text
    pub translated_text: String,
    /// Translated speech, for speech-output modes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<AudioBuffer>,
    /// Model confidence in `[0, 1]`, when reported
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
}

/// Multilingual speech translation model
///
/// Language arguments use the model's own vocabulary.
#[async_trait]
pub trait SpeechEngine: ModelSession {
    /// Speech in, translated speech and text out
    async fn speech_to_speech(
        &self,
        audio: &AudioBuffer,
        source: &str,
        target: &str,
    ) -> Result<SpeechTranslation>;

    /// Speech in, translated text out
    async fn speech_to_text(
        &self,
        audio: &AudioBuffer,
        source: &str,
        target: &str,
    ) -> Result<SpeechTranslation>;

    /// Text in, translated speech and text out
    async fn text_to_speech(
        &self,
        text: &str,
        source: &str,
        target: &str,
    ) -> Result<SpeechTranslation>;

    /// Text in, translated text out
    async fn text_to_text(&self, text: &str, source: &str, target: &str)
    -> Result<SpeechTranslation>;

    /// Identify the spoken language
    async fn detect_language(&self, audio: &AudioBuffer) -> Result<String>;
}

/// Speaker embedding and voice synthesis models
#[async_trait]
pub trait VoiceEngine: ModelSession {
    /// Speaker embedding of a sample
    async fn extract_embedding(&self, audio: &AudioBuffer) -> Result<Vec<f32>>;

    /// Bind an embedding to a provider-side profile and return its id
    async fn register_profile(&self, name: &str, embedding: &[f32]) -> Result<String>;

    /// Release provider-side resources held for a profile
    async fn release_profile(&self, profile_id: &str) -> Result<()>;

    /// Speak `text` in the voice described by `embedding`
    async fn synthesize(
        &self,
        text: &str,
        embedding: &[f32],
        language: &str,
        emotion: Emotion,
    ) -> Result<AudioBuffer>;

    /// Speak `text` in the voice of a raw sample's embedding
    async fn convert(
        &self,
        text: &str,
        source_embedding: &[f32],
        language: &str,
    ) -> Result<AudioBuffer>;
}

/// HTTP client whose requests give up after `timeout`
///
/// # Errors
///
/// Returns error if the client cannot be built
pub fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(timeout)
        .timeout(timeout)
        .build()
        .map_err(Error::Http)
}

/// Run a backend call under a deadline
///
/// # Errors
///
/// Returns `Timeout` if `limit` elapses first, otherwise the call's own result
pub async fn with_timeout<T, F>(limit: Duration, operation: &'static str, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::time::timeout(limit, call).await.unwrap_or_else(|_| {
        tracing::warn!(operation, timeout_ms = limit.as_millis(), "backend call timed out");
        Err(Error::Timeout {
            operation,
            after: limit,
        })
    })
}
