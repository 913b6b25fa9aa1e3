//! JSON-over-HTTP client for a local inference process
//!
//! Audio crosses the wire as base64-encoded 16-bit WAV.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use url::Url;

use super::{ModelKind, ModelSession, SpeechEngine, SpeechTranslation, VoiceEngine, http_client};
use crate::audio::{AudioBuffer, samples_to_wav, wav_to_buffer};
use crate::voice::Emotion;
use crate::{Error, Result};

/// Deadline for a model load, which outlasts ordinary requests
const MODEL_LOAD_TIMEOUT: Duration = Duration::from_secs(600);

/// Translation modes understood by the sidecar
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "lowercase")]
enum Mode {
    S2st,
    S2tt,
    T2st,
    T2tt,
}

#[derive(Serialize)]
struct TranslateRequest<'a> {
    mode: Mode,
    #[serde(skip_serializing_if = "Option::is_none")]
    audio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
    source: &'a str,
    target: &'a str,
}

#[derive(Deserialize)]
struct TranslateResponse {
    #[serde(default)]
    original_text: Option<String>,
    translated_text: String,
    #[serde(default)]
    audio: Option<String>,
    #[serde(default)]
    confidence: Option<f32>,
}

#[derive(Deserialize)]
struct StatusResponse {
    loaded: bool,
}

#[derive(Deserialize)]
struct DetectResponse {
    language: String,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct ProfileResponse {
    id: String,
}

#[derive(Deserialize)]
struct AudioResponse {
    audio: String,
}

/// Engine backed by a sidecar inference server
///
/// One instance speaks for one [`ModelKind`]; build a speech and a voice
/// engine against the same server to get both capabilities.
pub struct SidecarEngine {
    client: reqwest::Client,
    timeout: Duration,
    base_url: Url,
    kind: ModelKind,
    name: String,
}

impl SidecarEngine {
    /// Create a client for the speech translation model
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn speech(base_url: Url, timeout: Duration) -> Result<Self> {
        Self::new(base_url, ModelKind::Speech, timeout)
    }

    /// Create a client for the voice cloning models
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn voice(base_url: Url, timeout: Duration) -> Result<Self> {
        Self::new(base_url, ModelKind::Voice, timeout)
    }

    fn new(base_url: Url, kind: ModelKind, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout)?,
            timeout,
            name: format!("sidecar-{kind}"),
            base_url,
            kind,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| Error::Config(format!("invalid sidecar url: {e}")))
    }

    async fn post<Req: Serialize + Sync, Resp: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &Req,
    ) -> Result<Resp> {
        self.post_within(path, body, self.timeout).await
    }

    async fn post_within<Req: Serialize + Sync, Resp: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &Req,
        limit: Duration,
    ) -> Result<Resp> {
        let url = self.endpoint(path)?;
        tracing::trace!(url = %url, "sidecar request");

        let response = self.client.post(url).timeout(limit).json(body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::debug!(status = %status, body = %body, "sidecar error response");
            return Err(classify(self.kind, status, body));
        }

        Ok(response.json().await?)
    }

    async fn translate(
        &self,
        mode: Mode,
        audio: Option<&AudioBuffer>,
        text: Option<&str>,
        source: &str,
        target: &str,
    ) -> Result<SpeechTranslation> {
        let audio = audio.map(encode_audio).transpose()?;
        let request = TranslateRequest {
            mode,
            audio,
            text,
            source,
            target,
        };

        let response: TranslateResponse = self.post("v1/speech/translate", &request).await?;
        Ok(SpeechTranslation {
            original_text: response.original_text,
            translated_text: response.translated_text,
            audio: response.audio.as_deref().map(decode_audio).transpose()?,
            confidence: response.confidence,
        })
    }
}

fn classify(kind: ModelKind, status: reqwest::StatusCode, body: String) -> Error {
    match status {
        reqwest::StatusCode::SERVICE_UNAVAILABLE | reqwest::StatusCode::CONFLICT => {
            Error::BackendNotReady(body)
        }
        reqwest::StatusCode::NOT_FOUND => Error::ModelNotFound(body),
        _ => {
            let message = format!("sidecar returned {status}: {body}");
            match kind {
                ModelKind::Speech => Error::TranslationUnavailable(message),
                ModelKind::Voice => Error::SynthesisFailed(message),
            }
        }
    }
}

fn encode_audio(audio: &AudioBuffer) -> Result<String> {
    let wav = samples_to_wav(&audio.samples, audio.sample_rate)?;
    Ok(base64::engine::general_purpose::STANDARD.encode(wav))
}

fn decode_audio(encoded: &str) -> Result<AudioBuffer> {
    let wav = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .map_err(|e| Error::AudioLoadFailed(format!("invalid base64 audio: {e}")))?;
    wav_to_buffer(&wav)
}

#[async_trait]
impl ModelSession for SidecarEngine {
    fn name(&self) -> &str {
        &self.name
    }

    async fn is_loaded(&self) -> bool {
        let Ok(url) = self.endpoint(&format!("v1/models/{}/status", self.kind)) else {
            return false;
        };
        match self.client.get(url).send().await {
            Ok(response) if response.status().is_success() => response
                .json::<StatusResponse>()
                .await
                .is_ok_and(|s| s.loaded),
            Ok(response) => {
                tracing::debug!(status = %response.status(), engine = %self.name, "status query rejected");
                false
            }
            Err(e) => {
                tracing::debug!(error = %e, engine = %self.name, "sidecar unreachable");
                false
            }
        }
    }

    async fn load(&self, model_path: &Path) -> Result<()> {
        #[derive(Serialize)]
        struct LoadRequest<'a> {
            path: &'a str,
        }

        let path = model_path.to_string_lossy();
        let result: Result<serde_json::Value> = self
            .post_within(
                &format!("v1/models/{}/load", self.kind),
                &LoadRequest { path: &path },
                MODEL_LOAD_TIMEOUT,
            )
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(e @ Error::ModelNotFound(_)) => Err(e),
            Err(e) => Err(Error::ModelLoadFailed(e.to_string())),
        }
    }

    async fn unload(&self) -> Result<()> {
        let _: serde_json::Value = self
            .post(
                &format!("v1/models/{}/unload", self.kind),
                &serde_json::json!({}),
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl SpeechEngine for SidecarEngine {
    async fn speech_to_speech(
        &self,
        audio: &AudioBuffer,
        source: &str,
        target: &str,
    ) -> Result<SpeechTranslation> {
        self.translate(Mode::S2st, Some(audio), None, source, target)
            .await
    }

    async fn speech_to_text(
        &self,
        audio: &AudioBuffer,
        source: &str,
        target: &str,
    ) -> Result<SpeechTranslation> {
        self.translate(Mode::S2tt, Some(audio), None, source, target)
            .await
    }

    async fn text_to_speech(
        &self,
        text: &str,
        source: &str,
        target: &str,
    ) -> Result<SpeechTranslation> {
        self.translate(Mode::T2st, None, Some(text), source, target)
            .await
    }

    async fn text_to_text(
        &self,
        text: &str,
        source: &str,
        target: &str,
    ) -> Result<SpeechTranslation> {
        self.translate(Mode::T2tt, None, Some(text), source, target)
            .await
    }

    async fn detect_language(&self, audio: &AudioBuffer) -> Result<String> {
        let body = serde_json::json!({ "audio": encode_audio(audio)? });
        let response: DetectResponse = self.post("v1/language/detect", &body).await?;
        Ok(response.language)
    }
}

#[async_trait]
impl VoiceEngine for SidecarEngine {
    async fn extract_embedding(&self, audio: &AudioBuffer) -> Result<Vec<f32>> {
        let body = serde_json::json!({ "audio": encode_audio(audio)? });
        let response: EmbeddingResponse = self
            .post("v1/voice/embed", &body)
            .await
            .map_err(|e| Error::EmbeddingExtractionFailed(e.to_string()))?;
        Ok(response.embedding)
    }

    async fn register_profile(&self, name: &str, embedding: &[f32]) -> Result<String> {
        let body = serde_json::json!({ "name": name, "embedding": embedding });
        let response: ProfileResponse = self.post("v1/voice/profiles", &body).await?;
        Ok(response.id)
    }

    async fn release_profile(&self, profile_id: &str) -> Result<()> {
        let url = self.endpoint(&format!("v1/voice/profiles/{profile_id}"))?;
        let response = self.client.delete(url).send().await?;
        let status = response.status();
        // Already gone on the provider side counts as released
        if status.is_success() || status == reqwest::StatusCode::NOT_FOUND {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(classify(self.kind, status, body))
    }

    async fn synthesize(
        &self,
        text: &str,
        embedding: &[f32],
        language: &str,
        emotion: Emotion,
    ) -> Result<AudioBuffer> {
        let body = serde_json::json!({
            "text": text,
            "embedding": embedding,
            "language": language,
            "emotion": emotion,
        });
        let response: AudioResponse = self.post("v1/voice/synthesize", &body).await?;
        decode_audio(&response.audio)
    }

    async fn convert(
        &self,
        text: &str,
        source_embedding: &[f32],
        language: &str,
    ) -> Result<AudioBuffer> {
        let body = serde_json::json!({
            "text": text,
            "source_embedding": source_embedding,
            "language": language,
        });
        let response: AudioResponse = self.post("v1/voice/convert", &body).await?;
        decode_audio(&response.audio)
    }
}
