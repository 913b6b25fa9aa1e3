//! Remote speech-to-text for text-only backends

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::language;
use crate::audio::{AudioBuffer, samples_to_wav};
use crate::engine::http_client;
use crate::{Error, Result};

/// Whisper `verbose_json` response (only the fields we read)
#[derive(Deserialize)]
struct WhisperResponse {
    text: String,
    #[serde(default)]
    language: Option<String>,
}

/// Response from Deepgram transcription API
#[derive(Deserialize)]
struct DeepgramResponse {
    results: DeepgramResults,
}

#[derive(Deserialize)]
struct DeepgramResults {
    channels: Vec<DeepgramChannel>,
}

#[derive(Deserialize)]
struct DeepgramChannel {
    alternatives: Vec<DeepgramAlternative>,
    #[serde(default)]
    detected_language: Option<String>,
}

#[derive(Deserialize)]
struct DeepgramAlternative {
    transcript: String,
}

/// STT provider backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SttProvider {
    /// `OpenAI` Whisper
    Whisper,
    /// Deepgram
    Deepgram,
}

/// Transcript with the language the service heard
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcript {
    /// Recognized text
    pub text: String,
    /// Application language code, when reported
    pub language: Option<String>,
}

/// Transcribes speech to text
pub struct SpeechToText {
    client: reqwest::Client,
    api_key: SecretString,
    model: String,
    provider: SttProvider,
}

impl SpeechToText {
    /// Create a new STT client
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new(
        provider: SttProvider,
        api_key: SecretString,
        model: String,
        timeout: Duration,
    ) -> Result<Self> {
        if api_key.expose_secret().is_empty() {
            return Err(Error::Config(match provider {
                SttProvider::Whisper => "OpenAI API key required for Whisper".to_string(),
                SttProvider::Deepgram => "Deepgram API key required".to_string(),
            }));
        }

        Ok(Self {
            client: http_client(timeout)?,
            api_key,
            model,
            provider,
        })
    }

    /// Provider in use
    #[must_use]
    pub const fn provider(&self) -> SttProvider {
        self.provider
    }

    /// Transcribe a buffer
    ///
    /// `language` is a hint; pass `None` to let the service detect it.
    ///
    /// # Errors
    ///
    /// Returns error if transcription fails
    pub async fn transcribe(&self, audio: &AudioBuffer, language: Option<&str>) -> Result<Transcript> {
        let wav = samples_to_wav(&audio.samples, audio.sample_rate)?;
        match self.provider {
            SttProvider::Whisper => self.transcribe_whisper(wav, language).await,
            SttProvider::Deepgram => self.transcribe_deepgram(wav, language).await,
        }
    }

    async fn transcribe_whisper(&self, wav: Vec<u8>, language: Option<&str>) -> Result<Transcript> {
        tracing::debug!(audio_bytes = wav.len(), "starting Whisper transcription");

        let mut form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(wav)
                    .file_name("audio.wav")
                    .mime_str("audio/wav")
                    .map_err(|e| Error::Stt(e.to_string()))?,
            )
            .text("model", self.model.clone())
            .text("response_format", "verbose_json");
        if let Some(language) = language {
            form = form.text("language", language.to_string());
        }

        let response = self
            .client
            .post("https://api.openai.com/v1/audio/transcriptions")
            .bearer_auth(self.api_key.expose_secret())
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Whisper request failed");
                e
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Whisper API error");
            return Err(Error::Stt(format!("Whisper API error {status}: {body}")));
        }

        let result: WhisperResponse = response.json().await?;
        let transcript = Transcript {
            text: result.text.trim().to_string(),
            language: result.language.as_deref().map(language::normalize_reported),
        };

        tracing::info!(chars = transcript.text.len(), language = ?transcript.language, "transcription complete");
        Ok(transcript)
    }

    async fn transcribe_deepgram(&self, wav: Vec<u8>, language: Option<&str>) -> Result<Transcript> {
        tracing::debug!(audio_bytes = wav.len(), "starting Deepgram transcription");

        let mut url = format!(
            "https://api.deepgram.com/v1/listen?model={}&punctuate=true",
            self.model
        );
        match language {
            Some(language) => url.push_str(&format!("&language={language}")),
            None => url.push_str("&detect_language=true"),
        }

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Token {}", self.api_key.expose_secret()))
            .header("Content-Type", "audio/wav")
            .body(wav)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Deepgram request failed");
                e
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Deepgram API error");
            return Err(Error::Stt(format!("Deepgram API error {status}: {body}")));
        }

        let result: DeepgramResponse = response.json().await?;
        let channel = result.results.channels.into_iter().next();
        let language = channel
            .as_ref()
            .and_then(|c| c.detected_language.as_deref())
            .map(language::normalize_reported);
        let text = channel
            .and_then(|c| c.alternatives.into_iter().next())
            .map(|a| a.transcript)
            .unwrap_or_default();

        tracing::info!(chars = text.len(), language = ?language, "transcription complete");
        Ok(Transcript { text, language })
    }
}
