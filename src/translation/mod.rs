//! Translation orchestration across backends
//!
//! A [`Translator`] holds an ordered chain of [`TranslationBackend`]s. The
//! first ready backend that answers wins; failures move on to the next one
//! and the primary is never retried within a call.

mod backend;
mod google;
pub mod language;
mod libretranslate;
mod on_device;
mod stt;

pub use backend::{BackendKind, BackendRequest, TranslationBackend};
pub use google::GoogleBackend;
pub use language::{
    DEFAULT_FALLBACK_LANGUAGE, DetectionFallback, Language, STRICT_DETECTION, supported_languages,
};
pub use libretranslate::LibreTranslateBackend;
pub use on_device::OnDeviceBackend;
pub use stt::{SpeechToText, SttProvider, Transcript};

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::audio::AudioBuffer;
use crate::engine::{SpeechTranslation, with_timeout};
use crate::voice::{SynthesisOptions, SynthesisQueue, SynthesisRequest, VoiceCloneResult, VoiceSource};
use crate::{Error, Result};

/// Confidence stamped on primary results that carry none
pub const PRIMARY_CONFIDENCE: f32 = 0.9;

/// Confidence stamped on fallback results that carry none
pub const FALLBACK_CONFIDENCE: f32 = 0.6;

/// What to translate
#[derive(Debug, Clone, PartialEq)]
pub enum TranslationInput {
    /// Captured speech
    Audio(AudioBuffer),
    /// Typed text
    Text(String),
}

/// Whether the caller wants translated speech
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// Text only
    #[default]
    Text,
    /// Text plus synthesized speech where the backend can produce it
    Speech,
}

/// Canonical record of one translation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationResult {
    /// Source text (empty when the backend did not report it)
    pub original_text: String,
    /// Translated text
    pub translated_text: String,
    /// Application code of the source language
    pub source_language: String,
    /// Application code of the target language
    pub target_language: String,
    /// Confidence in `[0, 1]`
    pub confidence: f32,
    /// When the translation completed
    pub timestamp: DateTime<Utc>,
    /// Backend that produced it
    pub backend: BackendKind,
}

/// A translation plus any speech the backend produced
#[derive(Debug, Clone)]
pub struct Translation {
    /// The canonical record
    pub result: TranslationResult,
    /// Translated speech, when requested and available
    pub audio: Option<AudioBuffer>,
}

/// Orchestrator limits and policies
#[derive(Debug, Clone)]
pub struct TranslatorSettings {
    /// Deadline for each backend call
    pub timeout: Duration,
    /// Longest audio payload sent to a backend
    pub max_audio_secs: f64,
    /// Longest text payload sent to a backend, in characters
    pub max_text_chars: usize,
    /// Number of results kept in history
    pub history_limit: usize,
    /// What to do when `auto` detection fails
    pub detection: DetectionFallback,
}

impl Default for TranslatorSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(15_000),
            max_audio_secs: 30.0,
            max_text_chars: 5_000,
            history_limit: 100,
            detection: DetectionFallback::default(),
        }
    }
}

/// Routes translations through the backend chain
pub struct Translator {
    backends: Vec<TranslationBackend>,
    stt: Option<SpeechToText>,
    settings: TranslatorSettings,
    history: Mutex<VecDeque<TranslationResult>>,
}

impl Translator {
    /// Create an orchestrator with no backends
    #[must_use]
    pub fn new(settings: TranslatorSettings) -> Self {
        Self {
            backends: Vec::new(),
            stt: None,
            settings,
            history: Mutex::new(VecDeque::new()),
        }
    }

    /// Append a backend to the chain
    #[must_use]
    pub fn with_backend(mut self, backend: TranslationBackend) -> Self {
        self.backends.push(backend);
        self
    }

    /// Transcribe audio for text-only backends with this service
    #[must_use]
    pub fn with_stt(mut self, stt: SpeechToText) -> Self {
        self.stt = Some(stt);
        self
    }

    /// Backends in chain order
    pub fn backends(&self) -> impl Iterator<Item = BackendKind> + '_ {
        self.backends.iter().map(TranslationBackend::kind)
    }

    /// Translate `input` from `source` (or `"auto"`) into `target`
    ///
    /// # Errors
    ///
    /// Returns `LanguageDetection` if `source` is `"auto"`, detection fails,
    /// and the detection policy is strict. Returns
    /// `TranslationUnavailable` if every backend was unready or failed.
    pub async fn translate(
        &self,
        input: &TranslationInput,
        source: &str,
        target: &str,
        output: OutputMode,
    ) -> Result<Translation> {
        let input = self.bounded(input);
        let mut transcript = TranscriptSlot::Pending;

        let source = if source.eq_ignore_ascii_case(language::AUTO) {
            let detected = self.detect_source(&input, &mut transcript).await;
            self.settings.detection.resolve(detected)?
        } else {
            source.to_string()
        };

        let mut failures = Vec::new();
        for backend in &self.backends {
            let kind = backend.kind();
            if !self.ready(backend).await {
                tracing::debug!(backend = %kind, "backend not ready, skipping");
                failures.push(format!("{kind}: not ready"));
                continue;
            }

            let (audio, text) = match &input {
                TranslationInput::Text(text) => (None, Some(text.clone())),
                TranslationInput::Audio(audio) if backend.accepts_audio() => (Some(audio), None),
                TranslationInput::Audio(audio) => {
                    match self.transcript(audio, &source, &mut transcript).await {
                        Ok(t) => (None, Some(t.text)),
                        Err(e) => {
                            tracing::debug!(backend = %kind, error = %e, "no transcript for text backend");
                            failures.push(format!("{kind}: {e}"));
                            continue;
                        }
                    }
                }
            };

            let request = BackendRequest {
                audio,
                text: text.as_deref(),
                source: &source,
                target,
                want_speech: output == OutputMode::Speech,
            };

            tracing::debug!(backend = %kind, source = %source, target, "translating");
            match with_timeout(self.settings.timeout, "translate", backend.translate(&request)).await {
                Ok(response) => {
                    let translation = normalize(kind, response, text, &source, target);
                    tracing::info!(
                        backend = %kind,
                        source = %translation.result.source_language,
                        target = %translation.result.target_language,
                        confidence = translation.result.confidence,
                        "translation complete"
                    );
                    self.record(translation.result.clone());
                    return Ok(translation);
                }
                Err(e) => {
                    tracing::warn!(backend = %kind, error = %e, "backend failed, trying next");
                    failures.push(format!("{kind}: {e}"));
                }
            }
        }

        if failures.is_empty() {
            failures.push("no backends configured".to_string());
        }
        Err(Error::TranslationUnavailable(failures.join("; ")))
    }

    /// Translate, then speak the result in a cloned voice
    ///
    /// # Errors
    ///
    /// Returns the translation error, or the synthesis error from the queue
    pub async fn translate_and_clone(
        &self,
        queue: &SynthesisQueue,
        input: &TranslationInput,
        source: &str,
        target: &str,
        voice: VoiceSource,
        mut options: SynthesisOptions,
    ) -> Result<(Translation, VoiceCloneResult)> {
        let translation = self.translate(input, source, target, OutputMode::Text).await?;
        options.language = translation.result.target_language.clone();

        let clone = queue
            .enqueue(SynthesisRequest {
                text: translation.result.translated_text.clone(),
                voice,
                options,
            })
            .await?;
        Ok((translation, clone))
    }

    /// Past results, newest first
    #[must_use]
    pub fn history(&self) -> Vec<TranslationResult> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    /// Forget past results
    pub fn clear_history(&self) {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn bounded(&self, input: &TranslationInput) -> TranslationInput {
        match input {
            TranslationInput::Audio(audio) => {
                TranslationInput::Audio(audio.truncated(self.settings.max_audio_secs))
            }
            TranslationInput::Text(text) => {
                TranslationInput::Text(text.chars().take(self.settings.max_text_chars).collect())
            }
        }
    }

    /// Readiness within the call deadline; a check that hangs counts as unready
    async fn ready(&self, backend: &TranslationBackend) -> bool {
        with_timeout(self.settings.timeout, "is_ready", async {
            Ok(backend.is_ready().await)
        })
        .await
        .unwrap_or(false)
    }

    fn record(&self, result: TranslationResult) {
        let mut history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
        history.push_front(result);
        history.truncate(self.settings.history_limit);
    }

    async fn detect_source(
        &self,
        input: &TranslationInput,
        transcript: &mut TranscriptSlot,
    ) -> Result<String> {
        let TranslationInput::Audio(audio) = input else {
            return Err(Error::LanguageDetection(
                "text input needs an explicit source language".to_string(),
            ));
        };

        for backend in &self.backends {
            if let TranslationBackend::OnDevice(on_device) = backend
                && self.ready(backend).await
            {
                match with_timeout(self.settings.timeout, "detect_language", on_device.detect_language(audio)).await {
                    Ok(code) => return Ok(code),
                    Err(e) => tracing::debug!(error = %e, "on-device language detection failed"),
                }
            }
        }

        if self.stt.is_some() {
            let detected = self.transcript(audio, language::AUTO, transcript).await?;
            return detected
                .language
                .ok_or_else(|| Error::LanguageDetection("transcriber reported no language".to_string()));
        }

        Err(Error::LanguageDetection("no language detector available".to_string()))
    }

    /// Transcribe at most once per call, remembering failures too
    async fn transcript(
        &self,
        audio: &AudioBuffer,
        source: &str,
        slot: &mut TranscriptSlot,
    ) -> Result<Transcript> {
        match slot {
            TranscriptSlot::Ready(t) => return Ok(t.clone()),
            TranscriptSlot::Failed(message) => return Err(Error::Stt(message.clone())),
            TranscriptSlot::Pending => {}
        }

        let Some(stt) = &self.stt else {
            let message = "no speech-to-text service configured".to_string();
            *slot = TranscriptSlot::Failed(message.clone());
            return Err(Error::BackendNotReady(message));
        };

        let hint = (!source.eq_ignore_ascii_case(language::AUTO)).then_some(source);
        match with_timeout(self.settings.timeout, "transcribe", stt.transcribe(audio, hint)).await {
            Ok(t) => {
                *slot = TranscriptSlot::Ready(t.clone());
                Ok(t)
            }
            Err(e) => {
                *slot = TranscriptSlot::Failed(e.to_string());
                Err(e)
            }
        }
    }
}

fn normalize(
    kind: BackendKind,
    response: SpeechTranslation,
    sent_text: Option<String>,
    source: &str,
    target: &str,
) -> Translation {
    let default_confidence = if kind == BackendKind::OnDevice {
        PRIMARY_CONFIDENCE
    } else {
        FALLBACK_CONFIDENCE
    };
    let confidence = response
        .confidence
        .filter(|c| c.is_finite())
        .map_or(default_confidence, |c| c.clamp(0.0, 1.0));

    Translation {
        result: TranslationResult {
            original_text: response.original_text.or(sent_text).unwrap_or_default(),
            translated_text: response.translated_text,
            source_language: source.to_string(),
            target_language: target.to_string(),
            confidence,
            timestamp: Utc::now(),
            backend: kind,
        },
        audio: response.audio,
    }
}

enum TranscriptSlot {
    Pending,
    Ready(Transcript),
    Failed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_chain_is_unavailable() {
        let translator = Translator::new(TranslatorSettings::default());
        let err = translator
            .translate(&TranslationInput::Text("hello".into()), "en", "es", OutputMode::Text)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::TranslationUnavailable(_)));
        assert!(translator.history().is_empty());
    }

    #[tokio::test]
    async fn auto_text_uses_detection_fallback() {
        let translator = Translator::new(TranslatorSettings::default());
        let err = translator
            .translate(&TranslationInput::Text("hello".into()), "auto", "es", OutputMode::Text)
            .await
            .unwrap_err();
        // Detection resolved; failure comes from the empty chain instead
        assert!(matches!(err, Error::TranslationUnavailable(_)));
    }

    #[tokio::test]
    async fn strict_detection_surfaces_error() {
        let settings = TranslatorSettings {
            detection: DetectionFallback::strict(),
            ..TranslatorSettings::default()
        };
        let translator = Translator::new(settings);
        let err = translator
            .translate(&TranslationInput::Text("hello".into()), "auto", "es", OutputMode::Text)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::LanguageDetection(_)));
    }

    #[test]
    fn text_payload_is_bounded_by_chars() {
        let settings = TranslatorSettings {
            max_text_chars: 3,
            ..TranslatorSettings::default()
        };
        let translator = Translator::new(settings);
        let bounded = translator.bounded(&TranslationInput::Text("ñandú".into()));
        assert_eq!(bounded, TranslationInput::Text("ñan".into()));
    }

    #[test]
    fn backend_confidence_is_clamped() {
        let response = SpeechTranslation {
            translated_text: "hola".into(),
            confidence: Some(1.7),
            ..SpeechTranslation::default()
        };
        let t = normalize(BackendKind::OnDevice, response, None, "en", "es");
        assert!((t.result.confidence - 1.0).abs() < f32::EPSILON);
        assert_eq!(t.result.original_text, "");
    }
}
