//! On-device multilingual model backend

use super::backend::{BackendKind, BackendRequest};
use super::language;
use crate::audio::AudioBuffer;
use crate::engine::{InferenceResource, SpeechEngine, SpeechTranslation};
use crate::{Error, Result};

/// Translates through the on-device speech model
#[derive(Clone)]
pub struct OnDeviceBackend {
    engine: InferenceResource<dyn SpeechEngine>,
}

impl OnDeviceBackend {
    /// Wrap a speech model resource
    #[must_use]
    pub const fn new(engine: InferenceResource<dyn SpeechEngine>) -> Self {
        Self { engine }
    }

    /// Ask the model whether it is loaded
    pub async fn is_ready(&self) -> bool {
        self.engine.is_ready().await
    }

    /// Pick the mode from the input shape and run it
    ///
    /// # Errors
    ///
    /// Returns `BackendNotReady` if the model is unloaded, or the model's error
    pub async fn translate(&self, request: &BackendRequest<'_>) -> Result<SpeechTranslation> {
        let engine = self.engine.acquire().await?;
        let source = language::to_backend(request.source, BackendKind::OnDevice);
        let target = language::to_backend(request.target, BackendKind::OnDevice);

        match (request.audio, request.text) {
            (Some(audio), _) if request.want_speech => {
                engine.speech_to_speech(audio, &source, &target).await
            }
            (Some(audio), _) => engine.speech_to_text(audio, &source, &target).await,
            (None, Some(text)) if request.want_speech => {
                engine.text_to_speech(text, &source, &target).await
            }
            (None, Some(text)) => engine.text_to_text(text, &source, &target).await,
            (None, None) => Err(Error::TranslationUnavailable(
                "nothing to translate".to_string(),
            )),
        }
    }

    /// Identify the spoken language, in application codes
    ///
    /// # Errors
    ///
    /// Returns `BackendNotReady` if the model is unloaded, or the model's error
    pub async fn detect_language(&self, audio: &AudioBuffer) -> Result<String> {
        let engine = self.engine.acquire().await?;
        let detected = engine.detect_language(audio).await?;
        Ok(language::from_backend(&detected, BackendKind::OnDevice))
    }
}
