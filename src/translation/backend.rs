//! The closed set of translation backends

use serde::{Deserialize, Serialize};

use super::google::GoogleBackend;
use super::libretranslate::LibreTranslateBackend;
use super::on_device::OnDeviceBackend;
use crate::Result;
use crate::audio::AudioBuffer;
use crate::engine::SpeechTranslation;

/// Backend identity, usable without a configured instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// On-device multilingual model
    OnDevice,
    /// LibreTranslate-compatible HTTP API
    LibreTranslate,
    /// Google Cloud Translation v2
    Google,
}

impl BackendKind {
    /// Stable name used in logs and results
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OnDevice => "on_device",
            Self::LibreTranslate => "libretranslate",
            Self::Google => "google",
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One translation call, in application language codes
#[derive(Debug, Clone, Copy)]
pub struct BackendRequest<'a> {
    /// Source speech, for backends that take audio
    pub audio: Option<&'a AudioBuffer>,
    /// Source text (typed input or a transcript)
    pub text: Option<&'a str>,
    /// Resolved source language
    pub source: &'a str,
    /// Target language
    pub target: &'a str,
    /// Ask for translated speech as well as text
    pub want_speech: bool,
}

/// A configured translation backend
pub enum TranslationBackend {
    /// On-device multilingual model
    OnDevice(OnDeviceBackend),
    /// LibreTranslate-compatible HTTP API
    LibreTranslate(LibreTranslateBackend),
    /// Google Cloud Translation v2
    Google(GoogleBackend),
}

impl TranslationBackend {
    /// Which backend this is
    #[must_use]
    pub const fn kind(&self) -> BackendKind {
        match self {
            Self::OnDevice(_) => BackendKind::OnDevice,
            Self::LibreTranslate(_) => BackendKind::LibreTranslate,
            Self::Google(_) => BackendKind::Google,
        }
    }

    /// Whether the backend translates speech directly
    ///
    /// Text-only backends need a transcript when the input is audio.
    #[must_use]
    pub const fn accepts_audio(&self) -> bool {
        matches!(self, Self::OnDevice(_))
    }

    /// Live readiness check
    pub async fn is_ready(&self) -> bool {
        match self {
            Self::OnDevice(b) => b.is_ready().await,
            Self::LibreTranslate(b) => b.is_ready(),
            Self::Google(b) => b.is_ready(),
        }
    }

    /// Run one translation
    ///
    /// # Errors
    ///
    /// Returns the backend's own error; the orchestrator decides what to do
    /// with it
    pub async fn translate(&self, request: &BackendRequest<'_>) -> Result<SpeechTranslation> {
        match self {
            Self::OnDevice(b) => b.translate(request).await,
            Self::LibreTranslate(b) => b.translate(request).await,
            Self::Google(b) => b.translate(request).await,
        }
    }
}
