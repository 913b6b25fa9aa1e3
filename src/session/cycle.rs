//! One capture → translate → speak cycle

use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use super::{ActivePhase, CallState, CloneMode, SessionConfig, SessionServices};
use crate::audio::{AudioBuffer, TempAudioFile, read_wav};
use crate::engine::with_timeout;
use crate::translation::{OutputMode, TranslationInput};
use crate::voice::{SynthesisOptions, SynthesisRequest, VoiceSource};
use crate::{Error, Result};

pub(super) struct CycleContext {
    pub config: Arc<SessionConfig>,
    pub services: Arc<SessionServices>,
    pub state: Arc<watch::Sender<CallState>>,
    pub cancel: CancellationToken,
}

impl CycleContext {
    /// Move to `phase` unless the call already left the active state
    pub fn enter(&self, phase: ActivePhase) {
        self.state.send_if_modified(|state| {
            if state.is_active() && *state != CallState::Active(phase) {
                *state = CallState::Active(phase);
                true
            } else {
                false
            }
        });
    }

    /// Race `work` against session cancellation
    async fn or_cancel<T>(&self, work: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::select! {
            () = self.cancel.cancelled() => Err(Error::Cancelled),
            result = work => result,
        }
    }

    pub async fn run(&self) -> Result<()> {
        let services = &self.services;
        let config = &self.config;

        self.enter(ActivePhase::Listening);
        let capture = self.capture().await?;
        let audio = read_wav(capture.path())?;
        if audio.is_empty() {
            tracing::debug!("empty capture, skipping cycle");
            return Ok(());
        }

        self.enter(ActivePhase::Translating);
        let output = if config.preserve_voice {
            OutputMode::Text
        } else {
            OutputMode::Speech
        };
        let translation = self
            .or_cancel(services.translator.translate(
                &TranslationInput::Audio(audio.clone()),
                &config.source_language,
                &config.target_language,
                output,
            ))
            .await?;

        let text = translation.result.translated_text.trim();
        if text.is_empty() {
            tracing::debug!("nothing translated, skipping playback");
            return Ok(());
        }

        let speech = if config.preserve_voice {
            Some(self.clone_voice(text, audio).await?)
        } else if let Some(speech) = translation.audio {
            Some(speech)
        } else if let Some(tts) = &services.tts {
            Some(self.or_cancel(tts.synthesize(text)).await?)
        } else {
            None
        };

        let Some(speech) = speech else {
            tracing::debug!("no speech output available, translation only");
            return Ok(());
        };
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        self.enter(ActivePhase::Speaking);
        let playback = services.temp.write("playback", &speech)?;
        self.or_cancel(services.audio.play(playback.path())).await?;

        tracing::debug!(
            session_id = %config.session_id,
            translated = %translation.result.translated_text,
            backend = %translation.result.backend,
            "cycle complete"
        );
        Ok(())
    }

    /// Record for the configured duration, or until cancelled
    ///
    /// A started recording is always closed out so the capture file is owned
    /// (and removed) by the returned guard, even on cancellation. Closing it
    /// out is bounded by the device deadline.
    async fn capture(&self) -> Result<TempAudioFile> {
        let audio = &self.services.audio;
        let limit = self.config.device_timeout;
        let token = self
            .or_cancel(with_timeout(limit, "start_recording", audio.start_recording()))
            .await?;

        let cancelled = tokio::select! {
            () = self.cancel.cancelled() => true,
            () = tokio::time::sleep(self.config.capture_duration) => false,
        };

        let path = with_timeout(limit, "stop_recording", audio.stop_recording(token)).await?;
        let capture = TempAudioFile::adopt(path);
        if cancelled {
            return Err(Error::Cancelled);
        }
        Ok(capture)
    }

    async fn clone_voice(&self, text: &str, captured: AudioBuffer) -> Result<AudioBuffer> {
        let voice = match &self.config.clone_mode {
            CloneMode::Sample => VoiceSource::Sample(captured),
            CloneMode::Profile(id) => VoiceSource::Profile(id.clone()),
            CloneMode::ActiveProfile => {
                let profile = self.services.store.active().ok_or_else(|| {
                    Error::ProfileNotFound("no active voice profile".to_string())
                })?;
                VoiceSource::Profile(profile.id.clone())
            }
        };

        let request = SynthesisRequest {
            text: text.to_string(),
            voice,
            options: SynthesisOptions {
                language: self.config.target_language.clone(),
                characteristics: self.config.characteristics.clone(),
                quality: None,
                real_time: true,
                session_id: Some(self.config.session_id.clone()),
            },
        };

        let cloned = self.or_cancel(self.services.queue.enqueue(request)).await?;
        tracing::debug!(similarity = cloned.similarity, "voice cloned");
        Ok(cloned.audio)
    }
}
