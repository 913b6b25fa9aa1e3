//! Single-request voice synthesis

use std::sync::Arc;
use std::time::Duration;

use super::similarity::cosine_similarity;
use super::{ProfileStore, SynthesisRequest, VoiceCloneResult, VoiceSource, effects};
use crate::audio::AudioBuffer;
use crate::engine::{InferenceResource, VoiceEngine, with_timeout};
use crate::{Error, Result};

/// Turns one request into cloned speech
///
/// Holds the voice model for the whole request, so an unload waits for it.
pub struct Synthesizer {
    store: Arc<ProfileStore>,
    voice: InferenceResource<dyn VoiceEngine>,
    timeout: Duration,
}

impl Synthesizer {
    /// Create a synthesizer over a profile store and voice model
    #[must_use]
    pub const fn new(
        store: Arc<ProfileStore>,
        voice: InferenceResource<dyn VoiceEngine>,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            voice,
            timeout,
        }
    }

    /// Synthesize, adjust, enhance, then score against the reference voice
    ///
    /// # Errors
    ///
    /// Returns `BackendNotReady` if the voice model is unloaded,
    /// `ProfileNotFound` for unknown profiles, or the synthesis error
    pub async fn process(&self, request: &SynthesisRequest) -> Result<VoiceCloneResult> {
        let engine = self.voice.acquire().await?;
        let options = &request.options;

        let (raw, reference, profile_quality) = match &request.voice {
            VoiceSource::Profile(id) => {
                let profile = self
                    .store
                    .get(id)
                    .ok_or_else(|| Error::ProfileNotFound(id.clone()))?;
                let emotion = options
                    .characteristics
                    .as_ref()
                    .map_or(profile.characteristics.emotion, |c| c.emotion);

                let audio = with_timeout(
                    self.timeout,
                    "synthesize",
                    engine.synthesize(&request.text, &profile.embedding, &options.language, emotion),
                )
                .await?;
                (audio, profile.embedding.clone(), Some(profile.quality))
            }
            VoiceSource::Sample(sample) => {
                let embedding = with_timeout(
                    self.timeout,
                    "extract_embedding",
                    engine.extract_embedding(sample),
                )
                .await
                .map_err(|e| Error::EmbeddingExtractionFailed(e.to_string()))?;

                let audio = with_timeout(
                    self.timeout,
                    "convert",
                    engine.convert(&request.text, &embedding, &options.language),
                )
                .await?;
                (audio, embedding, None)
            }
        };

        let mut audio = raw;
        if let Some(characteristics) = &options.characteristics {
            audio = effects::adjust(&audio, characteristics)?;
        }

        let quality = options.quality.or(profile_quality).unwrap_or_default();
        if quality.wants_enhancement() {
            audio = effects::enhance(&audio, quality);
        }

        let similarity = self.score(&*engine, &audio, &reference).await;
        drop(engine);

        tracing::debug!(
            chars = request.text.len(),
            secs = audio.duration_secs(),
            similarity,
            quality = ?quality,
            "synthesis complete"
        );

        Ok(VoiceCloneResult {
            duration_secs: audio.duration_secs(),
            audio,
            similarity,
            characteristics: options.characteristics.clone(),
        })
    }

    /// Similarity of the output voice to the reference, 0 when unscorable
    async fn score(&self, engine: &dyn VoiceEngine, audio: &AudioBuffer, reference: &[f32]) -> f32 {
        if audio.is_empty() || reference.is_empty() {
            return 0.0;
        }

        match with_timeout(self.timeout, "extract_embedding", engine.extract_embedding(audio)).await {
            Ok(output) => cosine_similarity(&output, reference).clamp(0.0, 1.0),
            Err(e) => {
                tracing::debug!(error = %e, "could not score cloned voice");
                0.0
            }
        }
    }
}
