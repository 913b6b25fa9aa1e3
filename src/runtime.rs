//! Runtime - wires the pipeline together
//!
//! Builds the model sessions, translation chain, profile store, and synthesis
//! queue from [`Config`], and hands them to the CLI, the HTTP API, and call
//! sessions.

use std::path::Path;
use std::sync::Arc;

use crate::audio::{AudioAdapter, TempAudioDir};
use crate::engine::{InferenceResource, ModelKind, SidecarEngine, SpeechEngine, VoiceEngine};
use crate::session::{CallSession, SessionConfig, SessionServices};
use crate::translation::{
    GoogleBackend, LibreTranslateBackend, OnDeviceBackend, SpeechToText, TranslationBackend,
    Translator,
};
use crate::voice::{ProfileStore, SynthesisQueue, Synthesizer, TextToSpeech};
use crate::{Config, Result};

/// Readiness of one model session
#[derive(Debug, Clone, serde::Serialize)]
pub struct ModelStatus {
    pub kind: ModelKind,
    pub name: String,
    pub loaded: bool,
}

/// Everything a running parley instance shares
pub struct Runtime {
    config: Config,
    speech: InferenceResource<dyn SpeechEngine>,
    voice: InferenceResource<dyn VoiceEngine>,
    translator: Arc<Translator>,
    store: Arc<ProfileStore>,
    queue: SynthesisQueue,
    tts: Option<Arc<TextToSpeech>>,
    temp: TempAudioDir,
}

impl Runtime {
    /// Build a runtime backed by the inference sidecar
    ///
    /// # Errors
    ///
    /// Returns error if the data directory, profile store, or a configured
    /// backend cannot be set up
    pub fn build(config: Config) -> Result<Self> {
        let url = config.engine.sidecar_url.clone();
        let timeout = config.engine.timeout;
        let speech: Arc<dyn SpeechEngine> = Arc::new(SidecarEngine::speech(url.clone(), timeout)?);
        let voice: Arc<dyn VoiceEngine> = Arc::new(SidecarEngine::voice(url, timeout)?);

        tracing::debug!(url = %config.engine.sidecar_url, "using inference sidecar");
        Self::with_engines(config, speech, voice)
    }

    /// Build a runtime around explicit engine sessions
    ///
    /// # Errors
    ///
    /// Returns error if the data directory, profile store, or a configured
    /// backend cannot be set up
    pub fn with_engines(
        config: Config,
        speech: Arc<dyn SpeechEngine>,
        voice: Arc<dyn VoiceEngine>,
    ) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;

        // Stale capture/playback files from a previous run
        let temp = TempAudioDir::new(config.temp_audio_dir())?;
        let swept = temp.sweep();
        if swept > 0 {
            tracing::info!(count = swept, path = %temp.path().display(), "removed stale audio files");
        }

        let speech = InferenceResource::new(speech);
        let voice = InferenceResource::new(voice);
        let timeout = config.engine.timeout;

        let translator = Arc::new(build_translator(&config, speech.clone())?);
        let store = Arc::new(ProfileStore::open(
            config.profiles_path(),
            voice.clone(),
            timeout,
        )?);
        let synthesizer = Synthesizer::new(Arc::clone(&store), voice.clone(), timeout);
        let queue = SynthesisQueue::new(
            synthesizer,
            config.synthesis.queue_capacity,
            config.synthesis.overflow,
        );

        let tts = match &config.tts {
            Some(tts) => Some(Arc::new(TextToSpeech::new(
                tts.provider,
                tts.api_key.clone(),
                tts.voice.clone(),
                tts.speed,
                tts.model.clone(),
                timeout,
            )?)),
            None => None,
        };

        tracing::info!(
            backends = ?translator.backends().collect::<Vec<_>>(),
            profiles = store.list().len(),
            tts = tts.is_some(),
            "runtime ready"
        );

        Ok(Self {
            config,
            speech,
            voice,
            translator,
            store,
            queue,
            tts,
            temp,
        })
    }

    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn translator(&self) -> &Arc<Translator> {
        &self.translator
    }

    #[must_use]
    pub fn store(&self) -> &Arc<ProfileStore> {
        &self.store
    }

    #[must_use]
    pub const fn queue(&self) -> &SynthesisQueue {
        &self.queue
    }

    #[must_use]
    pub const fn temp(&self) -> &TempAudioDir {
        &self.temp
    }

    /// Load the model paths named in config, warning on failure
    pub async fn load_configured_models(&self) {
        let engine = &self.config.engine;
        for (kind, path) in [
            (ModelKind::Speech, engine.speech_model_path.as_deref()),
            (ModelKind::Voice, engine.voice_model_path.as_deref()),
        ] {
            let Some(path) = path else { continue };
            if let Err(e) = self.load_model(kind, path).await {
                tracing::warn!(model = %kind, path = %path.display(), error = %e, "failed to load model");
            }
        }
    }

    /// Load weights into one model session
    ///
    /// # Errors
    ///
    /// Returns `ModelNotFound` if the path is missing, `ModelLoadFailed`
    /// otherwise
    pub async fn load_model(&self, kind: ModelKind, path: &Path) -> Result<()> {
        match kind {
            ModelKind::Speech => self.speech.load(path).await,
            ModelKind::Voice => self.voice.load(path).await,
        }
    }

    /// Unload one model session once in-flight inference drains
    ///
    /// # Errors
    ///
    /// Returns the session's unload error
    pub async fn unload_model(&self, kind: ModelKind) -> Result<()> {
        match kind {
            ModelKind::Speech => self.speech.unload().await,
            ModelKind::Voice => self.voice.unload().await,
        }
    }

    /// Readiness of both model sessions
    pub async fn model_status(&self) -> Vec<ModelStatus> {
        vec![
            ModelStatus {
                kind: ModelKind::Speech,
                name: self.speech.name().to_string(),
                loaded: self.speech.is_ready().await,
            },
            ModelStatus {
                kind: ModelKind::Voice,
                name: self.voice.name().to_string(),
                loaded: self.voice.is_ready().await,
            },
        ]
    }

    /// Services for a call session using `audio` for capture and playback
    #[must_use]
    pub fn session_services(&self, audio: Arc<dyn AudioAdapter>) -> Arc<SessionServices> {
        Arc::new(SessionServices {
            audio,
            translator: Arc::clone(&self.translator),
            queue: self.queue.clone(),
            store: Arc::clone(&self.store),
            tts: self.tts.clone(),
            temp: self.temp.clone(),
        })
    }

    /// A new idle call session
    #[must_use]
    pub fn call_session(&self, config: SessionConfig, audio: Arc<dyn AudioAdapter>) -> CallSession {
        CallSession::new(config, self.session_services(audio))
    }
}

/// Assemble the fallback chain: on-device first, then remote APIs in order
fn build_translator(
    config: &Config,
    speech: InferenceResource<dyn SpeechEngine>,
) -> Result<Translator> {
    let mut translator = Translator::new(config.translator_settings())
        .with_backend(TranslationBackend::OnDevice(OnDeviceBackend::new(speech)));

    let translation = &config.translation;
    if let Some(url) = &translation.libretranslate_url {
        let mut backend = LibreTranslateBackend::new(
            url,
            translation.libretranslate_key.clone(),
            config.engine.timeout,
        )?;
        if let Some(rpm) = translation.libretranslate_rpm {
            backend = backend.with_rate_limit(rpm);
        }
        translator = translator.with_backend(TranslationBackend::LibreTranslate(backend));
    }

    if let Some(key) = &translation.google_key {
        translator = translator.with_backend(TranslationBackend::Google(GoogleBackend::new(
            key.clone(),
            config.engine.timeout,
        )?));
    }

    if let Some(stt) = &config.stt {
        translator = translator.with_stt(SpeechToText::new(
            stt.provider,
            stt.api_key.clone(),
            stt.model.clone(),
            config.engine.timeout,
        )?);
    }

    Ok(translator)
}
