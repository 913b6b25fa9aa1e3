//! Shared test utilities
//!
//! Scriptable stand-ins for the model sessions and audio devices.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use parley::audio::{AudioAdapter, AudioBuffer, RecordingToken, SAMPLE_RATE, write_wav};
use parley::engine::{ModelSession, SpeechEngine, SpeechTranslation, VoiceEngine};
use parley::voice::Emotion;
use parley::{Error, Result};

/// A quiet sine tone at the capture rate
#[must_use]
pub fn tone(secs: f32) -> AudioBuffer {
    let count = (SAMPLE_RATE as f32 * secs) as usize;
    let samples = (0..count)
        .map(|i| {
            let t = i as f32 / SAMPLE_RATE as f32;
            0.2 * (2.0 * std::f32::consts::PI * 220.0 * t).sin()
        })
        .collect();
    AudioBuffer::new(samples, SAMPLE_RATE)
}

/// Write a tone sample to `dir/name` and return its path
pub fn write_sample(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    write_wav(&path, &tone(0.25)).expect("failed to write sample");
    path
}

// --- Speech model ---

/// Speech model that answers every request with a fixed translation
pub struct MockSpeechEngine {
    pub loaded: AtomicBool,
    pub delay: Duration,
    pub reply: String,
    pub detected: String,
    pub calls: AtomicUsize,
}

impl MockSpeechEngine {
    pub fn new(reply: &str) -> Self {
        Self {
            loaded: AtomicBool::new(true),
            delay: Duration::ZERO,
            reply: reply.to_string(),
            detected: "eng".to_string(),
            calls: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn unloaded(self) -> Self {
        self.loaded.store(false, Ordering::SeqCst);
        self
    }

    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    async fn respond(&self, original: Option<String>, speech: bool) -> Result<SpeechTranslation> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(SpeechTranslation {
            original_text: original,
            translated_text: self.reply.clone(),
            audio: speech.then(|| tone(0.1)),
            confidence: Some(0.95),
        })
    }
}

#[async_trait]
impl ModelSession for MockSpeechEngine {
    fn name(&self) -> &str {
        "mock-speech"
    }

    async fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::SeqCst)
    }

    async fn load(&self, _model_path: &Path) -> Result<()> {
        self.loaded.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn unload(&self) -> Result<()> {
        self.loaded.store(false, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl SpeechEngine for MockSpeechEngine {
    async fn speech_to_speech(
        &self,
        _audio: &AudioBuffer,
        _source: &str,
        _target: &str,
    ) -> Result<SpeechTranslation> {
        self.respond(Some("hello".to_string()), true).await
    }

    async fn speech_to_text(
        &self,
        _audio: &AudioBuffer,
        _source: &str,
        _target: &str,
    ) -> Result<SpeechTranslation> {
        self.respond(Some("hello".to_string()), false).await
    }

    async fn text_to_speech(
        &self,
        text: &str,
        _source: &str,
        _target: &str,
    ) -> Result<SpeechTranslation> {
        self.respond(Some(text.to_string()), true).await
    }

    async fn text_to_text(
        &self,
        text: &str,
        _source: &str,
        _target: &str,
    ) -> Result<SpeechTranslation> {
        self.respond(Some(text.to_string()), false).await
    }

    async fn detect_language(&self, _audio: &AudioBuffer) -> Result<String> {
        Ok(self.detected.clone())
    }
}

// --- Voice model ---

/// Voice model with scripted embeddings and a log of synthesized text
pub struct MockVoiceEngine {
    pub loaded: AtomicBool,
    /// Returned by successive `extract_embedding` calls; `fallback` after
    pub embeddings: Mutex<VecDeque<Vec<f32>>>,
    pub fallback: Vec<f32>,
    /// Text that makes `synthesize` fail
    pub fail_text: Option<String>,
    pub delay: Duration,
    /// Texts in the order they were synthesized
    pub synthesized: Mutex<Vec<String>>,
    pub released: Mutex<Vec<String>>,
    next_id: AtomicU64,
}

impl MockVoiceEngine {
    pub fn new() -> Self {
        Self {
            loaded: AtomicBool::new(true),
            embeddings: Mutex::new(VecDeque::new()),
            fallback: vec![1.0, 0.0],
            fail_text: None,
            delay: Duration::ZERO,
            synthesized: Mutex::new(Vec::new()),
            released: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    #[must_use]
    pub fn with_embeddings(self, embeddings: Vec<Vec<f32>>) -> Self {
        *self.embeddings.lock().unwrap() = embeddings.into();
        self
    }

    #[must_use]
    pub fn failing_on(mut self, text: &str) -> Self {
        self.fail_text = Some(text.to_string());
        self
    }

    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn synthesized(&self) -> Vec<String> {
        self.synthesized.lock().unwrap().clone()
    }

    async fn speak(&self, text: &str) -> Result<AudioBuffer> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.synthesized.lock().unwrap().push(text.to_string());
        if self.fail_text.as_deref() == Some(text) {
            return Err(Error::SynthesisFailed(format!("cannot speak {text:?}")));
        }
        Ok(tone(0.2))
    }
}

#[async_trait]
impl ModelSession for MockVoiceEngine {
    fn name(&self) -> &str {
        "mock-voice"
    }

    async fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::SeqCst)
    }

    async fn load(&self, _model_path: &Path) -> Result<()> {
        self.loaded.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn unload(&self) -> Result<()> {
        self.loaded.store(false, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl VoiceEngine for MockVoiceEngine {
    async fn extract_embedding(&self, _audio: &AudioBuffer) -> Result<Vec<f32>> {
        let scripted = self.embeddings.lock().unwrap().pop_front();
        Ok(scripted.unwrap_or_else(|| self.fallback.clone()))
    }

    async fn register_profile(&self, _name: &str, _embedding: &[f32]) -> Result<String> {
        Ok(format!("voice-{}", self.next_id.fetch_add(1, Ordering::SeqCst)))
    }

    async fn release_profile(&self, profile_id: &str) -> Result<()> {
        self.released.lock().unwrap().push(profile_id.to_string());
        Ok(())
    }

    async fn synthesize(
        &self,
        text: &str,
        _embedding: &[f32],
        _language: &str,
        _emotion: Emotion,
    ) -> Result<AudioBuffer> {
        self.speak(text).await
    }

    async fn convert(
        &self,
        text: &str,
        _source_embedding: &[f32],
        _language: &str,
    ) -> Result<AudioBuffer> {
        self.speak(text).await
    }
}

// --- Audio devices ---

/// Audio adapter that "records" a tone to disk and logs playback
pub struct MockAudio {
    dir: PathBuf,
    pub play_delay: Duration,
    pub recordings: AtomicUsize,
    /// Every capture file handed out, in order
    pub captures: Mutex<Vec<PathBuf>>,
    /// Every file played, in order
    pub played: Mutex<Vec<PathBuf>>,
    /// Cycles between `start_recording` and the end of `play`
    busy: AtomicUsize,
    pub max_busy: AtomicUsize,
    pub stopped: AtomicBool,
    next_id: AtomicU64,
}

impl MockAudio {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            play_delay: Duration::ZERO,
            recordings: AtomicUsize::new(0),
            captures: Mutex::new(Vec::new()),
            played: Mutex::new(Vec::new()),
            busy: AtomicUsize::new(0),
            max_busy: AtomicUsize::new(0),
            stopped: AtomicBool::new(false),
            next_id: AtomicU64::new(1),
        }
    }

    #[must_use]
    pub const fn with_play_delay(mut self, delay: Duration) -> Self {
        self.play_delay = delay;
        self
    }

    pub fn captures(&self) -> Vec<PathBuf> {
        self.captures.lock().unwrap().clone()
    }

    pub fn played(&self) -> Vec<PathBuf> {
        self.played.lock().unwrap().clone()
    }
}

#[async_trait]
impl AudioAdapter for MockAudio {
    async fn start_recording(&self) -> Result<RecordingToken> {
        self.recordings.fetch_add(1, Ordering::SeqCst);
        let busy = self.busy.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_busy.fetch_max(busy, Ordering::SeqCst);
        Ok(RecordingToken::new(self.next_id.fetch_add(1, Ordering::SeqCst)))
    }

    async fn stop_recording(&self, token: RecordingToken) -> Result<PathBuf> {
        let path = self.dir.join(format!("capture-{}.wav", token.id()));
        write_wav(&path, &tone(0.25))?;
        self.captures.lock().unwrap().push(path.clone());
        Ok(path)
    }

    async fn play(&self, path: &Path) -> Result<()> {
        if !self.play_delay.is_zero() {
            tokio::time::sleep(self.play_delay).await;
        }
        assert!(path.exists(), "played file must exist while playing");
        self.played.lock().unwrap().push(path.to_path_buf());
        self.busy.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.stopped.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Audio adapter whose devices stop answering once a recording starts
#[derive(Default)]
pub struct StuckAudio {
    pub recordings: AtomicU64,
}

#[async_trait]
impl AudioAdapter for StuckAudio {
    async fn start_recording(&self) -> Result<RecordingToken> {
        Ok(RecordingToken::new(self.recordings.fetch_add(1, Ordering::SeqCst) + 1))
    }

    async fn stop_recording(&self, _token: RecordingToken) -> Result<PathBuf> {
        std::future::pending().await
    }

    async fn play(&self, _path: &Path) -> Result<()> {
        std::future::pending().await
    }

    async fn stop(&self) -> Result<()> {
        std::future::pending().await
    }
}

// --- Runtime ---

/// Config rooted at `data_dir`, with `env` standing in for the environment
pub fn test_config(data_dir: &Path, env: &[(&str, &str)]) -> parley::Config {
    let mut vars: std::collections::HashMap<String, String> = env
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect();
    vars.insert(
        "PARLEY_DATA_DIR".to_string(),
        data_dir.display().to_string(),
    );
    parley::Config::from_sources(parley::config::file::ParleyConfigFile::default(), move |k| {
        vars.get(k).cloned()
    })
    .expect("valid test config")
}

/// Runtime over mock engines
pub fn test_runtime(
    data_dir: &Path,
    env: &[(&str, &str)],
    speech: Arc<MockSpeechEngine>,
    voice: Arc<MockVoiceEngine>,
) -> parley::Runtime {
    parley::Runtime::with_engines(test_config(data_dir, env), speech, voice)
        .expect("failed to build runtime")
}

/// Serve `router` on an ephemeral local port and return its base URL
pub async fn spawn_server(router: axum::Router) -> url::Url {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind");
    let addr = listener.local_addr().expect("no local addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("mock server failed");
    });
    url::Url::parse(&format!("http://{addr}/")).expect("valid url")
}

/// Accept connections on an ephemeral port and never answer them
pub async fn spawn_silent_server() -> url::Url {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind");
    let addr = listener.local_addr().expect("no local addr");
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
        }
    });
    url::Url::parse(&format!("http://{addr}/")).expect("valid url")
}
