//! Real-time call sessions
//!
//! A [`CallSession`] runs capture, translation, optional voice cloning, and
//! playback on a fixed cadence for the length of a call. Cycles never
//! overlap: a tick that lands while a cycle is still running is dropped.

mod cycle;
mod state;

pub use state::{ActivePhase, CallState};

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::audio::{AudioAdapter, TempAudioDir};
use crate::engine::with_timeout;
use crate::translation::Translator;
use crate::voice::{ProfileStore, SynthesisQueue, TextToSpeech, VoiceCharacteristics};
use crate::{Error, Result};

/// Whose voice translated speech is spoken in
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloneMode {
    /// Whichever profile is active when the cycle runs
    #[default]
    ActiveProfile,
    /// A specific stored profile
    Profile(String),
    /// The speaker's own captured audio, cloned directly
    Sample,
}

/// Per-call settings
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub session_id: String,
    /// Interval between cycle starts
    pub cadence: Duration,
    /// How long each capture records
    pub capture_duration: Duration,
    /// Deadline for each call into the audio devices
    pub device_timeout: Duration,
    pub source_language: String,
    pub target_language: String,
    /// Speak translations in the caller's cloned voice
    pub preserve_voice: bool,
    pub clone_mode: CloneMode,
    pub characteristics: Option<VoiceCharacteristics>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            cadence: Duration::from_millis(500),
            capture_duration: Duration::from_secs(3),
            device_timeout: Duration::from_secs(5),
            source_language: "auto".to_string(),
            target_language: "en".to_string(),
            preserve_voice: true,
            clone_mode: CloneMode::ActiveProfile,
            characteristics: None,
        }
    }
}

/// Everything a session talks to
pub struct SessionServices {
    pub audio: Arc<dyn AudioAdapter>,
    pub translator: Arc<Translator>,
    pub queue: SynthesisQueue,
    pub store: Arc<ProfileStore>,
    /// Stock voice for text-only translations when not cloning
    pub tts: Option<Arc<TextToSpeech>>,
    pub temp: TempAudioDir,
}

/// Counters for one session
#[derive(Debug, Default)]
pub struct SessionStats {
    /// Cycles that ran to completion
    pub completed: AtomicU64,
    /// Cycles that ended in an error
    pub failed: AtomicU64,
    /// Ticks dropped because a cycle was in flight
    pub skipped_ticks: AtomicU64,
}

/// One live call
pub struct CallSession {
    config: Arc<SessionConfig>,
    services: Arc<SessionServices>,
    state: Arc<watch::Sender<CallState>>,
    cancel: CancellationToken,
    in_flight: Arc<AtomicBool>,
    stats: Arc<SessionStats>,
    ticker: Mutex<Option<JoinHandle<()>>>,
}

impl CallSession {
    /// Create an idle session
    #[must_use]
    pub fn new(config: SessionConfig, services: Arc<SessionServices>) -> Self {
        let (state, _) = watch::channel(CallState::Idle);
        Self {
            config: Arc::new(config),
            services,
            state: Arc::new(state),
            cancel: CancellationToken::new(),
            in_flight: Arc::new(AtomicBool::new(false)),
            stats: Arc::new(SessionStats::default()),
            ticker: Mutex::new(None),
        }
    }

    /// Session id
    #[must_use]
    pub fn id(&self) -> &str {
        &self.config.session_id
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> CallState {
        *self.state.borrow()
    }

    /// Watch state transitions
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CallState> {
        self.state.subscribe()
    }

    /// Session counters
    #[must_use]
    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    /// Begin connecting the call
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` unless the session is idle
    pub fn start(&self) -> Result<()> {
        self.transition(CallState::Idle, CallState::Connecting)?;
        tracing::info!(session_id = %self.config.session_id, "call connecting");
        Ok(())
    }

    /// The call is up: start the capture cadence
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` unless the session is connecting
    pub fn connected(&self) -> Result<()> {
        self.transition(
            CallState::Connecting,
            CallState::Active(ActivePhase::Listening),
        )?;

        let ticker = tokio::spawn(run_ticker(cycle::CycleContext {
            config: Arc::clone(&self.config),
            services: Arc::clone(&self.services),
            state: Arc::clone(&self.state),
            cancel: self.cancel.clone(),
        }, Arc::clone(&self.in_flight), Arc::clone(&self.stats)));
        *self.ticker.lock().unwrap_or_else(PoisonError::into_inner) = Some(ticker);

        tracing::info!(
            session_id = %self.config.session_id,
            cadence_ms = self.config.cadence.as_millis(),
            source = %self.config.source_language,
            target = %self.config.target_language,
            "call active"
        );
        Ok(())
    }

    /// End the call
    ///
    /// Cancels any in-flight cycle, stops the cadence, releases the audio
    /// devices, and cancels this session's queued synthesis. Safe to call more
    /// than once.
    pub async fn stop(&self) {
        if self.state() == CallState::Stopped {
            return;
        }
        self.cancel.cancel();

        let ticker = self
            .ticker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(ticker) = ticker
            && let Err(e) = ticker.await
        {
            tracing::warn!(error = %e, "call ticker ended abnormally");
        }

        let released = with_timeout(
            self.config.device_timeout,
            "stop_audio",
            self.services.audio.stop(),
        )
        .await;
        if let Err(e) = released {
            tracing::warn!(error = %e, "failed to release audio devices");
        }
        self.services.queue.cancel_session(&self.config.session_id);

        self.state.send_replace(CallState::Stopped);
        tracing::info!(
            session_id = %self.config.session_id,
            completed = self.stats.completed.load(Ordering::Relaxed),
            failed = self.stats.failed.load(Ordering::Relaxed),
            "call stopped"
        );
    }

    fn transition(&self, from: CallState, to: CallState) -> Result<()> {
        let mut current = None;
        self.state.send_if_modified(|state| {
            if *state == from {
                *state = to;
                true
            } else {
                current = Some(*state);
                false
            }
        });
        match current {
            None => Ok(()),
            Some(state) => Err(Error::InvalidState(format!(
                "cannot move from {state} to {to}"
            ))),
        }
    }
}

async fn run_ticker(context: cycle::CycleContext, in_flight: Arc<AtomicBool>, stats: Arc<SessionStats>) {
    let mut interval = tokio::time::interval(context.config.cadence);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let context = Arc::new(context);
    let mut current: Option<JoinHandle<()>> = None;

    loop {
        tokio::select! {
            biased;
            () = context.cancel.cancelled() => break,
            _ = interval.tick() => {}
        }

        if in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            stats.skipped_ticks.fetch_add(1, Ordering::Relaxed);
            tracing::trace!("cycle in flight, tick dropped");
            continue;
        }

        let context = Arc::clone(&context);
        let in_flight = Arc::clone(&in_flight);
        let stats = Arc::clone(&stats);
        current = Some(tokio::spawn(async move {
            match context.run().await {
                Ok(()) => {
                    stats.completed.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) if e.is_cancelled() => {
                    tracing::debug!("call cycle cancelled");
                }
                Err(e) => {
                    stats.failed.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(error = %e, "call cycle failed");
                }
            }
            context.enter(ActivePhase::Listening);
            in_flight.store(false, Ordering::Release);
        }));
    }

    if let Some(cycle) = current
        && let Err(e) = cycle.await
    {
        tracing::warn!(error = %e, "call cycle ended abnormally");
    }
}
