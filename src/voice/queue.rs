//! Serialized voice synthesis
//!
//! Voice models keep internal state between calls, so synthesis requests run
//! one at a time, in submission order. A worker task drains the queue and
//! exits when it empties; the next submission starts a new one.

use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError};

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use super::{QualityTier, Synthesizer, VoiceCharacteristics, VoiceCloneResult};
use crate::audio::AudioBuffer;
use crate::{Error, Result};

/// Whose voice to speak in
#[derive(Debug, Clone, PartialEq)]
pub enum VoiceSource {
    /// A stored profile
    Profile(String),
    /// A raw sample, cloned directly without a stored profile
    Sample(AudioBuffer),
}

/// Per-request synthesis settings
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SynthesisOptions {
    /// Language of the text
    pub language: String,
    /// Adjustment pass to apply, if any
    pub characteristics: Option<VoiceCharacteristics>,
    /// Quality tier; defaults to the profile's own tier
    pub quality: Option<QualityTier>,
    /// Part of a live call, and so eligible for eviction and session cancel
    pub real_time: bool,
    /// Call session that submitted the request
    pub session_id: Option<String>,
}

/// One synthesis request
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisRequest {
    pub text: String,
    pub voice: VoiceSource,
    pub options: SynthesisOptions,
}

/// What happens when a submission finds the queue full
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Evict the oldest pending real-time request with `Cancelled`
    #[default]
    DropOldest,
    /// Refuse the new request with `QueueFull`
    RejectNew,
}

struct Job {
    request: SynthesisRequest,
    reply: oneshot::Sender<Result<VoiceCloneResult>>,
}

#[derive(Default)]
struct QueueState {
    pending: VecDeque<Job>,
    draining: bool,
}

struct QueueInner {
    state: Mutex<QueueState>,
    synthesizer: Synthesizer,
    capacity: usize,
    overflow: OverflowPolicy,
}

/// FIFO synthesis queue with at most one request in flight
#[derive(Clone)]
pub struct SynthesisQueue {
    inner: Arc<QueueInner>,
}

impl SynthesisQueue {
    /// Create a queue holding at most `capacity` pending requests
    #[must_use]
    pub fn new(synthesizer: Synthesizer, capacity: usize, overflow: OverflowPolicy) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                state: Mutex::new(QueueState::default()),
                synthesizer,
                capacity: capacity.max(1),
                overflow,
            }),
        }
    }

    /// Speak `text` in a stored profile's voice
    ///
    /// # Errors
    ///
    /// Returns `QueueFull` or `Cancelled` from the queue, otherwise the
    /// request's own outcome
    pub async fn submit(
        &self,
        text: impl Into<String>,
        profile_id: impl Into<String>,
        options: SynthesisOptions,
    ) -> Result<VoiceCloneResult> {
        self.enqueue(SynthesisRequest {
            text: text.into(),
            voice: VoiceSource::Profile(profile_id.into()),
            options,
        })
        .await
    }

    /// Speak `text` in the voice of a raw sample
    ///
    /// # Errors
    ///
    /// Returns `QueueFull` or `Cancelled` from the queue, otherwise the
    /// request's own outcome
    pub async fn submit_sample(
        &self,
        text: impl Into<String>,
        sample: AudioBuffer,
        options: SynthesisOptions,
    ) -> Result<VoiceCloneResult> {
        self.enqueue(SynthesisRequest {
            text: text.into(),
            voice: VoiceSource::Sample(sample),
            options,
        })
        .await
    }

    /// Queue a request and wait for its result
    ///
    /// # Errors
    ///
    /// Returns `QueueFull` if the queue is full and nothing can be evicted,
    /// `Cancelled` if the request was evicted or its session stopped, or the
    /// synthesis error
    pub async fn enqueue(&self, request: SynthesisRequest) -> Result<VoiceCloneResult> {
        let (reply, outcome) = oneshot::channel();

        let start_worker = {
            let mut state = self.lock();
            if state.pending.len() >= self.inner.capacity {
                self.make_room(&mut state)?;
            }
            state.pending.push_back(Job { request, reply });
            !std::mem::replace(&mut state.draining, true)
        };

        if start_worker {
            tracing::trace!("synthesis worker starting");
            tokio::spawn(drain(Arc::clone(&self.inner)));
        }

        outcome.await.map_err(|_| Error::Cancelled)?
    }

    /// Cancel every pending real-time request from `session_id`
    ///
    /// The request already in flight, if any, is left to finish. Returns how
    /// many requests were cancelled.
    pub fn cancel_session(&self, session_id: &str) -> usize {
        let cancelled: VecDeque<Job> = {
            let mut state = self.lock();
            let (cancel, keep) = std::mem::take(&mut state.pending)
                .into_iter()
                .partition(|job| {
                    job.request.options.real_time
                        && job.request.options.session_id.as_deref() == Some(session_id)
                });
            state.pending = keep;
            cancel
        };

        let count = cancelled.len();
        for job in cancelled {
            let _ = job.reply.send(Err(Error::Cancelled));
        }
        if count > 0 {
            tracing::debug!(session_id, count, "cancelled queued synthesis");
        }
        count
    }

    /// Number of requests waiting (excluding the one in flight)
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().pending.len()
    }

    /// Whether nothing is waiting
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn make_room(&self, state: &mut QueueState) -> Result<()> {
        let full = Error::QueueFull {
            capacity: self.inner.capacity,
        };
        match self.inner.overflow {
            OverflowPolicy::RejectNew => {
                tracing::warn!(capacity = self.inner.capacity, "synthesis queue full, rejecting");
                Err(full)
            }
            OverflowPolicy::DropOldest => {
                let Some(index) = state.pending.iter().position(|j| j.request.options.real_time)
                else {
                    tracing::warn!(capacity = self.inner.capacity, "synthesis queue full of non-evictable requests");
                    return Err(full);
                };
                if let Some(evicted) = state.pending.remove(index) {
                    tracing::warn!(
                        session_id = ?evicted.request.options.session_id,
                        "synthesis queue full, dropping oldest real-time request"
                    );
                    let _ = evicted.reply.send(Err(Error::Cancelled));
                }
                Ok(())
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, QueueState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

async fn drain(inner: Arc<QueueInner>) {
    loop {
        let job = {
            let mut state = inner.state.lock().unwrap_or_else(PoisonError::into_inner);
            match state.pending.pop_front() {
                Some(job) => job,
                None => {
                    state.draining = false;
                    tracing::trace!("synthesis worker idle");
                    return;
                }
            }
        };

        if job.reply.is_closed() {
            tracing::debug!("synthesis requester gone, skipping");
            continue;
        }

        let outcome = AssertUnwindSafe(inner.synthesizer.process(&job.request))
            .catch_unwind()
            .await
            .unwrap_or_else(|_| Err(Error::SynthesisFailed("synthesis panicked".to_string())))
            .map_err(Error::into_synthesis);

        if let Err(e) = &outcome {
            tracing::warn!(error = %e, "synthesis request failed");
        }
        let _ = job.reply.send(outcome);
    }
}
