//! Speaker playback

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleRate, StreamConfig};

use super::{AudioBuffer, resample};
use crate::{Error, Result};

/// Output sample rate (matches common TTS and vocoder output)
pub const PLAYBACK_SAMPLE_RATE: u32 = 24000;

/// Plays audio to the default output device
///
/// Playback blocks the calling thread until the buffer drains or
/// [`interrupt`](Self::interrupt_handle) is raised from another thread.
pub struct AudioPlayback {
    device: Device,
    config: StreamConfig,
    interrupted: Arc<AtomicBool>,
}

impl AudioPlayback {
    /// Open the default output device
    ///
    /// # Errors
    ///
    /// Returns error if no output device supports 24kHz
    pub fn new() -> Result<Self> {
        let device = cpal::default_host()
            .default_output_device()
            .ok_or_else(|| Error::Audio("no output device available".to_string()))?;

        let supports_rate = |c: &cpal::SupportedStreamConfigRange| {
            c.min_sample_rate() <= SampleRate(PLAYBACK_SAMPLE_RATE)
                && c.max_sample_rate() >= SampleRate(PLAYBACK_SAMPLE_RATE)
        };

        let supported = device
            .supported_output_configs()
            .map_err(|e| Error::Audio(e.to_string()))?
            .find(|c| c.channels() == 1 && supports_rate(c))
            .or_else(|| {
                // Fallback: stereo, mono duplicated into both channels
                device
                    .supported_output_configs()
                    .ok()?
                    .find(|c| c.channels() == 2 && supports_rate(c))
            })
            .ok_or_else(|| Error::Audio("no suitable output config found".to_string()))?;

        let config = supported
            .with_sample_rate(SampleRate(PLAYBACK_SAMPLE_RATE))
            .config();

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = PLAYBACK_SAMPLE_RATE,
            channels = config.channels,
            "audio playback initialized"
        );

        Ok(Self {
            device,
            config,
            interrupted: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Flag that cuts the current playback short when set
    #[must_use]
    pub fn interrupt_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.interrupted)
    }

    /// Play a buffer, resampling to the device rate first
    ///
    /// # Errors
    ///
    /// Returns error if resampling or the output stream fails
    pub fn play(&self, audio: &AudioBuffer) -> Result<()> {
        if audio.is_empty() {
            return Ok(());
        }
        self.interrupted.store(false, Ordering::SeqCst);

        let audio = resample(audio, PLAYBACK_SAMPLE_RATE)?;
        let samples = Arc::new(audio.samples);
        let total = samples.len();
        let position = Arc::new(AtomicUsize::new(0));
        let channels = usize::from(self.config.channels);

        let stream = {
            let samples = Arc::clone(&samples);
            let position = Arc::clone(&position);
            let interrupted = Arc::clone(&self.interrupted);
            self.device
                .build_output_stream(
                    &self.config,
                    move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                        let stop = interrupted.load(Ordering::Relaxed);
                        for frame in data.chunks_mut(channels) {
                            let pos = position.load(Ordering::Relaxed);
                            let sample = if stop || pos >= samples.len() {
                                0.0
                            } else {
                                position.store(pos + 1, Ordering::Relaxed);
                                samples[pos]
                            };
                            frame.fill(sample);
                        }
                    },
                    |err| {
                        tracing::error!(error = %err, "audio playback error");
                    },
                    None,
                )
                .map_err(|e| Error::Audio(e.to_string()))?
        };

        stream.play().map_err(|e| Error::Audio(e.to_string()))?;

        let duration_ms = (total as u64 * 1000) / u64::from(PLAYBACK_SAMPLE_RATE);
        let deadline = Instant::now() + Duration::from_millis(duration_ms + 500);

        while position.load(Ordering::Relaxed) < total
            && !self.interrupted.load(Ordering::Relaxed)
            && Instant::now() < deadline
        {
            std::thread::sleep(Duration::from_millis(20));
        }

        // Let the device flush its last period
        std::thread::sleep(Duration::from_millis(100));
        drop(stream);

        tracing::debug!(
            samples = total,
            interrupted = self.interrupted.load(Ordering::Relaxed),
            "playback complete"
        );
        Ok(())
    }
}
