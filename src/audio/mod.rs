//! Audio buffers, device I/O, and transient audio files
//!
//! Every pipeline stage exchanges [`AudioBuffer`]s in memory. Whenever audio
//! has to cross a file boundary (capture adapter, playback adapter) it lives in
//! a [`TempAudioFile`] which removes itself once dropped.

mod adapter;
mod capture;
mod playback;
mod resample;
mod temp;
mod wav;

pub use adapter::{AudioAdapter, DeviceAudioAdapter, RecordingToken};
pub use capture::{AudioCapture, SAMPLE_RATE};
pub use playback::{AudioPlayback, PLAYBACK_SAMPLE_RATE};
pub use resample::{resample, stretch};
pub use temp::{TempAudioDir, TempAudioFile};
pub use wav::{decode_mp3, read_wav, samples_to_wav, wav_to_buffer, write_wav};

use serde::{Deserialize, Serialize};

/// Mono PCM audio as normalized `f32` samples
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioBuffer {
    /// Samples in `[-1.0, 1.0]`
    pub samples: Vec<f32>,
    /// Sample rate in Hz
    pub sample_rate: u32,
}

impl AudioBuffer {
    /// Wrap raw samples at the given rate
    #[must_use]
    pub const fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Whether the buffer holds no samples
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Number of samples
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Duration in seconds
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / f64::from(self.sample_rate)
    }

    /// Keep at most `max_secs` of audio from the start of the buffer
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn truncated(&self, max_secs: f64) -> Self {
        let max_samples = (max_secs * f64::from(self.sample_rate)) as usize;
        if self.samples.len() <= max_samples {
            return self.clone();
        }
        Self {
            samples: self.samples[..max_samples].to_vec(),
            sample_rate: self.sample_rate,
        }
    }

    /// Root-mean-square energy of the buffer
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn rms(&self) -> f32 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let sum_squares: f32 = self.samples.iter().map(|s| s * s).sum();
        (sum_squares / self.samples.len() as f32).sqrt()
    }
}
