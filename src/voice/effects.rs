//! Post-synthesis audio passes

use super::{QualityTier, VoiceCharacteristics};
use crate::Result;
use crate::audio::{AudioBuffer, stretch};

/// Peak level targeted by normalization (about -1 dBFS)
const TARGET_PEAK: f32 = 0.89;

/// Samples below this magnitude are gated at the Ultra tier
const NOISE_GATE: f32 = 0.005;

/// Apply pitch, speed, and emotion to synthesized speech
///
/// Pitch and speed are folded into one tape-style rate change of
/// `speed * 2^(pitch / 12)`; emotion scales amplitude. Output is clamped to
/// `[-1, 1]`.
///
/// # Errors
///
/// Returns error if the rate change fails
pub fn adjust(audio: &AudioBuffer, characteristics: &VoiceCharacteristics) -> Result<AudioBuffer> {
    if characteristics.is_neutral() {
        return Ok(audio.clone());
    }

    let pitch_ratio = 2.0_f64.powf(f64::from(characteristics.pitch) / 12.0);
    let speed = f64::from(characteristics.speed).max(0.1);
    let mut adjusted = stretch(audio, speed * pitch_ratio)?;

    let gain = characteristics.emotion.gain();
    for sample in &mut adjusted.samples {
        *sample = (*sample * gain).clamp(-1.0, 1.0);
    }

    tracing::debug!(
        pitch = characteristics.pitch,
        speed = characteristics.speed,
        emotion = characteristics.emotion.as_str(),
        "voice characteristics applied"
    );
    Ok(adjusted)
}

/// Clean up synthesized speech
///
/// Removes DC offset and normalizes peak level; the Ultra tier also gates
/// low-level noise.
#[must_use]
pub fn enhance(audio: &AudioBuffer, quality: QualityTier) -> AudioBuffer {
    if audio.is_empty() {
        return audio.clone();
    }

    #[allow(clippy::cast_precision_loss)]
    let mean = audio.samples.iter().sum::<f32>() / audio.samples.len() as f32;
    let mut samples: Vec<f32> = audio.samples.iter().map(|s| s - mean).collect();

    if quality == QualityTier::Ultra {
        for sample in &mut samples {
            if sample.abs() < NOISE_GATE {
                *sample = 0.0;
            }
        }
    }

    let peak = samples.iter().fold(0.0_f32, |max, s| max.max(s.abs()));
    if peak > f32::EPSILON {
        let gain = TARGET_PEAK / peak;
        for sample in &mut samples {
            *sample = (*sample * gain).clamp(-1.0, 1.0);
        }
    }

    AudioBuffer::new(samples, audio.sample_rate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voice::Emotion;

    fn ramp() -> AudioBuffer {
        #[allow(clippy::cast_precision_loss)]
        let samples = (0..1600).map(|i| ((i % 100) as f32 / 100.0 - 0.5) * 0.4).collect();
        AudioBuffer::new(samples, 16_000)
    }

    #[test]
    fn neutral_adjustment_is_identity() {
        let audio = ramp();
        let out = adjust(&audio, &VoiceCharacteristics::default()).unwrap();
        assert_eq!(out, audio);
    }

    #[test]
    fn angry_voice_is_louder_but_clamped() {
        let audio = AudioBuffer::new(vec![0.9, -0.9, 0.5], 16_000);
        let angry = VoiceCharacteristics {
            emotion: Emotion::Angry,
            ..VoiceCharacteristics::default()
        };
        let out = adjust(&audio, &angry).unwrap();
        assert!((out.samples[0] - 1.0).abs() < f32::EPSILON);
        assert!((out.samples[1] + 1.0).abs() < f32::EPSILON);
        assert!((out.samples[2] - 0.65).abs() < 1e-6);
    }

    #[test]
    fn faster_speech_is_shorter() {
        let audio = ramp();
        let faster = VoiceCharacteristics {
            speed: 1.5,
            ..VoiceCharacteristics::default()
        };
        let out = adjust(&audio, &faster).unwrap();
        assert!(out.len() < audio.len());
        assert_eq!(out.sample_rate, audio.sample_rate);
    }

    #[test]
    fn enhancement_normalizes_peak() {
        let audio = AudioBuffer::new(vec![0.1, -0.2, 0.05, 0.05], 16_000);
        let out = enhance(&audio, QualityTier::High);
        let peak = out.samples.iter().fold(0.0_f32, |m, s| m.max(s.abs()));
        assert!((peak - TARGET_PEAK).abs() < 1e-5);
        let mean: f32 = out.samples.iter().sum::<f32>() / 4.0;
        assert!(mean.abs() < 1e-5);
    }

    #[test]
    fn ultra_gates_noise_floor() {
        let audio = AudioBuffer::new(vec![0.001, -0.001, 0.5, -0.5], 16_000);
        let out = enhance(&audio, QualityTier::Ultra);
        assert!(out.samples[0].abs() < f32::EPSILON);
        assert!(out.samples[1].abs() < f32::EPSILON);
    }
}
