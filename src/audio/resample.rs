//! Sample-rate conversion

use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

use super::AudioBuffer;
use crate::{Error, Result};

/// Convert a buffer to `target_rate`
///
/// # Errors
///
/// Returns error if the resampler cannot be built for the ratio
pub fn resample(audio: &AudioBuffer, target_rate: u32) -> Result<AudioBuffer> {
    if audio.sample_rate == target_rate || audio.is_empty() {
        return Ok(AudioBuffer::new(audio.samples.clone(), target_rate));
    }
    if audio.sample_rate == 0 {
        return Err(Error::Audio("cannot resample audio with a zero sample rate".to_string()));
    }

    let ratio = f64::from(target_rate) / f64::from(audio.sample_rate);
    let samples = convert(&audio.samples, ratio)?;
    Ok(AudioBuffer::new(samples, target_rate))
}

/// Time-scale a buffer by `factor` while keeping its nominal sample rate
///
/// A factor above 1.0 shortens the audio (faster, higher), below 1.0
/// lengthens it (slower, lower).
///
/// # Errors
///
/// Returns error if the factor is not positive or the resampler fails
pub fn stretch(audio: &AudioBuffer, factor: f64) -> Result<AudioBuffer> {
    if !(factor.is_finite() && factor > 0.0) {
        return Err(Error::Audio(format!("invalid time-scale factor {factor}")));
    }
    if (factor - 1.0).abs() < 1e-6 || audio.is_empty() {
        return Ok(audio.clone());
    }

    let samples = convert(&audio.samples, 1.0 / factor)?;
    Ok(AudioBuffer::new(samples, audio.sample_rate))
}

fn convert(samples: &[f32], ratio: f64) -> Result<Vec<f32>> {
    let params = SincInterpolationParameters {
        sinc_len: 128,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 128,
        window: WindowFunction::BlackmanHarris2,
    };

    let mut resampler = SincFixedIn::<f32>::new(ratio, 1.0, params, samples.len(), 1)
        .map_err(|e| Error::Audio(format!("resampler setup failed: {e}")))?;

    let mut output = resampler
        .process(&[samples.to_vec()], None)
        .map_err(|e| Error::Audio(format!("resampling failed: {e}")))?;

    Ok(output.pop().unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(rate: u32, secs: f32) -> AudioBuffer {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
        let n = (rate as f32 * secs) as usize;
        #[allow(clippy::cast_precision_loss)]
        let samples = (0..n)
            .map(|i| (2.0 * std::f32::consts::PI * 220.0 * i as f32 / rate as f32).sin() * 0.5)
            .collect();
        AudioBuffer::new(samples, rate)
    }

    #[test]
    fn upsampling_scales_length() {
        let out = resample(&tone(16_000, 0.5), 24_000).unwrap();
        assert_eq!(out.sample_rate, 24_000);
        let expected = 12_000_i64;
        let actual = i64::try_from(out.len()).unwrap();
        assert!((actual - expected).abs() < 200, "got {actual} samples");
    }

    #[test]
    fn same_rate_is_identity() {
        let input = tone(16_000, 0.1);
        let out = resample(&input, 16_000).unwrap();
        assert_eq!(out, input);
    }

    #[test]
    fn stretch_shortens_for_faster_speech() {
        let input = tone(16_000, 0.5);
        let out = stretch(&input, 2.0).unwrap();
        assert_eq!(out.sample_rate, 16_000);
        assert!(out.len() < input.len());
    }

    #[test]
    fn stretch_rejects_non_positive_factor() {
        assert!(stretch(&tone(16_000, 0.1), 0.0).is_err());
        assert!(stretch(&tone(16_000, 0.1), f64::NAN).is_err());
    }
}
