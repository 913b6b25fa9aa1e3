//! WAV and MP3 encoding helpers

use std::io::Cursor;
use std::path::Path;

use super::AudioBuffer;
use crate::{Error, Result};

/// Encode f32 samples as 16-bit mono WAV bytes
///
/// # Errors
///
/// Returns error if WAV encoding fails
pub fn samples_to_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer =
            hound::WavWriter::new(&mut cursor, spec).map_err(|e| Error::Audio(e.to_string()))?;

        for &sample in samples {
            #[allow(clippy::cast_possible_truncation)]
            let sample_i16 = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
            writer
                .write_sample(sample_i16)
                .map_err(|e| Error::Audio(e.to_string()))?;
        }

        writer.finalize().map_err(|e| Error::Audio(e.to_string()))?;
    }

    Ok(cursor.into_inner())
}

/// Decode WAV bytes into a mono buffer
///
/// Multi-channel input is downmixed by averaging channels.
///
/// # Errors
///
/// Returns `AudioLoadFailed` if the bytes are not a readable WAV stream
pub fn wav_to_buffer(bytes: &[u8]) -> Result<AudioBuffer> {
    let reader =
        hound::WavReader::new(Cursor::new(bytes)).map_err(|e| Error::AudioLoadFailed(e.to_string()))?;
    decode_reader(reader)
}

/// Read a WAV file from disk
///
/// # Errors
///
/// Returns `AudioLoadFailed` if the file is missing or not a WAV file
pub fn read_wav(path: &Path) -> Result<AudioBuffer> {
    let reader = hound::WavReader::open(path)
        .map_err(|e| Error::AudioLoadFailed(format!("{}: {e}", path.display())))?;
    decode_reader(reader)
}

/// Write a buffer to disk as 16-bit mono WAV
///
/// # Errors
///
/// Returns error if encoding or the write fails
pub fn write_wav(path: &Path, audio: &AudioBuffer) -> Result<()> {
    let bytes = samples_to_wav(&audio.samples, audio.sample_rate)?;
    std::fs::write(path, bytes)?;
    Ok(())
}

fn decode_reader<R: std::io::Read>(reader: hound::WavReader<R>) -> Result<AudioBuffer> {
    let spec = reader.spec();
    let channels = usize::from(spec.channels.max(1));

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| Error::AudioLoadFailed(e.to_string()))?,
        hound::SampleFormat::Int => {
            #[allow(clippy::cast_precision_loss)]
            let scale = (1_i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| {
                    #[allow(clippy::cast_precision_loss)]
                    let v = v as f32;
                    v / scale
                }))
                .collect::<std::result::Result<_, _>>()
                .map_err(|e| Error::AudioLoadFailed(e.to_string()))?
        }
    };

    let samples = if channels == 1 {
        interleaved
    } else {
        #[allow(clippy::cast_precision_loss)]
        let divisor = channels as f32;
        interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / divisor)
            .collect()
    };

    Ok(AudioBuffer::new(samples, spec.sample_rate))
}

/// Decode MP3 bytes (TTS output) into a mono buffer
///
/// # Errors
///
/// Returns `AudioLoadFailed` on a corrupt stream
pub fn decode_mp3(mp3_data: &[u8]) -> Result<AudioBuffer> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(mp3_data));
    let mut samples = Vec::new();
    let mut sample_rate = 0_u32;

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                if sample_rate == 0 {
                    sample_rate = u32::try_from(frame.sample_rate).unwrap_or_default();
                }
                if frame.channels == 2 {
                    samples.extend(frame.data.chunks(2).map(|chunk| {
                        let left = f32::from(chunk[0]) / 32768.0;
                        let right = f32::from(chunk.get(1).copied().unwrap_or(chunk[0])) / 32768.0;
                        f32::midpoint(left, right)
                    }));
                } else {
                    samples.extend(frame.data.iter().map(|&s| f32::from(s) / 32768.0));
                }
            }
            Err(minimp3::Error::Eof) => break,
            Err(e) => return Err(Error::AudioLoadFailed(format!("MP3 decode error: {e}"))),
        }
    }

    if sample_rate == 0 {
        return Err(Error::AudioLoadFailed("MP3 stream has no frames".to_string()));
    }

    Ok(AudioBuffer::new(samples, sample_rate))
}
