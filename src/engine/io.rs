//! Audio decoding and export
//!
//! Resources arrive as raw bytes from a `ByteSource` and are decoded here into
//! 32-bit float buffers at the player's output rate. Rendered previews are
//! written back out as WAV.
//!
//! Sample rate conversion uses linear interpolation.

use std::io::{Cursor, Read, Seek, Write};
use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use crate::engine::buffer::{AudioBuffer, ChannelLayout};
use crate::error::{MixlineError, Result};

/// Decode WAV bytes into a buffer at `target_rate`
///
/// # Errors
/// * `DecodeFailed` - the bytes are not a readable WAV stream
/// * `UnsupportedFormat` - more than two channels, an unknown bit depth or a
///   zero sample rate
pub fn decode_audio(resource_id: &str, bytes: &[u8], target_rate: u32) -> Result<AudioBuffer> {
    let reader = WavReader::new(Cursor::new(bytes))
        .map_err(|e| MixlineError::decode_failed(resource_id, "not a WAV stream", e))?;

    let spec = reader.spec();
    let channels = spec.channels as usize;

    if ChannelLayout::from_count(channels).is_none() {
        return Err(MixlineError::UnsupportedFormat {
            format: format!("{}-channel audio (only mono/stereo supported)", channels),
        });
    }
    if spec.sample_rate == 0 || target_rate == 0 {
        return Err(MixlineError::UnsupportedFormat {
            format: format!("sample rate {}Hz -> {}Hz", spec.sample_rate, target_rate),
        });
    }

    let interleaved = read_samples_as_f32(resource_id, reader, spec.bits_per_sample, spec.sample_format)?;
    let channel_data = deinterleave(&interleaved, channels);

    let samples = if spec.sample_rate != target_rate {
        log::debug!(
            "[Decode] {} resampling {}Hz -> {}Hz",
            resource_id,
            spec.sample_rate,
            target_rate
        );
        resample_channels(&channel_data, spec.sample_rate, target_rate)
    } else {
        channel_data
    };

    Ok(AudioBuffer {
        samples,
        sample_rate: target_rate,
    })
}

/// Encode a buffer as an in-memory WAV file at its own sample rate
pub fn encode_wav(buffer: &AudioBuffer, bit_depth: u16) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    write_wav(buffer, Cursor::new(&mut bytes), bit_depth)?;
    Ok(bytes)
}

/// Export a buffer to a WAV file at its own sample rate
///
/// Supported bit depths are 16, 24 (integer) and 32 (float).
pub fn export_audio(buffer: &AudioBuffer, path: &Path, bit_depth: u16) -> Result<()> {
    let file = std::fs::File::create(path)?;
    write_wav(buffer, std::io::BufWriter::new(file), bit_depth)
}

/// Generate a sine tone, identical on every channel
///
/// Used to build fixtures for the cache and the renderer.
pub fn generate_test_tone(
    frequency: f32,
    amplitude: f32,
    duration_secs: f64,
    layout: ChannelLayout,
    sample_rate: u32,
) -> AudioBuffer {
    let num_samples = (duration_secs * sample_rate as f64).round() as usize;
    let mut buffer = AudioBuffer::new(num_samples, layout, sample_rate);

    let angular_freq = 2.0 * std::f32::consts::PI * frequency / sample_rate as f32;

    for channel in buffer.samples.iter_mut() {
        for (i, sample) in channel.iter_mut().enumerate() {
            *sample = amplitude * (angular_freq * i as f32).sin();
        }
    }

    buffer
}

// ============================================================================
// Internal helper functions
// ============================================================================

fn write_wav<W: Write + Seek>(buffer: &AudioBuffer, sink: W, bit_depth: u16) -> Result<()> {
    let spec = WavSpec {
        channels: buffer.channels() as u16,
        sample_rate: buffer.sample_rate,
        bits_per_sample: bit_depth,
        sample_format: if bit_depth == 32 {
            SampleFormat::Float
        } else {
            SampleFormat::Int
        },
    };

    if !matches!(bit_depth, 16 | 24 | 32) {
        return Err(MixlineError::UnsupportedFormat {
            format: format!("{}-bit audio (only 16, 24, 32 supported)", bit_depth),
        });
    }

    let mut writer = WavWriter::new(sink, spec).map_err(wav_error)?;

    for sample in buffer.to_interleaved() {
        match bit_depth {
            16 => {
                let scaled = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
                writer.write_sample(scaled).map_err(wav_error)?;
            }
            24 => {
                // 24-bit stored as i32 in hound
                let scaled = (sample * 8388607.0).clamp(-8388608.0, 8388607.0) as i32;
                writer.write_sample(scaled).map_err(wav_error)?;
            }
            _ => writer.write_sample(sample).map_err(wav_error)?,
        }
    }

    writer.finalize().map_err(wav_error)
}

fn wav_error(e: hound::Error) -> MixlineError {
    match e {
        hound::Error::IoError(io) => MixlineError::Io(io),
        other => MixlineError::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            other.to_string(),
        )),
    }
}

/// Read samples from a WAV reader and convert to f32
fn read_samples_as_f32<R: Read>(
    resource_id: &str,
    mut reader: WavReader<R>,
    bits_per_sample: u16,
    sample_format: SampleFormat,
) -> Result<Vec<f32>> {
    let scale = match (sample_format, bits_per_sample) {
        (SampleFormat::Float, 32) => {
            return reader
                .samples::<f32>()
                .collect::<std::result::Result<Vec<f32>, _>>()
                .map_err(|e| MixlineError::decode_failed(resource_id, "truncated float samples", e));
        }
        (SampleFormat::Int, 8) => 128.0,
        (SampleFormat::Int, 16) => 32768.0,
        (SampleFormat::Int, 24) => 8388608.0,
        (SampleFormat::Int, 32) => 2147483648.0,
        (format, bits) => {
            return Err(MixlineError::UnsupportedFormat {
                format: format!("{}-bit {:?} audio", bits, format),
            });
        }
    };

    // hound widens every integer depth into i32
    reader
        .samples::<i32>()
        .map(|s| s.map(|v| v as f32 / scale))
        .collect::<std::result::Result<Vec<f32>, _>>()
        .map_err(|e| {
            MixlineError::decode_failed(
                resource_id,
                format!("truncated {}-bit samples", bits_per_sample),
                e,
            )
        })
}

/// De-interleave samples from [L,R,L,R,...] to [[L,L,...], [R,R,...]]
fn deinterleave(samples: &[f32], channels: usize) -> Vec<Vec<f32>> {
    let frames = samples.len() / channels;
    let mut result = vec![Vec::with_capacity(frames); channels];

    for frame in samples.chunks_exact(channels) {
        for (ch, sample) in frame.iter().enumerate() {
            result[ch].push(*sample);
        }
    }

    result
}

fn resample_channels(channels: &[Vec<f32>], source_rate: u32, target_rate: u32) -> Vec<Vec<f32>> {
    let ratio = target_rate as f64 / source_rate as f64;

    channels
        .iter()
        .map(|channel| resample_linear(channel, ratio))
        .collect()
}

/// Linear interpolation resampling
fn resample_linear(samples: &[f32], ratio: f64) -> Vec<f32> {
    if samples.is_empty() {
        return Vec::new();
    }

    let source_len = samples.len();
    let target_len = ((source_len as f64) * ratio).round() as usize;

    (0..target_len)
        .map(|i| {
            let src_pos = i as f64 / ratio;
            let src_idx = src_pos.floor() as usize;
            let frac = (src_pos - src_idx as f64) as f32;

            if src_idx + 1 < source_len {
                samples[src_idx] * (1.0 - frac) + samples[src_idx + 1] * frac
            } else {
                samples[source_len - 1]
            }
        })
        .collect()
}

// ============================================================================
// Tests
// ============================================================================
