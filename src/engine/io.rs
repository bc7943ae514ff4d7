//! Mono WAV file helpers
//!
//! Pedal processing is single channel: files are mixed down to mono on read
//! and written as 32-bit float mono.

use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use crate::error::{Result, StompError};

/// Read a WAV file as mono `f32` samples, averaging channels.
///
/// # Returns
/// The samples and the file's sample rate
///
/// # Errors
/// * `FileNotFound` - the file does not exist
/// * `AudioRead` - the file is not a readable WAV
/// * `UnsupportedFormat` - integer bit depth other than 8/16/24/32
pub fn read_mono(path: &Path) -> Result<(Vec<f32>, u32)> {
    if !path.exists() {
        return Err(StompError::FileNotFound {
            path: path.display().to_string(),
            source: None,
        });
    }

    let reader = WavReader::open(path).map_err(|e| StompError::AudioRead {
        path: path.display().to_string(),
        source: e,
    })?;

    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;
    let interleaved = read_samples_as_f32(reader, spec, path)?;

    Ok((mix_down(&interleaved, channels), spec.sample_rate))
}

/// Write `samples` as a 32-bit float mono WAV file
///
/// # Errors
/// * `AudioWrite` - the file cannot be created or encoded
pub fn write_mono(path: &Path, samples: &[f32], sample_rate: u32) -> Result<()> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };
    let to_error = |e| StompError::AudioWrite {
        path: path.display().to_string(),
        source: e,
    };

    let mut writer = WavWriter::create(path, spec).map_err(to_error)?;
    for &sample in samples {
        writer.write_sample(sample).map_err(to_error)?;
    }
    writer.finalize().map_err(to_error)
}

/// A sine tone, handy for fixtures and smoke runs
pub fn sine_tone(frequency: f32, amplitude: f32, len: usize, sample_rate: u32) -> Vec<f32> {
    (0..len)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            amplitude * (2.0 * std::f32::consts::PI * frequency * t).sin()
        })
        .collect()
}

// ============================================================================
// Internal helper functions
// ============================================================================

fn read_samples_as_f32<R: std::io::Read>(
    mut reader: WavReader<R>,
    spec: WavSpec,
    path: &Path,
) -> Result<Vec<f32>> {
    let to_error = |e| StompError::AudioRead {
        path: path.display().to_string(),
        source: e,
    };

    match spec.sample_format {
        SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<Vec<f32>, _>>()
            .map_err(to_error),
        SampleFormat::Int => {
            let scale = match spec.bits_per_sample {
                8 => 128.0,
                16 => 32_768.0,
                24 => 8_388_608.0,
                32 => 2_147_483_648.0,
                bits => {
                    return Err(StompError::UnsupportedFormat {
                        format: format!("{}-bit integer audio", bits),
                    })
                }
            };
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<std::result::Result<Vec<f32>, _>>()
                .map_err(to_error)
        }
    }
}

/// Average interleaved frames down to one channel
fn mix_down(samples: &[f32], channels: usize) -> Vec<f32> {
    if channels == 1 {
        return samples.to_vec();
    }
    samples
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}
