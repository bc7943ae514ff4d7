//! Audio I/O boundary
//!
//! The pedal core only sees a pull/push pair: a [`SampleSource`] hands out raw
//! values one at a time and a [`SampleSink`] takes processed [`Sample`]s.
//! WAV-backed implementations stand in for the hardware converters; buffer
//! implementations are used by tests.

pub mod io;
mod stream;

pub use io::{read_mono, sine_tone, write_mono};
pub use stream::{run_stream, StreamReport};

use std::path::{Path, PathBuf};

use log::info;

use crate::dsp::Sample;
use crate::error::Result;

/// Sample rate used when nothing else is known
pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;

/// Pull side of the audio boundary
pub trait SampleSource {
    /// Next raw value, or `None` at end of stream
    fn next_sample(&mut self) -> Option<f32>;

    fn sample_rate(&self) -> u32;
}

/// Push side of the audio boundary
pub trait SampleSink {
    fn write_sample(&mut self, sample: &Sample) -> Result<()>;

    /// Flush anything buffered. Called once after the last sample.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// In-memory source
#[derive(Debug, Clone)]
pub struct BufferSource {
    samples: Vec<f32>,
    position: usize,
    sample_rate: u32,
}

impl BufferSource {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            position: 0,
            sample_rate,
        }
    }

    /// Values not yet handed out
    pub fn remaining(&self) -> usize {
        self.samples.len() - self.position
    }
}

impl SampleSource for BufferSource {
    fn next_sample(&mut self) -> Option<f32> {
        let value = self.samples.get(self.position).copied()?;
        self.position += 1;
        Some(value)
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

/// In-memory sink keeping every processed value and its trail
#[derive(Debug, Default)]
pub struct BufferSink {
    samples: Vec<f32>,
    trails: Vec<Vec<String>>,
    finished: bool,
}

impl BufferSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Effect trail of each written sample
    pub fn trails(&self) -> &[Vec<String>] {
        &self.trails
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }
}

impl SampleSink for BufferSink {
    fn write_sample(&mut self, sample: &Sample) -> Result<()> {
        self.samples.push(sample.pcm_value());
        self.trails.push(sample.trail().to_vec());
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.finished = true;
        Ok(())
    }
}

/// Source reading a whole WAV file up front, mixed down to mono
#[derive(Debug)]
pub struct WavSource {
    inner: BufferSource,
    path: PathBuf,
}

impl WavSource {
    /// # Errors
    /// * `FileNotFound` / `AudioRead` / `UnsupportedFormat` - see [`read_mono`]
    pub fn open(path: &Path) -> Result<Self> {
        let (samples, sample_rate) = read_mono(path)?;
        info!(
            "[WavSource] Opened {} ({} samples @ {} Hz)",
            path.display(),
            samples.len(),
            sample_rate
        );
        Ok(Self {
            inner: BufferSource::new(samples, sample_rate),
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.inner.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.samples.is_empty()
    }
}

impl SampleSource for WavSource {
    fn next_sample(&mut self) -> Option<f32> {
        self.inner.next_sample()
    }

    fn sample_rate(&self) -> u32 {
        self.inner.sample_rate()
    }
}

/// Sink collecting processed samples and writing a float WAV on `finish`
#[derive(Debug)]
pub struct WavSink {
    path: PathBuf,
    sample_rate: u32,
    samples: Vec<f32>,
}

impl WavSink {
    pub fn create(path: impl Into<PathBuf>, sample_rate: u32) -> Self {
        Self {
            path: path.into(),
            sample_rate,
            samples: Vec::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SampleSink for WavSink {
    fn write_sample(&mut self, sample: &Sample) -> Result<()> {
        self.samples.push(sample.pcm_value());
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        write_mono(&self.path, &self.samples, self.sample_rate)?;
        info!(
            "[WavSink] Wrote {} samples to {}",
            self.samples.len(),
            self.path.display()
        );
        Ok(())
    }
}
