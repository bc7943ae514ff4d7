//! Harmonizer Effect
//!
//! Multi-voice pitch shifter with two modes:
//! - streaming: per-sample `process` backed by fixed-size blocks (this file)
//! - offline: whole-file chord rendering ([`ChordRenderer`])
//!
//! # Streaming latency
//!
//! Input accumulates into a block of `B` samples. When the block is full every
//! voice shifts it in one go and the new output block starts playing. Until
//! the first block completes the output is silence, so the first `B - 1`
//! outputs are `0.0` and latency is a constant `B` samples.

mod chord;
mod shifter;

pub use chord::{blend, merge_voices, ChordReport, ChordRenderer, MERGE_SCALE};
pub use shifter::{DelayLineShifter, PitchShifter, DEFAULT_WINDOW};

use std::time::Instant;

use log::info;
use serde::Serialize;

use crate::config::Config;
use crate::dsp::effect::{Effect, EffectParams, Setting};
use crate::engine::DEFAULT_SAMPLE_RATE;
use crate::error::{Result, StompError};

/// Registry and config key
pub const HARMONIZER: &str = "harmonizer";

/// Streaming block size in samples
pub const BLOCK_SIZE: usize = 64;

/// Most voices a single harmonizer will run
pub const MAX_VOICES: usize = 4;

/// Largest accepted shift, in semitones, either direction
pub const MAX_SHIFT_SEMITONES: f32 = 24.0;

/// Builds one shift engine per voice
pub type ShifterFactory = Box<dyn Fn() -> Box<dyn PitchShifter> + Send>;

/// Streaming counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HarmonizerStats {
    pub samples_processed: u64,
    pub blocks_processed: u64,
    pub latency_samples: usize,
    pub voices: usize,
    pub sample_rate: u32,
}

struct Voice {
    shifter: Box<dyn PitchShifter>,
    output: Vec<f32>,
    requested: f32,
    applied: Option<f32>,
}

/// Real-time harmonizer effect
pub struct Harmonizer {
    params: EffectParams,
    semitones: Vec<f32>,
    block_size: usize,
    sample_rate: u32,
    factory: ShifterFactory,

    // Streaming state, built on first use
    initialized: bool,
    input: Vec<f32>,
    voices: Vec<Voice>,
    write_index: usize,
    read_index: usize,

    samples_processed: u64,
    blocks_processed: u64,
    started: Option<Instant>,
}

impl Harmonizer {
    /// Harmonizer with the default block size and shift engine
    pub fn new(semitones: Vec<f32>) -> Self {
        Self::with_shifter(semitones, BLOCK_SIZE, || {
            Box::new(DelayLineShifter::new(DEFAULT_WINDOW))
        })
    }

    /// Harmonizer with a custom block size and shift engine
    pub fn with_shifter<F>(semitones: Vec<f32>, block_size: usize, factory: F) -> Self
    where
        F: Fn() -> Box<dyn PitchShifter> + Send + 'static,
    {
        Self {
            params: EffectParams::new(Setting::List(semitones.clone())),
            semitones,
            block_size: block_size.max(1),
            sample_rate: DEFAULT_SAMPLE_RATE,
            factory: Box::new(factory),
            initialized: false,
            input: Vec::new(),
            voices: Vec::new(),
            write_index: 0,
            read_index: 0,
            samples_processed: 0,
            blocks_processed: 0,
            started: None,
        }
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Requested voice shifts
    pub fn semitones(&self) -> &[f32] {
        &self.semitones
    }

    pub fn stats(&self) -> HarmonizerStats {
        HarmonizerStats {
            samples_processed: self.samples_processed,
            blocks_processed: self.blocks_processed,
            latency_samples: self.latency_samples(),
            voices: self.semitones.len(),
            sample_rate: self.sample_rate,
        }
    }

    fn new_voice(&self, semitones: f32) -> Voice {
        Voice {
            shifter: (self.factory)(),
            output: vec![0.0; self.block_size],
            requested: semitones,
            applied: None,
        }
    }

    fn ensure_initialized(&mut self) {
        if self.initialized {
            return;
        }
        self.input = vec![0.0; self.block_size];
        self.voices = self
            .semitones
            .iter()
            .map(|&s| self.new_voice(s))
            .collect();
        self.write_index = 0;
        self.read_index = self.block_size;
        self.initialized = true;
    }

    /// Swap in a new voice list. Engines are only built or dropped when the
    /// voice count changes; new shifts take effect at the next block.
    fn apply_voice_list(&mut self, semitones: Vec<f32>) {
        if self.initialized {
            self.voices.truncate(semitones.len());
            while self.voices.len() < semitones.len() {
                let voice = self.new_voice(semitones[self.voices.len()]);
                self.voices.push(voice);
            }
            for (voice, &shift) in self.voices.iter_mut().zip(&semitones) {
                voice.requested = shift;
            }
        }
        self.semitones = semitones;
    }

    fn run_block(&mut self) {
        for voice in &mut self.voices {
            if voice.applied != Some(voice.requested) {
                voice.shifter.set_transpose_semitones(voice.requested);
                voice.applied = Some(voice.requested);
            }
            voice.shifter.process(&self.input, &mut voice.output);
        }
        self.blocks_processed += 1;
    }

    /// Arithmetic mean of every voice at `index`
    #[inline]
    fn mix(&self, index: usize) -> f32 {
        match self.voices.len() {
            0 => 0.0,
            1 => self.voices[0].output[index],
            n => self.voices.iter().map(|v| v.output[index]).sum::<f32>() / n as f32,
        }
    }
}

impl Default for Harmonizer {
    fn default() -> Self {
        Self::new(default_semitones())
    }
}

fn default_semitones() -> Vec<f32> {
    vec![0.0]
}

/// Read a voice list out of a setting: a single number, a list, or text of
/// numbers separated by whitespace or commas.
pub fn parse_semitones(setting: &Setting) -> Option<Vec<f32>> {
    let voices = match setting {
        Setting::Int(v) => vec![*v as f32],
        Setting::Float(v) => vec![*v],
        Setting::List(v) => v.clone(),
        Setting::Text(text) => text
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|token| !token.is_empty())
            .map(|token| token.parse::<f32>().ok())
            .collect::<Option<Vec<f32>>>()?,
        Setting::Bool(_) => return None,
    };
    if voices.is_empty() || voices.iter().any(|s| !s.is_finite()) {
        return None;
    }
    Some(voices)
}

fn validate_voices(voices: &[f32]) -> Result<()> {
    if voices.len() > MAX_VOICES {
        return Err(StompError::invalid_setting(
            HARMONIZER,
            format!("{} voices requested, at most {}", voices.len(), MAX_VOICES),
        ));
    }
    if let Some(shift) = voices.iter().find(|s| s.abs() > MAX_SHIFT_SEMITONES) {
        return Err(StompError::invalid_setting(
            HARMONIZER,
            format!("shift {} outside ±{} semitones", shift, MAX_SHIFT_SEMITONES),
        ));
    }
    Ok(())
}

impl Effect for Harmonizer {
    fn name(&self) -> &'static str {
        HARMONIZER
    }

    fn process(&mut self, input: f32) -> f32 {
        if self.semitones.is_empty() {
            return input;
        }
        self.ensure_initialized();

        if self.samples_processed == 0 {
            self.started = Some(Instant::now());
        }
        self.samples_processed += 1;

        self.input[self.write_index] = input;
        self.write_index += 1;

        if self.read_index < self.block_size {
            let out = self.mix(self.read_index);
            self.read_index += 1;
            return out;
        }

        if self.write_index >= self.block_size {
            self.run_block();
            self.write_index = 0;
            self.read_index = 1;
            return self.mix(0);
        }

        0.0
    }

    fn configure(&mut self, config: &Config) -> Result<()> {
        let voices = config
            .value(HARMONIZER)
            .map(Setting::from)
            .and_then(|setting| parse_semitones(&setting))
            .unwrap_or_else(default_semitones);
        validate_voices(&voices)?;

        self.params.active = config.contains(HARMONIZER);
        self.params.setting = Setting::List(voices.clone());
        self.apply_voice_list(voices);
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.params.active
    }

    fn set_active(&mut self, active: bool) {
        self.params.active = active;
    }

    fn setting(&self) -> &Setting {
        &self.params.setting
    }

    fn set_setting(&mut self, setting: Setting) {
        let voices = parse_semitones(&setting)
            .filter(|v| validate_voices(v).is_ok())
            .unwrap_or_else(default_semitones);
        self.params.setting = Setting::List(voices.clone());
        self.apply_voice_list(voices);
    }

    fn reset(&mut self) {
        self.input.iter_mut().for_each(|s| *s = 0.0);
        for voice in &mut self.voices {
            voice.shifter.reset();
            voice.output.iter_mut().for_each(|s| *s = 0.0);
        }
        self.write_index = 0;
        self.read_index = self.block_size;
    }

    /// Only used for the realtime factor in the drop statistics
    fn set_sample_rate(&mut self, sample_rate: u32) {
        self.sample_rate = sample_rate.max(1);
    }

    fn latency_samples(&self) -> usize {
        if self.semitones.is_empty() {
            0
        } else {
            self.block_size
        }
    }
}

impl Drop for Harmonizer {
    fn drop(&mut self) {
        let Some(started) = self.started else {
            return;
        };
        let elapsed = started.elapsed().as_secs_f64();
        if elapsed <= 0.0 {
            return;
        }
        let per_sample_us = elapsed / self.samples_processed as f64 * 1e6;
        let realtime = (self.samples_processed as f64 / self.sample_rate as f64) / elapsed;
        info!(
            "[Harmonizer] Stream stats: {} samples, {} blocks, {:.3} us/sample, {:.1}x realtime",
            self.samples_processed, self.blocks_processed, per_sample_us, realtime
        );
    }
}
