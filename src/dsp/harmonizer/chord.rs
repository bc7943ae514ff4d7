//! Offline chord rendering
//!
//! Renders one shifted copy of a source file per voice, then folds the copies
//! together pairwise with a clip-avoiding blend. Intermediate files live in a
//! work directory and are deleted as they are merged; a failed run may leave
//! some of them behind.

use std::path::{Path, PathBuf};
use std::time::Instant;

use log::{debug, info};
use serde::Serialize;

use super::shifter::{DelayLineShifter, PitchShifter, DEFAULT_WINDOW};
use super::{BLOCK_SIZE, HARMONIZER};
use crate::engine::io::{read_mono, write_mono};
use crate::error::{Result, StompError};

/// Full-scale amplitude used by [`blend`]
pub const MERGE_SCALE: f32 = 1.0;

/// Blend two samples so stacked full-scale voices do not exceed `scale`.
///
/// Same-sign pairs use `a + b - a*b/scale` (mirrored for negatives); mixed
/// signs cannot overflow and are summed.
#[inline]
pub fn blend(a: f32, b: f32, scale: f32) -> f32 {
    if a >= 0.0 && b >= 0.0 {
        (a + b) - (a * b) / scale
    } else if a < 0.0 && b < 0.0 {
        (a + b) + (a * b) / scale
    } else {
        a + b
    }
}

/// Blend two voices sample by sample, up to the shorter length
pub fn merge_voices(a: &[f32], b: &[f32], scale: f32) -> Vec<f32> {
    a.iter().zip(b).map(|(&x, &y)| blend(x, y, scale)).collect()
}

/// Result of a chord render
#[derive(Debug, Clone, Serialize)]
pub struct ChordReport {
    pub output: PathBuf,
    pub voices: usize,
    pub samples: usize,
    pub sample_rate: u32,
    pub seconds: f64,
    pub realtime_factor: f64,
    pub cpu_percent: f64,
}

/// Offline multi-voice renderer
#[derive(Debug, Clone)]
pub struct ChordRenderer {
    work_dir: PathBuf,
    block_size: usize,
    window: usize,
}

impl ChordRenderer {
    /// Renderer keeping its intermediate files in `work_dir`
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
            block_size: BLOCK_SIZE,
            window: DEFAULT_WINDOW,
        }
    }

    /// Shift a whole signal by `semitones`. Output length equals input length.
    pub fn render_voice(&self, source: &[f32], semitones: f32) -> Vec<f32> {
        let mut shifter = DelayLineShifter::new(self.window);
        shifter.set_transpose_semitones(semitones);
        let mut output = vec![0.0; source.len()];
        for (input, out) in source
            .chunks(self.block_size)
            .zip(output.chunks_mut(self.block_size))
        {
            shifter.process(input, out);
        }
        output
    }

    /// Render one voice of `source` into `dest`
    pub fn render_voice_file(&self, source: &Path, semitones: f32, dest: &Path) -> Result<()> {
        let (samples, sample_rate) = read_mono(source)?;
        info!(
            "[Harmonizer] Processing {} with {} semitones",
            source.display(),
            semitones
        );
        let voice = self.render_voice(&samples, semitones);
        write_mono(dest, &voice, sample_rate)
    }

    /// Blend two files into `dest` and delete both inputs
    pub fn merge_files(&self, first: &Path, second: &Path, dest: &Path) -> Result<PathBuf> {
        let (a, sample_rate) = read_mono(first)?;
        let (b, _) = read_mono(second)?;
        let merged = merge_voices(&a, &b, MERGE_SCALE);
        write_mono(dest, &merged, sample_rate)?;

        std::fs::remove_file(first)?;
        std::fs::remove_file(second)?;
        debug!(
            "[Harmonizer] Merged {} + {} -> {}",
            first.display(),
            second.display(),
            dest.display()
        );
        Ok(dest.to_path_buf())
    }

    /// Render a chord of `semitones` from `source` into `output`.
    ///
    /// # Errors
    /// * `FileNotFound` / `AudioRead` - the source cannot be read
    /// * `InvalidSetting` - no voices requested
    /// * `AudioWrite` / `Io` - intermediate or final files cannot be written
    pub fn render_chord(
        &self,
        source: &Path,
        semitones: &[f32],
        output: &Path,
    ) -> Result<ChordReport> {
        if semitones.is_empty() {
            return Err(StompError::invalid_setting(HARMONIZER, "chord needs at least one voice"));
        }
        let started = Instant::now();

        let (samples, sample_rate) = read_mono(source)?;
        std::fs::create_dir_all(&self.work_dir)?;

        let mut voices = Vec::with_capacity(semitones.len());
        for (i, &shift) in semitones.iter().enumerate() {
            info!(
                "[Harmonizer] Processing {} with {} semitones",
                source.display(),
                shift
            );
            let path = self.work_dir.join(format!("voice{}.wav", i));
            write_mono(&path, &self.render_voice(&samples, shift), sample_rate)?;
            voices.push(path);
        }

        let mut result = voices[0].clone();
        for (i, voice) in voices.iter().enumerate().skip(1) {
            let merged = self.work_dir.join(format!("merged{}.wav", i));
            result = self.merge_files(&result, voice, &merged)?;
        }
        persist(&result, output)?;

        let seconds = started.elapsed().as_secs_f64().max(f64::EPSILON);
        let duration = samples.len() as f64 / sample_rate as f64;
        let realtime_factor = duration / seconds;
        let report = ChordReport {
            output: output.to_path_buf(),
            voices: semitones.len(),
            samples: samples.len(),
            sample_rate,
            seconds,
            realtime_factor,
            cpu_percent: if realtime_factor > 0.0 {
                100.0 / realtime_factor
            } else {
                0.0
            },
        };
        info!(
            "[Harmonizer] Process: {:.3}s, {:.1}x realtime, {:.2}% CPU",
            report.seconds, report.realtime_factor, report.cpu_percent
        );
        Ok(report)
    }
}

/// Move `from` to `to`, copying when a rename cannot cross filesystems
fn persist(from: &Path, to: &Path) -> Result<()> {
    if std::fs::rename(from, to).is_err() {
        std::fs::copy(from, to)?;
        std::fs::remove_file(from)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use tempfile::tempdir;

    fn tone(len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| 0.8 * (2.0 * std::f32::consts::PI * 220.0 * i as f32 / 44100.0).sin())
            .collect()
    }

    #[test]
    fn test_blend_full_scale_does_not_clip() {
        assert_abs_diff_eq!(blend(1.0, 1.0, 1.0), 1.0);
        assert_abs_diff_eq!(blend(-1.0, -1.0, 1.0), -1.0);
        assert_abs_diff_eq!(blend(0.5, 0.5, 1.0), 0.75);
        assert_abs_diff_eq!(blend(0.5, -0.25, 1.0), 0.25);
        assert_abs_diff_eq!(blend(0.0, 0.3, 1.0), 0.3);
    }

    #[test]
    fn test_merge_voices_uses_shorter_length() {
        let merged = merge_voices(&[0.5, 0.5, 0.5], &[0.5, 0.5], 1.0);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_render_voice_preserves_length() {
        let renderer = ChordRenderer::new(std::env::temp_dir());
        let source = tone(1000);
        assert_eq!(renderer.render_voice(&source, 4.0).len(), 1000);
        assert_eq!(renderer.render_voice(&source, 0.0), source);
    }

    #[test]
    fn test_render_chord_writes_output_and_cleans_up() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("input.wav");
        let output = dir.path().join("chord.wav");
        let work = dir.path().join("work");
        write_mono(&source, &tone(4410), 44100).unwrap();

        let renderer = ChordRenderer::new(&work);
        let report = renderer
            .render_chord(&source, &[0.0, 4.0, 7.0], &output)
            .unwrap();

        assert_eq!(report.voices, 3);
        assert_eq!(report.samples, 4410);
        let (rendered, rate) = read_mono(&output).unwrap();
        assert_eq!(rate, 44100);
        assert_eq!(rendered.len(), 4410);
        assert!(rendered.iter().all(|s| s.abs() <= 1.0));
        assert_eq!(std::fs::read_dir(&work).unwrap().count(), 0);
    }

    #[test]
    fn test_single_voice_chord_is_the_voice() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("input.wav");
        let output = dir.path().join("out.wav");
        let signal = tone(2000);
        write_mono(&source, &signal, 44100).unwrap();

        ChordRenderer::new(dir.path().join("work"))
            .render_chord(&source, &[0.0], &output)
            .unwrap();
        let (rendered, _) = read_mono(&output).unwrap();
        assert_eq!(rendered, signal);
    }

    #[test]
    fn test_missing_source_fails() {
        let dir = tempdir().unwrap();
        let err = ChordRenderer::new(dir.path())
            .render_chord(&dir.path().join("nope.wav"), &[3.0], &dir.path().join("o.wav"))
            .unwrap_err();
        assert_eq!(err.error_code(), "FILE_NOT_FOUND");
    }

    #[test]
    fn test_empty_voice_list_fails() {
        let dir = tempdir().unwrap();
        let err = ChordRenderer::new(dir.path())
            .render_chord(&dir.path().join("in.wav"), &[], &dir.path().join("o.wav"))
            .unwrap_err();
        assert_eq!(err.error_code(), "INVALID_SETTING");
    }
}
