//! Pitch-shift primitive
//!
//! A [`PitchShifter`] turns a block of input into a block of the same length
//! transposed by a number of semitones. The transpose amount is only changed
//! between `process` calls. Implementations keep whatever history they need
//! so consecutive blocks join without a seam.

/// Default crossfade window of [`DelayLineShifter`], in samples
pub const DEFAULT_WINDOW: usize = 1024;

/// Block-based pitch shifter
pub trait PitchShifter: Send {
    /// Set the shift applied by subsequent `process` calls
    fn set_transpose_semitones(&mut self, semitones: f32);

    fn transpose_semitones(&self) -> f32;

    /// Shift `input` into `output`. Both slices have the same length.
    fn process(&mut self, input: &[f32], output: &mut [f32]);

    /// Forget all history
    fn reset(&mut self);
}

/// Two-tap delay-line pitch shifter
///
/// Two read taps sweep through a circular history at the transposition ratio,
/// half a window apart, each weighted by a triangular window so that the tap
/// crossing the write head is always silent. Reads from before the first
/// sample hold the first sample. A shift of 0 semitones copies the input.
#[derive(Debug, Clone)]
pub struct DelayLineShifter {
    history: Vec<f32>,
    mask: usize,
    window: f64,
    written: u64,
    first: f32,
    phase: f64,
    ratio: f64,
    semitones: f32,
}

/// Tap phase at start; puts both taps at half gain
const INITIAL_PHASE: f64 = 0.25;

impl DelayLineShifter {
    pub fn new(window: usize) -> Self {
        let window = window.max(4);
        let capacity = (window + 2).next_power_of_two();
        Self {
            history: vec![0.0; capacity],
            mask: capacity - 1,
            window: window as f64,
            written: 0,
            first: 0.0,
            phase: INITIAL_PHASE,
            ratio: 1.0,
            semitones: 0.0,
        }
    }

    /// Linear-interpolated read at absolute position `pos`, `newest` being
    /// the index of the most recent sample.
    fn read(&self, pos: f64, newest: u64) -> f32 {
        if pos <= 0.0 {
            return self.first;
        }
        let index = pos.floor() as u64;
        let frac = (pos - index as f64) as f32;
        let s0 = self.history[(index as usize) & self.mask];
        let s1 = if index < newest {
            self.history[((index + 1) as usize) & self.mask]
        } else {
            s0
        };
        s0 + frac * (s1 - s0)
    }

    #[inline]
    fn tap_gain(phase: f64) -> f32 {
        (1.0 - (2.0 * phase - 1.0).abs()) as f32
    }
}

impl Default for DelayLineShifter {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

impl PitchShifter for DelayLineShifter {
    fn set_transpose_semitones(&mut self, semitones: f32) {
        self.semitones = semitones;
        self.ratio = 2f64.powf(semitones as f64 / 12.0);
    }

    fn transpose_semitones(&self) -> f32 {
        self.semitones
    }

    fn process(&mut self, input: &[f32], output: &mut [f32]) {
        let unity = self.semitones == 0.0;
        let step = (self.ratio - 1.0) / self.window;

        for (x, y) in input.iter().zip(output.iter_mut()) {
            let n = self.written;
            self.history[(n as usize) & self.mask] = *x;
            if n == 0 {
                self.first = *x;
            }
            self.written += 1;

            if unity {
                *y = *x;
                continue;
            }

            let phase_a = self.phase;
            let phase_b = (self.phase + 0.5).fract();
            let now = n as f64;
            let a = self.read(now - phase_a * self.window, n);
            let b = self.read(now - phase_b * self.window, n);
            *y = Self::tap_gain(phase_a) * a + Self::tap_gain(phase_b) * b;

            // Pitch up shortens the tap delay, pitch down lengthens it.
            self.phase = (self.phase - step).rem_euclid(1.0);
        }
    }

    fn reset(&mut self) {
        self.history.iter_mut().for_each(|s| *s = 0.0);
        self.written = 0;
        self.first = 0.0;
        self.phase = INITIAL_PHASE;
    }
}
