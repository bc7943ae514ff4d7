//! Pedal DSP core
//!
//! Effects, the name-keyed registry that builds them, and the hot-swappable
//! chain that runs them on every sample.

mod chain;
mod effect;
mod fuzz;
mod gain;
pub mod harmonizer;
mod octave;
mod registry;
mod sample;

pub use chain::{Chain, DigitalSignalChain, EffectSlot, LoadSummary, MAX_EFFECTS};
pub use effect::{Effect, EffectParams, Setting};
pub use fuzz::{Fuzz, DEFAULT_FUZZ_MULTIPLIER, FUZZ};
pub use gain::{Gain, DEFAULT_GAIN_PERCENT, GAIN};
pub use harmonizer::{ChordRenderer, Harmonizer, HARMONIZER};
pub use octave::{OctaveDoubler, OCTAVE_DOUBLER};
pub use registry::{Constructor, EffectRegistry};
pub use sample::{EffectName, Sample, Trail, EFFECT_NAME_CAPACITY, TRAIL_CAPACITY};
