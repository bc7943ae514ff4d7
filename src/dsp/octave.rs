//! Octave doubler
//!
//! Full-wave rectification (`|x|`) folds the negative half-cycles up, which
//! doubles the fundamental: a cheap, stable octave-up.

use crate::config::Config;
use crate::dsp::effect::{Effect, EffectParams, Setting};
use crate::error::Result;
use crate::impl_effect_common;

/// Registry and config key
pub const OCTAVE_DOUBLER: &str = "octavedoubler";

#[derive(Debug, Clone)]
pub struct OctaveDoubler {
    params: EffectParams,
}

impl OctaveDoubler {
    pub fn new() -> Self {
        Self {
            params: EffectParams::new(Setting::Bool(true)),
        }
    }
}

impl Default for OctaveDoubler {
    fn default() -> Self {
        Self::new()
    }
}

impl Effect for OctaveDoubler {
    impl_effect_common!(OCTAVE_DOUBLER);

    fn process(&mut self, input: f32) -> f32 {
        input.abs()
    }

    fn configure(&mut self, config: &Config) -> Result<()> {
        self.params.active = config.contains(OCTAVE_DOUBLER);
        if let Some(value) = config.value(OCTAVE_DOUBLER) {
            self.params.setting = Setting::from(value);
        }
        Ok(())
    }
}
