//! Fuzz Effect
//!
//! Hard clipper at `±(0.01 * multiplier)`.

use crate::config::Config;
use crate::dsp::effect::{Effect, EffectParams, Setting};
use crate::error::{Result, StompError};
use crate::impl_effect_common;

/// Registry and config key
pub const FUZZ: &str = "fuzz";

/// Base clipping threshold, scaled by the multiplier
const BASE_THRESHOLD: f32 = 0.01;

/// Multiplier used when the setting is missing or not numeric
pub const DEFAULT_FUZZ_MULTIPLIER: f32 = 1.0;

/// Hard-clipping fuzz
#[derive(Debug, Clone)]
pub struct Fuzz {
    params: EffectParams,
}

impl Fuzz {
    pub fn new(multiplier: f32) -> Self {
        Self {
            params: EffectParams::new(Setting::Float(multiplier)),
        }
    }

    /// Clipping threshold for the current setting
    pub fn threshold(&self) -> f32 {
        let multiplier = self
            .params
            .setting
            .as_f32()
            .unwrap_or(DEFAULT_FUZZ_MULTIPLIER);
        BASE_THRESHOLD * multiplier
    }
}

impl Default for Fuzz {
    fn default() -> Self {
        Self::new(DEFAULT_FUZZ_MULTIPLIER)
    }
}

impl Effect for Fuzz {
    impl_effect_common!(FUZZ);

    fn process(&mut self, input: f32) -> f32 {
        let threshold = self.threshold().abs();
        input.clamp(-threshold, threshold)
    }

    fn configure(&mut self, config: &Config) -> Result<()> {
        let setting = config
            .value(FUZZ)
            .map(Setting::from)
            .unwrap_or(Setting::Float(DEFAULT_FUZZ_MULTIPLIER));

        if let Some(multiplier) = setting.as_f32() {
            if multiplier <= 0.0 || !multiplier.is_finite() {
                return Err(StompError::invalid_setting(
                    FUZZ,
                    format!("multiplier must be positive, got {}", multiplier),
                ));
            }
        }

        self.params.active = config.contains(FUZZ);
        self.params.setting = setting;
        Ok(())
    }
}
