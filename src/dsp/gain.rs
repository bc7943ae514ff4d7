//! Gain Effect
//!
//! Percentage volume control: `output = input * percent / 100`.

use crate::config::Config;
use crate::dsp::effect::{Effect, EffectParams, Setting};
use crate::error::{Result, StompError};
use crate::impl_effect_common;

// ============================================================================
// Constants
// ============================================================================

/// Registry and config key
pub const GAIN: &str = "gain";

/// Unity gain in percent, used when the setting is missing or not numeric
pub const DEFAULT_GAIN_PERCENT: f32 = 100.0;

// ============================================================================
// Gain Effect
// ============================================================================

/// Simple percentage gain
///
/// # Parameters
/// - `setting`: gain in percent (`Int` or `Float`), 100 = unity
#[derive(Debug, Clone)]
pub struct Gain {
    params: EffectParams,
}

impl Gain {
    /// Create a gain at `percent`
    pub fn new(percent: f32) -> Self {
        Self {
            params: EffectParams::new(Setting::Float(percent)),
        }
    }

    /// Effective gain in percent
    pub fn percent(&self) -> f32 {
        self.params
            .setting
            .as_f32()
            .unwrap_or(DEFAULT_GAIN_PERCENT)
    }
}

impl Default for Gain {
    fn default() -> Self {
        Self::new(DEFAULT_GAIN_PERCENT)
    }
}

impl Effect for Gain {
    impl_effect_common!(GAIN);

    fn process(&mut self, input: f32) -> f32 {
        input * (0.01 * self.percent())
    }

    fn configure(&mut self, config: &Config) -> Result<()> {
        let setting = config
            .value(GAIN)
            .map(Setting::from)
            .unwrap_or(Setting::Float(DEFAULT_GAIN_PERCENT));

        if let Some(percent) = setting.as_f32() {
            if percent < 0.0 || !percent.is_finite() {
                return Err(StompError::invalid_setting(
                    GAIN,
                    format!("percent must be a non-negative number, got {}", percent),
                ));
            }
        }

        self.params.active = config.contains(GAIN);
        self.params.setting = setting;
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_unity_gain() {
        let mut gain = Gain::default();
        assert_abs_diff_eq!(gain.process(1.0), 1.0, epsilon = 0.01);
    }

    #[test]
    fn test_gain_doubling() {
        let mut gain = Gain::new(200.0);
        assert_abs_diff_eq!(gain.process(0.5), 1.0, epsilon = 0.01);
    }

    #[test]
    fn test_configure_from_int_percent() {
        let config = Config::new();
        config.set(GAIN, true, 50i64);
        let mut gain = Gain::default();
        gain.configure(&config).unwrap();
        assert!(gain.is_active());
        assert_eq!(gain.setting(), &Setting::Int(50));
        assert_abs_diff_eq!(gain.process(0.8), 0.4, epsilon = 1e-6);
    }

    #[test]
    fn test_configure_missing_key_deactivates() {
        let config = Config::new();
        let mut gain = Gain::new(300.0);
        gain.configure(&config).unwrap();
        assert!(!gain.is_active());
        assert_eq!(gain.percent(), DEFAULT_GAIN_PERCENT);
    }

    #[test]
    fn test_non_numeric_setting_falls_back_to_unity() {
        let config = Config::new();
        config.set(GAIN, true, "loud");
        let mut gain = Gain::default();
        gain.configure(&config).unwrap();
        assert_eq!(gain.process(0.3), 0.3);
    }

    #[test]
    fn test_negative_percent_keeps_previous_setting() {
        let config = Config::new();
        config.set(GAIN, true, -20i64);
        let mut gain = Gain::new(150.0);
        let err = gain.configure(&config).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_SETTING");
        assert_eq!(gain.percent(), 150.0);
    }
}
