//! Effect trait definition
//!
//! Base trait for all pedal effects. `process` runs on the audio path and
//! must stay bounded: no I/O, no locks, no unbounded allocation.

use serde::{Deserialize, Serialize};

use crate::config::{Config, ConfigValue};
use crate::error::Result;

/// One effect-specific parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Setting {
    Int(i64),
    Float(f32),
    Bool(bool),
    Text(String),
    List(Vec<f32>),
}

impl Setting {
    /// Numeric view of an `Int` or `Float` setting
    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Setting::Int(v) => Some(*v as f32),
            Setting::Float(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<ConfigValue> for Setting {
    fn from(value: ConfigValue) -> Self {
        match value {
            ConfigValue::Int(v) => Setting::Int(v),
            ConfigValue::Float(v) => Setting::Float(v as f32),
            ConfigValue::Bool(v) => Setting::Bool(v),
            ConfigValue::Text(v) => Setting::Text(v),
        }
    }
}

/// State common to all effects
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectParams {
    /// Whether the chain should run this effect
    pub active: bool,
    /// The effect's parameter
    pub setting: Setting,
}

impl EffectParams {
    pub fn new(setting: Setting) -> Self {
        Self {
            active: true,
            setting,
        }
    }
}

/// Base trait for all DSP effects
///
/// An inactive effect is skipped by the chain; `process` itself does not
/// check the flag.
pub trait Effect: Send {
    /// Stable identifier, used as registry key and config key
    fn name(&self) -> &'static str;

    /// Process one sample
    fn process(&mut self, input: f32) -> f32;

    /// Read this effect's entry from `config` and update activity and setting.
    ///
    /// # Errors
    /// * `InvalidSetting` - the value is out of range; previous settings are kept
    fn configure(&mut self, config: &Config) -> Result<()>;

    /// Check if effect is active
    fn is_active(&self) -> bool;

    /// Activate or bypass the effect
    fn set_active(&mut self, active: bool);

    /// Current parameter
    fn setting(&self) -> &Setting;

    /// Replace the parameter without going through a config
    fn set_setting(&mut self, setting: Setting);

    /// Clear any internal state
    fn reset(&mut self) {}

    /// Sample rate of the stream feeding this effect
    fn set_sample_rate(&mut self, _sample_rate: u32) {}

    /// Samples of delay introduced by this effect
    fn latency_samples(&self) -> usize {
        0
    }
}

/// Helper macro to implement the `EffectParams` accessors of the Effect trait
#[macro_export]
macro_rules! impl_effect_common {
    ($effect_name:expr) => {
        fn name(&self) -> &'static str {
            $effect_name
        }

        fn is_active(&self) -> bool {
            self.params.active
        }

        fn set_active(&mut self, active: bool) {
            self.params.active = active;
        }

        fn setting(&self) -> &$crate::dsp::Setting {
            &self.params.setting
        }

        fn set_setting(&mut self, setting: $crate::dsp::Setting) {
            self.params.setting = setting;
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setting_numeric_view() {
        assert_eq!(Setting::Int(150).as_f32(), Some(150.0));
        assert_eq!(Setting::Float(1.5).as_f32(), Some(1.5));
        assert_eq!(Setting::Bool(true).as_f32(), None);
        assert_eq!(Setting::Text("3".into()).as_f32(), None);
    }

    #[test]
    fn test_setting_from_config_value() {
        assert_eq!(Setting::from(ConfigValue::Float(2.0)), Setting::Float(2.0));
        assert_eq!(
            Setting::from(ConfigValue::Text("3 7".into())),
            Setting::Text("3 7".into())
        );
    }
}
