//! Effect registry
//!
//! Maps effect names to constructors so chains can be built from a text list
//! of names. Populated once at startup by [`EffectRegistry::register_builtin`],
//! but late registrations are safe: the map sits behind a read/write lock.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use log::{debug, info, warn};
use parking_lot::RwLock;

use super::fuzz::{Fuzz, FUZZ};
use super::gain::{Gain, GAIN};
use super::harmonizer::{Harmonizer, HARMONIZER};
use super::octave::{OctaveDoubler, OCTAVE_DOUBLER};
use super::Effect;
use crate::error::{Result, StompError};

/// Constructor stored in the registry
pub type Constructor = Arc<dyn Fn() -> Box<dyn Effect> + Send + Sync>;

/// Name -> constructor factory
#[derive(Default)]
pub struct EffectRegistry {
    constructors: RwLock<HashMap<String, Constructor>>,
}

impl EffectRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding every built-in effect
    pub fn with_builtin() -> Self {
        let registry = Self::new();
        registry.register_builtin();
        registry
    }

    /// Register every built-in effect
    pub fn register_builtin(&self) {
        self.register(GAIN, || Box::new(Gain::default()));
        self.register(FUZZ, || Box::new(Fuzz::default()));
        self.register(OCTAVE_DOUBLER, || Box::new(OctaveDoubler::new()));
        self.register(HARMONIZER, || Box::new(Harmonizer::default()));
    }

    /// Register a constructor under `name`. The last registration wins.
    pub fn register<F>(&self, name: &str, constructor: F)
    where
        F: Fn() -> Box<dyn Effect> + Send + Sync + 'static,
    {
        let previous = self
            .constructors
            .write()
            .insert(name.to_string(), Arc::new(constructor));
        if previous.is_some() {
            warn!(
                "[EffectRegistry] Effect '{}' is already registered. Overwriting.",
                name
            );
        } else {
            info!("[EffectRegistry] Registered: {}", name);
        }
    }

    /// Build a fresh instance of `name`
    ///
    /// # Errors
    /// * `EffectNotFound` - nothing is registered under `name`
    pub fn create(&self, name: &str) -> Result<Box<dyn Effect>> {
        // Clone the constructor out so it runs without holding the lock.
        let constructor = self.constructors.read().get(name).cloned();
        match constructor {
            Some(constructor) => {
                debug!("[EffectRegistry] Creating effect: {}", name);
                Ok(constructor())
            }
            None => {
                warn!("[EffectRegistry] Effect not found: {}", name);
                Err(StompError::EffectNotFound {
                    name: name.to_string(),
                })
            }
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constructors.read().contains_key(name)
    }

    /// All registered names, sorted
    pub fn list_names(&self) -> BTreeSet<String> {
        self.constructors.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.constructors.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for EffectRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectRegistry")
            .field("names", &self.list_names())
            .finish()
    }
}
