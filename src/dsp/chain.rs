//! Hot-swappable effect chain
//!
//! Two bounded chains form a double buffer. A rebuild always fills the
//! inactive buffer with fresh effect instances and then publishes it with a
//! single atomic store of the selector, so the audio path sees either the old
//! chain or the new one and never anything in between.
//!
//! The audio path (`apply_effects`) performs an atomic load, then walks the
//! chain. Effects sit behind a mutex that the audio path only ever
//! `try_lock`s: a slot held by the reconfiguration task is bypassed for that
//! single sample instead of blocking.
//!
//! Replaced chains are parked on the rebuild side and only dropped there once
//! no reader holds them, so effect teardown never runs on the audio path.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use serde::Serialize;

use super::{Effect, EffectName, EffectRegistry, Sample};
use crate::config::Config;
use crate::engine::DEFAULT_SAMPLE_RATE;
use crate::error::{Result, StompError};

/// Capacity of a single chain
pub const MAX_EFFECTS: usize = 4;

/// One effect instance plus the name it was registered under
#[derive(Clone)]
pub struct EffectSlot {
    name: EffectName,
    effect: Arc<Mutex<Box<dyn Effect>>>,
}

impl EffectSlot {
    pub fn new(name: &str, effect: Box<dyn Effect>) -> Self {
        Self {
            name: EffectName::new(name),
            effect: Arc::new(Mutex::new(effect)),
        }
    }

    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Shared handle to the effect instance
    pub fn effect(&self) -> &Arc<Mutex<Box<dyn Effect>>> {
        &self.effect
    }
}

impl fmt::Debug for EffectSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectSlot")
            .field("name", &self.name)
            .finish()
    }
}

/// Fixed-capacity ordered list of effect slots
#[derive(Debug, Clone, Default)]
pub struct Chain {
    slots: [Option<EffectSlot>; MAX_EFFECTS],
    count: usize,
}

impl Chain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a slot. Returns false when the chain is full.
    pub fn push(&mut self, slot: EffectSlot) -> bool {
        if self.count >= MAX_EFFECTS {
            return false;
        }
        self.slots[self.count] = Some(slot);
        self.count += 1;
        true
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn is_full(&self) -> bool {
        self.count >= MAX_EFFECTS
    }

    pub fn slot(&self, index: usize) -> Option<&EffectSlot> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    /// Occupied slots in processing order
    pub fn iter(&self) -> impl Iterator<Item = &EffectSlot> {
        self.slots[..self.count].iter().flatten()
    }

    pub fn names(&self) -> Vec<String> {
        self.iter().map(|slot| slot.name().to_string()).collect()
    }
}

/// Outcome of a chain rebuild
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadSummary {
    /// Effects now in the chain, in order
    pub loaded: Vec<String>,
    /// Names the registry did not know
    pub skipped: Vec<String>,
    /// Names dropped because the chain was full
    pub truncated: Vec<String>,
}

impl LoadSummary {
    /// Every requested name made it into the chain
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty() && self.truncated.is_empty()
    }
}

/// Double-buffered, atomically published effect chain
pub struct DigitalSignalChain {
    registry: Arc<EffectRegistry>,
    chains: [ArcSwap<Chain>; 2],
    active: AtomicUsize,
    /// Serializes rebuilds and holds chains that readers may still see
    retired: Mutex<Vec<Arc<Chain>>>,
    faults: AtomicU64,
    sample_rate: AtomicU32,
}

impl DigitalSignalChain {
    /// Empty chain resolving names through `registry`
    pub fn new(registry: Arc<EffectRegistry>) -> Self {
        Self {
            registry,
            chains: [
                ArcSwap::from_pointee(Chain::new()),
                ArcSwap::from_pointee(Chain::new()),
            ],
            active: AtomicUsize::new(0),
            retired: Mutex::new(Vec::new()),
            faults: AtomicU64::new(0),
            sample_rate: AtomicU32::new(DEFAULT_SAMPLE_RATE),
        }
    }

    pub fn registry(&self) -> &Arc<EffectRegistry> {
        &self.registry
    }

    // =========================================================================
    // Rebuild (reconfiguration task)
    // =========================================================================

    /// Build a chain from effect names and publish it.
    ///
    /// Names are trimmed and blank ones ignored. Unknown names are logged and
    /// skipped; names past [`MAX_EFFECTS`] are logged and dropped. The new
    /// effects keep their constructor defaults; use [`Self::load_configured`]
    /// to publish them already configured.
    pub fn load_from_names<I, S>(&self, names: I) -> LoadSummary
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.rebuild(names, None)
    }

    /// Like [`Self::load_from_names`], but every new effect is configured
    /// from `config` before the chain becomes visible. The config's update
    /// flag is left alone.
    pub fn load_configured<I, S>(&self, names: I, config: &Config) -> LoadSummary
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.rebuild(names, Some(config))
    }

    /// Load an effect list file (one name per line) and publish it.
    ///
    /// # Errors
    /// * `FileNotFound` - the file cannot be read; the active chain is untouched
    pub fn load_from_file(&self, path: &Path) -> Result<LoadSummary> {
        let text = read_effect_list(path)?;
        let summary = self.rebuild(text.lines(), None);
        info!(
            "[DigitalSignalChain] Loaded {} effects from {}",
            summary.loaded.len(),
            path.display()
        );
        Ok(summary)
    }

    /// Load an effect list file and publish it configured from `config`
    ///
    /// # Errors
    /// * `FileNotFound` - the file cannot be read; the active chain is untouched
    pub fn load_file_configured(&self, path: &Path, config: &Config) -> Result<LoadSummary> {
        let text = read_effect_list(path)?;
        let summary = self.rebuild(text.lines(), Some(config));
        info!(
            "[DigitalSignalChain] Loaded {} configured effects from {}",
            summary.loaded.len(),
            path.display()
        );
        Ok(summary)
    }

    /// Publish one instance of every registered effect
    pub fn register_all(&self) -> LoadSummary {
        // BTreeSet: already unique and sorted
        let names = self.registry.list_names();
        self.rebuild(names, None)
    }

    /// Publish an empty chain
    pub fn clear(&self) {
        let mut retired = self.retired.lock();
        self.publish(&mut retired, Chain::new());
    }

    fn rebuild<I, S>(&self, names: I, config: Option<&Config>) -> LoadSummary
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut retired = self.retired.lock();
        let mut staging = Chain::new();
        let mut summary = LoadSummary::default();

        for name in names {
            let name = name.as_ref().trim();
            if name.is_empty() {
                continue;
            }
            if staging.is_full() {
                summary.truncated.push(name.to_string());
                continue;
            }
            match self.registry.create(name) {
                Ok(effect) => {
                    info!("[DigitalSignalChain] Loaded effect: {}", name);
                    staging.push(EffectSlot::new(name, effect));
                    summary.loaded.push(name.to_string());
                }
                Err(e) => {
                    warn!("[DigitalSignalChain] Skipping '{}': {}", name, e);
                    summary.skipped.push(name.to_string());
                }
            }
        }

        if !summary.truncated.is_empty() {
            warn!(
                "[DigitalSignalChain] Chain holds at most {} effects, dropped: {}",
                MAX_EFFECTS,
                summary.truncated.join(", ")
            );
        }

        let sample_rate = self.sample_rate();
        for slot in staging.iter() {
            slot.effect.lock().set_sample_rate(sample_rate);
            if let Some(config) = config {
                configure_slot(slot, config);
            }
        }

        self.publish(&mut retired, staging);
        summary
    }

    /// Make `chain` active. `retired` is the locked rebuild state.
    fn publish(&self, retired: &mut Vec<Arc<Chain>>, chain: Chain) {
        // Chains nobody else references can be freed here, off the audio path.
        retired.retain(|old| Arc::strong_count(old) > 1);

        let inactive = 1 - self.active.load(Ordering::Acquire);
        let previous = self.chains[inactive].swap(Arc::new(chain));
        self.active.store(inactive, Ordering::Release);
        retired.push(previous);
        debug!("[DigitalSignalChain] Published chain buffer {}", inactive);
    }

    // =========================================================================
    // Audio path
    // =========================================================================

    /// Run `sample` through the active chain.
    ///
    /// Inactive slots and slots currently being reconfigured are skipped. If
    /// an effect panics or returns a non-finite value the sample goes back to
    /// its value before this call, the rest of the pass is skipped and the
    /// fault counter is incremented. Trail entries already added are kept.
    pub fn apply_effects(&self, sample: &mut Sample) {
        let chain = self.chains[self.active.load(Ordering::Acquire)].load();
        let original = sample.pcm_value();

        for slot in chain.iter() {
            let Some(mut effect) = slot.effect.try_lock() else {
                continue;
            };
            if !effect.is_active() {
                continue;
            }

            let input = sample.pcm_value();
            let output = panic::catch_unwind(AssertUnwindSafe(|| effect.process(input)));
            match output {
                Ok(value) if value.is_finite() => {
                    sample.set_pcm_value(value);
                    sample.add_effect(slot.name);
                }
                _ => {
                    sample.set_pcm_value(original);
                    self.faults.fetch_add(1, Ordering::Relaxed);
                    return;
                }
            }
        }
    }

    /// Number of processing faults caught so far
    pub fn fault_count(&self) -> u64 {
        self.faults.load(Ordering::Relaxed)
    }

    // =========================================================================
    // Reconfiguration
    // =========================================================================

    /// Push the current config into every effect of the active chain.
    ///
    /// Does nothing unless `config` has a pending update. A failing effect is
    /// logged and keeps its previous settings. The update flag is cleared
    /// once every slot has been attempted, unless the config was edited
    /// while the pass ran; then it stays raised for the next pass. Returns
    /// the number of effects configured successfully.
    pub fn configure_effects(&self, config: &Config) -> usize {
        if !config.has_update() {
            return 0;
        }
        let seen = config.generation();

        let chain = self.active_chain();
        let configured = chain
            .iter()
            .filter(|slot| configure_slot(slot, config))
            .count();

        if !config.clear_update_since(seen) {
            debug!("[DigitalSignalChain] Config changed during configure pass");
        }
        configured
    }

    /// Tell every effect, current and future, the stream's sample rate
    pub fn set_sample_rate(&self, sample_rate: u32) {
        let _rebuild = self.retired.lock();
        let sample_rate = sample_rate.max(1);
        self.sample_rate.store(sample_rate, Ordering::Release);
        for slot in self.active_chain().iter() {
            slot.effect.lock().set_sample_rate(sample_rate);
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate.load(Ordering::Acquire)
    }

    /// Reset the internal state of every effect in the active chain
    pub fn reset(&self) {
        for slot in self.active_chain().iter() {
            slot.effect.lock().reset();
        }
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    fn active_chain(&self) -> Arc<Chain> {
        self.chains[self.active.load(Ordering::Acquire)].load_full()
    }

    /// Run `f` against the currently published chain
    pub fn with_active_chain<R>(&self, f: impl FnOnce(&Chain) -> R) -> R {
        let chain = self.chains[self.active.load(Ordering::Acquire)].load();
        f(&chain)
    }

    /// Names in the active chain, in processing order
    pub fn active_names(&self) -> Vec<String> {
        self.with_active_chain(Chain::names)
    }

    pub fn len(&self) -> usize {
        self.with_active_chain(Chain::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total delay of the active effects in the chain
    pub fn latency_samples(&self) -> usize {
        self.with_active_chain(|chain| {
            chain
                .iter()
                .map(|slot| slot.effect.lock())
                .filter(|effect| effect.is_active())
                .map(|effect| effect.latency_samples())
                .sum()
        })
    }
}

/// Configure one slot, logging failures. Returns true on success.
fn configure_slot(slot: &EffectSlot, config: &Config) -> bool {
    let mut effect = slot.effect.lock();
    match panic::catch_unwind(AssertUnwindSafe(|| effect.configure(config))) {
        Ok(Ok(())) => {
            debug!(
                "[DigitalSignalChain] Configured {} (active: {})",
                slot.name,
                effect.is_active()
            );
            true
        }
        Ok(Err(e)) => {
            error!("[DigitalSignalChain] Failed to configure {}: {}", slot.name, e);
            false
        }
        Err(_) => {
            let fault = StompError::ProcessingFault {
                effect: slot.name().to_string(),
            };
            error!("[DigitalSignalChain] {} during configure", fault);
            false
        }
    }
}

fn read_effect_list(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| {
        warn!(
            "[DigitalSignalChain] Cannot open effect list {}: {}",
            path.display(),
            e
        );
        StompError::FileNotFound {
            path: path.display().to_string(),
            source: Some(e),
        }
    })
}

impl fmt::Debug for DigitalSignalChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DigitalSignalChain")
            .field("active", &self.active_names())
            .field("faults", &self.fault_count())
            .finish()
    }
}
