//! Runtime configuration store
//!
//! `Config` maps a key to an enabled flag plus a typed value. Readers
//! (`get`, `contains`, `value`) share a read lock; writers (`set`,
//! `load_from_file`) take it exclusively. Every write raises the dirty flag
//! that `DigitalSignalChain::configure_effects` consumes, and bumps an edit
//! generation so a consumer only clears the flag for edits it has seen.

mod parse;
mod reload;

pub use parse::{infer_value, parse_line, ConfigLine, LineError};
pub use reload::{ReloadTrigger, ReloadWorker, ReloadWorkerBuilder};

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use log::{info, warn};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::{Result, StompError};

/// A typed config value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConfigValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
}

impl From<i64> for ConfigValue {
    fn from(v: i64) -> Self {
        ConfigValue::Int(v)
    }
}

impl From<i32> for ConfigValue {
    fn from(v: i32) -> Self {
        ConfigValue::Int(v as i64)
    }
}

impl From<f64> for ConfigValue {
    fn from(v: f64) -> Self {
        ConfigValue::Float(v)
    }
}

impl From<f32> for ConfigValue {
    fn from(v: f32) -> Self {
        ConfigValue::Float(v as f64)
    }
}

impl From<bool> for ConfigValue {
    fn from(v: bool) -> Self {
        ConfigValue::Bool(v)
    }
}

impl From<&str> for ConfigValue {
    fn from(v: &str) -> Self {
        ConfigValue::Text(v.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(v: String) -> Self {
        ConfigValue::Text(v)
    }
}

/// Types that can be fetched out of a [`ConfigValue`] with an exact type match
pub trait FromConfigValue: Sized {
    fn from_config_value(value: &ConfigValue) -> Option<Self>;
}

impl FromConfigValue for i64 {
    fn from_config_value(value: &ConfigValue) -> Option<Self> {
        match value {
            ConfigValue::Int(v) => Some(*v),
            _ => None,
        }
    }
}

impl FromConfigValue for i32 {
    fn from_config_value(value: &ConfigValue) -> Option<Self> {
        match value {
            ConfigValue::Int(v) => i32::try_from(*v).ok(),
            _ => None,
        }
    }
}

impl FromConfigValue for f64 {
    fn from_config_value(value: &ConfigValue) -> Option<Self> {
        match value {
            ConfigValue::Float(v) => Some(*v),
            _ => None,
        }
    }
}

impl FromConfigValue for f32 {
    fn from_config_value(value: &ConfigValue) -> Option<Self> {
        match value {
            ConfigValue::Float(v) => Some(*v as f32),
            _ => None,
        }
    }
}

impl FromConfigValue for bool {
    fn from_config_value(value: &ConfigValue) -> Option<Self> {
        match value {
            ConfigValue::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

impl FromConfigValue for String {
    fn from_config_value(value: &ConfigValue) -> Option<Self> {
        match value {
            ConfigValue::Text(v) => Some(v.clone()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
struct Entry {
    enabled: bool,
    value: ConfigValue,
}

/// Thread-safe key -> (enabled, value) store with a dirty flag
#[derive(Debug, Default)]
pub struct Config {
    entries: RwLock<HashMap<String, Entry>>,
    updated: AtomicBool,
    generation: AtomicU64,
}

fn apply(entries: &mut HashMap<String, Entry>, key: &str, enabled: bool, value: ConfigValue) {
    if enabled {
        entries.insert(key.to_string(), Entry { enabled, value });
    } else {
        entries.remove(key);
    }
}

impl Config {
    /// Create an empty config
    pub fn new() -> Self {
        Self::default()
    }

    /// Upsert `key` when `enabled`, remove it otherwise. Always marks the
    /// config as updated.
    pub fn set(&self, key: &str, enabled: bool, value: impl Into<ConfigValue>) {
        apply(&mut self.entries.write(), key, enabled, value.into());
        self.mark_updated();
    }

    /// Remove `key` entirely (same as `set(key, false, ..)`)
    pub fn remove(&self, key: &str) {
        self.entries.write().remove(key);
        self.mark_updated();
    }

    /// Type-checked fetch. Missing, disabled or mismatched keys yield `default`.
    pub fn get<T: FromConfigValue>(&self, key: &str, default: T) -> T {
        let entries = self.entries.read();
        entries
            .get(key)
            .filter(|entry| entry.enabled)
            .and_then(|entry| T::from_config_value(&entry.value))
            .unwrap_or(default)
    }

    /// Untyped fetch of an enabled entry
    pub fn value(&self, key: &str) -> Option<ConfigValue> {
        let entries = self.entries.read();
        entries
            .get(key)
            .filter(|entry| entry.enabled)
            .map(|entry| entry.value.clone())
    }

    /// True only if `key` is present and enabled
    pub fn contains(&self, key: &str) -> bool {
        self.entries
            .read()
            .get(key)
            .map(|entry| entry.enabled)
            .unwrap_or(false)
    }

    /// Sorted list of enabled keys
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .entries
            .read()
            .iter()
            .filter(|(_, entry)| entry.enabled)
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        keys
    }

    /// Number of enabled entries
    pub fn len(&self) -> usize {
        self.entries.read().values().filter(|e| e.enabled).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the config changed since the last `clear_update`
    pub fn has_update(&self) -> bool {
        self.updated.load(Ordering::SeqCst)
    }

    /// Unconditionally clear the dirty flag
    pub fn clear_update(&self) {
        self.updated.store(false, Ordering::SeqCst);
    }

    /// Edit counter, bumped by every write
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Clear the dirty flag unless an edit landed after `seen` was read.
    /// Returns whether the flag ended up cleared.
    pub fn clear_update_since(&self, seen: u64) -> bool {
        self.updated.store(false, Ordering::SeqCst);
        // A writer bumps the generation before raising the flag, so any edit
        // racing with the store above is either seen here or re-raises it.
        if self.generation.load(Ordering::SeqCst) != seen {
            self.updated.store(true, Ordering::SeqCst);
            return false;
        }
        true
    }

    /// Mark the config dirty without changing any entry
    pub fn mark_updated(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.updated.store(true, Ordering::SeqCst);
    }

    /// Apply every valid line of `text`, returning how many were applied.
    /// Malformed lines are logged and skipped.
    ///
    /// All lines are applied under one write lock, so readers see either none
    /// or all of them.
    pub fn load_from_str(&self, text: &str) -> usize {
        let mut lines = Vec::new();
        for (index, line) in text.lines().enumerate() {
            match parse_line(line) {
                Ok(Some(parsed)) => lines.push(parsed),
                Ok(None) => {}
                Err(e) => warn!("[Config] Skipping line {}: {} ({:?})", index + 1, e, line),
            }
        }
        if lines.is_empty() {
            return 0;
        }

        {
            let mut entries = self.entries.write();
            for ConfigLine {
                key,
                enabled,
                value,
            } in &lines
            {
                apply(&mut entries, key, *enabled, value.clone());
            }
        }
        self.mark_updated();
        lines.len()
    }

    /// Read a config file and apply every valid line.
    ///
    /// # Errors
    /// * `FileNotFound` - the file cannot be opened; the store is untouched
    pub fn load_from_file(&self, path: &Path) -> Result<usize> {
        let text = std::fs::read_to_string(path).map_err(|e| StompError::FileNotFound {
            path: path.display().to_string(),
            source: Some(e),
        })?;
        let applied = self.load_from_str(&text);
        info!(
            "[Config] Loaded {} entries from {}",
            applied,
            path.display()
        );
        Ok(applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Arc;
    use tempfile::NamedTempFile;

    #[test]
    fn test_set_then_get_round_trip() {
        let config = Config::new();
        config.set("gain", true, 150.0f64);
        assert_eq!(config.get("gain", 100.0f64), 150.0);
        assert!(config.contains("gain"));
    }

    #[test]
    fn test_disabled_entry_is_absent() {
        let config = Config::new();
        config.set("gain", true, 150i64);
        config.set("gain", false, 150i64);
        assert!(!config.contains("gain"));
        assert_eq!(config.get("gain", 100i64), 100);
        assert_eq!(config.value("gain"), None);
    }

    #[test]
    fn test_type_mismatch_returns_default() {
        let config = Config::new();
        config.set("fuzz", true, "loud");
        assert_eq!(config.get("fuzz", 1.0f32), 1.0);
        assert_eq!(config.get("fuzz", String::new()), "loud");
        assert_eq!(config.get("missing", 7i32), 7);
    }

    #[test]
    fn test_update_flag() {
        let config = Config::new();
        assert!(!config.has_update());
        config.set("gain", false, 0i64);
        assert!(config.has_update());
        config.clear_update();
        assert!(!config.has_update());
    }

    #[test]
    fn test_load_from_str_skips_bad_lines() {
        let config = Config::new();
        let applied = config.load_from_str(
            "# pedal settings\n\
             gain, on, 200\n\
             fuzz, on, 1.5 # threshold multiplier\n\
             broken line\n\
             harmonizer, on, 3 7\n\
             octavedoubler, off, true\n",
        );
        assert_eq!(applied, 4);
        assert_eq!(config.get("gain", 0i64), 200);
        assert_eq!(config.get("fuzz", 0.0f64), 1.5);
        assert_eq!(config.get("harmonizer", String::new()), "3 7");
        assert!(!config.contains("octavedoubler"));
        assert_eq!(config.keys(), vec!["fuzz", "gain", "harmonizer"]);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "gain, 1, 50").unwrap();
        let config = Config::new();
        assert_eq!(config.load_from_file(file.path()).unwrap(), 1);
        assert_eq!(config.get("gain", 0i64), 50);
    }

    #[test]
    fn test_load_missing_file_keeps_state() {
        let config = Config::new();
        config.set("gain", true, 80i64);
        config.clear_update();
        let err = config
            .load_from_file(Path::new("/definitely/not/here.cfg"))
            .unwrap_err();
        assert_eq!(err.error_code(), "FILE_NOT_FOUND");
        assert_eq!(config.get("gain", 0i64), 80);
        assert!(!config.has_update());
    }

    #[test]
    fn test_clear_update_since_keeps_newer_edits() {
        let config = Config::new();
        config.set("gain", true, 200i64);
        let seen = config.generation();
        config.set("gain", true, 300i64);
        assert!(!config.clear_update_since(seen));
        assert!(config.has_update());

        let seen = config.generation();
        assert!(config.clear_update_since(seen));
        assert!(!config.has_update());
    }

    #[test]
    fn test_file_is_applied_all_at_once() {
        let config = Arc::new(Config::new());
        let text = "gain, on, 1\nfuzz, on, 1.0\noctavedoubler, on, true\n";
        let reader = {
            let config = Arc::clone(&config);
            std::thread::spawn(move || {
                for _ in 0..2000 {
                    let n = config.len();
                    assert!(n == 0 || n == 3, "saw {} entries", n);
                }
            })
        };
        for _ in 0..200 {
            assert_eq!(config.load_from_str(text), 3);
            config.load_from_str("gain, off, 0\nfuzz, off, 0\noctavedoubler, off, 0\n");
        }
        reader.join().unwrap();
    }

    #[test]
    fn test_concurrent_readers_and_writer() {
        let config = Arc::new(Config::new());
        let writer = {
            let config = Arc::clone(&config);
            std::thread::spawn(move || {
                for i in 0..1000i64 {
                    config.set("gain", i % 2 == 0, i);
                }
            })
        };
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let config = Arc::clone(&config);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        let v = config.get("gain", -1i64);
                        assert!(v == -1 || v % 2 == 0);
                    }
                })
            })
            .collect();
        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
    }
}
