//! Per-frame sample with its diagnostic effect trail
//!
//! Nothing here allocates: effect names are stored inline and the trail has a
//! fixed capacity, so samples can be created on the audio path.

use std::fmt;

use serde::{Serialize, Serializer};

/// Maximum bytes kept from an effect name
pub const EFFECT_NAME_CAPACITY: usize = 32;

/// Maximum trail entries recorded per sample
pub const TRAIL_CAPACITY: usize = 16;

/// Fixed-capacity inline effect name
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct EffectName {
    bytes: [u8; EFFECT_NAME_CAPACITY],
    len: u8,
}

impl EffectName {
    /// Build a name, truncating on a char boundary if it is too long
    pub fn new(name: &str) -> Self {
        let mut end = name.len().min(EFFECT_NAME_CAPACITY);
        while !name.is_char_boundary(end) {
            end -= 1;
        }
        let mut bytes = [0u8; EFFECT_NAME_CAPACITY];
        bytes[..end].copy_from_slice(&name.as_bytes()[..end]);
        Self {
            bytes,
            len: end as u8,
        }
    }

    pub fn as_str(&self) -> &str {
        // Only ever filled from a &str cut on a char boundary.
        std::str::from_utf8(&self.bytes[..self.len as usize]).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Default for EffectName {
    fn default() -> Self {
        Self::new("")
    }
}

impl fmt::Debug for EffectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.as_str())
    }
}

impl fmt::Display for EffectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl PartialEq<str> for EffectName {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl PartialEq<&str> for EffectName {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

impl Serialize for EffectName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Append-only list of effects that touched a sample, in application order
#[derive(Clone, Copy, Default)]
pub struct Trail {
    entries: [EffectName; TRAIL_CAPACITY],
    len: usize,
    dropped: usize,
}

impl Trail {
    /// Record an effect. Entries past capacity are counted, not stored.
    pub fn push(&mut self, name: EffectName) {
        if self.len < TRAIL_CAPACITY {
            self.entries[self.len] = name;
            self.len += 1;
        } else {
            self.dropped += 1;
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Entries that did not fit
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries[..self.len].iter().map(EffectName::as_str)
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.iter().map(str::to_string).collect()
    }
}

impl fmt::Debug for Trail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

/// A single PCM value flowing through the chain
#[derive(Debug, Clone, Copy)]
pub struct Sample {
    pcm_value: f32,
    time_index: f64,
    trail: Trail,
}

impl Sample {
    /// Create a sample. Non-finite input is replaced by silence.
    pub fn new(pcm_value: f32, time_index: f64) -> Self {
        Self {
            pcm_value: sanitize(pcm_value),
            time_index,
            trail: Trail::default(),
        }
    }

    pub fn pcm_value(&self) -> f32 {
        self.pcm_value
    }

    /// Set the PCM value. Non-finite values are replaced by silence.
    pub fn set_pcm_value(&mut self, value: f32) {
        self.pcm_value = sanitize(value);
    }

    pub fn time_index(&self) -> f64 {
        self.time_index
    }

    /// Record that `name` processed this sample
    pub fn add_effect(&mut self, name: EffectName) {
        self.trail.push(name);
    }

    pub fn trail(&self) -> &Trail {
        &self.trail
    }
}

#[inline]
fn sanitize(value: f32) -> f32 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}
