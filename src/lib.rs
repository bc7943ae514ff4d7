//! Stompbox - real-time effects pedal core
//!
//! Every incoming PCM value becomes a [`dsp::Sample`], runs through a
//! hot-swappable [`dsp::DigitalSignalChain`] and is emitted. The chain and the
//! settings of its effects can change at any time from outside the audio path.
//!
//! # Architecture
//!
//! - [`config`]: thread-safe settings store, config-file grammar, reload worker
//! - [`dsp`]: effects, the effect registry, the double-buffered chain and the
//!   harmonizer
//! - [`engine`]: the audio I/O boundary and the per-sample stream loop

pub mod cli;
pub mod config;
pub mod dsp;
pub mod engine;
pub mod error;

pub use error::{Result, StompError};
