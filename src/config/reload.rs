//! Reload trigger and reload worker
//!
//! An external event (SIGUSR1, a UI edit, a test) may only raise an atomic
//! flag. The worker thread notices the flag, re-reads files and reconfigures
//! the chain outside of the signal context and outside of the audio path.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use log::{debug, info, warn};

use super::Config;
use crate::dsp::DigitalSignalChain;
use crate::error::Result;

/// Default interval between flag checks
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Async-signal-safe reload request flag
#[derive(Debug, Clone, Default)]
pub struct ReloadTrigger {
    pending: Arc<AtomicBool>,
}

impl ReloadTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a reload. A single atomic store, safe from a signal handler.
    pub fn notify(&self) {
        self.pending.store(true, Ordering::Release);
    }

    /// Consume a pending request
    pub fn take(&self) -> bool {
        self.pending.swap(false, Ordering::AcqRel)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    /// Route SIGUSR1 to this trigger. The installed handler only stores `true`.
    #[cfg(unix)]
    pub fn install_signal_handler(&self) -> Result<()> {
        signal_hook::flag::register(signal_hook::consts::SIGUSR1, Arc::clone(&self.pending))?;
        info!("[Reload] SIGUSR1 reload handler installed");
        Ok(())
    }

    #[cfg(not(unix))]
    pub fn install_signal_handler(&self) -> Result<()> {
        warn!("[Reload] Signal-driven reload is only available on Unix");
        Ok(())
    }
}

/// One reload step, shared by the worker thread and by direct callers
struct ReloadTask {
    config: Arc<Config>,
    chain: Arc<DigitalSignalChain>,
    trigger: ReloadTrigger,
    config_path: Option<PathBuf>,
    chain_path: Option<PathBuf>,
}

impl ReloadTask {
    /// Returns true if the chain was reconfigured
    fn run_once(&self) -> bool {
        if self.trigger.take() {
            debug!("[Reload] Reload requested");
            if let Some(path) = &self.config_path {
                if let Err(e) = self.config.load_from_file(path) {
                    warn!("[Reload] Keeping current config: {}", e);
                }
            }
            // Settings first, so the new chain goes live already configured.
            if let Some(path) = &self.chain_path {
                if let Err(e) = self.chain.load_file_configured(path, &self.config) {
                    warn!("[Reload] Keeping current chain: {}", e);
                }
            }
            self.config.mark_updated();
        }

        if self.config.has_update() {
            self.chain.configure_effects(&self.config);
            return true;
        }
        false
    }
}

/// Builder for [`ReloadWorker`]
pub struct ReloadWorkerBuilder {
    task: ReloadTask,
    poll_interval: Duration,
}

impl ReloadWorkerBuilder {
    /// Re-read this config file on every trigger
    pub fn config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.task.config_path = Some(path.into());
        self
    }

    /// Re-read this effect list on every trigger and republish the chain
    pub fn chain_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.task.chain_path = Some(path.into());
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Start the worker thread
    pub fn spawn(self) -> Result<ReloadWorker> {
        let running = Arc::new(AtomicBool::new(true));
        let passes = Arc::new(AtomicU64::new(0));

        let handle = {
            let running = Arc::clone(&running);
            let passes = Arc::clone(&passes);
            let task = self.task;
            let interval = self.poll_interval;
            std::thread::Builder::new()
                .name("stompbox-reload".to_string())
                .spawn(move || {
                    while running.load(Ordering::Acquire) {
                        if task.run_once() {
                            passes.fetch_add(1, Ordering::Relaxed);
                        }
                        std::thread::sleep(interval);
                    }
                    debug!("[Reload] Worker stopped");
                })?
        };

        Ok(ReloadWorker {
            running,
            passes,
            handle: Some(handle),
        })
    }
}

/// Background task that applies reload requests
pub struct ReloadWorker {
    running: Arc<AtomicBool>,
    passes: Arc<AtomicU64>,
    handle: Option<JoinHandle<()>>,
}

impl ReloadWorker {
    pub fn builder(
        config: Arc<Config>,
        chain: Arc<DigitalSignalChain>,
        trigger: ReloadTrigger,
    ) -> ReloadWorkerBuilder {
        ReloadWorkerBuilder {
            task: ReloadTask {
                config,
                chain,
                trigger,
                config_path: None,
                chain_path: None,
            },
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Number of configure passes the worker has run
    pub fn passes(&self) -> u64 {
        self.passes.load(Ordering::Relaxed)
    }

    /// Stop and join the worker thread
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("[Reload] Worker thread panicked");
            }
        }
    }
}

impl Drop for ReloadWorker {
    fn drop(&mut self) {
        self.stop();
    }
}
