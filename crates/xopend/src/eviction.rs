//! Periodic eviction sweep over the daemon's tables.

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{RecvTimeoutError, Sender, bounded};
use thiserror::Error;
use tracing::{debug, info};

use crate::cache::ResultCache;
use crate::names::NameTable;

const EVICTION_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::eviction");

/// A structure that can shed stale entries.
pub trait Evict: Send + Sync {
    /// Label used in logs.
    fn label(&self) -> &'static str;

    /// Removes stale entries and returns how many were dropped.
    fn evict(&self) -> usize;
}

impl Evict for ResultCache {
    fn label(&self) -> &'static str {
        "result_cache"
    }

    fn evict(&self) -> usize {
        Self::evict(self)
    }
}

impl Evict for NameTable {
    fn label(&self) -> &'static str {
        "name_table"
    }

    fn evict(&self) -> usize {
        Self::evict(self)
    }
}

/// Errors surfaced by the eviction daemon.
#[derive(Debug, Error)]
pub enum EvictionError {
    /// The sweep thread could not be spawned.
    #[error("failed to spawn eviction thread: {source}")]
    Spawn {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The sweep thread panicked.
    #[error("eviction thread panicked")]
    ThreadPanic,
}

/// Background loop that sweeps every target once per interval.
pub struct EvictionDaemon {
    interval: Duration,
    targets: Vec<Arc<dyn Evict>>,
}

impl EvictionDaemon {
    /// Creates a daemon sweeping every `interval`.
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            targets: Vec::new(),
        }
    }

    /// Adds a structure to sweep.
    #[must_use]
    pub fn with_target(mut self, target: Arc<dyn Evict>) -> Self {
        self.targets.push(target);
        self
    }

    /// Runs one sweep over every target and returns the total evicted.
    pub fn sweep(&self) -> usize {
        self.targets
            .iter()
            .map(|target| {
                let evicted = target.evict();
                if evicted > 0 {
                    debug!(
                        target: EVICTION_TARGET,
                        table = target.label(),
                        evicted,
                        "evicted stale entries"
                    );
                }
                evicted
            })
            .sum()
    }

    /// Starts sweeping on a background thread.
    ///
    /// # Errors
    ///
    /// Returns [`EvictionError::Spawn`] when the thread cannot be created.
    pub fn start(self) -> Result<EvictionHandle, EvictionError> {
        let (stop, stopped) = bounded::<()>(1);
        let handle = thread::Builder::new()
            .name("xopend-eviction".to_owned())
            .spawn(move || {
                info!(
                    target: EVICTION_TARGET,
                    interval_ms = self.interval.as_millis(),
                    tables = self.targets.len(),
                    "eviction daemon started"
                );
                while let Err(RecvTimeoutError::Timeout) = stopped.recv_timeout(self.interval) {
                    self.sweep();
                }
                info!(target: EVICTION_TARGET, "eviction daemon stopped");
            })
            .map_err(|source| EvictionError::Spawn { source })?;
        Ok(EvictionHandle {
            stop: Some(stop),
            handle: Some(handle),
        })
    }
}

/// Handle to a running [`EvictionDaemon`].
#[derive(Debug)]
pub struct EvictionHandle {
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl EvictionHandle {
    /// Stops the sweep loop and waits for it to exit.
    ///
    /// # Errors
    ///
    /// Returns [`EvictionError::ThreadPanic`] when the sweep thread panicked.
    pub fn stop(mut self) -> Result<(), EvictionError> {
        self.stop.take();
        match self.handle.take() {
            Some(handle) => handle.join().map_err(|_| EvictionError::ThreadPanic),
            None => Ok(()),
        }
    }
}

impl Drop for EvictionHandle {
    fn drop(&mut self) {
        // Dropping the sender disconnects the channel and ends the loop.
        self.stop.take();
    }
}
