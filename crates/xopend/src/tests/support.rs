//! Test harness utilities shared by the behavioural suites.

use std::collections::HashMap;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use camino::Utf8PathBuf;
use ortho_config::{OrthoConfig, OrthoError};
use tempfile::TempDir;

use xopen_config::Config;

use crate::bootstrap::{BootstrapError, ConfigLoader};
use crate::health::HealthReporter;
use crate::http::{HttpError, HttpFetcher};
use crate::process::{ShutdownError, ShutdownSignal};

pub const WAIT_TIMEOUT: Duration = Duration::from_secs(2);
pub const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Polls `condition` until it holds or [`WAIT_TIMEOUT`] elapses.
pub fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + WAIT_TIMEOUT;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(POLL_INTERVAL);
    }
    condition()
}

/// A name source file inside a temporary directory.
pub struct SourceFile {
    _dir: TempDir,
    path: Utf8PathBuf,
}

impl SourceFile {
    pub fn new(contents: &str) -> Self {
        let dir = TempDir::new().expect("create source directory");
        let path =
            Utf8PathBuf::from_path_buf(dir.path().join("xopen.txt")).expect("utf8 source path");
        fs::write(&path, contents).expect("write source file");
        Self { _dir: dir, path }
    }

    pub fn path(&self) -> &Utf8PathBuf {
        &self.path
    }

    pub fn rewrite(&self, contents: &str) {
        fs::write(&self.path, contents).expect("rewrite source file");
    }
}

/// Loader that points the daemon at a temporary source file.
pub struct TestConfigLoader {
    source: SourceFile,
}

impl TestConfigLoader {
    #[must_use]
    pub fn new() -> Self {
        Self::with_source("foo /home/user/docs/foo.pdf\n")
    }

    #[must_use]
    pub fn with_source(contents: &str) -> Self {
        Self {
            source: SourceFile::new(contents),
        }
    }

    pub fn source(&self) -> &SourceFile {
        &self.source
    }
}

impl ConfigLoader for TestConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(Config {
            sources: vec![self.source.path().clone()],
            capacity: 16,
            eviction_interval_secs: 1,
            ..Config::default()
        })
    }
}

/// Loader whose configuration names a source file that does not exist.
pub struct MissingSourceLoader {
    dir: TempDir,
}

impl MissingSourceLoader {
    #[must_use]
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("create temp dir"),
        }
    }
}

impl ConfigLoader for MissingSourceLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        let missing = Utf8PathBuf::from_path_buf(self.dir.path().join("absent.txt"))
            .expect("utf8 source path");
        Ok(Config {
            sources: vec![missing],
            ..Config::default()
        })
    }
}

/// Loader that fails by passing an invalid CLI value.
pub struct FailingConfigLoader;

impl ConfigLoader for FailingConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        let args = vec![
            OsString::from("xopend"),
            OsString::from("--capacity"),
            OsString::from("plenty"),
        ];
        Config::load_from_iter(args)
    }
}

/// Fetcher double that serves canned bodies and counts requests per URL.
///
/// URLs without a canned body fail as if the connection was refused.
#[derive(Default)]
pub struct CountingFetcher {
    bodies: Mutex<HashMap<String, Vec<u8>>>,
    calls: Mutex<HashMap<String, usize>>,
    total: AtomicUsize,
}

impl CountingFetcher {
    /// Serves `body` for `url`. Unknown URLs answer 404.
    pub fn serve(&self, url: &str, body: &[u8]) {
        self.bodies
            .lock()
            .expect("bodies mutex poisoned")
            .insert(url.to_owned(), body.to_vec());
    }

    pub fn calls_for(&self, url: &str) -> usize {
        self.calls
            .lock()
            .expect("calls mutex poisoned")
            .get(url)
            .copied()
            .unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }
}

impl HttpFetcher for CountingFetcher {
    fn get(&self, url: &str) -> Result<Vec<u8>, HttpError> {
        self.total.fetch_add(1, Ordering::SeqCst);
        *self
            .calls
            .lock()
            .expect("calls mutex poisoned")
            .entry(url.to_owned())
            .or_default() += 1;
        self.bodies
            .lock()
            .expect("bodies mutex poisoned")
            .get(url)
            .cloned()
            .ok_or_else(|| HttpError::Request {
                url: url.to_owned(),
                source: io::Error::from(io::ErrorKind::ConnectionRefused).into(),
            })
    }
}

/// Shutdown signal released explicitly by the test.
#[derive(Default)]
pub struct ManualShutdown {
    released: Mutex<bool>,
    condvar: Condvar,
}

impl ManualShutdown {
    pub fn trigger(&self) {
        *self.released.lock().expect("shutdown mutex poisoned") = true;
        self.condvar.notify_all();
    }
}

impl ShutdownSignal for Arc<ManualShutdown> {
    fn wait(&self) -> Result<(), ShutdownError> {
        let mut released = self.released.lock().expect("shutdown mutex poisoned");
        while !*released {
            released = self
                .condvar
                .wait(released)
                .expect("shutdown mutex poisoned");
        }
        Ok(())
    }
}

/// Records health events for assertions.
#[derive(Default)]
pub struct RecordingHealthReporter {
    events: Mutex<Vec<HealthEvent>>,
}

impl RecordingHealthReporter {
    /// Captures a copy of the recorded events.
    pub fn events(&self) -> Vec<HealthEvent> {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .clone()
    }

    /// Address reported by the most recent `listener_ready` event.
    pub fn ready_addr(&self) -> Option<SocketAddr> {
        self.events().into_iter().rev().find_map(|event| match event {
            HealthEvent::ListenerReady(addr) => Some(addr),
            _ => None,
        })
    }

    fn record(&self, event: HealthEvent) {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .push(event);
    }
}

impl HealthReporter for RecordingHealthReporter {
    fn bootstrap_starting(&self) {
        self.record(HealthEvent::BootstrapStarting);
    }

    fn bootstrap_succeeded(&self, _config: &Config) {
        self.record(HealthEvent::BootstrapSucceeded);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        self.record(HealthEvent::BootstrapFailed(error.to_string()));
    }

    fn listener_ready(&self, addr: SocketAddr) {
        self.record(HealthEvent::ListenerReady(addr));
    }

    fn shutdown_requested(&self) {
        self.record(HealthEvent::ShutdownRequested);
    }
}

/// Structured health events tracked during scenarios.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HealthEvent {
    /// Bootstrap started.
    BootstrapStarting,
    /// Bootstrap completed successfully.
    BootstrapSucceeded,
    /// Bootstrap failed with an error description.
    BootstrapFailed(String),
    /// The listener is accepting on the address.
    ListenerReady(SocketAddr),
    /// Shutdown began.
    ShutdownRequested,
}
