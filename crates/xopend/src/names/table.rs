//! Reloadable short-name table.
//!
//! The table is two layers: entries parsed from the local source files, and
//! an overlay of entries fetched from the remote feed. Lookups consult the
//! overlay first. Each layer is replaced wholesale by its own operation
//! (`reload` for files, `update` for the overlay) and only overlay entries are
//! ever evicted.
//!
//! Readers clone an `Arc` to the current [`NameSnapshot`]; writers build a new
//! snapshot off to the side and swap the pointer, so a lookup sees either the
//! old table or the new one and never a mixture.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, TryLockError};
use std::time::{Duration, Instant};

use camino::Utf8PathBuf;
use tracing::{debug, info};

use super::NAMES_TARGET;
use super::errors::NameTableError;
use super::parser::merge_source;
use super::remote::RemoteFeed;

/// Construction parameters for a [`NameTable`].
#[derive(Debug, Clone)]
pub struct NameTableSettings {
    sources: Vec<Utf8PathBuf>,
    capacity: usize,
    remote_ttl: Duration,
    home: Option<PathBuf>,
}

impl NameTableSettings {
    /// Settings reading `sources` in order, expanding `~` against the current
    /// user's home directory.
    #[must_use]
    pub fn new(sources: Vec<Utf8PathBuf>, capacity: usize, remote_ttl: Duration) -> Self {
        Self {
            sources,
            capacity: capacity.max(1),
            remote_ttl,
            home: dirs::home_dir(),
        }
    }

    /// Overrides the directory used for `~` expansion.
    #[must_use]
    pub fn with_home(mut self, home: Option<PathBuf>) -> Self {
        self.home = home;
        self
    }

    /// Source files in merge order.
    #[must_use]
    pub fn sources(&self) -> &[Utf8PathBuf] {
        &self.sources
    }
}

#[derive(Debug, Clone)]
struct RemoteEntry {
    value: String,
    fetched_at: Instant,
}

/// Immutable view of the table at one point in time.
#[derive(Debug, Clone, Default)]
pub struct NameSnapshot {
    files: HashMap<String, String>,
    remote: HashMap<String, RemoteEntry>,
}

impl NameSnapshot {
    /// Resolves `key`, preferring remote entries over file entries.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.remote
            .get(key)
            .map(|entry| entry.value.as_str())
            .or_else(|| self.files.get(key).map(String::as_str))
    }

    /// Number of distinct keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
            + self
                .remote
                .keys()
                .filter(|key| !self.files.contains_key(*key))
                .count()
    }

    /// Returns true when no key resolves.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.remote.is_empty()
    }

    /// Number of entries in the remote overlay.
    #[must_use]
    pub fn remote_len(&self) -> usize {
        self.remote.len()
    }

    fn resolved(&self) -> HashMap<&str, &str> {
        let mut view: HashMap<&str, &str> = self
            .files
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
            .collect();
        for (key, entry) in &self.remote {
            view.insert(key.as_str(), entry.value.as_str());
        }
        view
    }
}

/// Shared, concurrently readable name table.
pub struct NameTable {
    settings: NameTableSettings,
    remote: Option<Box<dyn RemoteFeed>>,
    current: RwLock<Arc<NameSnapshot>>,
    writer: Mutex<()>,
}

impl std::fmt::Debug for NameTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NameTable")
            .field("settings", &self.settings)
            .field("remote", &self.remote.as_ref().map(|feed| feed.location()))
            .finish_non_exhaustive()
    }
}

impl NameTable {
    /// Parses every source file and builds the initial table.
    ///
    /// # Errors
    ///
    /// Returns [`NameTableError::Read`] when a source file cannot be read.
    pub fn load(
        settings: NameTableSettings,
        remote: Option<Box<dyn RemoteFeed>>,
    ) -> Result<Self, NameTableError> {
        let files = read_sources(&settings)?;
        info!(
            target: NAMES_TARGET,
            sources = settings.sources.len(),
            entries = files.len(),
            "name table loaded"
        );
        Ok(Self {
            settings,
            remote,
            current: RwLock::new(Arc::new(NameSnapshot {
                files,
                remote: HashMap::new(),
            })),
            writer: Mutex::new(()),
        })
    }

    /// Resolves `key` against the current snapshot.
    pub fn lookup(&self, key: &str) -> Option<String> {
        self.snapshot().get(key).map(str::to_owned)
    }

    /// Returns the current snapshot for consistent multi-key reads.
    pub fn snapshot(&self) -> Arc<NameSnapshot> {
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// Number of distinct keys in the current snapshot.
    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    /// Returns true when the current snapshot is empty.
    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    /// Re-reads the source files and replaces the file layer.
    ///
    /// The remote overlay is kept. On error the previous table stays in place.
    ///
    /// # Errors
    ///
    /// Returns [`NameTableError::Read`] when a source file cannot be read.
    pub fn reload(&self) -> Result<(), NameTableError> {
        let _writer = self.lock_writer();
        let files = read_sources(&self.settings)?;
        let previous = self.snapshot();
        let next = NameSnapshot {
            files,
            remote: previous.remote.clone(),
        };
        self.swap(&previous, next, "reload");
        Ok(())
    }

    /// Fetches the remote feed and replaces the overlay.
    ///
    /// Without a configured feed this is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error when the feed cannot be fetched or decoded.
    pub fn update(&self) -> Result<(), NameTableError> {
        let Some(feed) = self.remote.as_deref() else {
            info!(target: NAMES_TARGET, "no remote feed configured; update skipped");
            return Ok(());
        };

        let body = feed
            .fetch()
            .map_err(|source| NameTableError::Remote { source })?;
        let text =
            std::str::from_utf8(&body).map_err(|source| NameTableError::RemoteEncoding { source })?;

        let mut parsed = HashMap::new();
        merge_source(text, self.settings.home.as_deref(), &mut parsed);
        let fetched_at = Instant::now();
        let mut remote: HashMap<String, RemoteEntry> = parsed
            .into_iter()
            .map(|(key, value)| (key, RemoteEntry { value, fetched_at }))
            .collect();
        trim_to_capacity(&mut remote, self.settings.capacity);

        let _writer = self.lock_writer();
        let previous = self.snapshot();
        let next = NameSnapshot {
            files: previous.files.clone(),
            remote,
        };
        info!(
            target: NAMES_TARGET,
            feed = %feed.location(),
            entries = next.remote.len(),
            "remote names fetched"
        );
        self.swap(&previous, next, "update");
        Ok(())
    }

    /// Drops expired remote entries, then the oldest ones beyond capacity.
    ///
    /// Skips the sweep when a reload or update is in progress. Returns the
    /// number of entries removed.
    pub fn evict(&self) -> usize {
        self.evict_at(Instant::now())
    }

    pub(crate) fn evict_at(&self, now: Instant) -> usize {
        let _writer = match self.writer.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => return 0,
        };
        let previous = self.snapshot();
        let mut remote = previous.remote.clone();
        let ttl = self.settings.remote_ttl;
        remote.retain(|_, entry| now.saturating_duration_since(entry.fetched_at) < ttl);
        trim_to_capacity(&mut remote, self.settings.capacity);

        let removed = previous.remote.len() - remote.len();
        if removed > 0 {
            let next = NameSnapshot {
                files: previous.files.clone(),
                remote,
            };
            self.swap(&previous, next, "evict");
        }
        removed
    }

    fn swap(&self, previous: &NameSnapshot, next: NameSnapshot, reason: &'static str) {
        log_changes(previous, &next, reason);
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Arc::new(next);
    }

    fn lock_writer(&self) -> MutexGuard<'_, ()> {
        self.writer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn read_sources(settings: &NameTableSettings) -> Result<HashMap<String, String>, NameTableError> {
    let mut files = HashMap::new();
    for path in &settings.sources {
        let text = fs::read_to_string(path).map_err(|source| NameTableError::Read {
            path: path.clone(),
            source,
        })?;
        let parsed = merge_source(&text, settings.home.as_deref(), &mut files);
        debug!(target: NAMES_TARGET, path = %path, entries = parsed, "parsed name source");
    }
    Ok(files)
}

/// Removes the oldest entries until at most `capacity` remain.
///
/// Entries fetched at the same instant are removed in key order.
fn trim_to_capacity(remote: &mut HashMap<String, RemoteEntry>, capacity: usize) {
    let excess = remote.len().saturating_sub(capacity);
    if excess == 0 {
        return;
    }
    let mut by_age: Vec<(Instant, String)> = remote
        .iter()
        .map(|(key, entry)| (entry.fetched_at, key.clone()))
        .collect();
    by_age.sort();
    for (_, key) in by_age.into_iter().take(excess) {
        remote.remove(&key);
    }
}

fn log_changes(previous: &NameSnapshot, next: &NameSnapshot, reason: &'static str) {
    let before = previous.resolved();
    let after = next.resolved();
    let mut changed = 0_usize;
    for key in before.keys().chain(after.keys().filter(|key| !before.contains_key(*key))) {
        let old = before.get(key).copied();
        let new = after.get(key).copied();
        if old != new {
            changed += 1;
            debug!(
                target: NAMES_TARGET,
                reason,
                key,
                old = old.unwrap_or(""),
                new = new.unwrap_or(""),
                "name changed"
            );
        }
    }
    info!(target: NAMES_TARGET, reason, changed, entries = after.len(), "name table swapped");
}
