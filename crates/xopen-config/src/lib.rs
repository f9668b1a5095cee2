//! Shared configuration for the xopen resolution daemon and its clients.
//!
//! Configuration is layered by [`ortho_config`]: defaults, then a
//! configuration file (`--config-path` or `XOPEN_CONFIG_PATH`), then `XOPEN_*`
//! environment variables, then command-line flags. The defaults layer fills
//! every tunable, so an empty environment still loads.
//!
//! The listening port is deliberately kept outside the layered structure.
//! Clients and the daemon agree on it through the `XOPEN_PORT` environment
//! variable, which is parsed leniently (see [`port_from_env`]) so that a
//! malformed override never prevents either side from starting.

mod defaults;
mod logging;
mod sources;

use std::time::Duration;

use camino::Utf8PathBuf;
use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};
use url::Url;

pub use defaults::{
    DEFAULT_CACHE_TTL_SECS, DEFAULT_CAPACITY, DEFAULT_EVICTION_INTERVAL_SECS,
    DEFAULT_HTTP_TIMEOUT_SECS, DEFAULT_LOG_FILTER, DEFAULT_PORT, DEFAULT_REMOTE_TTL_SECS,
    LOOPBACK_HOST, PORT_ENV_VAR, default_log_filter, default_log_filter_string,
    default_log_format, parse_port, port_from_env,
};
pub use logging::{LogFormat, LogFormatParseError};
pub use sources::{
    DEFAULT_SOURCE_FILE, SOURCE_EXTENSION, SourceDiscoveryError, default_source_dir,
    default_source_paths, discover_sources_in,
};

/// Layered configuration shared by the daemon binary and its tooling.
///
/// Every tunable carries a default in the defaults layer, so loading with no
/// file, no `XOPEN_*` variables and no flags yields a usable configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "XOPEN")]
pub struct Config {
    /// Maximum number of memoised results, and of remote name entries.
    #[serde(default = "defaults::default_capacity")]
    #[ortho_config(default = DEFAULT_CAPACITY)]
    pub capacity: usize,
    /// Seconds a memoised result survives before the eviction sweep drops it.
    #[serde(default = "defaults::default_cache_ttl_secs")]
    #[ortho_config(default = DEFAULT_CACHE_TTL_SECS)]
    pub cache_ttl_secs: u64,
    /// Seconds a remotely fetched name entry survives before eviction.
    #[serde(default = "defaults::default_remote_ttl_secs")]
    #[ortho_config(default = DEFAULT_REMOTE_TTL_SECS)]
    pub remote_ttl_secs: u64,
    /// Seconds between eviction sweeps.
    #[serde(default = "defaults::default_eviction_interval_secs")]
    #[ortho_config(default = DEFAULT_EVICTION_INTERVAL_SECS)]
    pub eviction_interval_secs: u64,
    /// Timeout applied to outbound HTTP requests.
    #[serde(default = "defaults::default_http_timeout_secs")]
    #[ortho_config(default = DEFAULT_HTTP_TIMEOUT_SECS)]
    pub http_timeout_secs: u64,
    /// Authoritative remote feed consulted by the `update` verb.
    #[serde(default)]
    pub update_url: Option<Url>,
    /// Name table source files. Empty means default discovery.
    #[serde(default)]
    pub sources: Vec<Utf8PathBuf>,
    /// `tracing` filter expression.
    #[serde(default = "default_log_filter_string")]
    #[ortho_config(default = default_log_filter_string())]
    pub log_filter: String,
    /// Log output format.
    #[serde(default = "default_log_format")]
    #[ortho_config(default = default_log_format())]
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
            remote_ttl_secs: DEFAULT_REMOTE_TTL_SECS,
            eviction_interval_secs: DEFAULT_EVICTION_INTERVAL_SECS,
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            update_url: None,
            sources: Vec::new(),
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
        }
    }
}

impl Config {
    /// Capacity shared by the result cache and the remote name overlay.
    ///
    /// Zero is clamped to one so the cache can always hold the entry it was
    /// just asked to store.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity.max(1)
    }

    /// Age after which a memoised result is evicted.
    #[must_use]
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Age after which a remote name entry is evicted.
    #[must_use]
    pub fn remote_ttl(&self) -> Duration {
        Duration::from_secs(self.remote_ttl_secs)
    }

    /// Pause between eviction sweeps.
    #[must_use]
    pub fn eviction_interval(&self) -> Duration {
        Duration::from_secs(self.eviction_interval_secs)
    }

    /// Timeout for outbound HTTP requests.
    #[must_use]
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Remote feed for `update`, if one is configured.
    #[must_use]
    pub fn update_url(&self) -> Option<&Url> {
        self.update_url.as_ref()
    }

    /// Explicitly configured source files.
    #[must_use]
    pub fn sources(&self) -> &[Utf8PathBuf] {
        &self.sources
    }

    /// Effective log filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Effective log output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }
}
