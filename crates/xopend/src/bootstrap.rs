//! Daemon bootstrap orchestration.
//!
//! Loads configuration, installs telemetry, and builds the [`Server`]. A name
//! table that cannot be built fails the bootstrap: the daemon never starts
//! with a partial table.

use std::sync::Arc;

use ortho_config::{OrthoConfig, OrthoError};
use thiserror::Error;

use xopen_config::Config;

use crate::health::HealthReporter;
use crate::http::{HttpError, HttpFetcher, ReqwestFetcher};
use crate::server::{Server, ServerError};
use crate::telemetry::{self, TelemetryError, TelemetryHandle};

/// Trait abstracting configuration loading for testability.
pub trait ConfigLoader: Send + Sync {
    /// Loads the daemon configuration.
    fn load(&self) -> Result<Config, Arc<OrthoError>>;
}

/// Loader that delegates to [`Config::load`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemConfigLoader;

impl ConfigLoader for SystemConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Config::load()
    }
}

/// Loader that always yields the same configuration.
#[derive(Debug, Clone)]
pub struct StaticConfigLoader {
    config: Config,
}

impl StaticConfigLoader {
    /// Wraps a preloaded configuration.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

impl ConfigLoader for StaticConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(self.config.clone())
    }
}

/// Errors surfaced during bootstrap.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Configuration failed to load.
    #[error("failed to load configuration: {source}")]
    Configuration {
        /// Underlying loader error.
        #[source]
        source: Arc<OrthoError>,
    },
    /// Telemetry initialisation failed.
    #[error("failed to initialise telemetry: {source}")]
    Telemetry {
        /// Underlying telemetry error.
        #[source]
        source: TelemetryError,
    },
    /// The HTTP client could not be built.
    #[error("failed to build HTTP client: {source}")]
    Http {
        /// Underlying client error.
        #[source]
        source: HttpError,
    },
    /// The server state could not be built.
    #[error("failed to build server: {source}")]
    Server {
        /// Underlying server error.
        #[source]
        source: ServerError,
    },
}

/// Result of a successful bootstrap invocation.
#[derive(Debug)]
pub struct Daemon {
    config: Config,
    server: Server,
    telemetry: TelemetryHandle,
}

impl Daemon {
    /// Accessor for the resolved configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Accessor for the telemetry handle, primarily useful for testing.
    #[must_use]
    pub fn telemetry(&self) -> TelemetryHandle {
        self.telemetry
    }

    /// Accessor for the constructed server.
    #[must_use]
    pub fn server(&self) -> &Server {
        &self.server
    }

    /// Releases the server so it can be attached to a listener.
    #[must_use]
    pub fn into_server(self) -> Server {
        self.server
    }
}

/// Builds the production HTTP fetcher for `config`.
///
/// # Errors
///
/// Returns [`HttpError::Client`] when the client cannot be built.
pub fn system_fetcher(config: &Config) -> Result<Arc<dyn HttpFetcher>, HttpError> {
    Ok(Arc::new(ReqwestFetcher::new(config.http_timeout())?))
}

/// Bootstraps the daemon using the supplied collaborators.
///
/// `fetcher` builds the HTTP fetcher once the configuration is known.
///
/// # Errors
///
/// Reports the first stage that failed; the reporter is told as well.
pub fn bootstrap_with<F>(
    loader: &dyn ConfigLoader,
    reporter: Arc<dyn HealthReporter>,
    fetcher: F,
) -> Result<Daemon, BootstrapError>
where
    F: FnOnce(&Config) -> Result<Arc<dyn HttpFetcher>, HttpError>,
{
    reporter.bootstrap_starting();
    let fail = |error: BootstrapError| {
        reporter.bootstrap_failed(&error);
        error
    };

    let config = loader
        .load()
        .map_err(|source| fail(BootstrapError::Configuration { source }))?;
    let telemetry = telemetry::initialise(&config)
        .map_err(|source| fail(BootstrapError::Telemetry { source }))?;
    let fetcher = fetcher(&config).map_err(|source| fail(BootstrapError::Http { source }))?;
    let server = Server::from_config(&config, fetcher)
        .map_err(|source| fail(BootstrapError::Server { source }))?;

    reporter.bootstrap_succeeded(&config);
    Ok(Daemon {
        config,
        server,
        telemetry,
    })
}
