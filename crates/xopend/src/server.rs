//! Daemon state and its running form.
//!
//! [`Server`] owns the name table, the result cache and the worker pool.
//! [`Server::serve`] attaches them to a listener and starts the eviction
//! daemon, producing a [`RunningServer`] whose `shutdown` tears everything
//! down in reverse order.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::info;

use xopen_config::{Config, SourceDiscoveryError, default_source_paths};

use crate::cache::ResultCache;
use crate::dispatch::{DispatchConnectionHandler, Dispatcher, Fallback, NoFallback};
use crate::eviction::{Evict, EvictionDaemon, EvictionError, EvictionHandle};
use crate::http::HttpFetcher;
use crate::names::{HttpFeed, NameTable, NameTableError, NameTableSettings, RemoteFeed};
use crate::pool::{DEFAULT_WORKERS, PoolError, WorkerPool};
use crate::transport::{ListenerError, ListenerHandle, SocketListener};

const SERVER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::server");

/// Errors surfaced while building, starting, or stopping the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Default source discovery failed.
    #[error("failed to discover name sources: {0}")]
    Sources(#[from] SourceDiscoveryError),
    /// The initial name table could not be built.
    #[error("failed to build name table: {0}")]
    Names(#[from] NameTableError),
    /// The worker pool failed.
    #[error(transparent)]
    Pool(#[from] PoolError),
    /// The eviction daemon failed.
    #[error(transparent)]
    Eviction(#[from] EvictionError),
    /// The listener failed.
    #[error(transparent)]
    Listener(#[from] ListenerError),
}

/// Fully constructed daemon state, not yet accepting connections.
pub struct Server {
    names: Arc<NameTable>,
    cache: Arc<ResultCache>,
    pool: WorkerPool,
    fetcher: Arc<dyn HttpFetcher>,
    fallback: Arc<dyn Fallback>,
    eviction_interval: Duration,
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("names", &self.names)
            .field("cache", &self.cache)
            .field("workers", &self.pool.size())
            .field("eviction_interval", &self.eviction_interval)
            .finish_non_exhaustive()
    }
}

impl Server {
    /// Builds the server described by `config`.
    ///
    /// Sources default to discovery under the user configuration directory
    /// when none are configured. `fetcher` serves `http-get` and, when an
    /// update URL is configured, the remote name feed.
    ///
    /// # Errors
    ///
    /// Fails when sources cannot be discovered or read, or when the worker
    /// pool cannot be spawned.
    pub fn from_config(config: &Config, fetcher: Arc<dyn HttpFetcher>) -> Result<Self, ServerError> {
        let sources = if config.sources().is_empty() {
            default_source_paths()?
        } else {
            config.sources().to_vec()
        };
        let remote = config.update_url().map(|url| {
            Box::new(HttpFeed::new(url.clone(), Arc::clone(&fetcher))) as Box<dyn RemoteFeed>
        });
        let settings = NameTableSettings::new(sources, config.capacity(), config.remote_ttl());
        let names = NameTable::load(settings, remote)?;
        let cache = ResultCache::new(config.capacity(), config.cache_ttl());
        Self::new(names, cache, fetcher, config.eviction_interval())
    }

    /// Assembles a server from prebuilt tables.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Pool`] when the workers cannot be spawned.
    pub fn new(
        names: NameTable,
        cache: ResultCache,
        fetcher: Arc<dyn HttpFetcher>,
        eviction_interval: Duration,
    ) -> Result<Self, ServerError> {
        Ok(Self {
            names: Arc::new(names),
            cache: Arc::new(cache),
            pool: WorkerPool::new(DEFAULT_WORKERS)?,
            fetcher,
            fallback: Arc::new(NoFallback),
            eviction_interval,
        })
    }

    /// Replaces the handler for unknown verbs.
    #[must_use]
    pub fn with_fallback(mut self, fallback: Arc<dyn Fallback>) -> Self {
        self.fallback = fallback;
        self
    }

    /// Shared name table.
    #[must_use]
    pub fn names(&self) -> &Arc<NameTable> {
        &self.names
    }

    /// Shared result cache.
    #[must_use]
    pub fn cache(&self) -> &Arc<ResultCache> {
        &self.cache
    }

    /// Builds a dispatcher over this server's state.
    #[must_use]
    pub fn dispatcher(&self) -> Dispatcher {
        Dispatcher::new(
            Arc::clone(&self.cache),
            Arc::clone(&self.names),
            self.pool.handle(),
            Arc::clone(&self.fetcher),
        )
        .with_fallback(Arc::clone(&self.fallback))
    }

    /// Starts the eviction daemon and begins accepting on `listener`.
    ///
    /// # Errors
    ///
    /// Fails when the eviction or listener threads cannot be started.
    pub fn serve(self, listener: SocketListener) -> Result<RunningServer, ServerError> {
        let eviction = EvictionDaemon::new(self.eviction_interval)
            .with_target(Arc::clone(&self.cache) as Arc<dyn Evict>)
            .with_target(Arc::clone(&self.names) as Arc<dyn Evict>)
            .start()?;
        let handler = Arc::new(DispatchConnectionHandler::new(Arc::new(self.dispatcher())));
        let listener = listener.start(handler)?;
        info!(
            target: SERVER_TARGET,
            addr = %listener.local_addr(),
            names = self.names.len(),
            cache_capacity = self.cache.capacity(),
            "server ready"
        );
        Ok(RunningServer {
            listener,
            eviction,
            pool: self.pool,
            names: self.names,
            cache: self.cache,
        })
    }
}

/// A server accepting connections.
#[derive(Debug)]
pub struct RunningServer {
    listener: ListenerHandle,
    eviction: EvictionHandle,
    pool: WorkerPool,
    names: Arc<NameTable>,
    cache: Arc<ResultCache>,
}

impl RunningServer {
    /// Address clients connect to.
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.listener.local_addr()
    }

    /// Shared name table.
    #[must_use]
    pub fn names(&self) -> &Arc<NameTable> {
        &self.names
    }

    /// Shared result cache.
    #[must_use]
    pub fn cache(&self) -> &Arc<ResultCache> {
        &self.cache
    }

    /// Stops accepting, stops eviction, then drains the worker pool.
    ///
    /// # Errors
    ///
    /// Reports the first component that failed to stop cleanly. Later
    /// components are still stopped.
    pub fn shutdown(self) -> Result<(), ServerError> {
        let Self {
            listener,
            eviction,
            pool,
            ..
        } = self;
        listener.shutdown();
        let listener_result = listener.join().map_err(ServerError::from);
        let eviction_result = eviction.stop().map_err(ServerError::from);
        let pool_result = pool.shutdown().map_err(ServerError::from);
        info!(target: SERVER_TARGET, "server stopped");
        listener_result.and(eviction_result).and(pool_result)
    }
}
