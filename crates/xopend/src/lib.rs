//! Resolution cache daemon for `xopen`.
//!
//! The daemon answers short requests over a loopback TCP socket, one request
//! per connection. It resolves short names from a reloadable [`NameTable`],
//! fetches URLs on behalf of clients, and memoises fetch results in a bounded
//! [`ResultCache`]. A background eviction sweep keeps both structures from
//! growing stale, and a small worker pool runs table refreshes off the
//! request path.
//!
//! [`run_daemon`] is the production entry point. [`Server`] exposes the same
//! wiring for embedding and tests, and the [`client`] module implements the
//! other half of the wire protocol.

mod bootstrap;
mod cache;
pub mod client;
mod dispatch;
mod eviction;
mod health;
mod http;
mod names;
mod pool;
mod process;
mod server;
pub mod telemetry;
mod transport;

pub use bootstrap::{
    BootstrapError, ConfigLoader, Daemon, StaticConfigLoader, SystemConfigLoader, bootstrap_with,
    system_fetcher,
};
pub use cache::ResultCache;
pub use dispatch::{
    DispatchConnectionHandler, DispatchError, Dispatcher, Fallback, NoFallback, Outcome, Request,
    Verb,
};
pub use eviction::{Evict, EvictionDaemon, EvictionError, EvictionHandle};
pub use health::{HealthReporter, StructuredHealthReporter};
pub use http::{HttpError, HttpFetcher, ReqwestFetcher, parse_http_url};
pub use names::{HttpFeed, NameSnapshot, NameTable, NameTableError, NameTableSettings, RemoteFeed};
pub use pool::{DEFAULT_WORKERS, PoolError, PoolHandle, WorkerPool};
pub use process::{LaunchError, ShutdownError, ShutdownSignal, SystemShutdownSignal, run_daemon};
pub use server::{RunningServer, Server, ServerError};
pub use telemetry::{TelemetryError, TelemetryHandle};
pub use transport::{ConnectionHandler, ListenerError, ListenerHandle, SocketListener};

/// Prefix of the `version` reply, used by clients to recognise the daemon.
///
/// Existing `joker-xopen` clients probe for this exact prefix.
pub const VERSION_PREFIX: &str = "joker-xopen";

/// Reply to the `version` verb: `joker-xopen==<crate version>`.
#[must_use]
pub fn version_string() -> String {
    format!("{VERSION_PREFIX}=={}", env!("CARGO_PKG_VERSION"))
}

#[cfg(test)]
mod tests;
