//! Supervises daemon launch sequencing and runtime orchestration.

use std::sync::Arc;

use tracing::{info, warn};

use xopen_config::{Config, port_from_env};

use crate::StructuredHealthReporter;
use crate::bootstrap::{ConfigLoader, SystemConfigLoader, bootstrap_with, system_fetcher};
use crate::health::HealthReporter;
use crate::http::{HttpError, HttpFetcher};
use crate::transport::SocketListener;

use super::PROCESS_TARGET;
use super::errors::LaunchError;
use super::shutdown::{ShutdownSignal, SystemShutdownSignal};

/// Collaborators required to launch the daemon runtime.
pub(crate) struct LaunchPlan<L, S> {
    pub(crate) loader: L,
    pub(crate) reporter: Arc<dyn HealthReporter>,
    pub(crate) shutdown: S,
    pub(crate) port: u16,
}

/// Runs the daemon using the production collaborators.
///
/// Blocks until a termination signal arrives, then shuts down in order.
///
/// # Errors
///
/// Returns the first launch stage that failed.
pub fn run_daemon() -> Result<(), LaunchError> {
    let plan = LaunchPlan {
        loader: SystemConfigLoader,
        reporter: Arc::new(StructuredHealthReporter::new()),
        shutdown: SystemShutdownSignal,
        port: port_from_env(),
    };
    run_daemon_with(plan, system_fetcher)
}

/// Runs the daemon with injected collaborators.
pub(crate) fn run_daemon_with<L, S, F>(plan: LaunchPlan<L, S>, fetcher: F) -> Result<(), LaunchError>
where
    L: ConfigLoader,
    S: ShutdownSignal,
    F: FnOnce(&Config) -> Result<Arc<dyn HttpFetcher>, HttpError>,
{
    let LaunchPlan {
        loader,
        reporter,
        shutdown,
        port,
    } = plan;

    info!(target: PROCESS_TARGET, port, "starting daemon runtime");
    let daemon = bootstrap_with(&loader, Arc::clone(&reporter), fetcher)?;
    let listener = SocketListener::bind_loopback(port)?;
    let running = daemon.into_server().serve(listener)?;
    reporter.listener_ready(running.local_addr());

    let waited = shutdown.wait();
    if let Err(error) = &waited {
        warn!(target: PROCESS_TARGET, %error, "shutdown signal unavailable; stopping");
    }
    reporter.shutdown_requested();
    running.shutdown()?;
    waited?;
    info!(target: PROCESS_TARGET, "shutdown sequence completed");
    Ok(())
}
