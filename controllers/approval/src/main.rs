//! Approval Controller
//!
//! Gates resource creation behind an approval decision:
//! - Approval: embeds a resource manifest that is created only once the
//!   record's status is marked `Approved`
//!
//! New records are stamped `Pending`; approved records get their resource
//! created exactly once and a reference to it recorded in status.

mod backoff;
mod config;
mod controller;
mod error;
mod metrics;
mod probes;
mod reconciler;
mod watcher;

#[cfg(test)]
mod test_utils;

use crate::config::ControllerConfig;
use crate::error::ControllerError;
use controller::Controller;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), ControllerError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if rustls::crypto::ring::default_provider().install_default().is_err() {
        warn!("A rustls crypto provider was already installed");
    }

    info!("Starting Approval Controller");

    // Load configuration from environment variables
    let config = ControllerConfig::from_env()?;

    info!("Configuration:");
    info!("  Namespace: {}", config.namespace.as_deref().unwrap_or("all namespaces"));
    info!("  Resync interval: {}s", config.resync_interval.as_secs());
    info!(
        "  Backoff: {}s..{}s",
        config.backoff_min.as_secs(),
        config.backoff_max.as_secs()
    );
    info!("  Failure condition threshold: {}", config.failure_condition_threshold);
    info!("  Probe address: {}", config.probe_addr);

    // Initialize and run controller
    let controller = Controller::new(config).await?;
    controller.run().await?;

    Ok(())
}
