//! Garbage Collection Controller
//!
//! Periodically removes cloud instances this cluster launched that no
//! Machine accounts for, along with any Node still registered for them:
//! - Instances younger than the resolution window are left alone
//! - Instances named by a Machine (status or linked annotation) are kept
//! - Instances recently claimed by the link controller are kept
//!
//! Everything else is terminated.

mod backoff;
mod cluster;
mod config;
mod controller;
mod deleter;
mod error;
mod link_cache;
mod machine_index;
mod reconciler;
#[cfg(test)]
mod test_utils;

use crate::config::Config;
use crate::error::ControllerError;
use controller::Controller;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), ControllerError> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting Garbage Collection Controller");

    let config = Config::from_env()?;
    info!("Configuration:");
    info!("  Cluster: {}", config.cluster_name);
    info!("  Cloud API URL: {}", config.cloud_api_url);
    info!("  Pass interval: {:?}", config.gc_interval);
    info!("  Resolution window: {:?}", config.resolution_window);
    info!("  Link cache TTL: {:?}", config.link_cache_ttl);
    info!("  Delete concurrency: {}", config.delete_concurrency);

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received shutdown signal"),
            Err(e) => error!("Failed to listen for shutdown signal: {}", e),
        }
        signal.cancel();
    });

    let controller = Controller::new(&config).await?;
    controller.run(shutdown).await?;

    Ok(())
}
