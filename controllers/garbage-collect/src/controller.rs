//! Main controller implementation.
//!
//! Owns the link cache sweeper and drives garbage collection passes on a
//! fixed period until shutdown.

use crate::backoff::FibonacciBackoff;
use crate::cluster::KubeClusterClient;
use crate::config::Config;
use crate::error::ControllerError;
use crate::link_cache::LinkCache;
use crate::reconciler::{Reconciler, ReconcilerOptions};
use cloud_client::CloudClient;
use kube::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Smallest delay before retrying a failed pass
const MIN_RETRY_DELAY: Duration = Duration::from_secs(10);

/// Periodic garbage collection controller
#[derive(Debug)]
pub struct Controller {
    reconciler: Reconciler,
    link_cache: Arc<LinkCache>,
    interval: Duration,
    sweep_interval: Duration,
}

impl Controller {
    /// Creates a controller talking to the live API server and compute API.
    pub async fn new(config: &Config) -> Result<Self, ControllerError> {
        info!("Initializing garbage collection controller");

        let kube_client = Client::try_default().await?;
        let cloud = CloudClient::new(config.cloud_api_url.clone(), config.cloud_api_token.clone())?;
        let link_cache = Arc::new(LinkCache::new(config.link_cache_ttl));

        let reconciler = Reconciler::new(
            Arc::new(cloud),
            Arc::new(KubeClusterClient::new(kube_client)),
            Arc::clone(&link_cache),
            ReconcilerOptions {
                cluster_name: config.cluster_name.clone(),
                resolution_window: config.resolution_window,
                delete_concurrency: config.delete_concurrency,
            },
        );

        Ok(Self::from_parts(reconciler, link_cache, config))
    }

    /// Assembles a controller from an existing reconciler and cache.
    pub fn from_parts(reconciler: Reconciler, link_cache: Arc<LinkCache>, config: &Config) -> Self {
        Self {
            reconciler,
            link_cache,
            interval: config.gc_interval,
            sweep_interval: config.link_cache_sweep,
        }
    }

    /// Runs passes until `shutdown` is cancelled.
    ///
    /// The first pass starts immediately. After a failed pass the next one
    /// is retried on a Fibonacci backoff capped at the regular interval.
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), ControllerError> {
        info!(
            interval_secs = self.interval.as_secs(),
            sweep_secs = self.sweep_interval.as_secs(),
            "Starting garbage collection loop"
        );
        let sweeper = self
            .link_cache
            .spawn_sweeper(self.sweep_interval, shutdown.child_token());
        let mut backoff = FibonacciBackoff::new(MIN_RETRY_DELAY.min(self.interval), self.interval);
        let mut delay = Duration::ZERO;

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }

            match self.reconciler.run_pass(&shutdown).await {
                Ok(result) => {
                    backoff.reset();
                    if !result.is_clean() {
                        warn!(
                            failed = result.failed.len(),
                            node_failures = result.node_failures.len(),
                            not_processed = result.not_processed.len(),
                            "Garbage collection pass finished with failures"
                        );
                    }
                    delay = self.interval;
                }
                Err(ControllerError::Cancelled) => break,
                Err(e) => {
                    delay = backoff.next_delay();
                    error!(error = %e, retry_in_secs = delay.as_secs(), "Garbage collection pass failed");
                }
            }
        }

        info!("Shutting down garbage collection loop");
        shutdown.cancel();
        if let Err(e) = sweeper.await {
            warn!("Link cache sweeper ended abnormally: {}", e);
        }
        Ok(())
    }
}
