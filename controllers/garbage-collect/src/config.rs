//! Controller configuration
//!
//! All settings come from environment variables. Parsing goes through a
//! lookup function so it can be tested without touching the process env.

use crate::error::ControllerError;
use std::time::Duration;

/// Default seconds between garbage collection passes
pub const DEFAULT_GC_INTERVAL_SECONDS: u64 = 120;
/// Default minimum instance age before it can be collected
pub const DEFAULT_RESOLUTION_WINDOW_SECONDS: u64 = 60;
/// Default lifetime of a link cache entry
pub const DEFAULT_LINK_CACHE_TTL_SECONDS: u64 = 600;
/// Longest link cache entry lifetime accepted
pub const MAX_LINK_CACHE_TTL_SECONDS: u64 = 7 * 24 * 60 * 60;
/// Default link cache purge interval
pub const DEFAULT_LINK_CACHE_SWEEP_SECONDS: u64 = 10;
/// Default number of deletions in flight at once
pub const DEFAULT_DELETE_CONCURRENCY: usize = 32;

/// Runtime configuration for the garbage collector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub cluster_name: String,
    pub cloud_api_url: String,
    pub cloud_api_token: String,
    pub gc_interval: Duration,
    pub resolution_window: Duration,
    pub link_cache_ttl: Duration,
    pub link_cache_sweep: Duration,
    pub delete_concurrency: usize,
}

impl Config {
    /// Reads configuration from the process environment.
    pub fn from_env() -> Result<Self, ControllerError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ControllerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key).filter(|v| !v.is_empty()).ok_or_else(|| {
                ControllerError::InvalidConfig(format!("{} environment variable is required", key))
            })
        };

        let seconds = |key: &str, default: u64| -> Result<Duration, ControllerError> {
            match lookup(key) {
                None => Ok(Duration::from_secs(default)),
                Some(raw) => raw.trim().parse::<u64>().map(Duration::from_secs).map_err(|e| {
                    ControllerError::InvalidConfig(format!("{}={:?}: {}", key, raw, e))
                }),
            }
        };

        let delete_concurrency = match lookup("DELETE_CONCURRENCY") {
            None => DEFAULT_DELETE_CONCURRENCY,
            Some(raw) => match raw.trim().parse::<usize>() {
                Ok(0) => {
                    return Err(ControllerError::InvalidConfig(
                        "DELETE_CONCURRENCY must be at least 1".to_string(),
                    ));
                }
                Ok(n) => n,
                Err(e) => {
                    return Err(ControllerError::InvalidConfig(format!(
                        "DELETE_CONCURRENCY={:?}: {}",
                        raw, e
                    )));
                }
            },
        };

        let config = Self {
            cluster_name: required("CLUSTER_NAME")?,
            cloud_api_url: lookup("CLOUD_API_URL")
                .unwrap_or_else(|| "http://cloud-api:8080".to_string()),
            cloud_api_token: required("CLOUD_API_TOKEN")?,
            gc_interval: seconds("GC_INTERVAL_SECONDS", DEFAULT_GC_INTERVAL_SECONDS)?,
            resolution_window: seconds("RESOLUTION_WINDOW_SECONDS", DEFAULT_RESOLUTION_WINDOW_SECONDS)?,
            link_cache_ttl: seconds("LINK_CACHE_TTL_SECONDS", DEFAULT_LINK_CACHE_TTL_SECONDS)?,
            link_cache_sweep: seconds("LINK_CACHE_SWEEP_SECONDS", DEFAULT_LINK_CACHE_SWEEP_SECONDS)?,
            delete_concurrency,
        };

        if config.gc_interval.is_zero() || config.link_cache_sweep.is_zero() {
            return Err(ControllerError::InvalidConfig(
                "GC_INTERVAL_SECONDS and LINK_CACHE_SWEEP_SECONDS must be non-zero".to_string(),
            ));
        }
        if config.link_cache_ttl > Duration::from_secs(MAX_LINK_CACHE_TTL_SECONDS) {
            return Err(ControllerError::InvalidConfig(format!(
                "LINK_CACHE_TTL_SECONDS must be at most {}",
                MAX_LINK_CACHE_TTL_SECONDS
            )));
        }

        Ok(config)
    }
}
