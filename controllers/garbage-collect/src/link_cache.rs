//! Recently-linked provider ids
//!
//! The link controller records a provider id here when it starts claiming an
//! instance for a Machine. Until the entry expires, the garbage collector
//! treats the instance as owned even if the Machine is not yet visible in
//! the API server.
//!
//! Expiry is measured from insertion, never from last access. Expired entries
//! are dropped lazily on lookup and by a periodic sweep.

use dashmap::DashMap;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Default lifetime of an entry
pub const DEFAULT_TTL: Duration = Duration::from_secs(600);

/// Default interval between expiry sweeps
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy)]
struct LinkEntry {
    /// `None` when the TTL is too large to represent; such entries never expire
    expires_at: Option<Instant>,
}

impl LinkEntry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|t| now < t)
    }
}

/// Thread-safe, time-expiring set of provider ids
#[derive(Debug)]
pub struct LinkCache {
    entries: DashMap<String, LinkEntry>,
    ttl: Duration,
}

impl LinkCache {
    /// Create a cache whose entries live for `ttl`
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Record that `provider_id` is being claimed. Re-inserting restarts the TTL.
    pub fn insert(&self, provider_id: impl Into<String>) {
        self.insert_at(provider_id, Instant::now());
    }

    pub(crate) fn insert_at(&self, provider_id: impl Into<String>, now: Instant) {
        self.entries.insert(
            provider_id.into(),
            LinkEntry {
                expires_at: now.checked_add(self.ttl),
            },
        );
    }

    /// True if `provider_id` was inserted less than one TTL ago
    pub fn contains(&self, provider_id: &str) -> bool {
        self.contains_at(provider_id, Instant::now())
    }

    pub(crate) fn contains_at(&self, provider_id: &str, now: Instant) -> bool {
        if let Some(entry) = self.entries.get(provider_id) {
            if entry.is_live(now) {
                return true;
            }
        }
        // Shard lock from `get` is released above; re-check under the write lock
        // so a concurrent re-insert is not lost.
        self.entries.remove_if(provider_id, |_, e| !e.is_live(now));
        false
    }

    /// Drop an entry, e.g. once the Machine is visible
    pub fn remove(&self, provider_id: &str) {
        self.entries.remove(provider_id);
    }

    /// Remove every expired entry, returning how many were dropped
    pub fn purge_expired(&self) -> usize {
        self.purge_expired_at(Instant::now())
    }

    pub(crate) fn purge_expired_at(&self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, e| e.is_live(now));
        before.saturating_sub(self.entries.len())
    }

    /// Number of stored entries, including expired ones not yet purged
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Purge expired entries every `interval` until `shutdown` is cancelled.
    pub fn spawn_sweeper(
        self: &std::sync::Arc<Self>,
        interval: Duration,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        let cache = std::sync::Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        let purged = cache.purge_expired();
                        if purged > 0 {
                            debug!(purged, remaining = cache.len(), "Purged expired link cache entries");
                        }
                    }
                }
            }
        })
    }
}

impl Default for LinkCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const PID: &str = "aws:///test-zone-1a/i-0123";

    #[test]
    fn test_contains_until_ttl() {
        let cache = LinkCache::new(Duration::from_secs(600));
        let t0 = Instant::now();
        cache.insert_at(PID, t0);

        assert!(cache.contains_at(PID, t0));
        assert!(cache.contains_at(PID, t0 + Duration::from_secs(599)));
        assert!(!cache.contains_at(PID, t0 + Duration::from_secs(600)));
        // Lazy expiry removed it
        assert!(cache.is_empty());
    }

    #[test]
    fn test_expiry_is_from_insertion_not_access() {
        let cache = LinkCache::new(Duration::from_secs(10));
        let t0 = Instant::now();
        cache.insert_at(PID, t0);

        for s in 1..10 {
            assert!(cache.contains_at(PID, t0 + Duration::from_secs(s)));
        }
        assert!(!cache.contains_at(PID, t0 + Duration::from_secs(10)));
    }

    #[test]
    fn test_reinsert_restarts_ttl() {
        let cache = LinkCache::new(Duration::from_secs(10));
        let t0 = Instant::now();
        cache.insert_at(PID, t0);
        cache.insert_at(PID, t0 + Duration::from_secs(8));

        assert!(cache.contains_at(PID, t0 + Duration::from_secs(15)));
    }

    #[test]
    fn test_purge_expired() {
        let cache = LinkCache::new(Duration::from_secs(10));
        let t0 = Instant::now();
        cache.insert_at("aws:///z/i-old", t0);
        cache.insert_at("aws:///z/i-new", t0 + Duration::from_secs(5));

        assert_eq!(cache.purge_expired_at(t0 + Duration::from_secs(12)), 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.contains_at("aws:///z/i-new", t0 + Duration::from_secs(12)));
    }

    #[test]
    fn test_huge_ttl_never_expires() {
        let cache = LinkCache::new(Duration::MAX);
        let t0 = Instant::now();
        cache.insert_at(PID, t0);

        assert!(cache.contains_at(PID, t0 + Duration::from_secs(365 * 24 * 3600)));
        assert_eq!(cache.purge_expired_at(t0 + Duration::from_secs(365 * 24 * 3600)), 0);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_remove() {
        let cache = LinkCache::default();
        cache.insert(PID);
        assert!(cache.contains(PID));
        cache.remove(PID);
        assert!(!cache.contains(PID));
    }

    #[test]
    fn test_concurrent_reads_and_writes() {
        let cache = Arc::new(LinkCache::default());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    for i in 0..200 {
                        let pid = format!("aws:///z/i-{}-{}", t, i);
                        cache.insert(pid.clone());
                        assert!(cache.contains(&pid));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(cache.len(), 1600);
    }

    #[tokio::test]
    async fn test_sweeper_purges_and_stops() {
        let cache = Arc::new(LinkCache::new(Duration::from_millis(50)));
        cache.insert(PID);
        let shutdown = CancellationToken::new();
        let handle = cache.spawn_sweeper(Duration::from_millis(10), shutdown.clone());

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(cache.is_empty());

        shutdown.cancel();
        handle.await.unwrap();
    }
}
