//! Mock CloudProvider for unit testing
//!
//! Stores instances in memory and applies listing filters the way the
//! inventory API does server-side. Failures can be injected per operation.

use crate::cloud_trait::CloudProviderTrait;
use crate::error::CloudError;
use crate::models::{CloudInstance, InstanceFilter, InstanceState};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// Mock compute API for testing
///
/// Terminated instances stay in the store (like a real provider reports them
/// for a while) but are never listed again.
#[derive(Debug, Clone)]
pub struct MockCloudProvider {
    pub(crate) base_url: String,
    // Keyed by instance id
    pub(crate) instances: Arc<Mutex<HashMap<String, CloudInstance>>>,
    pub(crate) failing_deletions: Arc<Mutex<HashSet<String>>>,
    pub(crate) fail_listing: Arc<AtomicBool>,
    pub(crate) list_calls: Arc<AtomicUsize>,
    pub(crate) delete_calls: Arc<AtomicUsize>,
}

impl MockCloudProvider {
    /// Create a new mock client
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            instances: Arc::new(Mutex::new(HashMap::new())),
            failing_deletions: Arc::new(Mutex::new(HashSet::new())),
            fail_listing: Arc::new(AtomicBool::new(false)),
            list_calls: Arc::new(AtomicUsize::new(0)),
            delete_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn store(&self) -> MutexGuard<'_, HashMap<String, CloudInstance>> {
        self.instances.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Add an instance to the mock store (for test setup)
    pub fn add_instance(&self, instance: CloudInstance) {
        self.store().insert(instance.instance_id.clone(), instance);
    }

    /// Look up a live (non-terminal) instance by provider id
    pub fn get(&self, provider_id: &str) -> Option<CloudInstance> {
        self.store()
            .values()
            .find(|i| i.provider_id == provider_id && !i.state.is_terminal())
            .cloned()
    }

    /// True if the instance exists and has not been terminated
    pub fn exists(&self, provider_id: &str) -> bool {
        self.get(provider_id).is_some()
    }

    /// Number of live instances
    pub fn live_count(&self) -> usize {
        self.store().values().filter(|i| !i.state.is_terminal()).count()
    }

    /// Make every listing call fail until reset
    pub fn set_fail_listing(&self, fail: bool) {
        self.fail_listing.store(fail, Ordering::SeqCst);
    }

    /// Make deletion of one instance fail with an API error
    pub fn fail_deletion_for(&self, instance_id: impl Into<String>) {
        self.failing_deletions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(instance_id.into());
    }

    /// Number of `list_owned_instances` calls made
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Number of `delete_instance` calls made, successful or not
    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl CloudProviderTrait for MockCloudProvider {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn list_owned_instances(&self, filter: &InstanceFilter) -> Result<Vec<CloudInstance>, CloudError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_listing.load(Ordering::SeqCst) {
            return Err(CloudError::Api("injected listing failure".to_string()));
        }
        Ok(self
            .store()
            .values()
            .filter(|i| !i.state.is_terminal() && filter.matches(&i.tags))
            .cloned()
            .collect())
    }

    async fn delete_instance(&self, instance_id: &str) -> Result<(), CloudError> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failing_deletions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(instance_id);
        if failing {
            return Err(CloudError::Api(format!("injected failure terminating {}", instance_id)));
        }
        match self.store().get_mut(instance_id) {
            Some(instance) => {
                instance.state = InstanceState::Terminated;
                Ok(())
            }
            None => Err(CloudError::NotFound(format!("Instance {} not found", instance_id))),
        }
    }
}
