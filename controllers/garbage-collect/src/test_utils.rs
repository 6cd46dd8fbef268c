//! Test utilities for garbage collector tests
//!
//! In-memory cluster collaborator plus builders for instances and Machines
//! tagged the way the provisioner tags them.

use crate::cluster::{ClusterClientTrait, NodeRecord};
use crate::error::ControllerError;
use crate::link_cache::LinkCache;
use crate::machine_index::MachineRecord;
use crate::reconciler::{Reconciler, ReconcilerOptions};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use cloud_client::{CloudInstance, InstanceState, MockCloudProvider};
use crds::{cluster_tag_key, CLUSTER_TAG_OWNED, MANAGED_BY_LABEL_KEY, PROVISIONER_NAME_LABEL_KEY};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const TEST_CLUSTER: &str = "test-cluster";
pub const TEST_ZONE: &str = "test-zone-1a";

/// Instant `minutes` in the past
pub fn minutes_ago(minutes: i64) -> DateTime<Utc> {
    Utc::now() - ChronoDuration::minutes(minutes)
}

/// A running instance carrying every tag the provisioner sets
pub fn owned_instance(cluster: &str, instance_id: &str, launch_time: DateTime<Utc>) -> CloudInstance {
    let mut tags = BTreeMap::new();
    tags.insert(cluster_tag_key(cluster), CLUSTER_TAG_OWNED.to_string());
    tags.insert(PROVISIONER_NAME_LABEL_KEY.to_string(), "default".to_string());
    tags.insert(MANAGED_BY_LABEL_KEY.to_string(), cluster.to_string());
    CloudInstance {
        instance_id: instance_id.to_string(),
        provider_id: cloud_client::provider_id(TEST_ZONE, instance_id),
        zone: TEST_ZONE.to_string(),
        launch_time,
        state: InstanceState::Running,
        tags,
    }
}

/// Same as [`owned_instance`] without the managed-by tag
pub fn unmanaged_instance(cluster: &str, instance_id: &str, launch_time: DateTime<Utc>) -> CloudInstance {
    let mut instance = owned_instance(cluster, instance_id, launch_time);
    instance.tags.remove(MANAGED_BY_LABEL_KEY);
    instance
}

/// Machine whose `status.providerID` is set
pub fn machine_for(name: &str, provider_id: &str) -> MachineRecord {
    MachineRecord {
        name: name.to_string(),
        provider_id: Some(provider_id.to_string()),
        linked: None,
    }
}

/// Machine still claiming an instance through the linked annotation
pub fn linking_machine(name: &str, provider_id: &str) -> MachineRecord {
    MachineRecord {
        name: name.to_string(),
        provider_id: None,
        linked: Some(provider_id.to_string()),
    }
}

/// In-memory cluster collaborator
#[derive(Debug, Clone, Default)]
pub struct MockClusterClient {
    machines: Arc<Mutex<Vec<MachineRecord>>>,
    // node name -> provider id
    nodes: Arc<Mutex<HashMap<String, String>>>,
    failing_nodes: Arc<Mutex<HashSet<String>>>,
    fail_list: Arc<AtomicBool>,
    fail_list_nodes: Arc<AtomicBool>,
    list_calls: Arc<AtomicUsize>,
    node_list_calls: Arc<AtomicUsize>,
    node_delete_calls: Arc<AtomicUsize>,
}

impl MockClusterClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_machine(&self, machine: MachineRecord) {
        self.machines.lock().unwrap().push(machine);
    }

    pub fn machine_count(&self) -> usize {
        self.machines.lock().unwrap().len()
    }

    pub fn add_node(&self, name: &str, provider_id: &str) {
        self.nodes
            .lock()
            .unwrap()
            .insert(name.to_string(), provider_id.to_string());
    }

    pub fn has_node_for(&self, provider_id: &str) -> bool {
        self.nodes.lock().unwrap().values().any(|pid| pid == provider_id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.lock().unwrap().len()
    }

    pub fn fail_list_machines(&self, fail: bool) {
        self.fail_list.store(fail, Ordering::SeqCst);
    }

    pub fn fail_list_nodes(&self, fail: bool) {
        self.fail_list_nodes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_node_deletion_for(&self, provider_id: &str) {
        self.failing_nodes.lock().unwrap().insert(provider_id.to_string());
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn node_list_calls(&self) -> usize {
        self.node_list_calls.load(Ordering::SeqCst)
    }

    pub fn node_delete_calls(&self) -> usize {
        self.node_delete_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ClusterClientTrait for MockClusterClient {
    async fn list_machines(&self) -> Result<Vec<MachineRecord>, ControllerError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(ControllerError::Listing("injected machine listing failure".to_string()));
        }
        Ok(self.machines.lock().unwrap().clone())
    }

    async fn list_nodes(&self) -> Result<Vec<NodeRecord>, ControllerError> {
        self.node_list_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_list_nodes.load(Ordering::SeqCst) {
            return Err(ControllerError::Listing("injected node listing failure".to_string()));
        }
        Ok(self
            .nodes
            .lock()
            .unwrap()
            .iter()
            .map(|(name, pid)| NodeRecord {
                name: name.clone(),
                provider_id: Some(pid.clone()),
            })
            .collect())
    }

    async fn delete_node(&self, name: &str) -> Result<(), ControllerError> {
        self.node_delete_calls.fetch_add(1, Ordering::SeqCst);
        let mut nodes = self.nodes.lock().unwrap();
        let failing = nodes
            .get(name)
            .is_some_and(|pid| self.failing_nodes.lock().unwrap().contains(pid));
        if failing {
            return Err(ControllerError::NodeDeletion(format!(
                "injected failure deleting node {}",
                name
            )));
        }
        nodes.remove(name);
        Ok(())
    }
}

/// Everything a reconciler test needs to arrange and assert on
pub struct Harness {
    pub cloud: MockCloudProvider,
    pub cluster: MockClusterClient,
    pub link_cache: Arc<LinkCache>,
    pub reconciler: Reconciler,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_options(ReconcilerOptions {
            cluster_name: TEST_CLUSTER.to_string(),
            ..ReconcilerOptions::default()
        })
    }

    pub fn with_options(options: ReconcilerOptions) -> Self {
        let cloud = MockCloudProvider::new("http://mock-cloud");
        let cluster = MockClusterClient::new();
        let link_cache = Arc::new(LinkCache::new(Duration::from_secs(600)));
        let reconciler = Reconciler::new(
            Arc::new(cloud.clone()),
            Arc::new(cluster.clone()),
            Arc::clone(&link_cache),
            options,
        );
        Self {
            cloud,
            cluster,
            link_cache,
            reconciler,
        }
    }

    /// Adds an owned instance plus a Node registered for it
    pub fn add_instance_with_node(&self, instance_id: &str, launch_time: DateTime<Utc>) -> CloudInstance {
        let instance = owned_instance(TEST_CLUSTER, instance_id, launch_time);
        self.cloud.add_instance(instance.clone());
        self.cluster
            .add_node(&format!("node-{}", instance_id), &instance.provider_id);
        instance
    }
}
