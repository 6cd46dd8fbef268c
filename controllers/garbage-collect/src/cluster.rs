//! Cluster-side collaborator
//!
//! Lists Machines and Nodes and removes stale Nodes. The reconciler only sees
//! [`ClusterClientTrait`], so tests run against `test_utils::MockClusterClient`.

use crate::error::ControllerError;
use crate::machine_index::MachineRecord;
use crds::Machine;
use k8s_openapi::api::core::v1::Node;
use kube::api::{DeleteParams, ListParams};
use kube::{Api, Client};
use std::collections::HashMap;
use tracing::{debug, info};

/// Trait for the cluster API operations the garbage collector needs
#[async_trait::async_trait]
pub trait ClusterClientTrait: Send + Sync {
    /// Lists every Machine currently in the API server.
    async fn list_machines(&self) -> Result<Vec<MachineRecord>, ControllerError>;

    /// Lists every Node currently in the API server.
    async fn list_nodes(&self) -> Result<Vec<NodeRecord>, ControllerError>;

    /// Deletes the Node called `name`. A missing Node is success.
    async fn delete_node(&self, name: &str) -> Result<(), ControllerError>;
}

/// The parts of a Node the garbage collector cares about
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeRecord {
    pub name: String,
    /// `spec.providerID`, absent until the kubelet registers it
    pub provider_id: Option<String>,
}

impl From<&Node> for NodeRecord {
    fn from(node: &Node) -> Self {
        Self {
            name: node.metadata.name.clone().unwrap_or_default(),
            provider_id: node
                .spec
                .as_ref()
                .and_then(|s| s.provider_id.clone())
                .filter(|pid| !pid.is_empty()),
        }
    }
}

/// Node names by provider id, built from one listing per pass
#[derive(Debug, Clone, Default)]
pub struct NodeIndex {
    by_provider_id: HashMap<String, Vec<String>>,
}

impl NodeIndex {
    pub fn from_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = NodeRecord>,
    {
        let mut index = Self::default();
        for record in records {
            if let Some(pid) = record.provider_id {
                index.by_provider_id.entry(pid).or_default().push(record.name);
            }
        }
        index
    }

    /// Names of the Nodes registered for `provider_id`
    pub fn names_for(&self, provider_id: &str) -> &[String] {
        self.by_provider_id
            .get(provider_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

/// kube-rs implementation against the live API server
#[derive(Clone)]
pub struct KubeClusterClient {
    machine_api: Api<Machine>,
    node_api: Api<Node>,
}

impl std::fmt::Debug for KubeClusterClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeClusterClient").finish_non_exhaustive()
    }
}

impl KubeClusterClient {
    /// Machines and Nodes are both cluster-scoped.
    pub fn new(client: Client) -> Self {
        Self {
            machine_api: Api::all(client.clone()),
            node_api: Api::all(client),
        }
    }
}

#[async_trait::async_trait]
impl ClusterClientTrait for KubeClusterClient {
    async fn list_machines(&self) -> Result<Vec<MachineRecord>, ControllerError> {
        let machines = self.machine_api.list(&ListParams::default()).await?;
        debug!("Listed {} machines", machines.items.len());
        Ok(machines.items.iter().map(MachineRecord::from).collect())
    }

    async fn list_nodes(&self) -> Result<Vec<NodeRecord>, ControllerError> {
        let nodes = self.node_api.list(&ListParams::default()).await?;
        debug!("Listed {} nodes", nodes.items.len());
        Ok(nodes.items.iter().map(NodeRecord::from).collect())
    }

    async fn delete_node(&self, name: &str) -> Result<(), ControllerError> {
        match self.node_api.delete(name, &DeleteParams::default()).await {
            Ok(_) => {
                info!(node = %name, "Deleted node");
                Ok(())
            }
            Err(kube::Error::Api(ae)) if ae.code == 404 => {
                debug!(node = %name, "Node already gone");
                Ok(())
            }
            Err(e) => Err(ControllerError::NodeDeletion(format!("{}: {}", name, e))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::NodeSpec;
    use kube::api::ObjectMeta;

    fn node(name: &str, provider_id: Option<&str>) -> Node {
        Node {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..Default::default()
            },
            spec: Some(NodeSpec {
                provider_id: provider_id.map(str::to_string),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_node_record_ignores_empty_provider_id() {
        assert_eq!(NodeRecord::from(&node("a", Some(""))).provider_id, None);
        assert_eq!(
            NodeRecord::from(&node("b", Some("aws:///z/i-1"))).provider_id.as_deref(),
            Some("aws:///z/i-1")
        );
    }

    #[test]
    fn test_node_index_groups_by_provider_id() {
        let index = NodeIndex::from_records(
            [
                node("node-a", Some("aws:///z/i-1")),
                node("node-b", Some("aws:///z/i-1")),
                node("node-c", Some("aws:///z/i-2")),
                node("node-d", None),
            ]
            .iter()
            .map(NodeRecord::from),
        );

        assert_eq!(index.names_for("aws:///z/i-1"), ["node-a", "node-b"]);
        assert_eq!(index.names_for("aws:///z/i-2"), ["node-c"]);
        assert!(index.names_for("aws:///z/i-3").is_empty());
    }
}
