//! Deletion of orphaned instances
//!
//! Each orphan is terminated on the cloud side, then any Node pointing at it
//! is removed so pods stop scheduling onto it before the node lifecycle
//! controller notices. Outcomes are independent per instance.

use crate::cluster::{ClusterClientTrait, NodeIndex};
use cloud_client::{CloudInstance, CloudProviderTrait};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Upper bound on the best-effort Node cleanup for one instance
pub const NODE_DELETE_TIMEOUT: Duration = Duration::from_secs(30);

/// Result of deleting one orphaned instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteOutcome {
    pub instance_id: String,
    pub provider_id: String,
    /// Cloud-side termination; `Err` carries the cause
    pub result: Result<(), String>,
    /// Node cleanup failure, never affecting `result`
    pub node_error: Option<String>,
}

impl DeleteOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Outcomes of a fan-out, plus the instances never attempted due to cancellation
#[derive(Debug, Default)]
pub struct DeleteReport {
    pub outcomes: Vec<DeleteOutcome>,
    pub not_processed: Vec<String>,
}

enum Dispatch {
    Completed(DeleteOutcome),
    Skipped(String),
}

/// Deletes orphaned instances and their Nodes
#[derive(Clone)]
pub struct Deleter {
    cloud: Arc<dyn CloudProviderTrait>,
    cluster: Arc<dyn ClusterClientTrait>,
    node_timeout: Duration,
}

impl std::fmt::Debug for Deleter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Deleter")
            .field("cloud", &self.cloud.base_url())
            .field("node_timeout", &self.node_timeout)
            .finish_non_exhaustive()
    }
}

impl Deleter {
    pub fn new(cloud: Arc<dyn CloudProviderTrait>, cluster: Arc<dyn ClusterClientTrait>) -> Self {
        Self {
            cloud,
            cluster,
            node_timeout: NODE_DELETE_TIMEOUT,
        }
    }

    /// Terminates one instance, then removes the Nodes `nodes` lists for it.
    ///
    /// Not-found counts as success at both steps. Nodes are only touched once
    /// the instance is known to be gone. The cloud call always runs to
    /// completion; `cancel` only stops Node cleanup, which is then reported
    /// as a node error.
    pub async fn delete(
        &self,
        instance: &CloudInstance,
        nodes: &NodeIndex,
        cancel: &CancellationToken,
    ) -> DeleteOutcome {
        let mut outcome = DeleteOutcome {
            instance_id: instance.instance_id.clone(),
            provider_id: instance.provider_id.clone(),
            result: Ok(()),
            node_error: None,
        };

        match self.cloud.delete_instance(&instance.instance_id).await {
            Ok(()) => {
                info!(
                    instance_id = %instance.instance_id,
                    provider_id = %instance.provider_id,
                    "Garbage collected cloud instance"
                );
            }
            Err(e) if e.is_not_found() => {
                debug!(instance_id = %instance.instance_id, "Instance already gone");
            }
            Err(e) => {
                warn!(instance_id = %instance.instance_id, error = %e, "Failed to terminate instance");
                outcome.result = Err(e.to_string());
                return outcome;
            }
        }

        if let Err(err) = self.delete_nodes(nodes.names_for(&instance.provider_id), cancel).await {
            warn!(
                provider_id = %instance.provider_id,
                error = %err,
                "Failed to delete node for garbage collected instance"
            );
            outcome.node_error = Some(err);
        }
        outcome
    }

    async fn delete_nodes(&self, names: &[String], cancel: &CancellationToken) -> Result<(), String> {
        for name in names {
            let attempt = tokio::time::timeout(self.node_timeout, self.cluster.delete_node(name));
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(format!("cancelled before node {} was deleted", name));
                }
                result = attempt => match result {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => return Err(e.to_string()),
                    Err(_) => {
                        return Err(format!(
                            "deleting node {} timed out after {:?}",
                            name, self.node_timeout
                        ));
                    }
                },
            }
        }
        Ok(())
    }

    /// Deletes every instance with at most `concurrency` in flight.
    ///
    /// Nodes are listed once up front. A failed Node listing does not stop
    /// instance termination; every terminated instance then reports it as
    /// its node error. Once `cancel` fires no new deletion starts and those
    /// instances land in `not_processed`.
    pub async fn delete_all(
        &self,
        instances: Vec<CloudInstance>,
        concurrency: usize,
        cancel: &CancellationToken,
    ) -> DeleteReport {
        let mut report = DeleteReport::default();
        if instances.is_empty() {
            return report;
        }

        let listed = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                report.not_processed = instances.into_iter().map(|i| i.instance_id).collect();
                return report;
            }
            listed = self.cluster.list_nodes() => listed,
        };
        let (nodes, listing_error) = match listed {
            Ok(records) => (NodeIndex::from_records(records), None),
            Err(e) => {
                warn!(error = %e, "Failed to list nodes, node cleanup skipped this pass");
                (NodeIndex::default(), Some(format!("listing nodes: {}", e)))
            }
        };
        let nodes = &nodes;

        let dispatched = futures::stream::iter(instances)
            .map(|instance| async move {
                if cancel.is_cancelled() {
                    return Dispatch::Skipped(instance.instance_id);
                }
                Dispatch::Completed(self.delete(&instance, nodes, cancel).await)
            })
            .buffer_unordered(concurrency.max(1))
            .collect::<Vec<_>>()
            .await;

        for d in dispatched {
            match d {
                Dispatch::Completed(mut outcome) => {
                    if let (Ok(()), Some(cause)) = (&outcome.result, &listing_error) {
                        outcome.node_error.get_or_insert_with(|| cause.clone());
                    }
                    report.outcomes.push(outcome);
                }
                Dispatch::Skipped(id) => report.not_processed.push(id),
            }
        }
        report
    }

    #[cfg(test)]
    pub(crate) fn with_node_timeout(mut self, timeout: Duration) -> Self {
        self.node_timeout = timeout;
        self
    }
}
