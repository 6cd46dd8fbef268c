//! Garbage collection pass
//!
//! One pass lists the cloud instances this cluster launched, decides which
//! of them no Machine accounts for, and deletes those. An instance is kept
//! while any of these holds:
//!
//! - it launched less than the resolution window ago
//! - a Machine's `status.providerID` names it
//! - a Machine carries the linked annotation for it
//! - the link cache holds an unexpired entry for it
//!
//! Anything else is orphaned. Both listings must succeed before a single
//! deletion is attempted.

use crate::cluster::ClusterClientTrait;
use crate::deleter::{DeleteReport, Deleter};
use crate::error::ControllerError;
use crate::link_cache::LinkCache;
use crate::machine_index::MachineIndex;
use chrono::{DateTime, Utc};
use cloud_client::{CloudInstance, CloudProviderTrait, InstanceFilter};
use crds::{cluster_tag_key, CLUSTER_TAG_OWNED, MANAGED_BY_LABEL_KEY};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Why an instance survived a pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeepReason {
    WithinResolutionWindow,
    OwnedByMachine,
    LinkedByMachine,
    RecentlyLinked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Keep(KeepReason),
    Orphaned,
}

/// Decides whether `instance` is accounted for.
///
/// Launch times in the future (clock skew) count as within the window.
pub fn classify(
    instance: &CloudInstance,
    machines: &MachineIndex,
    link_cache: &LinkCache,
    now: DateTime<Utc>,
    resolution_window: Duration,
) -> Classification {
    let age = now.signed_duration_since(instance.launch_time);
    let young = match age.to_std() {
        Ok(age) => age < resolution_window,
        // Negative age
        Err(_) => true,
    };

    if young {
        Classification::Keep(KeepReason::WithinResolutionWindow)
    } else if machines.is_owned(&instance.provider_id) {
        Classification::Keep(KeepReason::OwnedByMachine)
    } else if machines.is_linked(&instance.provider_id) {
        Classification::Keep(KeepReason::LinkedByMachine)
    } else if link_cache.contains(&instance.provider_id) {
        Classification::Keep(KeepReason::RecentlyLinked)
    } else {
        Classification::Orphaned
    }
}

/// An instance the pass tried and failed to clean up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedDeletion {
    pub instance_id: String,
    pub provider_id: String,
    pub cause: String,
}

/// Summary of one pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassResult {
    /// In-scope instances returned by the listing
    pub instances_scanned: usize,
    pub orphaned_found: usize,
    /// Instance ids terminated (or already gone)
    pub deleted: Vec<String>,
    /// Instances the cloud refused to terminate
    pub failed: Vec<FailedDeletion>,
    /// Instances terminated whose Node could not be removed
    pub node_failures: Vec<FailedDeletion>,
    /// Orphans left untouched because the pass was cancelled
    pub not_processed: Vec<String>,
}

impl PassResult {
    /// Every orphan was handled and nothing failed
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.node_failures.is_empty() && self.not_processed.is_empty()
    }

    fn record(&mut self, report: DeleteReport) {
        for outcome in report.outcomes {
            match outcome.result {
                Ok(()) => {
                    if let Some(cause) = outcome.node_error {
                        self.node_failures.push(FailedDeletion {
                            instance_id: outcome.instance_id.clone(),
                            provider_id: outcome.provider_id,
                            cause,
                        });
                    }
                    self.deleted.push(outcome.instance_id);
                }
                Err(cause) => self.failed.push(FailedDeletion {
                    instance_id: outcome.instance_id,
                    provider_id: outcome.provider_id,
                    cause,
                }),
            }
        }
        self.not_processed.extend(report.not_processed);
    }
}

/// Tunables for a [`Reconciler`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcilerOptions {
    pub cluster_name: String,
    pub resolution_window: Duration,
    pub delete_concurrency: usize,
}

impl Default for ReconcilerOptions {
    fn default() -> Self {
        Self {
            cluster_name: String::new(),
            resolution_window: Duration::from_secs(60),
            delete_concurrency: 32,
        }
    }
}

/// Runs garbage collection passes against one cluster
pub struct Reconciler {
    cloud: Arc<dyn CloudProviderTrait>,
    cluster: Arc<dyn ClusterClientTrait>,
    link_cache: Arc<LinkCache>,
    deleter: Deleter,
    filter: InstanceFilter,
    options: ReconcilerOptions,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("cloud", &self.cloud.base_url())
            .field("filter", &self.filter)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    pub fn new(
        cloud: Arc<dyn CloudProviderTrait>,
        cluster: Arc<dyn ClusterClientTrait>,
        link_cache: Arc<LinkCache>,
        options: ReconcilerOptions,
    ) -> Self {
        let filter = instance_filter(&options.cluster_name);
        Self {
            deleter: Deleter::new(Arc::clone(&cloud), Arc::clone(&cluster)),
            cloud,
            cluster,
            link_cache,
            filter,
            options,
        }
    }

    /// Runs one pass.
    ///
    /// Listing failures fail the pass with nothing deleted. Per-instance
    /// failures are reported in the result and never fail the pass.
    pub async fn run_pass(&self, cancel: &CancellationToken) -> Result<PassResult, ControllerError> {
        let started = Instant::now();
        if cancel.is_cancelled() {
            return Err(ControllerError::Cancelled);
        }

        // Instances are listed before Machines: a Machine created after the
        // instance listing is still seen by the Machine listing.
        let listed = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ControllerError::Cancelled),
            listed = self.list_state() => listed,
        };
        let (instances, machines) = listed.inspect_err(|e| {
            error!(error = %e, "Garbage collection pass aborted, nothing deleted");
        })?;

        let now = Utc::now();
        let mut result = PassResult::default();
        let mut orphans = Vec::new();
        for instance in instances {
            if !is_managed(&instance) {
                warn!(
                    instance_id = %instance.instance_id,
                    "Listing returned an instance without the managed-by tag, ignoring"
                );
                continue;
            }
            result.instances_scanned += 1;
            match classify(
                &instance,
                &machines,
                &self.link_cache,
                now,
                self.options.resolution_window,
            ) {
                Classification::Keep(reason) => {
                    debug!(provider_id = %instance.provider_id, ?reason, "Keeping instance");
                }
                Classification::Orphaned => orphans.push(instance),
            }
        }
        result.orphaned_found = orphans.len();

        if !orphans.is_empty() {
            info!(
                orphaned = orphans.len(),
                scanned = result.instances_scanned,
                "Deleting orphaned instances"
            );
            let report = self
                .deleter
                .delete_all(orphans, self.options.delete_concurrency, cancel)
                .await;
            result.record(report);
        }

        info!(
            scanned = result.instances_scanned,
            machines = machines.len(),
            orphaned = result.orphaned_found,
            deleted = result.deleted.len(),
            failed = result.failed.len(),
            node_failures = result.node_failures.len(),
            not_processed = result.not_processed.len(),
            elapsed_ms = started.elapsed().as_millis(),
            "Garbage collection pass complete"
        );
        Ok(result)
    }

    async fn list_state(&self) -> Result<(Vec<CloudInstance>, MachineIndex), ControllerError> {
        let instances = self
            .cloud
            .list_owned_instances(&self.filter)
            .await
            .map_err(|e| ControllerError::Listing(format!("listing cloud instances: {}", e)))?;
        let machines = self
            .cluster
            .list_machines()
            .await
            .map_err(|e| ControllerError::Listing(format!("listing machines: {}", e)))?;
        Ok((instances, MachineIndex::from_records(machines)))
    }
}

/// Listing filter selecting instances this system launched for `cluster_name`
pub fn instance_filter(cluster_name: &str) -> InstanceFilter {
    InstanceFilter::new()
        .tag(cluster_tag_key(cluster_name), CLUSTER_TAG_OWNED)
        .tag_key(MANAGED_BY_LABEL_KEY)
}

fn is_managed(instance: &CloudInstance) -> bool {
    instance.has_tag(MANAGED_BY_LABEL_KEY)
}
