//! Controller-specific error types.
//!
//! Per-instance deletion errors never surface here; they are captured in the
//! pass result. These are the errors that fail a whole pass or startup.

use cloud_client::CloudError;
use kube::Error as KubeError;
use thiserror::Error;

/// Errors that can occur in the garbage collection controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Kubernetes API error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] KubeError),

    /// Compute API error
    #[error("Cloud error: {0}")]
    Cloud(#[from] CloudError),

    /// Listing instances or machines failed; no action was taken this pass
    #[error("Listing failed: {0}")]
    Listing(String),

    /// Removing a Node for a garbage collected instance failed
    #[error("Node deletion failed: {0}")]
    NodeDeletion(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The pass was cancelled before any deletion was dispatched
    #[error("Pass cancelled before listing completed")]
    Cancelled,
}
