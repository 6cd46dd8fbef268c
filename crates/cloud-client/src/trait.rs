//! CloudProviderTrait for mocking
//!
//! This trait abstracts the compute API so the garbage collector can be
//! tested against an in-memory implementation.

use crate::error::CloudError;
use crate::models::{CloudInstance, InstanceFilter};

/// Trait for compute API operations
///
/// All async methods must be `Send` to work with Tokio's work-stealing runtime.
#[async_trait::async_trait]
pub trait CloudProviderTrait: Send + Sync {
    /// Get the base URL
    fn base_url(&self) -> &str;

    /// Lists every non-terminal instance matching the filter.
    async fn list_owned_instances(&self, filter: &InstanceFilter) -> Result<Vec<CloudInstance>, CloudError>;

    /// Terminates an instance. Returns `CloudError::NotFound` if it does not exist.
    async fn delete_instance(&self, instance_id: &str) -> Result<(), CloudError>;
}
