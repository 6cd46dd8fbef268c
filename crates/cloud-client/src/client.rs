//! Compute API client
//!
//! Implements instance enumeration and termination against the inventory
//! REST API: `GET /api/v1/instances` and `DELETE /api/v1/instances/{id}`.

use crate::cloud_trait::CloudProviderTrait;
use crate::common::HttpClient;
use crate::error::CloudError;
use crate::models::{CloudInstance, InstanceFilter, InstanceRecord};
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Compute API client
#[derive(Debug, Clone)]
pub struct CloudClient {
    http: HttpClient,
}

impl CloudClient {
    /// Create a new cloud client
    ///
    /// # Arguments
    /// * `base_url` - API base URL (e.g., "http://cloud-api:8080")
    /// * `token` - Bearer token for authentication
    pub fn new(base_url: String, token: String) -> Result<Self, CloudError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http: HttpClient::new(client, base_url, token),
        })
    }
}

#[async_trait::async_trait]
impl CloudProviderTrait for CloudClient {
    fn base_url(&self) -> &str {
        self.http.base_url()
    }

    async fn list_owned_instances(&self, filter: &InstanceFilter) -> Result<Vec<CloudInstance>, CloudError> {
        let query = self.http.build_query_string(&filter.query_pairs());
        let url = self.http.build_url(&format!("/api/v1/instances?{}", query));

        let records: Vec<InstanceRecord> = self.http.fetch_all_pages(url).await?;
        debug!("Listed {} instances", records.len());

        // The API filters by state already; a racing termination can still slip through.
        Ok(records
            .into_iter()
            .filter(|r| !r.state.is_terminal())
            .map(CloudInstance::from)
            .collect())
    }

    async fn delete_instance(&self, instance_id: &str) -> Result<(), CloudError> {
        if instance_id.is_empty() || instance_id.contains('/') {
            return Err(CloudError::InvalidRequest(format!(
                "invalid instance id: {:?}",
                instance_id
            )));
        }
        debug!("Terminating instance: {}", instance_id);
        self.http
            .delete(&format!("/api/v1/instances/{}", urlencoding::encode(instance_id)))
            .await
    }
}
