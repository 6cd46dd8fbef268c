//! Compute API Client
//!
//! Enumerates and terminates the cloud instances a cluster owns. The
//! garbage collector talks to it only through [`CloudProviderTrait`], so
//! tests can swap in the in-memory mock.
//!
//! # Example
//!
//! ```no_run
//! use cloud_client::{CloudClient, CloudProviderTrait, InstanceFilter};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = CloudClient::new(
//!     "http://cloud-api:8080".to_string(),
//!     "your-api-token".to_string(),
//! )?;
//!
//! let filter = InstanceFilter::new()
//!     .tag("kubernetes.io/cluster/test", "owned")
//!     .tag_key("karpenter.sh/managed-by");
//! for instance in client.list_owned_instances(&filter).await? {
//!     println!("{} launched at {}", instance.provider_id, instance.launch_time);
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod common;
pub mod error;
pub mod models;
pub mod provider_id;
#[path = "trait.rs"]
pub mod cloud_trait;
#[cfg(feature = "test-util")]
pub mod mock;

pub use client::CloudClient;
pub use common::HttpClient;
pub use error::CloudError;
pub use models::*;
pub use provider_id::{parse_provider_id, provider_id};
pub use cloud_trait::CloudProviderTrait;
#[cfg(feature = "test-util")]
pub use mock::MockCloudProvider;
