//! Compute API models
//!
//! Wire types mirror the inventory API's JSON; `CloudInstance` is the
//! normalized form handed to callers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::provider_id::provider_id;

/// Paginated response wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    /// URL of the next page, absent on the last one
    #[serde(default)]
    pub next: Option<String>,
    /// Items on this page
    pub results: Vec<T>,
}

/// Instance lifecycle state
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum InstanceState {
    /// Launch accepted, not yet booted
    Pending,
    /// Booted and billing
    Running,
    /// Stop requested
    Stopping,
    /// Stopped, can be started again
    Stopped,
    /// Termination in progress
    ShuttingDown,
    /// Gone for good
    Terminated,
}

impl InstanceState {
    /// States from which an instance never comes back.
    pub fn is_terminal(self) -> bool {
        matches!(self, InstanceState::ShuttingDown | InstanceState::Terminated)
    }

    /// States worth listing; everything else is already on its way out.
    pub const ACTIVE: [InstanceState; 4] = [
        InstanceState::Pending,
        InstanceState::Running,
        InstanceState::Stopping,
        InstanceState::Stopped,
    ];

    /// Wire name, as used in the `state` query parameter.
    pub fn as_str(self) -> &'static str {
        match self {
            InstanceState::Pending => "pending",
            InstanceState::Running => "running",
            InstanceState::Stopping => "stopping",
            InstanceState::Stopped => "stopped",
            InstanceState::ShuttingDown => "shutting-down",
            InstanceState::Terminated => "terminated",
        }
    }
}

/// Key/value tag as returned by the API
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tag {
    /// Tag key
    pub key: String,
    /// Tag value, empty for key-only tags
    #[serde(default)]
    pub value: String,
}

/// Instance record matching the inventory API serializer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceRecord {
    /// Provider-assigned instance id
    pub instance_id: String,
    /// Availability zone, e.g. `us-west-2a`
    pub availability_zone: String,
    /// Instance size, when the API reports it
    pub instance_type: Option<String>,
    /// Launch timestamp (RFC 3339)
    pub launch_time: DateTime<Utc>,
    /// Lifecycle state
    pub state: InstanceState,
    /// Tags as key/value pairs
    #[serde(default)]
    pub tags: Vec<Tag>,
}

/// A cloud instance as seen by the garbage collector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloudInstance {
    /// Provider-assigned instance id
    pub instance_id: String,
    /// `aws:///<zone>/<instance_id>`, the join key against cluster state
    pub provider_id: String,
    /// Availability zone the instance runs in
    pub zone: String,
    /// When the provider launched the instance
    pub launch_time: DateTime<Utc>,
    /// Lifecycle state at listing time
    pub state: InstanceState,
    /// Tags by key
    pub tags: BTreeMap<String, String>,
}

impl CloudInstance {
    /// Whether the instance carries `key`, whatever its value.
    pub fn has_tag(&self, key: &str) -> bool {
        self.tags.contains_key(key)
    }
}

impl From<InstanceRecord> for CloudInstance {
    fn from(record: InstanceRecord) -> Self {
        Self {
            provider_id: provider_id(&record.availability_zone, &record.instance_id),
            instance_id: record.instance_id,
            zone: record.availability_zone,
            launch_time: record.launch_time,
            state: record.state,
            tags: record.tags.into_iter().map(|t| (t.key, t.value)).collect(),
        }
    }
}

/// Tag constraint applied when listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagFilter {
    /// Tag key that must be present
    pub key: String,
    /// `None` matches any value as long as the key is present
    pub value: Option<String>,
}

/// Server-side filter for instance listing
///
/// Every tag filter must match. Only non-terminal instances are returned.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstanceFilter {
    /// Constraints that must all hold
    pub tags: Vec<TagFilter>,
}

impl InstanceFilter {
    /// An empty filter; add constraints with [`tag`](Self::tag) and [`tag_key`](Self::tag_key).
    pub fn new() -> Self {
        Self::default()
    }

    /// Require a tag with an exact value.
    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.push(TagFilter {
            key: key.into(),
            value: Some(value.into()),
        });
        self
    }

    /// Require a tag key with any value.
    pub fn tag_key(mut self, key: impl Into<String>) -> Self {
        self.tags.push(TagFilter {
            key: key.into(),
            value: None,
        });
        self
    }

    /// Whether an instance's tags satisfy this filter.
    pub fn matches(&self, tags: &BTreeMap<String, String>) -> bool {
        self.tags.iter().all(|f| match (&f.value, tags.get(&f.key)) {
            (_, None) => false,
            (None, Some(_)) => true,
            (Some(want), Some(have)) => want == have,
        })
    }

    /// Query parameters in `tag:<key>=<value>` / `tag-key=<key>` form.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs: Vec<(String, String)> = self
            .tags
            .iter()
            .map(|f| match &f.value {
                Some(v) => (format!("tag:{}", f.key), v.clone()),
                None => ("tag-key".to_string(), f.key.clone()),
            })
            .collect();
        let states = InstanceState::ACTIVE.map(InstanceState::as_str).join(",");
        pairs.push(("state".to_string(), states));
        pairs
    }
}
