//! Machine CRD
//!
//! A Machine is the cluster-side record of a cloud instance launched by the
//! provisioner. The garbage collector only reads Machines; it never writes them.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::keys::MACHINE_LINKED_ANNOTATION_KEY;

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[kube(
    group = "karpenter.sh",
    version = "v1alpha5",
    kind = "Machine",
    status = "MachineStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct MachineSpec {
    /// Scheduling requirements the launched instance must satisfy
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requirements: Vec<MachineRequirement>,

    /// Taints applied to the Node when it registers
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub taints: Vec<MachineTaint>,

    /// Minimum resources requested for the instance
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub resources: BTreeMap<String, String>,

    /// Reference to the provider-specific template used at launch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine_template_ref: Option<MachineTemplateRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MachineRequirement {
    /// Label key the requirement applies to
    pub key: String,

    /// Operator (In, NotIn, Exists, DoesNotExist, Gt, Lt)
    pub operator: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MachineTaint {
    pub key: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,

    /// NoSchedule, PreferNoSchedule or NoExecute
    pub effect: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MachineTemplateRef {
    pub kind: String,
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct MachineStatus {
    /// Provider id of the backing instance, set once the launch is resolved
    #[serde(rename = "providerID", default, skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,

    /// Name of the Node registered for this Machine
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_name: Option<String>,

    /// Resources reported by the launched instance
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub capacity: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub allocatable: BTreeMap<String, String>,
}

impl Machine {
    /// Provider id from the status, ignoring an empty string.
    pub fn provider_id(&self) -> Option<&str> {
        self.status
            .as_ref()
            .and_then(|s| s.provider_id.as_deref())
            .filter(|id| !id.is_empty())
    }

    /// Provider id this Machine is in the middle of claiming, if any.
    pub fn linked_provider_id(&self) -> Option<&str> {
        self.metadata
            .annotations
            .as_ref()
            .and_then(|a| a.get(MACHINE_LINKED_ANNOTATION_KEY))
            .map(String::as_str)
            .filter(|id| !id.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::api::ObjectMeta;

    fn machine(provider_id: Option<&str>, linked: Option<&str>) -> Machine {
        let mut m = Machine::new("default-abc12", MachineSpec::default());
        m.status = Some(MachineStatus {
            provider_id: provider_id.map(str::to_string),
            ..Default::default()
        });
        if let Some(linked) = linked {
            m.metadata = ObjectMeta {
                name: Some("default-abc12".to_string()),
                annotations: Some(BTreeMap::from([(
                    MACHINE_LINKED_ANNOTATION_KEY.to_string(),
                    linked.to_string(),
                )])),
                ..Default::default()
            };
        }
        m
    }

    #[test]
    fn test_provider_id_ignores_empty() {
        assert_eq!(machine(Some(""), None).provider_id(), None);
        assert_eq!(
            machine(Some("aws:///test-zone-1a/i-0123"), None).provider_id(),
            Some("aws:///test-zone-1a/i-0123")
        );
        let mut no_status = machine(None, None);
        no_status.status = None;
        assert_eq!(no_status.provider_id(), None);
    }

    #[test]
    fn test_linked_provider_id() {
        let m = machine(None, Some("aws:///test-zone-1a/i-0456"));
        assert_eq!(m.linked_provider_id(), Some("aws:///test-zone-1a/i-0456"));
        assert_eq!(machine(None, None).linked_provider_id(), None);
    }

    #[test]
    fn test_status_serializes_provider_id_key() {
        let status = MachineStatus {
            provider_id: Some("aws:///test-zone-1a/i-0123".to_string()),
            ..Default::default()
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["providerID"], "aws:///test-zone-1a/i-0123");
    }
}
