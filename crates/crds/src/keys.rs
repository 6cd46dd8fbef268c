//! Well-known label, annotation and tag keys shared between the provisioner,
//! the link controller and the garbage collector.

/// Tag carrying the provisioner that launched an instance
pub const PROVISIONER_NAME_LABEL_KEY: &str = "karpenter.sh/provisioner-name";

/// Tag marking an instance as launched for a Machine; value is the cluster name
pub const MANAGED_BY_LABEL_KEY: &str = "karpenter.sh/managed-by";

/// Annotation set on a Machine that is claiming an existing instance
pub const MACHINE_LINKED_ANNOTATION_KEY: &str = "karpenter.sh/linked";

/// Prefix of the cluster ownership tag, `kubernetes.io/cluster/<name>`
pub const CLUSTER_TAG_PREFIX: &str = "kubernetes.io/cluster/";

/// Value of the cluster ownership tag
pub const CLUSTER_TAG_OWNED: &str = "owned";

/// Ownership tag key for a cluster
pub fn cluster_tag_key(cluster_name: &str) -> String {
    format!("{}{}", CLUSTER_TAG_PREFIX, cluster_name)
}
