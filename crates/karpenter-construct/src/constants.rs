//! Centralized constants for the karpenter-construct crate
//!
//! Label keys, discovery tag formats, chart coordinates and IAM names shared
//! by the builder, the construct and the in-memory engine.

use std::time::Duration;

// =============================================================================
// Well-known requirement keys
// =============================================================================

/// Capacity type label (spot / on-demand)
pub const CAPACITY_TYPE_KEY: &str = "karpenter.sh/capacity-type";

/// Architecture label
pub const ARCH_KEY: &str = "kubernetes.io/arch";

/// Availability zone label
pub const ZONE_KEY: &str = "topology.kubernetes.io/zone";

/// Instance type label
pub const INSTANCE_TYPE_KEY: &str = "node.kubernetes.io/instance-type";

// =============================================================================
// Discovery
// =============================================================================

/// Tag key prefix marking subnets Karpenter may launch into
pub const SUBNET_DISCOVERY_TAG_PREFIX: &str = "karpenter.sh/discovery/";

/// Tag key prefix EKS puts on cluster-owned security groups
pub const SECURITY_GROUP_TAG_PREFIX: &str = "kubernetes.io/cluster/";

/// Subnet discovery tag for a cluster
pub fn subnet_discovery_tag(cluster_name: &str) -> String {
    format!("{SUBNET_DISCOVERY_TAG_PREFIX}{cluster_name}")
}

/// Security group discovery tag for a cluster
pub fn security_group_discovery_tag(cluster_name: &str) -> String {
    format!("{SECURITY_GROUP_TAG_PREFIX}{cluster_name}")
}

// =============================================================================
// Helm chart
// =============================================================================

/// Chart and release name
pub const CHART_NAME: &str = "karpenter";

/// Chart repository used before the move to OCI
pub const LEGACY_CHART_REPOSITORY: &str = "https://charts.karpenter.sh";

/// OCI chart repository
pub const OCI_CHART_REPOSITORY: &str = "oci://public.ecr.aws/karpenter/karpenter";

/// How long the installer waits for the release to become ready
pub const CHART_TIMEOUT: Duration = Duration::from_secs(15 * 60);

/// Service account annotation binding the controller to its IAM role
pub const ROLE_ARN_ANNOTATION: &str = "eks.amazonaws.com/role-arn";

// =============================================================================
// IAM
// =============================================================================

/// Instance profile name prefix (suffixed with the cluster name)
pub const INSTANCE_PROFILE_PREFIX: &str = "KarpenterNodeInstanceProfile-";

/// Principal nodes assume their role through
pub const EC2_SERVICE_PRINCIPAL: &str = "ec2.amazonaws.com";

/// Audience of the controller's web identity token
pub const STS_AUDIENCE: &str = "sts.amazonaws.com";

/// AWS managed policies attached to the node role
pub const NODE_MANAGED_POLICIES: &[&str] = &[
    "AmazonEKS_CNI_Policy",
    "AmazonEKSWorkerNodePolicy",
    "AmazonEC2ContainerRegistryReadOnly",
    "AmazonSSMManagedInstanceCore",
];

/// Groups the node role is mapped into via aws-auth
pub const NODE_ROLE_GROUPS: &[&str] = &["system:bootstrappers", "system:nodes"];

/// Username template the node role is mapped to via aws-auth
pub const NODE_ROLE_USERNAME: &str = "system:node:{{EC2PrivateDNSName}}";

// =============================================================================
// Interruption handling
// =============================================================================

/// How long interruption messages are kept in the queue
pub const QUEUE_RETENTION: Duration = Duration::from_secs(300);

/// Principals allowed to deliver messages to the interruption queue
pub const QUEUE_SENDER_PRINCIPALS: &[&str] = &["events.amazonaws.com", "sqs.amazonaws.com"];
