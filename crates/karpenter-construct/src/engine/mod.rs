//! Collaborator abstraction layer
//!
//! The construct never talks to AWS or the cluster itself. It declares
//! resources through these traits and receives opaque references back; the
//! infrastructure engine behind them decides how and when the declarations
//! are realized.
//!
//! [`InfrastructureEngine`] bundles every collaborator so the construct can
//! take a single handle. [`memory::InMemoryEngine`] is a recording
//! implementation used for synthesis and tests.

pub mod memory;

#[cfg(test)]
use mockall::automock;
use serde::Serialize;

use crate::chart::HelmChart;
use crate::iam::{PolicyDocument, RoleSpec};
use crate::interruption::{EventRuleSpec, QueueSpec};
use crate::subnets::SubnetTagRequest;
use karpenter_common::Result;

/// Opaque handle to a declared resource, usable as a dependency
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ResourceRef(String);

impl ResourceRef {
    /// Wrap a logical resource id
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The logical id
    pub fn id(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// An IAM role declared by the identity collaborator
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoleRef {
    /// Declared resource
    pub resource: ResourceRef,
    /// Role name
    pub name: String,
    /// Role ARN
    pub arn: String,
}

/// A customer managed policy declared by the identity collaborator
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ManagedPolicyRef {
    /// Declared resource
    pub resource: ResourceRef,
    /// Policy name
    pub name: String,
    /// Policy ARN
    pub arn: String,
}

/// An instance profile declared by the identity collaborator
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InstanceProfileRef {
    /// Declared resource
    pub resource: ResourceRef,
    /// Instance profile name
    pub name: String,
    /// Instance profile ARN
    pub arn: String,
}

/// A message queue declared by the messaging collaborator
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueueRef {
    /// Declared resource
    pub resource: ResourceRef,
    /// Queue name
    pub name: String,
    /// Queue ARN
    pub arn: String,
}

/// Instance profile to create around a role
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceProfileSpec {
    /// Instance profile name
    pub name: String,
    /// IAM path
    pub path: String,
    /// Role wrapped by the profile
    pub role_name: String,
}

/// One manifest in an all-or-nothing batch
///
/// An entry may depend on an earlier entry of the same batch through
/// `ResourceRef::new(<earlier id>)`.
#[derive(Clone, Debug, PartialEq)]
pub struct ManifestDeclaration {
    /// Logical id
    pub id: String,
    /// Document to apply
    pub document: serde_json::Value,
    /// Resources that must exist first
    pub depends_on: Vec<ResourceRef>,
}

/// aws-auth mapping for a role
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RoleMapping {
    /// Kubernetes username
    pub username: String,
    /// Kubernetes groups
    pub groups: Vec<String>,
}

/// Cluster handle: identity, OIDC, and manifest registration
#[cfg_attr(test, automock)]
pub trait ClusterContext {
    /// EKS cluster name
    fn cluster_name(&self) -> String;

    /// API server endpoint
    fn cluster_endpoint(&self) -> String;

    /// OIDC issuer without scheme (e.g. "oidc.eks.us-west-2.amazonaws.com/id/ABC")
    fn oidc_issuer(&self) -> String;

    /// ARN of the cluster's IAM OIDC provider
    fn oidc_provider_arn(&self) -> String;

    /// Register a manifest to be applied after `depends_on`
    fn add_manifest(
        &self,
        id: &str,
        document: &serde_json::Value,
        depends_on: &[ResourceRef],
    ) -> Result<ResourceRef>;

    /// Register several manifests at once
    ///
    /// Either every manifest is registered, returning references in input
    /// order, or none is and the first error is returned.
    fn add_manifests(&self, manifests: &[ManifestDeclaration]) -> Result<Vec<ResourceRef>>;

    /// Map an IAM role into the cluster's aws-auth config
    fn map_role(&self, role: &RoleRef, mapping: &RoleMapping) -> Result<()>;
}

/// IAM declarations
#[cfg_attr(test, automock)]
pub trait IdentityProvisioner {
    /// Declare a customer managed policy
    fn create_managed_policy(&self, id: &str, document: &PolicyDocument)
        -> Result<ManagedPolicyRef>;

    /// Declare a role with its trust policy and attached policies
    fn create_role(&self, id: &str, spec: &RoleSpec) -> Result<RoleRef>;

    /// Declare an instance profile around a role
    fn create_instance_profile(
        &self,
        id: &str,
        spec: &InstanceProfileSpec,
        role: &RoleRef,
    ) -> Result<InstanceProfileRef>;
}

/// Subnet tagging side effect
#[cfg_attr(test, automock)]
pub trait SubnetTagger {
    /// Declare that `request.subnets` carry `request.cluster_tag`
    fn tag_subnets(&self, id: &str, request: &SubnetTagRequest) -> Result<ResourceRef>;
}

/// Helm release installation
#[cfg_attr(test, automock)]
pub trait ChartInstaller {
    /// Declare a chart release; the returned reference completes when the release is ready
    fn install_chart(
        &self,
        id: &str,
        chart: &HelmChart,
        depends_on: &[ResourceRef],
    ) -> Result<ResourceRef>;
}

/// Interruption queue and event routing
#[cfg_attr(test, automock)]
pub trait InterruptionMessaging {
    /// Declare a queue
    fn create_queue(&self, id: &str, spec: &QueueSpec) -> Result<QueueRef>;

    /// Declare an event rule delivering to `target`
    fn create_event_rule(
        &self,
        id: &str,
        spec: &EventRuleSpec,
        target: &QueueRef,
    ) -> Result<ResourceRef>;
}

/// Named output values
#[cfg_attr(test, automock)]
pub trait OutputSink {
    /// Declare an output
    fn add_output(&self, name: &str, value: &str) -> Result<()>;
}

/// Every collaborator the construct needs
pub trait InfrastructureEngine:
    ClusterContext + IdentityProvisioner + SubnetTagger + ChartInstaller + InterruptionMessaging + OutputSink
{
}

impl<T> InfrastructureEngine for T where
    T: ClusterContext
        + IdentityProvisioner
        + SubnetTagger
        + ChartInstaller
        + InterruptionMessaging
        + OutputSink
{
}
