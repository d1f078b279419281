//! Recording implementation of every collaborator
//!
//! Nothing is provisioned: each declaration is stored with its properties
//! and dependencies, names and ARNs are derived from the logical id, and the
//! result can be rendered in dependency order. Used by the CLI to synthesize
//! a plan and by tests to assert on what a construct declared.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use karpenter_common::{Error, Result};

use super::{
    ChartInstaller, ClusterContext, IdentityProvisioner, InstanceProfileRef, InstanceProfileSpec,
    InterruptionMessaging, ManagedPolicyRef, ManifestDeclaration, OutputSink, QueueRef,
    ResourceRef, RoleMapping, RoleRef, SubnetTagger,
};
use crate::chart::HelmChart;
use crate::graph::DependencyGraph;
use crate::iam::{ManagedPolicy, PolicyDocument, RoleSpec};
use crate::interruption::{EventRuleSpec, QueueSpec};
use crate::subnets::SubnetTagRequest;

/// Account id used when none is configured
pub const DEFAULT_ACCOUNT_ID: &str = "000000000000";

/// Region used when none is configured
pub const DEFAULT_REGION: &str = "us-east-1";

fn default_account_id() -> String {
    DEFAULT_ACCOUNT_ID.to_string()
}

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

/// Facts about the existing cluster the engine answers with
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSettings {
    /// EKS cluster name
    pub name: String,
    /// API server endpoint
    pub endpoint: String,
    /// OIDC issuer, with or without `https://`
    pub oidc_issuer: String,
    /// OIDC provider ARN; derived from account and issuer when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oidc_provider_arn: Option<String>,
    /// AWS account id used in ARNs
    #[serde(default = "default_account_id")]
    pub account_id: String,
    /// AWS region used in ARNs
    #[serde(default = "default_region")]
    pub region: String,
}

impl ClusterSettings {
    /// Settings with the default account and region
    pub fn new(
        name: impl Into<String>,
        endpoint: impl Into<String>,
        oidc_issuer: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            endpoint: endpoint.into(),
            oidc_issuer: oidc_issuer.into(),
            oidc_provider_arn: None,
            account_id: default_account_id(),
            region: default_region(),
        }
    }

    fn issuer_host(&self) -> &str {
        self.oidc_issuer
            .strip_prefix("https://")
            .unwrap_or(&self.oidc_issuer)
    }
}

/// Kind of a recorded declaration
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ResourceKind {
    /// Kubernetes manifest applied to the cluster
    #[serde(rename = "Kubernetes::Manifest")]
    Manifest,
    /// aws-auth role mapping
    #[serde(rename = "Kubernetes::AwsAuthMapping")]
    RoleMapping,
    /// Helm release
    #[serde(rename = "Kubernetes::HelmChart")]
    HelmChart,
    /// Customer managed IAM policy
    #[serde(rename = "AWS::IAM::ManagedPolicy")]
    ManagedPolicy,
    /// IAM role
    #[serde(rename = "AWS::IAM::Role")]
    Role,
    /// IAM instance profile
    #[serde(rename = "AWS::IAM::InstanceProfile")]
    InstanceProfile,
    /// Subnet discovery tagging
    #[serde(rename = "Custom::SubnetTags")]
    SubnetTags,
    /// SQS queue
    #[serde(rename = "AWS::SQS::Queue")]
    Queue,
    /// EventBridge rule
    #[serde(rename = "AWS::Events::Rule")]
    EventRule,
}

impl ResourceKind {
    fn context(self) -> &'static str {
        match self {
            Self::Manifest | Self::RoleMapping => "cluster",
            Self::HelmChart => "chart",
            Self::ManagedPolicy | Self::Role | Self::InstanceProfile => "identity",
            Self::SubnetTags => "subnets",
            Self::Queue | Self::EventRule => "messaging",
        }
    }
}

/// One recorded declaration
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeclaredResource {
    /// Logical id
    pub id: ResourceRef,
    /// What was declared
    pub kind: ResourceKind,
    /// Declared properties
    pub properties: serde_json::Value,
    /// Resources that must exist first
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<ResourceRef>,
}

/// In-memory [`InfrastructureEngine`](super::InfrastructureEngine)
///
/// Single-threaded: declarations go through `&self` and are recorded behind
/// `RefCell`s. Declaring an id twice is an engine error.
#[derive(Debug)]
pub struct InMemoryEngine {
    settings: ClusterSettings,
    resources: RefCell<Vec<DeclaredResource>>,
    outputs: RefCell<BTreeMap<String, String>>,
    rejected: BTreeSet<String>,
}

impl InMemoryEngine {
    /// Engine answering for the given cluster
    pub fn new(settings: ClusterSettings) -> Self {
        Self {
            settings,
            resources: RefCell::new(Vec::new()),
            outputs: RefCell::new(BTreeMap::new()),
            rejected: BTreeSet::new(),
        }
    }

    /// Make every declaration under `id` fail with an engine error
    pub fn reject(mut self, id: impl Into<String>) -> Self {
        self.rejected.insert(id.into());
        self
    }

    /// Cluster the engine answers for
    pub fn settings(&self) -> &ClusterSettings {
        &self.settings
    }

    /// Declarations in the order they were made
    pub fn resources(&self) -> Vec<DeclaredResource> {
        self.resources.borrow().clone()
    }

    /// Look up a declaration by id
    pub fn get(&self, id: &str) -> Option<DeclaredResource> {
        self.resources
            .borrow()
            .iter()
            .find(|r| r.id.id() == id)
            .cloned()
    }

    /// Declarations of one kind, in declaration order
    pub fn of_kind(&self, kind: ResourceKind) -> Vec<DeclaredResource> {
        self.resources
            .borrow()
            .iter()
            .filter(|r| r.kind == kind)
            .cloned()
            .collect()
    }

    /// Outputs by name
    pub fn outputs(&self) -> BTreeMap<String, String> {
        self.outputs.borrow().clone()
    }

    /// Dependency graph over every declaration
    pub fn graph(&self) -> DependencyGraph {
        let mut graph = DependencyGraph::new();
        for resource in self.resources.borrow().iter() {
            graph.add_node(&resource.id);
            for dependency in &resource.depends_on {
                graph.add_edge(&resource.id, dependency);
            }
        }
        graph
    }

    /// Declarations ordered so dependencies come first
    pub fn rendered(&self) -> Result<Vec<DeclaredResource>> {
        let order = self.graph().topological_order()?;
        let resources = self.resources.borrow();
        Ok(order
            .iter()
            .filter_map(|id| resources.iter().find(|r| &r.id == id).cloned())
            .collect())
    }

    fn record(
        &self,
        id: &str,
        kind: ResourceKind,
        properties: serde_json::Value,
        depends_on: Vec<ResourceRef>,
    ) -> Result<ResourceRef> {
        let mut resources = self.resources.borrow_mut();
        self.check(id, kind, &resources)?;
        Ok(push(
            &mut resources,
            DeclaredResource {
                id: ResourceRef::new(id),
                kind,
                properties,
                depends_on,
            },
        ))
    }

    fn check(&self, id: &str, kind: ResourceKind, declared: &[DeclaredResource]) -> Result<()> {
        if self.rejected.contains(id) {
            return Err(Error::engine_with_context(
                kind.context(),
                format!("declaration of {id} was rejected"),
            ));
        }
        if declared.iter().any(|r| r.id.id() == id) {
            return Err(Error::engine_with_context(
                kind.context(),
                format!("resource {id} is already declared"),
            ));
        }
        Ok(())
    }

    fn physical_name(&self, id: &str) -> String {
        format!("{}-{id}", self.settings.name)
    }

    fn iam_arn(&self, kind: &str, name: &str) -> String {
        format!("arn:aws:iam::{}:{kind}/{name}", self.settings.account_id)
    }
}

fn push(resources: &mut Vec<DeclaredResource>, resource: DeclaredResource) -> ResourceRef {
    debug!(resource = %resource.id, kind = ?resource.kind, "declared resource");
    let reference = resource.id.clone();
    resources.push(resource);
    reference
}

impl ClusterContext for InMemoryEngine {
    fn cluster_name(&self) -> String {
        self.settings.name.clone()
    }

    fn cluster_endpoint(&self) -> String {
        self.settings.endpoint.clone()
    }

    fn oidc_issuer(&self) -> String {
        self.settings.issuer_host().to_string()
    }

    fn oidc_provider_arn(&self) -> String {
        self.settings
            .oidc_provider_arn
            .clone()
            .unwrap_or_else(|| self.iam_arn("oidc-provider", self.settings.issuer_host()))
    }

    fn add_manifest(
        &self,
        id: &str,
        document: &serde_json::Value,
        depends_on: &[ResourceRef],
    ) -> Result<ResourceRef> {
        self.record(
            id,
            ResourceKind::Manifest,
            document.clone(),
            depends_on.to_vec(),
        )
    }

    fn add_manifests(&self, manifests: &[ManifestDeclaration]) -> Result<Vec<ResourceRef>> {
        let mut resources = self.resources.borrow_mut();
        for (index, manifest) in manifests.iter().enumerate() {
            self.check(&manifest.id, ResourceKind::Manifest, &resources)?;
            if manifests[..index].iter().any(|m| m.id == manifest.id) {
                return Err(Error::engine_with_context(
                    ResourceKind::Manifest.context(),
                    format!("resource {} is declared twice in one batch", manifest.id),
                ));
            }
        }

        Ok(manifests
            .iter()
            .map(|m| {
                push(
                    &mut resources,
                    DeclaredResource {
                        id: ResourceRef::new(&m.id),
                        kind: ResourceKind::Manifest,
                        properties: m.document.clone(),
                        depends_on: m.depends_on.clone(),
                    },
                )
            })
            .collect())
    }

    fn map_role(&self, role: &RoleRef, mapping: &RoleMapping) -> Result<()> {
        self.record(
            &format!("{}AwsAuth", role.resource),
            ResourceKind::RoleMapping,
            json!({
                "rolearn": role.arn,
                "username": mapping.username,
                "groups": mapping.groups,
            }),
            vec![role.resource.clone()],
        )?;
        Ok(())
    }
}

impl IdentityProvisioner for InMemoryEngine {
    fn create_managed_policy(
        &self,
        id: &str,
        document: &PolicyDocument,
    ) -> Result<ManagedPolicyRef> {
        let name = self.physical_name(id);
        let resource = self.record(
            id,
            ResourceKind::ManagedPolicy,
            json!({ "managedPolicyName": name, "policyDocument": document }),
            Vec::new(),
        )?;
        Ok(ManagedPolicyRef {
            resource,
            arn: self.iam_arn("policy", &name),
            name,
        })
    }

    fn create_role(&self, id: &str, spec: &RoleSpec) -> Result<RoleRef> {
        let name = self.physical_name(id);
        let depends_on = spec
            .managed_policies
            .iter()
            .filter_map(|p| match p {
                ManagedPolicy::Customer(policy) => Some(policy.resource.clone()),
                ManagedPolicy::Aws(_) => None,
            })
            .collect();
        let managed_policy_arns: Vec<String> =
            spec.managed_policies.iter().map(ManagedPolicy::arn).collect();

        let resource = self.record(
            id,
            ResourceKind::Role,
            json!({
                "roleName": name,
                "description": spec.description,
                "assumeRolePolicyDocument": spec.trust_policy,
                "managedPolicyArns": managed_policy_arns,
            }),
            depends_on,
        )?;
        Ok(RoleRef {
            resource,
            arn: self.iam_arn("role", &name),
            name,
        })
    }

    fn create_instance_profile(
        &self,
        id: &str,
        spec: &InstanceProfileSpec,
        role: &RoleRef,
    ) -> Result<InstanceProfileRef> {
        let resource = self.record(
            id,
            ResourceKind::InstanceProfile,
            serde_json::to_value(spec)?,
            vec![role.resource.clone()],
        )?;
        Ok(InstanceProfileRef {
            resource,
            name: spec.name.clone(),
            arn: self.iam_arn("instance-profile", &spec.name),
        })
    }
}

impl SubnetTagger for InMemoryEngine {
    fn tag_subnets(&self, id: &str, request: &SubnetTagRequest) -> Result<ResourceRef> {
        self.record(
            id,
            ResourceKind::SubnetTags,
            serde_json::to_value(request)?,
            Vec::new(),
        )
    }
}

impl ChartInstaller for InMemoryEngine {
    fn install_chart(
        &self,
        id: &str,
        chart: &HelmChart,
        depends_on: &[ResourceRef],
    ) -> Result<ResourceRef> {
        self.record(
            id,
            ResourceKind::HelmChart,
            serde_json::to_value(chart)?,
            depends_on.to_vec(),
        )
    }
}

impl InterruptionMessaging for InMemoryEngine {
    fn create_queue(&self, id: &str, spec: &QueueSpec) -> Result<QueueRef> {
        let resource = self.record(
            id,
            ResourceKind::Queue,
            json!({
                "queueName": spec.name,
                "messageRetentionPeriod": spec.retention.as_secs(),
                "queuePolicy": spec.policy,
            }),
            Vec::new(),
        )?;
        Ok(QueueRef {
            resource,
            name: spec.name.clone(),
            arn: format!(
                "arn:aws:sqs:{}:{}:{}",
                self.settings.region, self.settings.account_id, spec.name
            ),
        })
    }

    fn create_event_rule(
        &self,
        id: &str,
        spec: &EventRuleSpec,
        target: &QueueRef,
    ) -> Result<ResourceRef> {
        self.record(
            id,
            ResourceKind::EventRule,
            json!({
                "eventPattern": spec.pattern,
                "targets": [{ "arn": target.arn }],
            }),
            vec![target.resource.clone()],
        )
    }
}

impl OutputSink for InMemoryEngine {
    fn add_output(&self, name: &str, value: &str) -> Result<()> {
        let mut outputs = self.outputs.borrow_mut();
        if outputs.contains_key(name) {
            return Err(Error::engine_with_context(
                "outputs",
                format!("output {name} is already declared"),
            ));
        }
        outputs.insert(name.to_string(), value.to_string());
        Ok(())
    }
}
