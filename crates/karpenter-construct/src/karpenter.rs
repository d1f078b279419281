//! Karpenter installation on an existing EKS cluster
//!
//! [`Karpenter::new`] declares everything the controller needs before any
//! provisioner exists:
//!
//! 1. discovery tags on the subnets nodes may use
//! 2. the controller's managed policy
//! 3. the node role and its instance profile, mapped into aws-auth
//! 4. the controller role, assumable only by the controller service account
//! 5. on 0.19+, the interruption queue and its event rules
//! 6. the controller Helm release
//! 7. outputs naming the above
//!
//! Provisioners are added afterwards with [`Karpenter::add_provisioner`];
//! their documents wait for the Helm release.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::info;

use karpenter_common::crd::ProvisionerProps;
use karpenter_common::Result;

use crate::builder::{BuilderContext, PolicyBuilder};
use crate::chart::{ChartSettings, HelmChart};
use crate::constants::{
    subnet_discovery_tag, INSTANCE_PROFILE_PREFIX, NODE_ROLE_GROUPS, NODE_ROLE_USERNAME,
};
use crate::engine::{
    InfrastructureEngine, InstanceProfileRef, InstanceProfileSpec, ManagedPolicyRef, QueueRef,
    ResourceRef, RoleMapping, RoleRef,
};
use crate::iam;
use crate::interruption::{interruption_rules, QueueSpec};
use crate::registry::ManifestRegistry;
use crate::subnets::SubnetTagRequest;
use crate::version::ControllerVersion;

/// Logical ids of the resources the construct declares
pub mod ids {
    /// Subnet discovery tagging
    pub const TAG_SUBNETS: &str = "TagSubnets";
    /// Controller managed policy
    pub const CONTROLLER_POLICY: &str = "ControllerPolicy";
    /// Node role
    pub const NODE_ROLE: &str = "NodeRole";
    /// Node instance profile
    pub const INSTANCE_PROFILE: &str = "InstanceProfile";
    /// Controller role
    pub const CONTROLLER_ROLE: &str = "ControllerRole";
    /// Interruption queue
    pub const INTERRUPTION_QUEUE: &str = "InterruptionQueue";
    /// Controller Helm release
    pub const HELM_CHART: &str = "HelmChart";
}

/// Names of the outputs the construct declares
pub mod outputs {
    /// Cluster name
    pub const CLUSTER_NAME: &str = "clusterName";
    /// Controller role name
    pub const CONTROLLER_ROLE: &str = "karpenterControllerRole";
    /// Node role name
    pub const NODE_ROLE: &str = "karpenterNodeRole";
    /// Instance profile name
    pub const INSTANCE_PROFILE: &str = "instanceProfileName";
    /// Controller policy name
    pub const CONTROLLER_POLICY: &str = "karpenterControllerPolicy";
    /// Interruption queue name (0.19+)
    pub const INTERRUPTION_QUEUE: &str = "interruptionQueueName";
}

/// Network facts of the cluster's VPC
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkContext {
    /// Zones nodes may launch in, in order
    pub availability_zones: Vec<String>,
    /// Private subnets, tagged when no explicit subnets are given
    #[serde(default)]
    pub private_subnet_ids: Vec<String>,
}

/// Construct inputs
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KarpenterProps {
    /// Cluster network
    pub network: NetworkContext,
    /// Subnets to tag; defaults to the network's private subnets
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnets: Option<Vec<String>>,
    /// Tags for every instance launched by any provisioner
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
    /// Controller release to install
    #[serde(default)]
    pub version: ControllerVersion,
}

/// Karpenter declared on one cluster
pub struct Karpenter<'a, E: InfrastructureEngine + ?Sized> {
    engine: &'a E,
    version: ControllerVersion,
    subnet_tags: ResourceRef,
    controller_policy: ManagedPolicyRef,
    node_role: RoleRef,
    instance_profile: InstanceProfileRef,
    controller_role: RoleRef,
    interruption_queue: Option<QueueRef>,
    chart: ResourceRef,
    builder: PolicyBuilder,
    registry: ManifestRegistry,
}

impl<'a, E: InfrastructureEngine + ?Sized> Karpenter<'a, E> {
    /// Declare the controller and everything it depends on
    ///
    /// Input is validated before the first declaration, so a bad subnet id
    /// or unsupported version leaves the engine untouched. Engine errors are
    /// returned as-is.
    pub fn new(engine: &'a E, props: KarpenterProps) -> Result<Self> {
        let KarpenterProps {
            network,
            subnets,
            tags,
            version,
        } = props;
        version.ensure_supported()?;

        let cluster = engine.cluster_name();
        let request = SubnetTagRequest::new(
            subnets.unwrap_or(network.private_subnet_ids),
            subnet_discovery_tag(&cluster),
        )?;

        info!(cluster = %cluster, version = %version, "declaring karpenter");

        let subnet_tags = engine.tag_subnets(ids::TAG_SUBNETS, &request)?;

        let controller_policy = engine.create_managed_policy(
            ids::CONTROLLER_POLICY,
            &iam::controller_policy(version, &cluster),
        )?;

        let node_role = engine.create_role(ids::NODE_ROLE, &iam::node_role(&cluster))?;
        let instance_profile = engine.create_instance_profile(
            ids::INSTANCE_PROFILE,
            &InstanceProfileSpec {
                name: format!("{INSTANCE_PROFILE_PREFIX}{cluster}"),
                path: "/".to_string(),
                role_name: node_role.name.clone(),
            },
            &node_role,
        )?;
        engine.map_role(
            &node_role,
            &RoleMapping {
                username: NODE_ROLE_USERNAME.to_string(),
                groups: NODE_ROLE_GROUPS.iter().map(|g| g.to_string()).collect(),
            },
        )?;

        let controller_role = engine.create_role(
            ids::CONTROLLER_ROLE,
            &iam::controller_role(
                &cluster,
                &engine.oidc_issuer(),
                &engine.oidc_provider_arn(),
                &controller_policy,
            ),
        )?;

        let interruption_queue = if version.supports_interruption() {
            let queue =
                engine.create_queue(ids::INTERRUPTION_QUEUE, &QueueSpec::for_cluster(&cluster))?;
            for rule in interruption_rules() {
                engine.create_event_rule(&rule.id, &rule, &queue)?;
            }
            Some(queue)
        } else {
            None
        };

        let endpoint = engine.cluster_endpoint();
        let chart = HelmChart::karpenter(
            version,
            &ChartSettings {
                cluster_name: &cluster,
                cluster_endpoint: &endpoint,
                controller_role_arn: &controller_role.arn,
                instance_profile: &instance_profile.name,
                interruption_queue: interruption_queue.as_ref().map(|q| q.name.as_str()),
            },
        );
        let mut chart_deps = vec![
            controller_role.resource.clone(),
            instance_profile.resource.clone(),
        ];
        chart_deps.extend(interruption_queue.iter().map(|q| q.resource.clone()));
        let chart = engine.install_chart(ids::HELM_CHART, &chart, &chart_deps)?;

        engine.add_output(outputs::CLUSTER_NAME, &cluster)?;
        engine.add_output(outputs::CONTROLLER_ROLE, &controller_role.name)?;
        engine.add_output(outputs::NODE_ROLE, &node_role.name)?;
        engine.add_output(outputs::INSTANCE_PROFILE, &instance_profile.name)?;
        engine.add_output(outputs::CONTROLLER_POLICY, &controller_policy.name)?;
        if let Some(queue) = &interruption_queue {
            engine.add_output(outputs::INTERRUPTION_QUEUE, &queue.name)?;
        }

        let builder = PolicyBuilder::new(BuilderContext {
            cluster_name: cluster,
            availability_zones: network.availability_zones,
            instance_profile: instance_profile.name.clone(),
            global_tags: tags,
            version,
        });
        let registry = ManifestRegistry::new(chart.clone());

        Ok(Self {
            engine,
            version,
            subnet_tags,
            controller_policy,
            node_role,
            instance_profile,
            controller_role,
            interruption_queue,
            chart,
            builder,
            registry,
        })
    }

    /// Build and declare one provisioner
    ///
    /// Returns the declared documents, node template first. On error nothing
    /// is tracked for this provisioner and earlier ones are unaffected.
    pub fn add_provisioner(&mut self, props: &ProvisionerProps) -> Result<Vec<ResourceRef>> {
        let documents = self.builder.build(props)?;
        let name = documents.provisioner_name().to_string();
        self.registry.register(self.engine, &name, &documents)
    }

    /// Controller release being installed
    pub fn version(&self) -> ControllerVersion {
        self.version
    }

    /// Subnet tagging declaration
    pub fn subnet_tags(&self) -> &ResourceRef {
        &self.subnet_tags
    }

    /// Controller managed policy
    pub fn controller_policy(&self) -> &ManagedPolicyRef {
        &self.controller_policy
    }

    /// Role nodes launch with
    pub fn node_role(&self) -> &RoleRef {
        &self.node_role
    }

    /// Instance profile wrapping the node role
    pub fn instance_profile(&self) -> &InstanceProfileRef {
        &self.instance_profile
    }

    /// Role the controller assumes
    pub fn controller_role(&self) -> &RoleRef {
        &self.controller_role
    }

    /// Interruption queue, on releases that use one
    pub fn interruption_queue(&self) -> Option<&QueueRef> {
        self.interruption_queue.as_ref()
    }

    /// Controller Helm release
    pub fn chart(&self) -> &ResourceRef {
        &self.chart
    }

    /// Policy builder bound to this installation
    pub fn builder(&self) -> &PolicyBuilder {
        &self.builder
    }

    /// Registered provisioning policies
    pub fn registry(&self) -> &ManifestRegistry {
        &self.registry
    }
}
