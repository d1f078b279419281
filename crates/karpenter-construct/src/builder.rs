//! Provisioning-policy builder
//!
//! Pure transformation from [`ProvisionerProps`] to the Provisioner (and,
//! when the controller release models them, AWSNodeTemplate) documents.
//! Nothing here touches the engine; the same props and context always yield
//! the same documents.
//!
//! Requirement order is fixed: capacity type, architecture, zone, then the
//! optional instance-type allow and deny lists.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use karpenter_common::crd::{
    validate_resource_name, ArchType, AwsNodeTemplate, CapacityType, Consolidation, InstanceType,
    Limits, ProviderFields, ProviderProps, ProviderRef, Provisioner, ProvisionerLimits,
    ProvisionerProps, ProvisionerSpec, Requirement, Requirements, ResourceLimits,
    MAX_RESOURCE_NAME_LEN,
};
use karpenter_common::{Error, Result, CLUSTER_NAME_LABEL};

use crate::constants::{
    security_group_discovery_tag, subnet_discovery_tag, ARCH_KEY, CAPACITY_TYPE_KEY,
    INSTANCE_TYPE_KEY, ZONE_KEY,
};
use crate::manifest::PolicyDocuments;
use crate::version::ControllerVersion;

/// Suffix appended to a provisioner name to name its node template
pub const NODE_TEMPLATE_SUFFIX: &str = "-node-template";

/// Facts fixed for every provisioner of one construct
#[derive(Clone, Debug)]
pub struct BuilderContext {
    /// EKS cluster name (discovery selectors, `cluster-name` label)
    pub cluster_name: String,
    /// Zones nodes may launch in
    pub availability_zones: Vec<String>,
    /// Instance profile nodes launch with
    pub instance_profile: String,
    /// Tags applied to every launched instance
    pub global_tags: BTreeMap<String, String>,
    /// Controller release the documents target
    pub version: ControllerVersion,
}

/// Scale-down timers as they appear on the Provisioner
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Timers {
    /// `consolidation.enabled`
    pub consolidation: Option<Consolidation>,
    /// `ttlSecondsAfterEmpty`
    pub ttl_seconds_after_empty: Option<u64>,
    /// `ttlSecondsUntilExpired`
    pub ttl_seconds_until_expired: Option<u64>,
}

/// Builds provisioner documents against a fixed [`BuilderContext`]
#[derive(Clone, Debug)]
pub struct PolicyBuilder {
    ctx: BuilderContext,
}

impl PolicyBuilder {
    /// Create a builder for the given context
    pub fn new(ctx: BuilderContext) -> Self {
        Self { ctx }
    }

    /// The context documents are built against
    pub fn context(&self) -> &BuilderContext {
        &self.ctx
    }

    /// Build every document for one provisioner
    ///
    /// Fails before producing anything if the name is malformed, the timers
    /// conflict, or a requested feature is missing from the target release.
    pub fn build(&self, props: &ProvisionerProps) -> Result<PolicyDocuments> {
        let name = validate_resource_name(&props.name)?;
        if self.ctx.version.uses_node_template() {
            let max = MAX_RESOURCE_NAME_LEN - NODE_TEMPLATE_SUFFIX.len();
            if name.len() > max {
                return Err(Error::validation_for_field(
                    &name,
                    "name",
                    format!("name must be at most {max} characters to fit the node template suffix"),
                ));
            }
        }
        let timers = self.render_timers(props)?;

        let requirements = self.build_requirements_for(&name, &props.requirements);
        let provider = self.render_provider_fields(props.provider.as_ref());

        let mut spec = ProvisionerSpec {
            requirements,
            limits: render_limits(props.limits.as_ref()),
            labels: self.labels(props.labels.as_ref()),
            taints: props.taints.clone(),
            startup_taints: props.startup_taints.clone(),
            consolidation: timers.consolidation,
            ttl_seconds_after_empty: timers.ttl_seconds_after_empty,
            ttl_seconds_until_expired: timers.ttl_seconds_until_expired,
            provider: None,
            provider_ref: None,
        };

        let node_template = if self.ctx.version.uses_node_template() {
            let template_name = format!("{name}{NODE_TEMPLATE_SUFFIX}");
            spec.provider_ref = Some(ProviderRef {
                name: template_name.clone(),
            });
            Some(AwsNodeTemplate::new(&template_name, provider))
        } else {
            spec.provider = Some(provider);
            None
        };

        debug!(
            policy = %name,
            version = %self.ctx.version,
            requirements = spec.requirements.len(),
            node_template = node_template.is_some(),
            "built provisioner documents"
        );

        Ok(PolicyDocuments {
            provisioner: Provisioner::new(&name, spec),
            node_template,
        })
    }

    /// Requirement constraints in their fixed order
    pub fn build_requirements(&self, reqs: &Requirements) -> Vec<Requirement> {
        let mut requirements = vec![
            Requirement::is_in(
                CAPACITY_TYPE_KEY,
                values_or(reqs.capacity_types.as_deref(), CapacityType::Spot),
            ),
            Requirement::is_in(
                ARCH_KEY,
                values_or(reqs.arch_types.as_deref(), ArchType::Amd64),
            ),
            Requirement::is_in(ZONE_KEY, self.ctx.availability_zones.clone()),
        ];

        if let Some(types) = &reqs.instance_types {
            requirements.push(Requirement::is_in(INSTANCE_TYPE_KEY, instance_type_values(types)));
        }
        if let Some(types) = &reqs.excluded_instance_types {
            requirements.push(Requirement::not_in(
                INSTANCE_TYPE_KEY,
                instance_type_values(types),
            ));
        }

        requirements
    }

    fn build_requirements_for(&self, policy: &str, reqs: &Requirements) -> Vec<Requirement> {
        if let (Some(allowed), Some(excluded)) =
            (&reqs.instance_types, &reqs.excluded_instance_types)
        {
            let overlap: Vec<&str> = allowed
                .iter()
                .filter(|t| excluded.contains(*t))
                .map(InstanceType::as_str)
                .collect();
            if !overlap.is_empty() {
                warn!(
                    policy = %policy,
                    overlap = ?overlap,
                    "instance types are both allowed and excluded; the exclusion wins at launch"
                );
            }
        }
        self.build_requirements(reqs)
    }

    /// Scale-down timers, checking the consolidation rules
    pub fn render_timers(&self, props: &ProvisionerProps) -> Result<Timers> {
        if let Some(enabled) = props.consolidation {
            if props.idle_timeout.is_some() {
                return Err(Error::configuration_for(
                    &props.name,
                    "consolidation cannot be combined with ttlSecondsAfterEmpty",
                ));
            }
            if !self.ctx.version.supports_consolidation() {
                return Err(Error::configuration_for(
                    &props.name,
                    format!(
                        "consolidation requires controller 0.15.0 or later, targeting {}",
                        self.ctx.version
                    ),
                ));
            }
            return Ok(Timers {
                consolidation: Some(Consolidation { enabled }),
                ttl_seconds_after_empty: None,
                ttl_seconds_until_expired: props.expiry.map(|d| d.as_secs()),
            });
        }

        Ok(Timers {
            consolidation: None,
            ttl_seconds_after_empty: props.idle_timeout.map(|d| d.as_secs()),
            ttl_seconds_until_expired: props.expiry.map(|d| d.as_secs()),
        })
    }

    /// Cloud launch parameters: discovery selectors and instance profile
    /// always, caller fields only when set
    pub fn render_provider_fields(&self, provider: Option<&ProviderProps>) -> ProviderFields {
        let cluster = &self.ctx.cluster_name;
        let mut tags = self.ctx.global_tags.clone();
        if let Some(own) = provider.and_then(|p| p.tags.as_ref()) {
            tags.extend(own.iter().map(|(k, v)| (k.clone(), v.clone())));
        }

        ProviderFields {
            subnet_selector: BTreeMap::from([(subnet_discovery_tag(cluster), "*".to_string())]),
            security_group_selector: BTreeMap::from([(
                security_group_discovery_tag(cluster),
                "owned".to_string(),
            )]),
            instance_profile: self.ctx.instance_profile.clone(),
            ami_family: provider.and_then(|p| p.ami_family),
            ami_selector: provider.and_then(|p| p.ami_selector.clone()),
            tags: (!tags.is_empty()).then_some(tags),
            block_device_mappings: provider.and_then(|p| p.block_device_mappings.clone()),
        }
    }

    /// `cluster-name` label merged with caller labels; caller keys win
    pub fn labels(&self, extra: Option<&BTreeMap<String, String>>) -> BTreeMap<String, String> {
        let mut labels =
            BTreeMap::from([(CLUSTER_NAME_LABEL.to_string(), self.ctx.cluster_name.clone())]);
        if let Some(extra) = extra {
            labels.extend(extra.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        labels
    }
}

/// Resource limits with only the keys the caller supplied
pub fn render_limits(limits: Option<&Limits>) -> Option<ProvisionerLimits> {
    limits.map(|l| ProvisionerLimits {
        resources: ResourceLimits {
            cpu: l.cpu.clone(),
            memory: l.mem.clone(),
        },
    })
}

fn values_or<T: ToString>(values: Option<&[T]>, default: T) -> Vec<String> {
    match values {
        Some(values) => values.iter().map(ToString::to_string).collect(),
        None => vec![default.to_string()],
    }
}

fn instance_type_values(types: &[InstanceType]) -> Vec<String> {
    types.iter().map(|t| t.as_str().to_string()).collect()
}
