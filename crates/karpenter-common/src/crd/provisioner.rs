//! Provisioner Custom Resource Definition (`karpenter.sh/v1alpha5`)
//!
//! A Provisioner tells Karpenter which nodes it may launch: requirement
//! constraints, resource limits, labels and taints, scale-down timers, and
//! either inline provider fields or a reference to an AWSNodeTemplate.

use std::collections::BTreeMap;

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{ProviderFields, Taint};

/// API version of the Provisioner CRD
pub const PROVISIONER_API_VERSION: &str = "karpenter.sh/v1alpha5";

/// Specification for a Karpenter Provisioner
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "karpenter.sh",
    version = "v1alpha5",
    kind = "Provisioner",
    plural = "provisioners"
)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionerSpec {
    /// Ordered constraints on launched nodes
    pub requirements: Vec<Requirement>,

    /// Ceiling on aggregate resources provisioned
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limits: Option<ProvisionerLimits>,

    /// Labels applied to every node
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    /// Taints applied to every node
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub taints: Option<Vec<Taint>>,

    /// Taints applied at startup and expected to be removed by a daemon
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub startup_taints: Option<Vec<Taint>>,

    /// Consolidation settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consolidation: Option<Consolidation>,

    /// Seconds a node may sit empty before it is removed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl_seconds_after_empty: Option<u64>,

    /// Seconds after launch at which a node expires
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl_seconds_until_expired: Option<u64>,

    /// Inline provider fields (controllers before 0.16)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<ProviderFields>,

    /// Reference to an AWSNodeTemplate (controllers from 0.16)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_ref: Option<ProviderRef>,
}

/// A (key, operator, values) constraint on node attributes
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct Requirement {
    /// Well-known label key (e.g. "kubernetes.io/arch")
    pub key: String,
    /// Set operator
    pub operator: RequirementOperator,
    /// Values the operator applies to
    pub values: Vec<String>,
}

impl Requirement {
    /// Build an `In` requirement
    pub fn is_in(key: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            key: key.into(),
            operator: RequirementOperator::In,
            values,
        }
    }

    /// Build a `NotIn` requirement
    pub fn not_in(key: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            key: key.into(),
            operator: RequirementOperator::NotIn,
            values,
        }
    }
}

/// Requirement set operators
#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum RequirementOperator {
    /// Value must be one of `values`
    In,
    /// Value must not be one of `values`
    NotIn,
}

/// Provisioner resource limits
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct ProvisionerLimits {
    /// Resource ceilings
    pub resources: ResourceLimits,
}

/// Resource ceilings, each emitted only when set
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct ResourceLimits {
    /// CPU quantity (e.g. "1000")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<String>,
    /// Memory quantity (e.g. "1000Gi")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<String>,
}

/// Consolidation settings
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct Consolidation {
    /// Whether consolidation is enabled
    pub enabled: bool,
}

/// Reference to an AWSNodeTemplate by name
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct ProviderRef {
    /// Name of the AWSNodeTemplate
    pub name: String,
}
