//! Caller-supplied description of one provisioner
//!
//! Props are deserialized from YAML by the CLI and built in code by library
//! users. Every optional field keeps its absence: an unset timer means
//! "disabled", never zero.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{AmiFamily, ArchType, BlockDeviceMapping, CapacityType, InstanceType, Taint};

/// Everything a caller can configure on one provisioner
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionerProps {
    /// Provisioner name (RFC 1123 subdomain)
    pub name: String,

    /// Instance selection constraints
    #[serde(default)]
    pub requirements: Requirements,

    /// Node lifetime; nodes never expire when unset
    #[serde(
        default,
        rename = "ttlSecondsUntilExpired",
        with = "optional_seconds",
        skip_serializing_if = "Option::is_none"
    )]
    pub expiry: Option<Duration>,

    /// Empty-node timeout; idle scale-down is disabled when unset
    #[serde(
        default,
        rename = "ttlSecondsAfterEmpty",
        with = "optional_seconds",
        skip_serializing_if = "Option::is_none"
    )]
    pub idle_timeout: Option<Duration>,

    /// Consolidation flag (cannot be combined with `idle_timeout`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consolidation: Option<bool>,

    /// Aggregate resource ceiling
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limits: Option<Limits>,

    /// Extra node labels
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<BTreeMap<String, String>>,

    /// Node taints
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub taints: Option<Vec<Taint>>,

    /// Startup taints
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub startup_taints: Option<Vec<Taint>>,

    /// AWS launch parameters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<ProviderProps>,
}

impl ProvisionerProps {
    /// Props with only a name; every other option takes its default
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// Instance selection constraints
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Requirements {
    /// Allowed architectures (default: amd64)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arch_types: Option<Vec<ArchType>>,

    /// Allowed capacity types (default: spot)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity_types: Option<Vec<CapacityType>>,

    /// Allowed instance types
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_types: Option<Vec<InstanceType>>,

    /// Excluded instance types
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excluded_instance_types: Option<Vec<InstanceType>>,
}

/// Aggregate resource ceiling
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct Limits {
    /// CPU quantity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<String>,
    /// Memory quantity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mem: Option<String>,
}

/// AWS launch parameters for one provisioner
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProviderProps {
    /// AMI family
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ami_family: Option<AmiFamily>,

    /// AMI tag selector
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ami_selector: Option<BTreeMap<String, String>>,

    /// Instance tags; keys here override the construct-wide tags
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<BTreeMap<String, String>>,

    /// EBS volumes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_device_mappings: Option<Vec<BlockDeviceMapping>>,
}

/// Serde adapter for `Option<Duration>` as whole seconds
mod optional_seconds {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_u64(d.as_secs()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(d)?.map(Duration::from_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::TaintEffect;

    #[test]
    fn full_props_from_yaml() {
        let yaml = r#"
name: custom
requirements:
  archTypes: [amd64, arm64]
  instanceTypes: [m5.large, m6g.large]
  excludedInstanceTypes: [g5.large]
ttlSecondsAfterEmpty: 7200
ttlSecondsUntilExpired: 7776000
labels:
  billing: my-team
taints:
  - key: example.com/special-taint
    effect: NoSchedule
limits:
  cpu: "1"
  mem: 1000Gi
provider:
  amiFamily: Bottlerocket
  tags:
    Foo: Bar
"#;
        let props: ProvisionerProps = serde_yaml::from_str(yaml).expect("deserialize");
        assert_eq!(props.name, "custom");
        assert_eq!(props.idle_timeout, Some(Duration::from_secs(7200)));
        assert_eq!(props.expiry, Some(Duration::from_secs(90 * 24 * 3600)));
        assert_eq!(
            props.requirements.arch_types,
            Some(vec![ArchType::Amd64, ArchType::Arm64])
        );
        assert_eq!(
            props.requirements.excluded_instance_types.as_ref().map(Vec::len),
            Some(1)
        );
        let taints = props.taints.expect("taints set");
        assert_eq!(taints[0].effect, TaintEffect::NoSchedule);
        assert_eq!(props.limits.and_then(|l| l.mem).as_deref(), Some("1000Gi"));
        assert_eq!(
            props.provider.and_then(|p| p.ami_family),
            Some(AmiFamily::Bottlerocket)
        );
        assert!(props.consolidation.is_none());
    }

    #[test]
    fn name_only_props_keep_everything_unset() {
        let props: ProvisionerProps = serde_yaml::from_str("name: default").expect("deserialize");
        assert_eq!(props, ProvisionerProps::named("default"));
        assert!(props.expiry.is_none());
        assert!(props.idle_timeout.is_none());
        assert!(props.requirements.capacity_types.is_none());
    }

    #[test]
    fn unknown_enum_values_are_rejected_at_the_boundary() {
        let yaml = r#"
name: bad
requirements:
  capacityTypes: [reserved]
"#;
        assert!(serde_yaml::from_str::<ProvisionerProps>(yaml).is_err());

        let yaml = r#"
name: bad
requirements:
  instanceTypes: [large]
"#;
        assert!(serde_yaml::from_str::<ProvisionerProps>(yaml).is_err());
    }

    #[test]
    fn durations_serialize_as_seconds() {
        let props = ProvisionerProps {
            idle_timeout: Some(Duration::from_secs(30)),
            ..ProvisionerProps::named("default")
        };
        let json = serde_json::to_value(&props).expect("serialize");
        assert_eq!(json["ttlSecondsAfterEmpty"], 30);
        assert!(json.get("ttlSecondsUntilExpired").is_none());
    }
}
