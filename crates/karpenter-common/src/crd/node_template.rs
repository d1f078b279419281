//! AWSNodeTemplate Custom Resource Definition
//!
//! Carries the cloud-specific launch parameters a Provisioner refers to by
//! name. Controllers older than 0.16 take the same fields inline under
//! `Provisioner.spec.provider`, so the spec doubles as [`ProviderFields`].
//!
//! Reference: <https://karpenter.sh/v0.27/concepts/node-templates/>

use std::collections::BTreeMap;

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::AmiFamily;

/// API version of the AWSNodeTemplate CRD
pub const NODE_TEMPLATE_API_VERSION: &str = "karpenter.k8s.aws/v1alpha1";

/// Launch parameters for nodes created by a Provisioner
///
/// The discovery selectors and instance profile are always present; every
/// other field is omitted from the document unless set.
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "karpenter.k8s.aws",
    version = "v1alpha1",
    kind = "AWSNodeTemplate",
    root = "AwsNodeTemplate",
    plural = "awsnodetemplates"
)]
#[serde(rename_all = "camelCase")]
pub struct AwsNodeTemplateSpec {
    /// Tag selector used to discover subnets
    pub subnet_selector: BTreeMap<String, String>,

    /// Tag selector used to discover security groups
    pub security_group_selector: BTreeMap<String, String>,

    /// Instance profile attached to launched nodes
    pub instance_profile: String,

    /// AMI family
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ami_family: Option<AmiFamily>,

    /// Tag selector used to discover AMIs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ami_selector: Option<BTreeMap<String, String>>,

    /// Tags applied to launched instances, volumes and launch templates
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<BTreeMap<String, String>>,

    /// EBS volumes attached at launch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_device_mappings: Option<Vec<BlockDeviceMapping>>,
}

/// Provider fields rendered inline into a Provisioner for pre-0.16 controllers
pub type ProviderFields = AwsNodeTemplateSpec;

/// Maps a device name to an EBS volume definition
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BlockDeviceMapping {
    /// Device name (e.g. "/dev/xvda")
    pub device_name: String,
    /// EBS parameters
    pub ebs: BlockDevice,
}

/// EBS volume parameters
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BlockDevice {
    /// Volume size as a Kubernetes quantity (e.g. "100Gi")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_size: Option<String>,

    /// Volume type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_type: Option<VolumeType>,

    /// Provisioned IOPS (io1, io2, gp3)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iops: Option<u32>,

    /// Throughput in MiB/s (gp3)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub throughput: Option<u32>,

    /// Encrypt the volume
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encrypted: Option<bool>,

    /// KMS key used for encryption
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kms_key_id: Option<String>,

    /// Snapshot the volume is created from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_id: Option<String>,

    /// Delete the volume when the instance terminates
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete_on_termination: Option<bool>,
}

/// EBS volume type
#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum VolumeType {
    /// Magnetic
    Standard,
    /// Provisioned IOPS SSD
    Io1,
    /// Provisioned IOPS SSD (io2)
    Io2,
    /// General purpose SSD
    Gp2,
    /// General purpose SSD (gp3)
    Gp3,
    /// Cold HDD
    Sc1,
    /// Throughput optimized HDD
    St1,
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::Resource;

    fn sample_spec() -> AwsNodeTemplateSpec {
        AwsNodeTemplateSpec {
            subnet_selector: BTreeMap::from([(
                "karpenter.sh/discovery/prod".to_string(),
                "*".to_string(),
            )]),
            security_group_selector: BTreeMap::from([(
                "kubernetes.io/cluster/prod".to_string(),
                "owned".to_string(),
            )]),
            instance_profile: "KarpenterNodeInstanceProfile-prod".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn document_carries_group_version_and_kind() {
        let template = AwsNodeTemplate::new("default-node-template", sample_spec());
        let json = serde_json::to_value(&template).expect("serialize");
        assert_eq!(json["apiVersion"], NODE_TEMPLATE_API_VERSION);
        assert_eq!(json["kind"], "AWSNodeTemplate");
        assert_eq!(json["metadata"]["name"], "default-node-template");
        assert_eq!(AwsNodeTemplate::kind(&()), "AWSNodeTemplate");
    }

    #[test]
    fn unset_fields_are_not_emitted() {
        let json = serde_json::to_value(sample_spec()).expect("serialize");
        let keys: Vec<_> = json.as_object().expect("object").keys().cloned().collect();
        assert_eq!(
            keys.len(),
            3,
            "only selectors and instance profile expected, got {keys:?}"
        );
    }

    #[test]
    fn block_device_mapping_from_yaml() {
        let yaml = r#"
deviceName: /dev/xvda
ebs:
  volumeSize: 100Gi
  volumeType: gp3
  iops: 3000
  encrypted: true
"#;
        let mapping: BlockDeviceMapping = serde_yaml::from_str(yaml).expect("deserialize");
        assert_eq!(mapping.ebs.volume_size.as_deref(), Some("100Gi"));
        assert_eq!(mapping.ebs.volume_type, Some(VolumeType::Gp3));
        assert_eq!(mapping.ebs.iops, Some(3000));
        assert!(mapping.ebs.kms_key_id.is_none());

        let json = serde_json::to_value(&mapping).expect("serialize");
        assert_eq!(json["ebs"]["volumeSize"], "100Gi");
        assert!(json["ebs"].get("throughput").is_none());
    }
}
