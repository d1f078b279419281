//! Synthesis input file
//!
//! One YAML document describing the existing cluster, its network, the
//! Karpenter installation and the provisioners to add:
//!
//! ```yaml
//! cluster:
//!   name: prod
//!   endpoint: https://ABC.gr7.us-west-2.eks.amazonaws.com
//!   oidcIssuer: oidc.eks.us-west-2.amazonaws.com/id/ABC
//! network:
//!   availabilityZones: [us-west-2a, us-west-2b]
//!   privateSubnetIds: [subnet-1, subnet-2]
//! karpenter:
//!   version: v0.27.3
//! provisioners:
//!   - name: default
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use karpenter_common::crd::ProvisionerProps;
use karpenter_construct::{ClusterSettings, ControllerVersion, KarpenterProps, NetworkContext};

use crate::{Error, Result};

/// Installation settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KarpenterSettings {
    /// Controller release; defaults to the latest supported
    #[serde(default)]
    pub version: ControllerVersion,
    /// Tags for every launched instance
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    /// Subnets to tag instead of the private subnets
    #[serde(default)]
    pub subnets: Option<Vec<String>>,
}

/// Everything the CLI synthesizes from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SynthConfig {
    /// Existing cluster
    pub cluster: ClusterSettings,
    /// Cluster network
    pub network: NetworkContext,
    /// Installation settings
    #[serde(default)]
    pub karpenter: KarpenterSettings,
    /// Provisioners, declared in order
    #[serde(default)]
    pub provisioners: Vec<ProvisionerProps>,
}

impl SynthConfig {
    /// Parse a config from YAML text
    pub fn from_yaml(yaml: &str) -> std::result::Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    /// Load a config file
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path).map_err(|source| Error::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&data).map_err(|source| Error::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Construct inputs
    pub fn karpenter_props(&self) -> KarpenterProps {
        KarpenterProps {
            network: self.network.clone(),
            subnets: self.karpenter.subnets.clone(),
            tags: self.karpenter.tags.clone(),
            version: self.karpenter.version,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
cluster:
  name: prod
  endpoint: https://ABC.gr7.us-west-2.eks.amazonaws.com
  oidcIssuer: oidc.eks.us-west-2.amazonaws.com/id/ABC
network:
  availabilityZones: [us-west-2a]
"#;

    #[test]
    fn minimal_config_uses_defaults() {
        let config = SynthConfig::from_yaml(MINIMAL).expect("parse");
        assert_eq!(config.karpenter.version, ControllerVersion::DEFAULT);
        assert!(config.provisioners.is_empty());
        assert!(config.network.private_subnet_ids.is_empty());

        let props = config.karpenter_props();
        assert!(props.subnets.is_none());
        assert!(props.tags.is_empty());
    }

    #[test]
    fn unsupported_version_fails_to_parse() {
        let yaml = format!("{MINIMAL}karpenter:\n  version: 1.0.0\n");
        assert!(SynthConfig::from_yaml(&yaml).is_err());
    }

    #[test]
    fn missing_file_names_the_path() {
        let err = SynthConfig::load(Path::new("/nonexistent/karpenter.yaml"))
            .expect_err("missing file");
        assert!(err.to_string().contains("/nonexistent/karpenter.yaml"));
    }
}
