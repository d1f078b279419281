//! AMI family selection and Bottlerocket image lookup

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::ArchType;
use crate::Error;

/// AMI family Karpenter uses to build launch templates and user data
#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq, Hash)]
pub enum AmiFamily {
    /// Amazon Linux 2 (EKS optimized)
    #[serde(rename = "AL2")]
    Al2,
    /// Bottlerocket
    Bottlerocket,
    /// Ubuntu (EKS optimized)
    Ubuntu,
    /// Windows Server 2019
    Windows2019,
    /// Windows Server 2022
    Windows2022,
    /// Custom AMI, user data supplied by the caller
    Custom,
}

impl AmiFamily {
    /// Wire value of the family
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Al2 => "AL2",
            Self::Bottlerocket => "Bottlerocket",
            Self::Ubuntu => "Ubuntu",
            Self::Windows2019 => "Windows2019",
            Self::Windows2022 => "Windows2022",
            Self::Custom => "Custom",
        }
    }
}

impl std::fmt::Display for AmiFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AmiFamily {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AL2" => Ok(Self::Al2),
            "Bottlerocket" => Ok(Self::Bottlerocket),
            "Ubuntu" => Ok(Self::Ubuntu),
            "Windows2019" => Ok(Self::Windows2019),
            "Windows2022" => Ok(Self::Windows2022),
            "Custom" => Ok(Self::Custom),
            _ => Err(Error::validation(format!(
                "invalid AMI family: {s}, expected one of: AL2, Bottlerocket, Ubuntu, Windows2019, Windows2022, Custom"
            ))),
        }
    }
}

/// SSM parameter holding the latest Bottlerocket AMI for a Kubernetes version
///
/// Accepts versions in format "1.x" (a leading "v" is stripped).
pub fn bottlerocket_ami_parameter(k8s_version: &str, arch: ArchType) -> Result<String, Error> {
    let version = k8s_version.strip_prefix('v').unwrap_or(k8s_version);
    let minor = version
        .strip_prefix("1.")
        .filter(|m| !m.is_empty() && m.chars().all(|c| c.is_ascii_digit()));
    if minor.is_none() {
        return Err(Error::validation(format!(
            "invalid kubernetes version: {k8s_version}, expected format: 1.x"
        )));
    }

    let arch = match arch {
        ArchType::Amd64 => "x86_64",
        ArchType::Arm64 => "arm64",
    };
    Ok(format!(
        "/aws/service/bottlerocket/aws-k8s-{version}/{arch}/latest/image_id"
    ))
}
