//! Closed value types used by provisioner props and documents

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// CPU architecture a node may be launched with
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ArchType {
    /// x86_64
    #[default]
    Amd64,
    /// aarch64 (Graviton)
    Arm64,
}

impl ArchType {
    /// Value used in the `kubernetes.io/arch` requirement
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Amd64 => "amd64",
            Self::Arm64 => "arm64",
        }
    }
}

impl std::fmt::Display for ArchType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ArchType {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "amd64" => Ok(Self::Amd64),
            "arm64" => Ok(Self::Arm64),
            _ => Err(crate::Error::validation(format!(
                "invalid architecture: {s}, expected one of: amd64, arm64"
            ))),
        }
    }
}

/// Purchase option for launched capacity
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum CapacityType {
    /// Spot capacity (default)
    #[default]
    Spot,
    /// On-demand capacity
    OnDemand,
}

impl CapacityType {
    /// Value used in the `karpenter.sh/capacity-type` requirement
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Spot => "spot",
            Self::OnDemand => "on-demand",
        }
    }
}

impl std::fmt::Display for CapacityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CapacityType {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "spot" => Ok(Self::Spot),
            "on-demand" => Ok(Self::OnDemand),
            _ => Err(crate::Error::validation(format!(
                "invalid capacity type: {s}, expected one of: spot, on-demand"
            ))),
        }
    }
}

/// EC2 instance type in `family.size` form (e.g. `m5.large`)
///
/// Validated at parse time so malformed strings never reach a requirement.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct InstanceType(String);

impl InstanceType {
    /// Parse and validate an instance type
    pub fn new(value: impl Into<String>) -> Result<Self, crate::Error> {
        let value = value.into();
        let valid_part =
            |p: &str| !p.is_empty() && p.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');

        match value.split_once('.') {
            Some((family, size)) if valid_part(family) && valid_part(size) => Ok(Self(value)),
            _ => Err(crate::Error::validation(format!(
                "invalid instance type: {value:?}, expected family.size (e.g. m5.large)"
            ))),
        }
    }

    /// Instance family (e.g. `m5`)
    pub fn family(&self) -> &str {
        self.0.split_once('.').map(|(f, _)| f).unwrap_or(&self.0)
    }

    /// The instance type string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for InstanceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for InstanceType {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for InstanceType {
    type Error = crate::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<InstanceType> for String {
    fn from(value: InstanceType) -> Self {
        value.0
    }
}

/// Effect of a node taint
#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq, Hash)]
pub enum TaintEffect {
    /// Do not schedule pods that don't tolerate the taint
    NoSchedule,
    /// Avoid scheduling pods that don't tolerate the taint
    PreferNoSchedule,
    /// Evict running pods that don't tolerate the taint
    NoExecute,
}

impl std::fmt::Display for TaintEffect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoSchedule => write!(f, "NoSchedule"),
            Self::PreferNoSchedule => write!(f, "PreferNoSchedule"),
            Self::NoExecute => write!(f, "NoExecute"),
        }
    }
}

/// A taint applied to provisioned nodes
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Taint {
    /// Taint key (e.g. "example.com/special-taint")
    pub key: String,
    /// Optional taint value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Taint effect
    pub effect: TaintEffect,
}

impl Taint {
    /// Create a taint without a value
    pub fn new(key: impl Into<String>, effect: TaintEffect) -> Self {
        Self {
            key: key.into(),
            value: None,
            effect,
        }
    }

    /// Set the taint value
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_type_uses_kebab_case_on_the_wire() {
        let json = serde_json::to_string(&CapacityType::OnDemand).expect("serialize");
        assert_eq!(json, "\"on-demand\"");
        assert_eq!("on-demand".parse::<CapacityType>().ok(), Some(CapacityType::OnDemand));
        assert!("reserved".parse::<CapacityType>().is_err());
    }

    #[test]
    fn arch_type_rejects_unknown_values() {
        assert_eq!("arm64".parse::<ArchType>().ok(), Some(ArchType::Arm64));
        let err = "x86_64".parse::<ArchType>().expect_err("x86_64 is not a k8s arch label");
        assert!(err.to_string().contains("amd64, arm64"));
    }

    #[test]
    fn instance_type_requires_family_and_size() {
        let it = InstanceType::new("m5.large").expect("valid instance type");
        assert_eq!(it.family(), "m5");
        assert_eq!(it.to_string(), "m5.large");

        assert!(InstanceType::new("u-6tb1.metal").is_ok());
        assert!(InstanceType::new("m5").is_err());
        assert!(InstanceType::new(".large").is_err());
        assert!(InstanceType::new("M5.Large").is_err());
    }

    #[test]
    fn instance_type_validates_when_deserialized() {
        let ok: Result<Vec<InstanceType>, _> = serde_json::from_str(r#"["c6g.xlarge"]"#);
        assert!(ok.is_ok());
        let bad: Result<Vec<InstanceType>, _> = serde_json::from_str(r#"["not-an-instance"]"#);
        assert!(bad.is_err());
    }

    #[test]
    fn taint_without_value_omits_the_key() {
        let taint = Taint::new("example.com/special-taint", TaintEffect::NoSchedule);
        let json = serde_json::to_value(&taint).expect("serialize");
        assert_eq!(
            json,
            serde_json::json!({"key": "example.com/special-taint", "effect": "NoSchedule"})
        );

        let taint = taint.with_value("true");
        assert_eq!(taint.value.as_deref(), Some("true"));
    }
}
