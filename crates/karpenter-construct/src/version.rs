//! Karpenter controller version model
//!
//! The documents and chart values the construct emits depend on which
//! controller release is installed. Only releases that serve the
//! `karpenter.sh/v1alpha5` Provisioner API are supported.

use serde::{Deserialize, Serialize};

use karpenter_common::Error;

/// Controller release, ordered by (major, minor, patch)
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ControllerVersion {
    /// Major version
    pub major: u32,
    /// Minor version
    pub minor: u32,
    /// Patch version
    pub patch: u32,
}

impl ControllerVersion {
    /// Oldest supported release
    pub const MIN_SUPPORTED: Self = Self::new(0, 6, 0);
    /// First release without the v1alpha5 Provisioner API
    pub const FIRST_UNSUPPORTED: Self = Self::new(0, 32, 0);
    /// Release installed when the caller doesn't pick one
    pub const DEFAULT: Self = Self::new(0, 27, 3);

    const CONSOLIDATION: Self = Self::new(0, 15, 0);
    const NODE_TEMPLATE: Self = Self::new(0, 16, 0);
    const OCI_CHART: Self = Self::new(0, 17, 0);
    const INTERRUPTION: Self = Self::new(0, 19, 0);

    /// Create a version
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parse "0.27.3" or "v0.27.3" and check it is supported
    pub fn parse(s: &str) -> Result<Self, Error> {
        let invalid = || {
            Error::validation_for_field(
                "karpenter",
                "version",
                format!("invalid controller version: {s}, expected format: 0.x.y or v0.x.y"),
            )
        };

        let trimmed = s.strip_prefix('v').unwrap_or(s);
        let mut parts = trimmed.split('.');
        let mut next = || -> Result<u32, Error> {
            parts
                .next()
                .and_then(|p| p.parse::<u32>().ok())
                .ok_or_else(invalid)
        };
        let version = Self::new(next()?, next()?, next()?);
        if parts.next().is_some() {
            return Err(invalid());
        }

        version.ensure_supported()?;
        Ok(version)
    }

    /// Check the release serves the v1alpha5 Provisioner API
    pub fn ensure_supported(&self) -> Result<(), Error> {
        if *self < Self::MIN_SUPPORTED || *self >= Self::FIRST_UNSUPPORTED {
            return Err(Error::validation_for_field(
                "karpenter",
                "version",
                format!(
                    "unsupported controller version {self}, supported: >= {} and < {}",
                    Self::MIN_SUPPORTED,
                    Self::FIRST_UNSUPPORTED
                ),
            ));
        }
        Ok(())
    }

    /// Provisioners may enable consolidation
    pub fn supports_consolidation(&self) -> bool {
        *self >= Self::CONSOLIDATION
    }

    /// Provider fields live in a separate AWSNodeTemplate document
    pub fn uses_node_template(&self) -> bool {
        *self >= Self::NODE_TEMPLATE
    }

    /// The chart is published to the OCI registry
    pub fn uses_oci_chart(&self) -> bool {
        *self >= Self::OCI_CHART
    }

    /// The controller consumes an interruption queue and reads `settings.aws.*`
    pub fn supports_interruption(&self) -> bool {
        *self >= Self::INTERRUPTION
    }

    /// Chart version string as published by the repository this release uses
    pub fn chart_version(&self) -> String {
        if self.uses_oci_chart() {
            format!("v{self}")
        } else {
            self.to_string()
        }
    }
}

impl Default for ControllerVersion {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl std::fmt::Display for ControllerVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl std::str::FromStr for ControllerVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ControllerVersion {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ControllerVersion> for String {
    fn from(value: ControllerVersion) -> Self {
        value.to_string()
    }
}
