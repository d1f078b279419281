//! Subnet discovery tagging
//!
//! Karpenter finds the subnets it may launch into by tag. The construct only
//! declares a validated tagging request; the [`SubnetTagger`] behind it
//! applies and removes the tag.
//!
//! [`SubnetTagger`]: crate::engine::SubnetTagger

use serde::Serialize;

use karpenter_common::{Error, Result};

/// Subnets that must carry the cluster discovery tag
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubnetTagRequest {
    /// Subnet ids, as supplied
    pub subnets: Vec<String>,
    /// Tag key (`karpenter.sh/discovery/<cluster>`)
    pub cluster_tag: String,
}

impl SubnetTagRequest {
    /// Validate and build a request; every id must be non-blank
    pub fn new(subnets: Vec<String>, cluster_tag: impl Into<String>) -> Result<Self> {
        if let Some(index) = subnets.iter().position(|s| s.trim().is_empty()) {
            return Err(Error::validation_for_field(
                "karpenter",
                format!("subnets[{index}]"),
                "Subnet cannot be empty or undefined.",
            ));
        }

        Ok(Self {
            subnets,
            cluster_tag: cluster_tag.into(),
        })
    }
}
