//! Custom Resource Definitions and user-facing props
//!
//! - [`Provisioner`] and [`AwsNodeTemplate`] are the documents handed to the
//!   Karpenter controller.
//! - [`ProvisionerProps`] is what callers supply to describe one provisioner.

mod ami;
mod node_template;
mod props;
mod provisioner;
mod types;

pub use ami::{bottlerocket_ami_parameter, AmiFamily};
pub use node_template::{
    AwsNodeTemplate, AwsNodeTemplateSpec, BlockDevice, BlockDeviceMapping, ProviderFields,
    VolumeType, NODE_TEMPLATE_API_VERSION,
};
pub use props::{Limits, ProviderProps, ProvisionerProps, Requirements};
pub use provisioner::{
    Consolidation, Provisioner, ProvisionerLimits, ProvisionerSpec, ProviderRef, Requirement,
    RequirementOperator, ResourceLimits, PROVISIONER_API_VERSION,
};
pub use types::{ArchType, CapacityType, InstanceType, Taint, TaintEffect};

use crate::Error;

/// Maximum length of a Kubernetes object name (RFC 1123 subdomain)
pub const MAX_RESOURCE_NAME_LEN: usize = 253;

/// Validate a Kubernetes object name (RFC 1123 subdomain).
///
/// Rules:
/// - Must not be empty or longer than 253 characters
/// - May contain lowercase letters, digits, `-` and `.`
/// - Must start and end with a lowercase letter or digit
///
/// Returns the name lower-cased, as it is used for the generated resource.
pub fn validate_resource_name(name: &str) -> Result<String, Error> {
    let invalid = |msg: String| Error::validation_for_field(name, "name", msg);

    if name.is_empty() {
        return Err(invalid("name cannot be empty".to_string()));
    }
    if name.len() > MAX_RESOURCE_NAME_LEN {
        return Err(invalid(format!(
            "name must be at most {MAX_RESOURCE_NAME_LEN} characters"
        )));
    }

    let is_alnum = |c: char| c.is_ascii_lowercase() || c.is_ascii_digit();
    if let Some(c) = name
        .chars()
        .find(|&c| !is_alnum(c) && c != '-' && c != '.')
    {
        return Err(invalid(format!(
            "name must be lowercase alphanumeric with '-' or '.', found '{c}'"
        )));
    }

    let starts_ok = name.chars().next().is_some_and(is_alnum);
    let ends_ok = name.chars().last().is_some_and(is_alnum);
    if !starts_ok || !ends_ok {
        return Err(invalid(
            "name must start and end with a lowercase letter or digit".to_string(),
        ));
    }

    Ok(name.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::simple("default")]
    #[case::with_digit("default-1")]
    #[case::dotted("gpu.workers")]
    #[case::numeric("1")]
    fn accepts_rfc1123_names(#[case] name: &str) {
        assert_eq!(
            validate_resource_name(name).expect("name should be valid"),
            name
        );
    }

    #[rstest]
    #[case::uppercase_and_underscore("Default_1")]
    #[case::empty("")]
    #[case::leading_hyphen("-default")]
    #[case::trailing_dot("default.")]
    #[case::space("my pool")]
    fn rejects_malformed_names(#[case] name: &str) {
        let err = validate_resource_name(name).expect_err("name should be rejected");
        assert!(err.is_validation());
    }

    #[test]
    fn rejects_names_over_length_limit() {
        let name = "a".repeat(MAX_RESOURCE_NAME_LEN + 1);
        assert!(validate_resource_name(&name).is_err());
        let name = "a".repeat(MAX_RESOURCE_NAME_LEN);
        assert!(validate_resource_name(&name).is_ok());
    }
}
