//! Documents generated for one provisioning policy

use kube::Resource;
use serde::Serialize;

use karpenter_common::crd::{AwsNodeTemplate, Provisioner};
use karpenter_common::{Error, Result};

/// Provisioner plus, on releases that model them, its AWSNodeTemplate
#[derive(Clone, Debug)]
pub struct PolicyDocuments {
    /// The Provisioner document
    pub provisioner: Provisioner,
    /// Node template the provisioner refers to by name
    pub node_template: Option<AwsNodeTemplate>,
}

impl PolicyDocuments {
    /// Name of the Provisioner
    pub fn provisioner_name(&self) -> &str {
        self.provisioner.metadata.name.as_deref().unwrap_or_default()
    }

    /// Name of the node template, if there is one
    pub fn node_template_name(&self) -> Option<&str> {
        self.node_template
            .as_ref()
            .and_then(|t| t.metadata.name.as_deref())
    }

    /// Provisioner as a JSON document
    pub fn provisioner_value(&self) -> Result<serde_json::Value> {
        to_document(&self.provisioner)
    }

    /// Node template as a JSON document
    pub fn node_template_value(&self) -> Result<Option<serde_json::Value>> {
        self.node_template.as_ref().map(to_document).transpose()
    }
}

fn to_document<K>(resource: &K) -> Result<serde_json::Value>
where
    K: Resource<DynamicType = ()> + Serialize,
{
    serde_json::to_value(resource)
        .map_err(|e| Error::serialization_for_kind(K::kind(&()).to_string(), e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use karpenter_common::crd::{AwsNodeTemplateSpec, ProvisionerSpec};

    #[test]
    fn documents_serialize_with_type_metadata() {
        let docs = PolicyDocuments {
            provisioner: Provisioner::new("default", ProvisionerSpec::default()),
            node_template: Some(AwsNodeTemplate::new(
                "default-node-template",
                AwsNodeTemplateSpec::default(),
            )),
        };

        assert_eq!(docs.provisioner_name(), "default");
        assert_eq!(docs.node_template_name(), Some("default-node-template"));

        let provisioner = docs.provisioner_value().expect("serialize");
        assert_eq!(provisioner["kind"], "Provisioner");
        assert_eq!(provisioner["metadata"]["name"], "default");

        let template = docs
            .node_template_value()
            .expect("serialize")
            .expect("template present");
        assert_eq!(template["kind"], "AWSNodeTemplate");
    }

    #[test]
    fn inline_provider_documents_have_no_template() {
        let docs = PolicyDocuments {
            provisioner: Provisioner::new("legacy", ProvisionerSpec::default()),
            node_template: None,
        };
        assert!(docs.node_template_name().is_none());
        assert!(docs.node_template_value().expect("serialize").is_none());
    }
}
