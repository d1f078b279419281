//! Tracks declared provisioning policies and their ordering edges
//!
//! Every policy's documents are declared with the cluster after the
//! controller install: the node template first, then the provisioner that
//! refers to it. Both go to the cluster in one all-or-nothing batch, and the
//! policy is recorded only once the batch was accepted, so a failed
//! registration declares nothing and leaves earlier policies untouched.

use tracing::{debug, info};

use karpenter_common::{Error, Result};

use crate::builder::NODE_TEMPLATE_SUFFIX;
use crate::engine::{ClusterContext, ManifestDeclaration, ResourceRef};
use crate::graph::DependencyGraph;
use crate::manifest::PolicyDocuments;

/// A policy whose documents were declared
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegisteredPolicy {
    /// Policy (provisioner) name
    pub name: String,
    /// Declared provisioner
    pub provisioner: ResourceRef,
    /// Declared node template, on releases that model them
    pub node_template: Option<ResourceRef>,
}

impl RegisteredPolicy {
    /// Declared resources, node template first
    pub fn resources(&self) -> Vec<ResourceRef> {
        self.node_template
            .iter()
            .chain(std::iter::once(&self.provisioner))
            .cloned()
            .collect()
    }
}

/// Registry of provisioning policies declared against one controller install
#[derive(Debug)]
pub struct ManifestRegistry {
    install: ResourceRef,
    entries: Vec<RegisteredPolicy>,
    graph: DependencyGraph,
}

impl ManifestRegistry {
    /// Create a registry whose documents all wait for `install`
    pub fn new(install: ResourceRef) -> Self {
        let mut graph = DependencyGraph::new();
        graph.add_node(&install);
        Self {
            install,
            entries: Vec::new(),
            graph,
        }
    }

    /// Declare one policy's documents with the cluster
    ///
    /// Returns the declared references, node template first. Duplicate
    /// names are not detected here; the cluster decides whether a second
    /// declaration under the same id is acceptable.
    pub fn register<C>(
        &mut self,
        cluster: &C,
        policy_name: &str,
        documents: &PolicyDocuments,
    ) -> Result<Vec<ResourceRef>>
    where
        C: ClusterContext + ?Sized,
    {
        let policy = policy_name.to_lowercase();
        let provisioner_document = documents.provisioner_value()?;
        let template = documents.node_template_value()?.map(|document| ManifestDeclaration {
            id: documents
                .node_template_name()
                .map(str::to_lowercase)
                .unwrap_or_else(|| format!("{policy}{NODE_TEMPLATE_SUFFIX}")),
            document,
            depends_on: vec![self.install.clone()],
        });

        let mut provisioner_deps = vec![self.install.clone()];
        provisioner_deps.extend(template.as_ref().map(|t| ResourceRef::new(&t.id)));
        let has_template = template.is_some();
        let mut batch: Vec<ManifestDeclaration> = template.into_iter().collect();
        batch.push(ManifestDeclaration {
            id: policy.clone(),
            document: provisioner_document,
            depends_on: provisioner_deps,
        });

        let declared = cluster.add_manifests(&batch)?;
        let (node_template, provisioner) = match declared.as_slice() {
            [template, provisioner] if has_template => (Some(template.clone()), provisioner.clone()),
            [provisioner] if !has_template => (None, provisioner.clone()),
            _ => {
                return Err(Error::engine_with_context(
                    "cluster",
                    format!(
                        "expected {} references for {policy}, got {}",
                        batch.len(),
                        declared.len()
                    ),
                ))
            }
        };

        self.graph.add_edge(&provisioner, &self.install);
        if let Some(template) = &node_template {
            debug!(policy = %policy, resource = %template, "declared node template");
            self.graph.add_edge(&provisioner, template);
            self.graph.add_edge(template, &self.install);
        }

        let entry = RegisteredPolicy {
            name: policy,
            provisioner,
            node_template,
        };
        let resources = entry.resources();
        info!(policy = %entry.name, resources = resources.len(), "registered provisioning policy");
        self.entries.push(entry);

        Ok(resources)
    }

    /// The controller install every document depends on
    pub fn install(&self) -> &ResourceRef {
        &self.install
    }

    /// Registered policies in registration order
    pub fn entries(&self) -> &[RegisteredPolicy] {
        &self.entries
    }

    /// Look up a registered policy by name
    pub fn get(&self, name: &str) -> Option<&RegisteredPolicy> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Ordering edges between the install and every declared document
    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::MockClusterContext;
    use karpenter_common::crd::{
        AwsNodeTemplate, AwsNodeTemplateSpec, Provisioner, ProvisionerSpec,
    };

    fn documents(name: &str, with_template: bool) -> PolicyDocuments {
        PolicyDocuments {
            provisioner: Provisioner::new(name, ProvisionerSpec::default()),
            node_template: with_template.then(|| {
                AwsNodeTemplate::new(
                    &format!("{name}-node-template"),
                    AwsNodeTemplateSpec::default(),
                )
            }),
        }
    }

    fn echo_ids(cluster: &mut MockClusterContext) {
        cluster
            .expect_add_manifests()
            .returning(|batch| Ok(batch.iter().map(|m| ResourceRef::new(&m.id)).collect()));
    }

    #[test]
    fn node_template_and_provisioner_go_in_one_batch() {
        let install = ResourceRef::new("HelmChart");
        let mut cluster = MockClusterContext::new();
        let expected_install = install.clone();

        cluster
            .expect_add_manifests()
            .withf(move |batch| {
                batch.len() == 2
                    && batch[0].id == "default-node-template"
                    && batch[0].document["kind"] == "AWSNodeTemplate"
                    && batch[0].depends_on == vec![expected_install.clone()]
                    && batch[1].id == "default"
                    && batch[1].document["kind"] == "Provisioner"
                    && batch[1].depends_on
                        == vec![
                            expected_install.clone(),
                            ResourceRef::new("default-node-template"),
                        ]
            })
            .times(1)
            .returning(|batch| Ok(batch.iter().map(|m| ResourceRef::new(&m.id)).collect()));

        let mut registry = ManifestRegistry::new(install);
        let refs = registry
            .register(&cluster, "default", &documents("default", true))
            .expect("register");

        assert_eq!(
            refs,
            vec![
                ResourceRef::new("default-node-template"),
                ResourceRef::new("default")
            ]
        );
    }

    #[test]
    fn edges_cover_install_and_template() {
        let mut cluster = MockClusterContext::new();
        echo_ids(&mut cluster);

        let install = ResourceRef::new("HelmChart");
        let mut registry = ManifestRegistry::new(install.clone());
        registry
            .register(&cluster, "default", &documents("default", true))
            .expect("register");

        let graph = registry.graph();
        let provisioner = ResourceRef::new("default");
        let template = ResourceRef::new("default-node-template");
        assert_eq!(
            graph.dependencies_of(&provisioner),
            vec![install.clone(), template.clone()]
        );
        assert_eq!(graph.dependencies_of(&template), vec![install.clone()]);
        assert_eq!(
            graph.topological_order().expect("acyclic"),
            vec![install, template, provisioner]
        );
    }

    #[test]
    fn inline_provider_registers_only_the_provisioner() {
        let mut cluster = MockClusterContext::new();
        cluster
            .expect_add_manifests()
            .withf(|batch| batch.len() == 1 && batch[0].id == "legacy")
            .times(1)
            .returning(|batch| Ok(batch.iter().map(|m| ResourceRef::new(&m.id)).collect()));

        let mut registry = ManifestRegistry::new(ResourceRef::new("HelmChart"));
        let refs = registry
            .register(&cluster, "legacy", &documents("legacy", false))
            .expect("register");

        assert_eq!(refs, vec![ResourceRef::new("legacy")]);
        let entry = registry.get("legacy").expect("tracked");
        assert!(entry.node_template.is_none());
    }

    #[test]
    fn rejected_batch_is_not_tracked() {
        let mut cluster = MockClusterContext::new();
        cluster
            .expect_add_manifests()
            .times(1)
            .returning(|_| Err(Error::engine_with_context("cluster", "rejected")));

        let mut registry = ManifestRegistry::new(ResourceRef::new("HelmChart"));
        let err = registry
            .register(&cluster, "broken", &documents("broken", true))
            .expect_err("batch rejected");

        assert_eq!(err.context(), Some("cluster"));
        assert!(registry.entries().is_empty());
        assert!(registry.get("broken").is_none());
        assert_eq!(registry.graph().len(), 1);
    }

    #[test]
    fn short_reference_list_is_an_engine_error() {
        let mut cluster = MockClusterContext::new();
        cluster
            .expect_add_manifests()
            .returning(|_| Ok(vec![ResourceRef::new("default")]));

        let mut registry = ManifestRegistry::new(ResourceRef::new("HelmChart"));
        let err = registry
            .register(&cluster, "default", &documents("default", true))
            .expect_err("missing template reference");
        assert!(err.is_retryable());
        assert!(registry.entries().is_empty());
    }

    #[test]
    fn entries_keep_registration_order() {
        let mut cluster = MockClusterContext::new();
        echo_ids(&mut cluster);

        let mut registry = ManifestRegistry::new(ResourceRef::new("HelmChart"));
        for name in ["zeta", "alpha"] {
            registry
                .register(&cluster, name, &documents(name, true))
                .expect("register");
        }
        let names: Vec<_> = registry.entries().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha"]);
    }
}
