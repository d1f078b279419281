//! Karpenter construct
//!
//! This crate provides:
//! - [`PolicyBuilder`], which turns [`ProvisionerProps`] into Provisioner and
//!   AWSNodeTemplate documents
//! - [`ManifestRegistry`], which declares those documents with the cluster
//!   and records their ordering edges
//! - [`Karpenter`], which wires IAM, subnet tagging, the interruption queue
//!   and the controller chart through the collaborator traits in [`engine`]
//! - [`InMemoryEngine`], a recording implementation of every collaborator
//!   used for synthesis and tests
//!
//! [`ProvisionerProps`]: karpenter_common::crd::ProvisionerProps

pub mod builder;
pub mod chart;
pub mod constants;
pub mod engine;
pub mod graph;
pub mod iam;
pub mod interruption;
pub mod karpenter;
pub mod manifest;
pub mod registry;
pub mod subnets;
pub mod version;

pub use builder::{BuilderContext, PolicyBuilder, Timers};
pub use engine::memory::{ClusterSettings, DeclaredResource, InMemoryEngine, ResourceKind};
pub use engine::{
    ChartInstaller, ClusterContext, IdentityProvisioner, InfrastructureEngine,
    InterruptionMessaging, ManifestDeclaration, OutputSink, ResourceRef, SubnetTagger,
};
pub use graph::DependencyGraph;
pub use karpenter::{Karpenter, KarpenterProps, NetworkContext};
pub use manifest::PolicyDocuments;
pub use registry::{ManifestRegistry, RegisteredPolicy};
pub use subnets::SubnetTagRequest;
pub use version::ControllerVersion;
