//! Common types for the Karpenter construct: CRDs, provisioner props, errors, and utilities

#![deny(missing_docs)]

pub mod crd;
pub mod error;
pub mod telemetry;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Namespace the controller chart is installed into
pub const KARPENTER_NAMESPACE: &str = "karpenter";

/// Service account the controller runs as (must match the controller role trust policy)
pub const KARPENTER_SERVICE_ACCOUNT: &str = "karpenter";

/// Label key stamped on every provisioned node with the owning cluster name
pub const CLUSTER_NAME_LABEL: &str = "cluster-name";
