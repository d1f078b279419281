//! CLI commands

use tracing::info;

use karpenter_construct::{InMemoryEngine, Karpenter};

use crate::config::SynthConfig;
use crate::Result;

pub mod render;
pub mod validate;

/// Declare the installation and every provisioner against a fresh engine
///
/// Stops at the first error.
pub fn synthesize(config: &SynthConfig) -> Result<InMemoryEngine> {
    let engine = InMemoryEngine::new(config.cluster.clone());
    {
        let mut karpenter = Karpenter::new(&engine, config.karpenter_props())?;
        for provisioner in &config.provisioners {
            karpenter.add_provisioner(provisioner)?;
        }
        info!(
            cluster = %config.cluster.name,
            provisioners = karpenter.registry().entries().len(),
            "synthesized karpenter"
        );
    }
    Ok(engine)
}
