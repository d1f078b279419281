//! Validate command

use std::io::Write;
use std::path::PathBuf;

use clap::Args;

use karpenter_construct::ResourceKind;

use super::synthesize;
use crate::config::SynthConfig;
use crate::Result;

#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Synthesis config file
    #[arg(short = 'f', long = "file")]
    pub file: PathBuf,
}

/// Build everything from `args.file`; the first error is returned unchanged
pub fn run(args: &ValidateArgs, out: &mut impl Write) -> Result<()> {
    let config = SynthConfig::load(&args.file)?;
    let engine = synthesize(&config)?;
    engine.rendered()?;

    writeln!(
        out,
        "{} valid: {} resources, {} provisioning documents, controller {}",
        args.file.display(),
        engine.resources().len(),
        engine.of_kind(ResourceKind::Manifest).len(),
        config.karpenter.version,
    )?;
    Ok(())
}
