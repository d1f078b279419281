//! Render command

use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;

use clap::{Args, ValueEnum};
use serde::Serialize;

use karpenter_construct::DeclaredResource;

use super::synthesize;
use crate::config::SynthConfig;
use crate::Result;

/// Output format
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// YAML (default)
    #[default]
    Yaml,
    /// Pretty-printed JSON
    Json,
}

#[derive(Args, Debug)]
pub struct RenderArgs {
    /// Synthesis config file
    #[arg(short = 'f', long = "file")]
    pub file: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Yaml)]
    pub output: OutputFormat,
}

/// Everything the installation declared
#[derive(Debug, Serialize)]
pub struct Synthesis {
    /// Declarations, dependencies first
    pub resources: Vec<DeclaredResource>,
    /// Output values by name
    pub outputs: BTreeMap<String, String>,
}

/// Synthesize the config at `args.file` and write it to `out`
pub fn run(args: &RenderArgs, out: &mut impl Write) -> Result<()> {
    let config = SynthConfig::load(&args.file)?;
    let synthesis = render(&config)?;

    match args.output {
        OutputFormat::Yaml => write!(out, "{}", serde_yaml::to_string(&synthesis)?)?,
        OutputFormat::Json => writeln!(out, "{}", serde_json::to_string_pretty(&synthesis)?)?,
    }
    Ok(())
}

/// Synthesize a config into ordered declarations and outputs
pub fn render(config: &SynthConfig) -> Result<Synthesis> {
    let engine = synthesize(config)?;
    Ok(Synthesis {
        resources: engine.rendered()?,
        outputs: engine.outputs(),
    })
}
