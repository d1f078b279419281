//! Karpenter synthesis CLI library

pub mod commands;
pub mod config;
pub mod error;

pub use error::{Error, Result};

use clap::{Parser, Subcommand};

/// Synthesize a Karpenter installation without touching a cluster
#[derive(Parser, Debug)]
#[command(name = "karpenter-synth")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Log as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print every declared resource in dependency order
    Render(commands::render::RenderArgs),
    /// Build everything and report success or the first error
    Validate(commands::validate::ValidateArgs),
}

impl Cli {
    /// Run the CLI command, writing results to stdout
    pub fn run(self) -> Result<()> {
        let mut stdout = std::io::stdout().lock();
        match self.command {
            Commands::Render(args) => commands::render::run(&args, &mut stdout),
            Commands::Validate(args) => commands::validate::run(&args, &mut stdout),
        }
    }
}
