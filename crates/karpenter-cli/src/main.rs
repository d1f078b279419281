//! karpenter-synth
//!
//! Declares Karpenter and its provisioners against an in-memory engine and
//! prints or checks the result.

use clap::Parser;

use karpenter_cli::{Cli, Result};
use karpenter_common::telemetry::{init_logging, LogConfig};

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&LogConfig {
        json: cli.log_json,
        ..Default::default()
    })?;

    cli.run()
}
