//! Command-line interface for session-stack
//!
//! # Usage Examples
//!
//! ```bash
//! # Built-in stacks (default region + il-central-1), one instance each
//! CDK_DEFAULT_REGION=eu-central-1 session-stack synth
//!
//! # Stacks from a config file
//! session-stack synth --config stacks.toml --output-dir ./cdk.out
//!
//! # List configured stacks
//! session-stack list --config stacks.toml
//! ```

use clap::Parser;
use session_stack::stack::{describe::run_describe, list::run_list, synth::run_synth};
use session_topology::{Cli, Commands};

fn main() -> anyhow::Result<()> {
    if let Err(e) = run() {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}

fn run() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Synth(args) => {
            run_synth(args)?;
        }
        Commands::Describe(args) => run_describe(args)?,
        Commands::List(args) => run_list(args)?,
    }

    Ok(())
}
