//! CLI argument definitions for session-stack.

use crate::generator::TemplateFormat;
use crate::topology::InstanceCount;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Multi-instance session deployment generator.
#[derive(Parser)]
#[command(name = "session-stack")]
#[command(about = "Generate CloudFormation templates for multi-instance session deployments")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Render CloudFormation templates for the configured stacks
    Synth(SynthArgs),

    /// Print the derived topology and security findings
    Describe(DescribeArgs),

    /// List configured stacks
    List(AppArgs),
}

/// Template format for CLI.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum FormatChoice {
    Json,
    Yaml,
}

impl From<FormatChoice> for TemplateFormat {
    fn from(choice: FormatChoice) -> Self {
        match choice {
            FormatChoice::Json => TemplateFormat::Json,
            FormatChoice::Yaml => TemplateFormat::Yaml,
        }
    }
}

/// App configuration shared by every command.
#[derive(Args, Clone, Debug)]
pub struct AppArgs {
    /// App configuration file (.toml, .yaml or .yml); built-in stacks when omitted
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,

    /// Account for stacks that do not set one
    #[arg(long, env = "CDK_DEFAULT_ACCOUNT")]
    pub account: Option<String>,

    /// Region for stacks that do not set one
    #[arg(long, env = "CDK_DEFAULT_REGION")]
    pub region: Option<String>,
}

/// Stack selection shared by synth and describe.
#[derive(Args, Clone, Debug)]
pub struct SelectArgs {
    #[command(flatten)]
    pub app: AppArgs,

    /// Only this stack (all stacks when omitted)
    #[arg(long, short = 's')]
    pub stack: Option<String>,

    /// Number of instances (overrides the configured count)
    #[arg(long, short = 'n')]
    pub instances: Option<InstanceCount>,
}

/// Arguments for the synth command.
#[derive(Args, Clone, Debug)]
pub struct SynthArgs {
    #[command(flatten)]
    pub select: SelectArgs,

    /// Template format
    #[arg(long, short = 'f', default_value = "json")]
    pub format: FormatChoice,

    /// Output directory for generated templates
    #[arg(long, short = 'o', default_value = "./cdk.out")]
    pub output_dir: PathBuf,
}

/// Arguments for the describe command.
#[derive(Args, Clone, Debug)]
pub struct DescribeArgs {
    #[command(flatten)]
    pub select: SelectArgs,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_synth() {
        let cli = Cli::try_parse_from([
            "session-stack",
            "synth",
            "--instances",
            "3",
            "--format",
            "yaml",
            "--stack",
            "SessionStack",
        ])
        .unwrap();

        match cli.command {
            Commands::Synth(args) => {
                assert_eq!(args.select.instances.map(|c| c.get()), Some(3));
                assert_eq!(args.select.stack.as_deref(), Some("SessionStack"));
                assert!(matches!(args.format, FormatChoice::Yaml));
                assert_eq!(args.output_dir, PathBuf::from("./cdk.out"));
            }
            _ => panic!("expected synth"),
        }
    }

    #[test]
    fn test_invalid_instance_count_rejected() {
        for bad in ["0", "-1", "2.5", "many"] {
            assert!(
                Cli::try_parse_from(["session-stack", "describe", "--instances", bad]).is_err(),
                "{bad} should be rejected"
            );
        }
    }
}
