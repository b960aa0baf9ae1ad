//! Stack command handlers.
//!
//! This module contains handlers for the synth, describe and list commands.

pub mod describe;
pub mod list;
pub mod synth;

use anyhow::Context;
use session_topology::{AppArgs, AppConfig, DeploymentDescription, SelectArgs};

/// Load the app configuration named on the command line, or the built-in one.
pub fn load_app_config(args: &AppArgs) -> anyhow::Result<AppConfig> {
    match &args.config {
        Some(path) => AppConfig::from_file(path)
            .with_context(|| format!("Failed to load app configuration from {path:?}")),
        None => Ok(AppConfig::default()),
    }
}

/// Build the descriptions of every selected stack.
///
/// Fails before building anything if the selected stack does not exist or
/// any stack's instance count is invalid.
pub fn build_descriptions(args: &SelectArgs) -> anyhow::Result<Vec<DeploymentDescription>> {
    let app = load_app_config(&args.app)?;

    let stacks = match &args.stack {
        Some(name) => vec![app.stack(name)?.clone()],
        None => app.stacks.clone(),
    };

    stacks
        .iter()
        .map(|stack| {
            let generator =
                stack.generator(args.app.account.as_deref(), args.app.region.as_deref());
            let description = match args.instances {
                Some(count) => generator.generate_count(count),
                None => generator.generate(stack.instance_count),
            }
            .with_context(|| format!("Failed to generate stack {}", stack.name))?;

            tracing::info!(
                "Stack {}: {} instance(s)",
                description.stack_name,
                description.instance_count()
            );
            Ok(description)
        })
        .collect()
}
