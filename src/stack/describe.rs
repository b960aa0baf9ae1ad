//! Describe command handler.

use super::build_descriptions;
use session_topology::{describe_topology, DescribeArgs};

/// Render the topology summary of every selected stack.
pub fn describe(args: &DescribeArgs) -> anyhow::Result<String> {
    let descriptions = build_descriptions(&args.select)?;
    Ok(descriptions
        .iter()
        .map(describe_topology)
        .collect::<Vec<_>>()
        .join("\n\n"))
}

/// Run the describe command.
pub fn run_describe(args: DescribeArgs) -> anyhow::Result<()> {
    println!("{}", describe(&args)?);
    Ok(())
}
