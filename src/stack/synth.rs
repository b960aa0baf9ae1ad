//! Synth command handler.

use super::build_descriptions;
use anyhow::Context;
use session_topology::{CloudFormationGenerator, SynthArgs, TemplateGenerator};
use std::path::PathBuf;

/// Run the synth command. Returns the paths of the written templates.
pub fn run_synth(args: SynthArgs) -> anyhow::Result<Vec<PathBuf>> {
    tracing::info!("Generating CloudFormation templates...");
    tracing::info!("Format: {:?}", args.format);

    let descriptions = build_descriptions(&args.select)?;
    let generator = CloudFormationGenerator::new(args.format.into());

    let output_dir = &args.output_dir;
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create output directory: {output_dir:?}"))?;

    let mut written = Vec::with_capacity(descriptions.len());
    for description in &descriptions {
        let content = generator.generate(description)?;
        let path = output_dir.join(generator.filename(description));
        std::fs::write(&path, &content)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        tracing::info!("Generated: {}", path.display());

        // One JSON line per stack for CI tooling
        println!(
            "{}",
            serde_json::json!({
                "stack": description.stack_name,
                "instances": description.instance_count(),
                "template": path.display().to_string(),
            })
        );
        written.push(path);
    }

    tracing::info!(
        "Templates generated successfully in: {}",
        output_dir.display()
    );
    Ok(written)
}
