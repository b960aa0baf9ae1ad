//! List command handler.

use super::load_app_config;
use session_topology::AppArgs;

/// One line per configured stack.
pub fn list_stacks(args: &AppArgs) -> anyhow::Result<Vec<String>> {
    let app = load_app_config(args)?;
    Ok(app
        .stacks
        .iter()
        .map(|stack| {
            let region = stack
                .region
                .as_deref()
                .or(args.region.as_deref())
                .unwrap_or("<default>");
            format!(
                "{}\tregion={}\tinstances={}\tcompute={}",
                stack.name, region, stack.instance_count, stack.settings.compute
            )
        })
        .collect())
}

/// Run the list command.
pub fn run_list(args: AppArgs) -> anyhow::Result<()> {
    for line in list_stacks(&args)? {
        println!("{line}");
    }
    Ok(())
}
