//! Validate bindings without generating anything

use anyhow::Result;

use super::{Project, ensure_no_errors, print_diagnostics};

/// Run the validate command
pub async fn run(config_path: &str) -> Result<()> {
    let project = Project::load(config_path)?;
    tracing::info!("✓ Project: {}", project.config.project.name);

    let context = project.analyze();
    print_diagnostics(&context.diagnostics);
    ensure_no_errors(&context.diagnostics)?;

    tracing::info!("✓ {} function(s) are valid", context.function_count());
    Ok(())
}
