//! Function inspection commands

use anyhow::Result;

use super::{Project, ensure_no_errors, print_diagnostics};

/// List all functions
pub async fn list(config_path: &str) -> Result<()> {
    let project = Project::load(config_path)?;
    let context = project.analyze();
    print_diagnostics(&context.diagnostics);
    ensure_no_errors(&context.diagnostics)?;

    for function in context.functions() {
        let kinds: Vec<&str> = function.bindings().iter().map(|b| b.kind().as_str()).collect();
        println!("{}\t{}\t{}", function.name(), function.document(), kinds.join(","));
    }
    Ok(())
}

/// Print one function's descriptor
pub async fn show(config_path: &str, name: &str) -> Result<()> {
    let project = Project::load(config_path)?;
    let context = project.analyze();
    print_diagnostics(&context.diagnostics);

    let function = context
        .function(name)
        .ok_or_else(|| anyhow::anyhow!("Function not found: {}", name))?;
    println!("{}", serde_json::to_string_pretty(&function.descriptor())?);
    Ok(())
}
