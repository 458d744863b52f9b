//! Build the functions artifact

use anyhow::{Context, Result};
use fnforge_codegen::native::builder_for;

use super::{Project, print_diagnostics};

/// Run the build command
pub async fn run(config_path: &str, native: bool, output: Option<&str>) -> Result<()> {
    let project = Project::load(config_path)?;

    let compiler = project.compiler(|options| {
        let native = native || options.native;
        let options = options.with_native(native);
        match output {
            Some(dir) => options.with_function_dir(dir),
            None => options,
        }
    });

    let builder = if compiler.options().native {
        Some(builder_for(&project.config)?)
    } else {
        None
    };

    let context = compiler.analyze(&project.model);
    print_diagnostics(&context.diagnostics);
    if context.has_blocking_errors() {
        anyhow::bail!("{} error(s) found", context.diagnostics.blocking_count());
    }

    let report = compiler
        .package(context, builder.as_deref())
        .await
        .context("Build failed")?;

    let Some(artifact) = report.artifact else {
        tracing::warn!("Nothing to package");
        return Ok(());
    };

    for function in &artifact.functions {
        tracing::info!("  ✓ {}", function);
    }
    tracing::info!(
        "Packaged {} function(s) into {} (fingerprint {}...)",
        artifact.functions.len(),
        artifact.root.display(),
        &artifact.fingerprint[..12]
    );
    for step in &artifact.next_steps {
        println!("{}", step);
    }

    Ok(())
}
