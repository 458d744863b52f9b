//! CLI command implementations

use anyhow::{Context, Result};
use fnforge_codegen::{BuildContext, CompileOptions, Compiler};
use fnforge_core::{Config, Diagnostics, ProgramModel};

pub mod build;
pub mod functions;
pub mod init;
pub mod validate;

/// A loaded project: configuration and program model
pub struct Project {
    pub config: Config,
    pub model: ProgramModel,
}

impl Project {
    /// Load the configuration and the program model it points at
    pub fn load(config_path: &str) -> Result<Self> {
        tracing::info!("Loading configuration from {}", config_path);
        let config = Config::load(config_path).context("Failed to load configuration")?;

        let program_path = config.program_path();
        let model = ProgramModel::load(&program_path)
            .with_context(|| format!("Failed to load program model {}", program_path.display()))?;

        Ok(Self { config, model })
    }

    /// Compiler for this project's configuration
    pub fn compiler(&self, options: impl FnOnce(CompileOptions) -> CompileOptions) -> Compiler {
        Compiler::new(options(CompileOptions::from_config(&self.config)))
    }

    /// Run analysis only
    pub fn analyze(&self) -> BuildContext {
        self.compiler(|o| o).analyze(&self.model)
    }
}

/// Print every diagnostic to stderr
pub fn print_diagnostics(diagnostics: &Diagnostics) {
    for diagnostic in diagnostics.iter() {
        eprintln!("{}", diagnostic);
    }
}

/// Fail with the error count when analysis reported errors
pub fn ensure_no_errors(diagnostics: &Diagnostics) -> Result<()> {
    if diagnostics.has_errors() {
        anyhow::bail!("{} error(s) found", diagnostics.error_count());
    }
    Ok(())
}
