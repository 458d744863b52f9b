//! Native image packaging
//!
//! Converts the packaged program into a native executable by running an
//! external image builder, either inside a container (`docker run`) or with
//! a locally installed `native-image`. The build runs to completion with no
//! timeout; its combined output is returned on failure.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;

use fnforge_core::{Config, DeploymentTarget};

use crate::error::{Error, Result};

/// Mount point of the artifact directory inside the build container
const CONTAINER_WORKDIR: &str = "/app/build";

/// Builds a native executable next to the packaged binary
#[async_trait]
pub trait NativeBuilder: Send + Sync {
    /// Short description for logs
    fn describe(&self) -> String;

    /// Build `<dir>/<output>` from `<dir>/<binary>` and return its path
    async fn build(&self, dir: &Path, binary: &str, output: &str) -> Result<PathBuf>;
}

/// Runs the image builder inside a container
#[derive(Debug, Clone)]
pub struct ContainerBuilder {
    program: String,
    image: String,
}

impl ContainerBuilder {
    /// Builder using `docker` and the given image
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            program: "docker".to_string(),
            image: image.into(),
        }
    }

    /// Use a different container CLI
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Command-line arguments for one build
    pub fn args(&self, dir: &Path, binary: &str, output: &str) -> Vec<String> {
        vec![
            "run".to_string(),
            "--rm".to_string(),
            "--platform".to_string(),
            "linux/amd64".to_string(),
            "-v".to_string(),
            format!("{}:{}", dir.display(), CONTAINER_WORKDIR),
            "-w".to_string(),
            CONTAINER_WORKDIR.to_string(),
            self.image.clone(),
            "-jar".to_string(),
            binary.to_string(),
            "-o".to_string(),
            output.to_string(),
            "--no-fallback".to_string(),
        ]
    }
}

#[async_trait]
impl NativeBuilder for ContainerBuilder {
    fn describe(&self) -> String {
        format!("{} ({})", self.program, self.image)
    }

    async fn build(&self, dir: &Path, binary: &str, output: &str) -> Result<PathBuf> {
        let args = self.args(dir, binary, output);
        run(&self.program, &args, dir, output).await
    }
}

/// Runs a locally installed `native-image`
#[derive(Debug, Clone)]
pub struct LocalBuilder {
    program: String,
}

impl LocalBuilder {
    /// Builder using `native-image` from PATH
    pub fn new() -> Self {
        Self {
            program: "native-image".to_string(),
        }
    }

    /// Use a different executable
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Command-line arguments for one build
    pub fn args(&self, binary: &str, output: &str) -> Vec<String> {
        vec![
            "-jar".to_string(),
            binary.to_string(),
            "-o".to_string(),
            output.to_string(),
            "--no-fallback".to_string(),
        ]
    }
}

impl Default for LocalBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NativeBuilder for LocalBuilder {
    fn describe(&self) -> String {
        self.program.clone()
    }

    async fn build(&self, dir: &Path, binary: &str, output: &str) -> Result<PathBuf> {
        let args = self.args(binary, output);
        run(&self.program, &args, dir, output).await
    }
}

/// The builder matching a configuration's deployment target
pub fn builder_for(config: &Config) -> Result<Box<dyn NativeBuilder>> {
    let builder: Box<dyn NativeBuilder> = match config.deployment_target()? {
        DeploymentTarget::AzureFunctions => Box::new(ContainerBuilder::new(
            config.project.deployment.builder_image.clone(),
        )),
        DeploymentTarget::AzureFunctionsLocal => Box::new(LocalBuilder::new()),
    };
    Ok(builder)
}

async fn run(program: &str, args: &[String], dir: &Path, output: &str) -> Result<PathBuf> {
    tracing::info!("Running native build: {} {}", program, args.join(" "));

    let result = Command::new(program)
        .current_dir(dir)
        .args(args)
        .output()
        .await
        .map_err(|e| Error::ToolchainError {
            message: format!("Failed to run {}: {}", program, e),
        })?;

    if !result.status.success() {
        let mut captured = String::from_utf8_lossy(&result.stdout).into_owned();
        captured.push_str(&String::from_utf8_lossy(&result.stderr));
        return Err(Error::NativeBuildFailed {
            status: result.status.to_string(),
            output: captured,
        });
    }

    let executable = dir.join(output);
    if !executable.exists() {
        return Err(Error::ArtifactNotFound {
            path: executable.display().to_string(),
        });
    }
    tracing::debug!("Native executable: {}", executable.display());
    Ok(executable)
}
