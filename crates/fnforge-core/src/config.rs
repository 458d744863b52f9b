//! Configuration parsing and validation
//!
//! This module handles loading and validating the `fnforge.yaml` build
//! configuration.
//!
//! # Example
//!
//! ```yaml
//! name: hello
//! program: program.yaml
//! binary: target/hello.jar
//! deployment:
//!   target: azure-functions
//!   native: false
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::diagnostic::{Diagnostic, DiagnosticKind};
use crate::error::{Error, Result};
use crate::source::{Location, Position};

/// Default configuration file name
pub const CONFIG_FILE: &str = "fnforge.yaml";

/// Root project configuration from `fnforge.yaml`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Project name
    pub name: String,

    /// Program model file, relative to the project root
    #[serde(default = "default_program")]
    pub program: String,

    /// Compiled program to package, relative to the project root
    #[serde(default)]
    pub binary: Option<String>,

    /// Build output root
    #[serde(default = "default_target_dir")]
    pub target_dir: String,

    /// Artifact directory under `target_dir`
    #[serde(default = "default_function_dir")]
    pub function_dir: String,

    /// Deployment settings
    #[serde(default)]
    pub deployment: DeploymentConfig,

    /// Host configuration settings
    #[serde(default)]
    pub host: HostConfig,
}

fn default_program() -> String {
    "program.yaml".to_string()
}

fn default_target_dir() -> String {
    "target".to_string()
}

fn default_function_dir() -> String {
    "azure_functions".to_string()
}

/// Deployment configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentConfig {
    /// Deployment target name
    #[serde(default = "default_target")]
    pub target: String,

    /// Request a native-image build of the binary
    #[serde(default)]
    pub native: bool,

    /// Container image used for native builds
    #[serde(default = "default_builder_image")]
    pub builder_image: String,

    /// Interpreter that runs non-native binaries
    #[serde(default = "default_launcher")]
    pub launcher: String,

    /// Arguments passed to the interpreter before the binary
    #[serde(default = "default_launcher_args")]
    pub launcher_args: Vec<String>,
}

impl Default for DeploymentConfig {
    fn default() -> Self {
        Self {
            target: default_target(),
            native: false,
            builder_image: default_builder_image(),
            launcher: default_launcher(),
            launcher_args: default_launcher_args(),
        }
    }
}

fn default_target() -> String {
    DeploymentTarget::AzureFunctions.as_str().to_string()
}

fn default_builder_image() -> String {
    "ghcr.io/graalvm/native-image-community:21".to_string()
}

fn default_launcher() -> String {
    "java".to_string()
}

fn default_launcher_args() -> Vec<String> {
    vec!["-jar".to_string()]
}

/// Host configuration (`host.json`) settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostConfig {
    /// Extension bundle id
    #[serde(default = "default_bundle_id")]
    pub extension_bundle_id: String,

    /// Extension bundle version range
    #[serde(default = "default_bundle_version")]
    pub extension_bundle_version: String,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            extension_bundle_id: default_bundle_id(),
            extension_bundle_version: default_bundle_version(),
        }
    }
}

fn default_bundle_id() -> String {
    "Microsoft.Azure.Functions.ExtensionBundle".to_string()
}

fn default_bundle_version() -> String {
    "[4.*, 5.0.0)".to_string()
}

/// Where the artifact is deployed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeploymentTarget {
    /// The cloud functions host
    AzureFunctions,
    /// The local functions host (core tools)
    AzureFunctionsLocal,
}

impl DeploymentTarget {
    /// Configuration value for this target
    pub fn as_str(&self) -> &'static str {
        match self {
            DeploymentTarget::AzureFunctions => "azure-functions",
            DeploymentTarget::AzureFunctionsLocal => "azure-functions-local",
        }
    }

    /// Whether artifacts are run on this machine
    pub fn is_local(&self) -> bool {
        matches!(self, DeploymentTarget::AzureFunctionsLocal)
    }
}

impl FromStr for DeploymentTarget {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "azure-functions" => Ok(DeploymentTarget::AzureFunctions),
            "azure-functions-local" => Ok(DeploymentTarget::AzureFunctionsLocal),
            other => Err(Error::ConfigInvalid {
                message: format!("unsupported deployment target '{}'", other),
            }),
        }
    }
}

impl fmt::Display for DeploymentTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Main configuration container
#[derive(Debug, Clone)]
pub struct Config {
    /// Project configuration
    pub project: ProjectConfig,

    /// Base path of the project
    pub base_path: PathBuf,

    /// Path of the loaded configuration file
    pub config_path: PathBuf,

    /// Raw configuration text, kept for diagnostic locations
    source: String,
}

impl Config {
    /// Load configuration from a directory or a `fnforge.yaml` file
    ///
    /// ```rust,ignore
    /// let config = Config::load("./my-project")?;
    /// println!("Project: {}", config.project.name);
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let (config_path, base_path) = if path.is_dir() {
            (path.join(CONFIG_FILE), path.to_path_buf())
        } else {
            (
                path.to_path_buf(),
                path.parent().unwrap_or(Path::new(".")).to_path_buf(),
            )
        };

        if !config_path.exists() {
            return Err(Error::ConfigNotFound {
                path: config_path.display().to_string(),
            });
        }

        let contents = std::fs::read_to_string(&config_path)?;
        let mut config = Self::from_yaml(&contents, base_path)?;
        config.config_path = config_path;
        tracing::debug!("Loaded configuration for project '{}'", config.project.name);
        Ok(config)
    }

    /// Parse configuration text with the given project root
    pub fn from_yaml(contents: &str, base_path: impl Into<PathBuf>) -> Result<Self> {
        let project: ProjectConfig = serde_yaml::from_str(contents)?;
        let base_path = base_path.into();
        Ok(Self {
            project,
            config_path: base_path.join(CONFIG_FILE),
            base_path,
            source: contents.to_string(),
        })
    }

    /// Absolute path of the program model
    pub fn program_path(&self) -> PathBuf {
        self.base_path.join(&self.project.program)
    }

    /// Absolute path of the compiled binary, if configured
    pub fn binary_path(&self) -> Option<PathBuf> {
        self.project.binary.as_ref().map(|b| self.base_path.join(b))
    }

    /// Build output root
    pub fn target_dir(&self) -> PathBuf {
        self.base_path.join(&self.project.target_dir)
    }

    /// Artifact directory
    pub fn function_dir(&self) -> PathBuf {
        self.target_dir().join(&self.project.function_dir)
    }

    /// Parsed deployment target
    pub fn deployment_target(&self) -> Result<DeploymentTarget> {
        self.project.deployment.target.parse()
    }

    /// Configuration diagnostics
    pub fn validate(&self) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        if self.deployment_target().is_err() {
            diagnostics.push(
                DiagnosticKind::UnsupportedDeploymentTarget {
                    target: self.project.deployment.target.clone(),
                }
                .at(self.key_location("target")),
            );
        }
        diagnostics
    }

    /// Location of the first `key:` in the configuration text
    fn key_location(&self, key: &str) -> Location {
        let document = self
            .config_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| CONFIG_FILE.to_string());
        let prefix = format!("{}:", key);
        let position = self
            .source
            .lines()
            .enumerate()
            .find_map(|(i, line)| {
                let trimmed = line.trim_start();
                trimmed.starts_with(&prefix).then(|| Position {
                    line: i as u32 + 1,
                    column: (line.len() - trimmed.len()) as u32 + 1,
                })
            })
            .unwrap_or_default();
        Location::new(document, position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_config() {
        let config: ProjectConfig = serde_yaml::from_str("name: hello\n").unwrap();
        assert_eq!(config.name, "hello");
        assert_eq!(config.program, "program.yaml");
        assert_eq!(config.target_dir, "target");
        assert_eq!(config.function_dir, "azure_functions");
        assert_eq!(config.deployment.target, "azure-functions");
        assert!(!config.deployment.native);
        assert_eq!(config.deployment.launcher_args, vec!["-jar"]);
        assert_eq!(config.host.extension_bundle_version, "[4.*, 5.0.0)");
    }

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
name: hello
program: model/program.yaml
binary: target/hello.jar
target_dir: out
function_dir: functions
deployment:
  target: azure-functions-local
  native: true
  builder_image: example/builder:1
host:
  extension_bundle_version: "[3.*, 4.0.0)"
"#;
        let config = Config::from_yaml(yaml, "/p").unwrap();
        assert_eq!(config.program_path(), PathBuf::from("/p/model/program.yaml"));
        assert_eq!(config.binary_path(), Some(PathBuf::from("/p/target/hello.jar")));
        assert_eq!(config.function_dir(), PathBuf::from("/p/out/functions"));
        assert_eq!(
            config.deployment_target().unwrap(),
            DeploymentTarget::AzureFunctionsLocal
        );
        assert!(config.project.deployment.native);
        assert_eq!(config.project.deployment.launcher, "java");
        assert!(config.validate().is_empty());
    }

    #[test]
    fn test_unsupported_target_diagnostic_location() {
        let yaml = "name: hello\ndeployment:\n  target: aws-lambda\n";
        let config = Config::from_yaml(yaml, ".").unwrap();
        let diagnostics = config.validate();
        assert_eq!(diagnostics.len(), 1);
        let d = &diagnostics[0];
        assert_eq!(d.code(), "FNF301");
        assert_eq!(d.location.document, "fnforge.yaml");
        assert_eq!(d.location.line, 3);
        assert_eq!(d.location.column, 3);
        assert!(d.message().contains("aws-lambda"));
    }

    #[test]
    fn test_target_round_trip() {
        for target in [
            DeploymentTarget::AzureFunctions,
            DeploymentTarget::AzureFunctionsLocal,
        ] {
            assert_eq!(target.as_str().parse::<DeploymentTarget>().unwrap(), target);
        }
        assert!("gcp".parse::<DeploymentTarget>().is_err());
    }

    #[test]
    fn test_missing_config() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(dir.path()).unwrap_err();
        assert!(matches!(err, Error::ConfigNotFound { .. }));
    }
}
