//! Artifact generation
//!
//! Writes the deployable directory:
//!
//! ```text
//! <target>/<function_dir>/
//! ├── <function>/function.json
//! ├── host.json
//! ├── local.settings.json
//! ├── .gitignore
//! ├── .vscode/extensions.json
//! └── <binary>
//! ```
//!
//! A pre-existing `local.settings.json` is restored verbatim and a
//! pre-existing `host.json` is kept as the base the generated host
//! configuration is merged over. Everything else is recreated on each run.
//! A non-empty directory holding neither file is never replaced.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value, json};
use sha2::{Digest, Sha256};

use fnforge_core::{DeploymentTarget, Diagnostics};

use crate::compiler::CompileOptions;
use crate::error::{Error, Result};
use crate::model::FunctionContext;
use crate::native::NativeBuilder;

/// Per-function descriptor file name
pub const DESCRIPTOR_FILE: &str = "function.json";

/// Shared host configuration file name
pub const HOST_FILE: &str = "host.json";

/// Local development settings file name
pub const LOCAL_SETTINGS_FILE: &str = "local.settings.json";

const GITIGNORE: &str = "bin\nobj\nlocal.settings.json\n.vscode/*\n!.vscode/extensions.json\n";

const EDITOR_EXTENSION: &str = "ms-azuretools.vscode-azurefunctions";

/// Generator progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactState {
    /// Nothing attempted yet
    Idle,
    /// Files are being written
    Generating,
    /// The artifact is complete
    Packaged,
    /// Generation was refused or failed
    Failed,
}

/// A completed artifact
#[derive(Debug, Clone)]
pub struct PackagedArtifact {
    /// Artifact directory
    pub root: PathBuf,

    /// Function names in write order
    pub functions: Vec<String>,

    /// File name of the packaged executable or program, if any
    pub executable: Option<String>,

    /// Whether the executable is a native image
    pub native: bool,

    /// SHA-256 over the descriptors and host configuration, hex encoded
    pub fingerprint: String,

    /// Instructions for deploying or running the artifact
    pub next_steps: Vec<String>,
}

/// Writes descriptors, host configuration and the packaged program
pub struct ArtifactGenerator<'o> {
    options: &'o CompileOptions,
    state: ArtifactState,
}

impl<'o> ArtifactGenerator<'o> {
    /// Create an idle generator
    pub fn new(options: &'o CompileOptions) -> Self {
        Self {
            options,
            state: ArtifactState::Idle,
        }
    }

    /// Current state
    pub fn state(&self) -> ArtifactState {
        self.state
    }

    /// Package the functions of a build.
    ///
    /// Refuses to touch the file system when `diagnostics` holds blocking
    /// errors. The native build runs before `host.json` is written, so the
    /// host configuration always names the executable actually packaged.
    /// When it fails the interpreted program is kept and the error returned.
    pub async fn generate(
        &mut self,
        functions: &[FunctionContext],
        diagnostics: &Diagnostics,
        builder: Option<&dyn NativeBuilder>,
    ) -> Result<PackagedArtifact> {
        if diagnostics.has_blocking_errors() {
            self.state = ArtifactState::Failed;
            return Err(Error::DiagnosticsPresent {
                count: diagnostics.blocking_count(),
            });
        }

        self.state = ArtifactState::Generating;
        match self.write(functions, builder).await {
            Ok(artifact) => {
                self.state = ArtifactState::Packaged;
                tracing::info!(
                    "Packaged {} function(s) into {}",
                    artifact.functions.len(),
                    artifact.root.display()
                );
                Ok(artifact)
            }
            Err(e) => {
                self.state = ArtifactState::Failed;
                Err(e)
            }
        }
    }

    async fn write(
        &self,
        functions: &[FunctionContext],
        builder: Option<&dyn NativeBuilder>,
    ) -> Result<PackagedArtifact> {
        let native_builder = self.native_builder(builder)?;
        let root = self.options.function_dir.clone();
        let cached_settings = read_optional(&root.join(LOCAL_SETTINGS_FILE))?;
        let cached_host = read_optional(&root.join(HOST_FILE))?;

        if root.exists() {
            if !is_replaceable(&root)? {
                return Err(Error::ForeignOutputDir {
                    path: root.display().to_string(),
                });
            }
            std::fs::remove_dir_all(&root)?;
        }
        std::fs::create_dir_all(&root)?;

        let mut hasher = Sha256::new();
        let mut names = Vec::with_capacity(functions.len());
        for function in functions {
            let dir = root.join(function.name());
            std::fs::create_dir_all(&dir)?;
            let contents = serde_json::to_string_pretty(&function.descriptor())?;
            write_file(&dir.join(DESCRIPTOR_FILE), &contents)?;
            hasher.update(contents.as_bytes());
            names.push(function.name().to_string());
        }

        let binary_name = self.copy_binary(&root)?;

        let mut native = false;
        let mut executable = binary_name.clone();
        let mut native_error = None;
        if let (Some(builder), Some(binary)) = (native_builder, binary_name.as_deref()) {
            let stem = executable_stem(binary);
            tracing::info!("Building native image with {}", builder.describe());
            match builder.build(&root, binary, &stem).await {
                Ok(_) => {
                    std::fs::remove_file(root.join(binary))?;
                    native = true;
                    executable = Some(stem);
                }
                Err(e) => {
                    tracing::warn!("Native build failed, keeping {}", binary);
                    native_error = Some(e);
                }
            }
        }

        let mut host = match cached_host.as_deref().map(serde_json::from_str::<Value>) {
            Some(Ok(existing @ Value::Object(_))) => existing,
            Some(_) => {
                tracing::warn!("Ignoring unreadable {}", HOST_FILE);
                Value::Object(Map::new())
            }
            None => Value::Object(Map::new()),
        };
        merge_json(&mut host, &self.host_config());
        host["customHandler"]["description"] = self.handler_description(binary_name.as_deref(), native);
        let host_contents = serde_json::to_string_pretty(&host)?;
        write_file(&root.join(HOST_FILE), &host_contents)?;
        hasher.update(host_contents.as_bytes());

        let settings = match cached_settings {
            Some(existing) => existing,
            None => serde_json::to_string_pretty(&self.default_local_settings())?,
        };
        write_file(&root.join(LOCAL_SETTINGS_FILE), &settings)?;
        write_file(&root.join(".gitignore"), GITIGNORE)?;
        let vscode = root.join(".vscode");
        std::fs::create_dir_all(&vscode)?;
        write_file(
            &vscode.join("extensions.json"),
            &serde_json::to_string_pretty(&json!({ "recommendations": [EDITOR_EXTENSION] }))?,
        )?;

        if let Some(e) = native_error {
            return Err(e);
        }

        Ok(PackagedArtifact {
            next_steps: self.next_steps(&root),
            root,
            functions: names,
            executable,
            native,
            fingerprint: hex::encode(hasher.finalize()),
        })
    }

    /// The builder to run, when native packaging is requested
    fn native_builder<'b>(
        &self,
        builder: Option<&'b dyn NativeBuilder>,
    ) -> Result<Option<&'b dyn NativeBuilder>> {
        if !self.options.native {
            return Ok(None);
        }
        if self.options.binary.is_none() {
            return Err(Error::NativeUnavailable("no binary is configured".to_string()));
        }
        match builder {
            Some(builder) => Ok(Some(builder)),
            None => Err(Error::NativeUnavailable("no native builder was given".to_string())),
        }
    }

    /// Copy the compiled program into the artifact; returns its file name
    fn copy_binary(&self, root: &Path) -> Result<Option<String>> {
        let Some(binary) = &self.options.binary else {
            return Ok(None);
        };
        if !binary.is_file() {
            return Err(Error::ArtifactNotFound {
                path: binary.display().to_string(),
            });
        }
        let name = binary
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| Error::ArtifactNotFound {
                path: binary.display().to_string(),
            })?;
        std::fs::copy(binary, root.join(&name))?;
        tracing::debug!("Copied {} into artifact", binary.display());
        Ok(Some(name))
    }

    /// Generated host configuration keys
    pub fn host_config(&self) -> Value {
        json!({
            "version": "2.0",
            "extensions": { "http": { "routePrefix": "" } },
            "customHandler": {
                "description": {},
                "enableForwardingHttpRequest": false
            },
            "extensionBundle": {
                "id": self.options.extension_bundle_id,
                "version": self.options.extension_bundle_version
            }
        })
    }

    /// How the host starts the program
    pub fn handler_description(&self, binary: Option<&str>, native: bool) -> Value {
        match binary {
            Some(binary) if native => json!({
                "defaultExecutablePath": executable_stem(binary),
                "arguments": []
            }),
            Some(binary) => json!({
                "defaultExecutablePath": self.options.launcher,
                "arguments": self.options.launcher_args,
                "defaultWorkerPath": binary
            }),
            None => json!({
                "defaultExecutablePath": self.options.launcher,
                "arguments": self.options.launcher_args
            }),
        }
    }

    /// `local.settings.json` written when none exists
    pub fn default_local_settings(&self) -> Value {
        let storage = match self.options.target {
            DeploymentTarget::AzureFunctionsLocal => "UseDevelopmentStorage=true",
            DeploymentTarget::AzureFunctions => "",
        };
        json!({
            "IsEncrypted": false,
            "Values": {
                "AzureWebJobsStorage": storage,
                "FUNCTIONS_WORKER_RUNTIME": "custom"
            }
        })
    }

    fn next_steps(&self, root: &Path) -> Vec<String> {
        let root = root.display();
        match self.options.target {
            DeploymentTarget::AzureFunctionsLocal => vec![
                "Run the functions locally with:".to_string(),
                format!("    func start --script-root {}", root),
            ],
            DeploymentTarget::AzureFunctions => vec![
                "Deploy the functions with:".to_string(),
                format!("    cd {}", root),
                "    func azure functionapp publish <function_app_name>".to_string(),
            ],
        }
    }
}

/// Recursively merge `overlay` into `base`; overlay values win, keys only
/// present in `base` are kept
pub fn merge_json(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(key) {
                    Some(existing) => merge_json(existing, value),
                    None => {
                        base.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base, overlay) => *base = overlay.clone(),
    }
}

fn executable_stem(binary: &str) -> String {
    Path::new(binary)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| binary.to_string())
}

/// Whether `root` may be wiped: empty, or holding host or local settings
fn is_replaceable(root: &Path) -> Result<bool> {
    if !root.is_dir() {
        return Ok(false);
    }
    if root.join(HOST_FILE).is_file() || root.join(LOCAL_SETTINGS_FILE).is_file() {
        return Ok(true);
    }
    Ok(std::fs::read_dir(root)?.next().is_none())
}

fn read_optional(path: &Path) -> Result<Option<String>> {
    if path.is_file() {
        Ok(Some(std::fs::read_to_string(path)?))
    } else {
        Ok(None)
    }
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    std::fs::write(path, contents)?;
    tracing::debug!("Wrote {}", path.display());
    Ok(())
}
