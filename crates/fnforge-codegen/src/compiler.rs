//! Build pipeline
//!
//! Runs extraction, classification and validation over a program model,
//! renders the shims and hands the functions to the artifact generator.
//! All phases share one [`BuildContext`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use fnforge_core::semantic::SemanticModel;
use fnforge_core::{
    Config, DeploymentTarget, Diagnostic, DiagnosticKind, DiagnosticSink, Diagnostics, Location,
};

use crate::artifact::{ArtifactGenerator, ArtifactState, PackagedArtifact};
use crate::classifier::Classifier;
use crate::error::Result;
use crate::extractor::extract;
use crate::model::{DocumentContext, FunctionContext};
use crate::native::NativeBuilder;
use crate::shim::render::ShimRenderer;

/// Directory under the target root that receives generated shims
pub const GENERATED_DIR: &str = "generated";

/// Options for the compiler
#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// Project name
    pub project: String,

    /// Build output root
    pub target_dir: PathBuf,

    /// Artifact directory
    pub function_dir: PathBuf,

    /// Compiled program to package
    pub binary: Option<PathBuf>,

    /// Deployment target
    pub target: DeploymentTarget,

    /// Whether to build a native image
    pub native: bool,

    /// Interpreter for non-native binaries
    pub launcher: String,

    /// Interpreter arguments placed before the binary
    pub launcher_args: Vec<String>,

    /// Extension bundle id written to `host.json`
    pub extension_bundle_id: String,

    /// Extension bundle version range written to `host.json`
    pub extension_bundle_version: String,

    /// Diagnostics found while reading the configuration
    pub config_diagnostics: Vec<Diagnostic>,
}

impl CompileOptions {
    /// Options from a loaded configuration. An unsupported deployment
    /// target falls back to the cloud target and is kept as a diagnostic.
    pub fn from_config(config: &Config) -> Self {
        let project = &config.project;
        Self {
            project: project.name.clone(),
            target_dir: config.target_dir(),
            function_dir: config.function_dir(),
            binary: config.binary_path(),
            target: config
                .deployment_target()
                .unwrap_or(DeploymentTarget::AzureFunctions),
            native: project.deployment.native,
            launcher: project.deployment.launcher.clone(),
            launcher_args: project.deployment.launcher_args.clone(),
            extension_bundle_id: project.host.extension_bundle_id.clone(),
            extension_bundle_version: project.host.extension_bundle_version.clone(),
            config_diagnostics: config.validate(),
        }
    }

    /// Write the artifact somewhere else
    pub fn with_function_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.function_dir = dir.into();
        self
    }

    /// Override the native packaging request
    pub fn with_native(mut self, native: bool) -> Self {
        self.native = native;
        self
    }

    /// Directory of the generated shim modules
    pub fn generated_dir(&self) -> PathBuf {
        self.target_dir.join(GENERATED_DIR)
    }
}

/// State shared by every phase of one build
#[derive(Debug, Default)]
pub struct BuildContext {
    /// Functions grouped by source document, in declaration order
    pub documents: IndexMap<String, DocumentContext>,

    /// Everything reported so far
    pub diagnostics: Diagnostics,

    names: HashMap<String, Location>,
}

impl BuildContext {
    /// Empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a classified function. A name already taken is reported on
    /// the later declaration and the function is dropped.
    pub fn add_function(&mut self, function: FunctionContext) {
        if let Some(first) = self.names.get(function.name()) {
            tracing::debug!("'{}' already declared at {}", function.name(), first);
            let diagnostic = DiagnosticKind::DuplicateFunctionName {
                name: function.name().to_string(),
            }
            .at(function.location().clone());
            self.report(diagnostic);
            return;
        }

        self.names
            .insert(function.name().to_string(), function.location().clone());
        self.documents
            .entry(function.document().to_string())
            .or_insert_with(|| DocumentContext::new(function.document()))
            .functions
            .push(function);
    }

    /// Every function in declaration order
    pub fn functions(&self) -> impl Iterator<Item = &FunctionContext> {
        self.documents.values().flat_map(|d| d.functions.iter())
    }

    /// Look up a function by name
    pub fn function(&self, name: &str) -> Option<&FunctionContext> {
        self.functions().find(|f| f.name() == name)
    }

    /// Number of functions
    pub fn function_count(&self) -> usize {
        self.names.len()
    }

    /// Whether an error diagnostic was reported
    pub fn has_errors(&self) -> bool {
        self.diagnostics.has_errors()
    }

    /// Whether a reported error prevents packaging. Classification errors
    /// only drop the handler they were reported on.
    pub fn has_blocking_errors(&self) -> bool {
        self.diagnostics.has_blocking_errors()
    }
}

impl DiagnosticSink for BuildContext {
    fn report(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.report(diagnostic);
    }
}

/// Outcome of a full build
#[derive(Debug)]
pub struct BuildReport {
    /// Functions and diagnostics
    pub context: BuildContext,

    /// Written shim sources
    pub shims: Vec<PathBuf>,

    /// Final generator state
    pub state: ArtifactState,

    /// The packaged artifact, when generation ran
    pub artifact: Option<PackagedArtifact>,
}

impl BuildReport {
    /// Whether an artifact was packaged
    pub fn is_success(&self) -> bool {
        self.state == ArtifactState::Packaged
    }
}

/// Drives the pipeline
pub struct Compiler {
    options: CompileOptions,
}

impl Compiler {
    /// Create a new compiler with the given options
    pub fn new(options: CompileOptions) -> Self {
        Self { options }
    }

    /// Compiler options
    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    /// Extract, classify and validate every handler of the program
    pub fn analyze(&self, model: &dyn SemanticModel) -> BuildContext {
        let mut context = BuildContext::new();
        context
            .diagnostics
            .extend(self.options.config_diagnostics.iter().cloned());

        if model.has_compilation_errors() {
            tracing::info!("Program has compilation errors, skipping analysis");
            for error in model.compilation_errors() {
                context.report(
                    DiagnosticKind::CompilationFailed {
                        message: error.message.clone(),
                    }
                    .at(error.location.clone()),
                );
            }
            return context;
        }

        tracing::info!("Extracting services");
        let extraction = extract(model);
        tracing::debug!(
            "Found {} service(s) with {} handler(s)",
            extraction.units.len(),
            extraction.handler_count()
        );
        context.diagnostics.extend(extraction.diagnostics);

        tracing::info!("Classifying bindings");
        let classifier = Classifier::new(model);
        for unit in &extraction.units {
            for function in classifier.classify(unit, &mut context) {
                context.add_function(function);
            }
        }

        if context.function_count() == 0 && !context.has_errors() {
            let document = model
                .program()
                .documents
                .first()
                .map(|d| d.name.clone())
                .unwrap_or_else(|| model.program().name.clone());
            context.report(DiagnosticKind::NoFunctionsFound.at(Location::document(document)));
        }

        tracing::info!(
            "Analyzed {} function(s), {} error(s)",
            context.function_count(),
            context.diagnostics.error_count()
        );
        context
    }

    /// Render and write one shim module per document plus `mod.rs`
    pub fn write_shims(&self, context: &BuildContext) -> Result<Vec<PathBuf>> {
        let dir = self.options.generated_dir();
        std::fs::create_dir_all(&dir)?;

        let renderer = ShimRenderer::new()?;
        let mut modules = Vec::with_capacity(context.documents.len());
        for document in context.documents.values() {
            modules.push(renderer.render(document)?);
        }

        let mut written = Vec::with_capacity(modules.len() + 1);
        for module in &modules {
            written.push(write_source(&dir, &module.file_name(), &module.source)?);
        }
        written.push(write_source(&dir, "mod.rs", &renderer.render_index(&modules)?)?);
        Ok(written)
    }

    /// Run the whole pipeline. Blocking error diagnostics leave the file
    /// system untouched and end in [`ArtifactState::Failed`]; only I/O and
    /// native build failures are returned as errors.
    pub async fn build(
        &self,
        model: &dyn SemanticModel,
        builder: Option<&dyn NativeBuilder>,
    ) -> Result<BuildReport> {
        let context = self.analyze(model);
        self.package(context, builder).await
    }

    /// Write shims and the artifact for an analyzed program
    pub async fn package(
        &self,
        context: BuildContext,
        builder: Option<&dyn NativeBuilder>,
    ) -> Result<BuildReport> {
        if context.has_blocking_errors() {
            tracing::info!(
                "Build failed with {} error(s)",
                context.diagnostics.blocking_count()
            );
            return Ok(BuildReport {
                context,
                shims: Vec::new(),
                state: ArtifactState::Failed,
                artifact: None,
            });
        }
        if context.function_count() == 0 {
            return Ok(BuildReport {
                context,
                shims: Vec::new(),
                state: ArtifactState::Idle,
                artifact: None,
            });
        }

        tracing::info!("Generating shims");
        let shims = self.write_shims(&context)?;

        tracing::info!("Packaging artifact");
        let functions: Vec<FunctionContext> = context.functions().cloned().collect();
        let mut generator = ArtifactGenerator::new(&self.options);
        let artifact = generator
            .generate(&functions, &context.diagnostics, builder)
            .await?;

        Ok(BuildReport {
            context,
            shims,
            state: generator.state(),
            artifact: Some(artifact),
        })
    }
}

fn write_source(dir: &Path, name: &str, source: &str) -> Result<PathBuf> {
    let path = dir.join(name);
    std::fs::write(&path, source)?;
    tracing::debug!("Wrote {}", path.display());
    Ok(path)
}
