//! Error types for code generation and packaging

use thiserror::Error;

/// Result type for codegen operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during generation and packaging
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to load configuration or the program model
    #[error(transparent)]
    Core(#[from] fnforge_core::Error),

    /// Generation was refused because error diagnostics were reported
    #[error("{count} error(s) reported, no artifact generated")]
    DiagnosticsPresent {
        /// Number of error diagnostics
        count: usize,
    },

    /// Failed to generate shim code
    #[error("code generation failed: {0}")]
    GenerationError(String),

    /// The external native build exited unsuccessfully
    #[error("native build failed ({status})\n{output}")]
    NativeBuildFailed {
        /// Exit status of the build process
        status: String,
        /// Captured stdout and stderr
        output: String,
    },

    /// The native build tool could not be started
    #[error("native toolchain error: {message}. Ensure docker (or native-image for local builds) is installed and on PATH.")]
    ToolchainError {
        /// Error message
        message: String,
    },

    /// Native packaging was requested without a program to compile
    #[error("native packaging requested but {0}")]
    NativeUnavailable(String),

    /// The artifact directory holds files that were not generated by a build
    #[error("refusing to replace {path}: not a functions artifact")]
    ForeignOutputDir {
        /// Artifact directory
        path: String,
    },

    /// An expected input or build output is missing
    #[error("artifact not found: {path}")]
    ArtifactNotFound {
        /// Path to missing artifact
        path: String,
    },

    /// Invalid shim template
    #[error("invalid template: {0}")]
    InvalidTemplate(#[from] minijinja::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
