//! Error types for fnforge-core

use thiserror::Error;

/// Result type alias for fnforge-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in fnforge-core
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file could not be found
    #[error("configuration file not found: {path}")]
    ConfigNotFound {
        /// Path that was searched
        path: String,
    },

    /// Failed to parse YAML configuration or program model
    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    /// Invalid configuration value
    #[error("invalid configuration: {message}")]
    ConfigInvalid {
        /// Description of what's invalid
        message: String,
    },

    /// Program model could not be found
    #[error("program model not found: {path}")]
    ProgramNotFound {
        /// Path that was searched
        path: String,
    },

    /// Program model is structurally invalid
    #[error("invalid program model at {location}: {message}")]
    InvalidProgram {
        /// Where the problem was found
        location: String,
        /// Description of the problem
        message: String,
    },

    /// Type expression could not be parsed
    #[error("invalid type expression '{input}' at offset {offset}: {message}")]
    TypeSyntax {
        /// The full type expression
        input: String,
        /// Byte offset of the problem
        offset: usize,
        /// Description of the problem
        message: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
