//! fnforge Core Library
//!
//! This crate provides the read-only inputs of the fnforge pipeline:
//! - Build configuration parsing and validation
//! - The typed program model (documents, services, handlers, types)
//! - The semantic query interface over that model
//! - Structured diagnostics
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   Program   │────▶│  Semantic   │────▶│ Diagnostics │
//! │   (YAML)    │     │   Model     │     │    Sink     │
//! └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use fnforge_core::{Config, ProgramModel};
//!
//! let config = Config::load("./fnforge.yaml")?;
//! let model = ProgramModel::load(config.program_path())?;
//! for document in &model.program().documents {
//!     println!("Document: {}", document.name);
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod diagnostic;
pub mod error;
pub mod parser;
pub mod program;
pub mod semantic;
pub mod source;
pub mod types;

pub use config::{Config, DeploymentTarget, ProjectConfig};
pub use diagnostic::{Diagnostic, DiagnosticKind, DiagnosticSink, Diagnostics, Severity};
pub use error::{Error, Result};
pub use program::Program;
pub use semantic::{ProgramModel, SemanticModel};
pub use source::Location;
pub use types::TypeDesc;
