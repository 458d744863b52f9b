//! fnforge Code Generation
//!
//! This crate turns a typed program model into a deployable functions
//! artifact.
//!
//! # Pipeline Overview
//!
//! ```text
//! ┌─────────┐   ┌──────────┐   ┌──────────┐   ┌─────────┐   ┌──────────┐
//! │ Program │──▶│ Extract  │──▶│ Classify │──▶│  Shims  │──▶│ Artifact │
//! │ (AST)   │   │ services │   │ bindings │   │ (Rust)  │   │ (JSON)   │
//! └─────────┘   └──────────┘   └──────────┘   └─────────┘   └──────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use fnforge_codegen::{CompileOptions, Compiler};
//!
//! let compiler = Compiler::new(CompileOptions::from_config(&config));
//! let report = compiler.build(&model, &builder).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod artifact;
pub mod classifier;
pub mod compiler;
pub mod error;
pub mod extractor;
pub mod model;
pub mod native;
pub mod payload;
pub mod registry;
pub mod shim;

pub use artifact::{ArtifactGenerator, ArtifactState, PackagedArtifact};
pub use compiler::{BuildContext, BuildReport, CompileOptions, Compiler};
pub use error::{Error, Result};
pub use model::{Binding, BindingKind, Direction, DocumentContext, FunctionContext};
pub use native::{ContainerBuilder, LocalBuilder, NativeBuilder};
