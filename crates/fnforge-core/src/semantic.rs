//! Semantic query interface
//!
//! The pipeline never inspects raw names directly: listener types and
//! annotation names are resolved to qualified `module:Name` form, and type
//! questions (is this serializable? is it structured?) go through
//! [`SemanticModel`]. [`ProgramModel`] answers them from a loaded
//! [`Program`].

use std::collections::HashMap;
use std::path::Path;

use crate::error::Result;
use crate::parser::Parser;
use crate::program::{CompilationError, ListenerRef, Program, RecordType, TypeDefinition};
use crate::types::TypeDesc;

/// Module that owns the listener, trigger and binding annotations
pub const FUNCTIONS_MODULE: &str = "azure_functions";

/// Module that owns the HTTP parameter annotations
pub const HTTP_MODULE: &str = "http";

/// Read-only symbol and type queries over a typed program
pub trait SemanticModel {
    /// The underlying program
    fn program(&self) -> &Program;

    /// Resolve `prefix:Name` through a document's imports to `module:Name`
    fn resolve_qualified(&self, document: &str, name: &str) -> String;

    /// Qualified type name of the listener a service is attached to
    fn listener_type(&self, document: &str, listener: &ListenerRef) -> Option<String>;

    /// Look up a named type definition
    fn type_definition(&self, name: &str) -> Option<&TypeDefinition>;

    /// Errors reported by the host compiler
    fn compilation_errors(&self) -> &[CompilationError] {
        &self.program().errors
    }

    /// Whether the host compilation already failed
    fn has_compilation_errors(&self) -> bool {
        !self.compilation_errors().is_empty()
    }

    /// Follow named aliases until a non-alias type is reached
    fn resolve_alias(&self, ty: &TypeDesc) -> TypeDesc {
        let mut current = ty.clone();
        let mut seen: Vec<String> = Vec::new();
        while let TypeDesc::Named(name) = &current {
            if seen.contains(name) {
                break;
            }
            match self.type_definition(name) {
                Some(TypeDefinition::Alias(inner)) => {
                    seen.push(name.clone());
                    current = inner.clone();
                }
                _ => break,
            }
        }
        current
    }

    /// The record definition behind a (possibly aliased) named type
    fn record_type(&self, ty: &TypeDesc) -> Option<&RecordType> {
        match self.resolve_alias(ty) {
            TypeDesc::Named(name) => match self.type_definition(&name) {
                Some(TypeDefinition::Record(record)) => Some(record),
                _ => None,
            },
            _ => None,
        }
    }

    /// Whether values of this type are plain serializable data
    fn is_anydata(&self, ty: &TypeDesc) -> bool {
        anydata_inner(self, ty, &mut Vec::new())
    }

    /// Whether this type is a structured (non-scalar) payload type
    fn is_structured(&self, ty: &TypeDesc) -> bool {
        structured_inner(self, ty, &mut Vec::new())
    }

    /// Whether this type is a basic scalar or an array of them, after
    /// alias resolution
    fn is_basic(&self, ty: &TypeDesc) -> bool {
        match self.resolve_alias(ty) {
            TypeDesc::Array(element) => self.resolve_alias(&element).is_basic_scalar(),
            other => other.is_basic_scalar(),
        }
    }
}

fn anydata_inner<M: SemanticModel + ?Sized>(model: &M, ty: &TypeDesc, seen: &mut Vec<String>) -> bool {
    match ty {
        TypeDesc::String
        | TypeDesc::Int
        | TypeDesc::Float
        | TypeDesc::Decimal
        | TypeDesc::Boolean
        | TypeDesc::Byte
        | TypeDesc::Json
        | TypeDesc::AnyData
        | TypeDesc::Xml
        | TypeDesc::Nil
        | TypeDesc::Readonly => true,
        TypeDesc::Any | TypeDesc::Error => false,
        TypeDesc::Array(inner) | TypeDesc::Map(inner) | TypeDesc::Table(inner) => {
            anydata_inner(model, inner, seen)
        }
        TypeDesc::Tuple(members) | TypeDesc::Union(members) => {
            members.iter().all(|m| anydata_inner(model, m, seen))
        }
        TypeDesc::Intersection(_) => match ty.effective() {
            Ok(reduced) => anydata_inner(model, &reduced, seen),
            Err(_) => false,
        },
        TypeDesc::Named(name) => {
            if seen.contains(name) {
                return true;
            }
            seen.push(name.clone());
            match model.type_definition(name) {
                Some(TypeDefinition::Record(record)) => {
                    let fields = record.fields.values().all(|f| anydata_inner(model, f, seen));
                    let rest = record
                        .rest
                        .as_ref()
                        .is_none_or(|r| anydata_inner(model, r, seen));
                    fields && rest
                }
                Some(TypeDefinition::Alias(inner)) => anydata_inner(model, inner, seen),
                Some(TypeDefinition::Object) | None => false,
            }
        }
    }
}

fn structured_inner<M: SemanticModel + ?Sized>(
    model: &M,
    ty: &TypeDesc,
    seen: &mut Vec<String>,
) -> bool {
    match ty {
        TypeDesc::Map(_)
        | TypeDesc::Table(_)
        | TypeDesc::Tuple(_)
        | TypeDesc::Xml
        | TypeDesc::Json
        | TypeDesc::AnyData => true,
        TypeDesc::Array(element) => {
            **element == TypeDesc::Byte || structured_inner(model, element, seen)
        }
        TypeDesc::Intersection(_) => match ty.effective() {
            Ok(reduced) => structured_inner(model, &reduced, seen),
            Err(_) => false,
        },
        TypeDesc::Named(name) => {
            if seen.contains(name) {
                return false;
            }
            seen.push(name.clone());
            match model.type_definition(name) {
                Some(TypeDefinition::Record(_)) => true,
                Some(TypeDefinition::Alias(inner)) => structured_inner(model, inner, seen),
                Some(TypeDefinition::Object) | None => false,
            }
        }
        _ => false,
    }
}

/// [`SemanticModel`] backed by a loaded [`Program`]
#[derive(Debug, Clone)]
pub struct ProgramModel {
    program: Program,
    /// (document, listener variable) → listener type as written
    listeners: HashMap<(String, String), String>,
}

impl ProgramModel {
    /// Index a program for queries
    pub fn new(program: Program) -> Self {
        let listeners = program
            .documents
            .iter()
            .flat_map(|doc| {
                doc.listeners
                    .iter()
                    .map(move |l| ((doc.name.clone(), l.name.clone()), l.type_name.clone()))
            })
            .collect();
        Self { program, listeners }
    }

    /// Load and index a program model file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let base = path.parent().unwrap_or(Path::new("."));
        let program = Parser::new(base).parse_file(path.file_name().map(Path::new).unwrap_or(path))?;
        Ok(Self::new(program))
    }

    /// Consume the model, returning the program
    pub fn into_program(self) -> Program {
        self.program
    }
}

impl SemanticModel for ProgramModel {
    fn program(&self) -> &Program {
        &self.program
    }

    fn resolve_qualified(&self, document: &str, name: &str) -> String {
        let Some((prefix, local)) = name.split_once(':') else {
            return name.to_string();
        };
        let module = self
            .program
            .documents
            .iter()
            .find(|d| d.name == document)
            .and_then(|d| d.imports.get(prefix));
        match module {
            Some(module) => format!("{}:{}", module, local),
            None => name.to_string(),
        }
    }

    fn listener_type(&self, document: &str, listener: &ListenerRef) -> Option<String> {
        let written = match listener {
            ListenerRef::Variable(var) => self
                .listeners
                .get(&(document.to_string(), var.clone()))?
                .clone(),
            ListenerRef::Inline(ty) => ty.clone(),
        };
        Some(self.resolve_qualified(document, &written))
    }

    fn type_definition(&self, name: &str) -> Option<&TypeDefinition> {
        self.program.types.get(name).or_else(|| {
            name.split_once(':')
                .and_then(|(_, local)| self.program.types.get(local))
        })
    }
}
