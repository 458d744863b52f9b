//! Typed program model
//!
//! The read-only typed AST consumed by the pipeline: documents containing
//! listener declarations and services, services containing handler
//! functions, and the named type definitions they refer to.

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::source::Location;
use crate::types::TypeDesc;

/// A whole program: every source document plus shared type definitions
#[derive(Debug, Clone, Default)]
pub struct Program {
    /// Program (package) name
    pub name: String,

    /// Source documents in declaration order
    pub documents: Vec<Document>,

    /// Named type definitions
    pub types: IndexMap<String, TypeDefinition>,

    /// Errors already reported by the host compiler
    pub errors: Vec<CompilationError>,
}

/// One source document
#[derive(Debug, Clone, Default)]
pub struct Document {
    /// Document name (used in locations and generated file names)
    pub name: String,

    /// Import prefix → module name
    pub imports: IndexMap<String, String>,

    /// Module-level listener declarations
    pub listeners: Vec<ListenerDecl>,

    /// Service declarations in declaration order
    pub services: Vec<ServiceDecl>,

    /// Module-level functions (never handlers)
    pub functions: Vec<FunctionDecl>,
}

/// `listener <type> <name>`
#[derive(Debug, Clone)]
pub struct ListenerDecl {
    /// Variable name
    pub name: String,

    /// Listener type as written (`prefix:Name`)
    pub type_name: String,

    /// Declaration location
    pub location: Location,
}

/// How a service refers to its listener
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenerRef {
    /// A module-level listener variable
    Variable(String),
    /// An inline `new <type>()` expression
    Inline(String),
}

/// A service attached to a listener
#[derive(Debug, Clone)]
pub struct ServiceDecl {
    /// Attach-point string literal (non-HTTP services)
    pub name: Option<String>,

    /// Absolute attach path split into segments (HTTP services)
    pub base_path: Vec<String>,

    /// Listener the service is attached to
    pub listener: ListenerRef,

    /// Service-level annotations (trigger configuration)
    pub annotations: Vec<Annotation>,

    /// Member functions in declaration order
    pub functions: Vec<FunctionDecl>,

    /// Declaration location
    pub location: Location,
}

/// Function qualifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Qualifier {
    /// `resource function`
    Resource,
    /// `remote function`
    Remote,
    /// Plain (non-exported) function
    Plain,
}

/// A function or service member
#[derive(Debug, Clone)]
pub struct FunctionDecl {
    /// Function symbol name
    pub name: String,

    /// Qualifier
    pub qualifier: Qualifier,

    /// Resource accessor (`get`, `post`, `default`, ...)
    pub accessor: Option<String>,

    /// Relative resource path
    pub path: Vec<PathSegment>,

    /// Parameters in declaration order
    pub params: Vec<Param>,

    /// Return type and its annotations
    pub returns: ReturnDecl,

    /// Declaration location
    pub location: Location,
}

/// One segment of a resource path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    /// A static segment
    Literal(String),
    /// A path parameter; the name may be absent or non-identifier
    Param {
        /// Parameter name, when it has one
        name: Option<String>,
        /// Declared type
        ty: TypeDesc,
    },
    /// A rest path parameter capturing the remaining segments
    Rest {
        /// Parameter name
        name: String,
        /// Element type
        ty: TypeDesc,
    },
}

/// Parameter kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// Plain required parameter
    Required,
    /// Parameter with a default value
    Defaultable,
    /// Rest parameter
    Rest,
}

impl ParamKind {
    /// Source-level name of the kind
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamKind::Required => "required",
            ParamKind::Defaultable => "defaultable",
            ParamKind::Rest => "rest",
        }
    }
}

/// A function parameter
#[derive(Debug, Clone)]
pub struct Param {
    /// Parameter name
    pub name: String,

    /// Parameter kind
    pub kind: ParamKind,

    /// Declared type
    pub ty: TypeDesc,

    /// Parameter annotations
    pub annotations: Vec<Annotation>,

    /// Declaration location
    pub location: Location,
}

/// Return type descriptor
#[derive(Debug, Clone)]
pub struct ReturnDecl {
    /// Declared return type (`()` when absent)
    pub ty: TypeDesc,

    /// Return-type annotations
    pub annotations: Vec<Annotation>,

    /// Location of the return type
    pub location: Location,
}

/// An annotation attachment
#[derive(Debug, Clone)]
pub struct Annotation {
    /// Annotation name as written (`prefix:Name`)
    pub name: String,

    /// Field values in source order
    pub fields: IndexMap<String, AnnotationValue>,

    /// Attachment location
    pub location: Location,
}

/// The literal text of an annotation field value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnnotationValue {
    /// A single literal (string, numeric or boolean text)
    Literal(String),
    /// A list of literals
    List(Vec<String>),
}

impl AnnotationValue {
    /// The value as one string; lists are joined with commas
    pub fn joined(&self) -> String {
        match self {
            AnnotationValue::Literal(s) => s.clone(),
            AnnotationValue::List(items) => items.join(","),
        }
    }
}

impl Annotation {
    /// Look up a field by name
    pub fn field(&self, name: &str) -> Option<&AnnotationValue> {
        self.fields.get(name)
    }
}

/// A named type definition
#[derive(Debug, Clone, PartialEq)]
pub enum TypeDefinition {
    /// A record type
    Record(RecordType),
    /// An object or class type (never serializable)
    Object,
    /// An alias of another type expression
    Alias(TypeDesc),
}

/// Record type fields
#[derive(Debug, Clone, PartialEq)]
pub struct RecordType {
    /// Fields in declaration order
    pub fields: IndexMap<String, TypeDesc>,

    /// Rest field type; `None` for a closed record
    pub rest: Option<TypeDesc>,
}

/// An error reported by the host compiler
#[derive(Debug, Clone)]
pub struct CompilationError {
    /// Error message
    pub message: String,

    /// Where it was reported
    pub location: Location,
}

impl Program {
    /// Create an empty program
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Total number of services across all documents
    pub fn service_count(&self) -> usize {
        self.documents.iter().map(|d| d.services.len()).sum()
    }
}

impl ServiceDecl {
    /// The attach path joined with `/`, without a leading slash
    pub fn joined_path(&self) -> String {
        self.base_path.join("/")
    }
}

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern"));

/// Whether `name` is a plain identifier usable as a route placeholder
pub fn is_identifier(name: &str) -> bool {
    IDENTIFIER.is_match(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier() {
        assert!(is_identifier("bar"));
        assert!(is_identifier("_id2"));
        assert!(!is_identifier("2nd"));
        assert!(!is_identifier("a-b"));
        assert!(!is_identifier(""));
    }

    #[test]
    fn test_program_new() {
        let program = Program::new("hello");
        assert_eq!(program.name, "hello");
        assert!(program.documents.is_empty());
        assert_eq!(program.service_count(), 0);
    }

    #[test]
    fn test_annotation_value_joined() {
        let value = AnnotationValue::List(vec!["East US".into(), "West US".into()]);
        assert_eq!(value.joined(), "East US,West US");
        assert_eq!(AnnotationValue::Literal("x".into()).joined(), "x");
    }

    #[test]
    fn test_param_kind_names() {
        assert_eq!(ParamKind::Required.as_str(), "required");
        assert_eq!(ParamKind::Rest.as_str(), "rest");
    }
}
