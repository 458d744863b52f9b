//! YAML to program model parser
//!
//! Parses a program model YAML file into the typed AST in [`crate::program`].

use indexmap::IndexMap;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::program::*;
use crate::source::{Location, Position};
use crate::types::TypeDesc;

/// Parser for program model files
pub struct Parser {
    /// Base path for resolving relative program paths
    base_path: PathBuf,
}

impl Parser {
    /// Create a new parser with the given base path
    pub fn new(base_path: impl AsRef<Path>) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
        }
    }

    /// Parse a program model file into the typed AST
    pub fn parse_file(&self, path: impl AsRef<Path>) -> Result<Program> {
        let path = path.as_ref();
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_path.join(path)
        };
        if !path.exists() {
            return Err(Error::ProgramNotFound {
                path: path.display().to_string(),
            });
        }
        tracing::debug!("Parsing program model: {}", path.display());
        let content = std::fs::read_to_string(&path)?;
        self.parse_yaml(&content)
    }

    /// Parse YAML string into the typed AST
    pub fn parse_yaml(&self, yaml: &str) -> Result<Program> {
        let raw: RawProgram = serde_yaml::from_str(yaml)?;
        self.convert_program(raw)
    }

    fn convert_program(&self, raw: RawProgram) -> Result<Program> {
        let mut program = Program::new(raw.name);

        for (name, raw_def) in raw.types {
            let def = convert_type_definition(&name, raw_def)?;
            program.types.insert(name, def);
        }

        for raw_error in raw.errors {
            let position = raw_error.position();
            program.errors.push(CompilationError {
                message: raw_error.message,
                location: Location::new(raw_error.document, position),
            });
        }

        for raw_doc in raw.documents {
            program.documents.push(self.convert_document(raw_doc)?);
        }

        Ok(program)
    }

    fn convert_document(&self, raw: RawDocument) -> Result<Document> {
        let doc_name = raw.name;
        let at = |line: u32, column: u32| Location::new(&doc_name, Position { line, column });

        let listeners = raw
            .listeners
            .into_iter()
            .map(|l| ListenerDecl {
                location: at(l.line, l.column),
                name: l.name,
                type_name: l.type_name,
            })
            .collect();

        let mut services = Vec::new();
        for raw_service in raw.services {
            let location = at(raw_service.line, raw_service.column);
            let listener = match (raw_service.listener, raw_service.listener_type) {
                (Some(var), None) => ListenerRef::Variable(var),
                (None, Some(ty)) => ListenerRef::Inline(ty),
                _ => {
                    return Err(Error::InvalidProgram {
                        location: location.to_string(),
                        message: "service needs exactly one of 'listener' or 'listener_type'"
                            .to_string(),
                    });
                }
            };

            let mut functions = Vec::new();
            for raw_fn in raw_service.functions {
                functions.push(convert_function(&doc_name, raw_fn, Qualifier::Remote)?);
            }

            services.push(ServiceDecl {
                name: raw_service.name,
                base_path: split_path(raw_service.path.as_deref().unwrap_or("")),
                listener,
                annotations: convert_annotations(&doc_name, raw_service.annotations)?,
                functions,
                location,
            });
        }

        let mut functions = Vec::new();
        for raw_fn in raw.functions {
            functions.push(convert_function(&doc_name, raw_fn, Qualifier::Plain)?);
        }

        Ok(Document {
            name: doc_name,
            imports: raw.imports,
            listeners,
            services,
            functions,
        })
    }
}

fn split_path(path: &str) -> Vec<String> {
    path.split('/')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_type(text: &str, location: &Location) -> Result<TypeDesc> {
    text.parse().map_err(|e| match e {
        Error::TypeSyntax {
            input,
            offset,
            message,
        } => Error::InvalidProgram {
            location: location.to_string(),
            message: format!("type '{}' (offset {}): {}", input, offset, message),
        },
        other => other,
    })
}

fn convert_type_definition(name: &str, raw: RawTypeDefinition) -> Result<TypeDefinition> {
    let location = Location::new(format!("type {}", name), Position::default());
    match raw {
        RawTypeDefinition::Record { record } => {
            let mut fields = IndexMap::new();
            for (field, ty) in record.fields {
                fields.insert(field, parse_type(&ty, &location)?);
            }
            let rest = record
                .rest
                .map(|r| parse_type(&r, &location))
                .transpose()?;
            Ok(TypeDefinition::Record(RecordType { fields, rest }))
        }
        RawTypeDefinition::Alias { alias } => {
            Ok(TypeDefinition::Alias(parse_type(&alias, &location)?))
        }
        RawTypeDefinition::Kind(kind) if kind == "object" => Ok(TypeDefinition::Object),
        RawTypeDefinition::Kind(kind) => Err(Error::InvalidProgram {
            location: location.to_string(),
            message: format!("unknown type definition kind '{}'", kind),
        }),
    }
}

fn convert_function(doc: &str, raw: RawFunction, default: Qualifier) -> Result<FunctionDecl> {
    let location = Location::new(doc, Position {
        line: raw.line,
        column: raw.column,
    });

    let qualifier = match raw.qualifier.as_deref() {
        Some("resource") => Qualifier::Resource,
        Some("remote") => Qualifier::Remote,
        Some("plain") => Qualifier::Plain,
        Some(other) => {
            return Err(Error::InvalidProgram {
                location: location.to_string(),
                message: format!("unknown function qualifier '{}'", other),
            });
        }
        None if raw.accessor.is_some() => Qualifier::Resource,
        None => default,
    };

    let mut path = Vec::new();
    for segment in raw.path {
        path.push(convert_path_segment(segment, &location)?);
    }

    let name = match raw.name {
        Some(name) => name,
        None => default_function_name(raw.accessor.as_deref(), &path).ok_or_else(|| {
            Error::InvalidProgram {
                location: location.to_string(),
                message: "function needs a 'name' or an 'accessor'".to_string(),
            }
        })?,
    };

    let mut params = Vec::new();
    for raw_param in raw.params {
        let param_location = Location::new(doc, Position {
            line: raw_param.line,
            column: raw_param.column,
        });
        let kind = match raw_param.kind.as_deref() {
            None | Some("required") => ParamKind::Required,
            Some("defaultable") => ParamKind::Defaultable,
            Some("rest") => ParamKind::Rest,
            Some(other) => {
                return Err(Error::InvalidProgram {
                    location: param_location.to_string(),
                    message: format!("unknown parameter kind '{}'", other),
                });
            }
        };
        params.push(Param {
            ty: parse_type(&raw_param.ty, &param_location)?,
            name: raw_param.name,
            kind,
            annotations: convert_annotations(doc, raw_param.annotations)?,
            location: param_location,
        });
    }

    let returns = match raw.returns {
        Some(r) => {
            let return_location = Location::new(doc, Position {
                line: r.line,
                column: r.column,
            });
            ReturnDecl {
                ty: match r.ty {
                    Some(ty) => parse_type(&ty, &return_location)?,
                    None => TypeDesc::Nil,
                },
                annotations: convert_annotations(doc, r.annotations)?,
                location: return_location,
            }
        }
        None => ReturnDecl {
            ty: TypeDesc::Nil,
            annotations: Vec::new(),
            location: location.clone(),
        },
    };

    Ok(FunctionDecl {
        name,
        qualifier,
        accessor: raw.accessor,
        path,
        params,
        returns,
        location,
    })
}

fn default_function_name(accessor: Option<&str>, path: &[PathSegment]) -> Option<String> {
    let accessor = accessor?;
    let mut parts = vec![accessor.to_string()];
    parts.extend(path.iter().filter_map(|s| match s {
        PathSegment::Literal(l) => Some(l.replace(|c: char| !c.is_ascii_alphanumeric(), "_")),
        _ => None,
    }));
    Some(parts.join("_"))
}

fn convert_path_segment(raw: RawPathSegment, location: &Location) -> Result<PathSegment> {
    match raw {
        RawPathSegment::Text(text) => {
            match text.strip_prefix('{').and_then(|t| t.strip_suffix('}')) {
                Some(name) if !name.is_empty() => Ok(PathSegment::Param {
                    name: Some(name.to_string()),
                    ty: TypeDesc::String,
                }),
                Some(_) => Err(Error::InvalidProgram {
                    location: location.to_string(),
                    message: "empty path parameter '{}'".to_string(),
                }),
                None => Ok(PathSegment::Literal(text)),
            }
        }
        RawPathSegment::Rest { rest, ty } => Ok(PathSegment::Rest {
            name: rest,
            ty: match ty {
                Some(t) => parse_type(&t, location)?,
                None => TypeDesc::String,
            },
        }),
        RawPathSegment::Param { param, ty } => Ok(PathSegment::Param {
            name: param,
            ty: match ty {
                Some(t) => parse_type(&t, location)?,
                None => TypeDesc::String,
            },
        }),
    }
}

fn convert_annotations(doc: &str, raw: Vec<RawAnnotation>) -> Result<Vec<Annotation>> {
    raw.into_iter()
        .map(|a| {
            let location = Location::new(doc, Position {
                line: a.line,
                column: a.column,
            });
            let mut fields = IndexMap::new();
            for (key, value) in a.fields {
                if let Some(v) = convert_annotation_value(value, &location)? {
                    fields.insert(key, v);
                }
            }
            Ok(Annotation {
                name: a.name,
                fields,
                location,
            })
        })
        .collect()
}

fn scalar_text(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn convert_annotation_value(
    value: serde_yaml::Value,
    location: &Location,
) -> Result<Option<AnnotationValue>> {
    match value {
        serde_yaml::Value::Null => Ok(None),
        serde_yaml::Value::Sequence(items) => items
            .iter()
            .map(|item| {
                scalar_text(item).ok_or_else(|| Error::InvalidProgram {
                    location: location.to_string(),
                    message: "annotation list items must be literals".to_string(),
                })
            })
            .collect::<Result<Vec<_>>>()
            .map(|items| Some(AnnotationValue::List(items))),
        other => scalar_text(&other)
            .map(|text| Some(AnnotationValue::Literal(text)))
            .ok_or_else(|| Error::InvalidProgram {
                location: location.to_string(),
                message: "annotation field values must be literals or lists".to_string(),
            }),
    }
}

// ============================================================================
// Raw YAML structures (for serde deserialization)
// ============================================================================

use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct RawProgram {
    name: String,
    #[serde(default)]
    types: IndexMap<String, RawTypeDefinition>,
    #[serde(default)]
    errors: Vec<RawCompilationError>,
    #[serde(default)]
    documents: Vec<RawDocument>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawTypeDefinition {
    Record { record: RawRecord },
    Alias { alias: String },
    Kind(String),
}

#[derive(Debug, Deserialize)]
struct RawRecord {
    #[serde(default)]
    fields: IndexMap<String, String>,
    #[serde(default)]
    rest: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawCompilationError {
    message: String,
    #[serde(default)]
    document: String,
    #[serde(default)]
    line: u32,
    #[serde(default)]
    column: u32,
}

impl RawCompilationError {
    fn position(&self) -> Position {
        Position {
            line: self.line,
            column: self.column,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawDocument {
    name: String,
    #[serde(default)]
    imports: IndexMap<String, String>,
    #[serde(default)]
    listeners: Vec<RawListener>,
    #[serde(default)]
    services: Vec<RawService>,
    #[serde(default)]
    functions: Vec<RawFunction>,
}

#[derive(Debug, Deserialize)]
struct RawListener {
    name: String,
    #[serde(rename = "type")]
    type_name: String,
    #[serde(default)]
    line: u32,
    #[serde(default)]
    column: u32,
}

#[derive(Debug, Deserialize)]
struct RawService {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    listener: Option<String>,
    #[serde(default)]
    listener_type: Option<String>,
    #[serde(default)]
    annotations: Vec<RawAnnotation>,
    #[serde(default)]
    functions: Vec<RawFunction>,
    #[serde(default)]
    line: u32,
    #[serde(default)]
    column: u32,
}

#[derive(Debug, Deserialize)]
struct RawFunction {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    qualifier: Option<String>,
    #[serde(default)]
    accessor: Option<String>,
    #[serde(default)]
    path: Vec<RawPathSegment>,
    #[serde(default)]
    params: Vec<RawParam>,
    #[serde(default)]
    returns: Option<RawReturn>,
    #[serde(default)]
    line: u32,
    #[serde(default)]
    column: u32,
}

/// `rest` must be tried before `param`: every field of `param` is optional.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawPathSegment {
    Text(String),
    Rest {
        rest: String,
        #[serde(rename = "type", default)]
        ty: Option<String>,
    },
    Param {
        #[serde(default)]
        param: Option<String>,
        #[serde(rename = "type", default)]
        ty: Option<String>,
    },
}

#[derive(Debug, Deserialize)]
struct RawParam {
    name: String,
    #[serde(rename = "type")]
    ty: String,
    #[serde(default)]
    kind: Option<String>,
    #[serde(default)]
    annotations: Vec<RawAnnotation>,
    #[serde(default)]
    line: u32,
    #[serde(default)]
    column: u32,
}

#[derive(Debug, Deserialize)]
struct RawReturn {
    #[serde(rename = "type", default)]
    ty: Option<String>,
    #[serde(default)]
    annotations: Vec<RawAnnotation>,
    #[serde(default)]
    line: u32,
    #[serde(default)]
    column: u32,
}

#[derive(Debug, Deserialize)]
struct RawAnnotation {
    name: String,
    #[serde(default)]
    fields: IndexMap<String, serde_yaml::Value>,
    #[serde(default)]
    line: u32,
    #[serde(default)]
    column: u32,
}
