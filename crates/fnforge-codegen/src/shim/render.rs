//! Shim rendering
//!
//! Each document's shims are rendered into one Rust module. Statements are
//! lowered to source lines here; the surrounding module layout lives in a
//! minijinja template.

use minijinja::{Environment, context};
use serde::Serialize;

use fnforge_core::TypeDesc;

use crate::error::Result;
use crate::model::DocumentContext;

use super::{ContentType, Expression, ShimFunction, Statement, rust_ident};

const MODULE_TEMPLATE: &str = r#"// Generated by fnforge from `{{ document }}`. Do not edit.
#![allow(unused_imports, clippy::all)]

use fnforge_rt::{Decimal, Envelope, Map, Outputs, ShimError, Value, Xml};

{% for shim in shims %}
/// Invocation shim for function `{{ shim.function }}`
pub fn {{ shim.ident }}(envelope: &Envelope) -> Result<Outputs, ShimError> {
    let mut outputs = Outputs::new();
{% for line in shim.lines %}
    {{ line }}
{% endfor %}
    Ok(outputs)
}

{% endfor %}
/// Route an invocation to its shim by function name
pub fn dispatch(function: &str, envelope: &Envelope) -> Option<Result<Outputs, ShimError>> {
    match function {
{% for shim in shims %}
        {{ shim.function_literal }} => Some({{ shim.ident }}(envelope)),
{% endfor %}
        _ => None,
    }
}
"#;

const INDEX_TEMPLATE: &str = r#"// Generated by fnforge. Do not edit.
{% for module in modules %}
pub mod {{ module }};
{% endfor %}
"#;

/// Rendered source for one document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedModule {
    /// Source document
    pub document: String,

    /// Module identifier
    pub module: String,

    /// Rust source
    pub source: String,
}

impl GeneratedModule {
    /// File name of the module
    pub fn file_name(&self) -> String {
        format!("{}.rs", self.module)
    }
}

#[derive(Serialize)]
struct ShimView {
    function: String,
    function_literal: String,
    ident: String,
    lines: Vec<String>,
}

/// Renders shims to Rust modules
pub struct ShimRenderer {
    env: Environment<'static>,
}

impl ShimRenderer {
    /// Create a renderer with the built-in templates
    pub fn new() -> Result<Self> {
        let mut env = Environment::new();
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);
        env.add_template("module.rs", MODULE_TEMPLATE)?;
        env.add_template("mod.rs", INDEX_TEMPLATE)?;
        Ok(Self { env })
    }

    /// Render every shim of a document
    pub fn render(&self, document: &DocumentContext) -> Result<GeneratedModule> {
        let module = rust_ident(&document.document);
        let shims: Vec<ShimView> = document
            .functions
            .iter()
            .map(|f| {
                let shim = f.shim();
                ShimView {
                    function: shim.function.clone(),
                    function_literal: format!("{:?}", shim.function),
                    ident: shim.ident(),
                    lines: lower(shim, &module),
                }
            })
            .collect();

        let source = self
            .env
            .get_template("module.rs")?
            .render(context! { document => &document.document, shims => shims })?;
        tracing::debug!(
            "Rendered {} shim(s) for document '{}'",
            document.functions.len(),
            document.document
        );

        Ok(GeneratedModule {
            document: document.document.clone(),
            module,
            source,
        })
    }

    /// Render the `mod.rs` that declares every generated module
    pub fn render_index(&self, modules: &[GeneratedModule]) -> Result<String> {
        let names: Vec<&str> = modules.iter().map(|m| m.module.as_str()).collect();
        Ok(self
            .env
            .get_template("mod.rs")?
            .render(context! { modules => names })?)
    }
}

fn lower(shim: &ShimFunction, module: &str) -> Vec<String> {
    shim.statements
        .iter()
        .map(|statement| match statement {
            Statement::Bind { var, expr } => format!(
                "let {}: {} = {}?;",
                var,
                rust_type(expression_type(expr)),
                lower_expression(expr)
            ),
            Statement::Invoke {
                handler,
                args,
                result,
                fallible,
            } => {
                let call = format!(
                    "crate::{}::{}({}){}",
                    module,
                    rust_ident(handler),
                    args.join(", "),
                    if *fallible { ".map_err(ShimError::handler)?" } else { "" }
                );
                match result {
                    Some(var) => format!("let {} = {};", var, call),
                    None => format!("{};", call),
                }
            }
            Statement::Marshal {
                binding,
                var,
                encoding,
                ..
            } => match var {
                Some(var) => format!(
                    "outputs.{}({:?}, &{})?;",
                    marshal_method(*encoding),
                    binding,
                    var
                ),
                None => format!("outputs.set_empty({:?});", binding),
            },
        })
        .collect()
}

fn expression_type(expr: &Expression) -> &TypeDesc {
    match expr {
        Expression::PathParam { ty, .. }
        | Expression::RestPath { ty, .. }
        | Expression::Query { ty, .. }
        | Expression::Header { ty, .. }
        | Expression::HeaderRecord { ty, .. }
        | Expression::Payload { ty, .. }
        | Expression::TriggerData { ty, .. }
        | Expression::InputBinding { ty, .. }
        | Expression::Metadata { ty, .. } => ty,
    }
}

fn lower_expression(expr: &Expression) -> String {
    match expr {
        Expression::PathParam { token, .. } => format!("envelope.path_param({:?})", token),
        Expression::RestPath { name, .. } => format!("envelope.rest_path({:?})", name),
        Expression::Query { name, .. } => format!("envelope.query({:?})", name),
        Expression::Header { name, .. } => format!("envelope.header({:?})", name),
        Expression::HeaderRecord { fields, .. } => format!("envelope.header_record(&{:?})", fields),
        Expression::Payload { default, .. } => {
            format!("envelope.payload({:?})", default.mime())
        }
        Expression::TriggerData { binding, .. } => format!("envelope.trigger({:?})", binding),
        Expression::InputBinding { name, .. } => format!("envelope.input({:?})", name),
        Expression::Metadata { key, .. } => format!("envelope.metadata({:?})", key),
    }
}

fn marshal_method(encoding: ContentType) -> &'static str {
    match encoding {
        ContentType::Text => "set_text",
        ContentType::Binary => "set_bytes",
        ContentType::Xml => "set_xml",
        ContentType::Json | ContentType::Form => "set_json",
    }
}

/// Rust type used for a value of the given type in generated code
pub fn rust_type(ty: &TypeDesc) -> String {
    match ty {
        TypeDesc::String => "String".to_string(),
        TypeDesc::Int => "i64".to_string(),
        TypeDesc::Float => "f64".to_string(),
        TypeDesc::Decimal => "Decimal".to_string(),
        TypeDesc::Boolean => "bool".to_string(),
        TypeDesc::Byte => "u8".to_string(),
        TypeDesc::Xml => "Xml".to_string(),
        TypeDesc::Nil => "()".to_string(),
        TypeDesc::Error => "ShimError".to_string(),
        TypeDesc::Json | TypeDesc::AnyData | TypeDesc::Any | TypeDesc::Readonly => {
            "Value".to_string()
        }
        TypeDesc::Array(element) | TypeDesc::Table(element) => {
            format!("Vec<{}>", rust_type(element))
        }
        TypeDesc::Map(value) => format!("Map<String, {}>", rust_type(value)),
        TypeDesc::Tuple(members) => {
            let members: Vec<String> = members.iter().map(rust_type).collect();
            format!("({},)", members.join(", "))
        }
        TypeDesc::Union(_) => match ty.without_nil() {
            Some(inner) if ty.is_nilable() && !matches!(inner, TypeDesc::Union(_)) => {
                format!("Option<{}>", rust_type(&inner))
            }
            _ => "Value".to_string(),
        },
        TypeDesc::Intersection(_) => match ty.effective() {
            Ok(reduced) => rust_type(&reduced),
            Err(_) => "Value".to_string(),
        },
        TypeDesc::Named(name) => {
            let local = name.rsplit(':').next().unwrap_or(name);
            format!("crate::types::{}", local)
        }
    }
}
