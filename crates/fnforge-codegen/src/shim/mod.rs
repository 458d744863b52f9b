//! Invocation shim IR
//!
//! A shim unmarshals each handler argument from the host's JSON envelope,
//! calls the handler with the arguments in declaration order, and marshals
//! the result into the selected output binding. Shims are built as a small
//! statement list and rendered to Rust by [`render`].

pub mod render;

use fnforge_core::TypeDesc;

use crate::model::BindingKind;

pub use render::{GeneratedModule, ShimRenderer};

/// Payload content type used when the request does not declare one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    /// `application/json`
    Json,
    /// `application/xml`
    Xml,
    /// `text/plain`
    Text,
    /// `application/octet-stream`
    Binary,
    /// `application/x-www-form-urlencoded`
    Form,
}

impl ContentType {
    /// MIME type
    pub fn mime(&self) -> &'static str {
        match self {
            ContentType::Json => "application/json",
            ContentType::Xml => "application/xml",
            ContentType::Text => "text/plain",
            ContentType::Binary => "application/octet-stream",
            ContentType::Form => "application/x-www-form-urlencoded",
        }
    }

    /// Default content type for a payload of the given type
    pub fn for_type(ty: &TypeDesc) -> Self {
        let ty = ty.without_nil().unwrap_or(TypeDesc::Nil);
        match ty {
            TypeDesc::String => ContentType::Text,
            TypeDesc::Xml => ContentType::Xml,
            _ if ty.is_byte_array() => ContentType::Binary,
            TypeDesc::Map(ref inner) if **inner == TypeDesc::String => ContentType::Form,
            _ => ContentType::Json,
        }
    }
}

/// How one argument value is obtained from the envelope
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// Route placeholder, by name or positional index
    PathParam {
        /// Placeholder token without braces
        token: String,
        /// Target type
        ty: TypeDesc,
    },
    /// Remaining route segments
    RestPath {
        /// Placeholder name
        name: String,
        /// Target array type
        ty: TypeDesc,
    },
    /// Query string value with element-type coercion
    Query {
        /// Query key
        name: String,
        /// Target type
        ty: TypeDesc,
    },
    /// A single request header
    Header {
        /// Header name
        name: String,
        /// Target type
        ty: TypeDesc,
    },
    /// A closed record assembled from several headers
    HeaderRecord {
        /// Header names, one per record field
        fields: Vec<String>,
        /// Record type
        ty: TypeDesc,
    },
    /// Request body, decoded by content type
    Payload {
        /// Decoding used when the request declares no content type
        default: ContentType,
        /// Target type
        ty: TypeDesc,
    },
    /// Data delivered by a non-HTTP trigger
    TriggerData {
        /// Trigger binding name
        binding: String,
        /// Target type
        ty: TypeDesc,
    },
    /// Value delivered by an input binding
    InputBinding {
        /// Input binding name
        name: String,
        /// Target type
        ty: TypeDesc,
    },
    /// Trigger metadata entry
    Metadata {
        /// Metadata key
        key: String,
        /// Target type
        ty: TypeDesc,
    },
}

/// One shim statement
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// `let <var> = <expr>;`
    Bind {
        /// Synthetic variable
        var: String,
        /// Value source
        expr: Expression,
    },
    /// Call the handler
    Invoke {
        /// Handler symbol
        handler: String,
        /// Argument variables in declaration order
        args: Vec<String>,
        /// Variable receiving the result, if the handler returns a value
        result: Option<String>,
        /// Whether the handler can return an error
        fallible: bool,
    },
    /// Write a result into an output binding
    Marshal {
        /// Output binding name
        binding: String,
        /// Output binding kind
        kind: BindingKind,
        /// Result variable; `None` writes an empty response
        var: Option<String>,
        /// Encoding of the value
        encoding: ContentType,
    },
}

/// Per-function synthetic variable names, seeded at zero
#[derive(Debug, Default)]
pub struct SyntheticNames {
    next: usize,
}

impl SyntheticNames {
    /// Start a fresh sequence
    pub fn new() -> Self {
        Self::default()
    }

    /// Next variable with the given prefix
    pub fn fresh(&mut self, prefix: &str) -> String {
        let name = format!("{}{}", prefix, self.next);
        self.next += 1;
        name
    }
}

/// The generated invocation function for one deployable function
#[derive(Debug, Clone, PartialEq)]
pub struct ShimFunction {
    /// Deployable function name
    pub function: String,

    /// Handler symbol called by the shim
    pub handler: String,

    /// Statements in execution order
    pub statements: Vec<Statement>,
}

impl ShimFunction {
    /// Empty shim
    pub fn new(function: impl Into<String>, handler: impl Into<String>) -> Self {
        Self {
            function: function.into(),
            handler: handler.into(),
            statements: Vec::new(),
        }
    }

    /// Rust identifier of the generated function
    pub fn ident(&self) -> String {
        format!("invoke_{}", rust_ident(&self.function))
    }

    /// Append a statement
    pub fn push(&mut self, statement: Statement) {
        self.statements.push(statement);
    }
}

/// Map an arbitrary name to a Rust identifier
pub fn rust_ident(name: &str) -> String {
    let mut ident: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect();
    if ident.is_empty() || ident.starts_with(|c: char| c.is_ascii_digit()) {
        ident.insert(0, '_');
    }
    ident
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_synthetic_names_are_sequential() {
        let mut names = SyntheticNames::new();
        assert_eq!(names.fresh("arg"), "arg0");
        assert_eq!(names.fresh("arg"), "arg1");
        assert_eq!(names.fresh("ret"), "ret2");
    }

    #[rstest]
    #[case("post-hello", "invoke_post_hello")]
    #[case("Orders.Created", "invoke_orders_created")]
    fn test_shim_ident(#[case] function: &str, #[case] expected: &str) {
        assert_eq!(ShimFunction::new(function, "h").ident(), expected);
    }

    #[rstest]
    #[case("string", ContentType::Text)]
    #[case("string?", ContentType::Text)]
    #[case("xml", ContentType::Xml)]
    #[case("byte[]", ContentType::Binary)]
    #[case("map<string>", ContentType::Form)]
    #[case("Person", ContentType::Json)]
    #[case("int[]", ContentType::Json)]
    fn test_default_content_type(#[case] ty: &str, #[case] expected: ContentType) {
        assert_eq!(ContentType::for_type(&ty.parse().unwrap()), expected);
    }

    #[test]
    fn test_rust_ident() {
        assert_eq!(rust_ident("2fa"), "_2fa");
        assert_eq!(rust_ident("my-doc"), "my_doc");
    }
}
