//! Binding handler registry
//!
//! Maps each supported annotation to the handler that validates the
//! annotated parameter or return type, emits the shim fragment that
//! extracts or marshals it, and emits its binding descriptor.
//!
//! Lookup goes through [`AnnotationKind`]; handler selection is an
//! exhaustive match, so a new kind cannot be added without a handler.

pub mod blob;
pub mod cosmos;
pub mod http;
pub mod metadata;
pub mod payload;
pub mod queue;
pub mod sms;
pub mod timer;

use fnforge_core::program::Annotation;
use fnforge_core::semantic::{FUNCTIONS_MODULE, HTTP_MODULE, SemanticModel};
use fnforge_core::{DiagnosticKind, TypeDesc};

use crate::extractor::ListenerKind;
use crate::model::{Binding, BindingKind};
use crate::shim::{Expression, Statement};

/// Connection setting used when an annotation does not name one
pub const DEFAULT_CONNECTION: &str = "AzureWebJobsStorage";

/// Variable name of non-HTTP trigger data
pub const TRIGGER_VARIABLE: &str = "inMsg";

/// Variable name of non-HTTP output data
pub const OUTPUT_VARIABLE: &str = "outMsg";

/// Every annotation the pipeline understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnnotationKind {
    /// `azure_functions:HttpTrigger`
    HttpTrigger,
    /// `azure_functions:QueueTrigger`
    QueueTrigger,
    /// `azure_functions:CosmosDBTrigger`
    CosmosDbTrigger,
    /// `azure_functions:TimerTrigger`
    TimerTrigger,
    /// `azure_functions:BlobTrigger`
    BlobTrigger,
    /// `azure_functions:HttpOutput`
    HttpOutput,
    /// `azure_functions:QueueOutput`
    QueueOutput,
    /// `azure_functions:CosmosDBOutput`
    CosmosDbOutput,
    /// `azure_functions:BlobOutput`
    BlobOutput,
    /// `azure_functions:TwilioSmsOutput`
    TwilioSmsOutput,
    /// `azure_functions:CosmosDBInput`
    CosmosDbInput,
    /// `azure_functions:BlobInput`
    BlobInput,
    /// `azure_functions:BindingName`
    BindingName,
    /// `azure_functions:Payload` or `http:Payload`
    Payload,
    /// `http:Header`
    Header,
    /// `http:Query`
    Query,
}

/// Where an annotation may be attached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// On a service (trigger configuration)
    Service,
    /// On a handler parameter
    Parameter,
    /// On a handler return type
    Return,
}

/// Result of looking up a qualified annotation name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    /// A supported annotation
    Known(AnnotationKind),
    /// An annotation of the functions module without a handler
    Unsupported,
    /// An annotation of some other module; ignored
    Foreign,
}

impl AnnotationKind {
    /// Look up a `module:Name` annotation
    pub fn lookup(qualified: &str) -> Lookup {
        let Some((module, name)) = qualified.split_once(':') else {
            return Lookup::Foreign;
        };
        let kind = match (module, name) {
            (FUNCTIONS_MODULE, "HttpTrigger" | "HTTPTrigger") => AnnotationKind::HttpTrigger,
            (FUNCTIONS_MODULE, "QueueTrigger") => AnnotationKind::QueueTrigger,
            (FUNCTIONS_MODULE, "CosmosDBTrigger") => AnnotationKind::CosmosDbTrigger,
            (FUNCTIONS_MODULE, "TimerTrigger") => AnnotationKind::TimerTrigger,
            (FUNCTIONS_MODULE, "BlobTrigger") => AnnotationKind::BlobTrigger,
            (FUNCTIONS_MODULE, "HttpOutput" | "HTTPOutput") => AnnotationKind::HttpOutput,
            (FUNCTIONS_MODULE, "QueueOutput") => AnnotationKind::QueueOutput,
            (FUNCTIONS_MODULE, "CosmosDBOutput") => AnnotationKind::CosmosDbOutput,
            (FUNCTIONS_MODULE, "BlobOutput") => AnnotationKind::BlobOutput,
            (FUNCTIONS_MODULE, "TwilioSmsOutput") => AnnotationKind::TwilioSmsOutput,
            (FUNCTIONS_MODULE, "CosmosDBInput") => AnnotationKind::CosmosDbInput,
            (FUNCTIONS_MODULE, "BlobInput") => AnnotationKind::BlobInput,
            (FUNCTIONS_MODULE, "BindingName") => AnnotationKind::BindingName,
            (FUNCTIONS_MODULE | HTTP_MODULE, "Payload") => AnnotationKind::Payload,
            (HTTP_MODULE, "Header") => AnnotationKind::Header,
            (HTTP_MODULE, "Query") => AnnotationKind::Query,
            (FUNCTIONS_MODULE, _) => return Lookup::Unsupported,
            _ => return Lookup::Foreign,
        };
        Lookup::Known(kind)
    }

    /// Canonical qualified name
    pub fn qualified_name(&self) -> &'static str {
        match self {
            AnnotationKind::HttpTrigger => "azure_functions:HttpTrigger",
            AnnotationKind::QueueTrigger => "azure_functions:QueueTrigger",
            AnnotationKind::CosmosDbTrigger => "azure_functions:CosmosDBTrigger",
            AnnotationKind::TimerTrigger => "azure_functions:TimerTrigger",
            AnnotationKind::BlobTrigger => "azure_functions:BlobTrigger",
            AnnotationKind::HttpOutput => "azure_functions:HttpOutput",
            AnnotationKind::QueueOutput => "azure_functions:QueueOutput",
            AnnotationKind::CosmosDbOutput => "azure_functions:CosmosDBOutput",
            AnnotationKind::BlobOutput => "azure_functions:BlobOutput",
            AnnotationKind::TwilioSmsOutput => "azure_functions:TwilioSmsOutput",
            AnnotationKind::CosmosDbInput => "azure_functions:CosmosDBInput",
            AnnotationKind::BlobInput => "azure_functions:BlobInput",
            AnnotationKind::BindingName => "azure_functions:BindingName",
            AnnotationKind::Payload => "http:Payload",
            AnnotationKind::Header => "http:Header",
            AnnotationKind::Query => "http:Query",
        }
    }

    /// Where the annotation may be attached
    pub fn placement(&self) -> Placement {
        match self {
            AnnotationKind::HttpTrigger
            | AnnotationKind::QueueTrigger
            | AnnotationKind::CosmosDbTrigger
            | AnnotationKind::TimerTrigger
            | AnnotationKind::BlobTrigger => Placement::Service,
            AnnotationKind::HttpOutput
            | AnnotationKind::QueueOutput
            | AnnotationKind::CosmosDbOutput
            | AnnotationKind::BlobOutput
            | AnnotationKind::TwilioSmsOutput => Placement::Return,
            AnnotationKind::CosmosDbInput
            | AnnotationKind::BlobInput
            | AnnotationKind::BindingName
            | AnnotationKind::Payload
            | AnnotationKind::Header
            | AnnotationKind::Query => Placement::Parameter,
        }
    }

    /// Listener a trigger annotation configures
    pub fn listener(&self) -> Option<ListenerKind> {
        match self {
            AnnotationKind::HttpTrigger => Some(ListenerKind::Http),
            AnnotationKind::QueueTrigger => Some(ListenerKind::Queue),
            AnnotationKind::CosmosDbTrigger => Some(ListenerKind::CosmosDb),
            AnnotationKind::TimerTrigger => Some(ListenerKind::Timer),
            AnnotationKind::BlobTrigger => Some(ListenerKind::Blob),
            _ => None,
        }
    }

    /// Parameter handler of a parameter annotation
    pub fn param_handler(&self) -> Option<ParamHandlerKind> {
        match self {
            AnnotationKind::CosmosDbInput => Some(ParamHandlerKind::DocumentInput),
            AnnotationKind::BlobInput => Some(ParamHandlerKind::BlobInput),
            AnnotationKind::BindingName => Some(ParamHandlerKind::Metadata),
            AnnotationKind::Payload => Some(ParamHandlerKind::Payload),
            AnnotationKind::Header => Some(ParamHandlerKind::Header),
            AnnotationKind::Query => Some(ParamHandlerKind::Query),
            _ => None,
        }
    }
}

/// Parameter handler selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamHandlerKind {
    /// Route placeholder
    Path,
    /// Query string value
    Query,
    /// Request header(s)
    Header,
    /// Request body or trigger data
    Payload,
    /// Document database input binding
    DocumentInput,
    /// Blob input binding
    BlobInput,
    /// Trigger metadata value
    Metadata,
}

/// Everything a parameter handler needs to know about one parameter
pub struct ParamSite<'a> {
    /// Parameter name (or route placeholder token)
    pub name: &'a str,

    /// Effective parameter type
    pub ty: &'a TypeDesc,

    /// The binding annotation, if the parameter has one
    pub annotation: Option<&'a Annotation>,

    /// Type queries
    pub model: &'a dyn SemanticModel,

    /// Trigger of the enclosing handler
    pub trigger: &'a dyn TriggerHandler,
}

impl ParamSite<'_> {
    fn invalid_type(&self, binding: BindingKind) -> DiagnosticKind {
        DiagnosticKind::InvalidBindingParameterType {
            binding: binding.as_str().to_string(),
            param: self.name.to_string(),
            ty: self.ty.to_string(),
        }
    }
}

/// Handler-level trigger information
pub struct TriggerSite<'a> {
    /// Service trigger annotation, when present
    pub annotation: Option<&'a Annotation>,

    /// Resource accessor (HTTP only)
    pub accessor: Option<&'a str>,

    /// Full route (HTTP only)
    pub route: &'a str,

    /// Payload parameter type, when the handler has one
    pub payload: Option<&'a TypeDesc>,
}

/// Validates and emits a handler parameter
pub trait ParameterHandler: Sync {
    /// Check the parameter type against the binding contract
    fn validate(&self, site: &ParamSite<'_>) -> Result<(), DiagnosticKind>;

    /// Shim expression that produces the argument
    fn emit_extraction(&self, site: &ParamSite<'_>) -> Expression;

    /// Descriptor binding contributed by the parameter, if any
    fn emit_binding(&self, site: &ParamSite<'_>) -> Result<Option<Binding>, DiagnosticKind>;
}

/// Validates and emits a handler return type
pub trait ReturnHandler: Sync {
    /// Output binding kind
    fn kind(&self) -> BindingKind;

    /// Output binding variable name
    fn variable(&self) -> &'static str {
        OUTPUT_VARIABLE
    }

    /// Check the declared return type against the binding contract
    fn validate(&self, model: &dyn SemanticModel, ty: &TypeDesc) -> Result<(), DiagnosticKind>;

    /// Shim statement that writes the result
    fn emit_marshal(&self, result: Option<&str>, ty: &TypeDesc) -> Statement {
        let value = ty.value_type();
        Statement::Marshal {
            binding: self.variable().to_string(),
            kind: self.kind(),
            var: result.filter(|_| value.is_some()).map(str::to_string),
            encoding: value
                .as_ref()
                .map(crate::shim::ContentType::for_type)
                .unwrap_or(crate::shim::ContentType::Json),
        }
    }

    /// Descriptor binding
    fn emit_binding(
        &self,
        annotation: Option<&Annotation>,
        ty: &TypeDesc,
    ) -> Result<Binding, DiagnosticKind>;
}

/// Validates trigger data and emits the trigger binding
pub trait TriggerHandler: Sync {
    /// Trigger binding kind
    fn kind(&self) -> BindingKind;

    /// Trigger binding variable name
    fn variable(&self) -> &'static str {
        TRIGGER_VARIABLE
    }

    /// Whether the trigger can deliver a payload of this type
    fn validate(&self, model: &dyn SemanticModel, ty: &TypeDesc) -> bool;

    /// Shim expression producing the payload argument
    fn emit_extraction(&self, ty: &TypeDesc) -> Expression {
        Expression::TriggerData {
            binding: self.variable().to_string(),
            ty: ty.clone(),
        }
    }

    /// Trigger binding
    fn emit_binding(&self, site: &TriggerSite<'_>) -> Result<Binding, DiagnosticKind>;
}

/// Trigger handler of a listener kind
pub fn trigger_handler(listener: ListenerKind) -> &'static dyn TriggerHandler {
    match listener {
        ListenerKind::Http => &http::HttpTriggerHandler,
        ListenerKind::Queue => &queue::QueueTriggerHandler,
        ListenerKind::CosmosDb => &cosmos::CosmosTriggerHandler,
        ListenerKind::Timer => &timer::TimerTriggerHandler,
        ListenerKind::Blob => &blob::BlobTriggerHandler,
    }
}

/// Parameter handler of a parameter classification
pub fn parameter_handler(kind: ParamHandlerKind) -> &'static dyn ParameterHandler {
    match kind {
        ParamHandlerKind::Path => &http::PathHandler,
        ParamHandlerKind::Query => &http::QueryHandler,
        ParamHandlerKind::Header => &http::HeaderHandler,
        ParamHandlerKind::Payload => &payload::PayloadHandler,
        ParamHandlerKind::DocumentInput => &cosmos::CosmosInputHandler,
        ParamHandlerKind::BlobInput => &blob::BlobInputHandler,
        ParamHandlerKind::Metadata => &metadata::MetadataHandler,
    }
}

/// Return handler of an output annotation
pub fn return_handler(kind: AnnotationKind) -> Option<&'static dyn ReturnHandler> {
    match kind {
        AnnotationKind::HttpOutput => Some(&http::HttpOutputHandler),
        AnnotationKind::QueueOutput => Some(&queue::QueueOutputHandler),
        AnnotationKind::CosmosDbOutput => Some(&cosmos::CosmosOutputHandler),
        AnnotationKind::BlobOutput => Some(&blob::BlobOutputHandler),
        AnnotationKind::TwilioSmsOutput => Some(&sms::SmsOutputHandler),
        AnnotationKind::HttpTrigger
        | AnnotationKind::QueueTrigger
        | AnnotationKind::CosmosDbTrigger
        | AnnotationKind::TimerTrigger
        | AnnotationKind::BlobTrigger
        | AnnotationKind::CosmosDbInput
        | AnnotationKind::BlobInput
        | AnnotationKind::BindingName
        | AnnotationKind::Payload
        | AnnotationKind::Header
        | AnnotationKind::Query => None,
    }
}

/// Typed access to annotation field literals
pub(crate) struct Fields<'a> {
    annotation: Option<&'a Annotation>,
    name: &'static str,
}

impl<'a> Fields<'a> {
    pub(crate) fn new(annotation: Option<&'a Annotation>, kind: AnnotationKind) -> Self {
        Self {
            annotation,
            name: kind.qualified_name(),
        }
    }

    fn annotation_name(&self) -> String {
        self.annotation
            .map(|a| a.name.clone())
            .unwrap_or_else(|| self.name.to_string())
    }

    /// Field text; lists are joined with commas
    pub(crate) fn string(&self, key: &str) -> Option<String> {
        self.annotation
            .and_then(|a| a.field(key))
            .map(|v| v.joined())
    }

    pub(crate) fn string_or(&self, key: &str, default: &str) -> String {
        self.string(key).unwrap_or_else(|| default.to_string())
    }

    pub(crate) fn required(&self, key: &str) -> Result<String, DiagnosticKind> {
        self.string(key)
            .ok_or_else(|| DiagnosticKind::MissingAnnotationField {
                annotation: self.annotation_name(),
                field: key.to_string(),
            })
    }

    pub(crate) fn int(&self, key: &str) -> Result<Option<i64>, DiagnosticKind> {
        self.string(key)
            .map(|text| {
                text.trim()
                    .parse::<i64>()
                    .map_err(|_| self.invalid(key, &text, "an integer"))
            })
            .transpose()
    }

    pub(crate) fn boolean(&self, key: &str) -> Result<Option<bool>, DiagnosticKind> {
        self.string(key)
            .map(|text| match text.trim() {
                "true" => Ok(true),
                "false" => Ok(false),
                _ => Err(self.invalid(key, &text, "a boolean")),
            })
            .transpose()
    }

    pub(crate) fn one_of(
        &self,
        key: &str,
        allowed: &[&str],
        default: &str,
    ) -> Result<String, DiagnosticKind> {
        match self.string(key) {
            None => Ok(default.to_string()),
            Some(text) if allowed.contains(&text.as_str()) => Ok(text),
            Some(text) => Err(self.invalid(key, &text, &format!("one of {}", allowed.join(", ")))),
        }
    }

    fn invalid(&self, key: &str, value: &str, expected: &str) -> DiagnosticKind {
        DiagnosticKind::InvalidAnnotationValue {
            annotation: self.annotation_name(),
            field: key.to_string(),
            value: value.to_string(),
            expected: expected.to_string(),
        }
    }
}

/// Blob `dataType` for a value type
pub(crate) fn data_type(ty: &TypeDesc) -> &'static str {
    match ty.without_nil() {
        Some(inner) if inner.is_byte_array() => "binary",
        _ => "string",
    }
}

/// Whether the type is a record (through aliases)
pub(crate) fn is_record(model: &dyn SemanticModel, ty: &TypeDesc) -> bool {
    model.record_type(ty).is_some()
}

/// Whether the type is an array of records
pub(crate) fn is_record_array(model: &dyn SemanticModel, ty: &TypeDesc) -> bool {
    match model.resolve_alias(ty) {
        TypeDesc::Array(element) => is_record(model, &element),
        _ => false,
    }
}

/// The non-nil part of a type with aliases resolved; `None` for `()`
pub(crate) fn resolved_value(model: &dyn SemanticModel, ty: &TypeDesc) -> Option<TypeDesc> {
    ty.without_nil().map(|inner| model.resolve_alias(&inner))
}

#[cfg(test)]
pub(crate) mod fixtures {
    use fnforge_core::ProgramModel;
    use fnforge_core::parser::Parser;
    use fnforge_core::program::{Annotation, AnnotationValue};
    use fnforge_core::{Location, TypeDesc};
    use indexmap::IndexMap;

    pub(crate) fn model() -> ProgramModel {
        let yaml = r#"
name: fixtures
types:
  Person:
    record:
      fields:
        name: string
        age: int
  Headers:
    record:
      fields:
        x-request-id: string
        accept: "string[]"
        trace: "string?"
  OpenHeaders:
    record:
      fields:
        host: string
      rest: string
  Nested:
    record:
      fields:
        inner: Person
  People:
    alias: "Person[]"
  Client: object
"#;
        ProgramModel::new(Parser::new(".").parse_yaml(yaml).unwrap())
    }

    pub(crate) fn ty(s: &str) -> TypeDesc {
        s.parse().unwrap()
    }

    pub(crate) fn annotation(name: &str, fields: &[(&str, &str)]) -> Annotation {
        Annotation {
            name: name.to_string(),
            fields: fields
                .iter()
                .map(|(k, v)| (k.to_string(), AnnotationValue::Literal(v.to_string())))
                .collect::<IndexMap<_, _>>(),
            location: Location::document("main"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("azure_functions:HttpTrigger", Lookup::Known(AnnotationKind::HttpTrigger))]
    #[case("azure_functions:HTTPOutput", Lookup::Known(AnnotationKind::HttpOutput))]
    #[case("azure_functions:CosmosDBInput", Lookup::Known(AnnotationKind::CosmosDbInput))]
    #[case("http:Payload", Lookup::Known(AnnotationKind::Payload))]
    #[case("azure_functions:Payload", Lookup::Known(AnnotationKind::Payload))]
    #[case("http:Header", Lookup::Known(AnnotationKind::Header))]
    #[case("azure_functions:EventHubTrigger", Lookup::Unsupported)]
    #[case("http:ServiceConfig", Lookup::Foreign)]
    #[case("log:Sensitive", Lookup::Foreign)]
    #[case("Unqualified", Lookup::Foreign)]
    fn test_lookup(#[case] name: &str, #[case] expected: Lookup) {
        assert_eq!(AnnotationKind::lookup(name), expected);
    }

    #[test]
    fn test_every_output_annotation_has_a_return_handler() {
        for kind in [
            AnnotationKind::HttpOutput,
            AnnotationKind::QueueOutput,
            AnnotationKind::CosmosDbOutput,
            AnnotationKind::BlobOutput,
            AnnotationKind::TwilioSmsOutput,
        ] {
            assert_eq!(kind.placement(), Placement::Return);
            assert!(return_handler(kind).is_some());
        }
        assert!(return_handler(AnnotationKind::Payload).is_none());
    }

    #[test]
    fn test_trigger_annotations_name_their_listener() {
        assert_eq!(AnnotationKind::QueueTrigger.listener(), Some(ListenerKind::Queue));
        assert_eq!(AnnotationKind::BlobTrigger.placement(), Placement::Service);
        assert_eq!(AnnotationKind::Header.listener(), None);
    }

    #[test]
    fn test_fields_parse_literals() {
        let ann = annotation(
            "af:CosmosDBTrigger",
            &[("throughput", "800"), ("create", "false"), ("bad", "lots")],
        );
        let fields = Fields::new(Some(&ann), AnnotationKind::CosmosDbTrigger);
        assert_eq!(fields.int("throughput").unwrap(), Some(800));
        assert_eq!(fields.boolean("create").unwrap(), Some(false));
        assert_eq!(fields.int("missing").unwrap(), None);

        let err = fields.int("bad").unwrap_err();
        assert_eq!(err.code(), "FNF106");
        assert!(err.message().contains("af:CosmosDBTrigger"));
    }

    #[test]
    fn test_required_field_without_annotation() {
        let fields = Fields::new(None, AnnotationKind::QueueOutput);
        let err = fields.required("queueName").unwrap_err();
        assert_eq!(
            err,
            DiagnosticKind::MissingAnnotationField {
                annotation: "azure_functions:QueueOutput".into(),
                field: "queueName".into(),
            }
        );
    }

    #[test]
    fn test_data_type() {
        assert_eq!(data_type(&ty("byte[]")), "binary");
        assert_eq!(data_type(&ty("byte[]?")), "binary");
        assert_eq!(data_type(&ty("string")), "string");
    }

    #[test]
    fn test_record_helpers() {
        let m = model();
        assert!(is_record(&m, &ty("Person")));
        assert!(is_record_array(&m, &ty("People")));
        assert!(is_record_array(&m, &ty("Person[]")));
        assert!(!is_record(&m, &ty("Client")));
    }
}
