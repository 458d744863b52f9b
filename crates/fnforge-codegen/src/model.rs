//! Binding model
//!
//! The validated, normalized description of each deployable function: its
//! bindings (trigger, inputs, outputs) and the shim that adapts the host's
//! JSON envelope to the user's handler.

use indexmap::IndexMap;
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Value, json};
use std::collections::HashSet;

use fnforge_core::{DiagnosticKind, Location};

use crate::shim::ShimFunction;

/// The closed set of binding kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingKind {
    /// HTTP trigger
    Http,
    /// HTTP response
    HttpOutput,
    /// Storage queue trigger
    QueueTrigger,
    /// Storage queue output
    QueueOutput,
    /// Blob trigger
    BlobTrigger,
    /// Blob input
    BlobInput,
    /// Blob output
    BlobOutput,
    /// Timer trigger
    TimerTrigger,
    /// Document database change feed trigger
    DocumentTrigger,
    /// Document database input
    DocumentInput,
    /// Document database output
    DocumentOutput,
    /// SMS output
    SmsOutput,
    /// Trigger metadata value; never written to a descriptor
    Metadata,
}

impl BindingKind {
    /// Platform `type` string written to descriptors
    pub fn type_name(&self) -> &'static str {
        match self {
            BindingKind::Http => "httpTrigger",
            BindingKind::HttpOutput => "http",
            BindingKind::QueueTrigger => "queueTrigger",
            BindingKind::QueueOutput => "queue",
            BindingKind::BlobTrigger => "blobTrigger",
            BindingKind::BlobInput | BindingKind::BlobOutput => "blob",
            BindingKind::TimerTrigger => "timerTrigger",
            BindingKind::DocumentTrigger => "cosmosDBTrigger",
            BindingKind::DocumentInput | BindingKind::DocumentOutput => "cosmosDB",
            BindingKind::SmsOutput => "twilioSms",
            BindingKind::Metadata => "metadata",
        }
    }

    /// Short kind name used in diagnostics and listings
    pub fn as_str(&self) -> &'static str {
        match self {
            BindingKind::Http => "http",
            BindingKind::HttpOutput => "http-output",
            BindingKind::QueueTrigger => "queue-trigger",
            BindingKind::QueueOutput => "queue-output",
            BindingKind::BlobTrigger => "blob-trigger",
            BindingKind::BlobInput => "blob-input",
            BindingKind::BlobOutput => "blob-output",
            BindingKind::TimerTrigger => "timer-trigger",
            BindingKind::DocumentTrigger => "document-trigger",
            BindingKind::DocumentInput => "document-input",
            BindingKind::DocumentOutput => "document-output",
            BindingKind::SmsOutput => "sms-output",
            BindingKind::Metadata => "metadata",
        }
    }

    /// Whether this kind starts an invocation
    pub fn is_trigger(&self) -> bool {
        matches!(
            self,
            BindingKind::Http
                | BindingKind::QueueTrigger
                | BindingKind::BlobTrigger
                | BindingKind::TimerTrigger
                | BindingKind::DocumentTrigger
        )
    }

    /// Whether bindings of this kind appear in descriptors
    pub fn is_emitted(&self) -> bool {
        *self != BindingKind::Metadata
    }
}

/// Binding direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Data flows into the function
    In,
    /// Data flows out of the function
    Out,
}

impl Direction {
    /// Descriptor value
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::In => "in",
            Direction::Out => "out",
        }
    }
}

/// One binding of a function. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    kind: BindingKind,
    direction: Direction,
    name: String,
    fields: IndexMap<String, Value>,
    trailing: IndexMap<String, Value>,
}

impl Binding {
    /// Start building a binding
    pub fn builder(kind: BindingKind, direction: Direction, name: impl Into<String>) -> BindingBuilder {
        BindingBuilder {
            binding: Binding {
                kind,
                direction,
                name: name.into(),
                fields: IndexMap::new(),
                trailing: IndexMap::new(),
            },
        }
    }

    /// Binding kind
    pub fn kind(&self) -> BindingKind {
        self.kind
    }

    /// Direction
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Variable name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Look up a kind-specific field
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key).or_else(|| self.trailing.get(key))
    }
}

impl Serialize for Binding {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = 3 + self.fields.len() + self.trailing.len();
        let mut map = serializer.serialize_map(Some(len))?;
        map.serialize_entry("type", self.kind.type_name())?;
        for (key, value) in &self.fields {
            map.serialize_entry(key, value)?;
        }
        map.serialize_entry("direction", self.direction.as_str())?;
        map.serialize_entry("name", &self.name)?;
        for (key, value) in &self.trailing {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// Builder for [`Binding`]; null fields are never stored
#[derive(Debug)]
pub struct BindingBuilder {
    binding: Binding,
}

impl BindingBuilder {
    /// Add a field written before `direction`
    pub fn field(mut self, key: &str, value: impl Into<Value>) -> Self {
        let value = value.into();
        if !value.is_null() {
            self.binding.fields.insert(key.to_string(), value);
        }
        self
    }

    /// Add a field when present
    pub fn field_opt<V: Into<Value>>(self, key: &str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.field(key, v),
            None => self,
        }
    }

    /// Add a field written after `name`
    pub fn trailing(mut self, key: &str, value: impl Into<Value>) -> Self {
        let value = value.into();
        if !value.is_null() {
            self.binding.trailing.insert(key.to_string(), value);
        }
        self
    }

    /// Finish the binding
    pub fn build(self) -> Binding {
        self.binding
    }
}

/// A deployable function: unique name, bindings and shim
#[derive(Debug, Clone)]
pub struct FunctionContext {
    name: String,
    document: String,
    location: Location,
    bindings: Vec<Binding>,
    shim: ShimFunction,
}

impl FunctionContext {
    /// Assemble a function, enforcing that `trigger` is the only trigger
    /// binding and that binding names are unique.
    pub fn new(
        name: impl Into<String>,
        document: impl Into<String>,
        location: Location,
        trigger: Binding,
        others: Vec<Binding>,
        shim: ShimFunction,
    ) -> std::result::Result<Self, DiagnosticKind> {
        let name = name.into();
        if !trigger.kind.is_trigger() {
            return Err(DiagnosticKind::MissingTriggerAnnotation {
                service: name,
                expected: "a trigger binding".to_string(),
            });
        }
        if let Some(extra) = others.iter().find(|b| b.kind.is_trigger()) {
            return Err(DiagnosticKind::MisplacedAnnotation {
                annotation: extra.kind.as_str().to_string(),
                target: "a handler parameter".to_string(),
            });
        }

        let mut bindings = Vec::with_capacity(others.len() + 1);
        bindings.push(trigger);
        bindings.extend(others);

        let mut seen = HashSet::new();
        for binding in &bindings {
            if !seen.insert(binding.name.as_str()) {
                return Err(DiagnosticKind::DuplicateBindingName {
                    function: name,
                    name: binding.name.clone(),
                });
            }
        }

        Ok(Self {
            name,
            document: document.into(),
            location,
            bindings,
            shim,
        })
    }

    /// Function name (unique per build)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Source document
    pub fn document(&self) -> &str {
        &self.document
    }

    /// Handler declaration location
    pub fn location(&self) -> &Location {
        &self.location
    }

    /// The trigger binding
    pub fn trigger(&self) -> &Binding {
        &self.bindings[0]
    }

    /// All bindings, trigger first
    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    /// The synthesized invocation shim
    pub fn shim(&self) -> &ShimFunction {
        &self.shim
    }

    /// Descriptor contents: `{"bindings": [...]}` without metadata bindings
    pub fn descriptor(&self) -> Value {
        let bindings: Vec<&Binding> = self
            .bindings
            .iter()
            .filter(|b| b.kind.is_emitted())
            .collect();
        json!({ "bindings": bindings })
    }
}

/// The functions of one source document that need generated shims
#[derive(Debug, Clone)]
pub struct DocumentContext {
    /// Document name
    pub document: String,

    /// Functions in declaration order
    pub functions: Vec<FunctionContext>,
}

impl DocumentContext {
    /// Empty context for a document
    pub fn new(document: impl Into<String>) -> Self {
        Self {
            document: document.into(),
            functions: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn http_trigger(route: &str) -> Binding {
        Binding::builder(BindingKind::Http, Direction::In, "httpPayload")
            .field("authLevel", "anonymous")
            .field("methods", json!(["post"]))
            .trailing("route", route)
            .build()
    }

    fn http_output() -> Binding {
        Binding::builder(BindingKind::HttpOutput, Direction::Out, "resp").build()
    }

    fn shim() -> ShimFunction {
        ShimFunction::new("post-hello", "post_hello")
    }

    #[test]
    fn test_binding_field_order() {
        let json = serde_json::to_string(&http_trigger("hello")).unwrap();
        assert_eq!(
            json,
            r#"{"type":"httpTrigger","authLevel":"anonymous","methods":["post"],"direction":"in","name":"httpPayload","route":"hello"}"#
        );
    }

    #[test]
    fn test_null_fields_are_dropped() {
        let binding = Binding::builder(BindingKind::QueueOutput, Direction::Out, "outMsg")
            .field("connection", "AzureWebJobsStorage")
            .field("queueName", Value::Null)
            .field_opt::<String>("partitionKey", None)
            .build();
        assert_eq!(
            serde_json::to_string(&binding).unwrap(),
            r#"{"type":"queue","connection":"AzureWebJobsStorage","direction":"out","name":"outMsg"}"#
        );
    }

    #[test]
    fn test_descriptor_matches_platform_shape() {
        let function = FunctionContext::new(
            "post-hello",
            "main",
            Location::document("main"),
            http_trigger("hello"),
            vec![http_output()],
            shim(),
        )
        .unwrap();

        assert_eq!(
            serde_json::to_string(&function.descriptor()).unwrap(),
            r#"{"bindings":[{"type":"httpTrigger","authLevel":"anonymous","methods":["post"],"direction":"in","name":"httpPayload","route":"hello"},{"type":"http","direction":"out","name":"resp"}]}"#
        );
        assert_eq!(function.trigger().kind(), BindingKind::Http);
    }

    #[test]
    fn test_metadata_is_not_emitted() {
        let metadata = Binding::builder(BindingKind::Metadata, Direction::In, "name").build();
        let function = FunctionContext::new(
            "f",
            "main",
            Location::document("main"),
            http_trigger("f"),
            vec![metadata, http_output()],
            shim(),
        )
        .unwrap();
        assert_eq!(function.bindings().len(), 3);
        assert_eq!(function.descriptor()["bindings"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_duplicate_binding_names_rejected() {
        let clash = Binding::builder(BindingKind::BlobInput, Direction::In, "resp").build();
        let err = FunctionContext::new(
            "f",
            "main",
            Location::document("main"),
            http_trigger("f"),
            vec![clash, http_output()],
            shim(),
        )
        .unwrap_err();
        assert_eq!(err.code(), "FNF214");
    }

    #[test]
    fn test_second_trigger_rejected() {
        let queue = Binding::builder(BindingKind::QueueTrigger, Direction::In, "inMsg").build();
        let err = FunctionContext::new(
            "f",
            "main",
            Location::document("main"),
            http_trigger("f"),
            vec![queue],
            shim(),
        )
        .unwrap_err();
        assert!(matches!(err, DiagnosticKind::MisplacedAnnotation { .. }));
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(BindingKind::DocumentTrigger.type_name(), "cosmosDBTrigger");
        assert_eq!(BindingKind::DocumentInput.type_name(), "cosmosDB");
        assert_eq!(BindingKind::SmsOutput.as_str(), "sms-output");
        assert!(BindingKind::TimerTrigger.is_trigger());
        assert!(!BindingKind::BlobInput.is_trigger());
    }
}
