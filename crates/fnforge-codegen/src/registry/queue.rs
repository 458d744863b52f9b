//! Storage queue trigger and output

use fnforge_core::program::Annotation;
use fnforge_core::semantic::SemanticModel;
use fnforge_core::{DiagnosticKind, TypeDesc};

use super::{
    AnnotationKind, DEFAULT_CONNECTION, Fields, ReturnHandler, TriggerHandler, TriggerSite,
    is_record,
};
use crate::model::{Binding, BindingKind, Direction};

/// `queueTrigger`
pub struct QueueTriggerHandler;

impl TriggerHandler for QueueTriggerHandler {
    fn kind(&self) -> BindingKind {
        BindingKind::QueueTrigger
    }

    fn validate(&self, model: &dyn SemanticModel, ty: &TypeDesc) -> bool {
        match model.resolve_alias(ty) {
            TypeDesc::String | TypeDesc::Json => true,
            map @ TypeDesc::Map(_) => model.is_anydata(&map),
            other => is_record(model, &other) && model.is_anydata(&other),
        }
    }

    fn emit_binding(&self, site: &TriggerSite<'_>) -> Result<Binding, DiagnosticKind> {
        let fields = Fields::new(site.annotation, AnnotationKind::QueueTrigger);
        Ok(Binding::builder(self.kind(), Direction::In, self.variable())
            .field("connection", fields.string_or("connection", DEFAULT_CONNECTION))
            .field("queueName", fields.required("queueName")?)
            .build())
    }
}

/// `queue` output
pub struct QueueOutputHandler;

impl ReturnHandler for QueueOutputHandler {
    fn kind(&self) -> BindingKind {
        BindingKind::QueueOutput
    }

    fn validate(&self, model: &dyn SemanticModel, ty: &TypeDesc) -> Result<(), DiagnosticKind> {
        let accepted = ty.value_type().is_some_and(|value| {
            match model.resolve_alias(&value) {
                TypeDesc::String | TypeDesc::Json => true,
                TypeDesc::Array(element) => *element == TypeDesc::String,
                _ => false,
            }
        });
        if accepted {
            Ok(())
        } else {
            Err(DiagnosticKind::InvalidReturnType {
                binding: self.kind().as_str().to_string(),
                ty: ty.to_string(),
            })
        }
    }

    fn emit_binding(
        &self,
        annotation: Option<&Annotation>,
        _ty: &TypeDesc,
    ) -> Result<Binding, DiagnosticKind> {
        let fields = Fields::new(annotation, AnnotationKind::QueueOutput);
        Ok(Binding::builder(self.kind(), Direction::Out, self.variable())
            .field("connection", fields.string_or("connection", DEFAULT_CONNECTION))
            .field("queueName", fields.required("queueName")?)
            .build())
    }
}
