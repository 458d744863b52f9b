//! Blob storage trigger, input and output

use fnforge_core::program::Annotation;
use fnforge_core::semantic::SemanticModel;
use fnforge_core::{DiagnosticKind, TypeDesc};

use super::{
    AnnotationKind, DEFAULT_CONNECTION, Fields, ParamSite, ParameterHandler, ReturnHandler,
    TriggerHandler, TriggerSite, data_type, resolved_value,
};
use crate::model::{Binding, BindingKind, Direction};
use crate::shim::Expression;

fn blob_value(model: &dyn SemanticModel, ty: &TypeDesc) -> bool {
    let resolved = model.resolve_alias(ty);
    resolved == TypeDesc::String || resolved.is_byte_array()
}

/// `blobTrigger`
pub struct BlobTriggerHandler;

impl TriggerHandler for BlobTriggerHandler {
    fn kind(&self) -> BindingKind {
        BindingKind::BlobTrigger
    }

    fn validate(&self, model: &dyn SemanticModel, ty: &TypeDesc) -> bool {
        blob_value(model, ty)
    }

    fn emit_binding(&self, site: &TriggerSite<'_>) -> Result<Binding, DiagnosticKind> {
        let f = Fields::new(site.annotation, AnnotationKind::BlobTrigger);
        Ok(Binding::builder(self.kind(), Direction::In, self.variable())
            .field("path", f.required("path")?)
            .field("connection", f.string_or("connection", DEFAULT_CONNECTION))
            .field_opt("dataType", site.payload.map(data_type))
            .build())
    }
}

/// `blob` input
pub struct BlobInputHandler;

impl ParameterHandler for BlobInputHandler {
    fn validate(&self, site: &ParamSite<'_>) -> Result<(), DiagnosticKind> {
        if resolved_value(site.model, site.ty).is_some_and(|v| blob_value(site.model, &v)) {
            Ok(())
        } else {
            Err(site.invalid_type(BindingKind::BlobInput))
        }
    }

    fn emit_extraction(&self, site: &ParamSite<'_>) -> Expression {
        Expression::InputBinding {
            name: site.name.to_string(),
            ty: site.ty.clone(),
        }
    }

    fn emit_binding(&self, site: &ParamSite<'_>) -> Result<Option<Binding>, DiagnosticKind> {
        let f = Fields::new(site.annotation, AnnotationKind::BlobInput);
        Ok(Some(
            Binding::builder(BindingKind::BlobInput, Direction::In, site.name)
                .field("path", f.required("path")?)
                .field("connection", f.string_or("connection", DEFAULT_CONNECTION))
                .field("dataType", data_type(site.ty))
                .build(),
        ))
    }
}

/// `blob` output
pub struct BlobOutputHandler;

impl ReturnHandler for BlobOutputHandler {
    fn kind(&self) -> BindingKind {
        BindingKind::BlobOutput
    }

    fn validate(&self, model: &dyn SemanticModel, ty: &TypeDesc) -> Result<(), DiagnosticKind> {
        if ty.value_type().is_some_and(|v| blob_value(model, &v)) {
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
        ty: &TypeDesc,
    ) -> Result<Binding, DiagnosticKind> {
        let f = Fields::new(annotation, AnnotationKind::BlobOutput);
        let value = ty.value_type().unwrap_or(TypeDesc::String);
        Ok(Binding::builder(self.kind(), Direction::Out, self.variable())
            .field("path", f.required("path")?)
            .field("connection", f.string_or("connection", DEFAULT_CONNECTION))
            .field("dataType", data_type(&value))
            .build())
    }
}
