//! Trigger metadata parameters (`BindingName`)

use fnforge_core::{DiagnosticKind, TypeDesc};

use super::{AnnotationKind, Fields, ParamSite, ParameterHandler};
use crate::model::{Binding, BindingKind, Direction};
use crate::shim::Expression;

/// Binds a trigger metadata entry to a `string` parameter
pub struct MetadataHandler;

impl MetadataHandler {
    fn key(site: &ParamSite<'_>) -> String {
        Fields::new(site.annotation, AnnotationKind::BindingName).string_or("name", site.name)
    }
}

impl ParameterHandler for MetadataHandler {
    fn validate(&self, site: &ParamSite<'_>) -> Result<(), DiagnosticKind> {
        if site.model.resolve_alias(site.ty) == TypeDesc::String {
            Ok(())
        } else {
            Err(site.invalid_type(BindingKind::Metadata))
        }
    }

    fn emit_extraction(&self, site: &ParamSite<'_>) -> Expression {
        Expression::Metadata {
            key: Self::key(site),
            ty: site.ty.clone(),
        }
    }

    fn emit_binding(&self, site: &ParamSite<'_>) -> Result<Option<Binding>, DiagnosticKind> {
        Ok(Some(
            Binding::builder(BindingKind::Metadata, Direction::In, Self::key(site)).build(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::*;
    use super::super::blob::BlobTriggerHandler;
    use super::*;

    #[test]
    fn test_metadata_key_defaults_to_parameter_name() {
        let m = model();
        let ty = ty("string");
        let site = ParamSite {
            name: "name",
            ty: &ty,
            annotation: None,
            model: &m,
            trigger: &BlobTriggerHandler,
        };
        assert!(MetadataHandler.validate(&site).is_ok());
        assert_eq!(
            MetadataHandler.emit_extraction(&site),
            Expression::Metadata {
                key: "name".into(),
                ty: ty.clone()
            }
        );
        let binding = MetadataHandler.emit_binding(&site).unwrap().unwrap();
        assert!(!binding.kind().is_emitted());
    }

    #[test]
    fn test_metadata_must_be_string() {
        let m = model();
        let ty = ty("int");
        let ann = annotation("af:BindingName", &[("name", "DequeueCount")]);
        let site = ParamSite {
            name: "count",
            ty: &ty,
            annotation: Some(&ann),
            model: &m,
            trigger: &BlobTriggerHandler,
        };
        assert_eq!(MetadataHandler.validate(&site).unwrap_err().code(), "FNF210");
    }
}
