//! HTTP trigger, response, path, query and header handlers

use serde_json::json;

use fnforge_core::program::Annotation;
use fnforge_core::semantic::SemanticModel;
use fnforge_core::{DiagnosticKind, TypeDesc};

use super::{
    AnnotationKind, Fields, ParamSite, ParameterHandler, ReturnHandler, TriggerHandler,
    TriggerSite, resolved_value,
};
use crate::model::{Binding, BindingKind, Direction};
use crate::shim::{ContentType, Expression};

/// Methods accepted by a `default` (wildcard) resource
pub const DEFAULT_METHODS: [&str; 6] = ["DELETE", "GET", "HEAD", "OPTIONS", "POST", "PUT"];

/// Accessor that accepts every method
pub const WILDCARD_ACCESSOR: &str = "default";

const AUTH_LEVELS: [&str; 3] = ["anonymous", "function", "admin"];

/// `httpTrigger`
pub struct HttpTriggerHandler;

impl TriggerHandler for HttpTriggerHandler {
    fn kind(&self) -> BindingKind {
        BindingKind::Http
    }

    fn variable(&self) -> &'static str {
        "httpPayload"
    }

    fn validate(&self, model: &dyn SemanticModel, ty: &TypeDesc) -> bool {
        model.is_anydata(ty)
    }

    fn emit_extraction(&self, ty: &TypeDesc) -> Expression {
        Expression::Payload {
            default: ContentType::for_type(ty),
            ty: ty.clone(),
        }
    }

    fn emit_binding(&self, site: &TriggerSite<'_>) -> Result<Binding, DiagnosticKind> {
        let fields = Fields::new(site.annotation, AnnotationKind::HttpTrigger);
        let methods = match site.accessor {
            Some(accessor) if !accessor.eq_ignore_ascii_case(WILDCARD_ACCESSOR) => {
                json!([accessor.to_ascii_lowercase()])
            }
            _ => json!(DEFAULT_METHODS),
        };
        Ok(
            Binding::builder(BindingKind::Http, Direction::In, self.variable())
                .field(
                    "authLevel",
                    fields.one_of("authLevel", &AUTH_LEVELS, AUTH_LEVELS[0])?,
                )
                .field("methods", methods)
                .trailing("route", site.route)
                .build(),
        )
    }
}

/// `http` output
pub struct HttpOutputHandler;

impl ReturnHandler for HttpOutputHandler {
    fn kind(&self) -> BindingKind {
        BindingKind::HttpOutput
    }

    fn variable(&self) -> &'static str {
        "resp"
    }

    fn validate(&self, model: &dyn SemanticModel, ty: &TypeDesc) -> Result<(), DiagnosticKind> {
        match ty.value_type() {
            None => Ok(()),
            Some(value) if model.is_anydata(&value) => Ok(()),
            Some(_) => Err(DiagnosticKind::InvalidReturnType {
                binding: self.kind().as_str().to_string(),
                ty: ty.to_string(),
            }),
        }
    }

    fn emit_binding(
        &self,
        _annotation: Option<&Annotation>,
        _ty: &TypeDesc,
    ) -> Result<Binding, DiagnosticKind> {
        Ok(Binding::builder(self.kind(), Direction::Out, self.variable()).build())
    }
}

/// Route placeholder parameters
pub struct PathHandler;

impl ParameterHandler for PathHandler {
    fn validate(&self, site: &ParamSite<'_>) -> Result<(), DiagnosticKind> {
        if site.model.resolve_alias(site.ty).is_basic_scalar() {
            Ok(())
        } else {
            Err(DiagnosticKind::InvalidPathParameterType {
                param: site.name.to_string(),
                ty: site.ty.to_string(),
            })
        }
    }

    fn emit_extraction(&self, site: &ParamSite<'_>) -> Expression {
        Expression::PathParam {
            token: site.name.to_string(),
            ty: site.ty.clone(),
        }
    }

    fn emit_binding(&self, _site: &ParamSite<'_>) -> Result<Option<Binding>, DiagnosticKind> {
        Ok(None)
    }
}

/// Query string parameters
pub struct QueryHandler;

impl ParameterHandler for QueryHandler {
    fn validate(&self, site: &ParamSite<'_>) -> Result<(), DiagnosticKind> {
        require_http(site, AnnotationKind::Query)?;
        match resolved_value(site.model, site.ty) {
            Some(value) if site.model.is_basic(&value) => Ok(()),
            _ => Err(DiagnosticKind::InvalidQueryParameterType {
                param: site.name.to_string(),
                ty: site.ty.to_string(),
            }),
        }
    }

    fn emit_extraction(&self, site: &ParamSite<'_>) -> Expression {
        let fields = Fields::new(site.annotation, AnnotationKind::Query);
        Expression::Query {
            name: fields.string_or("name", site.name),
            ty: site.ty.clone(),
        }
    }

    fn emit_binding(&self, _site: &ParamSite<'_>) -> Result<Option<Binding>, DiagnosticKind> {
        Ok(None)
    }
}

/// Request header parameters
pub struct HeaderHandler;

impl HeaderHandler {
    fn header_value(model: &dyn SemanticModel, ty: &TypeDesc) -> bool {
        resolved_value(model, ty).is_some_and(|value| model.is_basic(&value))
    }
}

impl ParameterHandler for HeaderHandler {
    fn validate(&self, site: &ParamSite<'_>) -> Result<(), DiagnosticKind> {
        require_http(site, AnnotationKind::Header)?;
        let invalid = || DiagnosticKind::InvalidHeaderParameterType {
            param: site.name.to_string(),
            ty: site.ty.to_string(),
        };

        if Self::header_value(site.model, site.ty) {
            return Ok(());
        }
        let value = site.ty.without_nil().ok_or_else(invalid)?;
        let record = site.model.record_type(&value).ok_or_else(invalid)?;
        if record.rest.is_some() {
            return Err(DiagnosticKind::HeaderRecordRestField {
                param: site.name.to_string(),
                record: value.to_string(),
            });
        }
        if record
            .fields
            .values()
            .all(|field| Self::header_value(site.model, field))
        {
            Ok(())
        } else {
            Err(invalid())
        }
    }

    fn emit_extraction(&self, site: &ParamSite<'_>) -> Expression {
        let record = site
            .ty
            .without_nil()
            .and_then(|value| site.model.record_type(&value).cloned());
        match record {
            Some(record) => Expression::HeaderRecord {
                fields: record.fields.keys().cloned().collect(),
                ty: site.ty.clone(),
            },
            None => {
                let fields = Fields::new(site.annotation, AnnotationKind::Header);
                Expression::Header {
                    name: fields.string_or("name", site.name),
                    ty: site.ty.clone(),
                }
            }
        }
    }

    fn emit_binding(&self, _site: &ParamSite<'_>) -> Result<Option<Binding>, DiagnosticKind> {
        Ok(None)
    }
}

fn require_http(site: &ParamSite<'_>, kind: AnnotationKind) -> Result<(), DiagnosticKind> {
    if site.trigger.kind() == BindingKind::Http {
        Ok(())
    } else {
        Err(DiagnosticKind::MisplacedAnnotation {
            annotation: kind.qualified_name().to_string(),
            target: format!("a {} handler", site.trigger.kind().as_str()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::*;
    use super::super::queue::QueueTriggerHandler;
    use super::*;
    use fnforge_core::ProgramModel;
    use rstest::rstest;

    fn site<'a>(
        model: &'a ProgramModel,
        name: &'a str,
        ty: &'a TypeDesc,
        trigger: &'a dyn TriggerHandler,
    ) -> ParamSite<'a> {
        ParamSite {
            name,
            ty,
            annotation: None,
            model,
            trigger,
        }
    }

    fn trigger_json(site: TriggerSite<'_>) -> String {
        serde_json::to_string(&HttpTriggerHandler.emit_binding(&site).unwrap()).unwrap()
    }

    #[test]
    fn test_http_trigger_binding() {
        let json = trigger_json(TriggerSite {
            annotation: None,
            accessor: Some("post"),
            route: "hello/foo/{bar}",
            payload: None,
        });
        assert_eq!(
            json,
            r#"{"type":"httpTrigger","authLevel":"anonymous","methods":["post"],"direction":"in","name":"httpPayload","route":"hello/foo/{bar}"}"#
        );
    }

    #[test]
    fn test_default_accessor_accepts_every_method() {
        let binding = HttpTriggerHandler
            .emit_binding(&TriggerSite {
                annotation: None,
                accessor: Some("default"),
                route: "hello",
                payload: None,
            })
            .unwrap();
        assert_eq!(
            binding.field("methods").unwrap(),
            &json!(["DELETE", "GET", "HEAD", "OPTIONS", "POST", "PUT"])
        );
    }

    #[test]
    fn test_auth_level_from_annotation() {
        let ann = annotation("af:HttpTrigger", &[("authLevel", "function")]);
        let binding = HttpTriggerHandler
            .emit_binding(&TriggerSite {
                annotation: Some(&ann),
                accessor: Some("GET"),
                route: "r",
                payload: None,
            })
            .unwrap();
        assert_eq!(binding.field("authLevel").unwrap(), "function");
        assert_eq!(binding.field("methods").unwrap(), &json!(["get"]));

        let bad = annotation("af:HttpTrigger", &[("authLevel", "root")]);
        let err = HttpTriggerHandler
            .emit_binding(&TriggerSite {
                annotation: Some(&bad),
                accessor: Some("get"),
                route: "r",
                payload: None,
            })
            .unwrap_err();
        assert_eq!(err.code(), "FNF106");
    }

    #[rstest]
    #[case("string", true)]
    #[case("int", true)]
    #[case("decimal", true)]
    #[case("boolean", true)]
    #[case("string?", false)]
    #[case("Person", false)]
    #[case("int[]", false)]
    fn test_path_types(#[case] ty: &str, #[case] ok: bool) {
        let m = model();
        let ty = self::ty(ty);
        assert_eq!(
            PathHandler
                .validate(&site(&m, "id", &ty, &HttpTriggerHandler))
                .is_ok(),
            ok
        );
    }

    #[rstest]
    #[case("string", true)]
    #[case("int?", true)]
    #[case("float[]", true)]
    #[case("boolean[]?", true)]
    #[case("Person", false)]
    #[case("map<string>", false)]
    #[case("json", false)]
    fn test_query_types(#[case] ty: &str, #[case] ok: bool) {
        let m = model();
        let ty = self::ty(ty);
        assert_eq!(
            QueryHandler
                .validate(&site(&m, "q", &ty, &HttpTriggerHandler))
                .is_ok(),
            ok
        );
    }

    #[rstest]
    #[case("string", None)]
    #[case("string[]?", None)]
    #[case("Headers", None)]
    #[case("Headers?", None)]
    #[case("OpenHeaders", Some("FNF204"))]
    #[case("Nested", Some("FNF203"))]
    #[case("json", Some("FNF203"))]
    fn test_header_types(#[case] ty: &str, #[case] code: Option<&str>) {
        let m = model();
        let ty = self::ty(ty);
        let result = HeaderHandler.validate(&site(&m, "h", &ty, &HttpTriggerHandler));
        assert_eq!(result.err().map(|e| e.code()), code);
    }

    #[test]
    fn test_header_record_extraction() {
        let m = model();
        let ty = ty("Headers");
        let expr = HeaderHandler.emit_extraction(&site(&m, "h", &ty, &HttpTriggerHandler));
        assert_eq!(
            expr,
            Expression::HeaderRecord {
                fields: vec!["x-request-id".into(), "accept".into(), "trace".into()],
                ty: ty.clone(),
            }
        );
    }

    #[test]
    fn test_header_outside_http_is_misplaced() {
        let m = model();
        let ty = ty("string");
        let err = HeaderHandler
            .validate(&site(&m, "h", &ty, &QueueTriggerHandler))
            .unwrap_err();
        assert_eq!(err.code(), "FNF108");
    }

    #[rstest]
    #[case("string|error", true)]
    #[case("Person|error?", true)]
    #[case("()", true)]
    #[case("Client", false)]
    fn test_http_output_types(#[case] ty: &str, #[case] ok: bool) {
        let m = model();
        assert_eq!(HttpOutputHandler.validate(&m, &self::ty(ty)).is_ok(), ok);
    }
}
