//! Binding classification
//!
//! Turns each extracted handler into a [`FunctionContext`]:
//!
//! 1. resolve the service's trigger annotation against its listener
//! 2. build the route and the function name (HTTP) or the attach name
//! 3. walk route placeholders, then parameters in declaration order,
//!    assigning each a handler from the registry
//! 4. classify the return type and pick the output binding
//! 5. emit the trigger binding and assemble the shim
//!
//! Problems are reported as diagnostics; a handler with any error
//! diagnostic produces no context.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

use fnforge_core::program::{
    Annotation, FunctionDecl, Param, ParamKind, PathSegment, ReturnDecl, is_identifier,
};
use fnforge_core::semantic::SemanticModel;
use fnforge_core::{Diagnostic, DiagnosticKind, DiagnosticSink, TypeDesc};

use crate::extractor::{ListenerKind, ServiceUnit};
use crate::model::{Binding, FunctionContext};
use crate::payload::{ParamCandidate, disambiguate};
use crate::registry::{
    self, AnnotationKind, Lookup, ParamHandlerKind, ParamSite, Placement, ReturnHandler,
    TriggerSite, http::HttpOutputHandler,
};
use crate::shim::{Expression, ShimFunction, Statement, SyntheticNames};

static FUNCTION_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_-]{0,127}$").expect("function name pattern"));

/// Whether the host accepts `name` as a function name
pub fn is_valid_function_name(name: &str) -> bool {
    FUNCTION_NAME.is_match(name)
}

/// Replace every character the host rejects with `_`
pub fn sanitize_function_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// A route placeholder bound to a handler argument
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteParam {
    /// Placeholder name, or its position for unnamed segments
    pub token: String,

    /// Declared (element) type
    pub ty: TypeDesc,

    /// Whether it captures the remaining segments
    pub rest: bool,
}

/// The full route of an HTTP handler
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Route {
    /// Route template without a leading slash
    pub path: String,

    /// Segment labels used to derive the function name
    pub labels: Vec<String>,

    /// Placeholders in route order
    pub params: Vec<RouteParam>,
}

impl Route {
    /// Join the service attach path and a handler's relative path.
    ///
    /// Named placeholders become `{name}`, unnamed ones `{<position>}` where
    /// the position counts every segment of the full route from zero, and a
    /// rest segment becomes `{*name}`.
    pub fn build(base: &[String], relative: &[PathSegment]) -> Self {
        let mut segments: Vec<String> = base.to_vec();
        let mut labels: Vec<String> = base.to_vec();
        let mut params = Vec::new();

        for segment in relative {
            let position = segments.len();
            match segment {
                PathSegment::Literal(text) => {
                    segments.push(text.clone());
                    labels.push(text.clone());
                }
                PathSegment::Param { name, ty } => {
                    let token = match name {
                        Some(name) if is_identifier(name) => name.clone(),
                        _ => position.to_string(),
                    };
                    segments.push(format!("{{{}}}", token));
                    labels.push(token.clone());
                    params.push(RouteParam {
                        token,
                        ty: ty.clone(),
                        rest: false,
                    });
                }
                PathSegment::Rest { name, ty } => {
                    segments.push(format!("{{*{}}}", name));
                    labels.push(name.clone());
                    params.push(RouteParam {
                        token: name.clone(),
                        ty: ty.clone(),
                        rest: true,
                    });
                }
            }
        }

        Self {
            path: segments.join("/"),
            labels,
            params,
        }
    }

    /// Reject two placeholders with the same token
    pub fn check(&self) -> Result<(), DiagnosticKind> {
        let mut seen = HashSet::new();
        for param in &self.params {
            if !seen.insert(param.token.as_str()) {
                return Err(DiagnosticKind::DuplicatePathParameter {
                    route: self.path.clone(),
                    token: param.token.clone(),
                });
            }
        }
        Ok(())
    }
}

/// Derive a handler's function name
///
/// HTTP handlers are named after their accessor and route labels
/// (`post-hello`); other handlers after the service attach name, suffixed
/// with the handler name when the service exports several.
pub fn function_name(unit: &ServiceUnit<'_>, handler: &FunctionDecl, route: &Route) -> String {
    let raw = match unit.listener {
        ListenerKind::Http => {
            let accessor = handler.accessor.as_deref().unwrap_or(&handler.name);
            std::iter::once(accessor.to_ascii_lowercase())
                .chain(route.labels.iter().cloned())
                .collect::<Vec<_>>()
                .join("-")
        }
        _ => {
            let base = unit.service.name.as_deref().unwrap_or(&handler.name);
            if unit.handlers.len() > 1 {
                format!("{}-{}", base, handler.name)
            } else {
                base.to_string()
            }
        }
    };
    sanitize_function_name(&raw)
}

/// A parameter that passed the shape and annotation checks
struct Prepared<'a> {
    param: &'a Param,
    ty: TypeDesc,
    annotation: Option<&'a Annotation>,
    explicit: Option<ParamHandlerKind>,
}

type Output<'a> = Option<(&'static dyn ReturnHandler, Option<&'a Annotation>)>;

/// Classifies the handlers of extracted services
pub struct Classifier<'m> {
    model: &'m dyn SemanticModel,
}

impl<'m> Classifier<'m> {
    /// Create a classifier over a semantic model
    pub fn new(model: &'m dyn SemanticModel) -> Self {
        Self { model }
    }

    /// Classify every handler of a service
    pub fn classify(
        &self,
        unit: &ServiceUnit<'_>,
        sink: &mut dyn DiagnosticSink,
    ) -> Vec<FunctionContext> {
        let trigger = match self.service_trigger(unit) {
            Ok(trigger) => trigger,
            Err(diagnostic) => {
                sink.report(diagnostic);
                return Vec::new();
            }
        };

        let mut functions = Vec::new();
        for handler in &unit.handlers {
            let mut diagnostics = Vec::new();
            let context = self.classify_handler(unit, trigger, handler, &mut diagnostics);
            for diagnostic in diagnostics {
                sink.report(diagnostic);
            }
            if let Some(context) = context {
                tracing::debug!(
                    "Classified '{}' as function '{}' ({} binding(s))",
                    handler.name,
                    context.name(),
                    context.bindings().len()
                );
                functions.push(context);
            }
        }
        functions
    }

    fn qualified(&self, unit: &ServiceUnit<'_>, annotation: &Annotation) -> String {
        self.model
            .resolve_qualified(&unit.document.name, &annotation.name)
    }

    /// The service-level trigger annotation, if any
    fn service_trigger<'a>(
        &self,
        unit: &ServiceUnit<'a>,
    ) -> Result<Option<&'a Annotation>, Diagnostic> {
        let mut found: Option<&'a Annotation> = None;
        for annotation in &unit.service.annotations {
            let qualified = self.qualified(unit, annotation);
            let at = || annotation.location.clone();
            match AnnotationKind::lookup(&qualified) {
                Lookup::Foreign => {}
                Lookup::Unsupported => {
                    return Err(DiagnosticKind::UnsupportedBindingKind {
                        annotation: qualified,
                    }
                    .at(at()));
                }
                Lookup::Known(kind) if kind.placement() != Placement::Service => {
                    return Err(DiagnosticKind::MisplacedAnnotation {
                        annotation: qualified,
                        target: "a service".to_string(),
                    }
                    .at(at()));
                }
                Lookup::Known(kind) if kind.listener() != Some(unit.listener) => {
                    return Err(DiagnosticKind::MismatchedTriggerAnnotation {
                        annotation: qualified,
                        listener: unit.listener.qualified_name().to_string(),
                    }
                    .at(at()));
                }
                Lookup::Known(_) => match found {
                    None => found = Some(annotation),
                    Some(first) => {
                        return Err(DiagnosticKind::MultipleParameterAnnotations {
                            param: unit.label(),
                            first: first.name.clone(),
                            second: annotation.name.clone(),
                        }
                        .at(at()));
                    }
                },
            }
        }

        if found.is_none() && !unit.listener.annotation_optional() {
            return Err(DiagnosticKind::MissingTriggerAnnotation {
                service: unit.label(),
                expected: unit.listener.trigger_annotation().qualified_name().to_string(),
            }
            .at(unit.service.location.clone()));
        }
        Ok(found)
    }

    fn classify_handler(
        &self,
        unit: &ServiceUnit<'_>,
        trigger_annotation: Option<&Annotation>,
        handler: &FunctionDecl,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Option<FunctionContext> {
        let trigger = registry::trigger_handler(unit.listener);
        let route = match unit.listener {
            ListenerKind::Http => Route::build(&unit.service.base_path, &handler.path),
            _ => Route::default(),
        };
        if let Err(kind) = route.check() {
            diagnostics.push(kind.at(handler.location.clone()));
        }

        let name = function_name(unit, handler, &route);
        if !is_valid_function_name(&name) {
            diagnostics.push(
                DiagnosticKind::InvalidFunctionName { name: name.clone() }
                    .at(handler.location.clone()),
            );
        }

        let prepared = self.prepare_params(unit, handler, diagnostics);
        if !diagnostics.is_empty() {
            return None;
        }

        let mut names = SyntheticNames::new();
        let mut shim = ShimFunction::new(&name, &handler.name);
        let mut args = Vec::new();
        let mut others: Vec<Binding> = Vec::new();

        let path_handler = registry::parameter_handler(ParamHandlerKind::Path);
        for param in &route.params {
            let site = ParamSite {
                name: &param.token,
                ty: &param.ty,
                annotation: None,
                model: self.model,
                trigger,
            };
            if let Err(kind) = path_handler.validate(&site) {
                diagnostics.push(kind.at(handler.location.clone()));
                continue;
            }
            let expr = if param.rest {
                Expression::RestPath {
                    name: param.token.clone(),
                    ty: TypeDesc::Array(Box::new(param.ty.clone())),
                }
            } else {
                path_handler.emit_extraction(&site)
            };
            let var = names.fresh("arg");
            shim.push(Statement::Bind {
                var: var.clone(),
                expr,
            });
            args.push(var);
        }

        let candidates: Vec<ParamCandidate<'_>> = prepared
            .iter()
            .map(|p| ParamCandidate {
                name: &p.param.name,
                ty: &p.ty,
                explicit: p.explicit,
            })
            .collect();
        let availability = disambiguate(self.model, unit.listener, &candidates);
        for (index, kind) in &availability.errors {
            diagnostics.push(kind.clone().at(prepared[*index].param.location.clone()));
        }

        for (p, role) in prepared.iter().zip(&availability.roles) {
            let param_handler = registry::parameter_handler(*role);
            let site = ParamSite {
                name: &p.param.name,
                ty: &p.ty,
                annotation: p.annotation,
                model: self.model,
                trigger,
            };
            let location = || p.param.location.clone();
            if let Err(kind) = param_handler.validate(&site) {
                diagnostics.push(kind.at(location()));
                continue;
            }
            match param_handler.emit_binding(&site) {
                Ok(Some(binding)) => others.push(binding),
                Ok(None) => {}
                Err(kind) => {
                    diagnostics.push(kind.at(location()));
                    continue;
                }
            }
            let var = names.fresh("arg");
            shim.push(Statement::Bind {
                var: var.clone(),
                expr: param_handler.emit_extraction(&site),
            });
            args.push(var);
        }

        let returns = &handler.returns;
        let return_ty = match returns.ty.effective() {
            Ok(ty) => ty,
            Err(_) => {
                diagnostics.push(
                    DiagnosticKind::InvalidIntersectionType {
                        param: "return".to_string(),
                        ty: returns.ty.to_string(),
                    }
                    .at(returns.location.clone()),
                );
                return None;
            }
        };
        let output = match self.return_output(unit, &name, returns, &return_ty) {
            Ok(output) => output,
            Err(diagnostic) => {
                diagnostics.push(diagnostic);
                None
            }
        };

        let result = return_ty.value_type().map(|_| names.fresh("ret"));
        shim.push(Statement::Invoke {
            handler: handler.name.clone(),
            args,
            result: result.clone(),
            fallible: return_ty.contains_error(),
        });
        if let Some((return_handler, annotation)) = output {
            if let Err(kind) = return_handler.validate(self.model, &return_ty) {
                diagnostics.push(kind.at(returns.location.clone()));
            }
            match return_handler.emit_binding(annotation, &return_ty) {
                Ok(binding) => others.push(binding),
                Err(kind) => diagnostics.push(kind.at(returns.location.clone())),
            }
            shim.push(return_handler.emit_marshal(result.as_deref(), &return_ty));
        }

        let payload = availability.payload.map(|index| &prepared[index].ty);
        let site = TriggerSite {
            annotation: trigger_annotation,
            accessor: handler.accessor.as_deref(),
            route: &route.path,
            payload,
        };
        let trigger_binding = match trigger.emit_binding(&site) {
            Ok(binding) => binding,
            Err(kind) => {
                let location = trigger_annotation
                    .map(|a| a.location.clone())
                    .unwrap_or_else(|| unit.service.location.clone());
                diagnostics.push(kind.at(location));
                return None;
            }
        };

        if !diagnostics.is_empty() {
            return None;
        }

        match FunctionContext::new(
            name,
            unit.document.name.clone(),
            handler.location.clone(),
            trigger_binding,
            others,
            shim,
        ) {
            Ok(context) => Some(context),
            Err(kind) => {
                diagnostics.push(kind.at(handler.location.clone()));
                None
            }
        }
    }

    /// Shape, annotation and intersection checks for every parameter
    fn prepare_params<'a>(
        &self,
        unit: &ServiceUnit<'_>,
        handler: &'a FunctionDecl,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Vec<Prepared<'a>> {
        let mut prepared = Vec::new();
        for param in &handler.params {
            if param.kind != ParamKind::Required {
                diagnostics.push(
                    DiagnosticKind::InvalidParameterShape {
                        param: param.name.clone(),
                        kind: param.kind.as_str().to_string(),
                    }
                    .at(param.location.clone()),
                );
                continue;
            }

            let annotation = match self.param_annotation(unit, param) {
                Ok(annotation) => annotation,
                Err(diagnostic) => {
                    diagnostics.push(diagnostic);
                    continue;
                }
            };

            let ty = match param.ty.effective() {
                Ok(ty) => ty,
                Err(_) => {
                    diagnostics.push(
                        DiagnosticKind::InvalidIntersectionType {
                            param: param.name.clone(),
                            ty: param.ty.to_string(),
                        }
                        .at(param.location.clone()),
                    );
                    continue;
                }
            };

            prepared.push(Prepared {
                param,
                ty,
                annotation: annotation.map(|(_, a)| a),
                explicit: annotation.map(|(kind, _)| kind),
            });
        }
        prepared
    }

    /// The single binding annotation of a parameter
    fn param_annotation<'a>(
        &self,
        unit: &ServiceUnit<'_>,
        param: &'a Param,
    ) -> Result<Option<(ParamHandlerKind, &'a Annotation)>, Diagnostic> {
        let mut found: Option<(ParamHandlerKind, &'a Annotation)> = None;
        for annotation in &param.annotations {
            let qualified = self.qualified(unit, annotation);
            let kind = match AnnotationKind::lookup(&qualified) {
                Lookup::Foreign => continue,
                Lookup::Unsupported => {
                    return Err(DiagnosticKind::UnsupportedBindingKind {
                        annotation: qualified,
                    }
                    .at(annotation.location.clone()));
                }
                Lookup::Known(kind) => kind,
            };
            let Some(handler_kind) = kind.param_handler() else {
                return Err(DiagnosticKind::MisplacedAnnotation {
                    annotation: qualified,
                    target: format!("parameter '{}'", param.name),
                }
                .at(annotation.location.clone()));
            };
            if let Some((_, first)) = found {
                return Err(DiagnosticKind::MultipleParameterAnnotations {
                    param: param.name.clone(),
                    first: first.name.clone(),
                    second: annotation.name.clone(),
                }
                .at(annotation.location.clone()));
            }
            found = Some((handler_kind, annotation));
        }
        Ok(found)
    }

    /// The output binding selected by the return type
    fn return_output<'a>(
        &self,
        unit: &ServiceUnit<'_>,
        function: &str,
        returns: &'a ReturnDecl,
        ty: &TypeDesc,
    ) -> Result<Output<'a>, Diagnostic> {
        let mut found: Option<(AnnotationKind, &'a Annotation)> = None;
        for annotation in &returns.annotations {
            let qualified = self.qualified(unit, annotation);
            let at = || annotation.location.clone();
            let kind = match AnnotationKind::lookup(&qualified) {
                Lookup::Foreign => continue,
                Lookup::Unsupported => {
                    return Err(DiagnosticKind::UnsupportedBindingKind {
                        annotation: qualified,
                    }
                    .at(at()));
                }
                Lookup::Known(kind) => kind,
            };
            if kind.placement() != Placement::Return {
                return Err(DiagnosticKind::MisplacedAnnotation {
                    annotation: qualified,
                    target: "a return type".to_string(),
                }
                .at(at()));
            }
            if let Some((_, first)) = found {
                return Err(DiagnosticKind::MultipleParameterAnnotations {
                    param: "return".to_string(),
                    first: first.name.clone(),
                    second: annotation.name.clone(),
                }
                .at(at()));
            }
            found = Some((kind, annotation));
        }

        let is_http = unit.listener == ListenerKind::Http;
        match found {
            Some((AnnotationKind::HttpOutput, annotation)) if !is_http => {
                Err(DiagnosticKind::MisplacedAnnotation {
                    annotation: AnnotationKind::HttpOutput.qualified_name().to_string(),
                    target: format!(
                        "a {} handler",
                        registry::trigger_handler(unit.listener).kind().as_str()
                    ),
                }
                .at(annotation.location.clone()))
            }
            Some((kind, annotation)) => {
                Ok(registry::return_handler(kind).map(|handler| (handler, Some(annotation))))
            }
            None if is_http => Ok(Some((&HttpOutputHandler, None))),
            None if ty.value_type().is_none() => Ok(None),
            None => Err(DiagnosticKind::MissingReturnAnnotation {
                function: function.to_string(),
                ty: ty.to_string(),
            }
            .at(returns.location.clone())),
        }
    }
}
