//! Timer trigger

use fnforge_core::semantic::SemanticModel;
use fnforge_core::{DiagnosticKind, TypeDesc};

use super::{AnnotationKind, Fields, TriggerHandler, TriggerSite, is_record};
use crate::model::{Binding, BindingKind, Direction};

/// Timer functions also run when the host starts unless configured otherwise
pub const DEFAULT_RUN_ON_STARTUP: bool = true;

/// `timerTrigger`
pub struct TimerTriggerHandler;

impl TriggerHandler for TimerTriggerHandler {
    fn kind(&self) -> BindingKind {
        BindingKind::TimerTrigger
    }

    fn validate(&self, model: &dyn SemanticModel, ty: &TypeDesc) -> bool {
        match model.resolve_alias(ty) {
            TypeDesc::Json | TypeDesc::AnyData => true,
            other => is_record(model, &other) && model.is_anydata(&other),
        }
    }

    fn emit_binding(&self, site: &TriggerSite<'_>) -> Result<Binding, DiagnosticKind> {
        let f = Fields::new(site.annotation, AnnotationKind::TimerTrigger);
        Ok(Binding::builder(self.kind(), Direction::In, self.variable())
            .field("schedule", f.required("schedule")?)
            .field(
                "runOnStartup",
                f.boolean("runOnStartup")?.unwrap_or(DEFAULT_RUN_ON_STARTUP),
            )
            .build())
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::*;
    use super::*;
    use rstest::rstest;

    fn binding(fields: &[(&str, &str)]) -> Result<Binding, DiagnosticKind> {
        let ann = annotation("af:TimerTrigger", fields);
        TimerTriggerHandler.emit_binding(&TriggerSite {
            annotation: Some(&ann),
            accessor: None,
            route: "",
            payload: None,
        })
    }

    #[test]
    fn test_timer_binding() {
        let binding = binding(&[("schedule", "*/10 * * * * *")]).unwrap();
        assert_eq!(
            serde_json::to_string(&binding).unwrap(),
            r#"{"type":"timerTrigger","schedule":"*/10 * * * * *","runOnStartup":true,"direction":"in","name":"inMsg"}"#
        );
    }

    #[test]
    fn test_run_on_startup_override() {
        let binding = binding(&[("schedule", "0 0 * * * *"), ("runOnStartup", "false")]).unwrap();
        assert_eq!(binding.field("runOnStartup").unwrap(), false);
    }

    #[test]
    fn test_bad_run_on_startup() {
        let err = binding(&[("schedule", "0 0 * * * *"), ("runOnStartup", "yes")]).unwrap_err();
        assert_eq!(err.code(), "FNF106");
    }

    #[rstest]
    #[case("json", true)]
    #[case("anydata", true)]
    #[case("Person", true)]
    #[case("string", false)]
    #[case("Client", false)]
    fn test_payload_types(#[case] ty: &str, #[case] ok: bool) {
        assert_eq!(TimerTriggerHandler.validate(&model(), &self::ty(ty)), ok);
    }
}
