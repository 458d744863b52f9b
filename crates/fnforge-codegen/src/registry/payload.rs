//! Request body and trigger data parameters

use fnforge_core::DiagnosticKind;

use super::{ParamSite, ParameterHandler};
use crate::model::Binding;
use crate::shim::Expression;

/// Binds the request body (HTTP) or the trigger data (other triggers).
/// The accepted types are the trigger's.
pub struct PayloadHandler;

impl ParameterHandler for PayloadHandler {
    fn validate(&self, site: &ParamSite<'_>) -> Result<(), DiagnosticKind> {
        if site.trigger.validate(site.model, site.ty) {
            Ok(())
        } else {
            Err(DiagnosticKind::InvalidPayloadParameterType {
                param: site.name.to_string(),
                ty: site.ty.to_string(),
            })
        }
    }

    fn emit_extraction(&self, site: &ParamSite<'_>) -> Expression {
        site.trigger.emit_extraction(site.ty)
    }

    fn emit_binding(&self, _site: &ParamSite<'_>) -> Result<Option<Binding>, DiagnosticKind> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::*;
    use super::super::http::HttpTriggerHandler;
    use super::super::queue::QueueTriggerHandler;
    use super::super::TriggerHandler;
    use super::*;
    use crate::shim::ContentType;

    #[test]
    fn test_http_payload_is_decoded_from_body() {
        let m = model();
        let ty = ty("Person");
        let site = ParamSite {
            name: "person",
            ty: &ty,
            annotation: None,
            model: &m,
            trigger: &HttpTriggerHandler,
        };
        assert!(PayloadHandler.validate(&site).is_ok());
        assert_eq!(
            PayloadHandler.emit_extraction(&site),
            Expression::Payload {
                default: ContentType::Json,
                ty: ty.clone()
            }
        );
    }

    #[test]
    fn test_queue_payload_reads_trigger_data() {
        let m = model();
        let ty = ty("string");
        let trigger: &dyn TriggerHandler = &QueueTriggerHandler;
        let site = ParamSite {
            name: "msg",
            ty: &ty,
            annotation: None,
            model: &m,
            trigger,
        };
        assert_eq!(
            PayloadHandler.emit_extraction(&site),
            Expression::TriggerData {
                binding: "inMsg".into(),
                ty: ty.clone()
            }
        );
    }

    #[test]
    fn test_non_anydata_payload_rejected() {
        let m = model();
        let ty = ty("Client");
        let site = ParamSite {
            name: "client",
            ty: &ty,
            annotation: None,
            model: &m,
            trigger: &HttpTriggerHandler,
        };
        assert_eq!(PayloadHandler.validate(&site).unwrap_err().code(), "FNF205");
    }
}
