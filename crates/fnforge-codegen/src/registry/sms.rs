//! SMS (Twilio) output

use fnforge_core::program::Annotation;
use fnforge_core::semantic::SemanticModel;
use fnforge_core::{DiagnosticKind, TypeDesc};

use super::{AnnotationKind, Fields, ReturnHandler};
use crate::model::{Binding, BindingKind, Direction};

/// App setting holding the account SID unless configured otherwise
pub const DEFAULT_ACCOUNT_SID_SETTING: &str = "AzureWebJobsTwilioAccountSID";

/// App setting holding the auth token unless configured otherwise
pub const DEFAULT_AUTH_TOKEN_SETTING: &str = "AzureWebJobsTwilioAuthToken";

/// `twilioSms` output
pub struct SmsOutputHandler;

impl ReturnHandler for SmsOutputHandler {
    fn kind(&self) -> BindingKind {
        BindingKind::SmsOutput
    }

    fn validate(&self, model: &dyn SemanticModel, ty: &TypeDesc) -> Result<(), DiagnosticKind> {
        if ty
            .value_type()
            .is_some_and(|v| model.resolve_alias(&v) == TypeDesc::String)
        {
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
        let f = Fields::new(annotation, AnnotationKind::TwilioSmsOutput);
        Ok(Binding::builder(self.kind(), Direction::Out, self.variable())
            .field(
                "accountSidSetting",
                f.string_or("accountSidSetting", DEFAULT_ACCOUNT_SID_SETTING),
            )
            .field(
                "authTokenSetting",
                f.string_or("authTokenSetting", DEFAULT_AUTH_TOKEN_SETTING),
            )
            .field("from", f.required("fromNumber")?)
            .field("to", f.required("toNumber")?)
            .build())
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::*;
    use super::*;

    #[test]
    fn test_sms_binding() {
        let ann = annotation(
            "af:TwilioSmsOutput",
            &[("fromNumber", "+12069845840"), ("toNumber", "+94771234567")],
        );
        let binding = SmsOutputHandler.emit_binding(Some(&ann), &ty("string")).unwrap();
        assert_eq!(
            serde_json::to_string(&binding).unwrap(),
            r#"{"type":"twilioSms","accountSidSetting":"AzureWebJobsTwilioAccountSID","authTokenSetting":"AzureWebJobsTwilioAuthToken","from":"+12069845840","to":"+94771234567","direction":"out","name":"outMsg"}"#
        );
    }

    #[test]
    fn test_from_number_is_required() {
        let ann = annotation("af:TwilioSmsOutput", &[("toNumber", "+1")]);
        let err = SmsOutputHandler.emit_binding(Some(&ann), &ty("string")).unwrap_err();
        assert!(err.message().contains("fromNumber"));
    }

    #[test]
    fn test_sms_return_types() {
        let m = model();
        assert!(SmsOutputHandler.validate(&m, &ty("string|error")).is_ok());
        assert!(SmsOutputHandler.validate(&m, &ty("json")).is_err());
    }
}
