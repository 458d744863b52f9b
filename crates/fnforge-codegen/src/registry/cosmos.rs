//! Document database (Cosmos DB) trigger, input and output

use fnforge_core::program::Annotation;
use fnforge_core::semantic::SemanticModel;
use fnforge_core::{DiagnosticKind, TypeDesc};

use super::{
    AnnotationKind, Fields, ParamSite, ParameterHandler, ReturnHandler, TriggerHandler,
    TriggerSite, is_record, is_record_array, resolved_value,
};
use crate::model::{Binding, BindingKind, Direction};
use crate::shim::Expression;

/// Lease collection created when missing unless configured otherwise
pub const DEFAULT_CREATE_LEASE_COLLECTION: bool = true;

/// Lease collection throughput unless configured otherwise
pub const DEFAULT_LEASES_THROUGHPUT: i64 = 400;

/// `cosmosDBTrigger`
pub struct CosmosTriggerHandler;

impl TriggerHandler for CosmosTriggerHandler {
    fn kind(&self) -> BindingKind {
        BindingKind::DocumentTrigger
    }

    fn validate(&self, model: &dyn SemanticModel, ty: &TypeDesc) -> bool {
        match model.resolve_alias(ty) {
            TypeDesc::Json => true,
            TypeDesc::Array(element) => match model.resolve_alias(&element) {
                TypeDesc::Json => true,
                map @ TypeDesc::Map(_) => model.is_anydata(&map),
                other => is_record(model, &other),
            },
            _ => false,
        }
    }

    fn emit_binding(&self, site: &TriggerSite<'_>) -> Result<Binding, DiagnosticKind> {
        let f = Fields::new(site.annotation, AnnotationKind::CosmosDbTrigger);
        Ok(Binding::builder(self.kind(), Direction::In, self.variable())
            .field("connectionStringSetting", f.required("connectionStringSetting")?)
            .field("databaseName", f.required("databaseName")?)
            .field("collectionName", f.required("collectionName")?)
            .field_opt("leaseConnectionStringSetting", f.string("leaseConnectionStringSetting"))
            .field_opt("leaseDatabaseName", f.string("leaseDatabaseName"))
            .field_opt("leaseCollectionName", f.string("leaseCollectionName"))
            .field(
                "createLeaseCollectionIfNotExists",
                f.boolean("createLeaseCollectionIfNotExists")?
                    .unwrap_or(DEFAULT_CREATE_LEASE_COLLECTION),
            )
            .field(
                "leasesCollectionThroughput",
                f.int("leasesCollectionThroughput")?
                    .unwrap_or(DEFAULT_LEASES_THROUGHPUT),
            )
            .field_opt("leaseCollectionPrefix", f.string("leaseCollectionPrefix"))
            .field_opt("feedPollDelay", f.int("feedPollDelay")?)
            .field_opt("leaseAcquireInterval", f.int("leaseAcquireInterval")?)
            .field_opt("leaseExpirationInterval", f.int("leaseExpirationInterval")?)
            .field_opt("leaseRenewInterval", f.int("leaseRenewInterval")?)
            .field_opt("checkpointFrequency", f.int("checkpointFrequency")?)
            .field_opt("maxItemsPerInvocation", f.int("maxItemsPerInvocation")?)
            .field_opt("startFromBeginning", f.boolean("startFromBeginning")?)
            .field_opt("preferredLocations", f.string("preferredLocations"))
            .build())
    }
}

/// `cosmosDB` input
pub struct CosmosInputHandler;

impl ParameterHandler for CosmosInputHandler {
    fn validate(&self, site: &ParamSite<'_>) -> Result<(), DiagnosticKind> {
        let accepted = resolved_value(site.model, site.ty).is_some_and(|value| {
            value == TypeDesc::Json
                || is_record(site.model, &value)
                || is_record_array(site.model, &value)
        });
        if accepted {
            Ok(())
        } else {
            Err(site.invalid_type(BindingKind::DocumentInput))
        }
    }

    fn emit_extraction(&self, site: &ParamSite<'_>) -> Expression {
        Expression::InputBinding {
            name: site.name.to_string(),
            ty: site.ty.clone(),
        }
    }

    fn emit_binding(&self, site: &ParamSite<'_>) -> Result<Option<Binding>, DiagnosticKind> {
        let f = Fields::new(site.annotation, AnnotationKind::CosmosDbInput);
        Ok(Some(
            Binding::builder(BindingKind::DocumentInput, Direction::In, site.name)
                .field("connectionStringSetting", f.required("connectionStringSetting")?)
                .field("databaseName", f.required("databaseName")?)
                .field("collectionName", f.required("collectionName")?)
                .field_opt("id", f.string("id"))
                .field_opt("sqlQuery", f.string("sqlQuery"))
                .field_opt("partitionKey", f.string("partitionKey"))
                .field_opt("preferredLocations", f.string("preferredLocations"))
                .build(),
        ))
    }
}

/// `cosmosDB` output
pub struct CosmosOutputHandler;

impl ReturnHandler for CosmosOutputHandler {
    fn kind(&self) -> BindingKind {
        BindingKind::DocumentOutput
    }

    fn validate(&self, model: &dyn SemanticModel, ty: &TypeDesc) -> Result<(), DiagnosticKind> {
        let accepted = ty.value_type().is_some_and(|value| {
            model.resolve_alias(&value) == TypeDesc::Json
                || is_record(model, &value)
                || is_record_array(model, &value)
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
        let f = Fields::new(annotation, AnnotationKind::CosmosDbOutput);
        Ok(Binding::builder(self.kind(), Direction::Out, self.variable())
            .field("connectionStringSetting", f.required("connectionStringSetting")?)
            .field("databaseName", f.required("databaseName")?)
            .field("collectionName", f.required("collectionName")?)
            .field_opt("createIfNotExists", f.boolean("createIfNotExists")?)
            .field_opt("partitionKey", f.string("partitionKey"))
            .field_opt("collectionThroughput", f.int("collectionThroughput")?)
            .field_opt("useMultipleWriteLocations", f.boolean("useMultipleWriteLocations")?)
            .field_opt("preferredLocations", f.string("preferredLocations"))
            .build())
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::*;
    use super::super::http::HttpTriggerHandler;
    use super::*;
    use fnforge_core::program::AnnotationValue;
    use rstest::rstest;

    fn db_fields() -> Vec<(&'static str, &'static str)> {
        vec![
            ("connectionStringSetting", "CosmosDBConnection"),
            ("databaseName", "db1"),
            ("collectionName", "c1"),
        ]
    }

    #[test]
    fn test_trigger_defaults() {
        let ann = annotation("af:CosmosDBTrigger", &db_fields());
        let binding = CosmosTriggerHandler
            .emit_binding(&TriggerSite {
                annotation: Some(&ann),
                accessor: None,
                route: "",
                payload: None,
            })
            .unwrap();
        assert_eq!(
            serde_json::to_string(&binding).unwrap(),
            r#"{"type":"cosmosDBTrigger","connectionStringSetting":"CosmosDBConnection","databaseName":"db1","collectionName":"c1","createLeaseCollectionIfNotExists":true,"leasesCollectionThroughput":400,"direction":"in","name":"inMsg"}"#
        );
    }

    #[test]
    fn test_trigger_overrides_and_locations() {
        let mut fields = db_fields();
        fields.push(("createLeaseCollectionIfNotExists", "false"));
        fields.push(("leasesCollectionThroughput", "1000"));
        fields.push(("maxItemsPerInvocation", "10"));
        let mut ann = annotation("af:CosmosDBTrigger", &fields);
        ann.fields.insert(
            "preferredLocations".into(),
            AnnotationValue::List(vec!["East US".into(), "West US".into()]),
        );

        let binding = CosmosTriggerHandler
            .emit_binding(&TriggerSite {
                annotation: Some(&ann),
                accessor: None,
                route: "",
                payload: None,
            })
            .unwrap();
        assert_eq!(binding.field("createLeaseCollectionIfNotExists").unwrap(), false);
        assert_eq!(binding.field("leasesCollectionThroughput").unwrap(), 1000);
        assert_eq!(binding.field("maxItemsPerInvocation").unwrap(), 10);
        assert_eq!(binding.field("preferredLocations").unwrap(), "East US,West US");
    }

    #[test]
    fn test_malformed_throughput() {
        let mut fields = db_fields();
        fields.push(("leasesCollectionThroughput", "four hundred"));
        let ann = annotation("af:CosmosDBTrigger", &fields);
        let err = CosmosTriggerHandler
            .emit_binding(&TriggerSite {
                annotation: Some(&ann),
                accessor: None,
                route: "",
                payload: None,
            })
            .unwrap_err();
        assert_eq!(err.code(), "FNF106");
    }

    #[rstest]
    #[case("Person[]", true)]
    #[case("People", true)]
    #[case("json", true)]
    #[case("map<anydata>[]", true)]
    #[case("Person", false)]
    #[case("string", false)]
    fn test_trigger_payload_types(#[case] ty: &str, #[case] ok: bool) {
        assert_eq!(CosmosTriggerHandler.validate(&model(), &self::ty(ty)), ok);
    }

    #[rstest]
    #[case("Person", true)]
    #[case("Person?", true)]
    #[case("Person[]", true)]
    #[case("json", true)]
    #[case("string", false)]
    fn test_input_types(#[case] ty: &str, #[case] ok: bool) {
        let m = model();
        let ty = self::ty(ty);
        let site = ParamSite {
            name: "doc",
            ty: &ty,
            annotation: None,
            model: &m,
            trigger: &HttpTriggerHandler,
        };
        assert_eq!(CosmosInputHandler.validate(&site).is_ok(), ok);
    }

    #[test]
    fn test_input_binding_uses_parameter_name() {
        let m = model();
        let ty = ty("Person?");
        let mut fields = db_fields();
        fields.push(("id", "{Query.id}"));
        fields.push(("partitionKey", "{Query.pk}"));
        let ann = annotation("af:CosmosDBInput", &fields);
        let site = ParamSite {
            name: "person",
            ty: &ty,
            annotation: Some(&ann),
            model: &m,
            trigger: &HttpTriggerHandler,
        };
        let binding = CosmosInputHandler.emit_binding(&site).unwrap().unwrap();
        assert_eq!(
            serde_json::to_string(&binding).unwrap(),
            r#"{"type":"cosmosDB","connectionStringSetting":"CosmosDBConnection","databaseName":"db1","collectionName":"c1","id":"{Query.id}","partitionKey":"{Query.pk}","direction":"in","name":"person"}"#
        );
    }

    #[test]
    fn test_output_binding() {
        let mut fields = db_fields();
        fields.push(("createIfNotExists", "true"));
        let ann = annotation("af:CosmosDBOutput", &fields);
        assert!(CosmosOutputHandler.validate(&model(), &ty("Person[]|error")).is_ok());
        let binding = CosmosOutputHandler.emit_binding(Some(&ann), &ty("Person")).unwrap();
        assert_eq!(binding.kind(), BindingKind::DocumentOutput);
        assert_eq!(binding.field("createIfNotExists").unwrap(), true);
        assert_eq!(binding.name(), "outMsg");
    }
}
