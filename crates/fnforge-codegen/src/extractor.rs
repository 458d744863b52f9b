//! Service and handler extraction
//!
//! Walks every document in declaration order and collects the services
//! attached to a supported listener, together with their exported
//! handlers. Services on listeners of other modules are skipped silently.

use fnforge_core::program::{Document, FunctionDecl, Qualifier, ServiceDecl};
use fnforge_core::semantic::{FUNCTIONS_MODULE, SemanticModel};
use fnforge_core::{Diagnostic, DiagnosticKind};

use crate::registry::AnnotationKind;

/// The listener kinds a service can be attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListenerKind {
    /// `azure_functions:HttpListener`
    Http,
    /// `azure_functions:QueueListener`
    Queue,
    /// `azure_functions:CosmosDBListener`
    CosmosDb,
    /// `azure_functions:TimerListener`
    Timer,
    /// `azure_functions:BlobListener`
    Blob,
}

impl ListenerKind {
    /// Every listener kind
    pub const ALL: [ListenerKind; 5] = [
        ListenerKind::Http,
        ListenerKind::Queue,
        ListenerKind::CosmosDb,
        ListenerKind::Timer,
        ListenerKind::Blob,
    ];

    /// Match a qualified listener type name
    pub fn from_qualified(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.qualified_name() == name)
    }

    /// Canonical qualified type name
    pub fn qualified_name(&self) -> &'static str {
        match self {
            ListenerKind::Http => "azure_functions:HttpListener",
            ListenerKind::Queue => "azure_functions:QueueListener",
            ListenerKind::CosmosDb => "azure_functions:CosmosDBListener",
            ListenerKind::Timer => "azure_functions:TimerListener",
            ListenerKind::Blob => "azure_functions:BlobListener",
        }
    }

    /// The service annotation that configures this listener's trigger
    pub fn trigger_annotation(&self) -> AnnotationKind {
        match self {
            ListenerKind::Http => AnnotationKind::HttpTrigger,
            ListenerKind::Queue => AnnotationKind::QueueTrigger,
            ListenerKind::CosmosDb => AnnotationKind::CosmosDbTrigger,
            ListenerKind::Timer => AnnotationKind::TimerTrigger,
            ListenerKind::Blob => AnnotationKind::BlobTrigger,
        }
    }

    /// Whether the trigger works without a service annotation
    pub fn annotation_optional(&self) -> bool {
        *self == ListenerKind::Http
    }

    /// Whether a service member is a deployable handler
    pub fn exports(&self, function: &FunctionDecl) -> bool {
        match self {
            ListenerKind::Http => function.qualifier == Qualifier::Resource,
            _ => function.qualifier == Qualifier::Remote,
        }
    }
}

/// A service on a supported listener and its exported handlers
#[derive(Debug, Clone)]
pub struct ServiceUnit<'a> {
    /// Document the service is declared in
    pub document: &'a Document,

    /// The service declaration
    pub service: &'a ServiceDecl,

    /// Listener kind it is attached to
    pub listener: ListenerKind,

    /// Exported handlers in declaration order
    pub handlers: Vec<&'a FunctionDecl>,
}

impl ServiceUnit<'_> {
    /// Name used for the service in diagnostics and function names
    pub fn label(&self) -> String {
        match (&self.service.name, self.service.base_path.is_empty()) {
            (Some(name), _) => name.clone(),
            (None, false) => format!("/{}", self.service.joined_path()),
            (None, true) => "/".to_string(),
        }
    }
}

/// Extracted units plus the classification diagnostics of skipped services
#[derive(Debug, Default)]
pub struct Extraction<'a> {
    /// Services in declaration order
    pub units: Vec<ServiceUnit<'a>>,

    /// Diagnostics reported while extracting
    pub diagnostics: Vec<Diagnostic>,
}

impl<'a> Extraction<'a> {
    /// Number of handlers across all units
    pub fn handler_count(&self) -> usize {
        self.units.iter().map(|u| u.handlers.len()).sum()
    }

    fn push_service(
        mut self,
        model: &dyn SemanticModel,
        document: &'a Document,
        service: &'a ServiceDecl,
    ) -> Self {
        let Some(listener_type) = model.listener_type(&document.name, &service.listener) else {
            tracing::debug!("Skipping service at {}: unresolved listener", service.location);
            return self;
        };

        match ListenerKind::from_qualified(&listener_type) {
            Some(listener) => {
                let handlers = service
                    .functions
                    .iter()
                    .filter(|f| listener.exports(f))
                    .collect();
                self.units.push(ServiceUnit {
                    document,
                    service,
                    listener,
                    handlers,
                });
            }
            None if listener_type.starts_with(&format!("{}:", FUNCTIONS_MODULE)) => {
                self.diagnostics.push(
                    DiagnosticKind::UnsupportedListener {
                        listener: listener_type,
                    }
                    .at(service.location.clone()),
                );
            }
            None => {
                tracing::debug!("Ignoring service on foreign listener '{}'", listener_type);
            }
        }
        self
    }
}

/// Collect every service unit of the program
pub fn extract(model: &dyn SemanticModel) -> Extraction<'_> {
    model
        .program()
        .documents
        .iter()
        .flat_map(|doc| doc.services.iter().map(move |service| (doc, service)))
        .fold(Extraction::default(), |acc, (doc, service)| {
            acc.push_service(model, doc, service)
        })
}
