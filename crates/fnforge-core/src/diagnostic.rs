//! Structured diagnostics
//!
//! Problems found while classifying and validating handlers are values, not
//! panics or early returns: each [`Diagnostic`] carries a stable code, a
//! message template with positional arguments, a severity, and the source
//! location it refers to. Phases push them into a [`DiagnosticSink`] and
//! keep going.

use std::fmt;

use crate::source::Location;

/// Diagnostic severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Informational; does not block generation
    Warning,
    /// Blocks artifact generation
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// Which phase a diagnostic belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    /// The handler could not be classified; it is skipped
    Classification,
    /// The handler was classified but breaks a binding contract
    Validation,
    /// The build configuration is invalid
    Configuration,
}

/// Every problem the pipeline can report
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// Service attached to a listener type of the functions module that is not supported
    UnsupportedListener {
        /// Qualified listener type
        listener: String,
    },
    /// Annotation of the functions module that has no handler
    UnsupportedBindingKind {
        /// Annotation name as written
        annotation: String,
    },
    /// Service has no trigger annotation and its listener needs one
    MissingTriggerAnnotation {
        /// Service name or path
        service: String,
        /// Expected annotation
        expected: String,
    },
    /// Trigger annotation does not match the listener kind
    MismatchedTriggerAnnotation {
        /// Annotation found
        annotation: String,
        /// Listener type
        listener: String,
    },
    /// A known annotation attached where it has no meaning
    MisplacedAnnotation {
        /// Annotation name
        annotation: String,
        /// Where it was attached
        target: String,
    },
    /// Rest or defaultable handler parameter
    InvalidParameterShape {
        /// Parameter name
        param: String,
        /// Its kind
        kind: String,
    },
    /// Annotation field literal could not be parsed
    InvalidAnnotationValue {
        /// Annotation name
        annotation: String,
        /// Field name
        field: String,
        /// Literal text
        value: String,
        /// Expected literal kind
        expected: String,
    },
    /// Required annotation field absent
    MissingAnnotationField {
        /// Annotation name
        annotation: String,
        /// Field name
        field: String,
    },
    /// Path parameter type not supported
    InvalidPathParameterType {
        /// Parameter name or token
        param: String,
        /// Declared type
        ty: String,
    },
    /// Query parameter type not supported
    InvalidQueryParameterType {
        /// Parameter name
        param: String,
        /// Declared type
        ty: String,
    },
    /// Header parameter type not supported
    InvalidHeaderParameterType {
        /// Parameter name
        param: String,
        /// Declared type
        ty: String,
    },
    /// Header record declares rest fields
    HeaderRecordRestField {
        /// Parameter name
        param: String,
        /// Record type
        record: String,
    },
    /// Payload parameter type not serializable
    InvalidPayloadParameterType {
        /// Parameter name
        param: String,
        /// Declared type
        ty: String,
    },
    /// Payload union mixes structured and non-structured members
    InvalidUnionPayloadType {
        /// Parameter name
        param: String,
        /// Declared type
        ty: String,
    },
    /// Intersection type with more than one effective member
    InvalidIntersectionType {
        /// Parameter name
        param: String,
        /// Declared type
        ty: String,
    },
    /// More than one parameter could be the payload
    AmbiguousPayloadParameter {
        /// First candidate
        first: String,
        /// Second candidate
        second: String,
    },
    /// More than one binding annotation on the same parameter or return type
    MultipleParameterAnnotations {
        /// Parameter name (or `return`)
        param: String,
        /// First annotation
        first: String,
        /// Second annotation
        second: String,
    },
    /// Parameter type not accepted by its binding
    InvalidBindingParameterType {
        /// Binding kind
        binding: String,
        /// Parameter name
        param: String,
        /// Declared type
        ty: String,
    },
    /// Return type not accepted by the output binding
    InvalidReturnType {
        /// Binding kind
        binding: String,
        /// Declared type
        ty: String,
    },
    /// Non-HTTP handler returns a value but has no output annotation
    MissingReturnAnnotation {
        /// Function name
        function: String,
        /// Declared type
        ty: String,
    },
    /// Two handlers map to the same function name
    DuplicateFunctionName {
        /// Function name
        name: String,
    },
    /// Two bindings of one function share a variable name
    DuplicateBindingName {
        /// Function name
        function: String,
        /// Binding variable name
        name: String,
    },
    /// Two route placeholders collide
    DuplicatePathParameter {
        /// Route
        route: String,
        /// Placeholder token
        token: String,
    },
    /// Derived function name is not accepted by the host
    InvalidFunctionName {
        /// Function name
        name: String,
    },
    /// Program declares no deployable handlers
    NoFunctionsFound,
    /// Unknown deployment target in the build configuration
    UnsupportedDeploymentTarget {
        /// Target value
        target: String,
    },
    /// Error reported by the host compiler
    CompilationFailed {
        /// Compiler message
        message: String,
    },
}

impl DiagnosticKind {
    /// Stable diagnostic code
    pub fn code(&self) -> &'static str {
        match self {
            DiagnosticKind::UnsupportedListener { .. } => "FNF101",
            DiagnosticKind::UnsupportedBindingKind { .. } => "FNF102",
            DiagnosticKind::MissingTriggerAnnotation { .. } => "FNF103",
            DiagnosticKind::MismatchedTriggerAnnotation { .. } => "FNF104",
            DiagnosticKind::InvalidParameterShape { .. } => "FNF105",
            DiagnosticKind::InvalidAnnotationValue { .. } => "FNF106",
            DiagnosticKind::MissingAnnotationField { .. } => "FNF107",
            DiagnosticKind::MisplacedAnnotation { .. } => "FNF108",
            DiagnosticKind::InvalidPathParameterType { .. } => "FNF201",
            DiagnosticKind::InvalidQueryParameterType { .. } => "FNF202",
            DiagnosticKind::InvalidHeaderParameterType { .. } => "FNF203",
            DiagnosticKind::HeaderRecordRestField { .. } => "FNF204",
            DiagnosticKind::InvalidPayloadParameterType { .. } => "FNF205",
            DiagnosticKind::InvalidUnionPayloadType { .. } => "FNF206",
            DiagnosticKind::InvalidIntersectionType { .. } => "FNF207",
            DiagnosticKind::AmbiguousPayloadParameter { .. } => "FNF208",
            DiagnosticKind::MultipleParameterAnnotations { .. } => "FNF209",
            DiagnosticKind::InvalidBindingParameterType { .. } => "FNF210",
            DiagnosticKind::InvalidReturnType { .. } => "FNF211",
            DiagnosticKind::MissingReturnAnnotation { .. } => "FNF212",
            DiagnosticKind::DuplicateFunctionName { .. } => "FNF213",
            DiagnosticKind::DuplicateBindingName { .. } => "FNF214",
            DiagnosticKind::DuplicatePathParameter { .. } => "FNF215",
            DiagnosticKind::InvalidFunctionName { .. } => "FNF216",
            DiagnosticKind::NoFunctionsFound => "FNF217",
            DiagnosticKind::UnsupportedDeploymentTarget { .. } => "FNF301",
            DiagnosticKind::CompilationFailed { .. } => "FNF001",
        }
    }

    /// Phase the diagnostic belongs to
    pub fn category(&self) -> Category {
        match self.code().as_bytes()[3] {
            b'1' => Category::Classification,
            b'3' => Category::Configuration,
            _ => Category::Validation,
        }
    }

    /// Severity
    pub fn severity(&self) -> Severity {
        match self {
            DiagnosticKind::NoFunctionsFound => Severity::Warning,
            _ => Severity::Error,
        }
    }

    /// Message template with `{0}`, `{1}`, ... placeholders
    pub fn template(&self) -> &'static str {
        match self {
            DiagnosticKind::UnsupportedListener { .. } => "unsupported listener type '{0}'",
            DiagnosticKind::UnsupportedBindingKind { .. } => "unsupported binding annotation '{0}'",
            DiagnosticKind::MissingTriggerAnnotation { .. } => {
                "service '{0}' is missing the '{1}' annotation"
            }
            DiagnosticKind::MismatchedTriggerAnnotation { .. } => {
                "annotation '{0}' cannot be used on a service attached to '{1}'"
            }
            DiagnosticKind::MisplacedAnnotation { .. } => {
                "annotation '{0}' is not allowed on {1}"
            }
            DiagnosticKind::InvalidParameterShape { .. } => {
                "handler parameter '{0}' must be a required parameter, found {1} parameter"
            }
            DiagnosticKind::InvalidAnnotationValue { .. } => {
                "invalid value '{2}' for field '{1}' of '{0}': expected {3}"
            }
            DiagnosticKind::MissingAnnotationField { .. } => {
                "annotation '{0}' requires field '{1}'"
            }
            DiagnosticKind::InvalidPathParameterType { .. } => {
                "invalid path parameter type '{1}' for '{0}'"
            }
            DiagnosticKind::InvalidQueryParameterType { .. } => {
                "invalid query parameter type '{1}' for '{0}'"
            }
            DiagnosticKind::InvalidHeaderParameterType { .. } => {
                "invalid header parameter type '{1}' for '{0}'"
            }
            DiagnosticKind::HeaderRecordRestField { .. } => {
                "header record '{1}' of parameter '{0}' must not declare rest fields"
            }
            DiagnosticKind::InvalidPayloadParameterType { .. } => {
                "invalid payload parameter type '{1}' for '{0}'"
            }
            DiagnosticKind::InvalidUnionPayloadType { .. } => {
                "payload union type '{1}' of '{0}' mixes structured and non-structured members"
            }
            DiagnosticKind::InvalidIntersectionType { .. } => {
                "intersection type '{1}' of '{0}' does not reduce to a single type"
            }
            DiagnosticKind::AmbiguousPayloadParameter { .. } => {
                "ambiguous payload parameter: both '{0}' and '{1}' can be the request body"
            }
            DiagnosticKind::MultipleParameterAnnotations { .. } => {
                "'{0}' has conflicting annotations '{1}' and '{2}'"
            }
            DiagnosticKind::InvalidBindingParameterType { .. } => {
                "invalid type '{2}' for {0} parameter '{1}'"
            }
            DiagnosticKind::InvalidReturnType { .. } => "invalid return type '{1}' for {0} output",
            DiagnosticKind::MissingReturnAnnotation { .. } => {
                "function '{0}' returns '{1}' but declares no output binding"
            }
            DiagnosticKind::DuplicateFunctionName { .. } => "duplicate function name '{0}'",
            DiagnosticKind::DuplicateBindingName { .. } => {
                "function '{0}' declares binding name '{1}' more than once"
            }
            DiagnosticKind::DuplicatePathParameter { .. } => {
                "route '{0}' contains placeholder '{1}' more than once"
            }
            DiagnosticKind::InvalidFunctionName { .. } => {
                "function name '{0}' must start with a letter and contain only letters, digits, '_' or '-' (at most 128 characters)"
            }
            DiagnosticKind::NoFunctionsFound => "no functions found to deploy",
            DiagnosticKind::UnsupportedDeploymentTarget { .. } => {
                "unsupported deployment target '{0}'"
            }
            DiagnosticKind::CompilationFailed { .. } => "{0}",
        }
    }

    /// Positional arguments for [`Self::template`]
    pub fn arguments(&self) -> Vec<&str> {
        match self {
            DiagnosticKind::UnsupportedListener { listener } => vec![listener],
            DiagnosticKind::UnsupportedBindingKind { annotation } => vec![annotation],
            DiagnosticKind::MissingTriggerAnnotation { service, expected } => {
                vec![service, expected]
            }
            DiagnosticKind::MismatchedTriggerAnnotation {
                annotation,
                listener,
            } => vec![annotation, listener],
            DiagnosticKind::MisplacedAnnotation { annotation, target } => {
                vec![annotation, target]
            }
            DiagnosticKind::InvalidParameterShape { param, kind } => vec![param, kind],
            DiagnosticKind::InvalidAnnotationValue {
                annotation,
                field,
                value,
                expected,
            } => vec![annotation, field, value, expected],
            DiagnosticKind::MissingAnnotationField { annotation, field } => {
                vec![annotation, field]
            }
            DiagnosticKind::InvalidPathParameterType { param, ty }
            | DiagnosticKind::InvalidQueryParameterType { param, ty }
            | DiagnosticKind::InvalidHeaderParameterType { param, ty }
            | DiagnosticKind::InvalidPayloadParameterType { param, ty }
            | DiagnosticKind::InvalidUnionPayloadType { param, ty }
            | DiagnosticKind::InvalidIntersectionType { param, ty } => vec![param, ty],
            DiagnosticKind::HeaderRecordRestField { param, record } => vec![param, record],
            DiagnosticKind::AmbiguousPayloadParameter { first, second } => vec![first, second],
            DiagnosticKind::MultipleParameterAnnotations {
                param,
                first,
                second,
            } => vec![param, first, second],
            DiagnosticKind::InvalidBindingParameterType { binding, param, ty } => {
                vec![binding, param, ty]
            }
            DiagnosticKind::InvalidReturnType { binding, ty } => vec![binding, ty],
            DiagnosticKind::MissingReturnAnnotation { function, ty } => vec![function, ty],
            DiagnosticKind::DuplicateFunctionName { name }
            | DiagnosticKind::InvalidFunctionName { name } => vec![name],
            DiagnosticKind::DuplicateBindingName { function, name } => vec![function, name],
            DiagnosticKind::DuplicatePathParameter { route, token } => vec![route, token],
            DiagnosticKind::NoFunctionsFound => vec![],
            DiagnosticKind::UnsupportedDeploymentTarget { target } => vec![target],
            DiagnosticKind::CompilationFailed { message } => vec![message],
        }
    }

    /// The template with its arguments substituted
    pub fn message(&self) -> String {
        let mut message = self.template().to_string();
        for (i, arg) in self.arguments().iter().enumerate() {
            message = message.replace(&format!("{{{}}}", i), arg);
        }
        message
    }

    /// Attach a location
    pub fn at(self, location: Location) -> Diagnostic {
        Diagnostic {
            kind: self,
            location,
        }
    }
}

/// A located diagnostic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// What went wrong
    pub kind: DiagnosticKind,

    /// Where
    pub location: Location,
}

impl Diagnostic {
    /// Stable diagnostic code
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    /// Severity
    pub fn severity(&self) -> Severity {
        self.kind.severity()
    }

    /// Rendered message
    pub fn message(&self) -> String {
        self.kind.message()
    }

    /// Whether this diagnostic has error severity
    pub fn is_error(&self) -> bool {
        self.severity() == Severity::Error
    }

    /// Whether this diagnostic prevents the artifact from being generated.
    /// Classification errors only skip the handler they were reported on.
    pub fn blocks_generation(&self) -> bool {
        self.is_error() && self.kind.category() != Category::Classification
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[{}]: {} ({})",
            self.severity(),
            self.code(),
            self.message(),
            self.location
        )
    }
}

impl std::error::Error for Diagnostic {}

/// Receiver of diagnostics, standing in for the host compiler's sink
pub trait DiagnosticSink {
    /// Record one diagnostic
    fn report(&mut self, diagnostic: Diagnostic);
}

/// Collected diagnostics in report order
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    /// Empty collection
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether any error-severity diagnostic was reported
    pub fn has_errors(&self) -> bool {
        self.items.iter().any(Diagnostic::is_error)
    }

    /// Error-severity diagnostics
    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter().filter(|d| d.is_error())
    }

    /// Number of error-severity diagnostics
    pub fn error_count(&self) -> usize {
        self.errors().count()
    }

    /// Whether any diagnostic prevents generation
    pub fn has_blocking_errors(&self) -> bool {
        self.items.iter().any(Diagnostic::blocks_generation)
    }

    /// Number of diagnostics that prevent generation
    pub fn blocking_count(&self) -> usize {
        self.items.iter().filter(|d| d.blocks_generation()).count()
    }

    /// All diagnostics
    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    /// Number of diagnostics
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether nothing was reported
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Whether a diagnostic with the given code was reported
    pub fn contains_code(&self, code: &str) -> bool {
        self.items.iter().any(|d| d.code() == code)
    }
}

impl DiagnosticSink for Diagnostics {
    fn report(&mut self, diagnostic: Diagnostic) {
        match diagnostic.severity() {
            Severity::Error => tracing::debug!("{}", diagnostic),
            Severity::Warning => tracing::warn!("{}", diagnostic),
        }
        self.items.push(diagnostic);
    }
}

impl Extend<Diagnostic> for Diagnostics {
    fn extend<T: IntoIterator<Item = Diagnostic>>(&mut self, iter: T) {
        for d in iter {
            self.report(d);
        }
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}
