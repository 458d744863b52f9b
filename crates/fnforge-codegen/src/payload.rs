//! Payload disambiguation
//!
//! Decides which handler parameter carries the request body or trigger
//! data. Explicitly annotated parameters keep their role; the remaining
//! unannotated parameters are sorted into payload and query candidates.
//!
//! For HTTP handlers a parameter is an implicit payload when its type is
//! structured (records, maps, tables, tuples, `json`, `xml`, byte arrays
//! and arrays of structured types); basic parameters become query
//! parameters. For every other trigger the first unannotated parameter is
//! the trigger data.

use fnforge_core::semantic::SemanticModel;
use fnforge_core::{DiagnosticKind, TypeDesc};

use crate::extractor::ListenerKind;
use crate::registry::ParamHandlerKind;

/// One handler parameter as seen by the disambiguator
#[derive(Debug, Clone, Copy)]
pub struct ParamCandidate<'a> {
    /// Parameter name
    pub name: &'a str,

    /// Effective parameter type
    pub ty: &'a TypeDesc,

    /// Role fixed by an annotation
    pub explicit: Option<ParamHandlerKind>,
}

/// How a type looks to the payload rules
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// Every non-nil member is structured
    Structured,
    /// No non-nil member is structured
    Basic,
    /// A union of structured and non-structured members
    Mixed,
}

impl Shape {
    /// Classify a type by its non-nil union members
    pub fn of(model: &dyn SemanticModel, ty: &TypeDesc) -> Self {
        let members = ty.non_nil_members();
        let structured = members.iter().filter(|m| model.is_structured(m)).count();
        match structured {
            0 => Shape::Basic,
            n if n == members.len() => Shape::Structured,
            _ => Shape::Mixed,
        }
    }
}

/// Per-handler role accumulator: the role of every parameter, which one
/// claimed the payload and the errors found while assigning them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamAvailability {
    /// Handler role per parameter, in declaration order
    pub roles: Vec<ParamHandlerKind>,

    /// Index of the payload parameter
    pub payload: Option<usize>,

    /// Whether the payload was claimed by an annotation
    pub explicit_payload: bool,

    /// Errors keyed by parameter index
    pub errors: Vec<(usize, DiagnosticKind)>,
}

impl ParamAvailability {
    /// Whether roles were assigned without error
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    fn claim_payload(&mut self, index: usize, candidates: &[ParamCandidate<'_>]) {
        match self.payload {
            None => self.payload = Some(index),
            Some(first) => self.errors.push((
                index,
                DiagnosticKind::AmbiguousPayloadParameter {
                    first: candidates[first].name.to_string(),
                    second: candidates[index].name.to_string(),
                },
            )),
        }
    }
}

/// Assign a role to every parameter of a handler
pub fn disambiguate(
    model: &dyn SemanticModel,
    listener: ListenerKind,
    candidates: &[ParamCandidate<'_>],
) -> ParamAvailability {
    let mut resolution = ParamAvailability {
        roles: Vec::with_capacity(candidates.len()),
        payload: None,
        explicit_payload: false,
        errors: Vec::new(),
    };

    // explicit annotations claim the payload before any implicit candidate
    for (index, candidate) in candidates.iter().enumerate() {
        if candidate.explicit == Some(ParamHandlerKind::Payload) {
            resolution.claim_payload(index, candidates);
            resolution.explicit_payload = true;
        }
    }

    for (index, candidate) in candidates.iter().enumerate() {
        let role = match candidate.explicit {
            Some(kind) => kind,
            None if listener == ListenerKind::Http => match Shape::of(model, candidate.ty) {
                Shape::Basic => ParamHandlerKind::Query,
                Shape::Structured => {
                    resolution.claim_payload(index, candidates);
                    ParamHandlerKind::Payload
                }
                Shape::Mixed => {
                    resolution.errors.push((
                        index,
                        DiagnosticKind::InvalidUnionPayloadType {
                            param: candidate.name.to_string(),
                            ty: candidate.ty.to_string(),
                        },
                    ));
                    ParamHandlerKind::Payload
                }
            },
            None => {
                resolution.claim_payload(index, candidates);
                ParamHandlerKind::Payload
            }
        };
        resolution.roles.push(role);
    }

    resolution
}
