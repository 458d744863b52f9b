//! Source locations
//!
//! Every node of the program model carries the document it came from and a
//! line/column position, so diagnostics can point back at the declaration.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A line/column position inside a document, 1-based. Zero means unknown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    /// Line number
    #[serde(default)]
    pub line: u32,

    /// Column number
    #[serde(default)]
    pub column: u32,
}

/// A position qualified by the document it belongs to
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    /// Document (source file) name
    pub document: String,

    /// Line number, 1-based
    pub line: u32,

    /// Column number, 1-based
    pub column: u32,
}

impl Location {
    /// Create a location from a document name and a position
    pub fn new(document: impl Into<String>, position: Position) -> Self {
        Self {
            document: document.into(),
            line: position.line,
            column: position.column,
        }
    }

    /// Location pointing at the start of a document
    pub fn document(document: impl Into<String>) -> Self {
        Self {
            document: document.into(),
            line: 1,
            column: 1,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.line == 0 {
            write!(f, "{}", self.document)
        } else {
            write!(f, "{}:{}:{}", self.document, self.line, self.column)
        }
    }
}
