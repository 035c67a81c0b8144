//! Dotted lookup paths (`segment(.segment)*`).

use std::fmt;

use super::element::ElementId;
use crate::error::{ModelError, Result};
use crate::value::Value;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementPath {
    segments: Vec<String>,
}

impl ElementPath {
    pub fn parse(path: &str) -> Result<Self> {
        let trimmed = path.trim();
        if trimmed.is_empty() {
            return Err(ModelError::unresolved(path, "empty path"));
        }
        let segments: Vec<String> = trimmed.split('.').map(|s| s.trim().to_string()).collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(ModelError::unresolved(path, "empty path segment"));
        }
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn first(&self) -> &str {
        &self.segments[0]
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Always false: a parsed path has at least one segment.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

impl fmt::Display for ElementPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

/// Outcome of a successful lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved {
    Element(ElementId),
    /// Trailing property of `element`. Never `Value::Null`.
    Property {
        element: ElementId,
        name: String,
        value: Value,
    },
}

impl Resolved {
    /// The element resolved to, or the element owning the property.
    pub fn element(&self) -> ElementId {
        match self {
            Resolved::Element(id) => *id,
            Resolved::Property { element, .. } => *element,
        }
    }
}
