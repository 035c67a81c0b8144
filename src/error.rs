//! Error types for model mutation, lookup, sequencing and selection.

/// Errors surfaced to the caller of a model operation.
///
/// Per-element update failures are not part of this enum: they are recorded
/// as [`crate::update::UpdateFailure`] and never abort an update pass.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    #[error("Name '{name}' is already used in {context}")]
    DuplicateName { name: String, context: String },

    #[error("Cannot resolve '{path}': {reason}")]
    UnresolvedReference { path: String, reason: String },

    #[error("Dependency cycle: {}", cycle.join(" -> "))]
    GraphCycle { cycle: Vec<String> },

    #[error("Malformed query '{query}': {reason}")]
    MalformedQuery { query: String, reason: String },

    #[error("Unsupported selection feature: {0}")]
    UnsupportedSelection(String),

    #[error("'{0}' is not a context")]
    NotAContext(String),

    #[error("'{0}' is not a scenario")]
    NotAScenario(String),

    #[error("Element {0} does not exist")]
    UnknownElement(String),

    #[error("The model root cannot be removed")]
    RootElement,

    #[error("Invalid element name '{0}'")]
    InvalidName(String),

    #[error("'{0}' is not updateable")]
    NotUpdateable(String),

    #[error("No update method '{method}' for type '{element_type}'")]
    UnknownUpdateMethod { element_type: String, method: String },

    #[error("Event dispatch exceeded {limit} re-entrant rounds")]
    EventCascadeOverflow { limit: usize },

    #[error("No model is open")]
    NoModel,
}

impl ModelError {
    pub(crate) fn unresolved(path: impl Into<String>, reason: impl Into<String>) -> Self {
        ModelError::UnresolvedReference {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn malformed(query: impl Into<String>, reason: impl Into<String>) -> Self {
        ModelError::MalformedQuery {
            query: query.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ModelError>;
