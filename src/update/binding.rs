use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::value::Value;

/// Where an update-method parameter takes its value from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputSource {
    /// Passed through unchanged.
    Literal(Value),
    /// Dotted path resolved through the owning context at update time.
    Reference(String),
}

impl InputSource {
    pub fn as_reference(&self) -> Option<&str> {
        match self {
            InputSource::Reference(path) => Some(path),
            InputSource::Literal(_) => None,
        }
    }
}

/// An element's selected update method and its parameter sources, keyed by
/// parameter name. `method: None` selects the type's default method.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateBinding {
    pub method: Option<String>,
    pub inputs: IndexMap<String, InputSource>,
}

impl UpdateBinding {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    pub fn literal(mut self, param: impl Into<String>, value: impl Into<Value>) -> Self {
        self.inputs
            .insert(param.into(), InputSource::Literal(value.into()));
        self
    }

    pub fn reference(mut self, param: impl Into<String>, path: impl Into<String>) -> Self {
        self.inputs
            .insert(param.into(), InputSource::Reference(path.into()));
        self
    }

    pub fn input(&self, param: &str) -> Option<&InputSource> {
        self.inputs.get(param)
    }

    /// `(parameter, path)` of every reference-typed input, in binding order.
    pub fn references(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inputs
            .iter()
            .filter_map(|(p, s)| s.as_reference().map(|path| (p.as_str(), path)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_references_skip_literals() {
        let b = UpdateBinding::new()
            .reference("cs", "cs")
            .literal("x", 1.0)
            .reference("from", "asm.p0");
        let refs: Vec<_> = b.references().collect();
        assert_eq!(refs, vec![("cs", "cs"), ("from", "asm.p0")]);
        assert!(b.method.is_none());
    }

    #[test]
    fn test_binding_json_shape() {
        let b = UpdateBinding::new().with_method("offset").literal("dx", 2.0);
        let json = serde_json::to_value(&b).unwrap();
        assert_eq!(json["method"], "offset");
        assert_eq!(json["inputs"]["dx"]["literal"], 2.0);
    }
}
