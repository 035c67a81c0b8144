use serde::{Deserialize, Serialize};
use std::fmt;

use super::registry::NamedRegistry;
use crate::update::UpdateBinding;
use crate::value::{Properties, Value};

/// Stable handle of an element in the model arena. Never reused after the
/// element is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ElementId(pub(crate) usize);

impl ElementId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

bitflags::bitflags! {
    /// Roles an element plays.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Capabilities: u8 {
        /// Takes part in dependency extraction and sequencing.
        const GRAPHABLE = 1 << 0;
        /// Accepts an update binding and is recomputed by update passes.
        const UPDATEABLE = 1 << 1;
        /// Shown to viewers.
        const VIEWABLE = 1 << 2;
    }
}

impl Capabilities {
    /// Match a capability by the name used in `INSTANCEOF(...)`.
    pub fn from_role(name: &str) -> Option<Capabilities> {
        match name {
            "Graphable" => Some(Capabilities::GRAPHABLE),
            "Updateable" => Some(Capabilities::UPDATEABLE),
            "Viewable" => Some(Capabilities::VIEWABLE),
            _ => None,
        }
    }
}

/// Level of a context in the model hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContextKind {
    Model,
    Scenario,
    Assembly,
    Component,
    Group,
}

impl ContextKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ContextKind::Model => "Model",
            ContextKind::Scenario => "Scenario",
            ContextKind::Assembly => "Assembly",
            ContextKind::Component => "Component",
            ContextKind::Group => "Group",
        }
    }
}

/// Registry half of a context element.
#[derive(Debug, Clone)]
pub struct ContextData {
    pub kind: ContextKind,
    pub registry: NamedRegistry,
}

/// A named element of the model tree.
///
/// `owner` is the id of the context whose registry owns this element; only
/// the root has none.
#[derive(Debug, Clone)]
pub struct Element {
    pub(crate) name: String,
    pub(crate) owner: Option<ElementId>,
    pub(crate) element_type: String,
    pub(crate) capabilities: Capabilities,
    pub(crate) state: Properties,
    pub(crate) binding: Option<UpdateBinding>,
    pub(crate) last_failure: Option<String>,
    pub(crate) context: Option<ContextData>,
}

impl Element {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn owner(&self) -> Option<ElementId> {
        self.owner
    }

    pub fn element_type(&self) -> &str {
        &self.element_type
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn has(&self, caps: Capabilities) -> bool {
        self.capabilities.contains(caps)
    }

    /// Computed state.
    pub fn state(&self) -> &Properties {
        &self.state
    }

    pub fn binding(&self) -> Option<&UpdateBinding> {
        self.binding.as_ref()
    }

    /// Message of the failure recorded by the last update pass, if any.
    pub fn last_failure(&self) -> Option<&str> {
        self.last_failure.as_deref()
    }

    pub fn is_context(&self) -> bool {
        self.context.is_some()
    }

    pub fn context_kind(&self) -> Option<ContextKind> {
        self.context.as_ref().map(|c| c.kind)
    }

    pub fn registry(&self) -> Option<&NamedRegistry> {
        self.context.as_ref().map(|c| &c.registry)
    }

    pub(crate) fn registry_mut(&mut self) -> Option<&mut NamedRegistry> {
        self.context.as_mut().map(|c| &mut c.registry)
    }

    /// Dynamic property access by name: `name` and `type` first, then the
    /// computed state.
    pub fn get_property(&self, name: &str) -> Option<Value> {
        match name {
            "name" => Some(Value::Text(self.name.clone())),
            "type" => Some(Value::Text(self.element_type.clone())),
            _ => self.state.get(name).cloned(),
        }
    }

    /// State snapshot handed to update methods for whole-element references.
    pub fn snapshot(&self) -> Value {
        let mut record = Properties::new();
        record.insert("name".to_string(), Value::Text(self.name.clone()));
        record.insert("type".to_string(), Value::Text(self.element_type.clone()));
        for (k, v) in &self.state {
            record.insert(k.clone(), v.clone());
        }
        Value::Record(record)
    }
}

/// Description of a leaf element to add to a context.
#[derive(Debug, Clone)]
pub struct ElementSpec {
    pub name: String,
    pub element_type: String,
    pub capabilities: Capabilities,
    pub state: Properties,
    pub binding: Option<UpdateBinding>,
}

impl ElementSpec {
    /// A graphable, updateable and viewable element with empty state.
    pub fn new(name: impl Into<String>, element_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            element_type: element_type.into(),
            capabilities: Capabilities::all(),
            state: Properties::new(),
            binding: None,
        }
    }

    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.state.insert(name.into(), value.into());
        self
    }

    pub fn with_binding(mut self, binding: UpdateBinding) -> Self {
        self.binding = Some(binding);
        self
    }
}

/// Names are registry keys and path segments.
pub(crate) fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && !name.contains('.') && !name.chars().any(char::is_whitespace)
}
