//! Reactive behaviors.
//!
//! A [`Behavior`] is a selection condition attached to a context plus an
//! optional action. When an update of that context (or of anything inside
//! it) completes, the condition is evaluated in the context; a non-empty
//! result fires the action once.

use serde::Serialize;

use crate::error::Result;
use crate::model::{ElementId, Model};
use crate::selection::SelectionQuery;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BehaviorOperation {
    /// Run an update pass on the target.
    Update,
    /// Delete the target.
    Remove,
}

/// What to do when a behavior fires. `target` is a path relative to the
/// behavior's context.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BehaviorAction {
    pub target: String,
    pub operation: BehaviorOperation,
}

impl BehaviorAction {
    pub fn update(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            operation: BehaviorOperation::Update,
        }
    }

    pub fn remove(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            operation: BehaviorOperation::Remove,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Behavior {
    name: String,
    context: ElementId,
    query: SelectionQuery,
    action: Option<BehaviorAction>,
}

impl Behavior {
    /// Create a behavior. The condition is parsed here, so a malformed query
    /// is rejected before the behavior is ever attached.
    pub fn new(
        name: impl Into<String>,
        context: ElementId,
        condition: &str,
        action: Option<BehaviorAction>,
    ) -> Result<Self> {
        Ok(Self {
            name: name.into(),
            context,
            query: SelectionQuery::parse(condition)?,
            action,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn context(&self) -> ElementId {
        self.context
    }

    pub fn condition(&self) -> &str {
        &self.query.text
    }

    pub fn query(&self) -> &SelectionQuery {
        &self.query
    }

    pub fn action(&self) -> Option<&BehaviorAction> {
        self.action.as_ref()
    }

    /// True when the condition selects at least one element.
    pub fn evaluate(&self, model: &Model) -> Result<bool> {
        Ok(!self.query.evaluate(model, self.context)?.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ModelError;
    use crate::model::{ContextKind, ElementSpec};

    #[test]
    fn test_condition_parsed_eagerly() {
        let err = Behavior::new("b", ElementId(0), "SELECT * X>1", None).unwrap_err();
        assert!(matches!(err, ModelError::MalformedQuery { .. }));
    }

    #[test]
    fn test_evaluate_in_context() {
        let mut m = Model::new("m");
        let root = m.root();
        let asm = m.add_context(root, "asm", ContextKind::Assembly).unwrap();
        let p = m
            .add_element(asm, ElementSpec::new("p", "Point").with_property("x", 1.0))
            .unwrap();
        let b = Behavior::new("big", asm, "SELECT * WHERE x>5", Some(BehaviorAction::remove("p")))
            .unwrap();
        assert_eq!(b.condition(), "SELECT * WHERE x>5");
        assert!(!b.evaluate(&m).unwrap());
        m.set_property(p, "x", 9.0).unwrap();
        assert!(b.evaluate(&m).unwrap());
        assert_eq!(b.action().unwrap().operation, BehaviorOperation::Remove);
    }

    #[test]
    fn test_behaviors_dropped_with_context() {
        let mut m = Model::new("m");
        let root = m.root();
        let asm = m.add_context(root, "asm", ContextKind::Assembly).unwrap();
        m.attach_behavior(Behavior::new("b", asm, "SELECT * WHERE x>5", None).unwrap())
            .unwrap();
        assert!(matches!(
            m.attach_behavior(Behavior::new("b", asm, "SELECT * WHERE x>1", None).unwrap()),
            Err(ModelError::DuplicateName { .. })
        ));
        assert_eq!(m.behaviors().len(), 1);
        m.delete(asm).unwrap();
        assert!(m.behaviors().is_empty());
    }
}
