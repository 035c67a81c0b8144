//! Application state.
//!
//! A [`Session`] owns the open model (if any), the method registry, the
//! event observers and the engine configuration. Everything that mutates the
//! model through the session dispatches the resulting events before
//! returning.

use indexmap::IndexSet;
use tracing::{info, warn};

use crate::behavior::{Behavior, BehaviorOperation};
use crate::builtins::register_builtins;
use crate::config::EngineConfig;
use crate::error::{ModelError, Result};
use crate::event::{EventBus, ModelEvent, SubscriptionId};
use crate::graph;
use crate::model::{ContextKind, ElementId, ElementSpec, Model};
use crate::selection::{self, ElementSet};
use crate::update::{MethodRegistry, UpdateBinding, UpdateExecutor, UpdateReport};

pub struct Session {
    config: EngineConfig,
    methods: MethodRegistry,
    bus: EventBus,
    model: Option<Model>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl Session {
    /// A session with the built-in element types registered and no model.
    pub fn new(config: EngineConfig) -> Self {
        let mut methods = MethodRegistry::new();
        register_builtins(&mut methods);
        Self {
            config,
            methods,
            bus: EventBus::new(),
            model: None,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn methods(&self) -> &MethodRegistry {
        &self.methods
    }

    pub fn methods_mut(&mut self) -> &mut MethodRegistry {
        &mut self.methods
    }

    pub fn subscribe<F>(&mut self, observer: F) -> SubscriptionId
    where
        F: FnMut(&ModelEvent, &mut Model) + 'static,
    {
        self.bus.subscribe(observer)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.bus.unsubscribe(id)
    }

    pub fn is_open(&self) -> bool {
        self.model.is_some()
    }

    pub fn model(&self) -> Result<&Model> {
        self.model.as_ref().ok_or(ModelError::NoModel)
    }

    /// Direct access to the model. Events raised through it are delivered by
    /// the next [`Session::dispatch`].
    pub fn model_mut(&mut self) -> Result<&mut Model> {
        self.model.as_mut().ok_or(ModelError::NoModel)
    }

    /// Start a new, empty model, replacing (and closing) any open one.
    pub fn new_model(&mut self, name: &str) -> Result<ElementId> {
        self.open(Model::new(name))
    }

    /// Make `model` the open model.
    pub fn open(&mut self, mut model: Model) -> Result<ElementId> {
        if self.model.is_some() {
            self.close()?;
        }
        let name = model.name().to_string();
        info!(model = %name, "model loaded");
        model.emit(ModelEvent::ModelLoaded { name });
        let root = model.root();
        self.model = Some(model);
        self.dispatch()?;
        Ok(root)
    }

    /// Close the open model. Observers see `ModelClosed` while the model is
    /// still alive; it is dropped afterwards.
    pub fn close(&mut self) -> Result<Model> {
        let model = self.model_mut()?;
        let name = model.name().to_string();
        model.emit(ModelEvent::ModelClosed { name: name.clone() });
        let dispatched = self.dispatch();
        let model = self.model.take().ok_or(ModelError::NoModel)?;
        info!(model = %name, "model closed");
        dispatched.map(|_| model)
    }

    pub fn mark_saved(&mut self) -> Result<()> {
        let model = self.model_mut()?;
        let name = model.name().to_string();
        model.emit(ModelEvent::ModelSaved { name });
        self.dispatch()?;
        Ok(())
    }

    /// Deliver queued events to observers.
    pub fn dispatch(&mut self) -> Result<usize> {
        let model = self.model.as_mut().ok_or(ModelError::NoModel)?;
        self.bus.dispatch(model, self.config.max_event_cascade)
    }

    pub fn add_context(&mut self, parent: ElementId, name: &str, kind: ContextKind) -> Result<ElementId> {
        let id = self.model_mut()?.add_context(parent, name, kind)?;
        self.dispatch()?;
        Ok(id)
    }

    /// Add a leaf element, validating its binding against the method registry.
    pub fn add_element(&mut self, parent: ElementId, spec: ElementSpec) -> Result<ElementId> {
        if let Some(binding) = &spec.binding {
            self.methods
                .resolve(&spec.element_type, binding.method.as_deref())?;
        }
        let id = self.model_mut()?.add_element(parent, spec)?;
        self.dispatch()?;
        Ok(id)
    }

    pub fn add_contextual(&mut self, scenario: ElementId, target: ElementId) -> Result<()> {
        self.model_mut()?.add_contextual(scenario, target)?;
        self.dispatch()?;
        Ok(())
    }

    pub fn rename(&mut self, id: ElementId, new_name: &str) -> Result<()> {
        self.model_mut()?.rename(id, new_name)?;
        self.dispatch()?;
        Ok(())
    }

    pub fn remove(&mut self, ctx: ElementId, name: &str) -> Result<ElementId> {
        let id = self.model_mut()?.remove(ctx, name)?;
        self.dispatch()?;
        Ok(id)
    }

    pub fn delete(&mut self, id: ElementId) -> Result<()> {
        self.model_mut()?.delete(id)?;
        self.dispatch()?;
        Ok(())
    }

    /// Bind an element to an update method. The element must be updateable
    /// and its type must have the selected (or a default) method.
    ///
    /// A binding that would put the element on a dependency cycle is rejected
    /// with `GraphCycle` and the previous binding stays in place.
    pub fn bind(&mut self, id: ElementId, binding: UpdateBinding) -> Result<()> {
        let model = self.model.as_mut().ok_or(ModelError::NoModel)?;
        let element_type = model.get(id)?.element_type().to_string();
        self.methods
            .resolve(&element_type, binding.method.as_deref())?;
        let previous = model.get(id)?.binding().cloned();
        model.set_binding(id, binding)?;

        let path = model.canonical_name(id)?;
        let root = model.root();
        match graph::sequence(model, root) {
            Err(ModelError::GraphCycle { cycle }) if cycle.contains(&path) => {
                model.get_mut(id)?.binding = previous;
                warn!(element = %path, "binding rejected: dependency cycle");
                Err(ModelError::GraphCycle { cycle })
            }
            _ => Ok(()),
        }
    }

    pub fn attach_behavior(&mut self, behavior: Behavior) -> Result<()> {
        self.model_mut()?.attach_behavior(behavior)
    }

    pub fn select(&self, ctx: ElementId, query: &str) -> Result<ElementSet> {
        selection::select(self.model()?, ctx, query)
    }

    /// Update `target`, run the behaviors of the updated contexts, then
    /// dispatch every event raised along the way.
    pub fn update(&mut self, target: ElementId) -> Result<UpdateReport> {
        let model = self.model.as_mut().ok_or(ModelError::NoModel)?;
        let executor = UpdateExecutor::new(&self.methods);
        let mut report = executor.update(model, target)?;
        if self.config.run_behaviors {
            report.fired = run_behaviors(&executor, model, target)?;
        }
        self.bus.dispatch(model, self.config.max_event_cascade)?;
        Ok(report)
    }
}

/// Evaluate the behaviors attached to `target` or to any context below it,
/// in attachment order. Each fires at most once. Returns the fired
/// behaviors as `context.behavior`.
fn run_behaviors(
    executor: &UpdateExecutor<'_>,
    model: &mut Model,
    target: ElementId,
) -> Result<Vec<String>> {
    let mut contexts: IndexSet<ElementId> = model.update_scope(target)?;
    contexts.insert(target);
    let candidates: Vec<Behavior> = model
        .behaviors()
        .iter()
        .filter(|b| contexts.contains(&b.context()))
        .cloned()
        .collect();

    let mut fired = Vec::new();
    for behavior in candidates {
        // An earlier action may have deleted this behavior's context.
        if !model.contains(behavior.context()) {
            continue;
        }
        let label = format!(
            "{}.{}",
            model.canonical_name(behavior.context())?,
            behavior.name()
        );
        match behavior.evaluate(model) {
            Ok(true) => {}
            Ok(false) => continue,
            Err(e) => {
                warn!(behavior = %label, error = %e, "behavior condition failed");
                continue;
            }
        }
        info!(behavior = %label, "behavior fired");
        if let Some(action) = behavior.action() {
            let outcome = model
                .lookup_element(behavior.context(), &action.target)
                .and_then(|id| match action.operation {
                    BehaviorOperation::Update => executor.update(model, id).map(|_| ()),
                    BehaviorOperation::Remove => model.delete(id),
                });
            if let Err(e) = outcome {
                warn!(behavior = %label, target = %action.target, error = %e, "behavior action failed");
            }
        }
        fired.push(label);
    }
    Ok(fired)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::BehaviorAction;
    use crate::builtins::PARAMETER;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn recorder(session: &mut Session) -> Rc<RefCell<Vec<ModelEvent>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        session.subscribe(move |e, _| sink.borrow_mut().push(e.clone()));
        seen
    }

    #[test]
    fn test_lifecycle_events() {
        let mut session = Session::default();
        let seen = recorder(&mut session);
        assert!(matches!(session.model(), Err(ModelError::NoModel)));

        session.new_model("a").unwrap();
        session.mark_saved().unwrap();
        session.new_model("b").unwrap();
        let closed = session.close().unwrap();
        assert_eq!(closed.name(), "b");
        assert!(!session.is_open());
        assert_eq!(
            *seen.borrow(),
            vec![
                ModelEvent::ModelLoaded { name: "a".into() },
                ModelEvent::ModelSaved { name: "a".into() },
                ModelEvent::ModelClosed { name: "a".into() },
                ModelEvent::ModelLoaded { name: "b".into() },
                ModelEvent::ModelClosed { name: "b".into() },
            ]
        );
        assert!(matches!(session.close(), Err(ModelError::NoModel)));
    }

    #[test]
    fn test_bind_validates_method() {
        let mut session = Session::default();
        let root = session.new_model("m").unwrap();
        let p = session
            .add_element(root, ElementSpec::new("p", PARAMETER))
            .unwrap();
        assert!(matches!(
            session.bind(p, UpdateBinding::new().with_method("nope")),
            Err(ModelError::UnknownUpdateMethod { .. })
        ));
        session
            .bind(p, UpdateBinding::new().literal("value", 3.0))
            .unwrap();
        session.update(p).unwrap();
        assert_eq!(
            session.model().unwrap().get(p).unwrap().get_property("value"),
            Some(3.0.into())
        );
    }

    #[test]
    fn test_bind_rejects_cycles_and_keeps_previous_binding() {
        let mut session = Session::default();
        let root = session.new_model("m").unwrap();
        let asm = session
            .add_context(root, "asm", ContextKind::Assembly)
            .unwrap();
        let a = session
            .add_element(
                asm,
                ElementSpec::new("a", PARAMETER)
                    .with_binding(UpdateBinding::new().literal("value", 1.0)),
            )
            .unwrap();
        session
            .add_element(
                asm,
                ElementSpec::new("b", PARAMETER)
                    .with_binding(UpdateBinding::new().reference("value", "a.value")),
            )
            .unwrap();

        let err = session
            .bind(a, UpdateBinding::new().reference("value", "b.value"))
            .unwrap_err();
        match err {
            ModelError::GraphCycle { cycle } => {
                assert_eq!(cycle.first(), cycle.last());
                assert!(cycle.contains(&"m.asm.a".to_string()));
            }
            other => panic!("expected a cycle, got {:?}", other),
        }
        let kept = session.model().unwrap().get(a).unwrap().binding().cloned();
        assert_eq!(kept, Some(UpdateBinding::new().literal("value", 1.0)));

        let report = session.update(asm).unwrap();
        assert!(report.is_clean());
        assert_eq!(report.order, vec!["m.asm.a", "m.asm.b"]);
    }

    #[test]
    fn test_behavior_fires_once_and_removes_target() {
        let mut session = Session::default();
        let root = session.new_model("m").unwrap();
        let asm = session
            .add_context(root, "asm", ContextKind::Assembly)
            .unwrap();
        session
            .add_element(
                asm,
                ElementSpec::new("big", PARAMETER)
                    .with_binding(UpdateBinding::new().literal("value", 10.0)),
            )
            .unwrap();
        let scratch = session
            .add_element(asm, ElementSpec::new("scratch", PARAMETER))
            .unwrap();
        session
            .attach_behavior(
                Behavior::new(
                    "prune",
                    asm,
                    "SELECT * WHERE value>5",
                    Some(BehaviorAction::remove("scratch")),
                )
                .unwrap(),
            )
            .unwrap();

        let report = session.update(asm).unwrap();
        assert_eq!(report.fired, vec!["m.asm.prune"]);
        assert!(!session.model().unwrap().contains(scratch));

        // The target is gone; the action now fails and is only logged.
        let report = session.update(asm).unwrap();
        assert_eq!(report.fired, vec!["m.asm.prune"]);
    }

    #[test]
    fn test_behaviors_can_be_disabled() {
        let mut session = Session::new(EngineConfig {
            run_behaviors: false,
            ..Default::default()
        });
        let root = session.new_model("m").unwrap();
        session
            .add_element(root, ElementSpec::new("a", PARAMETER).with_property("value", 1.0))
            .unwrap();
        session
            .attach_behavior(Behavior::new("b", root, "SELECT * WHERE value==1", None).unwrap())
            .unwrap();
        assert!(session.update(root).unwrap().fired.is_empty());
    }
}
