use indexmap::IndexMap;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::binding::InputSource;
use super::method::{MethodRegistry, UpdateArgs};
use crate::error::Result;
use crate::event::ModelEvent;
use crate::graph::DependencyGraph;
use crate::model::{Capabilities, ElementId, Model};
use crate::value::Properties;

/// A per-element failure recorded during an update pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpdateFailure {
    pub element: String,
    pub message: String,
}

/// Outcome of one update pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UpdateReport {
    /// Canonical name of the updated context or element.
    pub target: String,
    /// Every element of the pass in the order it was processed.
    pub order: Vec<String>,
    /// Elements whose state actually changed.
    pub changed: Vec<String>,
    pub failures: Vec<UpdateFailure>,
    /// Behaviors that fired after the pass, as `context.behavior`.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fired: Vec<String>,
}

impl UpdateReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failure(&self, element: &str) -> Option<&UpdateFailure> {
        self.failures.iter().find(|f| f.element == element)
    }

    /// Position of `element` in the processing order.
    pub fn position(&self, element: &str) -> Option<usize> {
        self.order.iter().position(|e| e == element)
    }
}

/// Runs update passes with the methods of a [`MethodRegistry`].
#[derive(Debug, Clone, Copy)]
pub struct UpdateExecutor<'a> {
    methods: &'a MethodRegistry,
}

impl<'a> UpdateExecutor<'a> {
    pub fn new(methods: &'a MethodRegistry) -> Self {
        Self { methods }
    }

    /// Recompute everything in the update scope of `target` from the current
    /// inputs, upstream first.
    ///
    /// A successful method's output becomes the element's whole state, so
    /// keys the method no longer returns disappear.
    ///
    /// A dependency cycle aborts the pass before any element is touched.
    /// Per-element failures are recorded on the element and in the report;
    /// dependents are still processed. Afterwards one `PropertyChanged` is
    /// queued per changed element, then one `ContextUpdated` for `target`.
    pub fn update(&self, model: &mut Model, target: ElementId) -> Result<UpdateReport> {
        let scope = model.update_scope(target)?;
        let order = DependencyGraph::extract(model, &scope)?.sequence_in(model)?;

        let mut report = UpdateReport {
            target: model.canonical_name(target)?,
            ..Default::default()
        };
        for id in order {
            let path = model.canonical_name(id)?;
            report.order.push(path.clone());
            let outcome = match self.compute(model, id, &path) {
                Some(outcome) => outcome,
                None => continue,
            };
            let el = model.get_mut(id)?;
            match outcome {
                Ok(output) => {
                    el.last_failure = None;
                    if output != el.state {
                        el.state = output;
                        debug!(element = %path, "state changed");
                        report.changed.push(path);
                    }
                }
                Err(message) => {
                    warn!(element = %path, error = %message, "update failed");
                    el.last_failure = Some(message.clone());
                    report.failures.push(UpdateFailure {
                        element: path,
                        message,
                    });
                }
            }
        }

        for path in &report.changed {
            model.emit(ModelEvent::PropertyChanged { path: path.clone() });
        }
        model.emit(ModelEvent::ContextUpdated {
            path: report.target.clone(),
        });
        info!(
            target = %report.target,
            elements = report.order.len(),
            changed = report.changed.len(),
            failed = report.failures.len(),
            "update pass complete"
        );
        Ok(report)
    }

    /// New state entries for one element, `None` when it has nothing to run.
    fn compute(
        &self,
        model: &Model,
        id: ElementId,
        path: &str,
    ) -> Option<std::result::Result<Properties, String>> {
        let el = model.get(id).ok()?;
        if !el.has(Capabilities::UPDATEABLE) || el.binding().is_none() {
            return None;
        }
        Some(self.invoke(model, id, path).map_err(|e| format!("{:#}", e)))
    }

    fn invoke(&self, model: &Model, id: ElementId, path: &str) -> anyhow::Result<Properties> {
        let el = model.get(id)?;
        let Some(binding) = el.binding() else {
            return Ok(Properties::new());
        };
        let method = self
            .methods
            .resolve(el.element_type(), binding.method.as_deref())?;
        let ctx = el.owner().unwrap_or(id);
        let mut inputs = IndexMap::new();
        for param in method.params() {
            let source = binding
                .input(param)
                .ok_or_else(|| anyhow::anyhow!("parameter '{}' is not bound", param))?;
            let value = match source {
                InputSource::Literal(v) => v.clone(),
                InputSource::Reference(p) => model.resolve_value(ctx, p)?,
            };
            inputs.insert(param.clone(), value);
        }
        let args = UpdateArgs {
            element: path.to_string(),
            inputs,
        };
        method.invoke(&args)
    }
}
