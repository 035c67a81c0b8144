//! The model tree.
//!
//! A [`Model`] is an arena of [`Element`]s addressed by stable [`ElementId`]s.
//! Contexts own an ordered [`NamedRegistry`] of children; every element knows
//! its owning context by id only, so no reference cycles are retained.
//!
//! - [`element`] – elements, capabilities, context kinds
//! - [`registry`] – per-context ordered name registry
//! - [`path`] – dotted lookup paths

pub mod element;
pub mod path;
pub mod registry;

pub use element::{Capabilities, ContextData, ContextKind, Element, ElementId, ElementSpec};
pub use path::{ElementPath, Resolved};
pub use registry::{Membership, NamedRegistry, RegistryEntry};

use indexmap::IndexSet;
use std::collections::HashSet;
use tracing::debug;

use crate::behavior::Behavior;
use crate::error::{ModelError, Result};
use crate::event::ModelEvent;
use crate::update::UpdateBinding;
use crate::value::{Properties, Value};
use element::is_valid_name;

const ROOT: ElementId = ElementId(0);

/// A model: the root context plus everything registered beneath it.
#[derive(Debug)]
pub struct Model {
    elements: Vec<Option<Element>>,
    events: Vec<ModelEvent>,
    behaviors: Vec<Behavior>,
}

impl Model {
    pub fn new(name: impl Into<String>) -> Self {
        let root = Element {
            name: name.into(),
            owner: None,
            element_type: ContextKind::Model.as_str().to_string(),
            capabilities: Capabilities::GRAPHABLE | Capabilities::VIEWABLE,
            state: Properties::new(),
            binding: None,
            last_failure: None,
            context: Some(ContextData {
                kind: ContextKind::Model,
                registry: NamedRegistry::new(),
            }),
        };
        Self {
            elements: vec![Some(root)],
            events: Vec::new(),
            behaviors: Vec::new(),
        }
    }

    pub fn root(&self) -> ElementId {
        ROOT
    }

    pub fn name(&self) -> &str {
        self.elements[ROOT.0]
            .as_ref()
            .map(|e| e.name.as_str())
            .unwrap_or_default()
    }

    pub fn contains(&self, id: ElementId) -> bool {
        matches!(self.elements.get(id.0), Some(Some(_)))
    }

    pub fn get(&self, id: ElementId) -> Result<&Element> {
        self.elements
            .get(id.0)
            .and_then(|e| e.as_ref())
            .ok_or_else(|| ModelError::UnknownElement(id.to_string()))
    }

    pub(crate) fn get_mut(&mut self, id: ElementId) -> Result<&mut Element> {
        self.elements
            .get_mut(id.0)
            .and_then(|e| e.as_mut())
            .ok_or_else(|| ModelError::UnknownElement(id.to_string()))
    }

    /// Live elements in creation order.
    pub fn elements(&self) -> impl Iterator<Item = (ElementId, &Element)> {
        self.elements
            .iter()
            .enumerate()
            .filter_map(|(i, e)| e.as_ref().map(|e| (ElementId(i), e)))
    }

    pub fn len(&self) -> usize {
        self.elements().count()
    }

    /// Always false: the root context exists for the model's lifetime.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Ancestor names joined by `.`, root first.
    pub fn canonical_name(&self, id: ElementId) -> Result<String> {
        let mut names = Vec::new();
        let mut cur = Some(id);
        while let Some(c) = cur {
            let el = self.get(c)?;
            names.push(el.name.as_str());
            cur = el.owner;
        }
        names.reverse();
        Ok(names.join("."))
    }

    /// The registry of context `ctx`, in insertion order.
    pub fn element_map(&self, ctx: ElementId) -> Result<&NamedRegistry> {
        let el = self.get(ctx)?;
        match el.registry() {
            Some(reg) => Ok(reg),
            None => Err(ModelError::NotAContext(self.canonical_name(ctx)?)),
        }
    }

    fn register(
        &mut self,
        parent: ElementId,
        element: Element,
        membership: Membership,
    ) -> Result<ElementId> {
        if !is_valid_name(&element.name) {
            return Err(ModelError::InvalidName(element.name));
        }
        let registry = self.element_map(parent)?;
        if registry.contains(&element.name) {
            return Err(ModelError::DuplicateName {
                name: element.name,
                context: self.canonical_name(parent)?,
            });
        }
        let id = ElementId(self.elements.len());
        let name = element.name.clone();
        self.elements.push(Some(element));
        if let Some(reg) = self.get_mut(parent)?.registry_mut() {
            reg.insert(&name, RegistryEntry { id, membership });
        }
        let path = self.canonical_name(id)?;
        debug!(path = %path, "element added");
        self.emit(ModelEvent::ElementAdded { path });
        Ok(id)
    }

    /// Add an owned sub-context.
    pub fn add_context(
        &mut self,
        parent: ElementId,
        name: &str,
        kind: ContextKind,
    ) -> Result<ElementId> {
        let element = Element {
            name: name.to_string(),
            owner: Some(parent),
            element_type: kind.as_str().to_string(),
            capabilities: Capabilities::all(),
            state: Properties::new(),
            binding: None,
            last_failure: None,
            context: Some(ContextData {
                kind,
                registry: NamedRegistry::new(),
            }),
        };
        self.register(parent, element, Membership::Owned)
    }

    /// Add an owned leaf element.
    pub fn add_element(&mut self, parent: ElementId, spec: ElementSpec) -> Result<ElementId> {
        if spec.binding.is_some() && !spec.capabilities.contains(Capabilities::UPDATEABLE) {
            return Err(ModelError::NotUpdateable(spec.name));
        }
        let element = Element {
            name: spec.name,
            owner: Some(parent),
            element_type: spec.element_type,
            capabilities: spec.capabilities,
            state: spec.state,
            binding: spec.binding,
            last_failure: None,
            context: None,
        };
        self.register(parent, element, Membership::Owned)
    }

    /// Reuse `target`, owned elsewhere, inside `scenario` under the target's
    /// own name.
    pub fn add_contextual(&mut self, scenario: ElementId, target: ElementId) -> Result<()> {
        let scenario_el = self.get(scenario)?;
        if scenario_el.context_kind() != Some(ContextKind::Scenario) {
            return Err(ModelError::NotAScenario(self.canonical_name(scenario)?));
        }
        let name = self.get(target)?.name.clone();
        if target == scenario || self.get(target)?.owner == Some(scenario) {
            return Err(ModelError::DuplicateName {
                name,
                context: self.canonical_name(scenario)?,
            });
        }
        let context_path = self.canonical_name(scenario)?;
        let inserted = match self.get_mut(scenario)?.registry_mut() {
            Some(reg) => reg.insert(
                &name,
                RegistryEntry {
                    id: target,
                    membership: Membership::Contextual,
                },
            ),
            None => false,
        };
        if !inserted {
            return Err(ModelError::DuplicateName {
                name,
                context: context_path,
            });
        }
        let path = format!("{}.{}", context_path, name);
        debug!(path = %path, "contextual element added");
        self.emit(ModelEvent::ElementAdded { path });
        Ok(())
    }

    /// Remove `name` from the registry of `ctx`. Owned elements are deleted,
    /// contextual entries are only unlinked. Returns the id the name pointed at.
    pub fn remove(&mut self, ctx: ElementId, name: &str) -> Result<ElementId> {
        let context_path = self.canonical_name(ctx)?;
        let entry = self.element_map(ctx)?.get(name).copied().ok_or_else(|| {
            ModelError::unresolved(name, format!("no element '{}' in {}", name, context_path))
        })?;
        match entry.membership {
            Membership::Owned => self.delete(entry.id)?,
            Membership::Contextual => {
                if let Some(reg) = self.get_mut(ctx)?.registry_mut() {
                    reg.remove(name);
                }
                let path = format!("{}.{}", context_path, name);
                debug!(path = %path, "contextual element removed");
                self.emit(ModelEvent::ElementDeleted { path });
            }
        }
        Ok(entry.id)
    }

    fn owned_subtree(&self, id: ElementId, out: &mut Vec<ElementId>) {
        if let Some(Some(el)) = self.elements.get(id.0) {
            if let Some(reg) = el.registry() {
                for (_, entry) in reg.iter() {
                    if entry.membership == Membership::Owned {
                        self.owned_subtree(entry.id, out);
                    }
                }
            }
        }
        out.push(id);
    }

    /// Delete an element and its owned subtree.
    ///
    /// The element leaves its owner's registry, every contextual entry that
    /// points into the deleted subtree is unlinked, and behaviors attached to
    /// deleted contexts are dropped. One `ElementDeleted` event is raised per
    /// removed element and per unlinked contextual entry.
    pub fn delete(&mut self, id: ElementId) -> Result<()> {
        if id == ROOT {
            return Err(ModelError::RootElement);
        }
        let el = self.get(id)?;
        let owner = el
            .owner
            .ok_or_else(|| ModelError::UnknownElement(id.to_string()))?;
        let name = el.name.clone();

        let mut doomed = Vec::new();
        self.owned_subtree(id, &mut doomed);
        let doomed_paths = doomed
            .iter()
            .map(|d| self.canonical_name(*d))
            .collect::<Result<Vec<_>>>()?;
        let doomed_set: HashSet<ElementId> = doomed.iter().copied().collect();

        if let Some(reg) = self.get_mut(owner)?.registry_mut() {
            reg.remove(&name);
        }

        let mut unlinked = Vec::new();
        for idx in 0..self.elements.len() {
            let cid = ElementId(idx);
            if doomed_set.contains(&cid) {
                continue;
            }
            let names: Vec<String> = match self.elements[idx].as_mut().and_then(|e| e.registry_mut()) {
                Some(reg) => doomed.iter().flat_map(|d| reg.remove_id(*d)).collect(),
                None => continue,
            };
            if !names.is_empty() {
                let ctx_path = self.canonical_name(cid)?;
                unlinked.extend(names.into_iter().map(|n| format!("{}.{}", ctx_path, n)));
            }
        }

        for d in &doomed {
            self.elements[d.0] = None;
        }
        self.behaviors.retain(|b| !doomed_set.contains(&b.context()));

        for path in unlinked.into_iter().chain(doomed_paths) {
            debug!(path = %path, "element deleted");
            self.emit(ModelEvent::ElementDeleted { path });
        }
        Ok(())
    }

    /// Rename an element together with every contextual entry that reuses
    /// it. Fails with `DuplicateName`, leaving every registry unchanged, when
    /// the new name is taken in the owning context or in one of those
    /// scenarios.
    pub fn rename(&mut self, id: ElementId, new_name: &str) -> Result<()> {
        if !is_valid_name(new_name) {
            return Err(ModelError::InvalidName(new_name.to_string()));
        }
        let el = self.get(id)?;
        if el.name == new_name {
            return Ok(());
        }
        let old_name = el.name.clone();
        let owner = el.owner;
        let old_path = self.canonical_name(id)?;

        // (context, key) of the owning entry first, then of every alias.
        let mut entries: Vec<(ElementId, String)> = Vec::new();
        if let Some(owner) = owner {
            entries.push((owner, old_name));
        }
        for (cid, ctx) in self.elements() {
            let Some(reg) = ctx.registry() else {
                continue;
            };
            for (key, entry) in reg.iter() {
                if entry.id == id && entry.membership == Membership::Contextual {
                    entries.push((cid, key.to_string()));
                }
            }
        }
        for (ctx, _) in &entries {
            if self.element_map(*ctx)?.contains(new_name) {
                return Err(ModelError::DuplicateName {
                    name: new_name.to_string(),
                    context: self.canonical_name(*ctx)?,
                });
            }
        }

        let mut alias_paths = Vec::new();
        for (ctx, key) in &entries {
            if let Some(reg) = self.get_mut(*ctx)?.registry_mut() {
                reg.rename(key, new_name);
            }
            if Some(*ctx) != owner {
                let ctx_path = self.canonical_name(*ctx)?;
                alias_paths.push((format!("{}.{}", ctx_path, key), format!("{}.{}", ctx_path, new_name)));
            }
        }
        self.get_mut(id)?.name = new_name.to_string();
        let new_path = self.canonical_name(id)?;
        debug!(old = %old_path, new = %new_path, "element renamed");
        self.emit(ModelEvent::ElementRenamed { old_path, new_path });
        for (old_path, new_path) in alias_paths {
            debug!(old = %old_path, new = %new_path, "contextual element renamed");
            self.emit(ModelEvent::ElementRenamed { old_path, new_path });
        }
        Ok(())
    }

    /// Resolve a dotted path relative to context `ctx`.
    ///
    /// The first segment must name a child of `ctx`. Each further segment
    /// descends into a child context; the last segment may instead name a
    /// property of the element reached so far.
    pub fn lookup(&self, ctx: ElementId, path: &str) -> Result<Resolved> {
        let parsed = ElementPath::parse(path)?;
        self.element_map(ctx)?;
        let segments = parsed.segments();
        let mut current = ctx;
        for (i, seg) in segments.iter().enumerate() {
            let el = self.get(current)?;
            if let Some(id) = el.registry().and_then(|r| r.id(seg)) {
                current = id;
                continue;
            }
            let here = self.canonical_name(current)?;
            if i == 0 {
                return Err(ModelError::unresolved(
                    path,
                    format!("no element '{}' in {}", seg, here),
                ));
            }
            if i + 1 < segments.len() {
                let reason = if el.is_context() {
                    format!("no element '{}' in {}", seg, here)
                } else {
                    format!("{} is not a context", here)
                };
                return Err(ModelError::unresolved(path, reason));
            }
            return match el.get_property(seg) {
                Some(Value::Null) => Err(ModelError::unresolved(
                    path,
                    format!("property '{}' of {} is null", seg, here),
                )),
                Some(value) => Ok(Resolved::Property {
                    element: current,
                    name: seg.clone(),
                    value,
                }),
                None => Err(ModelError::unresolved(
                    path,
                    format!("{} has no element or property '{}'", here, seg),
                )),
            };
        }
        Ok(Resolved::Element(current))
    }

    /// Resolve a path that must name an element, not a property.
    pub fn lookup_element(&self, ctx: ElementId, path: &str) -> Result<ElementId> {
        match self.lookup(ctx, path)? {
            Resolved::Element(id) => Ok(id),
            Resolved::Property { .. } => Err(ModelError::unresolved(
                path,
                "path names a property, not an element",
            )),
        }
    }

    /// Resolve a path to a value: properties as they are, whole elements as a
    /// state snapshot.
    pub fn resolve_value(&self, ctx: ElementId, path: &str) -> Result<Value> {
        match self.lookup(ctx, path)? {
            Resolved::Element(id) => Ok(self.get(id)?.snapshot()),
            Resolved::Property { value, .. } => Ok(value),
        }
    }

    fn scenario_entries(
        &self,
        scenario: ElementId,
        membership: Membership,
    ) -> Result<Vec<(String, ElementId)>> {
        let el = self.get(scenario)?;
        if el.context_kind() != Some(ContextKind::Scenario) {
            return Err(ModelError::NotAScenario(self.canonical_name(scenario)?));
        }
        Ok(self
            .element_map(scenario)?
            .with_membership(membership)
            .map(|(n, id)| (n.to_string(), id))
            .collect())
    }

    /// Elements a scenario reuses from elsewhere.
    pub fn contextual_elements(&self, scenario: ElementId) -> Result<Vec<(String, ElementId)>> {
        self.scenario_entries(scenario, Membership::Contextual)
    }

    /// Elements a scenario owns.
    pub fn transactional_elements(&self, scenario: ElementId) -> Result<Vec<(String, ElementId)>> {
        self.scenario_entries(scenario, Membership::Owned)
    }

    /// Replace the update binding of an element.
    pub fn set_binding(&mut self, id: ElementId, binding: UpdateBinding) -> Result<()> {
        if !self.get(id)?.has(Capabilities::UPDATEABLE) {
            return Err(ModelError::NotUpdateable(self.canonical_name(id)?));
        }
        self.get_mut(id)?.binding = Some(binding);
        Ok(())
    }

    /// Edit one state property directly.
    pub fn set_property(&mut self, id: ElementId, name: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        let el = self.get_mut(id)?;
        if el.state.get(name) == Some(&value) {
            return Ok(());
        }
        el.state.insert(name.to_string(), value);
        let path = self.canonical_name(id)?;
        self.emit(ModelEvent::PropertyChanged { path });
        Ok(())
    }

    /// All elements below `ctx`, depth first in registry order. Contextual
    /// entries are included but not descended into.
    pub fn descendants(&self, ctx: ElementId) -> Result<IndexSet<ElementId>> {
        fn walk(model: &Model, ctx: ElementId, out: &mut IndexSet<ElementId>) -> Result<()> {
            for (_, entry) in model.element_map(ctx)?.iter() {
                if !out.insert(entry.id) {
                    continue;
                }
                if entry.membership == Membership::Owned && model.get(entry.id)?.is_context() {
                    walk(model, entry.id, out)?;
                }
            }
            Ok(())
        }
        let mut out = IndexSet::new();
        walk(self, ctx, &mut out)?;
        Ok(out)
    }

    /// Elements recomputed by an update of `id`: a context's descendants, or
    /// the element itself.
    pub fn update_scope(&self, id: ElementId) -> Result<IndexSet<ElementId>> {
        if self.get(id)?.is_context() {
            self.descendants(id)
        } else {
            Ok(IndexSet::from([id]))
        }
    }

    pub fn attach_behavior(&mut self, behavior: Behavior) -> Result<()> {
        let ctx = behavior.context();
        self.element_map(ctx)?;
        if self
            .behaviors
            .iter()
            .any(|b| b.context() == ctx && b.name() == behavior.name())
        {
            return Err(ModelError::DuplicateName {
                name: behavior.name().to_string(),
                context: self.canonical_name(ctx)?,
            });
        }
        self.behaviors.push(behavior);
        Ok(())
    }

    pub fn detach_behavior(&mut self, ctx: ElementId, name: &str) -> Option<Behavior> {
        let index = self
            .behaviors
            .iter()
            .position(|b| b.context() == ctx && b.name() == name)?;
        Some(self.behaviors.remove(index))
    }

    pub fn behaviors(&self) -> &[Behavior] {
        &self.behaviors
    }

    pub(crate) fn emit(&mut self, event: ModelEvent) {
        self.events.push(event);
    }

    /// Drain queued change notifications.
    pub fn take_events(&mut self) -> Vec<ModelEvent> {
        std::mem::take(&mut self.events)
    }
}
