//! Dependency extraction and topological sequencing.
//!
//! An element depends on every element its update binding references. The
//! sequencer orders a set of elements so that each comes after everything it
//! depends on, breaking ties by registry insertion order, and rejects cycles.
//!
//! Cycle detection uses the usual three marks (unvisited, visiting, done):
//! reaching a node that is still on the active DFS path closes a cycle.

use indexmap::{IndexMap, IndexSet};
use std::collections::HashMap;
use std::hash::Hash;
use tracing::warn;

use crate::error::{ModelError, Result};
use crate::model::{Capabilities, ElementId, Model};

/// A dependency cycle found while sequencing. `cycle` starts and ends with
/// the same node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleError<N> {
    pub cycle: Vec<N>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

/// Nodes in insertion order, each with the nodes it depends on.
///
/// Dependencies on nodes that are not part of the graph are kept (they make
/// a node dependent) but do not take part in sequencing.
#[derive(Debug, Clone)]
pub struct DependencyGraph<N> {
    nodes: IndexMap<N, Vec<N>>,
}

impl<N> Default for DependencyGraph<N> {
    fn default() -> Self {
        Self {
            nodes: IndexMap::new(),
        }
    }
}

impl<N: Copy + Eq + Hash> DependencyGraph<N> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, node: N) {
        self.nodes.entry(node).or_default();
    }

    /// Record `node → dep`, adding `node` if needed. Duplicate edges are
    /// ignored.
    pub fn add_dependency(&mut self, node: N, dep: N) {
        let deps = self.nodes.entry(node).or_default();
        if !deps.contains(&dep) {
            deps.push(dep);
        }
    }

    pub fn contains(&self, node: N) -> bool {
        self.nodes.contains_key(&node)
    }

    pub fn dependencies(&self, node: N) -> &[N] {
        self.nodes.get(&node).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn nodes(&self) -> impl Iterator<Item = N> + '_ {
        self.nodes.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes with an empty dependency set, in insertion order.
    pub fn independent(&self) -> Vec<N> {
        self.nodes
            .iter()
            .filter(|(_, deps)| deps.is_empty())
            .map(|(n, _)| *n)
            .collect()
    }

    /// Depth-first post-order over the nodes in insertion order.
    ///
    /// No partial order is returned when a cycle exists.
    pub fn sequence(&self) -> std::result::Result<Vec<N>, CycleError<N>> {
        let mut marks: HashMap<N, Mark> = HashMap::with_capacity(self.nodes.len());
        let mut order = Vec::with_capacity(self.nodes.len());

        for &start in self.nodes.keys() {
            if marks.contains_key(&start) {
                continue;
            }
            marks.insert(start, Mark::Visiting);
            // (node, index of the next dependency to visit)
            let mut stack: Vec<(N, usize)> = vec![(start, 0)];

            while let Some(&(node, next)) = stack.last() {
                let deps = self.dependencies(node);
                if next == deps.len() {
                    stack.pop();
                    marks.insert(node, Mark::Done);
                    order.push(node);
                    continue;
                }
                if let Some(top) = stack.last_mut() {
                    top.1 += 1;
                }
                let dep = deps[next];
                if !self.nodes.contains_key(&dep) {
                    continue;
                }
                match marks.get(&dep) {
                    Some(Mark::Done) => {}
                    Some(Mark::Visiting) => {
                        let from = stack.iter().position(|(n, _)| *n == dep).unwrap_or(0);
                        let mut cycle: Vec<N> = stack[from..].iter().map(|(n, _)| *n).collect();
                        cycle.push(dep);
                        return Err(CycleError { cycle });
                    }
                    None => {
                        marks.insert(dep, Mark::Visiting);
                        stack.push((dep, 0));
                    }
                }
            }
        }
        Ok(order)
    }
}

/// Elements referenced by the update binding of `id`, in binding order.
///
/// References are resolved through the element's owning context; a property
/// reference counts as a dependency on the element owning the property, even
/// before that property has a value.
/// References that do not resolve are skipped here and surface as update
/// failures when the element is updated.
pub fn dependencies(model: &Model, id: ElementId) -> Result<Vec<ElementId>> {
    let el = model.get(id)?;
    let Some(binding) = el.binding() else {
        return Ok(Vec::new());
    };
    if !el.has(Capabilities::GRAPHABLE) {
        return Ok(Vec::new());
    }
    let ctx = el.owner().unwrap_or(id);
    let mut deps = IndexSet::new();
    for (param, path) in binding.references() {
        // A property that has not been computed yet still names its element.
        let resolved = model.lookup(ctx, path).map(|r| r.element()).or_else(|err| {
            match path.rsplit_once('.') {
                Some((owner, _)) => model.lookup_element(ctx, owner).map_err(|_| err),
                None => Err(err),
            }
        });
        match resolved {
            Ok(dep) => {
                deps.insert(dep);
            }
            Err(err) => {
                warn!(element = %model.canonical_name(id)?, param, error = %err, "skipping unresolved dependency");
            }
        }
    }
    Ok(deps.into_iter().collect())
}

impl DependencyGraph<ElementId> {
    /// Dependency graph over `scope`, nodes in the scope's order.
    pub fn extract(model: &Model, scope: &IndexSet<ElementId>) -> Result<Self> {
        let mut graph = DependencyGraph::new();
        for &id in scope {
            graph.add_node(id);
            for dep in dependencies(model, id)? {
                graph.add_dependency(id, dep);
            }
        }
        Ok(graph)
    }

    /// Sequence, mapping a cycle to `ModelError::GraphCycle` with canonical
    /// names.
    pub fn sequence_in(&self, model: &Model) -> Result<Vec<ElementId>> {
        self.sequence().map_err(|err| {
            let cycle = err
                .cycle
                .iter()
                .map(|id| model.canonical_name(*id).unwrap_or_else(|_| id.to_string()))
                .collect();
            ModelError::GraphCycle { cycle }
        })
    }
}

/// Update order of everything below context `ctx` (or of `ctx` itself when
/// it is a leaf).
pub fn sequence(model: &Model, ctx: ElementId) -> Result<Vec<ElementId>> {
    let scope = model.update_scope(ctx)?;
    DependencyGraph::extract(model, &scope)?.sequence_in(model)
}

/// The subset of `elements` with no dependencies: update entry points.
pub fn independent_elements(model: &Model, elements: &[ElementId]) -> Result<Vec<ElementId>> {
    let mut out = Vec::new();
    for &id in elements {
        if dependencies(model, id)?.is_empty() {
            out.push(id);
        }
    }
    Ok(out)
}
