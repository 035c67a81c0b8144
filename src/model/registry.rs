//! Per-context name registry.

use indexmap::IndexMap;
use serde::Serialize;

use super::element::ElementId;

/// How a registry entry relates to the element it names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Membership {
    /// The context owns the element (transactional).
    Owned,
    /// The element is owned elsewhere and reused here by reference.
    Contextual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryEntry {
    pub id: ElementId,
    pub membership: Membership,
}

/// Ordered mapping from unique name to element.
///
/// Insertion order is preserved across removals and renames: it breaks ties in
/// dependency sequencing and is the display order.
#[derive(Debug, Clone, Default)]
pub struct NamedRegistry {
    entries: IndexMap<String, RegistryEntry>,
}

impl NamedRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&RegistryEntry> {
        self.entries.get(name)
    }

    pub fn id(&self, name: &str) -> Option<ElementId> {
        self.entries.get(name).map(|e| e.id)
    }

    /// Insertion position of `name`.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.entries.get_index_of(name)
    }

    /// Name under which `id` is registered here.
    pub fn name_of(&self, id: ElementId) -> Option<&str> {
        self.entries
            .iter()
            .find(|(_, e)| e.id == id)
            .map(|(n, _)| n.as_str())
    }

    /// Register `name`. Returns false and leaves the registry untouched when
    /// the name is taken.
    pub(crate) fn insert(&mut self, name: &str, entry: RegistryEntry) -> bool {
        if self.entries.contains_key(name) {
            return false;
        }
        self.entries.insert(name.to_string(), entry);
        true
    }

    pub(crate) fn remove(&mut self, name: &str) -> Option<RegistryEntry> {
        self.entries.shift_remove(name)
    }

    /// Drop every entry pointing at `id`, returning the removed names.
    pub(crate) fn remove_id(&mut self, id: ElementId) -> Vec<String> {
        let names: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, e)| e.id == id)
            .map(|(n, _)| n.clone())
            .collect();
        for n in &names {
            self.entries.shift_remove(n);
        }
        names
    }

    /// Rename in place, keeping the entry's position. Returns false and leaves
    /// the registry untouched when `old` is absent or `new` is taken.
    pub(crate) fn rename(&mut self, old: &str, new: &str) -> bool {
        if old == new {
            return self.entries.contains_key(old);
        }
        if self.entries.contains_key(new) {
            return false;
        }
        let Some(index) = self.entries.get_index_of(old) else {
            return false;
        };
        let Some(entry) = self.entries.shift_remove(old) else {
            return false;
        };
        self.entries.shift_insert(index, new.to_string(), entry);
        true
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &RegistryEntry)> {
        self.entries.iter().map(|(n, e)| (n.as_str(), e))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(|n| n.as_str())
    }

    pub fn ids(&self) -> impl Iterator<Item = ElementId> + '_ {
        self.entries.values().map(|e| e.id)
    }

    /// Order-preserving name → id view.
    pub fn to_map(&self) -> IndexMap<String, ElementId> {
        self.entries
            .iter()
            .map(|(n, e)| (n.clone(), e.id))
            .collect()
    }

    pub fn with_membership(
        &self,
        membership: Membership,
    ) -> impl Iterator<Item = (&str, ElementId)> {
        self.entries
            .iter()
            .filter(move |(_, e)| e.membership == membership)
            .map(|(n, e)| (n.as_str(), e.id))
    }
}
