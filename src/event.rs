//! Change notifications and their synchronous dispatch.
//!
//! The [`Model`] queues a [`ModelEvent`] for every mutation. An [`EventBus`]
//! drains that queue and hands each event to every subscribed observer on the
//! calling thread. Observers get `&mut Model` and may mutate it; the events
//! they cause are delivered in the next round, up to a configured number of
//! rounds.

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{ModelError, Result};
use crate::model::Model;

/// A change notification. Element paths are canonical names.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ModelEvent {
    ElementAdded { path: String },
    ElementRenamed { old_path: String, new_path: String },
    ElementDeleted { path: String },
    PropertyChanged { path: String },
    ContextUpdated { path: String },
    ModelLoaded { name: String },
    ModelSaved { name: String },
    ModelClosed { name: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

pub type Observer = dyn FnMut(&ModelEvent, &mut Model);

/// Callback registry with synchronous, same-thread delivery.
#[derive(Default)]
pub struct EventBus {
    observers: Vec<(SubscriptionId, Box<Observer>)>,
    next_id: u64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&mut self, observer: F) -> SubscriptionId
    where
        F: FnMut(&ModelEvent, &mut Model) + 'static,
    {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.observers.push((id, Box::new(observer)));
        id
    }

    /// Remove an observer, returning true if it was subscribed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(sid, _)| *sid != id);
        self.observers.len() != before
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    /// Deliver every queued event of `model`, including events raised by
    /// observers while handling earlier ones. Returns the number of events
    /// delivered.
    ///
    /// Fails with [`ModelError::EventCascadeOverflow`] once `max_rounds`
    /// rounds have been delivered and the queue is still not empty; the
    /// remaining events are dropped.
    pub fn dispatch(&mut self, model: &mut Model, max_rounds: usize) -> Result<usize> {
        let mut delivered = 0;
        let mut rounds = 0;
        loop {
            let batch = model.take_events();
            if batch.is_empty() {
                return Ok(delivered);
            }
            if rounds == max_rounds {
                warn!(
                    dropped = batch.len(),
                    limit = max_rounds,
                    "event cascade limit reached"
                );
                return Err(ModelError::EventCascadeOverflow { limit: max_rounds });
            }
            rounds += 1;
            debug!(round = rounds, events = batch.len(), "dispatching events");
            for event in &batch {
                for (_, observer) in self.observers.iter_mut() {
                    observer(event, model);
                }
                delivered += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ContextKind;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_observers_receive_events_in_order() {
        let mut model = Model::new("m");
        let root = model.root();
        model.add_context(root, "a", ContextKind::Assembly).unwrap();
        model.add_context(root, "b", ContextKind::Assembly).unwrap();

        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let mut bus = EventBus::new();
        bus.subscribe(move |e, _| sink.borrow_mut().push(e.clone()));

        let n = bus.dispatch(&mut model, 8).unwrap();
        assert_eq!(n, 2);
        assert_eq!(
            *seen.borrow(),
            vec![
                ModelEvent::ElementAdded { path: "m.a".into() },
                ModelEvent::ElementAdded { path: "m.b".into() },
            ]
        );
    }

    #[test]
    fn test_unsubscribe() {
        let mut bus = EventBus::new();
        let id = bus.subscribe(|_, _| {});
        assert_eq!(bus.len(), 1);
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        assert!(bus.is_empty());
    }

    #[test]
    fn test_reentrant_mutation_is_delivered() {
        let mut model = Model::new("m");
        let root = model.root();
        model.add_context(root, "a", ContextKind::Assembly).unwrap();

        let count = Rc::new(RefCell::new(0));
        let c = count.clone();
        let mut bus = EventBus::new();
        bus.subscribe(move |e, m| {
            *c.borrow_mut() += 1;
            if let ModelEvent::ElementAdded { path } = e {
                if path == "m.a" {
                    let root = m.root();
                    m.add_context(root, "b", ContextKind::Assembly).unwrap();
                }
            }
        });
        assert_eq!(bus.dispatch(&mut model, 8).unwrap(), 2);
        assert_eq!(*count.borrow(), 2);
    }

    #[test]
    fn test_unbounded_cascade_is_cut_off() {
        let mut model = Model::new("m");
        let root = model.root();
        model.add_context(root, "a0", ContextKind::Group).unwrap();

        let mut bus = EventBus::new();
        let mut counter = 0;
        bus.subscribe(move |_, m| {
            counter += 1;
            let root = m.root();
            m.add_context(root, &format!("n{}", counter), ContextKind::Group)
                .unwrap();
        });
        let err = bus.dispatch(&mut model, 5).unwrap_err();
        assert_eq!(err, ModelError::EventCascadeOverflow { limit: 5 });
        assert!(model.take_events().is_empty());
    }
}
