//! Parametric modelling engine.
//!
//! This crate keeps a tree of named contexts and elements, orders elements by
//! the references in their update bindings, recomputes them upstream first,
//! filters them with a small SQL-like selection language and fires
//! behaviors on the results.
//!
//! The binary `paramodel` builds a demo model, updates it and prints the
//! report or a selection result as JSON.

pub mod behavior;
pub mod builtins;
pub mod config;
pub mod error;
pub mod event;
pub mod graph;
pub mod model;
pub mod selection;
pub mod session;
pub mod update;
pub mod value;

pub use behavior::{Behavior, BehaviorAction, BehaviorOperation};
pub use config::EngineConfig;
pub use error::{ModelError, Result};
pub use event::{EventBus, ModelEvent, SubscriptionId};
pub use model::{Capabilities, ContextKind, ElementId, ElementSpec, Model, Resolved};
pub use selection::{ElementSet, SelectionQuery, select};
pub use session::Session;
pub use update::{MethodRegistry, UpdateBinding, UpdateExecutor, UpdateReport};
pub use value::Value;
