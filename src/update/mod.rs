//! Update bindings, the method registry and the update executor.
//!
//! - [`binding`] – parameter name → literal or reference input
//! - [`method`] – element type → named update methods, one default
//! - [`executor`] – dependency-ordered update passes

pub mod binding;
pub mod executor;
pub mod method;

pub use binding::{InputSource, UpdateBinding};
pub use executor::{UpdateExecutor, UpdateFailure, UpdateReport};
pub use method::{MethodRegistry, TypeMethods, UpdateArgs, UpdateFn, UpdateMethod};
