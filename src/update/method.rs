//! Update-method registry: element type → named methods with declared
//! parameters, one of them the type's default.

use anyhow::{Context as _, anyhow};
use indexmap::IndexMap;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{ModelError, Result};
use crate::value::{Properties, Value};

/// Callable behind an update method. Returns the element's new state
/// entries; any error is recorded as a per-element failure.
pub type UpdateFn = dyn Fn(&UpdateArgs) -> anyhow::Result<Properties> + Send + Sync;

/// Resolved arguments, bound by parameter name.
#[derive(Debug, Clone)]
pub struct UpdateArgs {
    /// Canonical name of the element being updated.
    pub element: String,
    pub inputs: IndexMap<String, Value>,
}

impl UpdateArgs {
    pub fn get(&self, param: &str) -> anyhow::Result<&Value> {
        self.inputs
            .get(param)
            .ok_or_else(|| anyhow!("missing argument '{}'", param))
    }

    pub fn number(&self, param: &str) -> anyhow::Result<f64> {
        self.get(param)?
            .as_number()
            .with_context(|| format!("argument '{}' is not a number", param))
    }

    /// A point argument: a 3-vector, an `x/y/z` record, or an element
    /// snapshot exposing a `position` or `origin`.
    pub fn point(&self, param: &str) -> anyhow::Result<[f64; 3]> {
        let v = self.get(param)?;
        v.as_point3()
            .or_else(|| v.field("position").and_then(Value::as_point3))
            .or_else(|| v.field("origin").and_then(Value::as_point3))
            .with_context(|| format!("argument '{}' is not a point", param))
    }
}

#[derive(Clone)]
pub struct UpdateMethod {
    name: String,
    params: Vec<String>,
    func: Arc<UpdateFn>,
}

impl UpdateMethod {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared parameter names, in declaration order.
    pub fn params(&self) -> &[String] {
        &self.params
    }

    pub fn invoke(&self, args: &UpdateArgs) -> anyhow::Result<Properties> {
        (self.func)(args)
    }
}

impl fmt::Debug for UpdateMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateMethod")
            .field("name", &self.name)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

/// Methods of one element type.
#[derive(Debug, Clone, Default)]
pub struct TypeMethods {
    default: Option<String>,
    methods: IndexMap<String, UpdateMethod>,
}

impl TypeMethods {
    pub fn default_method(&self) -> Option<&UpdateMethod> {
        self.default.as_deref().and_then(|d| self.methods.get(d))
    }

    pub fn get(&self, name: &str) -> Option<&UpdateMethod> {
        self.methods.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.methods.keys().map(|k| k.as_str())
    }
}

#[derive(Debug, Clone, Default)]
pub struct MethodRegistry {
    types: HashMap<String, TypeMethods>,
}

impl MethodRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a method and make it the type's default.
    pub fn register_default<F>(&mut self, element_type: &str, name: &str, params: &[&str], func: F)
    where
        F: Fn(&UpdateArgs) -> anyhow::Result<Properties> + Send + Sync + 'static,
    {
        self.register(element_type, name, params, func);
        if let Some(t) = self.types.get_mut(element_type) {
            t.default = Some(name.to_string());
        }
    }

    /// Register a method addressable by name. Replaces an existing method of
    /// the same name.
    pub fn register<F>(&mut self, element_type: &str, name: &str, params: &[&str], func: F)
    where
        F: Fn(&UpdateArgs) -> anyhow::Result<Properties> + Send + Sync + 'static,
    {
        let method = UpdateMethod {
            name: name.to_string(),
            params: params.iter().map(|p| p.to_string()).collect(),
            func: Arc::new(func),
        };
        self.types
            .entry(element_type.to_string())
            .or_default()
            .methods
            .insert(name.to_string(), method);
    }

    pub fn methods_for(&self, element_type: &str) -> Option<&TypeMethods> {
        self.types.get(element_type)
    }

    /// The method named `selected`, or the type's default when `None`.
    pub fn resolve(&self, element_type: &str, selected: Option<&str>) -> Result<&UpdateMethod> {
        let unknown = || ModelError::UnknownUpdateMethod {
            element_type: element_type.to_string(),
            method: selected.unwrap_or("<default>").to_string(),
        };
        let methods = self.types.get(element_type).ok_or_else(unknown)?;
        match selected {
            Some(name) => methods.get(name).ok_or_else(unknown),
            None => methods.default_method().ok_or_else(unknown),
        }
    }
}
