//! Selection functions: `INSTANCEOF`, `NEAREST`, `RANGE`, `HALFSPACE`.

use serde::Serialize;

use super::ElementSet;
use crate::error::{ModelError, Result};
use crate::model::{Capabilities, Element, Model};
use crate::value::{Value, distance};

pub const FUNCTION_NAMES: [&str; 4] = ["INSTANCEOF", "NEAREST", "RANGE", "HALFSPACE"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Function {
    /// Element type, capability or context kind.
    InstanceOf(String),
    /// Closest element to a point.
    Nearest([f64; 3]),
    /// Elements within `radius` of `center`.
    Range { center: [f64; 3], radius: f64 },
    /// Elements with `normal · position >= offset`.
    HalfSpace { normal: [f64; 3], offset: f64 },
}

impl Function {
    /// Build a function from its name and raw argument text.
    pub fn parse(query: &str, name: &str, args: &str) -> Result<Function> {
        let parts: Vec<&str> = args
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        let numbers = || -> Result<Vec<f64>> {
            parts
                .iter()
                .map(|p| {
                    p.parse::<f64>().map_err(|_| {
                        ModelError::malformed(query, format!("{}: '{}' is not a number", name, p))
                    })
                })
                .collect()
        };
        let arity = |n: usize| -> Result<()> {
            if parts.len() == n {
                Ok(())
            } else {
                Err(ModelError::malformed(
                    query,
                    format!("{} expects {} arguments, got {}", name, n, parts.len()),
                ))
            }
        };
        match name {
            "INSTANCEOF" => {
                arity(1)?;
                let t = parts[0].trim_matches(|c| c == '\'' || c == '"');
                Ok(Function::InstanceOf(t.to_string()))
            }
            "NEAREST" => {
                arity(3)?;
                let n = numbers()?;
                Ok(Function::Nearest([n[0], n[1], n[2]]))
            }
            "RANGE" => {
                arity(4)?;
                let n = numbers()?;
                Ok(Function::Range {
                    center: [n[0], n[1], n[2]],
                    radius: n[3],
                })
            }
            "HALFSPACE" => {
                arity(4)?;
                let n = numbers()?;
                Ok(Function::HalfSpace {
                    normal: [n[0], n[1], n[2]],
                    offset: n[3],
                })
            }
            other => Err(ModelError::malformed(
                query,
                format!("unknown function '{}'", other),
            )),
        }
    }

    pub fn apply(&self, model: &Model, input: &ElementSet) -> Result<ElementSet> {
        let mut out = ElementSet::new();
        match self {
            Function::InstanceOf(t) => {
                for (name, &id) in input {
                    if is_instance_of(model.get(id)?, t) {
                        out.insert(name.clone(), id);
                    }
                }
            }
            Function::Range { center, radius } => {
                for (name, &id) in input {
                    if let Some(p) = position(model.get(id)?) {
                        if distance(p, *center) <= *radius {
                            out.insert(name.clone(), id);
                        }
                    }
                }
            }
            Function::HalfSpace { normal, offset } => {
                for (name, &id) in input {
                    if let Some(p) = position(model.get(id)?) {
                        let dot = normal[0] * p[0] + normal[1] * p[1] + normal[2] * p[2];
                        if dot >= *offset {
                            out.insert(name.clone(), id);
                        }
                    }
                }
            }
            Function::Nearest(target) => {
                let mut best: Option<(f64, &String)> = None;
                for (name, &id) in input {
                    if let Some(p) = position(model.get(id)?) {
                        let d = distance(p, *target);
                        if best.is_none_or(|(bd, _)| d < bd) {
                            best = Some((d, name));
                        }
                    }
                }
                if let Some((_, name)) = best {
                    if let Some(&id) = input.get(name) {
                        out.insert(name.clone(), id);
                    }
                }
            }
        }
        Ok(out)
    }
}

fn is_instance_of(el: &Element, t: &str) -> bool {
    if el.element_type() == t {
        return true;
    }
    if let Some(cap) = Capabilities::from_role(t) {
        return el.has(cap);
    }
    match el.context_kind() {
        Some(kind) => t == "Context" || t == kind.as_str(),
        None => false,
    }
}

/// `position` of an element, falling back to a coordinate system's `origin`.
fn position(el: &Element) -> Option<[f64; 3]> {
    el.get_property("position")
        .and_then(|v| v.as_point3())
        .or_else(|| el.get_property("origin").as_ref().and_then(Value::as_point3))
}
