//! Dynamic values carried by element state, update inputs and query literals.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordered property map of an element's computed state.
pub type Properties = IndexMap<String, Value>;

/// A dynamically typed value.
///
/// Serialized untagged so that JSON output reads naturally
/// (`1.5`, `"text"`, `[0.0, 1.0, 2.0]`, `{ "x": 1.0 }`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    Vector(Vec<f64>),
    Record(IndexMap<String, Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Numeric view of the value. Text is parsed so that string-typed
    /// properties such as `"5"` still compare numerically.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_vector(&self) -> Option<&[f64]> {
        match self {
            Value::Vector(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Value::Record(r) => Some(r),
            _ => None,
        }
    }

    /// Field access on a record value.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.as_record().and_then(|r| r.get(name))
    }

    /// Interpret a 3-vector, either a `Vector` of length 3 or a record with
    /// numeric `x`, `y` and `z` fields.
    pub fn as_point3(&self) -> Option<[f64; 3]> {
        match self {
            Value::Vector(v) if v.len() == 3 => Some([v[0], v[1], v[2]]),
            Value::Record(r) => {
                let x = r.get("x")?.as_number()?;
                let y = r.get("y")?.as_number()?;
                let z = r.get("z")?.as_number()?;
                Some([x, y, z])
            }
            _ => None,
        }
    }
}

/// Parse a query or binding literal.
///
/// Quoted text (single or double quotes) is unquoted, numbers and booleans
/// are recognised, anything else is kept as bare text.
pub fn parse_literal(token: &str) -> Value {
    let t = token.trim();
    if t.len() >= 2 {
        let bytes = t.as_bytes();
        let (first, last) = (bytes[0], bytes[t.len() - 1]);
        if (first == b'\'' || first == b'"') && first == last {
            return Value::Text(t[1..t.len() - 1].to_string());
        }
    }
    if let Ok(n) = t.parse::<f64>() {
        if n.is_finite() {
            return Value::Number(n);
        }
    }
    match t {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::Text(t.to_string()),
    }
}

/// Euclidean distance between two points.
pub fn distance(a: [f64; 3], b: [f64; 3]) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    let dz = a[2] - b[2];
    (dx * dx + dy * dy + dz * dz).sqrt()
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", n),
            Value::Text(s) => write!(f, "{}", s),
            Value::Vector(v) => {
                let parts: Vec<String> = v.iter().map(|x| x.to_string()).collect();
                write!(f, "[{}]", parts.join(", "))
            }
            Value::Record(r) => {
                let parts: Vec<String> = r.iter().map(|(k, v)| format!("{}: {}", k, v)).collect();
                write!(f, "{{{}}}", parts.join(", "))
            }
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<Vec<f64>> for Value {
    fn from(v: Vec<f64>) -> Self {
        Value::Vector(v)
    }
}

impl From<[f64; 3]> for Value {
    fn from(v: [f64; 3]) -> Self {
        Value::Vector(v.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_literal_kinds() {
        assert_eq!(parse_literal("'myAssembly4'"), Value::Text("myAssembly4".into()));
        assert_eq!(parse_literal("\"two words\""), Value::Text("two words".into()));
        assert_eq!(parse_literal("3"), Value::Number(3.0));
        assert_eq!(parse_literal("-2.5"), Value::Number(-2.5));
        assert_eq!(parse_literal("true"), Value::Bool(true));
        assert_eq!(parse_literal("Point"), Value::Text("Point".into()));
        assert_eq!(parse_literal("'"), Value::Text("'".into()));
    }

    #[test]
    fn test_text_is_numeric_when_parsable() {
        assert_eq!(Value::from("5").as_number(), Some(5.0));
        assert_eq!(Value::from("abc").as_number(), None);
        assert_eq!(Value::from("inf").as_number(), None);
        assert_eq!(Value::from("NaN").as_number(), None);
        assert_eq!(parse_literal("nan"), Value::Text("nan".into()));
        assert_eq!(parse_literal("infinity"), Value::Text("infinity".into()));
    }

    #[test]
    fn test_point3_from_vector_and_record() {
        assert_eq!(Value::from([1.0, 2.0, 3.0]).as_point3(), Some([1.0, 2.0, 3.0]));
        let mut r = IndexMap::new();
        r.insert("x".to_string(), Value::Number(1.0));
        r.insert("y".to_string(), Value::Number(0.0));
        r.insert("z".to_string(), Value::Number(-1.0));
        assert_eq!(Value::Record(r).as_point3(), Some([1.0, 0.0, -1.0]));
        assert_eq!(Value::from(vec![1.0]).as_point3(), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::from([1.0, 2.0, 3.0]).to_string(), "[1, 2, 3]");
        assert_eq!(Value::Null.to_string(), "null");
    }
}
