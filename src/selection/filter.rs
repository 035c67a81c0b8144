//! Boolean filter trees.
//!
//! The tree is built strictly left to right: the first boolean operator joins
//! the first two conditions, every later operator joins the tree built so far
//! (left) with the next condition (right). There is no precedence and no
//! grouping. A `NOT` or `!` prefix binds to the single condition after it.

use serde::Serialize;
use std::fmt;

use super::ElementSet;
use super::functions::{FUNCTION_NAMES, Function};
use crate::error::{ModelError, Result};
use crate::model::Model;
use crate::value::{Value, parse_literal};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
}

impl CompareOp {
    pub fn as_str(self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Gt => ">",
            CompareOp::Lt => "<",
            CompareOp::Ge => ">=",
            CompareOp::Le => "<=",
        }
    }

    fn matches_at(text: &str) -> Option<CompareOp> {
        let two = [
            ("==", CompareOp::Eq),
            ("!=", CompareOp::Ne),
            (">=", CompareOp::Ge),
            ("<=", CompareOp::Le),
        ];
        for (s, op) in two {
            if text.starts_with(s) {
                return Some(op);
            }
        }
        if text.starts_with('>') {
            Some(CompareOp::Gt)
        } else if text.starts_with('<') {
            Some(CompareOp::Lt)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BoolOp {
    And,
    Or,
    Not,
    Xor,
}

impl BoolOp {
    pub fn from_token(token: &str) -> Option<BoolOp> {
        match token {
            "AND" => Some(BoolOp::And),
            "OR" => Some(BoolOp::Or),
            "NOT" | "!" => Some(BoolOp::Not),
            "XOR" => Some(BoolOp::Xor),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BoolOp::And => "AND",
            BoolOp::Or => "OR",
            BoolOp::Not => "NOT",
            BoolOp::Xor => "XOR",
        }
    }
}

/// `property op literal`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comparison {
    pub property: String,
    pub op: CompareOp,
    pub literal: Value,
}

impl Comparison {
    /// Test one property value. A numeric literal against a numeric value
    /// compares numerically; anything else, including every quoted or bare
    /// text literal, supports only `==` and `!=` on the text.
    pub fn test(&self, value: &Value) -> bool {
        let numeric = match &self.literal {
            Value::Text(_) => None,
            literal => value.as_number().zip(literal.as_number()),
        };
        if let Some((a, b)) = numeric {
            return match self.op {
                CompareOp::Eq => a == b,
                CompareOp::Ne => a != b,
                CompareOp::Gt => a > b,
                CompareOp::Lt => a < b,
                CompareOp::Ge => a >= b,
                CompareOp::Le => a <= b,
            };
        }
        let equal = value == &self.literal || value.to_string() == self.literal.to_string();
        match self.op {
            CompareOp::Eq => equal,
            CompareOp::Ne => !equal,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SelectionFilter {
    Comparison(Comparison),
    Function(Function),
    /// Unary `NOT`/`!` in front of a condition.
    Not(Box<SelectionFilter>),
    Boolean {
        op: BoolOp,
        left: Box<SelectionFilter>,
        right: Box<SelectionFilter>,
    },
}

enum Item {
    Condition(String),
    Operator(BoolOp),
}

impl SelectionFilter {
    /// Build the filter tree from the condition tokens between `WHERE` and the
    /// first post-processing directive.
    pub fn build(query: &str, tokens: &[String]) -> Result<SelectionFilter> {
        // Adjacent non-operator tokens form one condition, so `X > 3` reads
        // like `X>3`.
        let mut items: Vec<Item> = Vec::new();
        for token in tokens {
            if let Some(op) = BoolOp::from_token(token) {
                items.push(Item::Operator(op));
            } else if let Some(Item::Condition(text)) = items.last_mut() {
                text.push(' ');
                text.push_str(token);
            } else {
                items.push(Item::Condition(token.clone()));
            }
        }

        let mut iter = items.into_iter();
        let mut tree = match iter.next() {
            None => return Err(ModelError::malformed(query, "empty WHERE clause")),
            Some(Item::Operator(op)) if op != BoolOp::Not => {
                return Err(ModelError::malformed(
                    query,
                    format!("'{}' has no left operand", op.as_str()),
                ));
            }
            first => operand(query, first, &mut iter, "WHERE")?,
        };
        while let Some(item) = iter.next() {
            let op = match item {
                Item::Operator(op) => op,
                Item::Condition(text) => {
                    return Err(ModelError::malformed(
                        query,
                        format!("expected AND/OR before '{}'", text),
                    ));
                }
            };
            let next = iter.next();
            let right = operand(query, next, &mut iter, op.as_str())?;
            tree = SelectionFilter::Boolean {
                op,
                left: Box::new(tree),
                right: Box::new(right),
            };
        }
        Ok(tree)
    }

    /// Apply the filter to `input`, preserving input order.
    pub fn filter(&self, model: &Model, input: &ElementSet) -> Result<ElementSet> {
        match self {
            SelectionFilter::Comparison(cmp) => {
                let mut out = ElementSet::new();
                for (name, &id) in input {
                    let keep = match model.get(id)?.get_property(&cmp.property) {
                        Some(Value::Null) | None => false,
                        Some(value) => cmp.test(&value),
                    };
                    if keep {
                        out.insert(name.clone(), id);
                    }
                }
                Ok(out)
            }
            SelectionFilter::Function(f) => f.apply(model, input),
            SelectionFilter::Not(_) => Err(ModelError::UnsupportedSelection(
                "boolean operator NOT".to_string(),
            )),
            SelectionFilter::Boolean { op, left, right } => {
                if matches!(op, BoolOp::Not | BoolOp::Xor) {
                    return Err(ModelError::UnsupportedSelection(format!(
                        "boolean operator {}",
                        op.as_str()
                    )));
                }
                let l = left.filter(model, input)?;
                let r = right.filter(model, input)?;
                let keep = |name: &String| match op {
                    BoolOp::And => l.contains_key(name) && r.contains_key(name),
                    _ => l.contains_key(name) || r.contains_key(name),
                };
                Ok(input
                    .iter()
                    .filter(|(name, _)| keep(name))
                    .map(|(name, id)| (name.clone(), *id))
                    .collect())
            }
        }
    }
}

/// The operand following `after`: a condition, optionally behind unary
/// `NOT`/`!` prefixes.
fn operand(
    query: &str,
    item: Option<Item>,
    rest: &mut impl Iterator<Item = Item>,
    after: &str,
) -> Result<SelectionFilter> {
    match item {
        Some(Item::Condition(text)) => parse_condition(query, &text),
        Some(Item::Operator(BoolOp::Not)) => {
            let next = rest.next();
            let inner = operand(query, next, rest, BoolOp::Not.as_str())?;
            Ok(SelectionFilter::Not(Box::new(inner)))
        }
        _ => Err(ModelError::malformed(
            query,
            format!("'{}' has no right operand", after),
        )),
    }
}

/// A single condition: `NAME(args)` for a known function, otherwise
/// `identifier op literal`.
fn parse_condition(query: &str, text: &str) -> Result<SelectionFilter> {
    let text = text.trim();
    if let Some(open) = text.find('(') {
        let name = text[..open].trim();
        if FUNCTION_NAMES.contains(&name) {
            let Some(args) = text[open + 1..].strip_suffix(')') else {
                return Err(ModelError::malformed(
                    query,
                    format!("'{}' is missing ')'", text),
                ));
            };
            return Ok(SelectionFilter::Function(Function::parse(query, name, args)?));
        }
    }

    let mut in_quote: Option<char> = None;
    for (i, c) in text.char_indices() {
        if let Some(q) = in_quote {
            if c == q {
                in_quote = None;
            }
            continue;
        }
        if c == '\'' || c == '"' {
            in_quote = Some(c);
            continue;
        }
        let Some(op) = CompareOp::matches_at(&text[i..]) else {
            continue;
        };
        let property = text[..i].trim();
        let literal = text[i + op.as_str().len()..].trim();
        let valid_identifier = !property.is_empty()
            && property
                .chars()
                .all(|c| c.is_alphanumeric() || c == '_' || c == '.');
        if !valid_identifier {
            return Err(ModelError::malformed(
                query,
                format!("invalid property name in '{}'", text),
            ));
        }
        if literal.is_empty() {
            return Err(ModelError::malformed(
                query,
                format!("missing literal in '{}'", text),
            ));
        }
        let quoted = literal.len() >= 2
            && (literal.starts_with('\'') || literal.starts_with('"'))
            && literal.ends_with(&literal[..1]);
        if !quoted && literal.contains(char::is_whitespace) {
            return Err(ModelError::malformed(
                query,
                format!("unexpected text after literal in '{}'", text),
            ));
        }
        return Ok(SelectionFilter::Comparison(Comparison {
            property: property.to_string(),
            op,
            literal: parse_literal(literal),
        }));
    }
    Err(ModelError::malformed(
        query,
        format!("'{}' is neither a comparison nor a function", text),
    ))
}

impl fmt::Display for SelectionFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionFilter::Comparison(c) => {
                write!(f, "{}{}{}", c.property, c.op.as_str(), c.literal)
            }
            SelectionFilter::Function(func) => write!(f, "{:?}", func),
            SelectionFilter::Not(inner) => write!(f, "(NOT {})", inner),
            SelectionFilter::Boolean { op, left, right } => {
                write!(f, "({} {} {})", left, op.as_str(), right)
            }
        }
    }
}
