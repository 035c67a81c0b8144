//! Selection queries.
//!
//! ```text
//! SELECT <scope> WHERE <condition> [AND|OR <condition>]... [ORDEREDBY ...] [NEAR ...] [LIMIT n]
//! ```
//!
//! The scope is `*` (every element in the context), `path.*` (the children
//! of the context at `path`) or `path` (one element). Conditions are
//! comparisons (`X>3`, `name=='p1'`) or functions (`INSTANCEOF(Point)`,
//! `RANGE(0,0,0,5)`, `HALFSPACE(0,0,1,2)`, `NEAREST(1,1,0)`).

pub mod filter;
pub mod functions;
pub mod lexer;

pub use filter::{BoolOp, CompareOp, Comparison, SelectionFilter};
pub use functions::Function;

use indexmap::IndexMap;
use serde::Serialize;
use tracing::debug;

use crate::error::{ModelError, Result};
use crate::model::{ElementId, ElementPath, Model};

/// Name → element, in result order.
pub type ElementSet = IndexMap<String, ElementId>;

const DIRECTIVES: [&str; 3] = ["ORDEREDBY", "NEAR", "LIMIT"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Scope {
    /// `*`
    All,
    /// `path.*`
    Children(String),
    /// `path`
    Element(String),
}

impl Scope {
    fn parse(query: &str, token: &str) -> Result<Scope> {
        if token == "*" {
            return Ok(Scope::All);
        }
        let (path, children) = match token.strip_suffix(".*") {
            Some(path) => (path, true),
            None => (token, false),
        };
        ElementPath::parse(path).map_err(|_| {
            ModelError::malformed(query, format!("invalid scope '{}'", token))
        })?;
        Ok(if children {
            Scope::Children(path.to_string())
        } else {
            Scope::Element(path.to_string())
        })
    }
}

/// Post-processing directives. They are parsed but not evaluated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Directive {
    OrderedBy(Vec<String>),
    Near(Vec<String>),
    Limit(usize),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectionQuery {
    pub text: String,
    pub scope: Scope,
    pub filter: SelectionFilter,
    pub directives: Vec<Directive>,
}

impl SelectionQuery {
    pub fn parse(query: &str) -> Result<SelectionQuery> {
        let tokens = lexer::tokenize(query)?;
        if tokens.len() < 4 {
            return Err(ModelError::malformed(
                query,
                "expected SELECT <scope> WHERE <condition>",
            ));
        }
        if tokens[0] != "SELECT" {
            return Err(ModelError::malformed(query, "query must start with SELECT"));
        }
        if tokens[2] != "WHERE" {
            return Err(ModelError::malformed(query, "expected WHERE after the scope"));
        }
        let scope = Scope::parse(query, &tokens[1])?;

        let rest = &tokens[3..];
        let end = rest
            .iter()
            .position(|t| DIRECTIVES.contains(&t.as_str()))
            .unwrap_or(rest.len());
        let filter = SelectionFilter::build(query, &rest[..end])?;
        let directives = parse_directives(query, &rest[end..])?;

        Ok(SelectionQuery {
            text: query.to_string(),
            scope,
            filter,
            directives,
        })
    }

    /// Evaluate against the model, relative to context `ctx`.
    pub fn evaluate(&self, model: &Model, ctx: ElementId) -> Result<ElementSet> {
        if let Some(d) = self.directives.first() {
            return Err(ModelError::UnsupportedSelection(format!("{:?}", d)));
        }
        let input = self.scope_elements(model, ctx)?;
        let out = self.filter.filter(model, &input)?;
        debug!(query = %self.text, candidates = input.len(), selected = out.len(), "selection evaluated");
        Ok(out)
    }

    fn scope_elements(&self, model: &Model, ctx: ElementId) -> Result<ElementSet> {
        let children = |id: ElementId| -> Result<ElementSet> {
            Ok(model.element_map(id)?.to_map())
        };
        match &self.scope {
            Scope::All => children(ctx),
            Scope::Children(path) => {
                let id = model.lookup_element(ctx, path).map_err(|e| {
                    ModelError::malformed(&self.text, format!("scope: {}", e))
                })?;
                if !model.get(id)?.is_context() {
                    return Err(ModelError::malformed(
                        &self.text,
                        format!("scope '{}' is not a context", path),
                    ));
                }
                children(id)
            }
            Scope::Element(path) => {
                let id = model.lookup_element(ctx, path).map_err(|e| {
                    ModelError::malformed(&self.text, format!("scope: {}", e))
                })?;
                let mut set = ElementSet::new();
                set.insert(model.get(id)?.name().to_string(), id);
                Ok(set)
            }
        }
    }
}

fn parse_directives(query: &str, tokens: &[String]) -> Result<Vec<Directive>> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < tokens.len() {
        let keyword = tokens[i].as_str();
        let args_end = tokens[i + 1..]
            .iter()
            .position(|t| DIRECTIVES.contains(&t.as_str()))
            .map_or(tokens.len(), |p| i + 1 + p);
        let args: Vec<String> = tokens[i + 1..args_end].to_vec();
        if args.is_empty() {
            return Err(ModelError::malformed(
                query,
                format!("{} needs an argument", keyword),
            ));
        }
        out.push(match keyword {
            "ORDEREDBY" => Directive::OrderedBy(args),
            "NEAR" => Directive::Near(args),
            _ => {
                let n = args[0].parse::<usize>().map_err(|_| {
                    ModelError::malformed(query, format!("LIMIT '{}' is not a count", args[0]))
                })?;
                Directive::Limit(n)
            }
        });
        i = args_end;
    }
    Ok(out)
}

/// Parse and evaluate `query` in context `ctx`.
pub fn select(model: &Model, ctx: ElementId, query: &str) -> Result<ElementSet> {
    SelectionQuery::parse(query)?.evaluate(model, ctx)
}
