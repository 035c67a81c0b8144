//! Whitespace tokenizer for selection queries.
//!
//! Tokens are separated by whitespace, except inside quotes or parentheses,
//! so `name=='two words'` and `RANGE(0, 0, 0, 5)` stay single tokens.

use crate::error::{ModelError, Result};

pub fn tokenize(query: &str) -> Result<Vec<String>> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut depth = 0usize;

    for c in query.chars() {
        if let Some(q) = quote {
            current.push(c);
            if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => {
                quote = Some(c);
                current.push(c);
            }
            '(' => {
                depth += 1;
                current.push(c);
            }
            ')' => {
                if depth == 0 {
                    return Err(ModelError::malformed(query, "unbalanced ')'"));
                }
                depth -= 1;
                current.push(c);
            }
            c if c.is_whitespace() && depth == 0 => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if quote.is_some() {
        return Err(ModelError::malformed(query, "unterminated string literal"));
    }
    if depth > 0 {
        return Err(ModelError::malformed(query, "unbalanced '('"));
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    Ok(tokens)
}
