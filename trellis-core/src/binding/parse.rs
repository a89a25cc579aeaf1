//! Declaration Parser
//!
//! Turns a bind-helper string into declarations:
//!
//! ```text
//! value: name, throttle: 300, checked: done
//! └─type └path └─ keyword ─┘  └─ next ────┘
//! ```
//!
//! # Grammar
//!
//! Segments are separated by top-level commas. A segment `key: rest` starts
//! a new declaration when `key` is a registered binding type (or when no
//! declaration has started yet); otherwise it is a keyword argument of the
//! current declaration. A segment without a colon is a positional argument.
//!
//! Argument literals are read as JSON first. Single-quoted text is a string.
//! Anything else is kept as a bare string.

use indexmap::IndexMap;
use serde_json::Value;
use smallvec::SmallVec;

use crate::error::{BindError, Result};

/// One `type: path, args...` declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub kind: String,
    pub path: String,
    /// Positional arguments after the path.
    pub args: SmallVec<[Value; 2]>,
    pub kwargs: IndexMap<String, Value>,
}

impl Declaration {
    fn new(kind: &str, path: &str) -> Self {
        Self {
            kind: kind.to_string(),
            path: path.to_string(),
            args: SmallVec::new(),
            kwargs: IndexMap::new(),
        }
    }
}

/// Parse a declaration string. `is_binding` decides whether a `key:` starts
/// a new declaration.
pub fn parse(input: &str, is_binding: impl Fn(&str) -> bool) -> Result<Vec<Declaration>> {
    if input.trim().is_empty() {
        return Err(BindError::declaration(input, "empty declaration"));
    }

    let mut declarations: Vec<Declaration> = Vec::new();
    for segment in split_top_level(input, ',')? {
        let segment = segment.trim();
        if segment.is_empty() {
            return Err(BindError::declaration(input, "empty segment"));
        }

        match split_key(segment) {
            Some((key, rest)) => {
                if !is_identifier(key) {
                    return Err(BindError::declaration(input, format!("bad name `{key}`")));
                }
                if declarations.is_empty() || is_binding(key) {
                    if !is_path(rest) {
                        return Err(BindError::declaration(
                            input,
                            format!("`{key}` needs a property path, got `{rest}`"),
                        ));
                    }
                    declarations.push(Declaration::new(key, rest));
                } else if let Some(current) = declarations.last_mut() {
                    current.kwargs.insert(key.to_string(), literal(rest));
                }
            }
            None => match declarations.last_mut() {
                Some(current) => current.args.push(literal(segment)),
                None => {
                    return Err(BindError::declaration(input, "expected `type: path`"));
                }
            },
        }
    }

    Ok(declarations)
}

/// Read an argument literal.
pub fn literal(text: &str) -> Value {
    let text = text.trim();
    if let Ok(value) = serde_json::from_str::<Value>(text) {
        return value;
    }
    if text.len() >= 2 && text.starts_with('\'') && text.ends_with('\'') {
        return Value::String(text[1..text.len() - 1].to_string());
    }
    Value::String(text.to_string())
}

fn is_identifier(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '-' || c == '$')
}

fn is_path(path: &str) -> bool {
    !path.is_empty()
        && !path.starts_with('.')
        && !path.ends_with('.')
        && path
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '$' || c == '.')
}

/// Split `key: rest` at the first top-level colon.
fn split_key(segment: &str) -> Option<(&str, &str)> {
    let index = top_level_positions(segment, ':').ok()?.into_iter().next()?;
    Some((segment[..index].trim(), segment[index + 1..].trim()))
}

fn split_top_level(input: &str, separator: char) -> Result<Vec<&str>> {
    let mut out = Vec::new();
    let mut start = 0;
    for index in top_level_positions(input, separator)? {
        out.push(&input[start..index]);
        start = index + separator.len_utf8();
    }
    out.push(&input[start..]);
    Ok(out)
}

/// Byte offsets of `separator` outside quotes and brackets.
fn top_level_positions(input: &str, separator: char) -> Result<Vec<usize>> {
    let mut positions = Vec::new();
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut depth: i32 = 0;

    for (index, c) in input.char_indices() {
        if let Some(open) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == open {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '[' | '{' | '(' => depth += 1,
            ']' | '}' | ')' => {
                depth -= 1;
                if depth < 0 {
                    return Err(BindError::declaration(input, "unbalanced brackets"));
                }
            }
            c if c == separator && depth == 0 => positions.push(index),
            _ => {}
        }
    }

    if quote.is_some() {
        return Err(BindError::declaration(input, "unterminated string"));
    }
    if depth != 0 {
        return Err(BindError::declaration(input, "unbalanced brackets"));
    }
    Ok(positions)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
