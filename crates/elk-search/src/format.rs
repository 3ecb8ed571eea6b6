//! Rendering of hits through a display template.
//!
//! A template is free text with `%field.path` tokens, e.g.
//! `"%@timestamp [%host] %message"`. Each token is replaced by the value at
//! that dot path in the document source.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::trace;

/// Template token: `%` followed by a field path.
static TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"%[A-Za-z0-9@_.\-]+").unwrap_or_else(|_| unreachable!()));

/// A dot path did not resolve to a value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("no value at '{path}'")]
pub struct UnresolvedPath {
    /// Remaining path at the point resolution failed.
    pub path: String,
}

/// Tagged view over a JSON document.
#[derive(Debug, Clone, Copy)]
pub enum Node<'a> {
    /// An object with named children.
    Mapping(&'a Map<String, Value>),
    /// Any other value.
    Scalar(&'a Value),
}

impl<'a> From<&'a Value> for Node<'a> {
    fn from(value: &'a Value) -> Self {
        match value {
            Value::Object(map) => Self::Mapping(map),
            other => Self::Scalar(other),
        }
    }
}

impl Node<'_> {
    /// String form of the node.
    ///
    /// Strings are taken verbatim, numbers and booleans via their display
    /// form, objects and arrays as compact JSON.
    #[must_use]
    pub fn to_display_string(&self) -> String {
        match self {
            Self::Mapping(map) => Value::Object((*map).clone()).to_string(),
            Self::Scalar(Value::String(s)) => s.clone(),
            Self::Scalar(Value::Null) => String::new(),
            Self::Scalar(other) => other.to_string(),
        }
    }
}

/// Resolves a dot path against a node.
///
/// An empty path yields the node itself. Otherwise the head segment must name
/// a non-null child of a mapping.
pub fn evaluate_expression(node: Node<'_>, path: &str) -> Result<String, UnresolvedPath> {
    if path.is_empty() {
        return Ok(node.to_display_string());
    }

    let (head, rest) = path.split_once('.').unwrap_or((path, ""));
    match node {
        Node::Mapping(map) => match map.get(head) {
            Some(Value::Null) | None => Err(UnresolvedPath {
                path: path.to_string(),
            }),
            Some(child) => evaluate_expression(Node::from(child), rest),
        },
        Node::Scalar(_) => Err(UnresolvedPath {
            path: path.to_string(),
        }),
    }
}

/// A parsed display template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    format: String,
}

impl Template {
    /// Creates a template from its source text.
    #[must_use]
    pub fn new(format: impl Into<String>) -> Self {
        Self {
            format: format.into(),
        }
    }

    /// Template source text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.format
    }

    /// Field paths referenced by the template, in order of appearance.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        TOKEN
            .find_iter(&self.format)
            .map(|m| &m.as_str()[1..])
    }

    /// Renders a document. Unresolved tokens become empty strings.
    #[must_use]
    pub fn render(&self, source: &Value) -> String {
        let root = Node::from(source);
        TOKEN
            .replace_all(&self.format, |caps: &Captures<'_>| {
                let path = &caps[0][1..];
                evaluate_expression(root, path).unwrap_or_else(|err| {
                    trace!(path, error = %err, "template field did not resolve");
                    String::new()
                })
            })
            .into_owned()
    }

    /// Renders a document, returning `None` when the result is empty.
    #[must_use]
    pub fn render_line(&self, source: &Value) -> Option<String> {
        let line = self.render(source);
        if line.is_empty() { None } else { Some(line) }
    }
}
