//! Node input templates.
//!
//! A node's stored input document may contain placeholders inside string
//! values:
//!
//! - `{{context.<path>}}` reads from the run's immutable context;
//! - `{{nodes.<nodeId>.output.<path>}}` reads from a completed node's output.
//!
//! Each placeholder is parsed into an [`Expr`] and evaluated against a
//! [`Scope`] in one walk over the JSON tree.  A string that consists of a
//! single placeholder is replaced by the referenced value with its type
//! intact; placeholders embedded in longer strings are spliced in as text.
//! Unresolvable placeholders stay verbatim and are reported back so the
//! caller can warn; the capability's input schema catches anything required.

use std::collections::HashMap;

use serde_json::Value;

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

/// Where a placeholder reads from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Context,
    Node(String),
}

/// A parsed placeholder: a source plus a path into it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expr {
    pub source: Source,
    pub path: Vec<String>,
}

impl Expr {
    /// Parse the text between the braces. Returns `None` for anything that
    /// isn't a `context.` or `nodes.<id>.output` reference.
    pub fn parse(text: &str) -> Option<Self> {
        let mut segments = text.trim().split('.');
        let source = match segments.next()? {
            "context" => Source::Context,
            "nodes" => {
                let id = segments.next().filter(|s| !s.is_empty())?;
                if segments.next()? != "output" {
                    return None;
                }
                Source::Node(id.to_owned())
            }
            _ => return None,
        };

        let path: Vec<String> = segments.map(str::to_owned).collect();
        if path.iter().any(String::is_empty) {
            return None;
        }
        Some(Self { source, path })
    }
}

/// The two lookup tables a template is evaluated against.
#[derive(Debug, Clone, Copy)]
pub struct Scope<'a> {
    pub context: &'a Value,
    pub outputs: &'a HashMap<String, Value>,
}

impl<'a> Scope<'a> {
    pub fn lookup(&self, expr: &Expr) -> Option<&'a Value> {
        let root = match &expr.source {
            Source::Context => self.context,
            Source::Node(id) => self.outputs.get(id)?,
        };
        expr.path.iter().try_fold(root, |value, segment| match value {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
    }
}

/// Result of resolving a template.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub value: Value,
    /// Placeholders (as written, braces included) that could not be resolved.
    pub unresolved: Vec<String>,
}

/// Resolve every placeholder in `template`.
pub fn resolve(template: &Value, scope: &Scope<'_>) -> Resolution {
    let mut unresolved = Vec::new();
    let value = walk(template, scope, &mut unresolved);
    Resolution { value, unresolved }
}

fn walk(value: &Value, scope: &Scope<'_>, unresolved: &mut Vec<String>) -> Value {
    match value {
        Value::String(s) => resolve_string(s, scope, unresolved),
        Value::Array(items) => Value::Array(items.iter().map(|v| walk(v, scope, unresolved)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), walk(v, scope, unresolved)))
                .collect(),
        ),
        other => other.clone(),
    }
}

enum Part<'s> {
    Text(&'s str),
    Placeholder { raw: &'s str, expr: Option<Expr> },
}

fn split(s: &str) -> Vec<Part<'_>> {
    let mut parts = Vec::new();
    let mut rest = s;

    while let Some(start) = rest.find(OPEN) {
        let Some(len) = rest[start + OPEN.len()..].find(CLOSE) else {
            break;
        };
        let end = start + OPEN.len() + len + CLOSE.len();
        if start > 0 {
            parts.push(Part::Text(&rest[..start]));
        }
        let raw = &rest[start..end];
        let inner = &raw[OPEN.len()..raw.len() - CLOSE.len()];
        parts.push(Part::Placeholder { raw, expr: Expr::parse(inner) });
        rest = &rest[end..];
    }

    if !rest.is_empty() {
        parts.push(Part::Text(rest));
    }
    parts
}

fn resolve_string(s: &str, scope: &Scope<'_>, unresolved: &mut Vec<String>) -> Value {
    if !s.contains(OPEN) {
        return Value::String(s.to_owned());
    }

    let parts = split(s);

    // Whole-value placeholder: keep the referenced value's type.
    if let [Part::Placeholder { raw, expr: Some(expr) }] = parts.as_slice() {
        return match scope.lookup(expr) {
            Some(v) => v.clone(),
            None => {
                unresolved.push((*raw).to_owned());
                Value::String(s.to_owned())
            }
        };
    }

    let mut out = String::with_capacity(s.len());
    for part in &parts {
        match part {
            Part::Text(text) => out.push_str(text),
            Part::Placeholder { raw, expr: None } => out.push_str(raw),
            Part::Placeholder { raw, expr: Some(expr) } => match scope.lookup(expr) {
                Some(v) => out.push_str(&coerce(v)),
                None => {
                    unresolved.push((*raw).to_owned());
                    out.push_str(raw);
                }
            },
        }
    }
    Value::String(out)
}

/// String form of a value spliced into surrounding text.
fn coerce(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
