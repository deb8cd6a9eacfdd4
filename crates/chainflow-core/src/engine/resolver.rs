//! `{{ ... }}` variable resolution over node configs.
//!
//! A token is `{{nodeId.path.segments}}`. Lookup order:
//! 1. `results[nodeId]`, then the remaining segments
//! 2. the reserved roots `data`, `trigger`, `variables`
//! 3. a single-segment token as a run variable
//!
//! A string that is exactly one token is replaced by the referenced value
//! (type preserved). Embedded tokens are rendered as text. Anything that
//! does not resolve is left as written, which keeps `{{AI_FIELD:x}}`
//! placeholders intact for the chain executor.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde_json::{Map, Value};

use super::context::ExecutionContext;

static TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*([^{}]+?)\s*\}\}").expect("token pattern is valid"));

static WHOLE_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\{\{\s*([^{}]+?)\s*\}\}$").expect("token pattern is valid"));

/// Resolve every string in `config`, recursing into arrays and objects.
pub fn resolve_object(config: &Map<String, Value>, ctx: &ExecutionContext) -> Map<String, Value> {
    config
        .iter()
        .map(|(key, value)| (key.clone(), resolve_value(value, ctx)))
        .collect()
}

pub fn resolve_value(value: &Value, ctx: &ExecutionContext) -> Value {
    match value {
        Value::String(s) => resolve_string(s, ctx),
        Value::Array(items) => Value::Array(items.iter().map(|v| resolve_value(v, ctx)).collect()),
        Value::Object(map) => Value::Object(resolve_object(map, ctx)),
        other => other.clone(),
    }
}

fn resolve_string(s: &str, ctx: &ExecutionContext) -> Value {
    if !s.contains("{{") {
        return Value::String(s.to_string());
    }

    if let Some(caps) = WHOLE_TOKEN.captures(s) {
        if let Some(value) = resolve_variable_value(&caps[1], ctx) {
            return value;
        }
        return Value::String(s.to_string());
    }

    let rendered = TOKEN.replace_all(s, |caps: &Captures| match resolve_variable_value(&caps[1], ctx) {
        Some(value) => value_to_string(&value),
        None => caps[0].to_string(),
    });
    Value::String(rendered.into_owned())
}

/// Resolve a single reference (the text between the braces).
pub fn resolve_variable_value(reference: &str, ctx: &ExecutionContext) -> Option<Value> {
    let reference = reference.trim();
    let (head, rest) = match reference.split_once('.') {
        Some((head, rest)) => (head, Some(rest)),
        None => (reference, None),
    };

    if let Some(result) = ctx.results.get(head) {
        return lookup_optional(result, rest);
    }

    match head {
        "data" => return lookup_optional(&ctx.data, rest),
        "trigger" => return lookup_optional(&ctx.trigger_data, rest),
        "variables" => {
            let rest = rest?;
            let (name, tail) = match rest.split_once('.') {
                Some((name, tail)) => (name, Some(tail)),
                None => (rest, None),
            };
            return lookup_optional(ctx.variables.get(name)?, tail);
        }
        _ => {}
    }

    if rest.is_none() {
        return ctx.variables.get(head).cloned();
    }
    None
}

fn lookup_optional(root: &Value, path: Option<&str>) -> Option<Value> {
    match path {
        None => Some(root.clone()),
        Some(path) => lookup_path(root, path).cloned(),
    }
}

/// Follow a dotted path into a JSON document. Numeric segments index arrays.
pub fn lookup_path<'v>(root: &'v Value, path: &str) -> Option<&'v Value> {
    let path = path.trim();
    if path.is_empty() {
        return Some(root);
    }
    path.split('.').try_fold(root, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Render a JSON value as text: strings verbatim, everything else as compact JSON.
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
