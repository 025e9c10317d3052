//! `{{path.to.value}}` substitution for scenario step templates.
//!
//! Paths walk nested JSON objects key by key. A token whose path does not
//! resolve is left in place verbatim so a failing step shows what it was
//! waiting for.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde_json::{Map, Value};

/// Matches `{{ ... }}` tokens, lazily so adjacent tokens stay separate.
static TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{(.*?)\}\}").expect("valid regex"));

/// Resolve every token inside `template` against `context`.
///
/// Strings are substituted, objects and arrays are walked structurally, and
/// all other values are returned unchanged.
pub fn resolve_value(template: &Value, context: &Map<String, Value>) -> Value {
    match template {
        Value::String(s) => resolve_string(s, context),
        Value::Array(items) => Value::Array(items.iter().map(|v| resolve_value(v, context)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), resolve_value(v, context)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Resolve the tokens in a single string.
///
/// When the whole string is exactly one resolvable token, the referenced
/// value is returned as-is (an object stays an object). Otherwise the
/// result is a string with each resolved token rendered in place.
pub fn resolve_string(template: &str, context: &Map<String, Value>) -> Value {
    if let Some(caps) = TOKEN_RE.captures(template) {
        if let Some(whole) = caps.get(0) {
            if whole.start() == 0 && whole.end() == template.len() {
                if let Some(found) = lookup(context, &caps[1]) {
                    return found.clone();
                }
            }
        }
    }

    let rendered = TOKEN_RE.replace_all(template, |caps: &Captures| {
        match lookup(context, &caps[1]) {
            Some(value) => render(value),
            None => caps[0].to_string(),
        }
    });
    Value::String(rendered.into_owned())
}

/// Walk a dotted path through nested objects.
pub fn lookup<'a>(context: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut segments = path.trim().split('.');
    let first = segments.next().filter(|s| !s.is_empty())?;
    let mut current = context.get(first)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
