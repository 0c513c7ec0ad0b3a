//! Logic-less `{{path.to.value}}` substitution over JSON data.
//!
//! Only dotted lookups are supported (`tenant.contacts.[0].email` or
//! `tenant.contacts.0.email`); there are no sections, partials or helpers.

use lazy_static::lazy_static;
use regex::{Captures, Regex};
use serde_json::Value;

lazy_static! {
    static ref TOKEN: Regex = Regex::new(r"\{\{\{?\s*([A-Za-z0-9_.\[\]$@-]+)\s*\}?\}\}").unwrap();
}

/// Resolves a dotted path against `data`.
pub fn lookup<'a>(data: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = data;
    for segment in path.split('.').filter(|s| !s.is_empty()) {
        let segment = segment.trim_start_matches('[').trim_end_matches(']');
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Renders a scalar as text. Missing values, `null`, objects and arrays
/// render as an empty string.
pub fn to_text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

/// Replaces every `{{path}}` token of `template` with the text found in `data`.
pub fn render(template: &str, data: &Value) -> String {
    TOKEN
        .replace_all(template, |caps: &Captures| to_text(lookup(data, &caps[1])))
        .into_owned()
}
