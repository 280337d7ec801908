// SPDX-License-Identifier: MIT

//! `{{name}}` parameter substitution inside recipe templates (spec.md §6).

use regex::Regex;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::LazyLock;

#[allow(clippy::expect_used)]
static VAR_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{([a-zA-Z_][a-zA-Z0-9_]*)\}\}").expect("constant regex pattern is valid"));

/// Replace every `{{name}}` occurrence in `template` with the stringified
/// value of `params[name]`. Unknown names are left untouched.
pub fn substitute(template: &str, params: &BTreeMap<String, Value>) -> String {
    VAR_PATTERN
        .replace_all(template, |caps: &regex::Captures| {
            let name = &caps[1];
            match params.get(name) {
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
                None => caps[0].to_string(),
            }
        })
        .to_string()
}

/// Recursively substitute `{{name}}` placeholders inside every string value
/// of a JSON tree, leaving other value kinds untouched. A string that is
/// *exactly* one `{{name}}` placeholder substitutes structurally — the
/// param's own type (number, bool, object, array) is preserved instead of
/// being stringified.
pub fn substitute_value(value: &Value, params: &BTreeMap<String, Value>) -> Value {
    match value {
        Value::String(s) => {
            if let Some(caps) = VAR_PATTERN.captures(s.as_str()) {
                if caps[0].len() == s.len() {
                    if let Some(v) = params.get(&caps[1]) {
                        return v.clone();
                    }
                }
            }
            Value::String(substitute(s, params))
        }
        Value::Array(items) => Value::Array(items.iter().map(|v| substitute_value(v, params)).collect()),
        Value::Object(map) => {
            Value::Object(map.iter().map(|(k, v)| (k.clone(), substitute_value(v, params))).collect())
        }
        other => other.clone(),
    }
}
