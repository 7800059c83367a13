//! `{name}` placeholder substitution.
//!
//! Substitution is a single left-to-right pass over the template: each
//! `{name}` whose `name` is a parameter key is replaced by the value, anything
//! else is copied verbatim. Substituted text is never rescanned, so values
//! cannot expand into further placeholders.

use actiongate_core::Parameters;
use serde_json::Value;

use crate::ExecutionError;

/// Replace every `{key}` in `template` for keys present in `params`.
#[must_use]
pub fn substitute(template: &str, params: &Parameters) -> String {
    if params.is_empty() {
        return template.to_string();
    }

    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let matched = after
            .find('}')
            .and_then(|close| params.get(&after[..close]).map(|value| (close, value)));

        match matched {
            Some((close, value)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Substitute into each top-level string value of a JSON object.
///
/// Nested values and non-objects are left alone.
pub fn substitute_top_level(data: &mut Value, params: &Parameters) {
    if let Value::Object(map) = data {
        for value in map.values_mut() {
            if let Value::String(s) = value {
                *s = substitute(s, params);
            }
        }
    }
}

/// Substitute into every string leaf of a JSON value, at any depth.
///
/// Object keys and non-string scalars are never touched, so the result is
/// always well-formed JSON whatever the parameter values contain.
#[must_use]
pub fn substitute_leaves(value: &Value, params: &Parameters) -> Value {
    match value {
        Value::String(s) => Value::String(substitute(s, params)),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| substitute_leaves(item, params))
                .collect(),
        ),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), substitute_leaves(v, params)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Substitute into the serialized text of a JSON value and parse it back.
///
/// Placeholders anywhere in the text are replaced, including positions that
/// are not strings. Values are inserted raw, so a value containing quotes can
/// yield invalid JSON; that is reported as a malformed config.
///
/// # Errors
/// Returns `MalformedConfig` if the substituted text is not valid JSON.
pub fn substitute_raw_json(value: &Value, params: &Parameters) -> Result<Value, ExecutionError> {
    let text = value.to_string();
    let substituted = substitute(&text, params);
    serde_json::from_str(&substituted).map_err(|e| {
        ExecutionError::MalformedConfig(format!("payload is not valid JSON after substitution: {e}"))
    })
}
