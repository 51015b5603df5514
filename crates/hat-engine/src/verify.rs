//! Response verification against a route's expected response.

use crate::error::TemplateError;
use crate::route::ResponseTemplate;
use crate::store::StateStore;
use serde_json::{Map, Value};

/// Serialize a JSON value with sorted keys and two-space indentation.
///
/// Two values with the same content always produce the same text, whatever
/// order their keys were written in.
pub fn canonical_json(value: &Value) -> String {
    let sorted = sort_keys(value);
    serde_json::to_string_pretty(&sorted).unwrap_or_else(|_| sorted.to_string())
}

/// Parse `text` as JSON and re-serialize it canonically.
pub fn canonicalize_text(text: &str) -> Option<String> {
    serde_json::from_str::<Value>(text)
        .ok()
        .map(|value| canonical_json(&value))
}

fn sort_keys(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let mut sorted = Map::new();
            for (key, item) in entries {
                sorted.insert(key.clone(), sort_keys(item));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(sort_keys).collect()),
        other => other.clone(),
    }
}

/// Compare an actual response with the expected template.
///
/// - status mismatch fails immediately
/// - no expected body means a status-only check
/// - structured and coerced bodies are substituted, then compared as
///   canonical JSON; an actual body that is not JSON is a mismatch
/// - scalar bodies compare as exact text
///
/// Only a template error in the expected body is reported as `Err`.
pub fn verify_response(
    actual_status: u16,
    actual_body: &str,
    expected: &ResponseTemplate,
    store: &StateStore,
) -> Result<bool, TemplateError> {
    if actual_status != expected.code {
        return Ok(false);
    }

    let Some(expected_body) = &expected.body else {
        return Ok(true);
    };

    if expected_body.is_structured() {
        let expected_value = expected_body.substitute(store)?;
        let Some(actual) = canonicalize_text(actual_body) else {
            return Ok(false);
        };
        Ok(canonical_json(&expected_value) == actual)
    } else {
        Ok(expected_body.literal_text() == actual_body)
    }
}
