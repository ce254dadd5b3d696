//! Dictionary traversal for `{path}` lookups.

use serde_json::Value;

/// Look up a dot-separated path (e.g. `slots.severity`) in a JSON object
/// tree. Returns `None` on any missing leaf, so a missing leaf falls back
/// to whatever default the caller has on hand.
pub fn lookup<'a>(context: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = context;
    for segment in path.split('.') {
        if segment.is_empty() {
            return None;
        }
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Render a looked-up value as template text. Objects/arrays are not valid
/// leaves for variable substitution and are treated as missing.
pub fn as_display_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null => None,
        Value::Array(_) | Value::Object(_) => None,
    }
}

/// Render a looked-up value as an `f64` for arithmetic identifier lookups.
pub fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse::<f64>().ok(),
        _ => None,
    }
}
