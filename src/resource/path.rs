//! Dot-path extraction over ARM payloads
//!
//! Paths look like `properties.networkProfile.networkInterfaces.*.id`.
//! A `*` segment fans out over an array; a numeric segment indexes into one.

use serde_json::Value;

/// Collect every value reached by `path`
pub fn extract_values<'a>(item: &'a Value, path: &str) -> Vec<&'a Value> {
    let mut current = vec![item];

    for part in path.split('.').filter(|p| !p.is_empty()) {
        let mut next = Vec::new();
        for value in current {
            if part == "*" {
                if let Some(arr) = value.as_array() {
                    next.extend(arr.iter());
                }
            } else if let Ok(idx) = part.parse::<usize>() {
                if let Some(v) = value.get(idx) {
                    next.push(v);
                }
            } else if let Some(v) = value.get(part) {
                next.push(v);
            }
        }
        current = next;
    }

    current.into_iter().filter(|v| !v.is_null()).collect()
}

/// Collect every non-empty string reached by `path`
pub fn extract_strings(item: &Value, path: &str) -> Vec<String> {
    extract_values(item, path)
        .into_iter()
        .filter_map(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

/// First string reached by `path`
pub fn extract_string(item: &Value, path: &str) -> Option<String> {
    extract_strings(item, path).into_iter().next()
}

/// Render a scalar for display or comparison
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
