//! Flattening of nested JSON into underscore-joined attribute paths
//!
//! `{"geoData": {"location": {"city": "Austin"}}}` becomes
//! `geoData_location_city = Austin`; list elements use their numeric index as
//! a path segment (`disks_0_name`). Null and empty-string leaves are omitted
//! rather than stored as empty attributes.

use serde_json::Value;
use std::collections::BTreeMap;

/// Flatten an arbitrary JSON value under the given key prefix into a
/// single-level string map. An empty prefix flattens an object's own keys.
pub fn flatten_value(value: &Value, prefix: &str) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    flatten_into(value, prefix, &mut out);
    out
}

fn flatten_into(value: &Value, prefix: &str, out: &mut BTreeMap<String, String>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                flatten_into(child, &join(prefix, key), out);
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                flatten_into(child, &join(prefix, &index.to_string()), out);
            }
        }
        Value::Null => {}
        Value::String(s) => {
            if !s.is_empty() {
                out.insert(prefix.to_string(), s.clone());
            }
        }
        Value::Bool(b) => {
            out.insert(prefix.to_string(), b.to_string());
        }
        Value::Number(n) => {
            out.insert(prefix.to_string(), n.to_string());
        }
    }
}

fn join(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}_{key}")
    }
}
