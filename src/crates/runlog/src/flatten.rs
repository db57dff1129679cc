//! Flattening of nested JSON configs into `a/b/c` paths

use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::{Result, StoreError};
use crate::value::TypedValue;

/// Separator between path segments
pub const PATH_SEPARATOR: char = '/';

/// Flatten a JSON object into path/value pairs.
///
/// Nested objects extend the path with their keys and arrays with the
/// element index, so `{"model": {"layers": [1, 2]}}` becomes
/// `model/layers/0` and `model/layers/1`. Empty objects and arrays
/// contribute nothing. The top level must be an object.
pub fn flatten_json(value: &Value) -> Result<BTreeMap<String, TypedValue>> {
    let object = value
        .as_object()
        .ok_or_else(|| StoreError::invalid("config to flatten must be a JSON object"))?;

    let mut out = BTreeMap::new();
    for (key, child) in object {
        flatten_into(&normalize_path(key), child, &mut out);
    }
    Ok(out)
}

fn flatten_into(prefix: &str, value: &Value, out: &mut BTreeMap<String, TypedValue>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                flatten_into(&join(prefix, key), child, out);
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                flatten_into(&join(prefix, &index.to_string()), child, out);
            }
        }
        scalar => {
            if let Some(typed) = TypedValue::from_json_scalar(scalar) {
                out.insert(prefix.to_string(), typed);
            }
        }
    }
}

fn join(prefix: &str, key: &str) -> String {
    let key = normalize_path(key);
    if prefix.is_empty() {
        key
    } else {
        format!("{}{}{}", prefix, PATH_SEPARATOR, key)
    }
}

/// Strip leading and trailing separators from a config or metric path
pub fn normalize_path(path: &str) -> String {
    path.trim_matches(PATH_SEPARATOR).to_string()
}
