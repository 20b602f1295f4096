//! Tagged-value traversal for record files.
//!
//! Records arrive either as JSON or as a nested-table (TOML) document; both
//! are folded into one `serde_json::Value` tree and read through the small
//! surface API below, so the record parsers never care which form was on
//! disk.

use crate::paths::to_portable_path;
use crate::types::{EnvOp, EnvValue};
use serde_json::Value;
use std::collections::BTreeMap;

/// Parse a record document. Content starting with `{` is JSON, anything
/// else is treated as TOML.
pub fn parse_document(content: &str) -> Result<Value, String> {
    if content.trim_start().starts_with('{') {
        serde_json::from_str(content).map_err(|e| format!("parse error: {}", e))
    } else {
        let table: toml::Value =
            toml::from_str(content).map_err(|e| format!("parse error: {}", e))?;
        Ok(toml_to_json(&table))
    }
}

/// Convert a TOML tree to JSON. Datetimes become their string rendering so
/// timestamp fields read uniformly from both forms.
pub fn toml_to_json(value: &toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::String(s.clone()),
        toml::Value::Integer(i) => Value::from(*i),
        toml::Value::Float(f) => {
            serde_json::Number::from_f64(*f).map(Value::Number).unwrap_or(Value::Null)
        }
        toml::Value::Boolean(b) => Value::Bool(*b),
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
        toml::Value::Array(items) => Value::Array(items.iter().map(toml_to_json).collect()),
        toml::Value::Table(table) => {
            let mut map = serde_json::Map::new();
            for (key, val) in table {
                map.insert(key.clone(), toml_to_json(val));
            }
            Value::Object(map)
        }
    }
}

pub fn get_object<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    let child = value.get(key)?;
    child.is_object().then_some(child)
}

pub fn get_string(value: &Value, key: &str) -> Option<String> {
    value.get(key)?.as_str().map(|s| s.to_string())
}

/// String rendering of a scalar field: strings pass through, booleans
/// become `"true"`/`"false"`. Used for opaque detail maps.
pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

pub fn get_string_array(value: &Value, key: &str) -> Vec<String> {
    match value.get(key) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_str().map(|s| s.to_string()))
            .collect(),
        _ => Vec::new(),
    }
}

/// Path-valued field, normalized to forward slashes but not re-rooted.
pub fn get_path(value: &Value, key: &str) -> Option<String> {
    get_string(value, key).map(|s| to_portable_path(&s))
}

pub fn get_path_array(value: &Value, key: &str) -> Vec<String> {
    get_string_array(value, key)
        .iter()
        .map(|s| to_portable_path(s))
        .collect()
}

/// Parse an environment contribution: a bare string is `Set`, an object
/// carries `op`, `value`, and an optional `separator` (default `:`).
pub fn get_env_value(value: &Value) -> Option<EnvValue> {
    match value {
        Value::String(s) => Some(EnvValue::set(s.clone())),
        Value::Object(map) => {
            let op = match map.get("op") {
                Some(Value::String(s)) => EnvOp::parse(s)?,
                None => EnvOp::Set,
                _ => return None,
            };
            let payload = match map.get("value") {
                Some(Value::String(s)) => s.clone(),
                _ => String::new(),
            };
            let separator = match map.get("separator") {
                Some(Value::String(s)) => s.clone(),
                _ => ":".to_string(),
            };
            Some(EnvValue::new(op, payload, separator))
        }
        _ => None,
    }
}

/// An `environment` table: key → contribution. Entries that parse to no
/// valid contribution are skipped.
pub fn get_env_map(value: &Value, key: &str) -> BTreeMap<String, EnvValue> {
    let mut map = BTreeMap::new();
    if let Some(Value::Object(table)) = value.get(key) {
        for (k, v) in table {
            if let Some(env_value) = get_env_value(v) {
                map.insert(k.clone(), env_value);
            }
        }
    }
    map
}

/// A table of string→string entries (capability mappings, NAK maps).
pub fn get_string_map(value: &Value, key: &str) -> BTreeMap<String, String> {
    let mut map = BTreeMap::new();
    if let Some(Value::Object(table)) = value.get(key) {
        for (k, v) in table {
            if let Some(s) = v.as_str() {
                map.insert(k.clone(), s.to_string());
            }
        }
    }
    map
}
