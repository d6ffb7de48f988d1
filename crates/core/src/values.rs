//! Conversion of parsed source values into SQLite values.

use rusqlite::types::Value;
use serde_json::Value as Json;

/// Map a JSON value to an SQLite value. Arrays and objects are kept as
/// their JSON text.
pub fn json_value(value: Option<&Json>) -> Value {
    match value {
        None | Some(Json::Null) => Value::Null,
        Some(Json::String(s)) => Value::Text(s.clone()),
        Some(Json::Bool(b)) => Value::Integer(i64::from(*b)),
        Some(Json::Number(n)) => n
            .as_i64()
            .map(Value::Integer)
            .or_else(|| n.as_f64().map(Value::Real))
            .unwrap_or(Value::Null),
        Some(other @ (Json::Array(_) | Json::Object(_))) => Value::Text(other.to_string()),
    }
}

/// Member `key` of an object, if both exist.
pub fn member<'a>(value: Option<&'a Json>, key: &str) -> Option<&'a Json> {
    value?.as_object()?.get(key)
}

/// Follow a path of object keys.
pub fn path<'a>(value: &'a Json, keys: &[&str]) -> Option<&'a Json> {
    keys.iter().try_fold(value, |current, key| current.get(*key))
}

/// Element `index` of an array.
pub fn element(value: Option<&Json>, index: usize) -> Option<&Json> {
    value?.as_array()?.get(index)
}

/// Array elements, or nothing when the value is missing or not an array.
pub fn elements(value: Option<&Json>) -> &[Json] {
    value.and_then(Json::as_array).map_or(&[], Vec::as_slice)
}

/// Strings of an array joined with tabs; NULL when empty or missing.
pub fn tab_values(value: Option<&Json>) -> Value {
    let parts: Vec<&str> = elements(value).iter().filter_map(Json::as_str).collect();
    if parts.is_empty() {
        Value::Null
    } else {
        Value::Text(a3k_common::text::tab_join(parts))
    }
}

/// 0/1 by the JSON truthiness of the value; NULL when missing.
pub fn boolean_value(value: Option<&Json>) -> Value {
    match value {
        None => Value::Null,
        Some(v) => Value::Integer(i64::from(is_truthy(v))),
    }
}

fn is_truthy(value: &Json) -> bool {
    match value {
        Json::Null => false,
        Json::Bool(b) => *b,
        Json::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Json::String(s) => !s.is_empty(),
        Json::Array(a) => !a.is_empty(),
        Json::Object(o) => !o.is_empty(),
    }
}

/// Array length; NULL when missing.
pub fn len_value(value: Option<&Json>) -> Value {
    match value {
        Some(Json::Array(a)) => Value::Integer(a.len() as i64),
        Some(Json::Object(o)) => Value::Integer(o.len() as i64),
        Some(Json::String(s)) => Value::Integer(s.chars().count() as i64),
        _ => Value::Null,
    }
}

/// Lowercased string; NULL when missing or empty.
pub fn lower_value(value: Option<&Json>) -> Value {
    match value.and_then(Json::as_str) {
        Some(s) if !s.is_empty() => Value::Text(s.to_lowercase()),
        _ => Value::Null,
    }
}

/// Optional text as an SQLite value.
pub fn text<S: AsRef<str>>(value: Option<S>) -> Value {
    value.map_or(Value::Null, |s| Value::Text(s.as_ref().to_string()))
}

/// Lowercase a DOI, collapse a doubled space-separated DOI, drop other
/// spaces, and unescape common HTML entities.
pub fn normalized_doi(doi: &str) -> Option<String> {
    if doi.is_empty() {
        return None;
    }
    let mut normalized = doi.to_lowercase();
    if normalized.contains(' ') {
        let parts: Vec<&str> = normalized.split(' ').collect();
        normalized = if parts.len() == 2 && parts[0] == parts[1] {
            parts[0].to_string()
        } else {
            normalized.replace(' ', "")
        };
    }
    if !normalized.contains('&') {
        return Some(normalized);
    }
    Some(
        normalized
            .replace("&amp;", "&")
            .replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace("&ndash;", "-")
            .replace("&#x003c;", "<")
            .replace("&#x003e;", ">")
            .replace("&#60;", "<")
            .replace("&#62;", ">"),
    )
}
