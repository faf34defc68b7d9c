//! Flatten/nest codec between nested JSON values and dot-keyed form data.
//!
//! Only object fields are flattened. Arrays and primitives are leaves at
//! their current path and are never descended into.

use serde_json::{Map, Value};

/// Flat form data: Field Key (dot path) to leaf value.
pub type FlatMap = Map<String, Value>;

/// Separator between Field Key segments. Property names must not contain it.
pub const KEY_SEPARATOR: char = '.';

/// Join a parent Field Key and a property name.
pub fn join_key(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}{}{}", prefix, KEY_SEPARATOR, key)
    }
}

/// Flatten a nested value into dot-keyed leaves.
///
/// Non-object input has no fields and yields an empty map. An empty nested
/// object is kept as a `{}` leaf so that `to_nested` restores it.
pub fn to_flat(nested: &Value) -> FlatMap {
    let mut flat = Map::new();
    if let Value::Object(map) = nested {
        flatten_into(map, "", &mut flat);
    }
    flat
}

/// Rebuild a nested object from dot-keyed leaves.
///
/// Intermediate objects are created as needed; a non-object value sitting on
/// an intermediate path is replaced by an object.
pub fn to_nested(flat: &FlatMap) -> Value {
    let mut nested = Value::Object(Map::new());
    for (key, value) in flat {
        set_nested(&mut nested, key, value.clone());
    }
    nested
}

/// Read the value at a Field Key inside a nested value.
pub fn get_nested<'a>(nested: &'a Value, field_key: &str) -> Option<&'a Value> {
    field_key
        .split(KEY_SEPARATOR)
        .try_fold(nested, |current, segment| current.as_object()?.get(segment))
}

/// Write `leaf` at a Field Key inside a nested value.
///
/// `nested` is turned into an object if it is not one already.
pub fn set_nested(nested: &mut Value, field_key: &str, leaf: Value) {
    let mut segments: Vec<&str> = field_key.split(KEY_SEPARATOR).collect();
    let Some(last) = segments.pop() else {
        return;
    };

    let mut current = nested;
    for segment in segments {
        current = ensure_object(current)
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    ensure_object(current).insert(last.to_string(), leaf);
}

fn flatten_into(map: &Map<String, Value>, prefix: &str, flat: &mut FlatMap) {
    for (key, value) in map {
        let field_key = join_key(prefix, key);
        match value {
            Value::Object(child) if !child.is_empty() => flatten_into(child, &field_key, flat),
            leaf => {
                flat.insert(field_key, leaf.clone());
            }
        }
    }
}

fn ensure_object(value: &mut Value) -> &mut Map<String, Value> {
    if !value.is_object() {
        *value = Value::Object(Map::new());
    }
    match value {
        Value::Object(map) => map,
        _ => unreachable!("value was just replaced with an object"),
    }
}
