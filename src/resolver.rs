//! Schema normalization - resolves `$ref` pointers and collapses unions.
//!
//! The output is a Resolved Schema Tree: structurally the same JSON Schema
//! shape, with every reachable `$ref` replaced by its target and every
//! `anyOf`/`oneOf`/`allOf` reduced to a single representative alternative.

use std::collections::HashSet;

use log::{debug, warn};
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::loader::resolve_pointer;
use crate::types::{NormalizeOptions, UNION_KEYWORDS};

/// Leaf constraints carried over when a union collapses.
const MERGED_CONSTRAINTS: &[&str] = &[
    "enum",
    "pattern",
    "minLength",
    "maxLength",
    "minimum",
    "maximum",
];

/// One selectable alternative of an `anyOf`/`oneOf` property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VariantOption {
    /// Display label: the alternative's `title`, else its `type`.
    pub label: String,
    /// Discriminant stored in the Selected Variant Map (the `type` literal).
    pub value: String,
}

/// Normalize a root schema with default options.
///
/// `$ref` pointers are resolved against `schema` itself.
pub fn normalize(schema: &Value) -> Value {
    normalize_with(schema, &NormalizeOptions::default())
}

/// Normalize a root schema with explicit options.
pub fn normalize_with(schema: &Value, options: &NormalizeOptions) -> Value {
    normalize_node(schema, schema, &HashSet::new(), 0, options)
}

/// Normalize one node of `root`.
///
/// `visited` holds the `$ref`s already expanded on the current recursion
/// path. It is never shared between siblings: each expansion works on its
/// own copy.
pub fn normalize_node(
    node: &Value,
    root: &Value,
    visited: &HashSet<String>,
    depth: usize,
    options: &NormalizeOptions,
) -> Value {
    if depth > options.max_depth {
        debug!("depth {} exceeds {}, truncating node", depth, options.max_depth);
        return json!({ "type": "object" });
    }

    let Some(map) = node.as_object() else {
        return node.clone();
    };

    if let Some(reference) = map.get("$ref").and_then(Value::as_str) {
        return normalize_ref(map, reference, root, visited, depth, options);
    }

    let type_name = map.get("type").and_then(Value::as_str);

    if type_name == Some("array") {
        if let Some(items) = map.get("items") {
            let mut result = map.clone();
            result.insert(
                "items".to_string(),
                normalize_node(items, root, visited, depth + 1, options),
            );
            return Value::Object(result);
        }
    }

    if type_name == Some("object") {
        if let Some(Value::Object(props)) = map.get("properties") {
            let mut resolved_props = Map::new();
            for (key, prop) in props {
                resolved_props.insert(
                    key.clone(),
                    normalize_property(prop, root, visited, depth, options),
                );
            }
            let mut result = map.clone();
            result.insert("properties".to_string(), Value::Object(resolved_props));
            return Value::Object(result);
        }
    }

    if let Some(alternatives) = union_alternatives(map) {
        if let Some(collapsed) = collapse_union(map, alternatives, root, visited, depth, options) {
            return collapsed;
        }
    }

    node.clone()
}

/// List the user-selectable alternatives of an `anyOf`/`oneOf` property.
///
/// Only alternatives with a non-null `type` are offered. Works on the raw
/// (un-normalized) property, since normalization discards the union.
pub fn variant_options(property: &Value) -> Vec<VariantOption> {
    let alternatives = property
        .get("anyOf")
        .or_else(|| property.get("oneOf"))
        .and_then(Value::as_array);

    let Some(alternatives) = alternatives else {
        return Vec::new();
    };

    alternatives
        .iter()
        .filter_map(|alt| {
            let type_name = alt.get("type").and_then(Value::as_str)?;
            if type_name == "null" {
                return None;
            }
            let label = alt
                .get("title")
                .and_then(Value::as_str)
                .unwrap_or(type_name);
            Some(VariantOption {
                label: label.to_string(),
                value: type_name.to_string(),
            })
        })
        .collect()
}

/// True when a property offers two or more non-null alternatives.
pub fn has_variant_choice(property: &Value) -> bool {
    variant_options(property).len() > 1
}

// --- Internal implementation ---

fn normalize_ref(
    map: &Map<String, Value>,
    reference: &str,
    root: &Value,
    visited: &HashSet<String>,
    depth: usize,
    options: &NormalizeOptions,
) -> Value {
    if visited.contains(reference) {
        debug!("breaking $ref cycle at {}", reference);
        return cycle_stand_in(resolve_pointer(root, reference));
    }

    match resolve_pointer(root, reference) {
        Some(target) => {
            let mut path = visited.clone();
            path.insert(reference.to_string());
            normalize_node(target, root, &path, depth + 1, options)
        }
        None => {
            warn!("unresolvable $ref {}, rendering as opaque object", reference);
            let mut result = map.clone();
            result.remove("$ref");
            result
                .entry("type")
                .or_insert_with(|| Value::String("object".to_string()));
            Value::Object(result)
        }
    }
}

/// Shallow `{type, title}` view of a cycle target.
fn cycle_stand_in(target: Option<&Value>) -> Value {
    let Some(type_value) = target.and_then(|t| t.get("type")) else {
        return json!({ "type": "object" });
    };

    let mut result = Map::new();
    result.insert("type".to_string(), type_value.clone());
    if let Some(title) = target.and_then(|t| t.get("title")) {
        result.insert("title".to_string(), title.clone());
    }
    Value::Object(result)
}

fn normalize_property(
    prop: &Value,
    root: &Value,
    visited: &HashSet<String>,
    depth: usize,
    options: &NormalizeOptions,
) -> Value {
    // Map-of-self schemas: keep the map shape, don't chase the value ref.
    let additional_is_ref = prop
        .get("additionalProperties")
        .and_then(|ap| ap.get("$ref"))
        .is_some();

    if additional_is_ref {
        if let Value::Object(map) = prop {
            let mut result = map.clone();
            result.insert(
                "additionalProperties".to_string(),
                json!({ "type": "object" }),
            );
            return Value::Object(result);
        }
    }

    normalize_node(prop, root, visited, depth + 1, options)
}

fn union_alternatives(map: &Map<String, Value>) -> Option<&Vec<Value>> {
    UNION_KEYWORDS
        .iter()
        .find_map(|key| map.get(*key))
        .and_then(Value::as_array)
}

/// Collapse a union to its first non-null alternative.
///
/// Returns `None` when every alternative is `null` typed (or there are none),
/// leaving the union keywords for the caller to treat as unrepresentable.
fn collapse_union(
    map: &Map<String, Value>,
    alternatives: &[Value],
    root: &Value,
    visited: &HashSet<String>,
    depth: usize,
    options: &NormalizeOptions,
) -> Option<Value> {
    let chosen = alternatives
        .iter()
        .find(|alt| alt.get("type").and_then(Value::as_str) != Some("null"))?;

    let is_simple = chosen.get("type").is_some()
        && chosen.get("$ref").is_none()
        && chosen.get("additionalProperties").is_none();

    let mut result = map.clone();

    if is_simple {
        if let Some(type_value) = chosen.get("type") {
            result.insert("type".to_string(), type_value.clone());
        }
        merge_constraints(&mut result, chosen);
    } else {
        let resolved = normalize_node(chosen, root, visited, depth + 1, options);
        if let Value::Object(resolved_map) = &resolved {
            for (key, value) in resolved_map {
                match key.as_str() {
                    // Parent metadata wins over the alternative's. A declared
                    // default counts even when it is null.
                    "title" if has_title(map) => {}
                    "default" if map.contains_key("default") => {}
                    _ => {
                        result.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        merge_constraints(&mut result, &resolved);
    }

    for key in UNION_KEYWORDS {
        result.remove(*key);
    }

    debug!(
        "collapsed union to {}",
        result.get("type").and_then(Value::as_str).unwrap_or("untyped")
    );
    Some(Value::Object(result))
}

fn has_title(map: &Map<String, Value>) -> bool {
    map.get("title")
        .and_then(Value::as_str)
        .is_some_and(|title| !title.is_empty())
}

/// Copy constraints present on `source` into `target`; absent ones keep the
/// target's value.
fn merge_constraints(target: &mut Map<String, Value>, source: &Value) {
    for key in MERGED_CONSTRAINTS {
        if let Some(value) = source.get(*key).filter(|v| !v.is_null()) {
            target.insert(key.to_string(), value.clone());
        }
    }
}
