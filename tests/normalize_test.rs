//! Integration tests for schema normalization, grouping and rule synthesis.

use schema_form::{
    field_keys, group_properties, is_required, load_schema, normalize, normalize_with, rules_for,
    to_flat, to_nested, NormalizeOptions, DEFAULT_MAX_DEPTH,
};
use serde_json::{json, Value};

/// Nesting depth of a JSON value (scalars are 0).
fn depth(value: &Value) -> usize {
    match value {
        Value::Object(map) => 1 + map.values().map(depth).max().unwrap_or(0),
        Value::Array(arr) => 1 + arr.iter().map(depth).max().unwrap_or(0),
        _ => 0,
    }
}

fn contains_key(value: &Value, key: &str) -> bool {
    match value {
        Value::Object(map) => map.contains_key(key) || map.values().any(|v| contains_key(v, key)),
        Value::Array(arr) => arr.iter().any(|v| contains_key(v, key)),
        _ => false,
    }
}

// === Identity ===

mod identity {
    use super::*;

    #[test]
    fn plain_object_schema() {
        let schema = json!({
            "type": "object",
            "title": "Settings",
            "required": ["host"],
            "properties": {
                "host": { "type": "string", "minLength": 1 },
                "port": { "type": "integer", "minimum": 1, "maximum": 65535 },
                "tls": {
                    "type": "object",
                    "properties": { "enabled": { "type": "boolean", "default": true } }
                },
                "hosts": { "type": "array", "items": { "type": "string" } }
            }
        });
        assert_eq!(normalize(&schema), schema);
    }

    #[test]
    fn scalar_and_non_object_roots() {
        for schema in [json!({ "type": "string" }), json!(true), json!(null), json!([1, 2])] {
            assert_eq!(normalize(&schema), schema);
        }
    }
}

// === References ===

mod references {
    use super::*;

    #[test]
    fn nested_refs_are_inlined() {
        let schema = json!({
            "type": "object",
            "properties": {
                "billing": { "$ref": "#/$defs/Address" },
                "shipping": { "$ref": "#/$defs/Address" }
            },
            "$defs": {
                "Address": {
                    "type": "object",
                    "properties": { "country": { "$ref": "#/$defs/Country" } }
                },
                "Country": { "type": "string", "enum": ["NO", "SE"] }
            }
        });

        let resolved = normalize(&schema);
        let props = &resolved["properties"];
        assert_eq!(
            props["billing"]["properties"]["country"],
            json!({ "type": "string", "enum": ["NO", "SE"] })
        );
        // Siblings sharing a target are expanded independently
        assert_eq!(props["billing"], props["shipping"]);
        assert!(!contains_key(props, "$ref"));
    }

    #[test]
    fn self_reference_is_finite() {
        let schema = json!({
            "$defs": {
                "Category": {
                    "type": "object",
                    "title": "Category",
                    "properties": {
                        "name": { "type": "string" },
                        "parent": { "$ref": "#/$defs/Category" },
                        "children": { "type": "array", "items": { "$ref": "#/$defs/Category" } }
                    }
                }
            },
            "$ref": "#/$defs/Category"
        });

        let resolved = normalize(&schema);
        assert_eq!(
            resolved["properties"]["parent"],
            json!({ "type": "object", "title": "Category" })
        );
        assert_eq!(
            resolved["properties"]["children"]["items"],
            json!({ "type": "object", "title": "Category" })
        );
        assert!(!contains_key(&resolved, "$ref"));
    }

    #[test]
    fn mutual_recursion_is_finite() {
        let schema = json!({
            "$defs": {
                "Person": {
                    "type": "object",
                    "properties": { "employer": { "$ref": "#/$defs/Company" } }
                },
                "Company": {
                    "type": "object",
                    "properties": { "ceo": { "$ref": "#/$defs/Person" } }
                }
            },
            "$ref": "#/$defs/Person"
        });

        let resolved = normalize(&schema);
        let ceo = &resolved["properties"]["employer"]["properties"]["ceo"];
        assert_eq!(ceo, &json!({ "type": "object" }));
    }

    #[test]
    fn cycles_stay_within_depth_guard() {
        // Distinct refs at every level so only the depth guard stops descent.
        let mut defs = serde_json::Map::new();
        for i in 0..30 {
            defs.insert(
                format!("L{}", i),
                json!({
                    "type": "object",
                    "properties": { "next": { "$ref": format!("#/$defs/L{}", i + 1) } }
                }),
            );
        }
        defs.insert("L30".to_string(), json!({ "$ref": "#/$defs/L0" }));
        let schema = json!({ "$defs": defs, "$ref": "#/$defs/L0" });

        let resolved = normalize(&schema);
        // Each level adds "properties" and "next"; the guard bounds the chain.
        assert!(depth(&resolved) <= 2 * (DEFAULT_MAX_DEPTH + 2));

        let shallow = normalize_with(&schema, &NormalizeOptions::new().max_depth(2));
        assert!(depth(&shallow) < depth(&resolved));
    }

    #[test]
    fn unresolvable_ref_is_opaque() {
        let schema = json!({
            "type": "object",
            "properties": {
                "blob": { "$ref": "#/$defs/Nope", "title": "Blob" }
            }
        });

        let resolved = normalize(&schema);
        assert_eq!(
            resolved["properties"]["blob"],
            json!({ "title": "Blob", "type": "object" })
        );
        assert_eq!(group_properties(&resolved)[0].properties.len(), 1);
    }

    #[test]
    fn map_of_self_is_not_chased() {
        let schema = json!({
            "$defs": {
                "Tree": {
                    "type": "object",
                    "properties": {
                        "branches": {
                            "type": "object",
                            "additionalProperties": { "$ref": "#/$defs/Tree" }
                        }
                    }
                }
            },
            "$ref": "#/$defs/Tree"
        });

        let resolved = normalize(&schema);
        assert_eq!(
            resolved["properties"]["branches"]["additionalProperties"],
            json!({ "type": "object" })
        );
    }
}

// === Unions ===

mod unions {
    use super::*;

    #[test]
    fn null_alternative_is_discarded() {
        let schema = json!({ "anyOf": [{ "type": "null" }, { "type": "integer", "minimum": 0 }] });
        assert_eq!(normalize(&schema), json!({ "type": "integer", "minimum": 0 }));
    }

    #[test]
    fn first_non_null_alternative_wins() {
        let schema = json!({
            "oneOf": [{ "type": "string", "maxLength": 5 }, { "type": "number" }],
            "title": "Value"
        });
        assert_eq!(
            normalize(&schema),
            json!({ "title": "Value", "type": "string", "maxLength": 5 })
        );
    }

    #[test]
    fn ref_alternative_is_expanded() {
        let schema = json!({
            "type": "object",
            "properties": {
                "contact": {
                    "title": "Primary contact",
                    "anyOf": [{ "$ref": "#/$defs/Contact" }, { "type": "null" }]
                }
            },
            "$defs": {
                "Contact": {
                    "type": "object",
                    "title": "Contact",
                    "properties": { "email": { "type": "string" } }
                }
            }
        });

        let contact = &normalize(&schema)["properties"]["contact"];
        assert_eq!(contact["title"], "Primary contact");
        assert_eq!(contact["type"], "object");
        assert_eq!(contact["properties"]["email"], json!({ "type": "string" }));
        assert!(contact.get("anyOf").is_none());
    }

    #[test]
    fn all_of_collapses_like_any_of() {
        let schema = json!({ "allOf": [{ "type": "string", "pattern": "^x" }] });
        assert_eq!(normalize(&schema), json!({ "type": "string", "pattern": "^x" }));
    }

    #[test]
    fn no_node_keeps_both_ref_and_union() {
        let schema = load_schema(std::path::Path::new("tests/fixtures/profile.json")).unwrap();
        let resolved = normalize(&schema);
        for (_, prop) in resolved["properties"].as_object().unwrap() {
            let has_ref = prop.get("$ref").is_some();
            let has_union = ["anyOf", "oneOf", "allOf"]
                .iter()
                .any(|k| prop.get(*k).is_some());
            assert!(!(has_ref && has_union));
            assert!(!has_union);
        }
    }
}

// === Grouping and rules ===

mod grouping {
    use super::*;

    fn fixture() -> Value {
        normalize(&load_schema(std::path::Path::new("tests/fixtures/profile.json")).unwrap())
    }

    #[test]
    fn rule_keys_are_grouped_field_keys() {
        let resolved = fixture();
        let keys = field_keys(&group_properties(&resolved));
        let rules = rules_for(&resolved);

        assert!(!rules.fields.is_empty());
        for key in rules.fields.keys() {
            assert!(keys.contains(key), "{} has rules but no field", key);
        }
    }

    #[test]
    fn required_fields() {
        let schema = json!({
            "type": "object",
            "required": ["a"],
            "properties": { "a": { "type": "string" }, "b": { "type": "string" } }
        });
        assert!(is_required(&schema, "a"));
        assert!(!is_required(&schema, "b"));
    }

    #[test]
    fn required_is_not_inherited() {
        let resolved = fixture();
        assert!(is_required(&resolved, "address.city"));
        assert!(!is_required(&resolved, "address.street"));
        assert!(!is_required(&resolved, "age"));
    }

    #[test]
    fn grouped_keys_round_trip() {
        let value = json!({
            "name": "Ada",
            "email": "ada@example.com",
            "address": { "street": "Main St 1", "city": "Oslo" },
            "tags": ["a", "b"]
        });
        let flat = to_flat(&value);
        assert!(flat.contains_key("address.city"));
        assert_eq!(to_nested(&flat), value);
    }
}
