//! Property grouping - partitions a resolved schema into UI sections.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::codec::{join_key, KEY_SEPARATOR};

/// Title of the level-0 group holding root scalar properties.
pub const ROOT_GROUP_TITLE: &str = "Root";

/// One section of the form.
///
/// `properties` holds only the leaves that belong directly to this group,
/// keyed by full Field Key. Nested object properties become `children`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertyGroup {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub level: usize,
    pub path: String,
    pub properties: Map<String, Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<PropertyGroup>,
}

impl PropertyGroup {
    fn new(title: String, description: Option<String>, level: usize, path: String) -> Self {
        Self {
            title,
            description,
            level,
            path,
            properties: Map::new(),
            children: Vec::new(),
        }
    }

    /// This group followed by all descendants, parents before children.
    pub fn pre_order(&self) -> Vec<&PropertyGroup> {
        let mut result = vec![self];
        for child in &self.children {
            result.extend(child.pre_order());
        }
        result
    }
}

/// The object schema whose properties drive the form.
///
/// For an array root this is `items`. Returns `None` if there is nothing
/// with `properties` to render.
pub fn form_schema(resolved: &Value) -> Option<&Value> {
    let target = if is_array_root(resolved) {
        resolved.get("items")?
    } else {
        resolved
    };
    target.get("properties")?.as_object()?;
    Some(target)
}

/// True when the resolved root describes an array of items.
pub fn is_array_root(resolved: &Value) -> bool {
    resolved.get("type").and_then(Value::as_str) == Some("array")
}

/// Build the group tree and return it flattened in pre-order.
///
/// The first entry is the level-0 root group. Returns an empty vector for an
/// unresolvable root or a root without properties.
pub fn group_properties(resolved: &Value) -> Vec<PropertyGroup> {
    let Some(root) = build_tree(resolved) else {
        return Vec::new();
    };
    flatten_tree(root)
}

/// Level-1 groups only: one per nested object directly under the root,
/// each still carrying its own children.
pub fn top_level_groups(groups: &[PropertyGroup]) -> Vec<PropertyGroup> {
    groups.iter().filter(|g| g.level == 1).cloned().collect()
}

/// Root scalar properties: the level-0 group's leaves.
pub fn root_properties(groups: &[PropertyGroup]) -> Map<String, Value> {
    groups
        .iter()
        .find(|g| g.level == 0)
        .map(|g| g.properties.clone())
        .unwrap_or_default()
}

/// Every leaf Field Key across all groups, in pre-order.
pub fn field_keys(groups: &[PropertyGroup]) -> Vec<String> {
    groups
        .iter()
        .flat_map(|g| g.properties.keys().cloned())
        .collect()
}

/// Look up the resolved property addressed by a Field Key.
pub fn property_at<'a>(resolved: &'a Value, field_key: &str) -> Option<&'a Value> {
    let mut current = form_schema(resolved)?;
    for segment in field_key.split(KEY_SEPARATOR) {
        current = current.get("properties")?.get(segment)?;
    }
    Some(current)
}

/// True when the field is listed in its immediately enclosing `required`.
///
/// Required-ness is never inherited: a required parent object does not make
/// its children required.
pub fn is_required(resolved: &Value, field_key: &str) -> bool {
    let Some(mut parent) = form_schema(resolved) else {
        return false;
    };

    let segments: Vec<&str> = field_key.split(KEY_SEPARATOR).collect();
    let Some((last, ancestors)) = segments.split_last() else {
        return false;
    };

    for segment in ancestors {
        match parent.get("properties").and_then(|p| p.get(*segment)) {
            Some(next) => parent = next,
            None => return false,
        }
    }

    required_contains(parent, last)
}

pub(crate) fn required_contains(schema: &Value, key: &str) -> bool {
    schema
        .get("required")
        .and_then(Value::as_array)
        .map(|required| required.iter().any(|r| r.as_str() == Some(key)))
        .unwrap_or(false)
}

/// True for properties rendered as their own group.
pub(crate) fn is_nested_group(property: &Value) -> bool {
    property.get("type").and_then(Value::as_str) == Some("object")
        && property
            .get("properties")
            .and_then(Value::as_object)
            .map(|props| !props.is_empty())
            .unwrap_or(false)
}

// --- Internal implementation ---

fn build_tree(resolved: &Value) -> Option<PropertyGroup> {
    let schema = form_schema(resolved)?;
    let properties = schema.get("properties")?.as_object()?;

    let mut root = PropertyGroup::new(ROOT_GROUP_TITLE.to_string(), None, 0, String::new());
    partition(properties, &mut root, "", 0);
    Some(root)
}

fn partition(properties: &Map<String, Value>, group: &mut PropertyGroup, prefix: &str, level: usize) {
    for (key, property) in properties {
        let field_key = join_key(prefix, key);

        if is_nested_group(property) {
            let title = property
                .get("title")
                .and_then(Value::as_str)
                .unwrap_or(key)
                .to_string();
            let description = property
                .get("description")
                .and_then(Value::as_str)
                .map(String::from);

            let mut child = PropertyGroup::new(title, description, level + 1, field_key.clone());
            if let Some(nested) = property.get("properties").and_then(Value::as_object) {
                partition(nested, &mut child, &field_key, level + 1);
            }
            group.children.push(child);
        } else {
            group.properties.insert(field_key, property.clone());
        }
    }
}

fn flatten_tree(root: PropertyGroup) -> Vec<PropertyGroup> {
    root.pre_order().into_iter().cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn profile_schema() -> Value {
        json!({
            "type": "object",
            "required": ["name", "address"],
            "properties": {
                "name": { "type": "string" },
                "age": { "type": "integer" },
                "address": {
                    "type": "object",
                    "title": "Address",
                    "description": "Postal address",
                    "required": ["city"],
                    "properties": {
                        "city": { "type": "string" },
                        "zip": { "type": "string" },
                        "geo": {
                            "type": "object",
                            "properties": {
                                "lat": { "type": "number" },
                                "lng": { "type": "number" }
                            }
                        }
                    }
                },
                "extra": { "type": "object" }
            }
        })
    }

    #[test]
    fn groups_in_pre_order() {
        let groups = group_properties(&profile_schema());

        let summary: Vec<(&str, usize, &str)> = groups
            .iter()
            .map(|g| (g.title.as_str(), g.level, g.path.as_str()))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("Root", 0, ""),
                ("Address", 1, "address"),
                ("geo", 2, "address.geo"),
            ]
        );
    }

    #[test]
    fn leaves_stay_in_their_group() {
        let groups = group_properties(&profile_schema());

        let root_keys: Vec<&String> = groups[0].properties.keys().collect();
        assert_eq!(root_keys, vec!["name", "age", "extra"]);

        let address_keys: Vec<&String> = groups[1].properties.keys().collect();
        assert_eq!(address_keys, vec!["address.city", "address.zip"]);

        assert!(groups[2].properties.contains_key("address.geo.lat"));
        assert_eq!(groups[1].description.as_deref(), Some("Postal address"));
    }

    #[test]
    fn empty_object_is_opaque_leaf() {
        let schema = json!({
            "type": "object",
            "properties": { "meta": { "type": "object", "properties": {} } }
        });
        let groups = group_properties(&schema);
        assert_eq!(groups.len(), 1);
        assert!(groups[0].properties.contains_key("meta"));
    }

    #[test]
    fn array_root_uses_items() {
        let schema = json!({
            "type": "array",
            "items": {
                "type": "object",
                "properties": { "name": { "type": "string" } }
            }
        });
        let groups = group_properties(&schema);
        assert_eq!(groups.len(), 1);
        assert!(groups[0].properties.contains_key("name"));
    }

    #[test]
    fn no_properties_yields_nothing() {
        assert!(group_properties(&json!({ "type": "string" })).is_empty());
        assert!(group_properties(&json!({ "type": "array" })).is_empty());
        assert!(group_properties(&Value::Null).is_empty());
    }

    #[test]
    fn projections() {
        let groups = group_properties(&profile_schema());

        let top = top_level_groups(&groups);
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].path, "address");
        assert_eq!(top[0].children.len(), 1);

        let root = root_properties(&groups);
        assert_eq!(root.keys().collect::<Vec<_>>(), vec!["name", "age", "extra"]);

        assert_eq!(
            field_keys(&groups),
            vec![
                "name",
                "age",
                "extra",
                "address.city",
                "address.zip",
                "address.geo.lat",
                "address.geo.lng"
            ]
        );
    }

    #[test]
    fn required_is_scoped_to_parent() {
        let schema = profile_schema();
        assert!(is_required(&schema, "name"));
        assert!(!is_required(&schema, "age"));
        assert!(is_required(&schema, "address.city"));
        assert!(!is_required(&schema, "address.zip"));
        // "address" is required, but that does not propagate
        assert!(!is_required(&schema, "address.geo.lat"));
        assert!(!is_required(&schema, "missing.key"));
    }

    #[test]
    fn required_on_array_items() {
        let schema = json!({
            "type": "array",
            "items": {
                "type": "object",
                "required": ["name"],
                "properties": { "name": { "type": "string" }, "note": { "type": "string" } }
            }
        });
        assert!(is_required(&schema, "name"));
        assert!(!is_required(&schema, "note"));
    }

    #[test]
    fn property_lookup_by_key() {
        let schema = profile_schema();
        assert_eq!(
            property_at(&schema, "address.geo.lat"),
            Some(&json!({ "type": "number" }))
        );
        assert!(property_at(&schema, "address.nope").is_none());
    }
}
