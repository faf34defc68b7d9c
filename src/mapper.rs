//! Default values and input-type classification for resolved properties.

use serde_json::{Map, Value};

use crate::codec::KEY_SEPARATOR;
use crate::types::{InputValueType, SchemaType, FREEFORM_TITLES};

/// Derive the initial value for a resolved property.
///
/// An explicit `default` wins. Free-form fields from the schema-authoring
/// tool start as `null`. Otherwise the value depends on `type`.
pub fn default_for(property: &Value) -> Value {
    if let Some(default) = property.get("default") {
        return default.clone();
    }

    if is_freeform(property) {
        return Value::Null;
    }

    match SchemaType::of(property) {
        Some(schema_type) => default_for_type(&schema_type),
        None => Value::Null,
    }
}

/// Default value for a bare type, ignoring any schema metadata.
pub fn default_for_type(schema_type: &SchemaType) -> Value {
    match schema_type {
        numeric if numeric.is_numeric() => Value::Null,
        SchemaType::String => Value::String(String::new()),
        SchemaType::Boolean => Value::Bool(false),
        SchemaType::Array => Value::Array(Vec::new()),
        SchemaType::Object => Value::Object(Map::new()),
        _ => Value::Null,
    }
}

/// Classify a resolved property into the input widget it should use.
pub fn classify(property: &Value) -> InputValueType {
    match property.get("format").and_then(Value::as_str) {
        Some("base64") => return InputValueType::Base64File,
        Some("uri") if is_image_media(property) => return InputValueType::Image,
        _ => {}
    }

    // Enumerations render as a string-valued select.
    if property.get("enum").is_some() {
        return InputValueType::String;
    }

    if is_freeform(property) {
        return InputValueType::Dict;
    }

    let Some(schema_type) = SchemaType::of(property) else {
        return InputValueType::String;
    };

    match schema_type {
        SchemaType::String => InputValueType::String,
        SchemaType::Integer => InputValueType::Integer,
        SchemaType::Number | SchemaType::Float => InputValueType::Float,
        SchemaType::Boolean => InputValueType::Boolean,
        SchemaType::Array | SchemaType::List => InputValueType::List,
        SchemaType::Object | SchemaType::Dict => InputValueType::Dict,
        SchemaType::JsonSchema => InputValueType::JsonSchema,
        SchemaType::Struct => InputValueType::Struct,
        SchemaType::Base64File => InputValueType::Base64File,
        SchemaType::DoclingDocument => InputValueType::DoclingDocument,
        SchemaType::KnowledgeBase => InputValueType::KnowledgeBase,
        SchemaType::Tools => InputValueType::Tools,
        SchemaType::Tool => InputValueType::Tool,
        SchemaType::Workflow => InputValueType::Workflow,
        SchemaType::Null | SchemaType::Unknown(_) => InputValueType::String,
    }
}

/// Display label: `title`, else the last segment of the Field Key.
pub fn field_label(property: &Value, field_key: &str) -> String {
    if let Some(title) = property.get("title").and_then(Value::as_str) {
        return title.to_string();
    }
    field_key
        .rsplit(KEY_SEPARATOR)
        .next()
        .unwrap_or(field_key)
        .to_string()
}

/// Placeholder text: `description`, else a generic prompt.
pub fn field_placeholder(property: &Value, field_key: &str) -> String {
    match property.get("description").and_then(Value::as_str) {
        Some(description) => description.to_string(),
        None => format!("Enter {}", field_key),
    }
}

/// Fields the schema-authoring tool emits for hand-built sub-schemas.
///
/// `"Properties"` only counts when the node is an object (or untyped).
fn is_freeform(property: &Value) -> bool {
    let Some(title) = property.get("title").and_then(Value::as_str) else {
        return false;
    };
    match title {
        "Properties" => matches!(
            SchemaType::of(property),
            None | Some(SchemaType::Object)
        ),
        other => FREEFORM_TITLES.contains(&other),
    }
}

fn is_image_media(property: &Value) -> bool {
    property
        .get("contentMediaType")
        .and_then(Value::as_str)
        .map(|media| media.starts_with("image/"))
        .unwrap_or(false)
}
