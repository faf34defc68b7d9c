//! Core types shared by normalization, mapping and rule synthesis.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Default recursion bound for schema normalization.
pub const DEFAULT_MAX_DEPTH: usize = 10;

/// Union keywords collapsed by the normalizer, in lookup order.
pub const UNION_KEYWORDS: &[&str] = &["anyOf", "oneOf", "allOf"];

/// Titles emitted by the schema-authoring tool for free-form object fields.
pub const FREEFORM_TITLES: &[&str] = &["Properties", "Json Schema"];

/// Returns the JSON type name for error messages.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Value of a schema node's `type` keyword.
///
/// Covers the JSON Schema primitive set plus the literal type names used by
/// the surrounding workflow tooling. Anything else lands in `Unknown`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SchemaType {
    Object,
    Array,
    String,
    Integer,
    Number,
    Boolean,
    Null,
    Float,
    List,
    Dict,
    Struct,
    JsonSchema,
    Base64File,
    DoclingDocument,
    KnowledgeBase,
    Tools,
    Tool,
    Workflow,
    Unknown(String),
}

impl SchemaType {
    /// Parse a `type` literal.
    pub fn parse(s: &str) -> Self {
        match s {
            "object" => SchemaType::Object,
            "array" => SchemaType::Array,
            "string" => SchemaType::String,
            "integer" => SchemaType::Integer,
            "number" => SchemaType::Number,
            "boolean" => SchemaType::Boolean,
            "null" => SchemaType::Null,
            "float" => SchemaType::Float,
            "list" => SchemaType::List,
            "dict" => SchemaType::Dict,
            "struct" => SchemaType::Struct,
            "json_schema" => SchemaType::JsonSchema,
            "base64_file" => SchemaType::Base64File,
            "docling_document" => SchemaType::DoclingDocument,
            "knowledge_base" => SchemaType::KnowledgeBase,
            "tools" => SchemaType::Tools,
            "tool" => SchemaType::Tool,
            "workflow" => SchemaType::Workflow,
            other => SchemaType::Unknown(other.to_string()),
        }
    }

    /// Read the `type` keyword of a schema node.
    ///
    /// Returns `None` when `type` is absent or not a string.
    pub fn of(node: &Value) -> Option<Self> {
        node.get("type").and_then(Value::as_str).map(Self::parse)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            SchemaType::Integer | SchemaType::Number | SchemaType::Float
        )
    }
}

/// Semantic input type handed to the field-rendering widgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputValueType {
    Float,
    Integer,
    List,
    Array,
    Dict,
    String,
    Boolean,
    JsonSchema,
    Image,
    Base64File,
    DoclingDocument,
    KnowledgeBase,
    Tools,
    Tool,
    Workflow,
    Struct,
}

impl InputValueType {
    /// Returns the wire literal for this input type.
    pub fn as_str(&self) -> &'static str {
        match self {
            InputValueType::Float => "float",
            InputValueType::Integer => "integer",
            InputValueType::List => "list",
            InputValueType::Array => "array",
            InputValueType::Dict => "dict",
            InputValueType::String => "string",
            InputValueType::Boolean => "boolean",
            InputValueType::JsonSchema => "json_schema",
            InputValueType::Image => "image",
            InputValueType::Base64File => "base64_file",
            InputValueType::DoclingDocument => "docling_document",
            InputValueType::KnowledgeBase => "knowledge_base",
            InputValueType::Tools => "tools",
            InputValueType::Tool => "tool",
            InputValueType::Workflow => "workflow",
            InputValueType::Struct => "struct",
        }
    }
}

/// Options for schema normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizeOptions {
    /// Recursion depth past which nodes are replaced by `{"type": "object"}`.
    pub max_depth: usize,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl NormalizeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the recursion depth bound.
    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}
