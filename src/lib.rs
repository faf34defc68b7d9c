//! Schema Form
//!
//! Turns a JSON Schema into an editable form model.
//!
//! The schema is normalized (references inlined, unions collapsed),
//! partitioned into nested property groups, and mapped to input types,
//! defaults and validation rules. A [`FormEngine`] owns the form data,
//! round-trips it between the nested JSON value and a flat map keyed by
//! dotted Field Keys, and emits the nested value after every user edit.
//!
//! # Example
//!
//! ```
//! use schema_form::{FormEngine, InputValueType};
//! use serde_json::json;
//!
//! let schema = json!({
//!     "type": "object",
//!     "required": ["name"],
//!     "properties": {
//!         "name": { "type": "string" },
//!         "address": {
//!             "type": "object",
//!             "properties": { "city": { "type": "string", "default": "Oslo" } }
//!         }
//!     }
//! });
//!
//! let mut form = FormEngine::new(schema);
//! assert_eq!(form.field_type("address.city"), Some(InputValueType::String));
//! assert!(form.is_required("name"));
//!
//! form.update_field("name", json!("Ada"), None).unwrap();
//! assert_eq!(
//!     form.json_data(),
//!     json!({ "name": "Ada", "address": { "city": "Oslo" } })
//! );
//! ```
//!
//! # Input Types
//!
//! | Schema | Input |
//! |--------|-------|
//! | `format: base64` | `base64_file` |
//! | `format: uri` with an `image/*` media type | `image` |
//! | `enum` | `string` |
//! | title `Properties` / `Json Schema` | `dict` |
//! | `string` / `number` / `integer` / `boolean` / `array` / `object` | same name (`object` is `dict`) |
//! | anything else | `string` |

mod codec;
mod engine;
mod error;
mod grouper;
mod linter;
mod loader;
mod mapper;
mod resolver;
mod rules;
mod types;
mod validator;

pub use codec::{get_nested, join_key, set_nested, to_flat, to_nested, FlatMap, KEY_SEPARATOR};
pub use engine::{FormData, FormEngine, FormViews, Phase};
pub use error::{FieldError, FormError, LoadError, RuleError, ValidateError};
pub use grouper::{
    field_keys, form_schema, group_properties, is_array_root, is_required, property_at,
    root_properties, top_level_groups, PropertyGroup, ROOT_GROUP_TITLE,
};
pub use linter::{
    lint, lint_file, lint_value, Diagnostic, FileResult, FileStatus, LintResult, Severity,
};
pub use loader::{is_external_ref, load_schema, load_schema_str, resolve_pointer};
pub use mapper::{
    classify, default_for, default_for_type, field_label, field_placeholder,
};
pub use resolver::{
    has_variant_choice, normalize, normalize_node, normalize_with, variant_options, VariantOption,
};
pub use rules::{rules_for, Rule, RuleKind, RuleSet, ValueKind};
pub use types::{
    json_type_name, InputValueType, NormalizeOptions, SchemaType, DEFAULT_MAX_DEPTH,
    FREEFORM_TITLES, UNION_KEYWORDS,
};
pub use validator::{rule_errors, validate, validate_against_schema};
