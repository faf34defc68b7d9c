//! Form engine - owns form data and keeps it in sync with the schema.
//!
//! The engine holds the only mutable state: the flat (or per-item) form
//! data and the selected union variants. Everything else is a derived view
//! rebuilt from the schema whenever it changes.
//!
//! Emission is synchronous. A user edit produces exactly one emitted value;
//! initialization from a new schema or external value produces none.

use std::collections::BTreeMap;
use std::fmt;

use log::debug;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::codec::{set_nested, to_flat, to_nested, FlatMap, KEY_SEPARATOR};
use crate::error::{FieldError, FormError, RuleError};
use crate::grouper::{
    field_keys, group_properties, is_array_root, property_at, root_properties,
    top_level_groups, PropertyGroup,
};
use crate::loader::resolve_pointer;
use crate::mapper::{classify, default_for, default_for_type, field_label, field_placeholder};
use crate::resolver::{normalize_with, variant_options, VariantOption};
use crate::rules::{rules_for, RuleSet};
use crate::types::{json_type_name, InputValueType, NormalizeOptions, SchemaType, UNION_KEYWORDS};
use crate::validator::rule_errors;

/// Engine state. Edits are only accepted while `Idle`.
///
/// Every edit takes `&mut self` and listeners cannot reach the engine, so
/// callers only ever observe `Idle`. The phase is reset even if a listener
/// panics; `FormError::Busy` is reported only if that invariant breaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Idle,
    Initializing,
    Emitting,
}

/// The engine's working state.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FormData {
    /// Array-rooted schema: one nested object per item, never flattened.
    Items(Vec<Value>),
    /// Object-rooted schema: Field Key to leaf value.
    Flat(FlatMap),
}

impl FormData {
    /// The nested value this form data represents.
    pub fn to_json(&self) -> Value {
        match self {
            FormData::Items(items) => Value::Array(items.clone()),
            FormData::Flat(flat) => to_nested(flat),
        }
    }
}

/// Read-only views derived from the current schema.
#[derive(Debug, Clone, Serialize)]
pub struct FormViews {
    pub resolved: Value,
    pub groups: Vec<PropertyGroup>,
    pub top_level_groups: Vec<PropertyGroup>,
    pub root_properties: Map<String, Value>,
    pub rules: RuleSet,
}

impl FormViews {
    /// Derive every view from a root schema.
    pub fn build(schema: &Value, options: &NormalizeOptions) -> Self {
        let resolved = normalize_with(schema, options);
        let groups = group_properties(&resolved);
        let rules = rules_for(&resolved);
        for error in &rules.errors {
            debug!("rule not built: {}", error);
        }
        Self {
            top_level_groups: top_level_groups(&groups),
            root_properties: root_properties(&groups),
            resolved,
            groups,
            rules,
        }
    }

    pub fn is_array_root(&self) -> bool {
        is_array_root(&self.resolved)
    }

    pub fn rule_errors(&self) -> &[RuleError] {
        &self.rules.errors
    }
}

type Listener = Box<dyn FnMut(&Value)>;

/// Schema-driven form state with change emission.
pub struct FormEngine {
    schema: Value,
    options: NormalizeOptions,
    views: FormViews,
    data: FormData,
    selected_variants: BTreeMap<String, String>,
    phase: Phase,
    listeners: Vec<Listener>,
}

impl fmt::Debug for FormEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormEngine")
            .field("phase", &self.phase)
            .field("data", &self.data)
            .field("selected_variants", &self.selected_variants)
            .field("listeners", &self.listeners.len())
            .finish_non_exhaustive()
    }
}

impl FormEngine {
    /// Mount a form for `schema` with no initial value.
    pub fn new(schema: Value) -> Self {
        Self::with_options(schema, None, NormalizeOptions::default())
    }

    /// Mount a form with an initial value and explicit options.
    pub fn with_options(schema: Value, value: Option<&Value>, options: NormalizeOptions) -> Self {
        let views = FormViews::build(&schema, &options);
        let mut engine = Self {
            schema,
            options,
            views,
            data: FormData::Flat(FlatMap::new()),
            selected_variants: BTreeMap::new(),
            phase: Phase::Idle,
            listeners: Vec::new(),
        };
        engine.initialize(value);
        engine
    }

    /// Register a callback receiving every emitted nested value.
    pub fn subscribe(&mut self, listener: impl FnMut(&Value) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn schema(&self) -> &Value {
        &self.schema
    }

    pub fn views(&self) -> &FormViews {
        &self.views
    }

    pub fn data(&self) -> &FormData {
        &self.data
    }

    pub fn is_array_root(&self) -> bool {
        self.views.is_array_root()
    }

    // --- Programmatic changes (never emit) ---

    /// Replace the schema and rebuild form data from `value`.
    pub fn set_schema(&mut self, schema: Value, value: Option<&Value>) {
        self.views = FormViews::build(&schema, &self.options);
        self.schema = schema;
        self.selected_variants.clear();
        self.initialize(value);
    }

    /// Replace form data from a value supplied by the owner.
    pub fn set_value(&mut self, value: &Value) {
        self.initialize(Some(value));
    }

    // --- User edits (emit once each) ---

    /// Set one field. `item_index` selects the item for array roots
    /// (defaults to the first).
    pub fn update_field(
        &mut self,
        field_key: &str,
        value: Value,
        item_index: Option<usize>,
    ) -> Result<(), FormError> {
        self.ensure_idle()?;
        self.write_field(field_key, value, item_index)?;
        self.emit(None);
        Ok(())
    }

    /// Append a default item. Returns the new item count.
    pub fn add_item(&mut self) -> Result<usize, FormError> {
        self.ensure_idle()?;
        let item = self.default_item();
        let FormData::Items(items) = &mut self.data else {
            return Err(FormError::NotArrayRoot);
        };
        items.push(item);
        let len = items.len();
        self.emit(None);
        Ok(len)
    }

    /// Remove and return the item at `index`.
    pub fn remove_item(&mut self, index: usize) -> Result<Value, FormError> {
        self.ensure_idle()?;
        let FormData::Items(items) = &mut self.data else {
            return Err(FormError::NotArrayRoot);
        };
        if index >= items.len() {
            return Err(FormError::ItemOutOfRange {
                index,
                len: items.len(),
            });
        }
        let removed = items.remove(index);
        self.emit(None);
        Ok(removed)
    }

    /// Replace form data with a value typed in the raw JSON editor.
    ///
    /// The value is emitted exactly as given rather than re-nested from the
    /// flat form data.
    pub fn apply_json(&mut self, value: Value) -> Result<(), FormError> {
        self.ensure_idle()?;
        self.data = match (&value, self.is_array_root()) {
            (Value::Array(items), true) => FormData::Items(items.clone()),
            (Value::Object(_), false) => FormData::Flat(to_flat(&value)),
            (other, true) => {
                return Err(FormError::InvalidJson {
                    message: format!("expected an array, got {}", json_type_name(other)),
                })
            }
            (other, false) => {
                return Err(FormError::InvalidJson {
                    message: format!("expected an object, got {}", json_type_name(other)),
                })
            }
        };
        self.emit(Some(value));
        Ok(())
    }

    /// Parse raw editor text and apply it. Form data is untouched on error.
    pub fn apply_json_text(&mut self, text: &str) -> Result<(), FormError> {
        let value: Value = serde_json::from_str(text).map_err(|e| FormError::InvalidJson {
            message: e.to_string(),
        })?;
        self.apply_json(value)
    }

    /// Choose a union alternative for a field and reset its value.
    pub fn select_variant(
        &mut self,
        field_key: &str,
        discriminant: &str,
        item_index: Option<usize>,
    ) -> Result<(), FormError> {
        self.ensure_idle()?;
        let reset = default_for_type(&SchemaType::parse(discriminant));
        self.write_field(field_key, reset, item_index)?;
        self.selected_variants
            .insert(field_key.to_string(), discriminant.to_string());
        self.emit(None);
        Ok(())
    }

    // --- Derived views ---

    /// Nested JSON for the raw editor.
    pub fn json_data(&self) -> Value {
        self.data.to_json()
    }

    /// Pretty-printed nested JSON.
    pub fn json_text(&self) -> String {
        format!("{:#}", self.json_data())
    }

    /// Resolved property for a Field Key.
    pub fn property(&self, field_key: &str) -> Option<&Value> {
        property_at(&self.views.resolved, field_key)
    }

    pub fn field_type(&self, field_key: &str) -> Option<InputValueType> {
        self.property(field_key).map(classify)
    }

    pub fn field_default(&self, field_key: &str) -> Option<Value> {
        self.property(field_key).map(default_for)
    }

    pub fn field_label(&self, field_key: &str) -> String {
        let property = self.property(field_key).cloned().unwrap_or(Value::Null);
        field_label(&property, field_key)
    }

    pub fn field_placeholder(&self, field_key: &str) -> String {
        let property = self.property(field_key).cloned().unwrap_or(Value::Null);
        field_placeholder(&property, field_key)
    }

    pub fn is_required(&self, field_key: &str) -> bool {
        crate::grouper::is_required(&self.views.resolved, field_key)
    }

    /// Selectable alternatives for a union field.
    pub fn variant_options(&self, field_key: &str) -> Vec<VariantOption> {
        raw_property_at(&self.schema, field_key, self.options.max_depth)
            .map(variant_options)
            .unwrap_or_default()
    }

    pub fn has_variant_choice(&self, field_key: &str) -> bool {
        self.variant_options(field_key).len() > 1
    }

    /// The chosen discriminant, else the first non-null alternative, else
    /// the resolved type.
    pub fn selected_variant(&self, field_key: &str) -> String {
        if let Some(selected) = self.selected_variants.get(field_key) {
            return selected.clone();
        }
        if let Some(first) = self.variant_options(field_key).into_iter().next() {
            return first.value;
        }
        self.property(field_key)
            .and_then(|p| p.get("type"))
            .and_then(Value::as_str)
            .unwrap_or("string")
            .to_string()
    }

    /// Check current form data against the field rules.
    pub fn validate(&self) -> Vec<FieldError> {
        rule_errors(&self.views.rules, self.is_array_root(), &self.json_data())
    }

    // --- Internal implementation ---

    fn ensure_idle(&self) -> Result<(), FormError> {
        match self.phase {
            Phase::Idle => Ok(()),
            phase => Err(FormError::Busy { phase }),
        }
    }

    fn initialize(&mut self, value: Option<&Value>) {
        if self.phase != Phase::Idle {
            debug!("initialize skipped while {:?}", self.phase);
            return;
        }
        self.phase = Phase::Initializing;

        self.data = if self.is_array_root() {
            FormData::Items(self.initial_items(value))
        } else {
            FormData::Flat(self.initial_flat(value))
        };
        debug!("initialized form data: {}", self.data.to_json());

        self.phase = Phase::Idle;
    }

    fn initial_items(&self, value: Option<&Value>) -> Vec<Value> {
        match value {
            Some(Value::Array(items)) => items.clone(),
            Some(Value::Object(map)) if !map.is_empty() => vec![Value::Object(map.clone())],
            _ => vec![self.default_item()],
        }
    }

    fn initial_flat(&self, value: Option<&Value>) -> FlatMap {
        let incoming = value
            .filter(|v| v.is_object())
            .map(to_flat)
            .unwrap_or_default();

        let mut data = FlatMap::new();
        for group in &self.views.groups {
            for (field_key, property) in &group.properties {
                let initial = incoming
                    .get(field_key)
                    .cloned()
                    .unwrap_or_else(|| default_for(property));
                data.insert(field_key.clone(), initial);
            }
        }
        data
    }

    /// One array item populated with the item schema's property defaults.
    fn default_item(&self) -> Value {
        let mut item = Map::new();
        let properties = self
            .views
            .resolved
            .get("items")
            .and_then(|items| items.get("properties"))
            .and_then(Value::as_object);
        if let Some(properties) = properties {
            for (key, property) in properties {
                item.insert(key.clone(), default_for(property));
            }
        }
        Value::Object(item)
    }

    fn write_field(
        &mut self,
        field_key: &str,
        value: Value,
        item_index: Option<usize>,
    ) -> Result<(), FormError> {
        match &mut self.data {
            FormData::Items(items) => {
                let index = item_index.unwrap_or(0);
                let len = items.len();
                let item = items
                    .get_mut(index)
                    .ok_or(FormError::ItemOutOfRange { index, len })?;
                set_nested(item, field_key, value);
            }
            FormData::Flat(flat) => {
                let known = flat.contains_key(field_key)
                    || field_keys(&self.views.groups).iter().any(|k| k == field_key);
                if !known {
                    return Err(FormError::UnknownField {
                        field: field_key.to_string(),
                    });
                }
                flat.insert(field_key.to_string(), value);
            }
        }
        Ok(())
    }

    /// Deliver a value to every listener. `raw` overrides the re-nested data.
    fn emit(&mut self, raw: Option<Value>) {
        let value = raw.unwrap_or_else(|| self.data.to_json());
        debug!("emitting {}", value);

        self.phase = Phase::Emitting;
        let _idle = ResetPhase(&mut self.phase);
        for listener in &mut self.listeners {
            listener(&value);
        }
    }
}

/// Returns the engine to `Idle` when dropped, including during unwinding.
struct ResetPhase<'a>(&'a mut Phase);

impl Drop for ResetPhase<'_> {
    fn drop(&mut self) {
        *self.0 = Phase::Idle;
    }
}

/// Find the un-normalized property addressed by a Field Key.
///
/// Follows `$ref`s and first non-null union alternatives along the path the
/// way normalization does, so union keywords on the target survive.
fn raw_property_at<'a>(schema: &'a Value, field_key: &str, max_depth: usize) -> Option<&'a Value> {
    let mut current = container(schema, schema, max_depth)?;
    if current.get("type").and_then(Value::as_str) == Some("array") {
        current = container(current.get("items")?, schema, max_depth)?;
    }

    let mut segments = field_key.split(KEY_SEPARATOR).peekable();
    while let Some(segment) = segments.next() {
        let property = current.get("properties")?.get(segment)?;
        if segments.peek().is_none() {
            return Some(property);
        }
        current = container(property, schema, max_depth)?;
    }
    None
}

/// Dereference a node until it exposes `properties` (or gives up).
fn container<'a>(node: &'a Value, root: &'a Value, max_depth: usize) -> Option<&'a Value> {
    let mut current = node;
    for _ in 0..=max_depth {
        if let Some(reference) = current.get("$ref").and_then(Value::as_str) {
            current = resolve_pointer(root, reference)?;
            continue;
        }
        if current.get("properties").is_some() || current.get("items").is_some() {
            return Some(current);
        }
        let alternative = UNION_KEYWORDS
            .iter()
            .find_map(|key| current.get(*key))
            .and_then(Value::as_array)
            .and_then(|alts| {
                alts.iter()
                    .find(|alt| alt.get("type").and_then(Value::as_str) != Some("null"))
            });
        match alternative {
            Some(alt) => current = alt,
            None => return Some(current),
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn recorder(engine: &mut FormEngine) -> Rc<RefCell<Vec<Value>>> {
        let emitted = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&emitted);
        engine.subscribe(move |value| sink.borrow_mut().push(value.clone()));
        emitted
    }

    fn person_schema() -> Value {
        json!({
            "type": "object",
            "required": ["name"],
            "properties": {
                "name": { "type": "string" },
                "active": { "type": "boolean" },
                "address": {
                    "type": "object",
                    "properties": {
                        "city": { "type": "string", "default": "Paris" },
                        "zip": { "type": "string" }
                    }
                }
            }
        })
    }

    #[test]
    fn object_root_initializes_defaults() {
        let engine = FormEngine::new(person_schema());
        assert_eq!(
            engine.json_data(),
            json!({
                "name": "",
                "active": false,
                "address": { "city": "Paris", "zip": "" }
            })
        );
        assert_eq!(engine.phase(), Phase::Idle);
    }

    #[test]
    fn incoming_value_wins_over_defaults() {
        let value = json!({ "name": "Ada", "address": { "zip": "75001" }, "stray": 1 });
        let engine =
            FormEngine::with_options(person_schema(), Some(&value), NormalizeOptions::default());

        let FormData::Flat(flat) = engine.data() else {
            panic!("expected flat data");
        };
        assert_eq!(flat["name"], "Ada");
        assert_eq!(flat["address.city"], "Paris");
        assert_eq!(flat["address.zip"], "75001");
        assert!(flat.get("stray").is_none());
    }

    #[test]
    fn edit_emits_nested_value_once() {
        let mut engine = FormEngine::new(person_schema());
        let emitted = recorder(&mut engine);

        engine
            .update_field("address.city", json!("Lyon"), None)
            .unwrap();

        let emitted = emitted.borrow();
        assert_eq!(emitted.len(), 1);
        assert_eq!(emitted[0]["address"]["city"], "Lyon");
    }

    #[test]
    fn schema_change_does_not_emit() {
        let mut engine = FormEngine::new(person_schema());
        let emitted = recorder(&mut engine);

        engine.set_schema(json!({ "type": "object", "properties": { "x": { "type": "integer" } } }), None);
        engine.set_value(&json!({ "x": 3 }));

        assert!(emitted.borrow().is_empty());
        assert_eq!(engine.json_data(), json!({ "x": 3 }));
    }

    #[test]
    fn unknown_field_is_rejected() {
        let mut engine = FormEngine::new(person_schema());
        let result = engine.update_field("nope", json!(1), None);
        assert!(matches!(result, Err(FormError::UnknownField { .. })));
    }

    #[test]
    fn raw_json_is_emitted_verbatim() {
        let mut engine = FormEngine::new(person_schema());
        let emitted = recorder(&mut engine);

        engine
            .apply_json_text(r#"{"name": "Bo", "address": {}, "x.y": 1}"#)
            .unwrap();

        // The dotted key is re-nested in form data but emitted as typed
        assert_eq!(
            emitted.borrow()[0],
            json!({ "name": "Bo", "address": {}, "x.y": 1 })
        );
        assert_eq!(
            engine.json_data(),
            json!({ "name": "Bo", "address": {}, "x": { "y": 1 } })
        );
    }

    #[test]
    fn panicking_listener_leaves_engine_idle() {
        let mut engine = FormEngine::new(person_schema());
        engine.subscribe(|_| panic!("listener failed"));

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            engine.update_field("name", json!("Ada"), None)
        }));

        assert!(result.is_err());
        assert_eq!(engine.phase(), Phase::Idle);
        assert_eq!(engine.json_data()["name"], "Ada");
    }

    #[test]
    fn invalid_raw_json_leaves_data() {
        let mut engine = FormEngine::new(person_schema());
        let before = engine.json_data();

        let result = engine.apply_json_text("{ \"name\": ");
        assert!(matches!(result, Err(FormError::InvalidJson { .. })));
        assert_eq!(engine.json_data(), before);
    }

    #[test]
    fn array_root_item_management() {
        let schema = json!({
            "type": "array",
            "items": {
                "type": "object",
                "properties": { "name": { "type": "string" }, "qty": { "type": "integer" } }
            }
        });
        let mut engine = FormEngine::new(schema);
        let emitted = recorder(&mut engine);

        assert_eq!(engine.json_data(), json!([{ "name": "", "qty": null }]));

        assert_eq!(engine.add_item().unwrap(), 2);
        engine.update_field("name", json!("second"), Some(1)).unwrap();
        let removed = engine.remove_item(0).unwrap();

        assert_eq!(removed, json!({ "name": "", "qty": null }));
        assert_eq!(engine.json_data(), json!([{ "name": "second", "qty": null }]));
        assert_eq!(emitted.borrow().len(), 3);
        assert!(matches!(
            engine.remove_item(5),
            Err(FormError::ItemOutOfRange { index: 5, len: 1 })
        ));
    }

    #[test]
    fn item_operations_need_array_root() {
        let mut engine = FormEngine::new(person_schema());
        assert!(matches!(engine.add_item(), Err(FormError::NotArrayRoot)));
    }

    #[test]
    fn variant_selection_resets_value() {
        let schema = json!({
            "type": "object",
            "properties": {
                "limit": {
                    "anyOf": [
                        { "type": "integer", "title": "Count" },
                        { "type": "string", "title": "Keyword" },
                        { "type": "null" }
                    ]
                }
            }
        });
        let mut engine = FormEngine::new(schema);
        let emitted = recorder(&mut engine);

        assert!(engine.has_variant_choice("limit"));
        assert_eq!(engine.selected_variant("limit"), "integer");
        assert_eq!(engine.field_type("limit"), Some(InputValueType::Integer));

        engine.update_field("limit", json!(10), None).unwrap();
        engine.select_variant("limit", "string", None).unwrap();

        assert_eq!(engine.selected_variant("limit"), "string");
        assert_eq!(engine.json_data(), json!({ "limit": "" }));
        assert_eq!(emitted.borrow().len(), 2);
    }

    #[test]
    fn field_metadata() {
        let engine = FormEngine::new(person_schema());
        assert!(engine.is_required("name"));
        assert!(!engine.is_required("address.city"));
        assert_eq!(engine.field_label("address.zip"), "zip");
        assert_eq!(engine.field_placeholder("name"), "Enter name");
        assert_eq!(engine.field_default("address.city"), Some(json!("Paris")));
        assert_eq!(engine.field_type("active"), Some(InputValueType::Boolean));
    }

    #[test]
    fn validate_current_data() {
        let mut engine = FormEngine::new(person_schema());
        let errors = engine.validate();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "name");

        engine.update_field("name", json!("Ada"), None).unwrap();
        assert!(engine.validate().is_empty());
    }

    #[test]
    fn raw_property_follows_refs() {
        let schema = json!({
            "type": "object",
            "properties": { "cfg": { "$ref": "#/$defs/Cfg" } },
            "$defs": {
                "Cfg": {
                    "type": "object",
                    "properties": {
                        "mode": { "oneOf": [{ "type": "string" }, { "type": "boolean" }] }
                    }
                }
            }
        });
        let engine = FormEngine::new(schema);
        let options = engine.variant_options("cfg.mode");
        assert_eq!(options.len(), 2);
        assert_eq!(options[1].value, "boolean");
    }
}
