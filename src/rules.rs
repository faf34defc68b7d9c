//! Validation rule synthesis from a resolved schema.
//!
//! Rules are declarative: each carries the check it performs and the message
//! shown when it fails. `RuleSet::check` evaluates them against form values.

use indexmap::IndexMap;
use log::warn;
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::codec::{join_key, FlatMap};
use crate::error::{FieldError, RuleError};
use crate::grouper::{form_schema, is_nested_group, required_contains};
use crate::mapper::field_label;
use crate::types::SchemaType;

/// Value category checked by a type rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    String,
    Number,
    Boolean,
    Array,
}

impl ValueKind {
    fn for_type(schema_type: &SchemaType) -> Option<Self> {
        match schema_type {
            SchemaType::String => Some(ValueKind::String),
            SchemaType::Integer | SchemaType::Number => Some(ValueKind::Number),
            SchemaType::Boolean => Some(ValueKind::Boolean),
            SchemaType::Array => Some(ValueKind::Array),
            _ => None,
        }
    }

    fn article(&self) -> &'static str {
        match self {
            ValueKind::String => "a string",
            ValueKind::Number => "a number",
            ValueKind::Boolean => "a boolean",
            ValueKind::Array => "an array",
        }
    }

    fn matches(&self, value: &Value) -> bool {
        match self {
            ValueKind::String => value.is_string(),
            ValueKind::Number => value.is_number(),
            ValueKind::Boolean => value.is_boolean(),
            ValueKind::Array => value.is_array(),
        }
    }
}

/// The check a rule performs.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "rule", rename_all = "camelCase")]
pub enum RuleKind {
    Required,
    Type {
        expected: ValueKind,
    },
    MinLength {
        min: u64,
    },
    MaxLength {
        max: u64,
    },
    Minimum {
        min: f64,
    },
    Maximum {
        max: f64,
    },
    Pattern {
        pattern: String,
        #[serde(skip)]
        regex: Regex,
    },
}

/// A single field rule with its failure message.
#[derive(Debug, Clone, Serialize)]
pub struct Rule {
    #[serde(flatten)]
    pub kind: RuleKind,
    pub message: String,
}

impl Rule {
    fn new(kind: RuleKind, message: String) -> Self {
        Self { kind, message }
    }

    /// True when `value` satisfies this rule. `None` means the field is absent.
    ///
    /// Empty values only fail `Required`; every other rule skips them.
    pub fn accepts(&self, value: Option<&Value>) -> bool {
        let value = match value {
            Some(v) if !is_empty(v) => v,
            _ => return !matches!(self.kind, RuleKind::Required),
        };

        match &self.kind {
            RuleKind::Required => true,
            RuleKind::Type { expected } => expected.matches(value),
            RuleKind::MinLength { min } => value
                .as_str()
                .map(|s| s.chars().count() as u64 >= *min)
                .unwrap_or(true),
            RuleKind::MaxLength { max } => value
                .as_str()
                .map(|s| s.chars().count() as u64 <= *max)
                .unwrap_or(true),
            RuleKind::Minimum { min } => value.as_f64().map(|n| n >= *min).unwrap_or(true),
            RuleKind::Maximum { max } => value.as_f64().map(|n| n <= *max).unwrap_or(true),
            RuleKind::Pattern { regex, .. } => {
                value.as_str().map(|s| regex.is_match(s)).unwrap_or(true)
            }
        }
    }
}

/// Rules per Field Key in property declaration order, plus any rules that
/// failed to build.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RuleSet {
    pub fields: IndexMap<String, Vec<Rule>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<RuleError>,
}

impl RuleSet {
    /// Rules for one field, empty if none were declared.
    pub fn get(&self, field_key: &str) -> &[Rule] {
        self.fields.get(field_key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// True when the field carries a required rule.
    pub fn is_required(&self, field_key: &str) -> bool {
        self.get(field_key)
            .iter()
            .any(|r| matches!(r.kind, RuleKind::Required))
    }

    /// Check one field's value, returning every failed rule.
    pub fn check(&self, field_key: &str, value: Option<&Value>) -> Vec<FieldError> {
        self.get(field_key)
            .iter()
            .filter(|rule| !rule.accepts(value))
            .map(|rule| FieldError {
                field: field_key.to_string(),
                message: rule.message.clone(),
            })
            .collect()
    }

    /// Check every ruled field against flat form data.
    pub fn validate_flat(&self, data: &FlatMap) -> Vec<FieldError> {
        self.fields
            .keys()
            .flat_map(|key| self.check(key, data.get(key)))
            .collect()
    }
}

/// Synthesize rules for every property of a resolved schema.
///
/// Array roots are described by their `items`. A malformed `pattern` drops
/// only that rule and is reported in `RuleSet::errors`.
pub fn rules_for(resolved: &Value) -> RuleSet {
    let mut rule_set = RuleSet::default();
    if let Some(schema) = form_schema(resolved) {
        collect_rules(schema, "", &mut rule_set);
    }
    rule_set
}

// --- Internal implementation ---

fn collect_rules(schema: &Value, prefix: &str, rule_set: &mut RuleSet) {
    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        return;
    };

    for (key, property) in properties {
        let field_key = join_key(prefix, key);

        if is_nested_group(property) {
            collect_rules(property, &field_key, rule_set);
            continue;
        }

        let required = required_contains(schema, key);
        let rules = property_rules(property, &field_key, required, &mut rule_set.errors);
        if !rules.is_empty() {
            rule_set.fields.insert(field_key, rules);
        }
    }
}

fn property_rules(
    property: &Value,
    field_key: &str,
    required: bool,
    errors: &mut Vec<RuleError>,
) -> Vec<Rule> {
    let label = field_label(property, field_key);
    let map = property.as_object().cloned().unwrap_or_else(Map::new);
    let mut rules = Vec::new();

    if required {
        rules.push(Rule::new(RuleKind::Required, format!("{} is required", label)));
    }

    let kind = SchemaType::of(property).and_then(|t| ValueKind::for_type(&t));

    if let Some(expected) = kind {
        rules.push(Rule::new(
            RuleKind::Type { expected },
            format!("{} must be {}", label, expected.article()),
        ));
    }

    match kind {
        Some(ValueKind::String) => {
            if let Some((min, raw)) = constraint_u64(&map, "minLength") {
                rules.push(Rule::new(
                    RuleKind::MinLength { min },
                    format!("{} must be at least {} characters", label, raw),
                ));
            }
            if let Some((max, raw)) = constraint_u64(&map, "maxLength") {
                rules.push(Rule::new(
                    RuleKind::MaxLength { max },
                    format!("{} must be at most {} characters", label, raw),
                ));
            }
        }
        Some(ValueKind::Number) => {
            if let Some((min, raw)) = constraint_f64(&map, "minimum") {
                rules.push(Rule::new(
                    RuleKind::Minimum { min },
                    format!("{} must be at least {}", label, raw),
                ));
            }
            if let Some((max, raw)) = constraint_f64(&map, "maximum") {
                rules.push(Rule::new(
                    RuleKind::Maximum { max },
                    format!("{} must be at most {}", label, raw),
                ));
            }
        }
        _ => {}
    }

    // Patterns use `regex` crate syntax, which has no lookaround or
    // backreferences. Such patterns are reported as invalid.
    if let Some(pattern) = map.get("pattern").and_then(Value::as_str) {
        match Regex::new(pattern) {
            Ok(regex) => rules.push(Rule::new(
                RuleKind::Pattern {
                    pattern: pattern.to_string(),
                    regex,
                },
                format!("{} format is invalid", label),
            )),
            Err(e) => {
                warn!("skipping pattern rule for {}: {}", field_key, e);
                errors.push(RuleError::InvalidPattern {
                    field: field_key.to_string(),
                    pattern: pattern.to_string(),
                    message: e.to_string(),
                });
            }
        }
    }

    rules
}

fn constraint_u64(map: &Map<String, Value>, key: &str) -> Option<(u64, String)> {
    let value = map.get(key)?;
    Some((value.as_u64()?, value.to_string()))
}

fn constraint_f64(map: &Map<String, Value>, key: &str) -> Option<(f64, String)> {
    let value = map.get(key)?;
    Some((value.as_f64()?, value.to_string()))
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        _ => false,
    }
}
