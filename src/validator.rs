//! Validation of emitted form values.
//!
//! Two layers: the synthesized field rules (what the form widgets enforce)
//! and full JSON Schema validation of the nested value.

use serde_json::Value;

use crate::codec::to_flat;
use crate::error::{FieldError, ValidateError};
use crate::grouper::is_array_root;
use crate::resolver::normalize_with;
use crate::rules::{rules_for, RuleSet};
use crate::types::NormalizeOptions;

/// Validate a nested form value against a schema.
///
/// Runs the field rules derived from the normalized schema, then validates
/// the value against the original schema. All failures are collected.
///
/// # Errors
///
/// Returns `ValidateError::Schema` if the schema cannot be compiled, or
/// `ValidateError::Invalid` with every rule and schema failure.
pub fn validate(
    schema: &Value,
    value: &Value,
    options: &NormalizeOptions,
) -> Result<(), ValidateError> {
    let resolved = normalize_with(schema, options);
    let rules = rules_for(&resolved);

    let mut errors = rule_errors(&rules, is_array_root(&resolved), value);

    match validate_against_schema(schema, value) {
        Ok(()) => {}
        Err(ValidateError::Invalid { errors: schema_errors }) => errors.extend(schema_errors),
        Err(e) => return Err(e),
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ValidateError::Invalid { errors })
    }
}

/// Validate a value against a schema with a full JSON Schema validator.
pub fn validate_against_schema(schema: &Value, value: &Value) -> Result<(), ValidateError> {
    let validator = jsonschema::validator_for(schema).map_err(|e| ValidateError::Schema {
        message: e.to_string(),
    })?;

    let errors: Vec<FieldError> = validator
        .iter_errors(value)
        .map(|e| FieldError {
            field: e.instance_path.to_string(),
            message: e.to_string(),
        })
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ValidateError::Invalid { errors })
    }
}

/// Evaluate field rules against a nested value.
///
/// Array roots check each item; failures are keyed `[index].field`.
pub fn rule_errors(rules: &RuleSet, array_root: bool, value: &Value) -> Vec<FieldError> {
    if !array_root {
        return rules.validate_flat(&to_flat(value));
    }

    let Some(items) = value.as_array() else {
        return Vec::new();
    };

    items
        .iter()
        .enumerate()
        .flat_map(|(index, item)| {
            rules
                .validate_flat(&to_flat(item))
                .into_iter()
                .map(move |e| FieldError {
                    field: format!("[{}].{}", index, e.field),
                    message: e.message,
                })
        })
        .collect()
}
