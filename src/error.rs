//! Error types for schema loading, rule synthesis and form editing.

use std::path::PathBuf;
use thiserror::Error;

use crate::engine::Phase;

/// Errors while loading a schema or value document.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("cannot read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON: {source}")]
    InvalidJson {
        #[source]
        source: serde_json::Error,
    },
}

impl LoadError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            LoadError::FileNotFound { .. } | LoadError::ReadError { .. } => 3,
            LoadError::InvalidJson { .. } => 2,
        }
    }
}

/// A rule that could not be built for one field.
///
/// Collected next to the rule set; other fields are unaffected.
#[derive(Debug, Clone, Error, serde::Serialize)]
pub enum RuleError {
    #[error("invalid pattern for {field} \"{pattern}\": {message}")]
    InvalidPattern {
        field: String,
        pattern: String,
        message: String,
    },
}

/// Errors surfaced by form engine operations.
#[derive(Debug, Error)]
pub enum FormError {
    /// Raw JSON text from the editor did not parse. Form data is left as-is.
    #[error("Invalid JSON: {message}")]
    InvalidJson { message: String },

    #[error("unknown field: {field}")]
    UnknownField { field: String },

    #[error("item index {index} out of range ({len} items)")]
    ItemOutOfRange { index: usize, len: usize },

    #[error("operation requires an array-rooted schema")]
    NotArrayRoot,

    #[error("form is busy ({phase:?})")]
    Busy { phase: Phase },
}

/// Errors during validation of form values.
#[derive(Debug, Error)]
pub enum ValidateError {
    #[error("invalid schema: {message}")]
    Schema { message: String },

    #[error("validation failed with {} error(s)", errors.len())]
    Invalid { errors: Vec<FieldError> },
}

impl ValidateError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            ValidateError::Schema { .. } => 2,
            ValidateError::Invalid { .. } => 1,
        }
    }
}

/// Single validation failure with the field it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct FieldError {
    /// Field Key (dot path) or JSON Pointer of the offending value.
    pub field: String,
    /// Human-readable message.
    pub message: String,
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}
