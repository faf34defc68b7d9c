//! Schema loading and in-document pointer lookup.

use std::path::Path;

use serde_json::Value;

use crate::error::LoadError;

/// Load a schema (or value document) from a file path.
///
/// # Errors
///
/// Returns `LoadError::FileNotFound` if the file doesn't exist,
/// or `LoadError::InvalidJson` if the file isn't valid JSON.
pub fn load_schema(path: &Path) -> Result<Value, LoadError> {
    if !path.exists() {
        return Err(LoadError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let content = std::fs::read_to_string(path).map_err(|source| LoadError::ReadError {
        path: path.to_path_buf(),
        source,
    })?;

    load_schema_str(&content)
}

/// Load a schema from a JSON string.
///
/// # Errors
///
/// Returns `LoadError::InvalidJson` if the string isn't valid JSON.
pub fn load_schema_str(content: &str) -> Result<Value, LoadError> {
    serde_json::from_str(content).map_err(|source| LoadError::InvalidJson { source })
}

/// Resolve a `#/...` pointer against the root document.
///
/// Segments are plain key lookups: `~0`/`~1` escapes are not decoded, and
/// array indices are not supported. Returns `None` on a pointer that does not
/// start with `#/`, a missing segment, or a non-object intermediate.
pub fn resolve_pointer<'a>(root: &'a Value, pointer: &str) -> Option<&'a Value> {
    let path = pointer.strip_prefix("#/")?;

    let mut current = root;
    for segment in path.split('/') {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// True for `$ref` values that point outside the current document.
pub fn is_external_ref(reference: &str) -> bool {
    !reference.starts_with('#')
}
