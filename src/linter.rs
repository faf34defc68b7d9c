//! Schema linting - static checks for schemas used as form sources.
//!
//! Reports problems that make a schema render badly or lose information:
//! - JSON syntax errors
//! - `$ref` pointers that do not resolve inside the document
//! - `pattern` values that are not valid regular expressions
//! - reference cycles (rendered truncated)
//! - property names containing the Field Key separator
//! - cross-document references and keywords the form engine ignores

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::Serialize;
use serde_json::Value;

use crate::codec::KEY_SEPARATOR;
use crate::loader::{is_external_ref, load_schema, resolve_pointer};

/// Keywords outside the subset the form engine understands.
const UNSUPPORTED_KEYWORDS: &[&str] = &["not", "if", "then", "else", "patternProperties"];

/// Severity level for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// A single diagnostic message from linting.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: String,
    pub file: PathBuf,
    /// JSON path to the issue (e.g., "/properties/id/pattern")
    pub path: String,
    pub message: String,
}

/// Result of linting a single file.
#[derive(Debug, Clone, Serialize)]
pub struct FileResult {
    pub file: PathBuf,
    pub status: FileStatus,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
}

/// Status of a linted file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Ok,
    Error,
    Warning,
}

/// Result of linting a directory or set of files.
#[derive(Debug, Clone, Serialize)]
pub struct LintResult {
    pub path: PathBuf,
    pub files_checked: usize,
    pub passed: usize,
    pub failed: usize,
    pub errors: usize,
    pub warnings: usize,
    pub results: Vec<FileResult>,
}

impl LintResult {
    /// Returns true if all files passed (no errors).
    pub fn is_ok(&self) -> bool {
        self.errors == 0
    }
}

/// Lint a file or directory.
///
/// If path is a directory, recursively finds all .json files.
/// If `strict` is true, files with warnings count as failed.
pub fn lint(path: &Path, strict: bool) -> LintResult {
    let files = collect_schema_files(path);
    let mut results = Vec::new();
    let mut total_errors = 0;
    let mut total_warnings = 0;

    for file in &files {
        let file_result = lint_file(file, path);
        total_errors += count(&file_result, Severity::Error);
        total_warnings += count(&file_result, Severity::Warning);
        results.push(file_result);
    }

    let failed = results
        .iter()
        .filter(|r| {
            if strict {
                r.status != FileStatus::Ok
            } else {
                r.status == FileStatus::Error
            }
        })
        .count();

    LintResult {
        path: path.to_path_buf(),
        files_checked: files.len(),
        passed: files.len() - failed,
        failed,
        errors: total_errors,
        warnings: total_warnings,
        results,
    }
}

/// Lint a single schema file.
pub fn lint_file(file: &Path, base_path: &Path) -> FileResult {
    let display = file.strip_prefix(base_path).unwrap_or(file).to_path_buf();

    let schema = match load_schema(file) {
        Ok(s) => s,
        Err(e) => {
            return FileResult {
                file: display,
                status: FileStatus::Error,
                diagnostics: vec![Diagnostic {
                    severity: Severity::Error,
                    code: "E001".to_string(),
                    file: file.to_path_buf(),
                    path: "/".to_string(),
                    message: format!("syntax error: {}", e),
                }],
            };
        }
    };

    let diagnostics = lint_value(&schema, file);

    let status = if diagnostics.iter().any(|d| d.severity == Severity::Error) {
        FileStatus::Error
    } else if diagnostics.iter().any(|d| d.severity == Severity::Warning) {
        FileStatus::Warning
    } else {
        FileStatus::Ok
    };

    FileResult {
        file: display,
        status,
        diagnostics,
    }
}

/// Lint an already-loaded schema. `file` is only used for reporting.
pub fn lint_value(schema: &Value, file: &Path) -> Vec<Diagnostic> {
    let mut checker = Checker {
        root: schema,
        file,
        diagnostics: Vec::new(),
        reported_cycles: HashSet::new(),
    };
    checker.walk(schema, "");
    checker.diagnostics
}

// --- Internal implementation ---

struct Checker<'a> {
    root: &'a Value,
    file: &'a Path,
    diagnostics: Vec<Diagnostic>,
    reported_cycles: HashSet<String>,
}

impl Checker<'_> {
    fn walk(&mut self, value: &Value, path: &str) {
        match value {
            Value::Object(map) => {
                if let Some(Value::String(reference)) = map.get("$ref") {
                    self.check_ref(reference, path);
                }

                // Checked with the same engine the form rules use, so
                // lookaround and backreferences are errors here too.
                if let Some(Value::String(pattern)) = map.get("pattern") {
                    if let Err(e) = Regex::new(pattern) {
                        self.push(
                            Severity::Error,
                            "E003",
                            format!("{}/pattern", path),
                            format!("invalid pattern \"{}\": {}", pattern, e),
                        );
                    }
                }

                if let Some(Value::Object(props)) = map.get("properties") {
                    for name in props.keys().filter(|n| n.contains(KEY_SEPARATOR)) {
                        self.push(
                            Severity::Warning,
                            "W002",
                            format!("{}/properties/{}", path, name),
                            format!(
                                "property name \"{}\" contains '{}' and cannot be addressed as a field",
                                name, KEY_SEPARATOR
                            ),
                        );
                    }
                }

                for keyword in UNSUPPORTED_KEYWORDS.iter().filter(|k| map.contains_key(**k)) {
                    self.push(
                        Severity::Warning,
                        "W004",
                        format!("{}/{}", path, keyword),
                        format!("keyword \"{}\" is ignored by the form engine", keyword),
                    );
                }

                for (key, child) in map {
                    let child_path = format!("{}/{}", path, key);
                    match key.as_str() {
                        // Values of these keywords are data, not sub-schemas.
                        "enum" | "const" | "default" | "examples" => {}
                        "properties" | "$defs" | "definitions" => {
                            self.walk_schema_map(child, &child_path)
                        }
                        _ => self.walk(child, &child_path),
                    }
                }
            }
            Value::Array(arr) => {
                for (i, item) in arr.iter().enumerate() {
                    self.walk(item, &format!("{}/{}", path, i));
                }
            }
            _ => {}
        }
    }

    /// Walk a name-to-schema map; names are never keywords.
    fn walk_schema_map(&mut self, value: &Value, path: &str) {
        match value.as_object() {
            Some(entries) => {
                for (name, schema) in entries {
                    self.walk(schema, &format!("{}/{}", path, name));
                }
            }
            None => self.walk(value, path),
        }
    }

    fn check_ref(&mut self, reference: &str, path: &str) {
        let ref_path = format!("{}/$ref", path);

        if is_external_ref(reference) {
            self.push(
                Severity::Warning,
                "W003",
                ref_path,
                format!("external reference \"{}\" is not followed", reference),
            );
            return;
        }

        let Some(target) = resolve_pointer(self.root, reference) else {
            self.push(
                Severity::Error,
                "E002",
                ref_path,
                format!("reference not found: {}", reference),
            );
            return;
        };

        if !self.reported_cycles.contains(reference)
            && reaches(self.root, target, reference, &mut HashSet::new())
        {
            self.reported_cycles.insert(reference.to_string());
            self.push(
                Severity::Warning,
                "W001",
                ref_path,
                format!("reference cycle through {} will render truncated", reference),
            );
        }
    }

    fn push(&mut self, severity: Severity, code: &str, path: String, message: String) {
        self.diagnostics.push(Diagnostic {
            severity,
            code: code.to_string(),
            file: self.file.to_path_buf(),
            path,
            message,
        });
    }
}

/// True if `node` (following internal refs) contains a `$ref` to `target`.
fn reaches(root: &Value, node: &Value, target: &str, seen: &mut HashSet<String>) -> bool {
    match node {
        Value::Object(map) => {
            if let Some(Value::String(reference)) = map.get("$ref") {
                if reference == target {
                    return true;
                }
                if seen.insert(reference.clone()) {
                    if let Some(next) = resolve_pointer(root, reference) {
                        if reaches(root, next, target, seen) {
                            return true;
                        }
                    }
                }
            }
            map.values().any(|child| reaches(root, child, target, seen))
        }
        Value::Array(arr) => arr.iter().any(|item| reaches(root, item, target, seen)),
        _ => false,
    }
}

fn count(result: &FileResult, severity: Severity) -> usize {
    result
        .diagnostics
        .iter()
        .filter(|d| d.severity == severity)
        .count()
}

/// Collect all .json files in a path (file or directory).
fn collect_schema_files(path: &Path) -> Vec<PathBuf> {
    if path.is_file() {
        if path.extension().map(|e| e == "json").unwrap_or(false) {
            return vec![path.to_path_buf()];
        }
        return vec![];
    }

    let mut files = Vec::new();
    collect_files_recursive(path, &mut files);
    files.sort();
    files
}

fn collect_files_recursive(dir: &Path, files: &mut Vec<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_files_recursive(&path, files);
        } else if path.extension().map(|e| e == "json").unwrap_or(false) {
            files.push(path);
        }
    }
}
