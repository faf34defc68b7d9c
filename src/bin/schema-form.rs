//! Schema Form CLI
//!
//! Command-line interface for inspecting how a JSON Schema renders as a form.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use log::debug;
use schema_form::{
    group_properties, lint, load_schema, normalize_with, rules_for, validate, FileStatus,
    FormEngine, NormalizeOptions, Severity, ValidateError, DEFAULT_MAX_DEPTH,
};
use serde::Serialize;
use serde_json::json;

#[derive(Parser)]
#[command(name = "schema-form")]
#[command(about = "Derive form models from JSON Schemas")]
#[command(version)]
struct Cli {
    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Flags shared by every subcommand that writes JSON.
#[derive(Args)]
struct OutputArgs {
    /// Output file (stdout if not specified)
    #[arg(long)]
    output: Option<PathBuf>,

    /// Pretty-print JSON output
    #[arg(long)]
    pretty: bool,

    /// Maximum reference depth before a node is truncated
    #[arg(long, default_value_t = DEFAULT_MAX_DEPTH)]
    max_depth: usize,
}

impl OutputArgs {
    fn options(&self) -> NormalizeOptions {
        NormalizeOptions::new().max_depth(self.max_depth)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Normalize a schema: inline references and collapse unions
    Normalize {
        /// Schema file
        schema: PathBuf,

        #[command(flatten)]
        out: OutputArgs,
    },

    /// List the property groups a schema renders as
    Groups {
        /// Schema file
        schema: PathBuf,

        #[command(flatten)]
        out: OutputArgs,
    },

    /// Show the validation rules synthesized for each field
    Rules {
        /// Schema file
        schema: PathBuf,

        #[command(flatten)]
        out: OutputArgs,
    },

    /// Initialize form data from schema defaults and an optional value
    Init {
        /// Schema file
        schema: PathBuf,

        /// Existing value to load into the form
        #[arg(long)]
        value: Option<PathBuf>,

        #[command(flatten)]
        out: OutputArgs,
    },

    /// Validate a form value against field rules and the full schema
    Validate {
        /// Schema file
        schema: PathBuf,

        /// Value file to validate
        value: PathBuf,

        /// Output results as JSON (for automation)
        #[arg(long)]
        json: bool,

        /// Maximum reference depth before a node is truncated
        #[arg(long, default_value_t = DEFAULT_MAX_DEPTH)]
        max_depth: usize,
    },

    /// Lint schema files for problems as form sources
    Lint {
        /// File or directory to lint
        path: PathBuf,

        /// Output format: text (default) or json
        #[arg(long, default_value = "text")]
        format: String,

        /// Treat warnings as errors
        #[arg(long)]
        strict: bool,

        /// Suppress progress output, only show errors
        #[arg(long, short)]
        quiet: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Normalize { schema, out } => run_normalize(&schema, &out),
        Commands::Groups { schema, out } => run_groups(&schema, &out),
        Commands::Rules { schema, out } => run_rules(&schema, &out),
        Commands::Init { schema, value, out } => run_init(&schema, value.as_deref(), &out),
        Commands::Validate {
            schema,
            value,
            json,
            max_depth,
        } => run_validate(&schema, &value, json, max_depth),
        Commands::Lint {
            path,
            format,
            strict,
            quiet,
        } => run_lint(&path, &format, strict, quiet),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();
}

fn read_json(path: &Path, what: &str) -> Result<serde_json::Value, u8> {
    load_schema(path).map_err(|e| {
        eprintln!("Error loading {}: {}", what, e);
        e.exit_code() as u8
    })
}

fn run_normalize(schema_path: &Path, out: &OutputArgs) -> Result<(), u8> {
    let schema = read_json(schema_path, "schema")?;
    let resolved = normalize_with(&schema, &out.options());
    write_output(&resolved, out)
}

fn run_groups(schema_path: &Path, out: &OutputArgs) -> Result<(), u8> {
    let schema = read_json(schema_path, "schema")?;
    let resolved = normalize_with(&schema, &out.options());
    let groups = group_properties(&resolved);
    debug!("{} groups", groups.len());
    write_output(&groups, out)
}

fn run_rules(schema_path: &Path, out: &OutputArgs) -> Result<(), u8> {
    let schema = read_json(schema_path, "schema")?;
    let resolved = normalize_with(&schema, &out.options());
    let rules = rules_for(&resolved);
    for error in &rules.errors {
        eprintln!("Warning: {}", error);
    }
    write_output(&rules, out)
}

fn run_init(schema_path: &Path, value_path: Option<&Path>, out: &OutputArgs) -> Result<(), u8> {
    let schema = read_json(schema_path, "schema")?;
    let value = value_path.map(|p| read_json(p, "value")).transpose()?;

    let engine = FormEngine::with_options(schema, value.as_ref(), out.options());
    let output = json!({
        "data": engine.data(),
        "json": engine.json_data(),
    });
    write_output(&output, out)
}

fn run_validate(
    schema_path: &Path,
    value_path: &Path,
    json_output: bool,
    max_depth: usize,
) -> Result<(), u8> {
    let schema = read_json(schema_path, "schema")?;
    let value = read_json(value_path, "value")?;
    let options = NormalizeOptions::new().max_depth(max_depth);

    match validate(&schema, &value, &options) {
        Ok(()) => {
            if json_output {
                println!(r#"{{"valid":true}}"#);
            } else {
                println!("Valid");
            }
            Ok(())
        }
        Err(ValidateError::Invalid { errors }) => {
            if json_output {
                let output = json!({
                    "valid": false,
                    "errors": errors
                });
                println!("{}", output);
            } else {
                eprintln!("Validation failed:");
                for error in errors {
                    eprintln!("  {}", error);
                }
            }
            Err(1)
        }
        Err(e @ ValidateError::Schema { .. }) => {
            if json_output {
                println!("{}", json!({ "valid": false, "error": e.to_string() }));
            } else {
                eprintln!("Error: {}", e);
            }
            Err(e.exit_code() as u8)
        }
    }
}

fn write_output<T: Serialize>(value: &T, out: &OutputArgs) -> Result<(), u8> {
    let json_output = if out.pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .map_err(|e| {
        eprintln!("Error serializing output: {}", e);
        2u8
    })?;

    match &out.output {
        Some(path) => {
            std::fs::write(path, &json_output).map_err(|e| {
                eprintln!("Error writing to {}: {}", path.display(), e);
                3u8
            })?;
        }
        None => {
            println!("{}", json_output);
        }
    }

    Ok(())
}

fn run_lint(path: &Path, format: &str, strict: bool, quiet: bool) -> Result<(), u8> {
    if !path.exists() {
        eprintln!("Error: path not found: {}", path.display());
        return Err(2);
    }

    let result = lint(path, strict);

    if format == "json" {
        let text = serde_json::to_string_pretty(&result).map_err(|e| {
            eprintln!("Error serializing output: {}", e);
            2u8
        })?;
        println!("{}", text);
    } else {
        if !quiet {
            println!("Linting {} ...\n", path.display());
        }

        for file_result in &result.results {
            let status_icon = match file_result.status {
                FileStatus::Ok => "\x1b[32m✓\x1b[0m",
                FileStatus::Warning => "\x1b[33m⚠\x1b[0m",
                FileStatus::Error => "\x1b[31m✗\x1b[0m",
            };

            if !quiet || file_result.status != FileStatus::Ok {
                println!("  {} {}", status_icon, file_result.file.display());
            }

            for diag in &file_result.diagnostics {
                let (color, label) = match diag.severity {
                    Severity::Error => ("\x1b[31m", "error"),
                    Severity::Warning => ("\x1b[33m", "warning"),
                };
                if !quiet || diag.severity == Severity::Error {
                    println!(
                        "    {}{}[{}]\x1b[0m: {} - {}",
                        color, label, diag.code, diag.path, diag.message
                    );
                }
            }
        }

        println!();
        if passed(&result, strict) {
            println!(
                "\x1b[32m✓ {} files checked, all passed\x1b[0m",
                result.files_checked
            );
        } else {
            println!(
                "\x1b[31m✗ {} files checked: {} passed, {} failed ({} errors, {} warnings)\x1b[0m",
                result.files_checked, result.passed, result.failed, result.errors, result.warnings
            );
        }
    }

    if passed(&result, strict) {
        Ok(())
    } else {
        Err(1)
    }
}

fn passed(result: &schema_form::LintResult, strict: bool) -> bool {
    result.is_ok() && (!strict || result.warnings == 0)
}
