//! # FHIRPath CLI Tool
//!
//! Command-line access to the evaluator. There is no text parser in this crate,
//! so the expression arrives as a JSON-encoded parse tree (the serialized form
//! of [`Expression`]) produced by whatever front end the caller uses.
//!
//! ## Command Line Options
//!
//! ```text
//! -t, --tree <TREE>                    Parse tree JSON file (use '-' for stdin)
//! -c, --context <CONTEXT>              Context parse tree evaluated first
//! -r, --resource <RESOURCE>            FHIR resource JSON file (use '-' for stdin)
//! -v, --variables <VARIABLES>          JSON object of variables
//!     --var <KEY=VALUE>                Set a variable directly
//!     --max-collection-size <N>        [env: FHIRPATH_MAX_COLLECTION_SIZE]
//!     --max-depth <N>                  [env: FHIRPATH_MAX_DEPTH]
//!     --truncate                       Truncate oversized collections [env: FHIRPATH_TRUNCATE]
//!     --regex-timeout-ms <MS>          [env: FHIRPATH_REGEX_TIMEOUT_MS]
//!     --timeout-ms <MS>                Whole-evaluation deadline [env: FHIRPATH_TIMEOUT_MS]
//!     --trace                          Include trace() output in the result
//!     --log-level <LEVEL>              [env: FHIRPATH_LOG_LEVEL] [default: warn]
//! -o, --output <OUTPUT>                Output file path (defaults to stdout)
//! ```
//!
//! ## Usage Examples
//!
//! ```bash
//! fhirpath-cli -t family.json -r patient.json
//! fhirpath-cli -t value-above.json -r observation.json --var threshold=5.0
//! cat patient.json | fhirpath-cli -t family.json -r -
//! ```

use std::collections::HashMap;
use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;

use clap::Parser;
use serde_json::{Value as JsonValue, json};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use kestrel_fhirpath_support::Collection;

use crate::ast::Expression;
use crate::config::{EngineConfig, Limits, OverflowPolicy, RegexCacheConfig};
use crate::context::EvaluationContext;
use crate::engine::FhirPathEngine;
use crate::error::{CliError, CliResult};
use crate::json_utils::collection_to_json;

#[derive(Parser, Debug, Clone)]
#[command(name = "fhirpath-cli")]
#[command(about = "FHIRPath CLI tool for evaluating parse trees against FHIR resources")]
#[command(
    long_about = "Evaluate JSON-encoded FHIRPath parse trees against FHIR resources with support for context expressions, variables, limits and trace output"
)]
pub struct Args {
    /// Parse tree JSON file (use '-' for stdin)
    #[arg(short, long)]
    pub tree: PathBuf,

    /// Context parse tree evaluated first; the main tree runs once per result item
    #[arg(short, long)]
    pub context: Option<PathBuf>,

    /// Path to FHIR resource JSON file (use '-' for stdin)
    #[arg(short, long)]
    pub resource: PathBuf,

    /// Path to a JSON object of variables
    #[arg(short = 'v', long)]
    pub variables: Option<PathBuf>,

    /// Set a variable directly (format: key=value)
    #[arg(long = "var", value_parser = parse_var)]
    pub var: Vec<(String, String)>,

    /// Maximum number of elements any intermediate collection may hold
    #[arg(long, env = "FHIRPATH_MAX_COLLECTION_SIZE", default_value_t = Limits::default().max_collection_size)]
    pub max_collection_size: usize,

    /// Maximum expression nesting depth
    #[arg(long, env = "FHIRPATH_MAX_DEPTH", default_value_t = Limits::default().max_depth)]
    pub max_depth: usize,

    /// Truncate oversized collections instead of failing
    #[arg(long, env = "FHIRPATH_TRUNCATE")]
    pub truncate: bool,

    /// Timeout for a single regex operation
    #[arg(long, env = "FHIRPATH_REGEX_TIMEOUT_MS", default_value_t = RegexCacheConfig::default().default_timeout_ms)]
    pub regex_timeout_ms: u64,

    /// Deadline for the whole evaluation
    #[arg(long, env = "FHIRPATH_TIMEOUT_MS")]
    pub timeout_ms: Option<u64>,

    /// Include trace() output in the result
    #[arg(long)]
    pub trace: bool,

    /// Log level for diagnostics on stderr
    #[arg(long, env = "FHIRPATH_LOG_LEVEL", default_value = "warn")]
    pub log_level: String,

    /// Output file path (defaults to stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl From<&Args> for EngineConfig {
    fn from(args: &Args) -> Self {
        EngineConfig {
            limits: Limits {
                max_collection_size: args.max_collection_size,
                max_depth: args.max_depth,
                collection_overflow: if args.truncate {
                    OverflowPolicy::Truncate
                } else {
                    OverflowPolicy::Reject
                },
            },
            regex: RegexCacheConfig {
                default_timeout_ms: args.regex_timeout_ms,
                ..RegexCacheConfig::default()
            },
            evaluation_timeout_ms: args.timeout_ms,
        }
    }
}

/// Parse a key=value pair
fn parse_var(s: &str) -> Result<(String, String), String> {
    let pos = s
        .find('=')
        .ok_or_else(|| format!("invalid variable format: {}", s))?;
    Ok((s[..pos].to_string(), s[pos + 1..].to_string()))
}

/// Installs a stderr `tracing` subscriber. `RUST_LOG` wins over `level`.
pub fn init_tracing(level: &str) {
    let filter = format!("kestrel_fhirpath={level},fhirpath={level}");
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .init();
}

/// Main CLI execution function
pub fn run_cli(args: Args) -> CliResult<()> {
    if args.tree.to_str() == Some("-") && args.resource.to_str() == Some("-") {
        return Err(CliError::InvalidInput(
            "--tree and --resource cannot both read from stdin".to_string(),
        ));
    }

    let tree = load_tree(&args.tree)?;
    let context_tree = args.context.as_ref().map(load_tree).transpose()?;
    let resource = Collection::from_json_slice(read_input(&args.resource)?.as_bytes())?;

    let engine = FhirPathEngine::with_config(EngineConfig::from(&args));
    let mut builder = engine.context_builder(resource);
    for (name, value) in load_variables(&args)? {
        builder = builder.variable(&name, value);
    }
    let context = builder.build();

    info!(expression = %tree, "evaluating");
    let result = match &context_tree {
        None => collection_to_json(&engine.evaluate(&tree, &context)?),
        Some(scope) => {
            let focus = engine.evaluate(scope, &context)?;
            debug!(context = %scope, items = focus.len(), "evaluated context expression");
            let mut per_item = Vec::with_capacity(focus.len());
            for (index, item) in focus.iter().enumerate() {
                let scoped = context.with_item(item, index);
                per_item.push(collection_to_json(&engine.evaluate(&tree, &scoped)?));
            }
            JsonValue::Array(per_item)
        }
    };

    let output = if args.trace {
        json!({ "result": result, "trace": trace_to_json(&context) })
    } else {
        result
    };
    write_output(&args.output, &serde_json::to_string_pretty(&output)?)
}

fn load_tree(path: &PathBuf) -> CliResult<Expression> {
    Ok(serde_json::from_str(&read_input(path)?)?)
}

/// Variables from `--variables` first, then `--var` overrides.
fn load_variables(args: &Args) -> CliResult<Vec<(String, Collection)>> {
    let mut variables = Vec::new();
    if let Some(path) = &args.variables {
        let content = fs::read_to_string(path)?;
        let parsed: HashMap<String, JsonValue> = serde_json::from_str(&content)?;
        for (name, value) in parsed {
            variables.push((name, Collection::from_json(&value)));
        }
    }
    for (name, raw) in &args.var {
        variables.push((name.clone(), variable_value(raw)));
    }
    Ok(variables)
}

/// A `--var` value: JSON when it parses as JSON, otherwise the raw string.
fn variable_value(raw: &str) -> Collection {
    match serde_json::from_str::<JsonValue>(raw) {
        Ok(json) => Collection::from_json(&json),
        Err(_) => Collection::single(raw),
    }
}

fn trace_to_json(context: &EvaluationContext) -> JsonValue {
    JsonValue::Array(
        context
            .trace_outputs()
            .iter()
            .map(|(name, values)| json!({ "name": name, "values": collection_to_json(values) }))
            .collect(),
    )
}

/// Read input from file or stdin
fn read_input(path: &PathBuf) -> CliResult<String> {
    if path.to_str() == Some("-") {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(path)?)
    }
}

/// Write output to file or stdout
fn write_output(path: &Option<PathBuf>, content: &str) -> CliResult<()> {
    match path {
        Some(p) => {
            fs::write(p, content)?;
        }
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle.write_all(content.as_bytes())?;
            handle.write_all(b"\n")?;
        }
    }
    Ok(())
}
