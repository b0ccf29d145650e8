mod runner;

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use serde::de::DeserializeOwned;
use tally_eval::{
    DynamicValue, EvaluationRequest, Evaluator, InMemoryResources, Resources, UnitTable, ValueMap,
};
use tally_pipeline::CalculatorConfig;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Formula calculator for sustainability metrics.
#[derive(Parser)]
#[command(name = "tally", version, about = "Formula calculator for sustainability metrics")]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    /// Path to a TOML calculator configuration
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Path to a JSON resources file (groups, formulas, datasets, activities, product matches)
    #[arg(long, global = true)]
    resources: Option<PathBuf>,

    /// Path to a JSON unit table replacing the built-in one
    #[arg(long, global = true)]
    units: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a single formula
    Eval {
        /// Formula text
        formula: String,
        /// Parameters as a JSON object
        #[arg(long)]
        params: Option<String>,
        /// Previously computed outputs as a JSON object
        #[arg(long)]
        context: Option<String>,
        /// Group context the formula runs in
        #[arg(long, default_value = "/")]
        group: String,
        /// Tenant the formula runs for
        #[arg(long)]
        tenant: Option<String>,
    },

    /// Run a batch request over JSON-lines rows
    Run {
        /// Path to the batch request JSON
        request: PathBuf,
        /// Path to the input rows, one JSON object per line (default: the request's sourceData)
        #[arg(long)]
        rows: Option<PathBuf>,
        /// Write audit records as JSON lines to this file
        #[arg(long)]
        audit: Option<PathBuf>,
        /// Write output records as JSON lines to this file
        #[arg(long)]
        records: Option<PathBuf>,
        /// Evaluate without publishing audit or output records
        #[arg(long)]
        dry_run: bool,
    },
}

fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => match CalculatorConfig::load(path) {
            Ok(c) => c,
            Err(e) => {
                report_error(&format!("error: {}", e), cli.output, cli.quiet);
                process::exit(1);
            }
        },
        None => CalculatorConfig::default(),
    };
    let options = match config.evaluator_options() {
        Ok(o) => o,
        Err(e) => {
            report_error(&format!("error: {}", e), cli.output, cli.quiet);
            process::exit(1);
        }
    };
    let resources: InMemoryResources = match &cli.resources {
        Some(path) => read_json(path, cli.output, cli.quiet),
        None => InMemoryResources::new(),
    };
    let units: Option<UnitTable> = cli.units.as_ref().map(|path| {
        match UnitTable::from_json(&read_file(path, cli.output, cli.quiet)) {
            Ok(table) => table,
            Err(e) => {
                report_error(
                    &format!("error parsing unit table '{}': {}", path.display(), e),
                    cli.output,
                    cli.quiet,
                );
                process::exit(1);
            }
        }
    });

    let mut evaluator = Evaluator::new(Resources::from_provider(&resources)).with_options(options);
    if let Some(table) = &units {
        evaluator = evaluator.with_units(table);
    }

    match cli.command {
        Commands::Eval {
            formula,
            params,
            context,
            group,
            tenant,
        } => {
            cmd_eval(
                &evaluator,
                &formula,
                params.as_deref(),
                context.as_deref(),
                &group,
                tenant.as_deref(),
                cli.output,
                cli.quiet,
            );
        }
        Commands::Run {
            request,
            rows,
            audit,
            records,
            dry_run,
        } => {
            runner::cmd_run(
                evaluator,
                &config,
                &runner::RunPaths {
                    request: &request,
                    rows: rows.as_deref(),
                    audit: audit.as_deref(),
                    records: records.as_deref(),
                },
                dry_run,
                cli.output,
                cli.quiet,
            );
        }
    }
}

// ──────────────────────────────────────────────
// eval
// ──────────────────────────────────────────────

#[allow(clippy::too_many_arguments)]
fn cmd_eval(
    evaluator: &Evaluator<'_>,
    formula: &str,
    params: Option<&str>,
    context: Option<&str>,
    group: &str,
    tenant: Option<&str>,
    output: OutputFormat,
    quiet: bool,
) {
    let parameters = parse_value_map("--params", params, output, quiet);
    let context = parse_value_map("--context", context, output, quiet);
    let request = EvaluationRequest {
        parameters: &parameters,
        context: &context,
        group_context: group,
        tenant,
    };

    match evaluator.evaluate(formula, &request) {
        Ok(evaluation) => {
            if quiet {
                return;
            }
            match output {
                OutputFormat::Text => println!("{}", evaluation.result),
                OutputFormat::Json => {
                    let json = serde_json::json!({
                        "result": evaluation.result.canonical(),
                        "type": evaluation.result.type_name(),
                        "audit": evaluation.audit,
                    });
                    println!(
                        "{}",
                        serde_json::to_string_pretty(&json)
                            .unwrap_or_else(|e| format!("serialization error: {}", e))
                    );
                }
            }
        }
        Err(failure) => {
            report_error(&format!("error: {}", failure), output, quiet);
            process::exit(1);
        }
    }
}

/// A JSON object of name → value; absent means empty. Names may carry a
/// leading `:`.
fn parse_value_map(
    flag: &str,
    json: Option<&str>,
    output: OutputFormat,
    quiet: bool,
) -> ValueMap {
    let Some(json) = json else {
        return ValueMap::new();
    };
    let obj: serde_json::Map<String, serde_json::Value> = match serde_json::from_str(json) {
        Ok(o) => o,
        Err(e) => {
            report_error(
                &format!("error: {} must be a JSON object: {}", flag, e),
                output,
                quiet,
            );
            process::exit(1);
        }
    };
    obj.iter()
        .map(|(k, v)| (k.trim_start_matches(':').to_string(), DynamicValue::from_json(v)))
        .collect()
}

// ──────────────────────────────────────────────
// Shared helpers
// ──────────────────────────────────────────────

pub(crate) fn read_file(path: &Path, output: OutputFormat, quiet: bool) -> String {
    match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            report_error(
                &format!("error reading file '{}': {}", path.display(), e),
                output,
                quiet,
            );
            process::exit(1);
        }
    }
}

pub(crate) fn read_json<T: DeserializeOwned>(path: &Path, output: OutputFormat, quiet: bool) -> T {
    let content = read_file(path, output, quiet);
    match serde_json::from_str(&content) {
        Ok(v) => v,
        Err(e) => {
            report_error(
                &format!("error parsing JSON in '{}': {}", path.display(), e),
                output,
                quiet,
            );
            process::exit(1);
        }
    }
}

pub(crate) fn report_error(msg: &str, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => eprintln!("{}", msg),
        OutputFormat::Json => {
            eprintln!("{}", serde_json::json!({ "error": msg }));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_eval::EvaluatorOptions;

    #[test]
    fn value_map_trims_colons() {
        let map = parse_value_map(
            "--params",
            Some(r#"{":a": 2, "b": "x", "c": null}"#),
            OutputFormat::Text,
            true,
        );
        assert_eq!(map["a"].canonical(), "2");
        assert_eq!(map["b"], DynamicValue::string("x"));
        assert!(map["c"].is_null());
    }

    #[test]
    fn default_config_matches_evaluator_defaults() {
        let options = CalculatorConfig::default().evaluator_options().unwrap();
        assert_eq!(options.max_depth, EvaluatorOptions::default().max_depth);
    }
}
