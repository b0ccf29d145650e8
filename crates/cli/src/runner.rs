//! `tally run`: process one batch request from the command line.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::process;

use tally_eval::Evaluator;
use tally_pipeline::sink::{JsonLinesAudit, JsonLinesOutput, NullSink};
use tally_pipeline::{
    validate_request, AuditSink, CalculatorConfig, OutputSink, Pipeline, TransformRequest,
};
use tracing::debug;

use crate::{read_file, report_error, OutputFormat};

pub(crate) struct RunPaths<'a> {
    pub request: &'a Path,
    pub rows: Option<&'a Path>,
    pub audit: Option<&'a Path>,
    pub records: Option<&'a Path>,
}

pub(crate) fn cmd_run(
    evaluator: Evaluator<'_>,
    config: &CalculatorConfig,
    paths: &RunPaths<'_>,
    dry_run: bool,
    output: OutputFormat,
    quiet: bool,
) {
    let content = read_file(paths.request, output, quiet);
    let mut req = match TransformRequest::from_json(&content) {
        Ok(r) => r,
        Err(e) => {
            report_error(
                &format!("error parsing request '{}': {}", paths.request.display(), e),
                output,
                quiet,
            );
            process::exit(1);
        }
    };
    if dry_run {
        req.dry_run = true;
    }

    if let Err(errors) = validate_request(&req) {
        for e in &errors {
            report_error(&format!("invalid request: {}", e), output, quiet);
        }
        process::exit(1);
    }

    let rows_text = paths.rows.map(|p| read_file(p, output, quiet));
    let rows: Vec<&str> = match &rows_text {
        Some(text) => text.lines().collect(),
        None => req.source_data.iter().map(String::as_str).collect(),
    };
    debug!(rows = rows.len(), dry_run = req.dry_run, "running batch");

    let mut audit_sink: Box<dyn AuditSink> = match paths.audit {
        Some(path) => Box::new(JsonLinesAudit::new(BufWriter::new(create(path, output, quiet)))),
        None => Box::new(NullSink),
    };
    let mut output_sink: Box<dyn OutputSink> = match paths.records {
        Some(path) => Box::new(JsonLinesOutput::new(
            BufWriter::new(create(path, output, quiet)),
            &config.output.error_placeholder,
        )
        .with_headers(req.output_headers())),
        None => Box::new(NullSink),
    };

    let pipeline = Pipeline::new(evaluator).with_error_placeholder(&config.output.error_placeholder);
    let response = pipeline.process(
        &req,
        rows.iter().copied(),
        output_sink.as_mut(),
        audit_sink.as_mut(),
    );

    if quiet {
        return;
    }
    match output {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&response)
                    .unwrap_or_else(|e| format!("serialization error: {}", e))
            );
        }
        OutputFormat::Text => {
            for row in &response.rows {
                println!("{}", row);
            }
            for e in &response.errors {
                eprintln!("{}", e);
            }
            if !response.errors.is_empty() {
                eprintln!(
                    "{} row(s) produced, {} error(s)",
                    response.rows.len(),
                    response.errors.len()
                );
            }
        }
    }
}

fn create(path: &Path, output: OutputFormat, quiet: bool) -> File {
    match File::create(path) {
        Ok(f) => f,
        Err(e) => {
            report_error(
                &format!("error creating file '{}': {}", path.display(), e),
                output,
                quiet,
            );
            process::exit(1);
        }
    }
}
