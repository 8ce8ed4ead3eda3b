//! `aifunc repair` command implementation
//!
//! Runs the network-free part of the pipeline: fencing, direct parse,
//! heuristic rewrites and coercion.

use super::load_schema;
use crate::CliError;
use crate::output::{self, OutputFormat};
use aifunc_foundation::{RepairOptions, RepairPipeline, SanitizeMode};
use std::io::Read;
use std::path::Path;

pub struct RepairArgs {
    pub accept_yaml: bool,
    pub deny_unknown_fields: bool,
    pub sanitize: SanitizeMode,
    pub trace: bool,
}

/// Execute the `aifunc repair` command
pub fn run(
    schema: &Path,
    input: Option<&Path>,
    args: RepairArgs,
    format: OutputFormat,
) -> Result<(), CliError> {
    let schema = load_schema(schema)?;
    let raw = match input {
        Some(path) => std::fs::read_to_string(path)?,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };

    let pipeline = RepairPipeline::new(RepairOptions {
        accept_yaml: args.accept_yaml,
        deny_unknown_fields: args.deny_unknown_fields,
        sanitize: args.sanitize,
        model_repair: false,
        ..Default::default()
    });
    let resolved = pipeline.resolve_local(&raw, &schema)?;

    match format {
        OutputFormat::Json if args.trace => output::print_json(&serde_json::json!({
            "value": &resolved.value,
            "stage": resolved.stage,
            "trace": &resolved.trace,
        }))?,
        _ => output::print_value(&resolved.value, format)?,
    }
    if args.trace && format == OutputFormat::Text {
        output::print_trace(Some(resolved.stage), &resolved.trace);
    }
    Ok(())
}
