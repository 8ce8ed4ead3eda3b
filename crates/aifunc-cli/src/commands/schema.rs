//! `aifunc schema` command implementation

use super::load_schema;
use crate::CliError;
use crate::output::{self, OutputFormat};
use colored::Colorize;
use std::path::Path;

/// Execute the `aifunc schema` command
pub fn run(file: &Path, format: OutputFormat) -> Result<(), CliError> {
    let schema = load_schema(file)?;

    match format {
        OutputFormat::Json => output::print_json(&serde_json::json!({
            "signature": schema.signature(),
            "carrier": schema.needs_carrier(),
            "example": schema.example(),
            "schema": schema,
        })),
        OutputFormat::Text => {
            println!("{} {}", "Signature:".bold(), schema.signature());
            println!("{} {}", "Example:".bold(), schema.example());
            for doc in schema.field_docs() {
                println!("  {doc}");
            }
            Ok(())
        }
    }
}
