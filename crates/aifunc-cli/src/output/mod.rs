//! Output formatting module

use crate::CliError;
use aifunc_foundation::{RepairStage, RepairTrace};
use colored::Colorize;
use serde::Serialize;
use serde_json::Value;

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output
    #[default]
    Text,
    /// JSON output for automation
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
        }
    }
}

/// Print a resolved value. Strings are printed bare in text mode.
pub fn print_value(value: &Value, format: OutputFormat) -> Result<(), CliError> {
    match (format, value) {
        (OutputFormat::Text, Value::String(s)) => println!("{s}"),
        _ => println!("{}", serde_json::to_string_pretty(value)?),
    }
    Ok(())
}

/// Print any serializable report as pretty JSON.
pub fn print_json<T: Serialize>(report: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}

pub fn print_trace(stage: Option<RepairStage>, trace: &RepairTrace) {
    println!();
    match stage {
        Some(stage) => println!("{} {}", "Resolved at".bold(), stage.to_string().cyan()),
        None => println!("{}", "Repair pipeline skipped".bold()),
    }
    for attempt in trace.attempts() {
        match &attempt.failure {
            None => println!("  {} {}", "✓".green(), attempt.stage),
            Some(reason) => println!("  {} {}: {}", "✗".red(), attempt.stage, reason.dimmed()),
        }
    }
}
