//! CLI command definitions using clap

use crate::output::OutputFormat;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// aifunc - let a language model play a typed function
#[derive(Parser)]
#[command(name = "aifunc")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json)
    #[arg(short = 'o', long, global = true, default_value_t = OutputFormat::Text)]
    pub output: OutputFormat,

    /// Client configuration file (YAML, TOML or JSON)
    #[arg(short = 'c', long, global = true)]
    pub config: Option<PathBuf>,

    /// OpenAI API key
    #[arg(long, global = true, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// OpenAI-compatible endpoint
    #[arg(long, global = true, env = "OPENAI_BASE_URL")]
    pub base_url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Call a function described by a definition file
    Call {
        /// Function definition (YAML, JSON or TOML)
        file: PathBuf,

        /// Print tokens as they arrive instead of a parsed value
        #[arg(long)]
        stream: bool,

        /// Also print the repair trace
        #[arg(long)]
        trace: bool,
    },

    /// Run the offline repair pipeline on a completion
    Repair {
        /// Return schema document
        #[arg(short, long)]
        schema: PathBuf,

        /// Completion text; read from stdin when omitted
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Also accept YAML mappings and sequences
        #[arg(long)]
        yaml: bool,

        /// Reject object fields the schema does not declare
        #[arg(long)]
        deny_unknown_fields: bool,

        /// Escaping applied inside string literals before parsing
        #[arg(long, value_enum, default_value_t = SanitizeArg::JsonUnicode)]
        sanitize: SanitizeArg,

        /// Also print the repair trace
        #[arg(long)]
        trace: bool,
    },

    /// Compile a return schema and print its signature
    Schema {
        /// Return schema document
        file: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SanitizeArg {
    JsonUnicode,
    HtmlEntities,
    Off,
}
