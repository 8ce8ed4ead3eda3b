//! `aifunc call` command implementation

use super::load_document;
use crate::CliError;
use crate::output::{self, OutputFormat};
use aifunc_foundation::llm::StreamEvent;
use aifunc_foundation::{AiFunction, AiFunctionConfig, AiFunctionOptions};
use futures::StreamExt;
use std::io::Write;
use std::path::Path;
use tracing::debug;

/// Execute the `aifunc call` command
pub async fn run(
    config: &AiFunctionConfig,
    file: &Path,
    stream: bool,
    trace: bool,
    format: OutputFormat,
) -> Result<(), CliError> {
    let options: AiFunctionOptions = load_document(file)?;
    let client = AiFunction::from_config(config)?;
    debug!(function = %options.function_name, model = config.model(), "calling");

    if stream || options.stream {
        return run_stream(&client, options).await;
    }

    let outcome = client.call_traced(options).await?;
    match format {
        OutputFormat::Json if trace => output::print_json(&serde_json::json!({
            "value": &outcome.value,
            "invocation": &outcome.invocation,
        }))?,
        _ => output::print_value(&outcome.value, format)?,
    }
    if trace && format == OutputFormat::Text {
        output::print_trace(outcome.invocation.resolved_stage, &outcome.invocation.trace);
    }
    Ok(())
}

async fn run_stream(client: &AiFunction, options: AiFunctionOptions) -> Result<(), CliError> {
    let mut tokens = client.stream(options).await?;
    let mut stdout = std::io::stdout();

    while let Some(event) = tokens.next().await {
        match event.map_err(aifunc_foundation::AiFunctionError::from)? {
            StreamEvent::Token(text) => {
                write!(stdout, "{text}")?;
                stdout.flush()?;
            }
            StreamEvent::Done { .. } => break,
        }
    }
    writeln!(stdout)?;
    Ok(())
}
