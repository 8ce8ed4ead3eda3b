//! aifunc CLI - call language-model functions and repair their output from the shell

mod cli;
mod commands;
mod error;
mod output;

use clap::Parser;
use cli::{Cli, Commands};
use colored::Colorize;
pub use error::CliError;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays machine readable
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let rt = tokio::runtime::Runtime::new()?;
    if let Err(e) = rt.block_on(run_command(cli)) {
        eprintln!("{} {}", "error:".red().bold(), e);
        std::process::exit(1);
    }
    Ok(())
}

async fn run_command(cli: Cli) -> Result<(), CliError> {
    let format = cli.output;

    match &cli.command {
        Commands::Call {
            file,
            stream,
            trace,
        } => {
            let config = commands::client_config(&cli)?;
            commands::call::run(&config, file, *stream, *trace, format).await?;
        }

        Commands::Repair {
            schema,
            input,
            yaml,
            deny_unknown_fields,
            sanitize,
            trace,
        } => {
            let options = commands::repair::RepairArgs {
                accept_yaml: *yaml,
                deny_unknown_fields: *deny_unknown_fields,
                sanitize: (*sanitize).into(),
                trace: *trace,
            };
            commands::repair::run(schema, input.as_deref(), options, format)?;
        }

        Commands::Schema { file } => {
            commands::schema::run(file, format)?;
        }
    }

    Ok(())
}
