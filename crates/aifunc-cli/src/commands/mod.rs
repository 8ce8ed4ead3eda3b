//! CLI command implementations

pub mod call;
pub mod repair;
pub mod schema;

use crate::CliError;
use crate::cli::{Cli, SanitizeArg};
use aifunc_foundation::{AiFunctionConfig, SanitizeMode, SchemaInput, SchemaNode};
use aifunc_kernel::compile;
use aifunc_kernel::config::parse_document;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::path::Path;

/// Environment, then the config file, then command-line flags.
pub fn client_config(cli: &Cli) -> Result<AiFunctionConfig, CliError> {
    let mut config = AiFunctionConfig::from_env();

    if let Some(path) = &cli.config {
        let file = AiFunctionConfig::load(path)
            .map_err(|report| CliError::ConfigError(format!("{report:?}")))?;
        config = config.merge(file);
    }

    Ok(config.merge(AiFunctionConfig {
        api_key: cli.api_key.clone(),
        base_url: cli.base_url.clone(),
        ..Default::default()
    }))
}

/// Deserialize a YAML, TOML or JSON document with `${VAR}` substitution.
pub fn load_document<T: DeserializeOwned>(path: &Path) -> Result<T, CliError> {
    parse_document(path).map_err(|source| CliError::Document {
        path: path.display().to_string(),
        source,
    })
}

pub fn load_schema(path: &Path) -> Result<SchemaNode, CliError> {
    let declared: Value = load_document(path)?;
    Ok(compile(SchemaInput::Declarative(declared))?)
}

impl From<SanitizeArg> for SanitizeMode {
    fn from(arg: SanitizeArg) -> Self {
        match arg {
            SanitizeArg::JsonUnicode => SanitizeMode::JsonUnicode,
            SanitizeArg::HtmlEntities => SanitizeMode::HtmlEntities,
            SanitizeArg::Off => SanitizeMode::Off,
        }
    }
}
