//! Configuration loading
//!
//! Two entry points share format detection and `${VAR}` substitution:
//!
//! - [`load_config`] / [`from_str`] / [`load_with_env`] go through the
//!   `config` crate and suit flat settings files (credentials, defaults).
//! - [`parse_document`] / [`parse_str`] deserialize directly with
//!   serde_yaml, serde_json or toml. Function definition files use these so
//!   user-chosen keys (argument and schema field names) keep their case.

use config::{Config as Cfg, Environment, File};
use regex::{Captures, Regex};
use serde::de::DeserializeOwned;
use std::path::Path;
use tracing::debug;

pub use config::FileFormat;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parsing error: {0}")]
    Parse(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Detect configuration format from file extension
///
/// Recognized: `.yaml`/`.yml`, `.toml`, `.json`.
pub fn detect_format(path: impl AsRef<Path>) -> ConfigResult<FileFormat> {
    let path = path.as_ref();
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .ok_or_else(|| ConfigError::UnsupportedFormat("No file extension found".to_string()))?;

    match ext.to_lowercase().as_str() {
        "yaml" | "yml" => Ok(FileFormat::Yaml),
        "toml" => Ok(FileFormat::Toml),
        "json" => Ok(FileFormat::Json),
        _ => Err(ConfigError::UnsupportedFormat(ext.to_string())),
    }
}

/// Substitute environment variables in a string
///
/// `${VAR}` and `$VAR` are both replaced; references to unset variables are
/// left as written.
pub fn substitute_env_vars(content: &str) -> ConfigResult<String> {
    let braced = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}")
        .map_err(|e| ConfigError::Parse(e.to_string()))?;
    let simple = Regex::new(r"\$([A-Za-z_][A-Za-z0-9_]*)\b")
        .map_err(|e| ConfigError::Parse(e.to_string()))?;

    let result = braced.replace_all(content, env_lookup).into_owned();
    Ok(simple.replace_all(&result, env_lookup).into_owned())
}

fn env_lookup(caps: &Captures<'_>) -> String {
    std::env::var(&caps[1]).unwrap_or_else(|_| {
        debug!(var = &caps[1], "environment variable not set, reference kept");
        caps[0].to_string()
    })
}

/// Load a settings file through the `config` crate
pub fn load_config<T>(path: impl AsRef<Path>) -> ConfigResult<T>
where
    T: DeserializeOwned,
{
    let format = detect_format(&path)?;
    let content = std::fs::read_to_string(path)?;
    from_str(&content, format)
}

/// Load settings from a string with explicit format
pub fn from_str<T>(content: &str, format: FileFormat) -> ConfigResult<T>
where
    T: DeserializeOwned,
{
    let substituted = substitute_env_vars(content)?;

    let config = Cfg::builder()
        .add_source(File::from_str(&substituted, format))
        .build()
        .map_err(|e| ConfigError::Parse(e.to_string()))?;

    config
        .try_deserialize()
        .map_err(|e| ConfigError::Serialization(e.to_string()))
}

/// Load a settings file, then let `<PREFIX>_<FIELD>` environment variables
/// override its values (`__` separates nested keys).
pub fn load_with_env<T>(path: impl AsRef<Path>, env_prefix: &str) -> ConfigResult<T>
where
    T: DeserializeOwned,
{
    let format = detect_format(&path)?;
    let content = std::fs::read_to_string(path)?;
    let substituted = substitute_env_vars(&content)?;

    let config = Cfg::builder()
        .add_source(File::from_str(&substituted, format))
        .add_source(
            Environment::with_prefix(env_prefix)
                .prefix_separator("_")
                .separator("__"),
        )
        .build()
        .map_err(|e| ConfigError::Parse(e.to_string()))?;

    config
        .try_deserialize()
        .map_err(|e| ConfigError::Serialization(e.to_string()))
}

/// Deserialize a document file directly, keeping key case and order.
pub fn parse_document<T>(path: impl AsRef<Path>) -> ConfigResult<T>
where
    T: DeserializeOwned,
{
    let format = detect_format(&path)?;
    let content = std::fs::read_to_string(path)?;
    parse_str(&content, format)
}

/// Deserialize a document string directly, after env substitution.
pub fn parse_str<T>(content: &str, format: FileFormat) -> ConfigResult<T>
where
    T: DeserializeOwned,
{
    let substituted = substitute_env_vars(content)?;
    match format {
        FileFormat::Yaml => serde_yaml::from_str(&substituted)
            .map_err(|e| ConfigError::Serialization(e.to_string())),
        FileFormat::Json => serde_json::from_str(&substituted)
            .map_err(|e| ConfigError::Serialization(e.to_string())),
        FileFormat::Toml => {
            toml::from_str(&substituted).map_err(|e| ConfigError::Serialization(e.to_string()))
        }
        other => Err(ConfigError::UnsupportedFormat(format!("{other:?}"))),
    }
}

#[cfg(all(test, feature = "config"))]
mod unit_tests {
    use super::*;

    #[derive(serde::Deserialize, Debug, PartialEq)]
    struct Settings {
        api_key: String,
        model: String,
    }

    #[test]
    fn test_detect_format() {
        assert_eq!(detect_format("fn.yaml").unwrap(), FileFormat::Yaml);
        assert_eq!(detect_format("fn.YML").unwrap(), FileFormat::Yaml);
        assert_eq!(detect_format("fn.toml").unwrap(), FileFormat::Toml);
        assert_eq!(detect_format("fn.json").unwrap(), FileFormat::Json);
        assert!(matches!(
            detect_format("fn.ini"),
            Err(ConfigError::UnsupportedFormat(_))
        ));
        assert!(detect_format("Makefile").is_err());
    }

    #[test]
    fn test_from_str_toml() {
        let toml = r#"
api_key = "sk-test"
model = "gpt-4o-mini"
"#;
        let settings: Settings = from_str(toml, FileFormat::Toml).unwrap();
        assert_eq!(settings.api_key, "sk-test");
        assert_eq!(settings.model, "gpt-4o-mini");
    }

    #[test]
    fn test_parse_str_keeps_key_case() {
        let yaml = r#"
returnShape:
  firstName: string
  lastName: string
"#;
        let doc: serde_json::Value = parse_str(yaml, FileFormat::Yaml).unwrap();
        let fields: Vec<&String> = doc["returnShape"].as_object().unwrap().keys().collect();
        assert_eq!(fields, vec!["firstName", "lastName"]);
    }

    #[test]
    fn test_parse_str_reports_malformed_input() {
        let err = parse_str::<serde_json::Value>("{ not json", FileFormat::Json).unwrap_err();
        assert!(matches!(err, ConfigError::Serialization(_)));
    }

    #[test]
    fn test_missing_env_var_preserved() {
        let out = substitute_env_vars("key: ${AIFUNC_SURELY_UNSET_VAR}").unwrap();
        assert_eq!(out, "key: ${AIFUNC_SURELY_UNSET_VAR}");
        let out = substitute_env_vars("key: $AIFUNC_SURELY_UNSET_VAR").unwrap();
        assert_eq!(out, "key: $AIFUNC_SURELY_UNSET_VAR");
    }
}
