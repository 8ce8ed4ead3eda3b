//! 函数客户端配置
//! Function client configuration
//!
//! 支持 YAML / TOML / JSON 文件、`${VAR}` 替换以及 `AIFUNC_` 前缀的环境变量覆盖
//! Loaded from YAML, TOML or JSON with `${VAR}` substitution and
//! `AIFUNC_`-prefixed environment overrides.

use crate::llm::OpenAIConfig;
use crate::llm::openai::DEFAULT_MODEL;
use aifunc_kernel::config::{ConfigError, load_with_env};
use aifunc_kernel::{AiFunctionError, AiFunctionResult};
use error_stack::{Report, ResultExt};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// 环境变量覆盖前缀
/// Prefix of environment overrides
pub const ENV_PREFIX: &str = "AIFUNC";

/// Error-stack backed result of config loading
pub type ConfigReport<T> = ::std::result::Result<T, Report<ConfigError>>;

/// 函数客户端配置
/// Function client configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiFunctionConfig {
    pub api_key: Option<String>,
    /// API 基础 URL
    /// API base URL
    pub base_url: Option<String>,
    pub org_id: Option<String>,
    /// 调用未指定模型时使用
    /// Used when a call does not name a model
    pub default_model: Option<String>,
    pub default_temperature: Option<f32>,
    /// 请求超时（秒）
    /// Request timeout (seconds)
    pub timeout_secs: Option<u64>,
    /// 额外重试次数
    /// Additional attempts per request
    pub max_retries: Option<u32>,
}

impl AiFunctionConfig {
    /// 从环境变量创建配置
    /// Create configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            api_key: std::env::var("OPENAI_API_KEY").ok(),
            base_url: std::env::var("OPENAI_BASE_URL").ok(),
            default_model: std::env::var("OPENAI_MODEL").ok(),
            ..Default::default()
        }
    }

    /// 从文件加载，环境变量可覆盖
    /// Load from a file; `AIFUNC_*` variables override file values
    pub fn load(path: impl AsRef<Path>) -> ConfigReport<Self> {
        let path = path.as_ref();
        load_with_env::<Self>(path, ENV_PREFIX)
            .map_err(Report::new)
            .attach(format!("loading function client config from {}", path.display()))
    }

    /// 用另一份配置中已设置的字段覆盖本配置
    /// Overlay fields that are set in `other`
    pub fn merge(mut self, other: AiFunctionConfig) -> Self {
        macro_rules! overlay {
            ($($field:ident),*) => {
                $(if other.$field.is_some() {
                    self.$field = other.$field;
                })*
            };
        }
        overlay!(
            api_key,
            base_url,
            org_id,
            default_model,
            default_temperature,
            timeout_secs,
            max_retries
        );
        self
    }

    pub fn model(&self) -> &str {
        self.default_model.as_deref().unwrap_or(DEFAULT_MODEL)
    }

    /// 转换为 OpenAI 提供者配置
    /// Convert into an OpenAI provider configuration
    pub fn openai_config(&self) -> AiFunctionResult<OpenAIConfig> {
        let api_key = self
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| AiFunctionError::configuration("An OpenAI API key is required"))?;

        let mut config = OpenAIConfig::new(api_key).with_model(self.model());
        if let Some(url) = &self.base_url {
            config = config.with_base_url(url);
        }
        if let Some(org) = &self.org_id {
            config = config.with_org_id(org);
        }
        if let Some(secs) = self.timeout_secs {
            config = config.with_timeout(secs);
        }
        Ok(config)
    }
}
