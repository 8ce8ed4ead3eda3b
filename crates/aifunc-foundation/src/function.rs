//! AI 函数客户端
//! AI function client
//!
//! ```rust,ignore
//! use aifunc_foundation::{AiFunction, AiFunctionOptions};
//! use serde_json::json;
//!
//! let client = AiFunction::new("sk-xxx", None)?;
//! let capital = client
//!     .call(
//!         AiFunctionOptions::new("Return the capital of the given country.")
//!             .args(json!(["Italy"]))
//!             .returns(json!({"type": "string"})),
//!     )
//!     .await?;
//! ```

use crate::config::AiFunctionConfig;
use crate::llm::openai::DEFAULT_MODEL;
use crate::llm::{
    BackoffStrategy, ChatCompletionRequest, ChatMessage, LLMProvider, LLMRetryPolicy,
    OpenAIProvider, RetryExecutor, TokenStream,
};
use crate::prompt::{PromptSpec, ResponseStyle, build_prompt};
use crate::repair::{RepairOptions, RepairPipeline};
use aifunc_kernel::{
    AiFunctionError, AiFunctionResult, RepairStage, RepairTrace, SchemaInput, SchemaNode, compile,
    normalize,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{Instrument, debug, info, info_span};
use uuid::Uuid;

pub const DEFAULT_FUNCTION_NAME: &str = "custom_function";
pub const DEFAULT_TEMPERATURE: f32 = 0.8;

fn default_function_name() -> String {
    DEFAULT_FUNCTION_NAME.to_string()
}

/// 单次调用的选项
/// Options of a single call
///
/// Field names are snake_case; the camelCase spellings used by older
/// definition files are accepted as aliases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiFunctionOptions {
    #[serde(alias = "functionName")]
    pub function_name: String,
    /// Positional list, keyed mapping, single scalar or nothing
    pub args: Value,
    pub description: String,
    #[serde(alias = "funcReturn", skip_serializing_if = "Option::is_none")]
    pub func_return: Option<SchemaInput>,
    #[serde(alias = "showDebug")]
    pub show_debug: bool,
    #[serde(alias = "blockHijack")]
    pub block_hijack: bool,
    #[serde(alias = "promptVars")]
    pub prompt_vars: BTreeMap<String, String>,
    pub stream: bool,
    #[serde(alias = "useInternalStream")]
    pub use_internal_stream: bool,
    #[serde(alias = "autoConvertReturn")]
    pub auto_convert_return: bool,
    /// Overrides the timestamp shown to the model
    #[serde(alias = "currentDateTime", skip_serializing_if = "Option::is_none")]
    pub current_date_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(alias = "topP", skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(alias = "maxTokens", skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(alias = "frequencyPenalty", skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f32>,
    #[serde(alias = "presencePenalty", skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retries: Option<u32>,
    /// Per-call repair pipeline settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repair: Option<RepairOptions>,
}

impl Default for AiFunctionOptions {
    fn default() -> Self {
        Self {
            function_name: default_function_name(),
            args: Value::Null,
            description: String::new(),
            func_return: None,
            show_debug: false,
            block_hijack: false,
            prompt_vars: BTreeMap::new(),
            stream: false,
            use_internal_stream: false,
            auto_convert_return: true,
            current_date_time: None,
            model: None,
            temperature: None,
            top_p: None,
            max_tokens: None,
            frequency_penalty: None,
            presence_penalty: None,
            retries: None,
            repair: None,
        }
    }
}

impl AiFunctionOptions {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            ..Default::default()
        }
    }

    pub fn function_name(mut self, name: impl Into<String>) -> Self {
        self.function_name = name.into();
        self
    }

    pub fn args(mut self, args: impl Into<Value>) -> Self {
        self.args = args.into();
        self
    }

    pub fn returns(mut self, schema: impl Into<SchemaInput>) -> Self {
        self.func_return = Some(schema.into());
        self
    }

    pub fn prompt_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.prompt_vars.insert(key.into(), value.into());
        self
    }

    pub fn show_debug(mut self, enabled: bool) -> Self {
        self.show_debug = enabled;
        self
    }

    pub fn block_hijack(mut self, enabled: bool) -> Self {
        self.block_hijack = enabled;
        self
    }

    pub fn use_internal_stream(mut self, enabled: bool) -> Self {
        self.use_internal_stream = enabled;
        self
    }

    pub fn auto_convert_return(mut self, enabled: bool) -> Self {
        self.auto_convert_return = enabled;
        self
    }

    pub fn current_date_time(mut self, timestamp: impl Into<String>) -> Self {
        self.current_date_time = Some(timestamp.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn top_p(mut self, top_p: f32) -> Self {
        self.top_p = Some(top_p);
        self
    }

    pub fn max_tokens(mut self, tokens: u32) -> Self {
        self.max_tokens = Some(tokens);
        self
    }

    pub fn frequency_penalty(mut self, penalty: f32) -> Self {
        self.frequency_penalty = Some(penalty);
        self
    }

    pub fn presence_penalty(mut self, penalty: f32) -> Self {
        self.presence_penalty = Some(penalty);
        self
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = Some(retries);
        self
    }

    pub fn repair_options(mut self, options: RepairOptions) -> Self {
        self.repair = Some(options);
        self
    }
}

/// 一次调用的记录
/// Record of one invocation
#[derive(Debug, Clone, Serialize)]
pub struct InvocationRecord {
    pub id: Uuid,
    pub function_name: String,
    pub model: String,
    pub messages: Vec<ChatMessage>,
    /// Completion text exactly as received
    pub raw_text: String,
    /// `None` when the pipeline was skipped
    pub resolved_stage: Option<RepairStage>,
    pub trace: RepairTrace,
    pub started_at: DateTime<Utc>,
    #[serde(with = "duration_millis")]
    pub elapsed: Duration,
}

mod duration_millis {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }
}

#[derive(Debug, Clone)]
pub struct CallOutcome {
    pub value: Value,
    pub invocation: InvocationRecord,
}

#[derive(Clone)]
struct Inner {
    provider: Arc<dyn LLMProvider>,
    defaults: AiFunctionConfig,
    backoff: BackoffStrategy,
    repair: RepairOptions,
}

/// AI 函数客户端
/// AI function client
///
/// Cheap to clone. Concurrent calls share only the provider and the
/// immutable defaults.
#[derive(Clone)]
pub struct AiFunction {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for AiFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AiFunction")
            .field("provider", &self.inner.provider.name())
            .field("repair", &self.inner.repair)
            .finish()
    }
}

struct Prepared {
    schema: Option<SchemaNode>,
    model: String,
    messages: Vec<ChatMessage>,
    request: ChatCompletionRequest,
    executor: Arc<RetryExecutor>,
}

impl AiFunction {
    /// 使用 OpenAI 兼容端点创建客户端
    /// Create a client for an OpenAI-compatible endpoint
    pub fn new(api_key: &str, endpoint: Option<&str>) -> AiFunctionResult<Self> {
        let config = AiFunctionConfig {
            api_key: Some(api_key.to_string()),
            base_url: endpoint.map(str::to_string),
            ..Default::default()
        };
        Self::from_config(&config)
    }

    pub fn from_config(config: &AiFunctionConfig) -> AiFunctionResult<Self> {
        let provider = OpenAIProvider::with_config(config.openai_config()?);
        Ok(Self::with_provider(Arc::new(provider)).with_defaults(config.clone()))
    }

    /// 使用自定义提供者
    /// Use a custom provider
    pub fn with_provider(provider: Arc<dyn LLMProvider>) -> Self {
        Self {
            inner: Arc::new(Inner {
                provider,
                defaults: AiFunctionConfig::default(),
                backoff: BackoffStrategy::default(),
                repair: RepairOptions::default(),
            }),
        }
    }

    /// Fallbacks for model, temperature and retries
    pub fn with_defaults(mut self, defaults: AiFunctionConfig) -> Self {
        Arc::make_mut(&mut self.inner).defaults = defaults;
        self
    }

    pub fn with_backoff(mut self, backoff: BackoffStrategy) -> Self {
        Arc::make_mut(&mut self.inner).backoff = backoff;
        self
    }

    /// Repair settings used when a call does not carry its own
    pub fn with_repair_options(mut self, options: RepairOptions) -> Self {
        Arc::make_mut(&mut self.inner).repair = options;
        self
    }

    pub fn provider(&self) -> &Arc<dyn LLMProvider> {
        &self.inner.provider
    }

    pub fn defaults(&self) -> &AiFunctionConfig {
        &self.inner.defaults
    }

    /// 调用函数并返回符合模式的值
    /// Call the function and return a schema-conformant value
    pub async fn call(&self, options: AiFunctionOptions) -> AiFunctionResult<Value> {
        self.call_traced(options).await.map(|outcome| outcome.value)
    }

    /// Like [`call`](Self::call), also returning the invocation record
    pub async fn call_traced(&self, options: AiFunctionOptions) -> AiFunctionResult<CallOutcome> {
        if options.stream {
            return Err(AiFunctionError::configuration(
                "streaming calls go through AiFunction::stream",
            ));
        }
        let prepared = self.prepare(&options, ResponseStyle::Json)?;

        let span = info_span!(
            "aifunc.call",
            function = %options.function_name,
            model = %prepared.model,
            provider = self.inner.provider.name()
        );
        self.execute(options, prepared).instrument(span).await
    }

    async fn execute(
        &self,
        options: AiFunctionOptions,
        prepared: Prepared,
    ) -> AiFunctionResult<CallOutcome> {
        let Prepared {
            schema,
            model,
            messages,
            request,
            executor,
        } = prepared;
        let started_at = Utc::now();
        let clock = Instant::now();

        let raw_text = if options.use_internal_stream {
            executor.chat_stream_text(request.stream()).await?
        } else {
            executor.chat_text(request).await?
        };
        debug!(chars = raw_text.len(), "completion received");

        let (value, resolved_stage, trace) = match schema.as_ref() {
            Some(schema) if options.auto_convert_return => {
                let repair = options
                    .repair
                    .clone()
                    .unwrap_or_else(|| self.inner.repair.clone());
                let resolved = RepairPipeline::new(repair)
                    .with_model_repair(executor.clone(), model.clone())
                    .resolve(&raw_text, schema)
                    .await?;
                (resolved.value, Some(resolved.stage), resolved.trace)
            }
            _ => (Value::String(raw_text.clone()), None, RepairTrace::default()),
        };

        let elapsed = clock.elapsed();
        if options.show_debug {
            info!(stage = ?resolved_stage, elapsed_ms = elapsed.as_millis() as u64, "Result: {}", value);
        } else {
            debug!(stage = ?resolved_stage, elapsed_ms = elapsed.as_millis() as u64, "function call resolved");
        }

        Ok(CallOutcome {
            value,
            invocation: InvocationRecord {
                id: Uuid::new_v4(),
                function_name: options.function_name,
                model,
                messages,
                raw_text,
                resolved_stage,
                trace,
                started_at,
                elapsed,
            },
        })
    }

    /// 流式调用，逐个返回令牌
    /// Stream the completion token by token; no parsing is applied
    pub async fn stream(&self, options: AiFunctionOptions) -> AiFunctionResult<TokenStream> {
        let prepared = self.prepare(&options, ResponseStyle::Plain)?;
        if let Some(schema) = prepared.schema.as_ref().filter(|s| !s.is_scalar()) {
            return Err(AiFunctionError::configuration(format!(
                "streaming requires a str, number, bool or date return, got {}",
                schema.signature()
            )));
        }

        let span = info_span!(
            "aifunc.stream",
            function = %options.function_name,
            model = %prepared.model
        );
        let chunks = prepared
            .executor
            .chat_stream(prepared.request.stream())
            .instrument(span)
            .await?;
        Ok(TokenStream::spawn(chunks))
    }

    fn prepare(&self, options: &AiFunctionOptions, style: ResponseStyle) -> AiFunctionResult<Prepared> {
        if options.description.trim().is_empty() {
            return Err(AiFunctionError::configuration("description must not be empty"));
        }

        let schema = options.func_return.clone().map(compile).transpose()?;
        if schema.is_none() && style == ResponseStyle::Json && options.auto_convert_return {
            return Err(AiFunctionError::configuration(
                "func_return is required unless auto_convert_return is disabled",
            ));
        }

        let defaults = &self.inner.defaults;
        let args = normalize(&options.args);
        let current_time = options
            .current_date_time
            .clone()
            .unwrap_or_else(|| Utc::now().to_rfc3339());

        let messages = build_prompt(&PromptSpec {
            function_name: &options.function_name,
            description: &options.description,
            prompt_vars: &options.prompt_vars,
            args: &args,
            returns: schema.as_ref(),
            current_time: &current_time,
            block_hijack: options.block_hijack,
            style,
        });

        if options.show_debug {
            info!("Using AI function:\n{}", messages[0].content);
            info!("With arguments: {}", messages[1].content);
        } else {
            debug!(prompt = %messages[0].content, args = %messages[1].content, "prompt built");
        }

        let model = options
            .model
            .clone()
            .or_else(|| defaults.default_model.clone())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let temperature = options
            .temperature
            .or(defaults.default_temperature)
            .unwrap_or(DEFAULT_TEMPERATURE);

        let mut request = ChatCompletionRequest::new(model.as_str())
            .messages(messages.clone())
            .temperature(temperature);
        if let Some(top_p) = options.top_p {
            request = request.top_p(top_p);
        }
        if let Some(tokens) = options.max_tokens {
            request = request.max_tokens(tokens);
        }
        if let Some(penalty) = options.frequency_penalty {
            request = request.frequency_penalty(penalty);
        }
        if let Some(penalty) = options.presence_penalty {
            request = request.presence_penalty(penalty);
        }

        let retries = options.retries.or(defaults.max_retries).unwrap_or(0);
        let policy = LLMRetryPolicy::from_retries(retries).with_backoff(self.inner.backoff.clone());
        let executor = Arc::new(RetryExecutor::new(self.inner.provider.clone(), policy));

        Ok(Prepared {
            schema,
            model,
            messages,
            request,
            executor,
        })
    }
}
