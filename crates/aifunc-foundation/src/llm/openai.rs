//! OpenAI Provider Implementation
//!
//! 使用 `async-openai` crate 实现模型调用
//! Model invocation through the `async-openai` crate
//!
//! 兼容 OpenAI API 的服务（Ollama、vLLM、LocalAI 等）通过 `base_url` 接入
//! OpenAI-compatible services (Ollama, vLLM, LocalAI, ...) are reached through `base_url`
//!
//! ```rust,ignore
//! use aifunc_foundation::llm::openai::{OpenAIConfig, OpenAIProvider};
//!
//! let provider = OpenAIProvider::with_config(
//!     OpenAIConfig::new("sk-xxx")
//!         .with_base_url("http://localhost:11434/v1")
//!         .with_timeout(30),
//! );
//! ```

use aifunc_kernel::llm::{
    ChatCompletionChunk, ChatCompletionRequest, ChatCompletionResponse, ChatMessage, ChatStream,
    Choice, ChunkChoice, ChunkDelta, FinishReason, LLMError, LLMProvider, LLMResult, Role, Usage,
};
use async_openai::{
    Client,
    config::OpenAIConfig as AsyncOpenAIConfig,
    error::OpenAIError,
    types::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequest, CreateChatCompletionRequestArgs,
        CreateChatCompletionResponse, CreateChatCompletionStreamResponse,
        FinishReason as OpenAIFinishReason,
    },
};
use async_trait::async_trait;
use futures::StreamExt;
use std::time::Duration;
use tracing::warn;

/// 默认模型
/// Default model
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

/// OpenAI Provider 配置
/// OpenAI Provider Configuration
#[derive(Debug, Clone)]
pub struct OpenAIConfig {
    /// API Key
    pub api_key: String,
    /// API 基础 URL
    /// API Base URL
    pub base_url: Option<String>,
    /// 组织 ID
    /// Organization ID
    pub org_id: Option<String>,
    /// 默认模型
    /// Default Model
    pub default_model: String,
    /// 请求超时（秒）
    /// Request Timeout (seconds)
    pub timeout_secs: u64,
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: None,
            org_id: None,
            default_model: DEFAULT_MODEL.to_string(),
            timeout_secs: 60,
        }
    }
}

impl OpenAIConfig {
    /// 创建新配置
    /// Create new configuration
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Default::default()
        }
    }

    /// 设置 base URL
    /// Set base URL
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// 设置默认模型
    /// Set default model
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    /// 设置组织 ID
    /// Set organization ID
    pub fn with_org_id(mut self, org_id: impl Into<String>) -> Self {
        self.org_id = Some(org_id.into());
        self
    }

    /// 设置超时
    /// Set timeout
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

/// OpenAI LLM Provider
pub struct OpenAIProvider {
    client: Client<AsyncOpenAIConfig>,
    config: OpenAIConfig,
}

impl OpenAIProvider {
    /// 使用 API Key 创建 Provider
    /// Create Provider using API Key
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_config(OpenAIConfig::new(api_key))
    }

    /// 使用配置创建 Provider
    /// Create Provider using configuration
    pub fn with_config(config: OpenAIConfig) -> Self {
        let mut openai_config = AsyncOpenAIConfig::new().with_api_key(&config.api_key);

        if let Some(ref base_url) = config.base_url {
            openai_config = openai_config.with_api_base(base_url);
        }

        if let Some(ref org_id) = config.org_id {
            openai_config = openai_config.with_org_id(org_id);
        }

        let client = match reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
        {
            Ok(http) => Client::with_config(openai_config).with_http_client(http),
            Err(e) => {
                warn!("Falling back to default HTTP client, timeout not applied: {}", e);
                Client::with_config(openai_config)
            }
        };

        Self { client, config }
    }

    /// 获取配置
    /// Get configuration
    pub fn config(&self) -> &OpenAIConfig {
        &self.config
    }

    /// 转换单个消息
    /// Convert a single message
    fn convert_message(msg: &ChatMessage) -> LLMResult<ChatCompletionRequestMessage> {
        let content = msg.content.clone();
        match msg.role {
            Role::System => Ok(ChatCompletionRequestSystemMessageArgs::default()
                .content(content)
                .build()
                .map_err(|e| LLMError::Other(e.to_string()))?
                .into()),
            Role::User => Ok(ChatCompletionRequestUserMessageArgs::default()
                .content(content)
                .build()
                .map_err(|e| LLMError::Other(e.to_string()))?
                .into()),
            Role::Assistant => Ok(ChatCompletionRequestAssistantMessageArgs::default()
                .content(content)
                .build()
                .map_err(|e| LLMError::Other(e.to_string()))?
                .into()),
        }
    }

    /// 构建 async-openai 请求
    /// Build the async-openai request
    fn build_request(
        &self,
        request: &ChatCompletionRequest,
        stream: bool,
    ) -> LLMResult<CreateChatCompletionRequest> {
        let messages = request
            .messages
            .iter()
            .map(Self::convert_message)
            .collect::<LLMResult<Vec<_>>>()?;

        let model = if request.model.is_empty() {
            self.config.default_model.clone()
        } else {
            request.model.clone()
        };

        let mut builder = CreateChatCompletionRequestArgs::default();
        builder.model(&model).messages(messages);

        // 设置可选参数
        // Set optional parameters
        if let Some(temp) = request.temperature {
            builder.temperature(temp);
        }
        if let Some(top_p) = request.top_p {
            builder.top_p(top_p);
        }
        if let Some(max_tokens) = request.max_tokens {
            builder.max_tokens(max_tokens);
        }
        if let Some(freq_penalty) = request.frequency_penalty {
            builder.frequency_penalty(freq_penalty);
        }
        if let Some(pres_penalty) = request.presence_penalty {
            builder.presence_penalty(pres_penalty);
        }
        if stream {
            builder.stream(true);
        }

        builder
            .build()
            .map_err(|e| LLMError::ConfigError(e.to_string()))
    }

    fn convert_finish_reason(reason: OpenAIFinishReason) -> FinishReason {
        match reason {
            OpenAIFinishReason::Stop => FinishReason::Stop,
            OpenAIFinishReason::Length => FinishReason::Length,
            OpenAIFinishReason::ToolCalls | OpenAIFinishReason::FunctionCall => {
                FinishReason::ToolCalls
            }
            OpenAIFinishReason::ContentFilter => FinishReason::ContentFilter,
        }
    }

    /// 转换响应
    /// Convert response
    fn convert_response(response: CreateChatCompletionResponse) -> ChatCompletionResponse {
        let choices = response
            .choices
            .into_iter()
            .map(|choice| Choice {
                index: choice.index,
                message: ChatMessage::assistant(choice.message.content.unwrap_or_default()),
                finish_reason: choice.finish_reason.map(Self::convert_finish_reason),
            })
            .collect();

        ChatCompletionResponse {
            id: response.id,
            model: response.model,
            choices,
            usage: response.usage.map(|u| Usage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            }),
        }
    }

    /// 转换流式响应块
    /// Convert streaming response chunk
    fn convert_chunk(chunk: CreateChatCompletionStreamResponse) -> ChatCompletionChunk {
        let choices = chunk
            .choices
            .into_iter()
            .map(|choice| ChunkChoice {
                index: choice.index,
                delta: ChunkDelta {
                    role: choice.delta.role.map(|_| Role::Assistant),
                    content: choice.delta.content,
                },
                finish_reason: choice.finish_reason.map(Self::convert_finish_reason),
            })
            .collect();

        ChatCompletionChunk {
            id: chunk.id,
            model: chunk.model,
            choices,
            usage: chunk.usage.map(|u| Usage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            }),
        }
    }

    /// 转换错误
    /// Convert error
    fn convert_error(err: OpenAIError) -> LLMError {
        match err {
            OpenAIError::ApiError(api_err) => {
                let code = api_err.code.clone();
                let message = api_err.message.clone();
                let lower = message.to_lowercase();

                // 根据错误类型分类
                // Categorize by error type
                if lower.contains("rate limit") {
                    LLMError::RateLimited(message)
                } else if lower.contains("quota") || lower.contains("billing") {
                    LLMError::QuotaExceeded(message)
                } else if lower.contains("api key") || lower.contains("unauthorized") {
                    LLMError::AuthError(message)
                } else if lower.contains("model") && lower.contains("not found") {
                    LLMError::ModelNotFound(message)
                } else if lower.contains("context length") || lower.contains("maximum context") {
                    LLMError::ContextLengthExceeded(message)
                } else if lower.contains("content") && lower.contains("filter") {
                    LLMError::ContentFiltered(message)
                } else {
                    LLMError::ApiError { code, message }
                }
            }
            OpenAIError::Reqwest(e) => {
                if e.is_timeout() {
                    LLMError::Timeout(e.to_string())
                } else if let Some(status) = e.status() {
                    LLMError::ApiError {
                        code: Some(status.as_u16().to_string()),
                        message: e.to_string(),
                    }
                } else {
                    LLMError::NetworkError(e.to_string())
                }
            }
            OpenAIError::JSONDeserialize(e) => LLMError::SerializationError(e.to_string()),
            OpenAIError::InvalidArgument(msg) => LLMError::ConfigError(msg),
            other => LLMError::Other(other.to_string()),
        }
    }
}

#[async_trait]
impl LLMProvider for OpenAIProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn default_model(&self) -> &str {
        &self.config.default_model
    }

    async fn chat(&self, request: ChatCompletionRequest) -> LLMResult<ChatCompletionResponse> {
        let openai_request = self.build_request(&request, false)?;

        let response = self
            .client
            .chat()
            .create(openai_request)
            .await
            .map_err(Self::convert_error)?;

        Ok(Self::convert_response(response))
    }

    async fn chat_stream(&self, request: ChatCompletionRequest) -> LLMResult<ChatStream> {
        let openai_request = self.build_request(&request, true)?;

        let stream = self
            .client
            .chat()
            .create_stream(openai_request)
            .await
            .map_err(Self::convert_error)?;

        // 过滤掉某些兼容服务返回的无效 UTF-8 数据块
        // Skip invalid UTF-8 chunks some compatible services emit
        let converted = stream.filter_map(|result| async move {
            match result {
                Ok(chunk) => Some(Ok(Self::convert_chunk(chunk))),
                Err(e) => {
                    let err_str = e.to_string();
                    if err_str.contains("stream did not contain valid UTF-8")
                        || err_str.contains("utf8")
                    {
                        warn!("Skipping invalid UTF-8 chunk from stream");
                        None
                    } else {
                        Some(Err(Self::convert_error(e)))
                    }
                }
            }
        });

        Ok(Box::pin(converted))
    }
}
