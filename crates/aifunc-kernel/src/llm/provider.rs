use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

use super::types::*;

/// Streaming response type
pub type ChatStream = Pin<Box<dyn Stream<Item = LLMResult<ChatCompletionChunk>> + Send>>;

/// Model invocation contract. Implementations own transport, credentials and
/// timeouts; callers only see requests, responses and [`LLMError`].
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Provider name
    fn name(&self) -> &str;

    /// Default model
    fn default_model(&self) -> &str {
        ""
    }

    /// Supports streaming?
    fn supports_streaming(&self) -> bool {
        true
    }

    /// Chat request
    async fn chat(&self, request: ChatCompletionRequest) -> LLMResult<ChatCompletionResponse>;

    /// Streaming chat (default: not supported)
    async fn chat_stream(&self, _request: ChatCompletionRequest) -> LLMResult<ChatStream> {
        Err(LLMError::ProviderNotSupported(format!(
            "Provider {} does not support streaming",
            self.name()
        )))
    }
}
