//! Mock LLM provider for the `aifunc-foundation` integration tests.
//!
//! [`MockLLMProvider`] implements [`aifunc_kernel::llm::LLMProvider`]. Replies
//! are queued at build time and consumed in FIFO order; every request is
//! recorded so tests can assert on the prompt, the model and the sampling
//! parameters that reached the provider.
//!
//! ```rust,ignore
//! let mock = Arc::new(
//!     MockLLMProvider::builder()
//!         .respond_with(r#"{"returnData": "Rome"}"#)
//!         .build(),
//! );
//! let client = AiFunction::with_provider(mock.clone());
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::stream;

use aifunc_kernel::llm::{
    ChatCompletionChunk, ChatCompletionRequest, ChatCompletionResponse, ChatMessage, ChatStream,
    Choice, ChunkChoice, ChunkDelta, FinishReason, LLMError, LLMProvider, LLMResult,
};

// ─────────────────────────────────────────────────────────────────────────────
// Internal mutable state
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct MockState {
    chat_calls: Vec<ChatCompletionRequest>,
    stream_calls: Vec<ChatCompletionRequest>,
    /// Returned by `chat`; an exhausted queue answers with an error
    chat_responses: VecDeque<LLMResult<ChatCompletionResponse>>,
    /// One entry per `chat_stream` call
    stream_sequences: VecDeque<Vec<LLMResult<ChatCompletionChunk>>>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Public type
// ─────────────────────────────────────────────────────────────────────────────

/// Deterministic in-process [`LLMProvider`].
pub struct MockLLMProvider {
    name: String,
    supports_streaming: bool,
    state: Arc<Mutex<MockState>>,
}

impl MockLLMProvider {
    pub fn builder() -> MockLLMProviderBuilder {
        MockLLMProviderBuilder::default()
    }

    pub fn chat_call_count(&self) -> usize {
        self.state.lock().expect("mock state mutex poisoned").chat_calls.len()
    }

    /// Every request passed to `chat`, in call order.
    pub fn chat_calls(&self) -> Vec<ChatCompletionRequest> {
        self.state.lock().expect("mock state mutex poisoned").chat_calls.clone()
    }

    pub fn last_chat_request(&self) -> Option<ChatCompletionRequest> {
        self.state
            .lock()
            .expect("mock state mutex poisoned")
            .chat_calls
            .last()
            .cloned()
    }

    pub fn stream_call_count(&self) -> usize {
        self.state.lock().expect("mock state mutex poisoned").stream_calls.len()
    }

    pub fn stream_calls(&self) -> Vec<ChatCompletionRequest> {
        self.state.lock().expect("mock state mutex poisoned").stream_calls.clone()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// LLMProvider implementation
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl LLMProvider for MockLLMProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn default_model(&self) -> &str {
        "mock-model"
    }

    fn supports_streaming(&self) -> bool {
        self.supports_streaming
    }

    async fn chat(&self, request: ChatCompletionRequest) -> LLMResult<ChatCompletionResponse> {
        let mut state = self.state.lock().expect("mock state mutex poisoned");
        state.chat_calls.push(request);
        state
            .chat_responses
            .pop_front()
            .unwrap_or_else(|| Err(LLMError::Other("mock response queue is empty".into())))
    }

    async fn chat_stream(&self, request: ChatCompletionRequest) -> LLMResult<ChatStream> {
        if !self.supports_streaming {
            return Err(LLMError::ProviderNotSupported(format!(
                "Provider \"{}\" does not support streaming",
                self.name
            )));
        }

        let chunks = {
            let mut state = self.state.lock().expect("mock state mutex poisoned");
            state.stream_calls.push(request);
            state
                .stream_sequences
                .pop_front()
                .unwrap_or_else(|| build_stream_sequence(vec!["mock"]))
        };

        Ok(Box::pin(stream::iter(chunks)))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Builder
// ─────────────────────────────────────────────────────────────────────────────

pub struct MockLLMProviderBuilder {
    name: String,
    supports_streaming: bool,
    state: MockState,
}

impl Default for MockLLMProviderBuilder {
    fn default() -> Self {
        Self {
            name: "mock-provider".to_string(),
            supports_streaming: true,
            state: MockState::default(),
        }
    }
}

impl MockLLMProviderBuilder {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_streaming(mut self, enabled: bool) -> Self {
        self.supports_streaming = enabled;
        self
    }

    /// Enqueue a completion whose text is `content`.
    pub fn respond_with(mut self, content: impl Into<String>) -> Self {
        self.state
            .chat_responses
            .push_back(Ok(make_chat_response(content.into())));
        self
    }

    /// Enqueue a completion with no choices at all.
    pub fn respond_empty(mut self) -> Self {
        self.state.chat_responses.push_back(Ok(ChatCompletionResponse {
            id: "mock-empty".to_string(),
            model: "mock-model".to_string(),
            choices: Vec::new(),
            usage: None,
        }));
        self
    }

    pub fn respond_with_error(mut self, error: LLMError) -> Self {
        self.state.chat_responses.push_back(Err(error));
        self
    }

    /// Enqueue one stream: a chunk per token, then a `Stop` chunk.
    pub fn stream_with_tokens(mut self, tokens: Vec<impl Into<String>>) -> Self {
        self.state
            .stream_sequences
            .push_back(build_stream_sequence(tokens));
        self
    }

    /// Enqueue a stream that opens fine and fails after `tokens`.
    pub fn stream_failing_after(mut self, tokens: Vec<impl Into<String>>, error: LLMError) -> Self {
        let mut sequence: Vec<_> = tokens.into_iter().map(|t| Ok(token_chunk(t.into()))).collect();
        sequence.push(Err(error));
        self.state.stream_sequences.push_back(sequence);
        self
    }

    pub fn build(self) -> MockLLMProvider {
        MockLLMProvider {
            name: self.name,
            supports_streaming: self.supports_streaming,
            state: Arc::new(Mutex::new(self.state)),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Private helpers
// ─────────────────────────────────────────────────────────────────────────────

fn make_chat_response(content: String) -> ChatCompletionResponse {
    ChatCompletionResponse {
        id: "mock-completion".to_string(),
        model: "mock-model".to_string(),
        choices: vec![Choice {
            index: 0,
            message: ChatMessage::assistant(content),
            finish_reason: Some(FinishReason::Stop),
        }],
        usage: None,
    }
}

fn token_chunk(token: String) -> ChatCompletionChunk {
    ChatCompletionChunk {
        id: "mock-chunk".to_string(),
        model: "mock-model".to_string(),
        choices: vec![ChunkChoice {
            index: 0,
            delta: ChunkDelta {
                role: None,
                content: Some(token),
            },
            finish_reason: None,
        }],
        usage: None,
    }
}

fn build_stream_sequence<S: Into<String>>(tokens: Vec<S>) -> Vec<LLMResult<ChatCompletionChunk>> {
    let mut sequence: Vec<LLMResult<ChatCompletionChunk>> = tokens
        .into_iter()
        .map(|token| Ok(token_chunk(token.into())))
        .collect();

    sequence.push(Ok(ChatCompletionChunk {
        id: "mock-chunk".to_string(),
        model: "mock-model".to_string(),
        choices: vec![ChunkChoice {
            index: 0,
            delta: ChunkDelta::default(),
            finish_reason: Some(FinishReason::Stop),
        }],
        usage: None,
    }));

    sequence
}
