//! Retry mechanism for LLM calls
//!
//! Wraps a provider so transient transport failures (network, timeout, rate
//! limit, 5xx) are retried with backoff. Intermediate failures are logged and
//! swallowed; the last one is surfaced.

use aifunc_kernel::llm::{
    ChatCompletionRequest, ChatCompletionResponse, ChatStream, LLMError, LLMProvider, LLMResult,
};
use super::stream::TokenStream;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;
use tracing::{debug, info, warn};

/// Backoff strategy for retry delays
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum BackoffStrategy {
    /// Fixed delay between retries
    Fixed { delay_ms: u64 },
    /// Linear backoff with increment
    Linear {
        initial_delay_ms: u64,
        increment_ms: u64,
    },
    /// Exponential backoff
    Exponential {
        initial_delay_ms: u64,
        max_delay_ms: u64,
    },
    /// Exponential backoff with jitter
    ExponentialWithJitter {
        initial_delay_ms: u64,
        max_delay_ms: u64,
        jitter_ms: u64,
    },
}

impl Default for BackoffStrategy {
    fn default() -> Self {
        Self::ExponentialWithJitter {
            initial_delay_ms: 1000,
            max_delay_ms: 30000,
            jitter_ms: 500,
        }
    }
}

impl BackoffStrategy {
    /// Delay before retry number `attempt` (0-indexed)
    pub fn delay(&self, attempt: u32) -> Duration {
        match self {
            Self::Fixed { delay_ms } => Duration::from_millis(*delay_ms),
            Self::Linear {
                initial_delay_ms,
                increment_ms,
            } => Duration::from_millis(
                initial_delay_ms.saturating_add(increment_ms.saturating_mul(u64::from(attempt))),
            ),
            Self::Exponential {
                initial_delay_ms,
                max_delay_ms,
            } => {
                let delay = initial_delay_ms.saturating_mul(2u64.pow(attempt.min(10)));
                Duration::from_millis(delay.min(*max_delay_ms))
            }
            Self::ExponentialWithJitter {
                initial_delay_ms,
                max_delay_ms,
                jitter_ms,
            } => {
                let base = initial_delay_ms.saturating_mul(2u64.pow(attempt.min(10)));
                let capped = base.min(*max_delay_ms);
                let jitter = if *jitter_ms > 0 {
                    use rand::Rng;
                    let mut rng = rand::thread_rng();
                    rng.gen_range(0..*jitter_ms) as i64 - (*jitter_ms as i64 / 2)
                } else {
                    0
                };
                Duration::from_millis((capped as i64 + jitter).max(0) as u64)
            }
        }
    }
}

/// Error classes that may trigger a retry
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum RetryableErrorType {
    /// Network errors and timeouts
    Network,
    RateLimit,
    /// 5xx responses
    ServerError,
}

impl RetryableErrorType {
    pub fn from_error(error: &LLMError) -> Option<Self> {
        match error {
            LLMError::NetworkError(_) | LLMError::Timeout(_) => Some(Self::Network),
            LLMError::RateLimited(_) => Some(Self::RateLimit),
            LLMError::ApiError {
                code: Some(code), ..
            } if code.starts_with('5') => Some(Self::ServerError),
            _ => None,
        }
    }
}

/// Retry policy for LLM calls
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMRetryPolicy {
    /// Maximum number of attempts, the first one included
    pub max_attempts: u32,
    pub backoff: BackoffStrategy,
    pub retry_on: Vec<RetryableErrorType>,
}

impl Default for LLMRetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            backoff: BackoffStrategy::default(),
            retry_on: vec![
                RetryableErrorType::Network,
                RetryableErrorType::RateLimit,
                RetryableErrorType::ServerError,
            ],
        }
    }
}

impl LLMRetryPolicy {
    /// Policy allowing `retries` additional attempts
    pub fn from_retries(retries: u32) -> Self {
        Self {
            max_attempts: retries.saturating_add(1),
            ..Default::default()
        }
    }

    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            backoff: BackoffStrategy::Fixed { delay_ms: 0 },
            retry_on: vec![],
        }
    }

    pub fn with_backoff(mut self, backoff: BackoffStrategy) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn should_retry_error(&self, error: &LLMError) -> bool {
        RetryableErrorType::from_error(error)
            .map(|t| self.retry_on.contains(&t))
            .unwrap_or(false)
    }
}

/// Retry executor for LLM calls
pub struct RetryExecutor {
    provider: Arc<dyn LLMProvider>,
    policy: LLMRetryPolicy,
}

impl RetryExecutor {
    pub fn new(provider: Arc<dyn LLMProvider>, policy: LLMRetryPolicy) -> Self {
        Self { provider, policy }
    }

    pub fn provider(&self) -> &Arc<dyn LLMProvider> {
        &self.provider
    }

    pub fn policy(&self) -> &LLMRetryPolicy {
        &self.policy
    }

    /// Chat completion with retry
    pub async fn chat(&self, request: ChatCompletionRequest) -> LLMResult<ChatCompletionResponse> {
        self.run("chat", || self.provider.chat(request.clone())).await
    }

    /// Chat completion reduced to the text of its first choice
    pub async fn chat_text(&self, request: ChatCompletionRequest) -> LLMResult<String> {
        let response = self.chat(request).await?;
        response
            .content()
            .map(str::to_string)
            .ok_or_else(|| LLMError::ApiError {
                code: None,
                message: "response contained no choices".to_string(),
            })
    }

    /// Open a streaming completion. Only opening the stream is retried.
    pub async fn chat_stream(&self, request: ChatCompletionRequest) -> LLMResult<ChatStream> {
        self.run("chat_stream", || self.provider.chat_stream(request.clone()))
            .await
    }

    /// Streaming completion collected into one string. A stream that fails
    /// midway is reopened from the start.
    pub async fn chat_stream_text(&self, request: ChatCompletionRequest) -> LLMResult<String> {
        self.run("chat_stream_text", || {
            let request = request.clone();
            async move {
                let chunks = self.provider.chat_stream(request).await?;
                TokenStream::spawn(chunks).collect_text().await
            }
        })
        .await
    }

    async fn run<T, F, Fut>(&self, operation: &'static str, mut op: F) -> LLMResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = LLMResult<T>>,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut failures = 0u32;

        for attempt in 0..max_attempts {
            let attempt_span = tracing::info_span!(
                "llm.retry_attempt",
                operation,
                provider = self.provider.name(),
                attempt,
                max_attempts
            );

            if attempt > 0 {
                let delay = self.policy.backoff.delay(attempt - 1);
                debug!(
                    "Retry attempt {}/{} after {}ms",
                    attempt + 1,
                    max_attempts,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).instrument(attempt_span.clone()).await;
            }

            match op().instrument(attempt_span).await {
                Ok(value) => {
                    if attempt > 0 {
                        info!("Request succeeded on attempt {}", attempt + 1);
                    }
                    return Ok(value);
                }
                Err(error) => {
                    if attempt < max_attempts - 1 && self.policy.should_retry_error(&error) {
                        warn!(
                            "Request failed (attempt {}): {}, retrying",
                            attempt + 1,
                            error
                        );
                        failures += 1;
                        continue;
                    }
                    if failures > 0 {
                        warn!(
                            "Request failed after {} attempts. Last error: {}",
                            attempt + 1,
                            error
                        );
                    }
                    return Err(error);
                }
            }
        }

        Err(LLMError::Other("Retry loop completed without result".into()))
    }
}
