//! LLM 模块
//! LLM Module
//!
//! ```text
//! AiFunction ──▶ RetryExecutor ──▶ dyn LLMProvider ──▶ OpenAIProvider
//!                     │
//!                     └──▶ TokenStream (streaming calls)
//! ```
//!
//! 提供者契约定义在 kernel 中，这里只放实现与调用策略
//! The provider contract lives in the kernel; this module holds the
//! implementation and the calling policy around it.

pub mod openai;
pub mod retry;
pub mod stream;

pub use aifunc_kernel::llm::*;
pub use openai::{OpenAIConfig, OpenAIProvider};
pub use retry::{BackoffStrategy, LLMRetryPolicy, RetryExecutor, RetryableErrorType};
pub use stream::TokenStream;
