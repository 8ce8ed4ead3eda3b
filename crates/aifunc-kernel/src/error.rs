//! Crate-level error types for `aifunc-kernel`.
//!
//! [`AiFunctionError`] is the single error surfaced by a function call. It
//! composes the typed errors of the sub-modules (schema compilation, LLM
//! transport) and adds the two kinds that only exist at the call surface:
//! bad caller input and an exhausted repair pipeline.
//!
//! # Usage
//!
//! ```rust,ignore
//! use aifunc_kernel::error::{AiFunctionError, ErrorKind};
//!
//! match ai.call(options).await {
//!     Ok(value) => println!("{value}"),
//!     Err(err) if err.kind() == ErrorKind::UnrecoverableFormat => {
//!         eprintln!("model output: {}", err.raw_text().unwrap_or_default());
//!     }
//!     Err(err) => return Err(err.into()),
//! }
//! ```

use crate::llm::LLMError;
use crate::schema::SchemaError;
use crate::trace::RepairTrace;
use thiserror::Error;

/// Error taxonomy of a function call.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AiFunctionError {
    /// Bad caller input. Never retried.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Malformed declarative return schema. Never retried.
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Model transport failure, surfaced after the retry budget is spent.
    #[error("Invocation error: {0}")]
    Invocation(#[from] LLMError),

    /// Every repair stage was exhausted without a schema-conformant value.
    #[error("Unrecoverable format after {} repair attempts: {}", .trace.len(), preview(.raw))]
    UnrecoverableFormat {
        /// Raw model text as received.
        raw: String,
        /// Every stage that was attempted, in order.
        trace: RepairTrace,
    },
}

/// Discriminant of [`AiFunctionError`] for callers that branch on the taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Configuration,
    Schema,
    Invocation,
    UnrecoverableFormat,
}

impl AiFunctionError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::Schema(_) => ErrorKind::Schema,
            Self::Invocation(_) => ErrorKind::Invocation,
            Self::UnrecoverableFormat { .. } => ErrorKind::UnrecoverableFormat,
        }
    }

    /// Schema errors come from caller input too, so they count here.
    pub fn is_configuration(&self) -> bool {
        matches!(self.kind(), ErrorKind::Configuration | ErrorKind::Schema)
    }

    /// The offending model text, when the error carries one.
    pub fn raw_text(&self) -> Option<&str> {
        match self {
            Self::UnrecoverableFormat { raw, .. } => Some(raw),
            _ => None,
        }
    }

    pub fn trace(&self) -> Option<&RepairTrace> {
        match self {
            Self::UnrecoverableFormat { trace, .. } => Some(trace),
            _ => None,
        }
    }
}

fn preview(raw: &str) -> String {
    const LIMIT: usize = 200;
    if raw.chars().count() > LIMIT {
        format!("{}...", raw.chars().take(LIMIT).collect::<String>())
    } else {
        raw.to_string()
    }
}

/// Convenience result alias for the call surface.
pub type AiFunctionResult<T> = Result<T, AiFunctionError>;
