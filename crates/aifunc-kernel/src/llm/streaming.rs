//! Events delivered to callers of a streaming function call

use super::types::{FinishReason, LLMError};

/// One item of a token stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Incremental text, in arrival order
    Token(String),
    /// Terminal event; nothing follows it
    Done { finish_reason: Option<FinishReason> },
}

impl StreamEvent {
    pub fn token(text: impl Into<String>) -> Self {
        Self::Token(text.into())
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done { .. })
    }

    pub fn as_token(&self) -> Option<&str> {
        match self {
            Self::Token(t) => Some(t),
            Self::Done { .. } => None,
        }
    }
}

/// Item type of a token stream
pub type StreamItem = Result<StreamEvent, LLMError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_predicates() {
        let t = StreamEvent::token("he");
        assert_eq!(t.as_token(), Some("he"));
        assert!(!t.is_done());

        let d = StreamEvent::Done {
            finish_reason: Some(FinishReason::Stop),
        };
        assert!(d.is_done());
        assert!(d.as_token().is_none());
    }
}
