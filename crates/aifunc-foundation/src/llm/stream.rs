//! Cancellable token stream
//!
//! A producer task drains the provider's chunk stream and forwards text
//! deltas through a bounded channel. The consumer side is a plain
//! [`Stream`] of [`StreamEvent`]s ending with a single `Done`. Cancelling or
//! dropping the [`TokenStream`] stops the producer.

use aifunc_kernel::llm::{ChatStream, LLMResult, StreamEvent, StreamItem};
use futures::{Stream, StreamExt};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug};

const CHANNEL_CAPACITY: usize = 64;

#[derive(Debug)]
pub struct TokenStream {
    inner: ReceiverStream<StreamItem>,
    cancel: CancellationToken,
}

impl TokenStream {
    /// Spawn the producer task for `source`. Must be called inside a tokio runtime.
    pub fn spawn(source: ChatStream) -> Self {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let stream_span = tracing::info_span!("aifunc.token_stream");
        tokio::spawn(
            async move {
                let mut source = source;
                let mut finish_reason = None;

                loop {
                    let next = tokio::select! {
                        _ = token.cancelled() => {
                            debug!("token stream cancelled");
                            return;
                        }
                        next = source.next() => next,
                    };

                    let item = match next {
                        Some(Ok(chunk)) => {
                            if let Some(reason) = chunk.finish_reason() {
                                finish_reason = Some(reason.clone());
                            }
                            match chunk.delta_content() {
                                Some(text) if !text.is_empty() => {
                                    Ok(StreamEvent::Token(text.to_string()))
                                }
                                _ => continue,
                            }
                        }
                        Some(Err(e)) => Err(e),
                        None => break,
                    };

                    let failed = item.is_err();
                    tokio::select! {
                        _ = token.cancelled() => return,
                        sent = tx.send(item) => {
                            if sent.is_err() || failed {
                                return;
                            }
                        }
                    }
                }

                tokio::select! {
                    _ = token.cancelled() => {}
                    _ = tx.send(Ok(StreamEvent::Done { finish_reason })) => {}
                }
            }
            .instrument(stream_span),
        );

        Self {
            inner: ReceiverStream::new(rx),
            cancel,
        }
    }

    /// Stop the producer. Events already buffered may still be delivered.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Drain the stream and concatenate every token.
    pub async fn collect_text(mut self) -> LLMResult<String> {
        let mut text = String::new();
        while let Some(item) = self.next().await {
            match item? {
                StreamEvent::Token(t) => text.push_str(&t),
                StreamEvent::Done { .. } => break,
            }
        }
        Ok(text)
    }
}

impl Stream for TokenStream {
    type Item = StreamItem;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.get_mut().inner).poll_next(cx)
    }
}

impl Drop for TokenStream {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
