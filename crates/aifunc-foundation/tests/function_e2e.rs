//! End-to-end tests of [`AiFunction`] against [`MockLLMProvider`].
//!
//! ```bash
//! cargo test -p aifunc-foundation --test function_e2e
//! ```

mod common;

use std::sync::Arc;

use common::mock_provider::MockLLMProvider;
use futures::StreamExt;
use serde_json::json;

use aifunc_foundation::llm::{BackoffStrategy, StreamEvent};
use aifunc_foundation::{AiFunction, AiFunctionOptions, ErrorKind, RepairStage};
use aifunc_kernel::llm::{LLMError, Role};

fn client(mock: &Arc<MockLLMProvider>) -> AiFunction {
    AiFunction::with_provider(mock.clone()).with_backoff(BackoffStrategy::Fixed { delay_ms: 0 })
}

fn capital_of() -> AiFunctionOptions {
    AiFunctionOptions::new("Return the capital of the given country.")
        .function_name("capital_of")
        .args(json!(["Italy"]))
        .returns(json!({"type": "string"}))
        .current_date_time("2024-05-01T12:00:00Z")
}

// ─────────────────────────────────────────────────────────────────────────────
// § 1  Resolution
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn scalar_return_through_the_carrier() {
    let mock = Arc::new(
        MockLLMProvider::builder()
            .respond_with(r#"{"returnData": "Rome"}"#)
            .build(),
    );

    let outcome = client(&mock).call_traced(capital_of()).await.unwrap();

    assert_eq!(outcome.value, json!("Rome"));
    assert_eq!(outcome.invocation.resolved_stage, Some(RepairStage::DirectParse));
    assert_eq!(outcome.invocation.function_name, "capital_of");
    assert_eq!(outcome.invocation.model, "gpt-3.5-turbo");
    assert_eq!(outcome.invocation.raw_text, r#"{"returnData": "Rome"}"#);

    let request = mock.last_chat_request().unwrap();
    assert_eq!(request.messages[0].role, Role::System);
    assert!(request.messages[0].content.contains("Current time: 2024-05-01T12:00:00Z"));
    assert!(request.messages[0].content.contains("def capital_of(a: str) -> str:"));
    assert!(request.messages[0].content.contains("returnData"));
    assert_eq!(request.messages[1].content, r#"a="Italy""#);
    assert_eq!(request.temperature, Some(0.8));
}

#[tokio::test]
async fn python_flavoured_object_is_repaired_locally() {
    let mock = Arc::new(
        MockLLMProvider::builder()
            .respond_with("Sure!\n```python\n{'peoples': [{'name': 'Ann', 'age': 30, 'admin': True},]}\n```")
            .build(),
    );
    let options = AiFunctionOptions::new("Extract people from the text.")
        .args(json!({"text": "Ann is 30 and an admin."}))
        .returns(json!({
            "peoples": {
                "type": "array",
                "items": {
                    "name": {"type": "string"},
                    "age": {"type": "number"},
                    "admin": {"type": "boolean"}
                }
            }
        }));

    let outcome = client(&mock).call_traced(options).await.unwrap();

    assert_eq!(
        outcome.value,
        json!({"peoples": [{"name": "Ann", "age": 30, "admin": true}]})
    );
    assert_eq!(outcome.invocation.resolved_stage, Some(RepairStage::HeuristicRepair));
    assert_eq!(mock.chat_call_count(), 1);
}

#[tokio::test]
async fn model_repair_is_a_second_request_at_temperature_zero() {
    let mock = Arc::new(
        MockLLMProvider::builder()
            .respond_with("The capital is Rome")
            .respond_with(r#"{"returnData": "Rome"}"#)
            .build(),
    );

    let outcome = client(&mock).call_traced(capital_of()).await.unwrap();

    assert_eq!(outcome.value, json!("Rome"));
    assert_eq!(outcome.invocation.resolved_stage, Some(RepairStage::ModelRepair));
    let calls = mock.chat_calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[1].temperature, Some(0.0));
    assert_eq!(calls[1].messages[1].content, "The capital is Rome");
}

#[tokio::test]
async fn exhausted_pipeline_is_unrecoverable() {
    let mock = Arc::new(
        MockLLMProvider::builder()
            .respond_with("???not json???")
            .respond_with("still not json")
            .build(),
    );

    let err = client(&mock).call(capital_of()).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::UnrecoverableFormat);
    assert_eq!(err.raw_text(), Some("???not json???"));
    let stages = err.trace().unwrap().stages();
    assert_eq!(stages.first(), Some(&RepairStage::StripFencing));
    assert!(stages.contains(&RepairStage::ModelRepair));
}

#[tokio::test]
async fn raw_text_is_returned_when_conversion_is_off() {
    let mock = Arc::new(MockLLMProvider::builder().respond_with("Rome, of course").build());

    let value = client(&mock)
        .call(capital_of().auto_convert_return(false))
        .await
        .unwrap();

    assert_eq!(value, json!("Rome, of course"));
}

// ─────────────────────────────────────────────────────────────────────────────
// § 2  Retries and invocation failures
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn transient_failure_is_retried() {
    let mock = Arc::new(
        MockLLMProvider::builder()
            .respond_with_error(LLMError::NetworkError("connection reset".into()))
            .respond_with(r#"{"returnData": "Rome"}"#)
            .build(),
    );

    let value = client(&mock).call(capital_of().retries(1)).await.unwrap();

    assert_eq!(value, json!("Rome"));
    assert_eq!(mock.chat_call_count(), 2);
}

#[tokio::test]
async fn last_error_surfaces_after_retries() {
    let mock = Arc::new(
        MockLLMProvider::builder()
            .respond_with_error(LLMError::NetworkError("first".into()))
            .respond_with_error(LLMError::RateLimited("second".into()))
            .respond_with_error(LLMError::NetworkError("third".into()))
            .build(),
    );

    let err = client(&mock).call(capital_of().retries(2)).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Invocation);
    assert!(err.to_string().contains("third"));
    assert_eq!(mock.chat_call_count(), 3);
}

#[tokio::test]
async fn auth_failure_is_not_retried() {
    let mock = Arc::new(
        MockLLMProvider::builder()
            .respond_with_error(LLMError::AuthError("bad key".into()))
            .build(),
    );

    let err = client(&mock).call(capital_of().retries(3)).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Invocation);
    assert_eq!(mock.chat_call_count(), 1);
}

#[tokio::test]
async fn empty_choices_is_an_invocation_error() {
    let mock = Arc::new(MockLLMProvider::builder().respond_empty().build());

    let err = client(&mock).call(capital_of().retries(2)).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Invocation);
    assert_eq!(mock.chat_call_count(), 1);
}

// ─────────────────────────────────────────────────────────────────────────────
// § 3  Streaming
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn internal_stream_is_buffered_then_resolved() {
    let mock = Arc::new(
        MockLLMProvider::builder()
            .stream_with_tokens(vec!["{\"return", "Data\": ", "42}"])
            .build(),
    );
    let options = AiFunctionOptions::new("Answer the question.")
        .args(json!("What is six times seven?"))
        .returns(json!({"type": "number"}))
        .use_internal_stream(true);

    let value = client(&mock).call(options).await.unwrap();

    assert_eq!(value, json!(42));
    assert_eq!(mock.stream_call_count(), 1);
    assert_eq!(mock.chat_call_count(), 0);
    assert_eq!(mock.stream_calls()[0].stream, Some(true));
}

#[tokio::test]
async fn internal_stream_dropped_midway_is_reopened() {
    let mock = Arc::new(
        MockLLMProvider::builder()
            .stream_failing_after(vec!["{\"return"], LLMError::NetworkError("reset".into()))
            .stream_with_tokens(vec!["{\"return", "Data\": ", "\"Rome\"}"])
            .build(),
    );

    let outcome = client(&mock)
        .call_traced(capital_of().use_internal_stream(true).retries(2))
        .await
        .unwrap();

    assert_eq!(outcome.value, json!("Rome"));
    assert_eq!(outcome.invocation.raw_text, r#"{"returnData": "Rome"}"#);
    assert_eq!(mock.stream_call_count(), 2);
}

#[tokio::test]
async fn internal_stream_failure_surfaces_without_retries() {
    let mock = Arc::new(
        MockLLMProvider::builder()
            .stream_failing_after(vec!["{"], LLMError::NetworkError("reset".into()))
            .build(),
    );

    let err = client(&mock)
        .call(capital_of().use_internal_stream(true))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Invocation);
    assert!(err.to_string().contains("reset"));
    assert_eq!(mock.stream_call_count(), 1);
}

#[tokio::test]
async fn stream_yields_tokens_then_done() {
    let mock = Arc::new(
        MockLLMProvider::builder()
            .stream_with_tokens(vec!["Ro", "me"])
            .build(),
    );

    let events: Vec<StreamEvent> = client(&mock)
        .stream(capital_of())
        .await
        .unwrap()
        .map(|item| item.unwrap())
        .collect()
        .await;

    assert_eq!(events.len(), 3);
    assert_eq!(events[0], StreamEvent::token("Ro"));
    assert_eq!(events[1], StreamEvent::token("me"));
    assert!(events[2].is_done());

    let prompt = &mock.stream_calls()[0].messages[0].content;
    assert!(prompt.contains("without surrounding quotes"));
    assert!(!prompt.contains("returnData"));
}

#[tokio::test]
async fn stream_error_is_delivered_to_the_consumer() {
    let mock = Arc::new(
        MockLLMProvider::builder()
            .stream_failing_after(vec!["Ro"], LLMError::NetworkError("dropped".into()))
            .build(),
    );

    let mut tokens = client(&mock).stream(capital_of()).await.unwrap();

    assert_eq!(tokens.next().await.unwrap().unwrap(), StreamEvent::token("Ro"));
    assert!(tokens.next().await.unwrap().is_err());
    assert!(tokens.next().await.is_none());
}

#[tokio::test]
async fn streaming_unsupported_is_an_invocation_error() {
    let mock = Arc::new(MockLLMProvider::builder().with_streaming(false).build());

    let err = client(&mock).stream(capital_of()).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Invocation);
}

// ─────────────────────────────────────────────────────────────────────────────
// § 4  Concurrency
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn clones_share_the_provider() {
    let mock = Arc::new(
        MockLLMProvider::builder()
            .respond_with(r#"{"returnData": "Rome"}"#)
            .respond_with(r#"{"returnData": "Rome"}"#)
            .build(),
    );
    let first = client(&mock);
    let second = first.clone();

    let (a, b) = tokio::join!(first.call(capital_of()), second.call(capital_of()));

    assert_eq!(a.unwrap(), json!("Rome"));
    assert_eq!(b.unwrap(), json!("Rome"));
    assert_eq!(mock.chat_call_count(), 2);
}
