//! Integration test: LLM gateway retry, rate-limit, and JSON-reformat
//! behavior against scripted transports.
//!
//! ## Scenarios
//! 1. Transient failures retry with backoff and eventually succeed.
//! 2. Rate limits honor the provider's retry hint and surface
//!    `LlmRateLimited` once attempts are exhausted.
//! 3. Noisy JSON output triggers a bounded reformat; the budget caps total
//!    calls and exhausting it yields `LlmBadJson`.
//! 4. Token accounting estimates chars/4 when the provider reports nothing.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::sync::Arc;
use std::time::Duration;
use vetta_core::{
    EngineError, LlmClient, LlmGateway, LlmRequest, LlmResponse, ProviderError,
};

/// Pops one scripted step per call.
struct ScriptedLlm {
    script: Mutex<VecDeque<Step>>,
    calls: AtomicU32,
}

enum Step {
    Ok(&'static str),
    RateLimited(Option<Duration>),
    Overloaded,
    Unavailable,
}

impl ScriptedLlm {
    fn new(steps: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(steps.into()),
            calls: AtomicU32::new(0),
        })
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn chat(&self, _request: &LlmRequest) -> Result<LlmResponse, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.script.lock().unwrap().pop_front() {
            Some(Step::Ok(content)) => Ok(LlmResponse {
                content: content.to_string(),
                prompt_tokens: None,
                completion_tokens: None,
            }),
            Some(Step::RateLimited(retry_after)) => {
                Err(ProviderError::RateLimited { retry_after })
            }
            Some(Step::Overloaded) => Err(ProviderError::Overloaded("503".to_string())),
            Some(Step::Unavailable) | None => {
                Err(ProviderError::Unavailable("boom".to_string()))
            }
        }
    }
}

#[tokio::test(start_paused = true)]
async fn transient_failures_retry_then_succeed() {
    let client = ScriptedLlm::new(vec![Step::Unavailable, Step::Overloaded, Step::Ok("fine")]);
    let gateway = LlmGateway::new(client.clone(), "test-model");
    let (content, usage) = gateway.complete(&LlmRequest::new("hello")).await.unwrap();
    assert_eq!(content, "fine");
    assert_eq!(client.calls(), 3);
    assert!(usage.estimated);
}

#[tokio::test(start_paused = true)]
async fn exhausted_rate_limits_surface_as_rate_limited() {
    let client = ScriptedLlm::new(vec![
        Step::RateLimited(Some(Duration::from_secs(2))),
        Step::RateLimited(None),
        Step::RateLimited(None),
    ]);
    let gateway = LlmGateway::new(client.clone(), "test-model");
    let err = gateway.complete(&LlmRequest::new("hello")).await.unwrap_err();
    assert!(matches!(err, EngineError::LlmRateLimited));
    assert_eq!(client.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn exhausted_transient_failures_surface_as_unavailable() {
    let client = ScriptedLlm::new(vec![Step::Unavailable, Step::Unavailable, Step::Unavailable]);
    let gateway = LlmGateway::new(client.clone(), "test-model");
    let err = gateway.complete(&LlmRequest::new("hello")).await.unwrap_err();
    assert!(matches!(err, EngineError::LlmUnavailable(_)));
}

#[tokio::test(start_paused = true)]
async fn noisy_json_is_reformatted_within_budget() {
    let client = ScriptedLlm::new(vec![
        Step::Ok("Sure thing! The answer is 42, as JSON-ish text."),
        Step::Ok("```json\n{\"answer\": 42}\n```"),
    ]);
    let gateway = LlmGateway::new(client.clone(), "test-model");
    let value = gateway
        .complete_json(&LlmRequest::new("give me json"), r#"{"answer": 0}"#)
        .await
        .unwrap();
    assert_eq!(value["answer"], 42);
    assert_eq!(client.calls(), 2, "one original + one reformat");
}

#[tokio::test(start_paused = true)]
async fn reformat_budget_exhaustion_yields_bad_json() {
    let client = ScriptedLlm::new(vec![
        Step::Ok("no json here"),
        Step::Ok("still no json"),
        Step::Ok("words, only words"),
        Step::Ok("{\"never\": \"reached\"}"),
    ]);
    let gateway = LlmGateway::new(client.clone(), "test-model");
    let err = gateway
        .complete_json(&LlmRequest::new("give me json"), r#"{"answer": 0}"#)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::LlmBadJson(_)));
    assert_eq!(client.calls(), 3, "total call budget caps the loop");
}

#[tokio::test(start_paused = true)]
async fn usage_accounting_estimates_when_counts_are_absent() {
    let client = ScriptedLlm::new(vec![Step::Ok("abcdefgh")]);
    let gateway = LlmGateway::new(client, "test-model");
    let prompt = "x".repeat(400);
    let (_, usage) = gateway.complete(&LlmRequest::new(prompt)).await.unwrap();
    assert_eq!(usage.prompt_tokens, 100);
    assert_eq!(usage.completion_tokens, 2);
    let (calls, prompt_total, _, cost) = gateway.usage.snapshot();
    assert_eq!(calls, 1);
    assert_eq!(prompt_total, 100);
    assert!(cost > 0.0);
}
