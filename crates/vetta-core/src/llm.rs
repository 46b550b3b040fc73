//! Language-model gateway: uniform prompt -> structured-JSON calls against
//! an OpenAI-compatible chat-completions endpoint.
//!
//! All outbound LLM traffic flows through `LlmGateway`, the only place where
//! provider quotas, retries, and token accounting live. The transport is an
//! `LlmClient` trait so tests script responses and count calls.
//!
//! JSON mode strips markdown fences, extracts the first balanced JSON value
//! by brace-depth tracking (string- and escape-aware), and on parse failure
//! issues a bounded *reformat* call carrying the noisy output plus a schema
//! example. The total call budget caps the procedure so it can never loop.

use crate::config::LlmConfig;
use crate::error::{EngineError, EngineResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Default retry attempts per logical call.
const DEFAULT_MAX_ATTEMPTS: u32 = 3;
/// Total calls (initial + reformats) allowed in JSON mode.
const DEFAULT_REFORMAT_BUDGET: u32 = 3;
const BACKOFF_BASE: Duration = Duration::from_secs(1);
const BACKOFF_FACTOR: u32 = 2;

/// Cost table: (model prefix, $ per 1M prompt tokens, $ per 1M completion
/// tokens). First prefix match wins; unknown models use the fallback row.
const MODEL_RATES: &[(&str, f64, f64)] = &[
    ("meta-llama/llama-3.3-70b-instruct", 0.12, 0.30),
    ("anthropic/claude-3.5-sonnet", 3.00, 15.00),
    ("openai/gpt-4o", 2.50, 10.00),
    ("openai/gpt-4o-mini", 0.15, 0.60),
];
const FALLBACK_RATE: (f64, f64) = (0.50, 1.50);

#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub system: Option<String>,
    pub prompt: String,
    /// Overrides the gateway's default model.
    pub model: Option<String>,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

impl LlmRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            system: None,
            prompt: prompt.into(),
            model: None,
            temperature: 0.2,
            max_tokens: None,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct LlmResponse {
    pub content: String,
    /// Exact counts when the provider reports them.
    pub prompt_tokens: Option<u64>,
    pub completion_tokens: Option<u64>,
}

/// Transport-level failure, before the gateway's retry policy is applied.
#[derive(Debug)]
pub enum ProviderError {
    /// 429 with an optional `Retry-After` hint.
    RateLimited { retry_after: Option<Duration> },
    /// 503: provider briefly down; retried with backoff.
    Overloaded(String),
    /// Any other transport or provider failure.
    Unavailable(String),
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn chat(&self, request: &LlmRequest) -> Result<LlmResponse, ProviderError>;
}

// -- HTTP transport ---------------------------------------------------------

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Deserialize)]
struct ChatMessageResponse {
    content: String,
}

#[derive(Deserialize)]
struct ChatUsage {
    prompt_tokens: Option<u64>,
    completion_tokens: Option<u64>,
}

/// OpenAI-compatible chat client over reqwest.
pub struct HttpLlmClient {
    endpoint: String,
    api_key: Option<String>,
    default_model: String,
    client: reqwest::Client,
}

impl HttpLlmClient {
    pub fn new(config: &LlmConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            default_model: config.model.clone(),
            client,
        }
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn chat(&self, request: &LlmRequest) -> Result<LlmResponse, ProviderError> {
        let url = format!("{}/chat/completions", self.endpoint);
        let mut messages = Vec::new();
        if let Some(system) = &request.system {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: system.clone(),
            });
        }
        messages.push(ChatMessage {
            role: "user".to_string(),
            content: request.prompt.clone(),
        });
        let body = ChatRequest {
            model: request
                .model
                .clone()
                .unwrap_or_else(|| self.default_model.clone()),
            messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let mut builder = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.header("Authorization", format!("Bearer {key}"));
        }
        let response = builder
            .send()
            .await
            .map_err(|e| ProviderError::Unavailable(format!("request failed: {e}")))?;

        let status = response.status();
        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs);
            return Err(ProviderError::RateLimited { retry_after });
        }
        if status.as_u16() == 503 {
            return Err(ProviderError::Overloaded("provider overloaded".to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Unavailable(format!(
                "provider error {status}: {body}"
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Unavailable(format!("response parse failed: {e}")))?;
        let content = parsed
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .unwrap_or_default();
        let usage = parsed.usage;
        Ok(LlmResponse {
            content,
            prompt_tokens: usage.as_ref().and_then(|u| u.prompt_tokens),
            completion_tokens: usage.as_ref().and_then(|u| u.completion_tokens),
        })
    }
}

// -- Gateway -----------------------------------------------------------------

/// Per-call accounting, estimated at chars/4 when the provider does not
/// report exact counts.
#[derive(Debug, Clone, Default)]
pub struct CallUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub estimated: bool,
    /// US dollars.
    pub cost: f64,
}

#[derive(Debug, Default)]
pub struct UsageTotals {
    prompt_tokens: AtomicU64,
    completion_tokens: AtomicU64,
    calls: AtomicU64,
    /// Micro-dollars, to stay atomic.
    cost_micros: AtomicU64,
}

impl UsageTotals {
    pub fn snapshot(&self) -> (u64, u64, u64, f64) {
        (
            self.calls.load(Ordering::Relaxed),
            self.prompt_tokens.load(Ordering::Relaxed),
            self.completion_tokens.load(Ordering::Relaxed),
            self.cost_micros.load(Ordering::Relaxed) as f64 / 1_000_000.0,
        )
    }

    fn record(&self, usage: &CallUsage) {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.prompt_tokens
            .fetch_add(usage.prompt_tokens, Ordering::Relaxed);
        self.completion_tokens
            .fetch_add(usage.completion_tokens, Ordering::Relaxed);
        self.cost_micros
            .fetch_add((usage.cost * 1_000_000.0) as u64, Ordering::Relaxed);
    }
}

pub struct LlmGateway {
    client: Arc<dyn LlmClient>,
    default_model: String,
    max_attempts: u32,
    reformat_budget: u32,
    pub usage: UsageTotals,
}

impl LlmGateway {
    pub fn new(client: Arc<dyn LlmClient>, default_model: impl Into<String>) -> Self {
        Self {
            client,
            default_model: default_model.into(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            reformat_budget: DEFAULT_REFORMAT_BUDGET,
            usage: UsageTotals::default(),
        }
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn with_reformat_budget(mut self, budget: u32) -> Self {
        self.reformat_budget = budget.max(1);
        self
    }

    /// One logical completion with retry/backoff. Honors `Retry-After` on
    /// rate limits; 503s retry on the plain backoff schedule.
    pub async fn complete(&self, request: &LlmRequest) -> EngineResult<(String, CallUsage)> {
        let mut backoff = BACKOFF_BASE;
        let mut last_rate_limited = false;
        let mut last_error = String::new();

        for attempt in 1..=self.max_attempts {
            match self.client.chat(request).await {
                Ok(response) => {
                    let usage = self.account(request, &response);
                    return Ok((response.content, usage));
                }
                Err(ProviderError::RateLimited { retry_after }) => {
                    last_rate_limited = true;
                    last_error = "rate limited".to_string();
                    if attempt == self.max_attempts {
                        break;
                    }
                    let wait = retry_after.unwrap_or(backoff);
                    debug!(attempt, wait_ms = wait.as_millis() as u64, "llm rate limited, backing off");
                    tokio::time::sleep(wait).await;
                }
                Err(ProviderError::Overloaded(msg)) => {
                    last_rate_limited = false;
                    last_error = msg;
                    if attempt == self.max_attempts {
                        break;
                    }
                    debug!(attempt, wait_ms = backoff.as_millis() as u64, "llm overloaded, backing off");
                    tokio::time::sleep(backoff).await;
                }
                Err(ProviderError::Unavailable(msg)) => {
                    last_rate_limited = false;
                    last_error = msg;
                    if attempt == self.max_attempts {
                        break;
                    }
                    tokio::time::sleep(backoff).await;
                }
            }
            backoff *= BACKOFF_FACTOR;
        }

        if last_rate_limited {
            Err(EngineError::LlmRateLimited)
        } else {
            Err(EngineError::LlmUnavailable(last_error))
        }
    }

    /// JSON-mode completion: returns the first parseable JSON value from the
    /// model, reformatting noisy output within the total call budget.
    pub async fn complete_json(
        &self,
        request: &LlmRequest,
        schema_example: &str,
    ) -> EngineResult<serde_json::Value> {
        let mut calls_used = 0u32;
        let mut current = request.clone();
        let mut last_noise = String::new();

        while calls_used < self.reformat_budget {
            let (content, _) = self.complete(&current).await?;
            calls_used += 1;
            match extract_json(&content) {
                Some(value) => return Ok(value),
                None => {
                    warn!(calls_used, "llm returned unparseable JSON, requesting reformat");
                    last_noise = content;
                    current = LlmRequest::new(crate::prompts::reformat_prompt(
                        &last_noise,
                        schema_example,
                    ))
                    .with_temperature(0.0);
                    if let Some(model) = &request.model {
                        current.model = Some(model.clone());
                    }
                }
            }
        }

        Err(EngineError::LlmBadJson(format!(
            "no parseable JSON after {calls_used} calls; last output began: {}",
            last_noise.chars().take(120).collect::<String>()
        )))
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    fn account(&self, request: &LlmRequest, response: &LlmResponse) -> CallUsage {
        let estimated = response.prompt_tokens.is_none() || response.completion_tokens.is_none();
        let prompt_tokens = response.prompt_tokens.unwrap_or_else(|| {
            let chars = request.prompt.len() + request.system.as_deref().map_or(0, str::len);
            (chars / 4) as u64
        });
        let completion_tokens = response
            .completion_tokens
            .unwrap_or((response.content.len() / 4) as u64);
        let model = request.model.as_deref().unwrap_or(&self.default_model);
        let (prompt_rate, completion_rate) = MODEL_RATES
            .iter()
            .find(|(prefix, _, _)| model.starts_with(prefix))
            .map(|(_, p, c)| (*p, *c))
            .unwrap_or(FALLBACK_RATE);
        let cost = prompt_tokens as f64 / 1e6 * prompt_rate
            + completion_tokens as f64 / 1e6 * completion_rate;
        let usage = CallUsage {
            prompt_tokens,
            completion_tokens,
            estimated,
            cost,
        };
        self.usage.record(&usage);
        usage
    }
}

// -- JSON extraction ---------------------------------------------------------

/// Strips leading/trailing markdown code fences (``` or ```json).
pub fn strip_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (e.g. "json") up to the first newline.
    let rest = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Extracts the first balanced JSON object or array, tracking brace depth
/// while ignoring string interiors and escape sequences, then parses it.
pub fn extract_json(text: &str) -> Option<serde_json::Value> {
    let cleaned = strip_fences(text);
    if let Ok(value) = serde_json::from_str(cleaned) {
        return Some(value);
    }
    let candidate = first_balanced(cleaned)?;
    serde_json::from_str(candidate).ok()
}

fn first_balanced(text: &str) -> Option<&str> {
    let bytes = text.as_bytes();
    let start = bytes.iter().position(|&b| b == b'{' || b == b'[')?;
    let open = bytes[start];
    let close = if open == b'{' { b'}' } else { b']' };

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, &b) in bytes[start..].iter().enumerate() {
        if escaped {
            escaped = false;
            continue;
        }
        match b {
            b'\\' if in_string => escaped = true,
            b'"' => in_string = !in_string,
            _ if in_string => {}
            _ if b == open => depth += 1,
            _ if b == close => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}
