//! Process configuration, materialized once at startup from the environment.
//!
//! The gateway calls `dotenvy::dotenv()` before `CoreConfig::from_env`, so a
//! local `.env` works in development; nothing reads the environment after
//! startup.

use std::time::Duration;

const DEFAULT_DATA_DIR: &str = "./data/vetta";
const DEFAULT_LLM_ENDPOINT: &str = "https://openrouter.ai/api/v1";
const DEFAULT_LLM_MODEL: &str = "meta-llama/llama-3.3-70b-instruct";
const DEFAULT_SANDBOX_ENDPOINT: &str = "https://judge0-ce.p.rapidapi.com";
const DEFAULT_FRONTEND_BASE_URL: &str = "http://localhost:5173";

/// LLM provider settings (OpenAI-compatible chat-completions endpoint).
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub model: String,
    /// Per-call deadline.
    pub timeout: Duration,
}

/// Code-judge settings (submit-and-poll API).
#[derive(Debug, Clone)]
pub struct SandboxConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
}

/// SMTP settings; absent in development, where mail falls back to the log.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub username: String,
    pub password: String,
    pub from_address: String,
}

#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// Sled database directory.
    pub data_dir: String,
    pub llm: LlmConfig,
    pub sandbox: SandboxConfig,
    /// Used to compose outbound assessment URLs in candidate email.
    pub frontend_base_url: String,
    pub smtp: Option<SmtpConfig>,
}

impl CoreConfig {
    /// Reads configuration from the environment, with development defaults
    /// for everything except credentials.
    pub fn from_env() -> Self {
        let smtp = match (
            env("SMTP_HOST"),
            env("SMTP_USER"),
            env("SMTP_PASS"),
        ) {
            (Some(host), Some(username), Some(password)) => Some(SmtpConfig {
                from_address: env("SMTP_FROM").unwrap_or_else(|| username.clone()),
                host,
                username,
                password,
            }),
            _ => None,
        };

        Self {
            data_dir: env("VETTA_DATA_DIR").unwrap_or_else(|| DEFAULT_DATA_DIR.to_string()),
            llm: LlmConfig {
                endpoint: env("LLM_ENDPOINT").unwrap_or_else(|| DEFAULT_LLM_ENDPOINT.to_string()),
                api_key: env("LLM_API_KEY"),
                model: env("LLM_MODEL").unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string()),
                timeout: Duration::from_secs(60),
            },
            sandbox: SandboxConfig {
                endpoint: env("SANDBOX_ENDPOINT")
                    .unwrap_or_else(|| DEFAULT_SANDBOX_ENDPOINT.to_string()),
                api_key: env("SANDBOX_API_KEY"),
            },
            frontend_base_url: env("FRONTEND_BASE_URL")
                .unwrap_or_else(|| DEFAULT_FRONTEND_BASE_URL.to_string()),
            smtp,
        }
    }
}

fn env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
