//! Engine error taxonomy. Errors are values throughout the core; only the
//! gateway maps them to HTTP statuses.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Per-field validation message, surfaced verbatim in the response envelope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    /// Client input violates shape/length/enum constraints.
    #[error("validation failed: {}", format_fields(.0))]
    Validation(Vec<FieldError>),
    /// Bearer token absent.
    #[error("authentication required")]
    AuthMissing,
    /// Bearer token rejected.
    #[error("authentication token rejected")]
    AuthInvalid,
    /// Session token unknown.
    #[error("invalid session token")]
    SessionInvalid,
    /// Session exists but the attempt is no longer in progress.
    #[error("assessment is not in progress")]
    SessionNotInProgress,
    /// Time budget plus grace exhausted; the attempt was force-submitted.
    #[error("assessment time has expired")]
    SessionExpired,
    #[error("{0} not found")]
    NotFound(String),
    /// Cross-tenant access attempt.
    #[error("access denied: {0}")]
    Forbidden(String),
    /// Duplicate submission, unique-index race, or config write after start.
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("language model unavailable: {0}")]
    LlmUnavailable(String),
    #[error("language model returned unusable JSON: {0}")]
    LlmBadJson(String),
    #[error("language model rate limit exhausted")]
    LlmRateLimited,
    #[error("code sandbox unavailable: {0}")]
    SandboxUnavailable(String),
    #[error("code sandbox timed out")]
    SandboxTimeout,
    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),
    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}

impl EngineError {
    /// Single-field validation error.
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation(vec![FieldError::new(field, message)])
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn conflict(what: impl Into<String>) -> Self {
        Self::Conflict(what.into())
    }

    /// True for failures a client may retry without changing the request
    /// (infrastructure-side LLM/sandbox/storage trouble).
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::LlmUnavailable(_)
                | Self::LlmRateLimited
                | Self::SandboxUnavailable(_)
                | Self::SandboxTimeout
                | Self::Storage(_)
                | Self::Infrastructure(_)
        )
    }

    pub fn field_errors(&self) -> &[FieldError] {
        match self {
            Self::Validation(fields) => fields,
            _ => &[],
        }
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(e: serde_json::Error) -> Self {
        Self::Infrastructure(format!("serialization: {e}"))
    }
}

fn format_fields(fields: &[FieldError]) -> String {
    fields
        .iter()
        .map(|f| format!("{}: {}", f.field, f.message))
        .collect::<Vec<_>>()
        .join("; ")
}

pub type EngineResult<T> = Result<T, EngineError>;
