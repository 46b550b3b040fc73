//! Uniform response envelope and error -> HTTP status mapping. The core
//! treats errors as values; this is the only place they become statuses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;
use vetta_core::{EngineError, FieldError};

#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<FieldError>>,
}

pub fn ok<T: Serialize>(data: T) -> Response {
    (
        StatusCode::OK,
        Json(Envelope {
            success: true,
            data: Some(data),
            error: None,
            errors: None,
        }),
    )
        .into_response()
}

/// Newtype so handlers can use `?` on `EngineResult`.
pub struct ApiError(pub EngineError);

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let e = self.0;
        let status = match &e {
            EngineError::Validation(_) => StatusCode::BAD_REQUEST,
            EngineError::AuthMissing
            | EngineError::AuthInvalid
            | EngineError::SessionInvalid
            | EngineError::SessionNotInProgress
            | EngineError::SessionExpired => StatusCode::UNAUTHORIZED,
            EngineError::Forbidden(_) => StatusCode::FORBIDDEN,
            EngineError::NotFound(_) => StatusCode::NOT_FOUND,
            EngineError::Conflict(_) => StatusCode::CONFLICT,
            EngineError::LlmRateLimited => StatusCode::SERVICE_UNAVAILABLE,
            EngineError::LlmUnavailable(_)
            | EngineError::LlmBadJson(_)
            | EngineError::SandboxUnavailable(_)
            | EngineError::SandboxTimeout => StatusCode::BAD_GATEWAY,
            EngineError::Storage(_) | EngineError::Infrastructure(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let fields = e.field_errors();
        let errors = if fields.is_empty() {
            None
        } else {
            Some(fields.to_vec())
        };
        let body = json!({
            "success": false,
            "error": e.to_string(),
            "errors": errors,
            "recoverable": e.is_recoverable(),
        });
        (status, Json(body)).into_response()
    }
}

pub type ApiResult = Result<Response, ApiError>;
