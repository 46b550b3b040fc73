//! Route handlers. Thin adapters only: parse the request, call the core,
//! wrap the result in the envelope.
//!
//! Authentication is external: an upstream proxy validates the recruiter's
//! bearer token and injects `x-user-id` / `x-company-id`. Candidate session
//! calls authenticate with the `x-session-token` header (or a
//! `sessionToken` body field) inside the core.

pub mod admin;
pub mod candidate;
pub mod code;
pub mod jd;
pub mod session;

use axum::http::HeaderMap;
use vetta_core::{EngineError, EngineResult};

pub const SESSION_TOKEN_HEADER: &str = "x-session-token";
const USER_ID_HEADER: &str = "x-user-id";
const COMPANY_ID_HEADER: &str = "x-company-id";

/// Recruiter identity injected by the upstream auth layer.
pub struct Recruiter {
    pub user_id: String,
    pub company_id: String,
}

pub fn recruiter_from(headers: &HeaderMap) -> EngineResult<Recruiter> {
    let user_id = header(headers, USER_ID_HEADER).ok_or(EngineError::AuthMissing)?;
    let company_id = header(headers, COMPANY_ID_HEADER).ok_or(EngineError::AuthMissing)?;
    Ok(Recruiter {
        user_id,
        company_id,
    })
}

/// Session token from the header, falling back to a body field.
pub fn session_token_from(headers: &HeaderMap, body_token: Option<&str>) -> EngineResult<String> {
    header(headers, SESSION_TOKEN_HEADER)
        .or_else(|| body_token.map(str::to_string))
        .filter(|t| !t.is_empty())
        .ok_or(EngineError::SessionInvalid)
}

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Cross-tenant guard: the JD must belong to the caller's company.
pub fn check_ownership(jd: &vetta_core::JobDescription, recruiter: &Recruiter) -> EngineResult<()> {
    if jd.company_id != recruiter.company_id {
        return Err(EngineError::Forbidden(
            "job description belongs to another company".to_string(),
        ));
    }
    Ok(())
}
