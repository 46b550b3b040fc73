//! Admin routes: candidate listings, proctoring review, decisions,
//! analytics, exports, audit log.

use super::{check_ownership, recruiter_from};
use crate::envelope::{ok, ApiResult};
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use vetta_core::{AdminDecision, EngineError};

pub async fn list_candidates(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(jd_id): Path<String>,
) -> ApiResult {
    let recruiter = recruiter_from(&headers)?;
    check_ownership(&state.jd.get(&jd_id)?, &recruiter)?;
    let rows = state.reports.candidates_json(&jd_id)?;
    Ok(ok(rows))
}

pub async fn get_candidate(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(ca_id): Path<String>,
) -> ApiResult {
    let recruiter = recruiter_from(&headers)?;
    let ca = state.onboarding.status(&ca_id)?;
    check_ownership(&state.jd.get(&ca.jd_id)?, &recruiter)?;
    let evaluation = state.evaluation.get(&ca_id)?;
    let events = state.proctoring.list_events(&ca_id)?;
    Ok(ok(serde_json::json!({
        "candidate": ca,
        "evaluation": evaluation,
        "proctoringEvents": events,
    })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewBody {
    pub notes: String,
    #[serde(default)]
    pub dismissed: bool,
    #[serde(default)]
    pub restore_integrity: bool,
}

pub async fn review_proctoring(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(event_id): Path<String>,
    Json(body): Json<ReviewBody>,
) -> ApiResult {
    let recruiter = recruiter_from(&headers)?;
    let event = state.proctoring.review_event(
        &event_id,
        &recruiter.user_id,
        &body.notes,
        body.dismissed,
        body.restore_integrity,
    )?;
    Ok(ok(event))
}

#[derive(Deserialize)]
pub struct DecisionBody {
    pub decision: AdminDecision,
}

pub async fn decide(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(ca_id): Path<String>,
    Json(body): Json<DecisionBody>,
) -> ApiResult {
    let recruiter = recruiter_from(&headers)?;
    let ca = state.onboarding.status(&ca_id)?;
    check_ownership(&state.jd.get(&ca.jd_id)?, &recruiter)?;
    let evaluation = state
        .evaluation
        .decide(&ca_id, &recruiter.user_id, body.decision)?;
    Ok(ok(evaluation))
}

pub async fn analytics(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(jd_id): Path<String>,
) -> ApiResult {
    let recruiter = recruiter_from(&headers)?;
    check_ownership(&state.jd.get(&jd_id)?, &recruiter)?;
    let analytics = state.reports.analytics(&jd_id)?;
    Ok(ok(analytics))
}

#[derive(Deserialize)]
pub struct ExportQuery {
    #[serde(default)]
    pub format: Option<String>,
}

/// CSV by default; `?format=json` for the JSON export.
pub async fn export_candidates(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(jd_id): Path<String>,
    Query(query): Query<ExportQuery>,
) -> ApiResult {
    let recruiter = recruiter_from(&headers)?;
    check_ownership(&state.jd.get(&jd_id)?, &recruiter)?;
    if query.format.as_deref() == Some("json") {
        let rows = state.reports.candidates_json(&jd_id)?;
        return Ok(ok(rows));
    }
    let (filename, body) = state.reports.candidates_csv(&jd_id)?;
    let disposition = format!("attachment; filename=\"{filename}\"");
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}

#[derive(Deserialize)]
pub struct AuditQuery {
    #[serde(default)]
    pub limit: Option<usize>,
}

pub async fn audit_log(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<AuditQuery>,
) -> ApiResult {
    recruiter_from(&headers)?;
    let limit = query.limit.unwrap_or(100).min(1000);
    if limit == 0 {
        return Err(EngineError::invalid("limit", "limit must be positive").into());
    }
    let records = state.reports.audit_log(limit)?;
    Ok(ok(records))
}
