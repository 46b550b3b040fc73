//! Candidate onboarding routes: public assessment info, registration,
//! email verification, photo, consent, resume upload, status, and session
//! start.
//!
//! File transport is external: the resume route receives already-extracted
//! text plus a stored-file reference.

use crate::envelope::{ok, ApiResult};
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;

pub async fn assessment_info(
    State(state): State<AppState>,
    Path(link): Path<String>,
) -> ApiResult {
    let info = state.onboarding.assessment_info(&link)?;
    Ok(ok(info))
}

#[derive(Deserialize)]
pub struct RegisterBody {
    pub email: String,
    pub name: String,
}

pub async fn register(
    State(state): State<AppState>,
    Path(link): Path<String>,
    Json(body): Json<RegisterBody>,
) -> ApiResult {
    let (user, ca) = state.onboarding.register(&link, &body.email, &body.name).await?;
    Ok(ok(serde_json::json!({
        "candidateAssessmentId": ca.id,
        "candidateId": user.id,
        "status": ca.status,
    })))
}

#[derive(Deserialize)]
pub struct OtpBody {
    pub otp: String,
}

pub async fn verify_email(
    State(state): State<AppState>,
    Path(ca_id): Path<String>,
    Json(body): Json<OtpBody>,
) -> ApiResult {
    let ca = state.onboarding.verify_email(&ca_id, &body.otp)?;
    Ok(ok(ca))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoBody {
    pub photo_ref: String,
}

pub async fn capture_photo(
    State(state): State<AppState>,
    Path(ca_id): Path<String>,
    Json(body): Json<PhotoBody>,
) -> ApiResult {
    let ca = state.onboarding.capture_photo(&ca_id, &body.photo_ref)?;
    Ok(ok(ca))
}

pub async fn accept_consent(State(state): State<AppState>, Path(ca_id): Path<String>) -> ApiResult {
    let ca = state.onboarding.accept_consent(&ca_id)?;
    Ok(ok(ca))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeBody {
    pub resume_text: String,
    pub file_ref: Option<String>,
}

pub async fn upload_resume(
    State(state): State<AppState>,
    Path(ca_id): Path<String>,
    Json(body): Json<ResumeBody>,
) -> ApiResult {
    let ca = state
        .onboarding
        .upload_resume(&ca_id, &body.resume_text, body.file_ref)
        .await?;
    Ok(ok(ca))
}

pub async fn status(State(state): State<AppState>, Path(ca_id): Path<String>) -> ApiResult {
    let ca = state.onboarding.status(&ca_id)?;
    Ok(ok(ca))
}

pub async fn start(State(state): State<AppState>, Path(ca_id): Path<String>) -> ApiResult {
    let session = state.session.start(&ca_id).await?;

    // Seed adaptive-interview bookkeeping over the written section. Budget:
    // base questions plus the target follow-up allowance.
    if let Ok(ca) = state.onboarding.status(&ca_id) {
        if let Ok(set) = state.session.assigned_set(&ca) {
            let base = set.subjective.len() as u32;
            if base > 0 {
                let allowance = (f64::from(base) * 1.5).ceil() as u32;
                if let Err(e) =
                    state
                        .followups
                        .ensure_interview(&ca_id, base, base, base + allowance)
                {
                    tracing::warn!(error = %e, "could not seed interview metadata");
                }
            }
        }
    }
    Ok(ok(session))
}
