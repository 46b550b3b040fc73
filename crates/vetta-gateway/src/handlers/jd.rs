//! Recruiter-facing JD routes: upload, parse, configuration, locking, link
//! generation, listing, delete.

use super::{check_ownership, recruiter_from};
use crate::envelope::{ok, ApiResult};
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use vetta_core::{ConfigPatch, SectionsConfig};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadBody {
    pub title: String,
    pub raw_text: String,
    pub file_ref: Option<String>,
}

pub async fn upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<UploadBody>,
) -> ApiResult {
    let recruiter = recruiter_from(&headers)?;
    let jd = state.jd.upload(
        &recruiter.company_id,
        &recruiter.user_id,
        &body.title,
        &body.raw_text,
        body.file_ref,
    )?;
    Ok(ok(jd))
}

pub async fn parse(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(jd_id): Path<String>,
) -> ApiResult {
    let recruiter = recruiter_from(&headers)?;
    check_ownership(&state.jd.get(&jd_id)?, &recruiter)?;
    let jd = state.jd.parse(&jd_id).await?;
    Ok(ok(jd))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigBody {
    pub sections: Option<SectionsConfig>,
    pub cutoff_score: Option<u32>,
    pub resume_match_threshold: Option<u32>,
    pub num_sets: Option<u32>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

pub async fn update_config(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(jd_id): Path<String>,
    Json(body): Json<ConfigBody>,
) -> ApiResult {
    let recruiter = recruiter_from(&headers)?;
    check_ownership(&state.jd.get(&jd_id)?, &recruiter)?;
    let patch = ConfigPatch {
        sections: body.sections,
        cutoff_score: body.cutoff_score,
        resume_match_threshold: body.resume_match_threshold,
        num_sets: body.num_sets,
        start_time: body.start_time,
        end_time: body.end_time,
    };
    let jd = state.jd.update_config(&jd_id, &recruiter.user_id, &patch)?;
    Ok(ok(jd))
}

#[derive(Deserialize)]
pub struct SkillsBody {
    pub skills: Vec<String>,
}

pub async fn update_skills(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(jd_id): Path<String>,
    Json(body): Json<SkillsBody>,
) -> ApiResult {
    let recruiter = recruiter_from(&headers)?;
    check_ownership(&state.jd.get(&jd_id)?, &recruiter)?;
    let jd = state
        .jd
        .update_skills(&jd_id, &recruiter.user_id, body.skills)?;
    Ok(ok(jd))
}

#[derive(Deserialize)]
pub struct RubricsBody {
    pub rubrics: Option<String>,
}

pub async fn update_rubrics(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(jd_id): Path<String>,
    Json(body): Json<RubricsBody>,
) -> ApiResult {
    let recruiter = recruiter_from(&headers)?;
    check_ownership(&state.jd.get(&jd_id)?, &recruiter)?;
    let jd = state
        .jd
        .update_rubrics(&jd_id, &recruiter.user_id, body.rubrics)?;
    Ok(ok(jd))
}

#[derive(Deserialize)]
pub struct LockBody {
    pub locked: bool,
}

pub async fn set_locked(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(jd_id): Path<String>,
    Json(body): Json<LockBody>,
) -> ApiResult {
    let recruiter = recruiter_from(&headers)?;
    check_ownership(&state.jd.get(&jd_id)?, &recruiter)?;
    let jd = state.jd.set_locked(&jd_id, &recruiter.user_id, body.locked)?;
    Ok(ok(jd))
}

pub async fn generate_link(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(jd_id): Path<String>,
) -> ApiResult {
    let recruiter = recruiter_from(&headers)?;
    check_ownership(&state.jd.get(&jd_id)?, &recruiter)?;
    let jd = state.jd.generate_link(&jd_id, &recruiter.user_id).await?;
    Ok(ok(jd))
}

pub async fn list(State(state): State<AppState>, headers: HeaderMap) -> ApiResult {
    let recruiter = recruiter_from(&headers)?;
    let jds = state.jd.list(&recruiter.company_id)?;
    Ok(ok(jds))
}

pub async fn get(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(jd_id): Path<String>,
) -> ApiResult {
    let recruiter = recruiter_from(&headers)?;
    let jd = state.jd.get(&jd_id)?;
    check_ownership(&jd, &recruiter)?;
    Ok(ok(jd))
}

pub async fn delete(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(jd_id): Path<String>,
) -> ApiResult {
    let recruiter = recruiter_from(&headers)?;
    check_ownership(&state.jd.get(&jd_id)?, &recruiter)?;
    state.jd.delete(&jd_id, &recruiter.user_id)?;
    Ok(ok(serde_json::json!({"deleted": true})))
}
