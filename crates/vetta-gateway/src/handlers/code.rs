//! Code routes: run against samples, submit against the full case list,
//! list supported languages.

use super::session_token_from;
use crate::envelope::{ok, ApiResult};
use crate::state::AppState;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;
use vetta_core::LANGUAGES;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeBody {
    pub session_token: Option<String>,
    pub question_id: String,
    pub code: String,
    pub language_id: u32,
}

pub async fn run(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CodeBody>,
) -> ApiResult {
    let token = session_token_from(&headers, body.session_token.as_deref())?;
    let (ca, _, _) = state.session.authenticate(&token).await?;
    let set = state.session.assigned_set(&ca)?;
    let outcome = state
        .code
        .run(&ca, &set, &body.question_id, &body.code, body.language_id)
        .await?;
    Ok(ok(outcome))
}

pub async fn submit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CodeBody>,
) -> ApiResult {
    let token = session_token_from(&headers, body.session_token.as_deref())?;
    let (ca, _, _) = state.session.authenticate(&token).await?;
    let set = state.session.assigned_set(&ca)?;
    let outcome = state
        .code
        .submit(&ca, &set, &body.question_id, &body.code, body.language_id)
        .await?;
    Ok(ok(outcome))
}

pub async fn list_languages() -> ApiResult {
    let languages: Vec<serde_json::Value> = LANGUAGES
        .iter()
        .map(|(id, name, key)| serde_json::json!({"id": id, "name": name, "key": key}))
        .collect();
    Ok(ok(languages))
}
