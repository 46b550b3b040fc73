//! In-session routes, all authenticated by session token: questions,
//! answer saves, section/final submit, heartbeat, proctoring events.

use super::session_token_from;
use crate::envelope::{ok, ApiResult};
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;
use vetta_core::{AnswerPayload, EngineError, FollowUpOutcome, Section, Severity};

fn parse_section(raw: &str) -> Result<Section, EngineError> {
    Section::parse(raw).ok_or_else(|| EngineError::invalid("section", "unknown section"))
}

pub async fn get_session(State(state): State<AppState>, headers: HeaderMap) -> ApiResult {
    let token = session_token_from(&headers, None)?;
    let view = state.session.get_session(&token).await?;
    Ok(ok(view))
}

pub async fn get_questions(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(section): Path<String>,
) -> ApiResult {
    let token = session_token_from(&headers, None)?;
    let section = parse_section(&section)?;
    let questions = state.session.get_questions(&token, section).await?;
    Ok(ok(questions))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveAnswerBody {
    pub session_token: Option<String>,
    pub section: String,
    pub question_id: String,
    pub selected_option_index: Option<usize>,
    pub text: Option<String>,
    pub code: Option<String>,
    pub language_id: Option<u32>,
}

pub async fn save_answer(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<SaveAnswerBody>,
) -> ApiResult {
    let token = session_token_from(&headers, body.session_token.as_deref())?;
    let section = parse_section(&body.section)?;
    let answer_text = body.text.clone();
    let payload = match section {
        Section::Objective => AnswerPayload::Objective {
            selected_option_index: body.selected_option_index,
        },
        Section::Subjective => AnswerPayload::Subjective {
            text: body
                .text
                .ok_or_else(|| EngineError::invalid("text", "answer text is required"))?,
        },
        Section::Programming => AnswerPayload::Programming {
            code: body
                .code
                .ok_or_else(|| EngineError::invalid("code", "code is required"))?,
            language_id: body
                .language_id
                .ok_or_else(|| EngineError::invalid("languageId", "language is required"))?,
        },
    };
    let answered = state
        .session
        .save_answer(&token, section, &body.question_id, payload)
        .await?;

    // Adaptive probe on completed written answers. Best-effort by contract:
    // a detector or generator failure never fails the save.
    let mut follow_up = None;
    if section == Section::Subjective {
        if let (Ok((ca, _, _)), Some(text)) =
            (state.session.authenticate(&token).await, answer_text)
        {
            if let Ok(set) = state.session.assigned_set(&ca) {
                if let Some(index) = set
                    .subjective
                    .iter()
                    .position(|q| q.question_id == body.question_id)
                {
                    let question_text = set.subjective[index].text.clone();
                    if let FollowUpOutcome::Generated(generated) = state
                        .followups
                        .on_answer(&ca.id, index, &question_text, &text)
                        .await
                    {
                        follow_up = Some(generated);
                    }
                }
            }
        }
    }
    Ok(ok(serde_json::json!({
        "questionsAnswered": answered,
        "followUp": follow_up,
    })))
}

/// Ordered follow-up questions for the authenticated attempt.
pub async fn list_followups(State(state): State<AppState>, headers: HeaderMap) -> ApiResult {
    let token = session_token_from(&headers, None)?;
    let (ca, _, _) = state.session.authenticate(&token).await?;
    let followups = state.followups.list_followups(&ca.id)?;
    Ok(ok(followups))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitSectionBody {
    pub session_token: Option<String>,
    pub section: String,
}

pub async fn submit_section(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<SubmitSectionBody>,
) -> ApiResult {
    let token = session_token_from(&headers, body.session_token.as_deref())?;
    let section = parse_section(&body.section)?;
    let outcome = state.session.submit_section(&token, section).await?;
    Ok(ok(outcome))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SubmitAllBody {
    pub session_token: Option<String>,
}

impl Default for SubmitAllBody {
    fn default() -> Self {
        Self {
            session_token: None,
        }
    }
}

pub async fn submit_all(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Option<Json<SubmitAllBody>>,
) -> ApiResult {
    let body_token = body.as_ref().and_then(|b| b.session_token.clone());
    let token = session_token_from(&headers, body_token.as_deref())?;
    let outcome = state.session.submit_all(&token).await?;
    Ok(ok(outcome))
}

pub async fn heartbeat(State(state): State<AppState>, headers: HeaderMap) -> ApiResult {
    let token = session_token_from(&headers, None)?;
    let remaining = state.session.heartbeat(&token).await?;
    Ok(ok(serde_json::json!({"remainingTimeMs": remaining})))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProctorEventBody {
    pub session_token: Option<String>,
    pub event_type: String,
    #[serde(default)]
    pub evidence: serde_json::Value,
    pub section: Option<String>,
    pub question_id: Option<String>,
    pub screenshot_ref: Option<String>,
    pub severity: Option<Severity>,
}

/// Proctoring appends bypass the candidate lock (counters are atomic) but
/// still authenticate the session.
pub async fn log_proctor_event(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<ProctorEventBody>,
) -> ApiResult {
    let token = session_token_from(&headers, body.session_token.as_deref())?;
    let (ca, _, _) = state.session.authenticate(&token).await?;
    let section = body.section.as_deref().map(parse_section).transpose()?;
    let event = state.proctoring.log_event(
        &ca.id,
        &body.event_type,
        body.evidence,
        section,
        body.question_id,
        body.screenshot_ref,
        body.severity,
    )?;
    Ok(ok(event))
}
