//! Session controller: session-token authentication, time-budget
//! enforcement with grace, section serving with evaluator-field redaction,
//! answer saves, objective auto-grading on section submit, and the
//! synchronous post-submit evaluation handoff.
//!
//! Every mutating session call authenticates by token and re-checks the
//! time budget; a session past `totalTime + grace` is expired on touch:
//! atomically transitioned to `submitted` with `TimeExpired` returned to
//! the caller. All mutations for one attempt are serialized by a
//! per-candidate advisory lock.

use crate::error::{EngineError, EngineResult};
use crate::evaluation::EvaluationEngine;
use crate::model::{
    AssessmentSet, CandidateAssessment, CandidateStatus, JobDescription, Section,
    word_count, ObjectiveEntry, ProgrammingEntry, SubjectiveEntry,
};
use crate::store::Store;
use crate::token;
use chrono::Utc;
use dashmap::DashMap;
use rand::Rng;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

/// Tolerance added to the global time budget before forced submission.
pub const GRACE_SECONDS: i64 = 60;
/// Placeholder replacing hidden test-case fields in candidate-visible data.
pub const HIDDEN_PLACEHOLDER: &str = "[hidden]";
const TOKEN_MINT_ATTEMPTS: u32 = 16;

/// Per-candidate advisory locks serializing all session mutations.
#[derive(Default)]
pub struct SessionLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl SessionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_candidate(&self, ca_id: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(ca_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

// -- Candidate-visible views --------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub candidate_assessment_id: String,
    pub session_token: String,
    pub current_section: Option<Section>,
    pub sections: Vec<Section>,
    pub total_time_minutes: u32,
    pub remaining_time_ms: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CandidateOption {
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CandidateObjectiveQuestion {
    pub question_id: String,
    pub text: String,
    pub options: Vec<CandidateOption>,
    pub points: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct CandidateSubjectiveQuestion {
    pub question_id: String,
    pub text: String,
    pub max_words: u32,
    pub points: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct CandidateTestCase {
    pub input: String,
    pub expected_output: String,
    pub is_hidden: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CandidateProgrammingQuestion {
    pub question_id: String,
    pub title: String,
    pub problem_statement: String,
    pub starter_code: Option<String>,
    pub test_cases: Vec<CandidateTestCase>,
    pub points: u32,
}

/// One section's questions with evaluator-only fields stripped.
#[derive(Debug, Clone, Serialize)]
pub struct SectionQuestions {
    pub section: Section,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub objective: Vec<CandidateObjectiveQuestion>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub subjective: Vec<CandidateSubjectiveQuestion>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub programming: Vec<CandidateProgrammingQuestion>,
    pub time_minutes: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SectionSubmitOutcome {
    pub section: Section,
    pub section_score: Option<f64>,
    pub section_max_score: Option<f64>,
    pub next_section: Option<Section>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmitAllOutcome {
    pub submitted_at: chrono::DateTime<Utc>,
    pub time_spent_seconds: u64,
    pub evaluation_ready: bool,
}

/// What the candidate sends for one question.
#[derive(Debug, Clone)]
pub enum AnswerPayload {
    Objective { selected_option_index: Option<usize> },
    Subjective { text: String },
    Programming { code: String, language_id: u32 },
}

pub struct SessionController {
    store: Arc<Store>,
    locks: Arc<SessionLocks>,
    evaluation: Arc<EvaluationEngine>,
}

impl SessionController {
    pub fn new(
        store: Arc<Store>,
        locks: Arc<SessionLocks>,
        evaluation: Arc<EvaluationEngine>,
    ) -> Self {
        Self {
            store,
            locks,
            evaluation,
        }
    }

    /// Starts (or resumes) a session. Requires completed onboarding.
    /// Idempotent: an in-progress attempt returns its existing token. The
    /// question set is assigned exactly once, uniformly over the JD's
    /// active sets.
    pub async fn start(&self, ca_id: &str) -> EngineResult<SessionView> {
        let lock = self.locks.for_candidate(ca_id);
        let _guard = lock.lock().await;

        let ca = self.store.require_candidate(ca_id)?;
        if !ca.onboarding.is_complete {
            return Err(EngineError::invalid(
                "onboarding",
                "onboarding must be completed before starting",
            ));
        }
        if ca.status == CandidateStatus::InProgress {
            if let Some(token) = &ca.session_token {
                let jd = self.store.require_jd(&ca.jd_id)?;
                return Ok(self.view(&ca, &jd, token));
            }
        }
        if ca.status.rank() > CandidateStatus::InProgress.rank() {
            return Err(EngineError::conflict("assessment already submitted"));
        }
        if ca.status != CandidateStatus::Ready {
            return Err(EngineError::conflict("candidate is not ready to start"));
        }

        let jd = self.store.require_jd(&ca.jd_id)?;
        let set_id = match &ca.assigned_set_id {
            Some(existing) => existing.clone(),
            None => self.pick_active_set(&jd)?,
        };
        let session_token = self.mint_session_token(ca_id)?;

        let first_section = jd
            .config
            .sections
            .enabled()
            .first()
            .copied()
            .ok_or_else(|| EngineError::Infrastructure("JD has no enabled sections".to_string()))?;

        let token_for_update = session_token.clone();
        let set_for_update = set_id.clone();
        let updated = self.store.update_candidate(ca_id, move |c| {
            let now = Utc::now();
            c.assigned_set_id = Some(set_for_update.clone());
            c.session_token = Some(token_for_update.clone());
            c.status = CandidateStatus::InProgress;
            c.current_section = Some(first_section);
            c.timing.started_at = Some(now);
            c.timing.last_heartbeat = Some(now);
            let progress = c.progress.get_mut(first_section);
            progress.started = true;
            progress.started_at = Some(now);
            Ok(())
        })?;
        info!(ca_id, set_id = %set_id, "session started");
        Ok(self.view(&updated, &jd, &session_token))
    }

    /// Authenticates a session token and enforces the time budget. On
    /// expiry the attempt transitions to `submitted` and the caller sees
    /// `SessionExpired`. On success the heartbeat is refreshed.
    pub async fn authenticate(
        &self,
        session_token: &str,
    ) -> EngineResult<(CandidateAssessment, JobDescription, i64)> {
        let ca = self
            .store
            .get_candidate_by_session(session_token)?
            .ok_or(EngineError::SessionInvalid)?;
        if ca.status != CandidateStatus::InProgress {
            return Err(EngineError::SessionNotInProgress);
        }
        let jd = self.store.require_jd(&ca.jd_id)?;
        let started_at = ca
            .timing
            .started_at
            .ok_or(EngineError::SessionNotInProgress)?;
        let now = Utc::now();
        let elapsed_ms = (now - started_at).num_milliseconds();
        let total_ms = i64::from(jd.config.total_time_minutes) * 60_000;
        let budget_ms = total_ms + GRACE_SECONDS * 1000;

        if elapsed_ms > budget_ms {
            let lock = self.locks.for_candidate(&ca.id);
            let _guard = lock.lock().await;
            warn!(ca_id = %ca.id, elapsed_ms, budget_ms, "session expired on touch");
            self.store.update_candidate(&ca.id, |c| {
                if c.status == CandidateStatus::InProgress {
                    c.status = CandidateStatus::Submitted;
                    c.timing.submitted_at = Some(now);
                    c.timing.time_spent_seconds = Some((elapsed_ms / 1000).max(0) as u64);
                    c.current_section = None;
                }
                Ok(())
            })?;
            return Err(EngineError::SessionExpired);
        }

        let updated = self.store.update_candidate(&ca.id, |c| {
            c.timing.last_heartbeat = Some(now);
            Ok(())
        })?;
        let remaining_ms = (total_ms - elapsed_ms).max(0);
        Ok((updated, jd, remaining_ms))
    }

    pub async fn get_session(&self, session_token: &str) -> EngineResult<SessionView> {
        let (ca, jd, _) = self.authenticate(session_token).await?;
        Ok(self.view(&ca, &jd, session_token))
    }

    pub async fn heartbeat(&self, session_token: &str) -> EngineResult<i64> {
        let (_, _, remaining_ms) = self.authenticate(session_token).await?;
        Ok(remaining_ms)
    }

    /// Serves one section's questions with evaluator-only fields stripped:
    /// no correct flags, no expected answers or rubrics, hidden test cases
    /// masked.
    pub async fn get_questions(
        &self,
        session_token: &str,
        section: Section,
    ) -> EngineResult<SectionQuestions> {
        let (ca, jd, _) = self.authenticate(session_token).await?;
        let section_config = jd.config.sections.get(section);
        if !section_config.enabled {
            return Err(EngineError::invalid(
                "section",
                "this section is not part of the assessment",
            ));
        }
        let set = self.assigned_set(&ca)?;

        // First touch marks the section started.
        if !ca.progress.get(section).started {
            self.store.update_candidate(&ca.id, |c| {
                let progress = c.progress.get_mut(section);
                if !progress.started {
                    progress.started = true;
                    progress.started_at = Some(Utc::now());
                }
                Ok(())
            })?;
        }

        let mut questions = SectionQuestions {
            section,
            objective: Vec::new(),
            subjective: Vec::new(),
            programming: Vec::new(),
            time_minutes: section_config.time_minutes,
        };
        match section {
            Section::Objective => {
                questions.objective = set
                    .objective
                    .iter()
                    .map(|q| CandidateObjectiveQuestion {
                        question_id: q.question_id.clone(),
                        text: q.text.clone(),
                        options: q
                            .options
                            .iter()
                            .map(|o| CandidateOption { text: o.text.clone() })
                            .collect(),
                        points: q.points,
                    })
                    .collect();
            }
            Section::Subjective => {
                questions.subjective = set
                    .subjective
                    .iter()
                    .map(|q| CandidateSubjectiveQuestion {
                        question_id: q.question_id.clone(),
                        text: q.text.clone(),
                        max_words: q.max_words,
                        points: q.points,
                    })
                    .collect();
            }
            Section::Programming => {
                questions.programming = set
                    .programming
                    .iter()
                    .map(|q| CandidateProgrammingQuestion {
                        question_id: q.question_id.clone(),
                        title: q.title.clone(),
                        problem_statement: q.problem_statement.clone(),
                        starter_code: q.starter_code.clone(),
                        test_cases: q
                            .test_cases
                            .iter()
                            .map(|t| {
                                if t.is_hidden {
                                    CandidateTestCase {
                                        input: HIDDEN_PLACEHOLDER.to_string(),
                                        expected_output: HIDDEN_PLACEHOLDER.to_string(),
                                        is_hidden: true,
                                    }
                                } else {
                                    CandidateTestCase {
                                        input: t.input.clone(),
                                        expected_output: t.expected_output.clone(),
                                        is_hidden: false,
                                    }
                                }
                            })
                            .collect(),
                        points: q.points,
                    })
                    .collect();
            }
        }
        Ok(questions)
    }

    /// Upserts one question's answer. Entries are keyed by question id so
    /// concurrent saves for distinct questions never clobber each other.
    pub async fn save_answer(
        &self,
        session_token: &str,
        section: Section,
        question_id: &str,
        payload: AnswerPayload,
    ) -> EngineResult<u32> {
        let (ca, jd, _) = self.authenticate(session_token).await?;
        if !jd.config.sections.get(section).enabled {
            return Err(EngineError::invalid("section", "section is not enabled"));
        }
        payload.check_matches(section)?;

        let lock = self.locks.for_candidate(&ca.id);
        let _guard = lock.lock().await;

        let question_id = question_id.to_string();
        let updated = self.store.update_answer(&ca.id, section, |answer| {
            if answer.is_submitted {
                return Err(EngineError::conflict("section already submitted"));
            }
            match &payload {
                AnswerPayload::Objective { selected_option_index } => {
                    match answer.find_objective_mut(&question_id) {
                        Some(entry) => {
                            entry.selected_option_index = *selected_option_index;
                            entry.is_correct = None;
                            entry.points_awarded = 0;
                        }
                        None => answer.objective.push(ObjectiveEntry {
                            question_id: question_id.clone(),
                            selected_option_index: *selected_option_index,
                            is_correct: None,
                            points_awarded: 0,
                        }),
                    }
                }
                AnswerPayload::Subjective { text } => {
                    let words = word_count(text);
                    match answer.find_subjective_mut(&question_id) {
                        Some(entry) => {
                            entry.text = text.clone();
                            entry.word_count = words;
                            entry.ai_score = None;
                            entry.ai_feedback = None;
                        }
                        None => answer.subjective.push(SubjectiveEntry {
                            question_id: question_id.clone(),
                            text: text.clone(),
                            word_count: words,
                            ai_score: None,
                            ai_feedback: None,
                        }),
                    }
                }
                AnswerPayload::Programming { code, language_id } => {
                    match answer.find_programming_mut(&question_id) {
                        Some(entry) => {
                            entry.code = code.clone();
                            entry.language_id = *language_id;
                        }
                        None => answer.programming.push(ProgrammingEntry {
                            question_id: question_id.clone(),
                            code: code.clone(),
                            language_id: *language_id,
                            test_cases_passed: 0,
                            total_test_cases: 0,
                            correctness_score: 0.0,
                            last_results: Vec::new(),
                            run_history: Vec::new(),
                            submitted_at: None,
                        }),
                    }
                }
            }
            Ok(())
        })?;

        let answered = updated.answered_count();
        self.store.update_candidate(&ca.id, |c| {
            c.progress.get_mut(section).questions_answered = answered;
            Ok(())
        })?;
        Ok(answered)
    }

    /// Submits one section. Objective sections are graded immediately
    /// against the assigned set. Idempotent per section.
    pub async fn submit_section(
        &self,
        session_token: &str,
        section: Section,
    ) -> EngineResult<SectionSubmitOutcome> {
        let (ca, jd, _) = self.authenticate(session_token).await?;
        if !jd.config.sections.get(section).enabled {
            return Err(EngineError::invalid("section", "section is not enabled"));
        }
        let set = self.assigned_set(&ca)?;

        let lock = self.locks.for_candidate(&ca.id);
        let _guard = lock.lock().await;

        let updated = self.store.update_answer(&ca.id, section, |answer| {
            if answer.is_submitted {
                return Ok(());
            }
            let now = Utc::now();
            answer.is_submitted = true;
            answer.submitted_at = Some(now);
            if let Some(started) = answer.started_at {
                answer.time_spent_seconds = (now - started).num_seconds().max(0) as u64;
            }
            if section == Section::Objective {
                answer.grade_objective(&set);
            }
            Ok(())
        })?;

        let next_section = jd.config.sections.next_enabled(section);
        let answered = updated.answered_count();
        self.store.update_candidate(&ca.id, |c| {
            let progress = c.progress.get_mut(section);
            progress.completed = true;
            progress.questions_answered = answered;
            c.current_section = next_section;
            Ok(())
        })?;

        Ok(SectionSubmitOutcome {
            section,
            section_score: (section == Section::Objective).then_some(updated.section_score),
            section_max_score: (section == Section::Objective).then_some(updated.section_max_score),
            next_section,
        })
    }

    /// Final submission: grades any unsubmitted objective work, marks the
    /// attempt `submitted`, bumps the JD counter, and runs evaluation
    /// synchronously. Evaluation failure is logged, never surfaced — the
    /// submission is durable, the report may be delayed. Idempotent.
    pub async fn submit_all(&self, session_token: &str) -> EngineResult<SubmitAllOutcome> {
        let ca = self
            .store
            .get_candidate_by_session(session_token)?
            .ok_or(EngineError::SessionInvalid)?;

        // Re-submitting an already-submitted attempt succeeds without
        // re-running evaluation.
        if ca.status.rank() >= CandidateStatus::Submitted.rank() {
            let evaluation_ready = self.store.get_evaluation(&ca.id)?.is_some();
            return Ok(SubmitAllOutcome {
                submitted_at: ca.timing.submitted_at.unwrap_or_else(Utc::now),
                time_spent_seconds: ca.timing.time_spent_seconds.unwrap_or(0),
                evaluation_ready,
            });
        }
        if ca.status != CandidateStatus::InProgress {
            return Err(EngineError::SessionNotInProgress);
        }
        let jd = self.store.require_jd(&ca.jd_id)?;
        let set = self.assigned_set(&ca)?;

        let lock = self.locks.for_candidate(&ca.id);
        let _guard = lock.lock().await;

        // Close out any section the candidate left open.
        for section in jd.config.sections.enabled() {
            if self.store.get_answer(&ca.id, section)?.is_some() {
                self.store.update_answer(&ca.id, section, |answer| {
                    if !answer.is_submitted {
                        let now = Utc::now();
                        answer.is_submitted = true;
                        answer.submitted_at = Some(now);
                        if let Some(started) = answer.started_at {
                            answer.time_spent_seconds =
                                (now - started).num_seconds().max(0) as u64;
                        }
                        if section == Section::Objective {
                            answer.grade_objective(&set);
                        }
                    }
                    Ok(())
                })?;
            }
        }

        let now = Utc::now();
        let time_spent_seconds = ca
            .timing
            .started_at
            .map(|s| (now - s).num_seconds().max(0) as u64)
            .unwrap_or(0);
        self.store.update_candidate(&ca.id, |c| {
            c.status = CandidateStatus::Submitted;
            c.timing.submitted_at = Some(now);
            c.timing.time_spent_seconds = Some(time_spent_seconds);
            c.current_section = None;
            for section in Section::ORDER {
                let progress = c.progress.get_mut(section);
                if progress.started {
                    progress.completed = true;
                }
            }
            Ok(())
        })?;
        self.store.update_jd(&ca.jd_id, |j| {
            j.stats.completed_assessments += 1;
            j.stats.last_activity_at = Some(now);
            Ok(())
        })?;
        info!(ca_id = %ca.id, time_spent_seconds, "assessment submitted");

        // Synchronous so the success page can show a finished report.
        let evaluation_ready = match self.evaluation.run(&ca.id).await {
            Ok(_) => true,
            Err(e) => {
                error!(ca_id = %ca.id, error = %e, "post-submit evaluation failed");
                false
            }
        };

        Ok(SubmitAllOutcome {
            submitted_at: now,
            time_spent_seconds,
            evaluation_ready,
        })
    }

    pub fn assigned_set(&self, ca: &CandidateAssessment) -> EngineResult<AssessmentSet> {
        let set_id = ca
            .assigned_set_id
            .as_deref()
            .ok_or_else(|| EngineError::conflict("no question set assigned yet"))?;
        self.store.require_set(set_id)
    }

    fn pick_active_set(&self, jd: &JobDescription) -> EngineResult<String> {
        let mut active = Vec::new();
        for id in &jd.set_ids {
            if let Some(set) = self.store.get_set(id)? {
                if set.is_active {
                    active.push(set.id);
                }
            }
        }
        if active.is_empty() {
            return Err(EngineError::Infrastructure(
                "no active question sets for this assessment".to_string(),
            ));
        }
        let index = rand::thread_rng().gen_range(0..active.len());
        Ok(active.swap_remove(index))
    }

    fn mint_session_token(&self, ca_id: &str) -> EngineResult<String> {
        for _ in 0..TOKEN_MINT_ATTEMPTS {
            let candidate = token::mint_session_token();
            if self.store.claim_session_token(&candidate, ca_id)? {
                return Ok(candidate);
            }
        }
        Err(EngineError::Infrastructure(
            "could not mint a unique session token".to_string(),
        ))
    }

    fn view(&self, ca: &CandidateAssessment, jd: &JobDescription, token: &str) -> SessionView {
        let total_ms = i64::from(jd.config.total_time_minutes) * 60_000;
        let elapsed_ms = ca
            .timing
            .started_at
            .map(|s| (Utc::now() - s).num_milliseconds())
            .unwrap_or(0);
        SessionView {
            candidate_assessment_id: ca.id.clone(),
            session_token: token.to_string(),
            current_section: ca.current_section,
            sections: jd.config.sections.enabled(),
            total_time_minutes: jd.config.total_time_minutes,
            remaining_time_ms: (total_ms - elapsed_ms).max(0),
        }
    }
}

impl AnswerPayload {
    fn check_matches(&self, section: Section) -> EngineResult<()> {
        let matches = matches!(
            (self, section),
            (AnswerPayload::Objective { .. }, Section::Objective)
                | (AnswerPayload::Subjective { .. }, Section::Subjective)
                | (AnswerPayload::Programming { .. }, Section::Programming)
        );
        if matches {
            Ok(())
        } else {
            Err(EngineError::invalid(
                "answer",
                "answer payload does not match the section",
            ))
        }
    }
}
