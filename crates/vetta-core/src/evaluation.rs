//! Evaluation engine: section aggregation, weighted scoring, skill
//! competency, plagiarism hooks, and AI recommendation banding.
//!
//! Runs synchronously on the submit path so the candidate's success page
//! reflects a finished report. A failure leaves the attempt in `evaluating`
//! so the run can be retried; the submission itself is never rolled back.

use crate::error::{EngineError, EngineResult};
use crate::llm::{LlmGateway, LlmRequest};
use crate::model::{
    recommendation_band, AdminDecision, AssessmentAnswer, AssessmentSet, CandidateAssessment,
    CandidateStatus, Evaluation, PlagiarismReport, Recommendation, Section, SectionResult,
    SkillScore,
};
use crate::prompts;
use crate::store::{AuditRecord, Store};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

/// Similarity above this percentage on either channel forces a `REVIEW`.
const PLAGIARISM_FLAG_THRESHOLD: f64 = 80.0;

#[derive(Debug, Clone, Default)]
pub struct PlagiarismFinding {
    pub subjective_similarity: f64,
    pub code_similarity: f64,
}

/// Pluggable similarity producer. The default implementation reports
/// nothing; the flagging rule lives here regardless of producer.
#[async_trait]
pub trait PlagiarismChecker: Send + Sync {
    async fn check(
        &self,
        candidate: &CandidateAssessment,
        answers: &[AssessmentAnswer],
    ) -> EngineResult<Option<PlagiarismFinding>>;
}

pub struct NoopPlagiarismChecker;

#[async_trait]
impl PlagiarismChecker for NoopPlagiarismChecker {
    async fn check(
        &self,
        _candidate: &CandidateAssessment,
        _answers: &[AssessmentAnswer],
    ) -> EngineResult<Option<PlagiarismFinding>> {
        Ok(None)
    }
}

pub struct EvaluationEngine {
    store: Arc<Store>,
    llm: Arc<LlmGateway>,
    plagiarism: Arc<dyn PlagiarismChecker>,
}

impl EvaluationEngine {
    pub fn new(
        store: Arc<Store>,
        llm: Arc<LlmGateway>,
        plagiarism: Arc<dyn PlagiarismChecker>,
    ) -> Self {
        Self {
            store,
            llm,
            plagiarism,
        }
    }

    /// Runs the full evaluation for one submitted attempt. Idempotent: an
    /// already-evaluated attempt returns its stored report unchanged.
    pub async fn run(&self, ca_id: &str) -> EngineResult<Evaluation> {
        let started = Instant::now();
        let ca = self.store.require_candidate(ca_id)?;
        if matches!(
            ca.status,
            CandidateStatus::Evaluated | CandidateStatus::Decided
        ) {
            if let Some(existing) = self.store.get_evaluation(ca_id)? {
                return Ok(existing);
            }
        }
        let jd = self.store.require_jd(&ca.jd_id)?;
        let set_id = ca
            .assigned_set_id
            .as_deref()
            .ok_or_else(|| EngineError::conflict("attempt has no assigned question set"))?;
        let set = self.store.require_set(set_id)?;

        self.store.update_candidate(ca_id, |c| {
            c.status = CandidateStatus::Evaluating;
            Ok(())
        })?;

        let mut evaluation = Evaluation::new(ca_id, &jd.id);
        let mut skills: BTreeMap<String, (f64, f64)> = BTreeMap::new();
        let answers = self.store.list_answers(ca_id)?;

        for section in jd.config.sections.enabled() {
            let answer = answers.iter().find(|a| a.section == section);
            let result = match section {
                Section::Objective => aggregate_objective(&set, answer, &mut skills),
                Section::Subjective => {
                    self.aggregate_subjective(&set, ca_id, answer, &mut skills)
                        .await?
                }
                Section::Programming => aggregate_programming(&set, answer, &mut skills),
            };
            evaluation.total_score += result.score;
            evaluation.max_total_score += result.max_score;
            match section {
                Section::Objective => evaluation.objective = Some(result),
                Section::Subjective => evaluation.subjective = Some(result),
                Section::Programming => evaluation.programming = Some(result),
            }
        }

        evaluation.percentage = if evaluation.max_total_score > 0.0 {
            (evaluation.total_score / evaluation.max_total_score * 100.0).clamp(0.0, 100.0)
        } else {
            0.0
        };
        evaluation.weighted_score = weighted_score(&jd.config, &evaluation);
        evaluation.skill_scores = skills
            .into_iter()
            .map(|(skill, (earned, max))| SkillScore {
                skill,
                score: if max > 0.0 { earned / max * 100.0 } else { 0.0 },
            })
            .collect();

        let (band, confidence, reason) =
            recommendation_band(evaluation.weighted_score, jd.config.cutoff_score);
        evaluation.ai_recommendation = band;
        evaluation.recommendation_confidence = confidence;
        evaluation.recommendation_reason = reason;

        evaluation.plagiarism = match self.plagiarism.check(&ca, &answers).await {
            Ok(Some(finding)) => {
                let flagged = finding.subjective_similarity > PLAGIARISM_FLAG_THRESHOLD
                    || finding.code_similarity > PLAGIARISM_FLAG_THRESHOLD;
                PlagiarismReport {
                    checked: true,
                    subjective_similarity: finding.subjective_similarity,
                    code_similarity: finding.code_similarity,
                    is_flagged: flagged,
                }
            }
            Ok(None) => PlagiarismReport::default(),
            Err(e) => {
                // Best-effort hook; a broken checker must not block reports.
                error!(ca_id, error = %e, "plagiarism check failed");
                PlagiarismReport::default()
            }
        };
        if evaluation.plagiarism.is_flagged {
            evaluation.ai_recommendation = Recommendation::Review;
            evaluation.recommendation_reason =
                format!("plagiarism flagged; {}", evaluation.recommendation_reason);
        }

        evaluation.duration_ms = started.elapsed().as_millis() as u64;
        evaluation.evaluated_at = Utc::now();
        self.store.put_evaluation(&evaluation)?;
        self.store.update_candidate(ca_id, |c| {
            c.status = CandidateStatus::Evaluated;
            Ok(())
        })?;
        info!(
            ca_id,
            weighted = evaluation.weighted_score,
            recommendation = ?evaluation.ai_recommendation,
            "evaluation complete"
        );
        Ok(evaluation)
    }

    /// Records the recruiter's decision and closes the candidate lifecycle.
    pub fn decide(
        &self,
        ca_id: &str,
        actor: &str,
        decision: AdminDecision,
    ) -> EngineResult<Evaluation> {
        if decision == AdminDecision::ReviewPending {
            return Err(EngineError::invalid("decision", "a final decision is required"));
        }
        let updated = self.store.update_evaluation(ca_id, |e| {
            e.admin_decision = decision;
            e.decided_by = Some(actor.to_string());
            e.decided_at = Some(Utc::now());
            Ok(())
        })?;
        self.store.update_candidate(ca_id, |c| {
            c.status = CandidateStatus::Decided;
            Ok(())
        })?;
        self.store.append_audit(
            &AuditRecord::new(actor, "evaluation.decide", ca_id)
                .with_detail(format!("{decision:?}")),
        )?;
        Ok(updated)
    }

    pub fn get(&self, ca_id: &str) -> EngineResult<Option<Evaluation>> {
        self.store.get_evaluation(ca_id)
    }

    /// Scores subjective entries with the rubric model, persisting per-entry
    /// scores back onto the answer document.
    async fn aggregate_subjective(
        &self,
        set: &AssessmentSet,
        ca_id: &str,
        answer: Option<&AssessmentAnswer>,
        skills: &mut BTreeMap<String, (f64, f64)>,
    ) -> EngineResult<SectionResult> {
        let max: f64 = set.subjective.iter().map(|q| f64::from(q.points)).sum();
        let Some(answer) = answer else {
            for q in &set.subjective {
                credit_skill(skills, q.skill.as_deref(), 0.0, f64::from(q.points));
            }
            return Ok(SectionResult::new(0.0, max));
        };

        let mut score = 0.0;
        for question in &set.subjective {
            let entry = answer
                .subjective
                .iter()
                .find(|e| e.question_id == question.question_id);
            let points = f64::from(question.points);
            let earned = match entry {
                Some(entry) if !entry.text.trim().is_empty() => {
                    if let Some(existing) = entry.ai_score {
                        // Already scored in a previous run; keep it stable.
                        existing
                    } else {
                        let request = LlmRequest::new(prompts::subjective_scoring_prompt(
                            &question.text,
                            &question.expected_answer,
                            question.rubric.as_deref(),
                            question.points,
                            &entry.text,
                        ))
                        .with_system(prompts::SUBJECTIVE_SCORE_SYSTEM)
                        .with_temperature(0.0);
                        let value = self
                            .llm
                            .complete_json(&request, prompts::SUBJECTIVE_SCORE_SCHEMA)
                            .await?;
                        let earned = value
                            .get("score")
                            .and_then(|v| v.as_f64())
                            .unwrap_or(0.0)
                            .clamp(0.0, points);
                        let feedback = value
                            .get("feedback")
                            .and_then(|v| v.as_str())
                            .map(str::to_string);
                        let qid = question.question_id.clone();
                        self.store.update_answer(ca_id, Section::Subjective, |a| {
                            if let Some(e) = a.find_subjective_mut(&qid) {
                                e.ai_score = Some(earned);
                                e.ai_feedback = feedback.clone();
                            }
                            Ok(())
                        })?;
                        earned
                    }
                }
                _ => 0.0,
            };
            score += earned;
            credit_skill(skills, question.skill.as_deref(), earned, points);
        }

        // Keep the stored section score in sync with the aggregate.
        let section_max = max;
        self.store.update_answer(ca_id, Section::Subjective, |a| {
            a.section_score = score;
            a.section_max_score = section_max;
            Ok(())
        })?;
        Ok(SectionResult::new(score, max))
    }
}

fn aggregate_objective(
    set: &AssessmentSet,
    answer: Option<&AssessmentAnswer>,
    skills: &mut BTreeMap<String, (f64, f64)>,
) -> SectionResult {
    let max: f64 = set.objective.iter().map(|q| f64::from(q.points)).sum();
    let mut score = 0.0;
    for question in &set.objective {
        let earned = answer
            .and_then(|a| {
                a.objective
                    .iter()
                    .find(|e| e.question_id == question.question_id)
            })
            .map(|e| f64::from(e.points_awarded))
            .unwrap_or(0.0);
        score += earned;
        credit_skill(skills, question.skill.as_deref(), earned, f64::from(question.points));
    }
    SectionResult::new(score, max)
}

fn aggregate_programming(
    set: &AssessmentSet,
    answer: Option<&AssessmentAnswer>,
    skills: &mut BTreeMap<String, (f64, f64)>,
) -> SectionResult {
    let max: f64 = set.programming.iter().map(|q| f64::from(q.points)).sum();
    let mut score = 0.0;
    for question in &set.programming {
        let points = f64::from(question.points);
        let earned = answer
            .and_then(|a| {
                a.programming
                    .iter()
                    .find(|e| e.question_id == question.question_id)
            })
            .map(|e| e.correctness_score / 100.0 * points)
            .unwrap_or(0.0);
        score += earned;
        credit_skill(skills, question.skill.as_deref(), earned, points);
    }
    SectionResult::new(score, max)
}

fn credit_skill(
    skills: &mut BTreeMap<String, (f64, f64)>,
    skill: Option<&str>,
    earned: f64,
    max: f64,
) {
    let Some(skill) = skill else { return };
    let slot = skills.entry(skill.to_string()).or_insert((0.0, 0.0));
    slot.0 += earned;
    slot.1 += max;
}

/// Section percentages combined by JD weights, renormalized over the
/// sections that actually produced results.
fn weighted_score(config: &crate::model::AssessmentConfig, evaluation: &Evaluation) -> f64 {
    let mut weighted = 0.0;
    let mut weight_total = 0.0;
    for section in Section::ORDER {
        let result = match section {
            Section::Objective => evaluation.objective.as_ref(),
            Section::Subjective => evaluation.subjective.as_ref(),
            Section::Programming => evaluation.programming.as_ref(),
        };
        let Some(result) = result else { continue };
        let weight = f64::from(config.sections.get(section).weight);
        weighted += result.percentage * weight;
        weight_total += weight;
    }
    if weight_total > 0.0 {
        (weighted / weight_total).clamp(0.0, 100.0)
    } else {
        0.0
    }
}
