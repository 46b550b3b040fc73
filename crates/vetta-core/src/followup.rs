//! Adaptive follow-up engine: a detector model decides whether a completed
//! answer leaves a gap worth probing, budget heuristics admit or reject the
//! follow-up, and a generator model authors it.
//!
//! Follow-ups interleave with base questions through the integer sort-key
//! scheme in `model::interview`. Detector or generator failure never fails
//! the answer-save path: errors degrade to "no follow-up" with a log line.

use crate::error::{EngineError, EngineResult};
use crate::llm::{LlmGateway, LlmRequest};
use crate::model::{
    base_sort_key, followup_sort_key, FollowUpQuestion, InterviewMetadata,
};
use crate::prompts;
use crate::store::Store;
use std::sync::Arc;
use tracing::{info, warn};

/// Detector confidence floor.
const CONFIDENCE_THRESHOLD: f64 = 0.65;
/// Stricter floor once the interview already holds its minimum questions.
const CONFIDENCE_THRESHOLD_SATISFIED: f64 = 0.75;
/// Hard cap of follow-ups hanging off one base question.
const MAX_FOLLOWUPS_PER_BASE: usize = 2;
/// Duplicate check window over the most recent follow-ups.
const DUPLICATE_WINDOW: usize = 6;

#[derive(Debug, Clone, Default)]
pub struct DetectorVerdict {
    pub need_follow_up: bool,
    pub confidence: f64,
    pub reason: String,
    pub summarized_answer: String,
}

/// Outcome of one answer passing through the engine.
#[derive(Debug, Clone)]
pub enum FollowUpOutcome {
    Generated(FollowUpQuestion),
    Rejected { reason: String },
    /// Detector/generator failed; the answer save proceeds unaffected.
    Skipped { error: String },
}

pub struct FollowUpEngine {
    store: Arc<Store>,
    llm: Arc<LlmGateway>,
}

impl FollowUpEngine {
    pub fn new(store: Arc<Store>, llm: Arc<LlmGateway>) -> Self {
        Self { store, llm }
    }

    /// Creates interview metadata for an attempt if it does not exist yet.
    pub fn ensure_interview(
        &self,
        ca_id: &str,
        base_question_count: u32,
        min_questions: u32,
        max_questions: u32,
    ) -> EngineResult<InterviewMetadata> {
        if let Some(existing) = self.store.get_interview(ca_id)? {
            return Ok(existing);
        }
        let meta = InterviewMetadata::new(ca_id, base_question_count, min_questions, max_questions);
        self.store.put_interview(&meta)?;
        Ok(meta)
    }

    /// Runs detection + heuristics + generation for one completed answer.
    /// Never propagates model failures.
    pub async fn on_answer(
        &self,
        ca_id: &str,
        base_index: usize,
        question_text: &str,
        answer_text: &str,
    ) -> FollowUpOutcome {
        match self
            .try_on_answer(ca_id, base_index, question_text, answer_text)
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(ca_id, base_index, error = %e, "follow-up pipeline failed; continuing without");
                FollowUpOutcome::Skipped {
                    error: e.to_string(),
                }
            }
        }
    }

    async fn try_on_answer(
        &self,
        ca_id: &str,
        base_index: usize,
        question_text: &str,
        answer_text: &str,
    ) -> EngineResult<FollowUpOutcome> {
        let Some(meta) = self.store.get_interview(ca_id)? else {
            return Ok(FollowUpOutcome::Rejected {
                reason: "no adaptive interview configured".to_string(),
            });
        };

        let verdict = self.detect(question_text, answer_text).await?;
        let confidence = verdict.confidence;
        let meta = self.store.update_interview(ca_id, |m| {
            m.record_detector_call(confidence);
            Ok(())
        })?;

        let origin_key = base_sort_key(base_index);
        let existing = self.store.list_followups(&meta.id)?;
        let existing_for_origin = existing
            .iter()
            .filter(|f| f.origin_sort_key == origin_key)
            .count();

        if let Err(reason) = admit_followup(&meta, base_index, existing_for_origin, &verdict) {
            self.store.update_interview(ca_id, |m| {
                m.rejected_count += 1;
                Ok(())
            })?;
            info!(ca_id, base_index, %reason, "follow-up rejected by heuristics");
            return Ok(FollowUpOutcome::Rejected { reason });
        }

        // The detector's summary, not the raw answer, feeds generation to
        // bound prompt size.
        let recent: Vec<String> = existing
            .iter()
            .rev()
            .take(DUPLICATE_WINDOW)
            .map(|f| f.question.clone())
            .collect();
        let mut generated = self
            .generate(question_text, &verdict, false)
            .await?;
        if is_duplicate(&generated.0, &recent) {
            generated = self.generate(question_text, &verdict, true).await?;
            if is_duplicate(&generated.0, &recent) {
                self.store.update_interview(ca_id, |m| {
                    m.rejected_count += 1;
                    Ok(())
                })?;
                return Ok(FollowUpOutcome::Rejected {
                    reason: "generator produced only duplicates".to_string(),
                });
            }
        }

        let sort_key = followup_sort_key(origin_key, existing_for_origin);
        let followup = FollowUpQuestion::new(
            &meta.id,
            origin_key,
            sort_key,
            generated.0,
            generated.1,
            &verdict.reason,
        );
        match self.store.insert_followup(&followup) {
            Ok(()) => {}
            Err(EngineError::Conflict(_)) => {
                // Another writer filled this slot between our read and
                // insert; treat as a rejection rather than erroring the save.
                return Ok(FollowUpOutcome::Rejected {
                    reason: "follow-up slot already taken".to_string(),
                });
            }
            Err(e) => return Err(e),
        }
        self.store.update_interview(ca_id, |m| {
            m.followup_count += 1;
            m.current_total_questions += 1;
            m.last_followup_position = sort_key;
            m.approved_count += 1;
            Ok(())
        })?;
        info!(ca_id, base_index, sort_key, "follow-up generated");
        Ok(FollowUpOutcome::Generated(followup))
    }

    /// Ordered question sequence for one attempt (by sort key).
    pub fn list_followups(&self, ca_id: &str) -> EngineResult<Vec<FollowUpQuestion>> {
        match self.store.get_interview(ca_id)? {
            Some(meta) => self.store.list_followups(&meta.id),
            None => Ok(Vec::new()),
        }
    }

    async fn detect(&self, question: &str, answer: &str) -> EngineResult<DetectorVerdict> {
        let request = LlmRequest::new(prompts::detector_prompt(question, answer))
            .with_system(prompts::DETECTOR_SYSTEM)
            .with_temperature(0.1);
        let value = self
            .llm
            .complete_json(&request, prompts::DETECTOR_SCHEMA)
            .await?;
        Ok(DetectorVerdict {
            need_follow_up: value
                .get("need_follow_up")
                .and_then(|v| v.as_bool())
                .unwrap_or(false),
            confidence: value
                .get("confidence")
                .and_then(|v| v.as_f64())
                .unwrap_or(0.0)
                .clamp(0.0, 1.0),
            reason: value
                .get("reason")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
            summarized_answer: value
                .get("summarized_answer")
                .and_then(|v| v.as_str())
                .unwrap_or(answer)
                .to_string(),
        })
    }

    async fn generate(
        &self,
        question: &str,
        verdict: &DetectorVerdict,
        stricter: bool,
    ) -> EngineResult<(String, String)> {
        let request = LlmRequest::new(prompts::generator_prompt(
            question,
            &verdict.summarized_answer,
            &verdict.reason,
            stricter,
        ))
        .with_system(prompts::GENERATOR_SYSTEM)
        .with_temperature(if stricter { 0.9 } else { 0.6 });
        let value = self
            .llm
            .complete_json(&request, prompts::GENERATOR_SCHEMA)
            .await?;
        let question = value
            .get("follow_up_question")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        if question.trim().is_empty() {
            return Err(EngineError::LlmBadJson(
                "generator returned an empty follow-up".to_string(),
            ));
        }
        let expected = value
            .get("expected_answer")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        Ok((question, expected))
    }
}

/// Budget heuristics. Returns the rejection reason when the follow-up is
/// not admitted.
pub fn admit_followup(
    meta: &InterviewMetadata,
    base_index: usize,
    existing_for_origin: usize,
    verdict: &DetectorVerdict,
) -> Result<(), String> {
    if !verdict.need_follow_up {
        return Err("detector saw no gap worth probing".to_string());
    }
    if meta.followup_count >= meta.target_followups() {
        return Err("target follow-ups reached, limited slots remaining".to_string());
    }
    if meta.current_total_questions >= meta.max_questions {
        return Err("question budget exhausted".to_string());
    }
    // Reserve one slot for every base question not yet asked.
    let remaining_bases = meta
        .base_question_count
        .saturating_sub(base_index as u32 + 1);
    if meta.current_total_questions + 1 + remaining_bases > meta.max_questions {
        return Err("remaining slots are reserved for base questions".to_string());
    }
    if existing_for_origin >= MAX_FOLLOWUPS_PER_BASE {
        return Err("this question already has its follow-up quota".to_string());
    }
    let threshold = if meta.current_total_questions >= meta.min_questions {
        CONFIDENCE_THRESHOLD_SATISFIED
    } else {
        CONFIDENCE_THRESHOLD
    };
    if verdict.confidence < threshold {
        return Err(format!(
            "detector confidence {:.2} below threshold {threshold:.2}",
            verdict.confidence
        ));
    }
    Ok(())
}

/// Normalized string equality: lowercase, punctuation stripped, whitespace
/// collapsed.
pub fn normalize_question(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_duplicate(candidate: &str, recent: &[String]) -> bool {
    let normalized = normalize_question(candidate);
    recent.iter().any(|q| normalize_question(q) == normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verdict(confidence: f64) -> DetectorVerdict {
        DetectorVerdict {
            need_follow_up: true,
            confidence,
            reason: "gap".into(),
            summarized_answer: "summary".into(),
        }
    }

    fn meta(base: u32, max: u32) -> InterviewMetadata {
        InterviewMetadata::new("ca", base, base, max)
    }

    #[test]
    fn admits_confident_verdicts_within_budget() {
        let m = meta(3, 9);
        assert!(admit_followup(&m, 0, 0, &verdict(0.7)).is_ok());
    }

    #[test]
    fn rejects_below_threshold() {
        let m = meta(3, 9);
        let err = admit_followup(&m, 0, 0, &verdict(0.5)).unwrap_err();
        assert!(err.contains("below threshold"));
    }

    #[test]
    fn stricter_threshold_once_minimum_is_met() {
        let mut m = meta(3, 9);
        m.current_total_questions = m.min_questions;
        assert!(admit_followup(&m, 2, 0, &verdict(0.7)).is_err());
        assert!(admit_followup(&m, 2, 0, &verdict(0.8)).is_ok());
    }

    #[test]
    fn target_cap_rejects_even_high_confidence() {
        let mut m = meta(3, 6);
        // target = min(ceil(4.5), 3) = 3 follow-ups
        m.followup_count = m.target_followups();
        m.current_total_questions = 6;
        let err = admit_followup(&m, 2, 0, &verdict(0.9)).unwrap_err();
        assert_eq!(err, "target follow-ups reached, limited slots remaining");
    }

    #[test]
    fn slots_stay_reserved_for_remaining_bases() {
        let mut m = meta(4, 6);
        // After base 0 and one follow-up: 3 bases remain, 5 questions total.
        m.current_total_questions = 5;
        m.followup_count = 1;
        let err = admit_followup(&m, 0, 1, &verdict(0.9)).unwrap_err();
        assert!(err.contains("reserved for base questions"));
    }

    #[test]
    fn per_base_quota_is_two() {
        let m = meta(3, 12);
        let err = admit_followup(&m, 0, 2, &verdict(0.9)).unwrap_err();
        assert!(err.contains("quota"));
    }

    #[test]
    fn normalization_catches_punctuation_variants() {
        assert!(is_duplicate(
            "What happens when the cache is cold?",
            &["what happens, when the cache is cold".to_string()]
        ));
        assert!(!is_duplicate("Entirely new question", &["old one".to_string()]));
    }
}
