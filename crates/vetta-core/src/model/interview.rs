//! Adaptive interview bookkeeping: per-interview budget metadata and the
//! integer sort-key scheme that interleaves follow-ups with base questions.
//!
//! Base question `b` sits at sort-key `b * 1000`; its k-th follow-up at
//! `b * 1000 + k`. Integer keys make insertion stable and avoid the float
//! precision trap of decimal ordering.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Spacing between base-question sort keys, bounding follow-ups per base
/// well above the heuristic cap of 2.
pub const SORT_KEY_STRIDE: i64 = 1000;

pub fn base_sort_key(base_index: usize) -> i64 {
    base_index as i64 * SORT_KEY_STRIDE
}

pub fn followup_sort_key(origin_sort_key: i64, existing_for_origin: usize) -> i64 {
    origin_sort_key + existing_for_origin as i64 + 1
}

/// Rank of each sort-key in ascending order = display index.
pub fn display_order(sort_keys: &mut Vec<i64>) {
    sort_keys.sort_unstable();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterviewStatus {
    Active,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterviewMetadata {
    pub id: String,
    pub candidate_assessment_id: String,
    pub min_questions: u32,
    pub max_questions: u32,
    pub base_question_count: u32,
    pub current_total_questions: u32,
    pub followup_count: u32,
    /// Sort key of the most recently inserted follow-up.
    pub last_followup_position: i64,
    /// Running mean over all detector calls.
    pub avg_detector_confidence: f64,
    pub detector_call_count: u32,
    pub approved_count: u32,
    pub rejected_count: u32,
    pub status: InterviewStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InterviewMetadata {
    pub fn new(
        candidate_assessment_id: impl Into<String>,
        base_question_count: u32,
        min_questions: u32,
        max_questions: u32,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            candidate_assessment_id: candidate_assessment_id.into(),
            min_questions,
            max_questions,
            base_question_count,
            current_total_questions: base_question_count,
            followup_count: 0,
            last_followup_position: -1,
            avg_detector_confidence: 0.0,
            detector_call_count: 0,
            approved_count: 0,
            rejected_count: 0,
            status: InterviewStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    /// `min(ceil(1.5 * base), max - base)`.
    pub fn target_followups(&self) -> u32 {
        let by_ratio = (f64::from(self.base_question_count) * 1.5).ceil() as u32;
        by_ratio.min(self.max_questions.saturating_sub(self.base_question_count))
    }

    /// Folds one detector confidence into the running mean.
    pub fn record_detector_call(&mut self, confidence: f64) {
        let n = f64::from(self.detector_call_count);
        self.avg_detector_confidence = (self.avg_detector_confidence * n + confidence) / (n + 1.0);
        self.detector_call_count += 1;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowUpQuestion {
    pub id: String,
    pub interview_id: String,
    /// Sort key of the base question this follows up on.
    pub origin_sort_key: i64,
    pub sort_key: i64,
    pub question: String,
    pub expected_answer: String,
    /// Detector reason that admitted this follow-up.
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

impl FollowUpQuestion {
    pub fn new(
        interview_id: impl Into<String>,
        origin_sort_key: i64,
        sort_key: i64,
        question: impl Into<String>,
        expected_answer: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            interview_id: interview_id.into(),
            origin_sort_key,
            sort_key,
            question: question.into(),
            expected_answer: expected_answer.into(),
            reason: reason.into(),
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn followups_land_between_their_base_and_the_next() {
        let b1 = base_sort_key(1);
        let b2 = base_sort_key(2);
        let f1 = followup_sort_key(b1, 0);
        let f2 = followup_sort_key(b1, 1);
        assert!(b1 < f1 && f1 < f2 && f2 < b2);
    }

    #[test]
    fn display_order_interleaves_stably() {
        let mut keys = vec![base_sort_key(0), base_sort_key(1), followup_sort_key(base_sort_key(0), 0)];
        display_order(&mut keys);
        assert_eq!(keys, vec![0, 1, 1000]);
    }

    #[test]
    fn target_followups_is_capped_by_remaining_budget() {
        let meta = InterviewMetadata::new("ca", 3, 3, 6);
        // ceil(1.5 * 3) = 5, capped at 6 - 3 remaining slots
        assert_eq!(meta.target_followups(), 3);
        let meta = InterviewMetadata::new("ca", 4, 4, 12);
        assert_eq!(meta.target_followups(), 6);
    }

    #[test]
    fn running_mean_tracks_detector_confidence() {
        let mut meta = InterviewMetadata::new("ca", 3, 3, 6);
        meta.record_detector_call(0.8);
        meta.record_detector_call(0.6);
        assert!((meta.avg_detector_confidence - 0.7).abs() < 1e-9);
        assert_eq!(meta.detector_call_count, 2);
    }
}
