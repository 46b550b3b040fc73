//! Evaluation: one per candidate assessment, holding per-section
//! aggregates, the weighted score, the AI recommendation and the admin
//! decision.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recommendation {
    #[serde(rename = "PASS")]
    Pass,
    #[serde(rename = "REVIEW")]
    Review,
    #[serde(rename = "FAIL")]
    Fail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdminDecision {
    #[serde(rename = "PASS")]
    Pass,
    #[serde(rename = "FAIL")]
    Fail,
    #[serde(rename = "HOLD")]
    Hold,
    #[serde(rename = "REVIEW_PENDING")]
    ReviewPending,
}

impl Default for AdminDecision {
    fn default() -> Self {
        AdminDecision::ReviewPending
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SectionResult {
    pub score: f64,
    pub max_score: f64,
    /// `score / max_score * 100`, 0 when the section has no points.
    pub percentage: f64,
}

impl SectionResult {
    pub fn new(score: f64, max_score: f64) -> Self {
        let percentage = if max_score > 0.0 {
            (score / max_score * 100.0).clamp(0.0, 100.0)
        } else {
            0.0
        };
        Self {
            score,
            max_score,
            percentage,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillScore {
    pub skill: String,
    pub score: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlagiarismReport {
    pub checked: bool,
    /// Similarity percentages in [0, 100].
    pub subjective_similarity: f64,
    pub code_similarity: f64,
    pub is_flagged: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evaluation {
    pub id: String,
    pub candidate_assessment_id: String,
    pub jd_id: String,
    pub objective: Option<SectionResult>,
    pub subjective: Option<SectionResult>,
    pub programming: Option<SectionResult>,
    pub total_score: f64,
    pub max_total_score: f64,
    pub percentage: f64,
    /// Section percentages combined by JD weights; always in [0, 100].
    pub weighted_score: f64,
    #[serde(default)]
    pub skill_scores: Vec<SkillScore>,
    pub plagiarism: PlagiarismReport,
    pub ai_recommendation: Recommendation,
    pub recommendation_confidence: u32,
    pub recommendation_reason: String,
    pub admin_decision: AdminDecision,
    pub decided_by: Option<String>,
    pub decided_at: Option<DateTime<Utc>>,
    pub evaluated_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl Evaluation {
    pub fn new(candidate_assessment_id: impl Into<String>, jd_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            candidate_assessment_id: candidate_assessment_id.into(),
            jd_id: jd_id.into(),
            objective: None,
            subjective: None,
            programming: None,
            total_score: 0.0,
            max_total_score: 0.0,
            percentage: 0.0,
            weighted_score: 0.0,
            skill_scores: Vec::new(),
            plagiarism: PlagiarismReport::default(),
            ai_recommendation: Recommendation::Review,
            recommendation_confidence: 0,
            recommendation_reason: String::new(),
            admin_decision: AdminDecision::default(),
            decided_by: None,
            decided_at: None,
            evaluated_at: Utc::now(),
            duration_ms: 0,
        }
    }
}

/// Recommendation banding around the JD cutoff. Returns the band, its
/// confidence, and a reason string.
pub fn recommendation_band(weighted_score: f64, cutoff: u32) -> (Recommendation, u32, String) {
    let cutoff = f64::from(cutoff);
    if weighted_score >= cutoff + 15.0 {
        (
            Recommendation::Pass,
            85,
            format!("score {weighted_score:.1} clears cutoff {cutoff:.0} by 15+"),
        )
    } else if weighted_score >= cutoff {
        (
            Recommendation::Review,
            60,
            format!("score {weighted_score:.1} is at or above cutoff {cutoff:.0} but within 15"),
        )
    } else if weighted_score >= cutoff - 10.0 {
        (
            Recommendation::Review,
            70,
            format!("score {weighted_score:.1} is within 10 below cutoff {cutoff:.0}"),
        )
    } else {
        (
            Recommendation::Fail,
            80,
            format!("score {weighted_score:.1} is more than 10 below cutoff {cutoff:.0}"),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn banding_boundaries() {
        let cutoff = 60;
        assert_eq!(recommendation_band(75.0, cutoff).0, Recommendation::Pass);
        assert_eq!(recommendation_band(74.9, cutoff).0, Recommendation::Review);
        assert_eq!(recommendation_band(60.0, cutoff).0, Recommendation::Review);
        let (band, confidence, _) = recommendation_band(50.0, cutoff);
        assert_eq!(band, Recommendation::Review);
        assert_eq!(confidence, 70);
        assert_eq!(recommendation_band(49.9, cutoff).0, Recommendation::Fail);
    }

    #[test]
    fn section_result_handles_zero_max() {
        let r = SectionResult::new(0.0, 0.0);
        assert_eq!(r.percentage, 0.0);
    }
}
