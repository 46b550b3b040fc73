//! Per-section answer document. One per `(candidate assessment, section)`;
//! entries are upserted by question id so concurrent saves for distinct
//! questions never clobber each other.

use super::{AssessmentSet, Section};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectiveEntry {
    pub question_id: String,
    pub selected_option_index: Option<usize>,
    /// Populated only at section-submit time.
    pub is_correct: Option<bool>,
    pub points_awarded: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubjectiveEntry {
    pub question_id: String,
    pub text: String,
    /// Whitespace-split token count, maintained on save.
    pub word_count: u32,
    pub ai_score: Option<f64>,
    pub ai_feedback: Option<String>,
}

/// Outcome of one test case, as persisted. Hidden-case inputs and expected
/// outputs are redacted before this record is stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCaseRecord {
    pub input: String,
    pub expected_output: String,
    pub actual_output: String,
    pub passed: bool,
    pub is_hidden: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub language_id: u32,
    pub passed: u32,
    pub total: u32,
    pub ran_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgrammingEntry {
    pub question_id: String,
    pub code: String,
    pub language_id: u32,
    pub test_cases_passed: u32,
    pub total_test_cases: u32,
    /// Weighted correctness in [0, 100].
    pub correctness_score: f64,
    #[serde(default)]
    pub last_results: Vec<TestCaseRecord>,
    #[serde(default)]
    pub run_history: Vec<RunRecord>,
    pub submitted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssessmentAnswer {
    pub id: String,
    pub candidate_assessment_id: String,
    pub section: Section,
    #[serde(default)]
    pub objective: Vec<ObjectiveEntry>,
    #[serde(default)]
    pub subjective: Vec<SubjectiveEntry>,
    #[serde(default)]
    pub programming: Vec<ProgrammingEntry>,
    pub started_at: Option<DateTime<Utc>>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub is_submitted: bool,
    pub time_spent_seconds: u64,
    pub section_score: f64,
    pub section_max_score: f64,
}

impl AssessmentAnswer {
    pub fn new(candidate_assessment_id: impl Into<String>, section: Section) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            candidate_assessment_id: candidate_assessment_id.into(),
            section,
            objective: Vec::new(),
            subjective: Vec::new(),
            programming: Vec::new(),
            started_at: Some(Utc::now()),
            submitted_at: None,
            is_submitted: false,
            time_spent_seconds: 0,
            section_score: 0.0,
            section_max_score: 0.0,
        }
    }

    /// Count of answered questions across the typed arrays (the section
    /// determines which array is populated).
    pub fn answered_count(&self) -> u32 {
        (self.objective.len() + self.subjective.len() + self.programming.len()) as u32
    }

    /// Grades the objective array against the assigned set: an entry is
    /// correct iff the selected index is in range and marked correct.
    /// Returns `(score, max_score)` and fills `is_correct`/`points_awarded`.
    pub fn grade_objective(&mut self, set: &AssessmentSet) -> (f64, f64) {
        let mut score = 0u32;
        for entry in &mut self.objective {
            let Some(question) = set.find_objective(&entry.question_id) else {
                entry.is_correct = Some(false);
                entry.points_awarded = 0;
                continue;
            };
            let correct = entry
                .selected_option_index
                .map(|i| question.options.get(i).map(|o| o.is_correct).unwrap_or(false))
                .unwrap_or(false);
            entry.is_correct = Some(correct);
            entry.points_awarded = if correct { question.points } else { 0 };
            score += entry.points_awarded;
        }
        let max: u32 = set.objective.iter().map(|q| q.points).sum();
        self.section_score = f64::from(score);
        self.section_max_score = f64::from(max);
        (self.section_score, self.section_max_score)
    }

    pub fn find_objective_mut(&mut self, question_id: &str) -> Option<&mut ObjectiveEntry> {
        self.objective.iter_mut().find(|e| e.question_id == question_id)
    }

    pub fn find_subjective_mut(&mut self, question_id: &str) -> Option<&mut SubjectiveEntry> {
        self.subjective.iter_mut().find(|e| e.question_id == question_id)
    }

    pub fn find_programming_mut(&mut self, question_id: &str) -> Option<&mut ProgrammingEntry> {
        self.programming.iter_mut().find(|e| e.question_id == question_id)
    }
}

/// Whitespace-split token count used for subjective answers.
pub fn word_count(text: &str) -> u32 {
    text.split_whitespace().count() as u32
}
