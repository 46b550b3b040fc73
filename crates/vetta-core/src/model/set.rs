//! Assessment set: one pre-generated question packet. Created atomically by
//! the set generator and immutable afterwards (only `is_active` toggles).

use crate::error::{EngineError, EngineResult, FieldError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Default for Difficulty {
    fn default() -> Self {
        Difficulty::Medium
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerOption {
    pub text: String,
    #[serde(default)]
    pub is_correct: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectiveQuestion {
    pub question_id: String,
    pub text: String,
    pub options: Vec<AnswerOption>,
    pub points: u32,
    #[serde(default)]
    pub difficulty: Difficulty,
    pub skill: Option<String>,
}

impl ObjectiveQuestion {
    /// Index of the single correct option.
    pub fn correct_index(&self) -> Option<usize> {
        self.options.iter().position(|o| o.is_correct)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubjectiveQuestion {
    pub question_id: String,
    pub text: String,
    /// Evaluator-only; never served to the candidate.
    pub expected_answer: String,
    pub rubric: Option<String>,
    pub max_words: u32,
    pub points: u32,
    #[serde(default)]
    pub difficulty: Difficulty,
    pub skill: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCase {
    pub input: String,
    pub expected_output: String,
    pub is_hidden: bool,
    /// Contribution to weighted correctness; 0 contributes nothing.
    #[serde(default = "default_weight")]
    pub weight: u32,
}

fn default_weight() -> u32 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgrammingQuestion {
    pub question_id: String,
    pub title: String,
    pub problem_statement: String,
    pub starter_code: Option<String>,
    pub test_cases: Vec<TestCase>,
    pub points: u32,
    #[serde(default)]
    pub difficulty: Difficulty,
    pub skill: Option<String>,
}

impl ProgrammingQuestion {
    pub fn sample_cases(&self) -> impl Iterator<Item = &TestCase> {
        self.test_cases.iter().filter(|t| !t.is_hidden)
    }

    pub fn hidden_cases(&self) -> impl Iterator<Item = &TestCase> {
        self.test_cases.iter().filter(|t| t.is_hidden)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssessmentSet {
    pub id: String,
    pub jd_id: String,
    pub label: String,
    pub objective: Vec<ObjectiveQuestion>,
    pub subjective: Vec<SubjectiveQuestion>,
    pub programming: Vec<ProgrammingQuestion>,
    /// Sum of all question points; set by `finalize`.
    pub total_points: u32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl AssessmentSet {
    pub fn new(jd_id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            jd_id: jd_id.into(),
            label: label.into(),
            objective: Vec::new(),
            subjective: Vec::new(),
            programming: Vec::new(),
            total_points: 0,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    /// Recomputes `total_points`. Must be called before persisting; the
    /// store validator rejects sets where the sum is stale.
    pub fn finalize(&mut self) {
        self.total_points = self.objective.iter().map(|q| q.points).sum::<u32>()
            + self.subjective.iter().map(|q| q.points).sum::<u32>()
            + self.programming.iter().map(|q| q.points).sum::<u32>();
    }

    /// Structural invariants, enforced at persistence so no write path can
    /// bypass them: exactly one correct option per objective question, at
    /// least one sample and one hidden test case per programming question,
    /// and a fresh `total_points` sum.
    pub fn validate(&self) -> EngineResult<()> {
        let mut errors = Vec::new();
        for (i, q) in self.objective.iter().enumerate() {
            let correct = q.options.iter().filter(|o| o.is_correct).count();
            if correct != 1 {
                errors.push(FieldError::new(
                    format!("objective[{i}]"),
                    format!("expected exactly one correct option, found {correct}"),
                ));
            }
            if q.options.len() < 2 {
                errors.push(FieldError::new(
                    format!("objective[{i}]"),
                    "needs at least two options",
                ));
            }
        }
        for (i, q) in self.programming.iter().enumerate() {
            if q.sample_cases().next().is_none() {
                errors.push(FieldError::new(
                    format!("programming[{i}]"),
                    "needs at least one sample test case",
                ));
            }
            if q.hidden_cases().next().is_none() {
                errors.push(FieldError::new(
                    format!("programming[{i}]"),
                    "needs at least one hidden test case",
                ));
            }
        }
        let expected: u32 = self.objective.iter().map(|q| q.points).sum::<u32>()
            + self.subjective.iter().map(|q| q.points).sum::<u32>()
            + self.programming.iter().map(|q| q.points).sum::<u32>();
        if self.total_points != expected {
            errors.push(FieldError::new("totalPoints", "stale point sum; call finalize"));
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(EngineError::Validation(errors))
        }
    }

    pub fn find_objective(&self, question_id: &str) -> Option<&ObjectiveQuestion> {
        self.objective.iter().find(|q| q.question_id == question_id)
    }

    pub fn find_subjective(&self, question_id: &str) -> Option<&SubjectiveQuestion> {
        self.subjective.iter().find(|q| q.question_id == question_id)
    }

    pub fn find_programming(&self, question_id: &str) -> Option<&ProgrammingQuestion> {
        self.programming.iter().find(|q| q.question_id == question_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn objective(points: u32, correct: usize) -> ObjectiveQuestion {
        ObjectiveQuestion {
            question_id: "q".into(),
            text: "pick one".into(),
            options: (0..4)
                .map(|i| AnswerOption {
                    text: format!("option {i}"),
                    is_correct: i == correct,
                })
                .collect(),
            points,
            difficulty: Difficulty::Easy,
            skill: None,
        }
    }

    #[test]
    fn finalize_sums_all_sections() {
        let mut set = AssessmentSet::new("jd", "Set 1");
        set.objective.push(objective(2, 0));
        set.subjective.push(SubjectiveQuestion {
            question_id: "s1".into(),
            text: "explain".into(),
            expected_answer: "because".into(),
            rubric: None,
            max_words: 200,
            points: 5,
            difficulty: Difficulty::Medium,
            skill: None,
        });
        set.finalize();
        assert_eq!(set.total_points, 7);
        assert!(set.validate().is_ok());
    }

    #[test]
    fn two_correct_options_fail_validation() {
        let mut set = AssessmentSet::new("jd", "Set 1");
        let mut q = objective(1, 0);
        q.options[1].is_correct = true;
        set.objective.push(q);
        set.finalize();
        assert!(set.validate().is_err());
    }

    #[test]
    fn programming_needs_sample_and_hidden() {
        let mut set = AssessmentSet::new("jd", "Set 1");
        set.programming.push(ProgrammingQuestion {
            question_id: "p1".into(),
            title: "sum".into(),
            problem_statement: "add two ints".into(),
            starter_code: None,
            test_cases: vec![TestCase {
                input: "1 2".into(),
                expected_output: "3".into(),
                is_hidden: false,
                weight: 1,
            }],
            points: 10,
            difficulty: Difficulty::Easy,
            skill: None,
        });
        set.finalize();
        assert!(set.validate().is_err());
    }
}
