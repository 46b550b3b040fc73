//! Code-execution coordinator: runs candidate code against test cases via
//! the sandbox gateway, computes weighted correctness, and keeps hidden
//! cases hidden.
//!
//! `run` exercises sample cases only and appends to the run history without
//! touching scores. `submit` runs the full case list, persists per-case
//! records with hidden-case fields redacted, and returns sample results
//! verbatim plus hidden aggregates — never raw hidden inputs or outputs.

use crate::error::{EngineError, EngineResult};
use crate::model::{
    AssessmentSet, CandidateAssessment, ProgrammingEntry, RunRecord, Section, TestCase,
    TestCaseRecord,
};
use crate::sandbox::{CaseOutcome, CaseSpec, SandboxGateway};
use crate::session::{SessionLocks, HIDDEN_PLACEHOLDER};
use crate::store::Store;
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

/// Sample-case result returned to the candidate verbatim.
#[derive(Debug, Clone, Serialize)]
pub struct VisibleCaseResult {
    pub input: String,
    pub expected_output: String,
    pub actual_output: String,
    pub passed: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub visible_results: Vec<VisibleCaseResult>,
    pub passed: u32,
    pub total: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmitOutcome {
    pub visible_results: Vec<VisibleCaseResult>,
    pub hidden_tests_passed: u32,
    pub hidden_tests_total: u32,
    pub test_cases_passed: u32,
    pub total_test_cases: u32,
    pub correctness_score: f64,
}

pub struct CodeExecutor {
    store: Arc<Store>,
    sandbox: SandboxGateway,
    locks: Arc<SessionLocks>,
}

impl CodeExecutor {
    pub fn new(store: Arc<Store>, sandbox: SandboxGateway, locks: Arc<SessionLocks>) -> Self {
        Self {
            store,
            sandbox,
            locks,
        }
    }

    /// Runs code against the question's sample cases only. Appends a run
    /// record; never alters scores.
    pub async fn run(
        &self,
        ca: &CandidateAssessment,
        set: &AssessmentSet,
        question_id: &str,
        code: &str,
        language_id: u32,
    ) -> EngineResult<RunOutcome> {
        let question = set
            .find_programming(question_id)
            .ok_or_else(|| EngineError::not_found("programming question"))?;
        let samples: Vec<&TestCase> = question.sample_cases().collect();
        let specs: Vec<CaseSpec> = samples
            .iter()
            .map(|t| CaseSpec {
                input: t.input.clone(),
                expected_output: t.expected_output.clone(),
            })
            .collect();
        let outcomes = self.sandbox.run_test_cases(code, language_id, &specs).await;
        let passed = outcomes.iter().filter(|o| o.passed).count() as u32;
        let total = outcomes.len() as u32;

        let lock = self.locks.for_candidate(&ca.id);
        let _guard = lock.lock().await;
        let question_id_owned = question_id.to_string();
        let code_owned = code.to_string();
        self.store
            .update_answer(&ca.id, Section::Programming, |answer| {
                let entry = ensure_entry(answer, &question_id_owned, &code_owned, language_id);
                entry.run_history.push(RunRecord {
                    language_id,
                    passed,
                    total,
                    ran_at: Utc::now(),
                });
                Ok(())
            })?;

        Ok(RunOutcome {
            visible_results: visible_results(&samples, &outcomes),
            passed,
            total,
        })
    }

    /// Runs code against all cases (sample + hidden), computes weighted
    /// correctness, and persists per-case records with hidden fields
    /// redacted to [`HIDDEN_PLACEHOLDER`].
    pub async fn submit(
        &self,
        ca: &CandidateAssessment,
        set: &AssessmentSet,
        question_id: &str,
        code: &str,
        language_id: u32,
    ) -> EngineResult<SubmitOutcome> {
        let question = set
            .find_programming(question_id)
            .ok_or_else(|| EngineError::not_found("programming question"))?;
        let cases: Vec<&TestCase> = question.test_cases.iter().collect();
        let specs: Vec<CaseSpec> = cases
            .iter()
            .map(|t| CaseSpec {
                input: t.input.clone(),
                expected_output: t.expected_output.clone(),
            })
            .collect();
        let outcomes = self.sandbox.run_test_cases(code, language_id, &specs).await;

        let passed_flags: Vec<bool> = outcomes.iter().map(|o| o.passed).collect();
        let correctness = weighted_correctness(&question.test_cases, &passed_flags);
        let test_cases_passed = passed_flags.iter().filter(|p| **p).count() as u32;
        let total_test_cases = cases.len() as u32;
        let hidden_tests_total = cases.iter().filter(|t| t.is_hidden).count() as u32;
        let hidden_tests_passed = cases
            .iter()
            .zip(&passed_flags)
            .filter(|(t, p)| t.is_hidden && **p)
            .count() as u32;

        // Stored records may later be exposed; hidden-case fields are
        // redacted before they ever hit disk.
        let records: Vec<TestCaseRecord> = cases
            .iter()
            .zip(&outcomes)
            .map(|(case, outcome)| {
                if case.is_hidden {
                    TestCaseRecord {
                        input: HIDDEN_PLACEHOLDER.to_string(),
                        expected_output: HIDDEN_PLACEHOLDER.to_string(),
                        actual_output: HIDDEN_PLACEHOLDER.to_string(),
                        passed: outcome.passed,
                        is_hidden: true,
                        error: outcome.error.clone(),
                    }
                } else {
                    TestCaseRecord {
                        input: case.input.clone(),
                        expected_output: case.expected_output.clone(),
                        actual_output: outcome.actual_output.clone(),
                        passed: outcome.passed,
                        is_hidden: false,
                        error: outcome.error.clone(),
                    }
                }
            })
            .collect();

        let lock = self.locks.for_candidate(&ca.id);
        let _guard = lock.lock().await;
        let question_id_owned = question_id.to_string();
        let code_owned = code.to_string();
        self.store
            .update_answer(&ca.id, Section::Programming, |answer| {
                let entry = ensure_entry(answer, &question_id_owned, &code_owned, language_id);
                entry.code = code_owned.clone();
                entry.language_id = language_id;
                entry.test_cases_passed = test_cases_passed;
                entry.total_test_cases = total_test_cases;
                entry.correctness_score = correctness;
                entry.last_results = records.clone();
                entry.submitted_at = Some(Utc::now());
                Ok(())
            })?;
        info!(
            ca_id = %ca.id,
            question_id,
            test_cases_passed,
            total_test_cases,
            correctness,
            "code submission scored"
        );

        let samples: Vec<&TestCase> = question.sample_cases().collect();
        let sample_outcomes: Vec<CaseOutcome> = cases
            .iter()
            .zip(&outcomes)
            .filter(|(t, _)| !t.is_hidden)
            .map(|(_, o)| o.clone())
            .collect();
        Ok(SubmitOutcome {
            visible_results: visible_results(&samples, &sample_outcomes),
            hidden_tests_passed,
            hidden_tests_total,
            test_cases_passed,
            total_test_cases,
            correctness_score: correctness,
        })
    }
}

fn ensure_entry<'a>(
    answer: &'a mut crate::model::AssessmentAnswer,
    question_id: &str,
    code: &str,
    language_id: u32,
) -> &'a mut ProgrammingEntry {
    let position = match answer
        .programming
        .iter()
        .position(|e| e.question_id == question_id)
    {
        Some(position) => position,
        None => {
            answer.programming.push(ProgrammingEntry {
                question_id: question_id.to_string(),
                code: code.to_string(),
                language_id,
                test_cases_passed: 0,
                total_test_cases: 0,
                correctness_score: 0.0,
                last_results: Vec::new(),
                run_history: Vec::new(),
                submitted_at: None,
            });
            answer.programming.len() - 1
        }
    };
    &mut answer.programming[position]
}

fn visible_results(samples: &[&TestCase], outcomes: &[CaseOutcome]) -> Vec<VisibleCaseResult> {
    samples
        .iter()
        .zip(outcomes)
        .map(|(case, outcome)| VisibleCaseResult {
            input: case.input.clone(),
            expected_output: case.expected_output.clone(),
            actual_output: outcome.actual_output.clone(),
            passed: outcome.passed,
            error: outcome.error.clone(),
        })
        .collect()
}

/// `100 * sum(w_i * passed_i) / sum(w_i)` with `w_i = weight` (a zero weight
/// contributes nothing). All-zero weights score 0.
pub fn weighted_correctness(cases: &[TestCase], passed: &[bool]) -> f64 {
    let weight_total: u64 = cases.iter().map(|c| u64::from(c.weight)).sum();
    if weight_total == 0 {
        return 0.0;
    }
    let earned: u64 = cases
        .iter()
        .zip(passed)
        .filter(|(_, p)| **p)
        .map(|(c, _)| u64::from(c.weight))
        .sum();
    earned as f64 / weight_total as f64 * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn case(weight: u32, hidden: bool) -> TestCase {
        TestCase {
            input: "in".into(),
            expected_output: "out".into(),
            is_hidden: hidden,
            weight,
        }
    }

    #[test]
    fn weighting_follows_case_weights() {
        let cases = vec![case(1, false), case(2, true), case(1, true)];
        let score = weighted_correctness(&cases, &[true, false, true]);
        assert!((score - 50.0).abs() < 1e-9);
    }

    #[test]
    fn zero_weight_case_contributes_nothing() {
        let cases = vec![case(0, false), case(1, true)];
        assert!((weighted_correctness(&cases, &[true, true]) - 100.0).abs() < 1e-9);
        assert!((weighted_correctness(&cases, &[true, false])).abs() < 1e-9);
    }

    #[test]
    fn all_zero_weights_score_zero() {
        let cases = vec![case(0, false), case(0, true)];
        assert_eq!(weighted_correctness(&cases, &[true, true]), 0.0);
    }
}
