//! Integration test: code-execution coordinator against a scripted
//! sandbox.
//!
//! ## Scenarios
//! 1. Run touches sample cases only and appends run history.
//! 2. Submit runs the full list, returns hidden aggregates only, and stores
//!    hidden-case fields as "[hidden]".
//! 3. Weighted correctness follows per-case weights.
//! 4. A failing batch degrades to per-case errors without aborting the
//!    remaining batches.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use vetta_core::{
    AssessmentSet, CandidateAssessment, CodeExecutor, Difficulty, EngineResult,
    ProgrammingQuestion, SandboxClient, SandboxGateway, Section, SessionLocks, Store, Submission,
    SubmissionOutcome, TestCase, HIDDEN_PLACEHOLDER, TEST_CASE_SEPARATOR,
};

/// Echo judge: answers each batched input `a b` with `a + b`, so expected
/// outputs can be scripted through the case definitions.
struct AdderSandbox {
    submissions: AtomicU32,
    fail_batches_after: Option<u32>,
}

#[async_trait]
impl SandboxClient for AdderSandbox {
    async fn execute(&self, submission: &Submission) -> EngineResult<SubmissionOutcome> {
        let n = self.submissions.fetch_add(1, Ordering::SeqCst);
        if let Some(limit) = self.fail_batches_after {
            if n >= limit {
                return Err(vetta_core::EngineError::SandboxTimeout);
            }
        }
        let outputs: Vec<String> = submission
            .stdin
            .split(TEST_CASE_SEPARATOR)
            .map(|piece| {
                let numbers: Vec<i64> = piece
                    .split_whitespace()
                    .filter_map(|t| t.parse().ok())
                    .collect();
                numbers.iter().sum::<i64>().to_string()
            })
            .collect();
        Ok(SubmissionOutcome {
            stdout: outputs.join(&format!("\n{TEST_CASE_SEPARATOR}\n")),
            stderr: String::new(),
            compile_output: String::new(),
            status_id: 3,
            status_description: "Accepted".to_string(),
        })
    }
}

fn question(cases: Vec<TestCase>) -> ProgrammingQuestion {
    ProgrammingQuestion {
        question_id: "programming_0".to_string(),
        title: "Sum".to_string(),
        problem_statement: "Print the sum of the integers on stdin.".to_string(),
        starter_code: None,
        test_cases: cases,
        points: 20,
        difficulty: Difficulty::Easy,
        skill: Some("arithmetic".to_string()),
    }
}

fn case(input: &str, expected: &str, hidden: bool, weight: u32) -> TestCase {
    TestCase {
        input: input.to_string(),
        expected_output: expected.to_string(),
        is_hidden: hidden,
        weight,
    }
}

struct Harness {
    _dir: tempfile::TempDir,
    store: Arc<Store>,
    executor: CodeExecutor,
    ca: CandidateAssessment,
    set: AssessmentSet,
}

fn harness(cases: Vec<TestCase>, fail_batches_after: Option<u32>) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(Store::open(dir.path()).unwrap());
    let sandbox = SandboxGateway::new(Arc::new(AdderSandbox {
        submissions: AtomicU32::new(0),
        fail_batches_after,
    }));
    let executor = CodeExecutor::new(store.clone(), sandbox, Arc::new(SessionLocks::new()));

    let mut set = AssessmentSet::new("jd1", "Set 1");
    set.programming.push(question(cases));
    set.finalize();
    store.insert_set(&set).unwrap();

    let ca = CandidateAssessment::new("u1", "jd1");
    store.insert_candidate(&ca).unwrap();
    Harness {
        _dir: dir,
        store,
        executor,
        ca,
        set,
    }
}

#[tokio::test]
async fn run_uses_samples_only_and_records_history() {
    let h = harness(
        vec![
            case("1 2", "3", false, 1),
            case("10 20", "31", false, 1), // deliberately wrong expectation
            case("5 7", "12", true, 2),
        ],
        None,
    );
    let outcome = h
        .executor
        .run(&h.ca, &h.set, "programming_0", "code", 71)
        .await
        .unwrap();
    assert_eq!(outcome.total, 2, "hidden case not executed on run");
    assert_eq!(outcome.passed, 1);

    let answer = h.store.get_answer(&h.ca.id, Section::Programming).unwrap().unwrap();
    let entry = &answer.programming[0];
    assert_eq!(entry.run_history.len(), 1);
    assert_eq!(entry.run_history[0].passed, 1);
    assert_eq!(entry.correctness_score, 0.0, "run never scores");
}

#[tokio::test]
async fn submit_redacts_hidden_cases_in_storage_and_response() {
    let h = harness(
        vec![
            case("1 2", "3", false, 1),
            case("5 7", "12", true, 1),
            case("100 1", "101", true, 1),
        ],
        None,
    );
    let outcome = h
        .executor
        .submit(&h.ca, &h.set, "programming_0", "code", 71)
        .await
        .unwrap();

    assert_eq!(outcome.visible_results.len(), 1);
    assert_eq!(outcome.visible_results[0].actual_output, "3");
    assert_eq!(outcome.hidden_tests_total, 2);
    assert_eq!(outcome.hidden_tests_passed, 2);
    assert_eq!(outcome.test_cases_passed, 3);
    assert!((outcome.correctness_score - 100.0).abs() < 1e-9);

    let serialized = serde_json::to_string(&outcome).unwrap();
    assert!(!serialized.contains("5 7") && !serialized.contains("101"));

    let answer = h.store.get_answer(&h.ca.id, Section::Programming).unwrap().unwrap();
    let entry = &answer.programming[0];
    assert_eq!(entry.last_results.len(), 3);
    for record in entry.last_results.iter().filter(|r| r.is_hidden) {
        assert_eq!(record.input, HIDDEN_PLACEHOLDER);
        assert_eq!(record.expected_output, HIDDEN_PLACEHOLDER);
        assert_eq!(record.actual_output, HIDDEN_PLACEHOLDER);
        assert!(record.passed);
    }
}

#[tokio::test]
async fn weighted_correctness_follows_case_weights() {
    let h = harness(
        vec![
            case("1 2", "3", false, 1),
            case("2 2", "5", true, 3), // fails: 4 != 5
        ],
        None,
    );
    let outcome = h
        .executor
        .submit(&h.ca, &h.set, "programming_0", "code", 71)
        .await
        .unwrap();
    assert_eq!(outcome.test_cases_passed, 1);
    assert!((outcome.correctness_score - 25.0).abs() < 1e-9);
}

#[tokio::test]
async fn failing_batch_fails_open_per_case() {
    // Seven cases -> two batches of 5 + 2; the second batch errors.
    let cases: Vec<TestCase> = (0..7)
        .map(|i| case(&format!("{i} {i}"), &format!("{}", i * 2), i >= 5, 1))
        .collect();
    let h = harness(cases, Some(1));
    let outcome = h
        .executor
        .submit(&h.ca, &h.set, "programming_0", "code", 71)
        .await
        .unwrap();
    assert_eq!(outcome.total_test_cases, 7);
    assert_eq!(outcome.test_cases_passed, 5, "first batch still counted");

    let answer = h.store.get_answer(&h.ca.id, Section::Programming).unwrap().unwrap();
    let errored: Vec<_> = answer.programming[0]
        .last_results
        .iter()
        .filter(|r| r.error.is_some())
        .collect();
    assert_eq!(errored.len(), 2);
}
