//! Integration test: JD lifecycle — link uniqueness under contention,
//! set-generation rollback, set invariants enforced at persistence, and
//! cascade delete.
//!
//! ## Scenarios
//! 1. Ten concurrent generate-link calls on distinct JDs yield ten distinct
//!    12-char links.
//! 2. Generation failure reverts the JD to `parsed`, releases the link,
//!    and records the error.
//! 3. A generated set violating the one-correct-option invariant never
//!    persists.
//! 4. Delete cascades sets and candidate data; deleting an active JD is
//!    refused.

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use vetta_core::{
    CandidateAssessment, EngineError, JdManager, JdStatus, LlmClient, LlmGateway, LlmRequest,
    LlmResponse, ParsedContent, ProviderError, SectionConfig, Store,
};

/// Serves one objective-question payload for every generation prompt.
struct GenerationLlm {
    payload: &'static str,
}

#[async_trait]
impl LlmClient for GenerationLlm {
    async fn chat(&self, request: &LlmRequest) -> Result<LlmResponse, ProviderError> {
        if request.prompt.contains("multiple-choice questions") {
            return Ok(LlmResponse {
                content: self.payload.to_string(),
                ..LlmResponse::default()
            });
        }
        Err(ProviderError::Unavailable("unrouted".to_string()))
    }
}

const VALID_OBJECTIVE: &str = r#"{"questions": [
  {"questionId": "objective_0", "text": "Q", "points": 1,
   "options": [{"text": "a", "isCorrect": true}, {"text": "b"}]}
]}"#;

/// Two options flagged correct: must never persist.
const BROKEN_OBJECTIVE: &str = r#"{"questions": [
  {"questionId": "objective_0", "text": "Q", "points": 1,
   "options": [{"text": "a", "isCorrect": true}, {"text": "b", "isCorrect": true}]}
]}"#;

fn manager(payload: &'static str) -> (tempfile::TempDir, Arc<Store>, Arc<JdManager>) {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(Store::open(dir.path()).unwrap());
    let llm = Arc::new(LlmGateway::new(Arc::new(GenerationLlm { payload }), "test-model"));
    let manager = Arc::new(JdManager::new(store.clone(), llm));
    (dir, store, manager)
}

/// Seeds a parsed, objective-only JD with a future window.
fn seeded_jd(store: &Arc<Store>) -> String {
    let mut jd = vetta_core::JobDescription::new("acme", "r1", "Role", "text");
    jd.status = JdStatus::Parsed;
    jd.parsed = Some(ParsedContent {
        role_title: "Role".to_string(),
        technical_skills: vec!["Rust".to_string()],
        ..ParsedContent::default()
    });
    jd.config.sections.objective = SectionConfig {
        enabled: true,
        question_count: 1,
        time_minutes: 10,
        weight: 100,
    };
    jd.config.num_sets = 1;
    jd.config.recompute_total_time();
    jd.config.start_time = Some(Utc::now() + ChronoDuration::hours(1));
    jd.config.end_time = Some(Utc::now() + ChronoDuration::hours(5));
    store.insert_jd(&jd).unwrap();
    jd.id
}

#[tokio::test]
async fn concurrent_link_generation_mints_distinct_links() {
    let (_dir, store, manager) = manager(VALID_OBJECTIVE);
    let jd_ids: Vec<String> = (0..10).map(|_| seeded_jd(&store)).collect();

    let mut handles = Vec::new();
    for jd_id in jd_ids {
        let manager = manager.clone();
        handles.push(tokio::spawn(async move {
            manager.generate_link(&jd_id, "r1").await
        }));
    }
    let mut links = HashSet::new();
    for handle in handles {
        let jd = handle.await.unwrap().unwrap();
        assert_eq!(jd.status, JdStatus::Ready);
        let link = jd.assessment_link.unwrap();
        assert_eq!(link.len(), 12);
        assert!(link.bytes().all(|b| b.is_ascii_alphanumeric()));
        links.insert(link);
    }
    assert_eq!(links.len(), 10, "zero duplicate links");
}

#[tokio::test]
async fn link_generation_is_idempotent_once_ready() {
    let (_dir, store, manager) = manager(VALID_OBJECTIVE);
    let jd_id = seeded_jd(&store);
    let first = manager.generate_link(&jd_id, "r1").await.unwrap();
    let second = manager.generate_link(&jd_id, "r1").await.unwrap();
    assert_eq!(first.assessment_link, second.assessment_link);
    assert_eq!(second.set_ids.len(), 1, "sets not regenerated");
}

#[tokio::test(start_paused = true)]
async fn generation_failure_rolls_the_jd_back() {
    let (_dir, store, manager) = manager(BROKEN_OBJECTIVE);
    let jd_id = seeded_jd(&store);

    let err = manager.generate_link(&jd_id, "r1").await.unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)), "invariant rejected: {err}");

    let jd = store.get_jd(&jd_id).unwrap().unwrap();
    assert_eq!(jd.status, JdStatus::Parsed);
    assert!(jd.assessment_link.is_none());
    assert!(jd.set_ids.is_empty());
    assert!(
        jd.parsing.parse_errors.iter().any(|e| e.contains("set generation")),
        "failure recorded: {:?}",
        jd.parsing.parse_errors
    );
    // The claimed link was released; nothing resolves through the index.
    assert_eq!(store.list_jds_by_company("acme").unwrap().len(), 1);
}

#[tokio::test]
async fn window_is_required_before_link_generation() {
    let (_dir, store, manager) = manager(VALID_OBJECTIVE);
    let jd_id = seeded_jd(&store);
    store
        .update_jd(&jd_id, |j| {
            j.config.start_time = None;
            Ok(())
        })
        .unwrap();
    let err = manager.generate_link(&jd_id, "r1").await.unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
}

#[tokio::test]
async fn delete_cascades_but_refuses_active_assessments() {
    let (_dir, store, manager) = manager(VALID_OBJECTIVE);
    let jd_id = seeded_jd(&store);
    let jd = manager.generate_link(&jd_id, "r1").await.unwrap();
    let set_id = jd.set_ids[0].clone();

    let ca = CandidateAssessment::new("u1", &jd_id);
    store.insert_candidate(&ca).unwrap();

    // Open the window: the JD is now active and protected.
    store
        .update_jd(&jd_id, |j| {
            j.config.start_time = Some(Utc::now() - ChronoDuration::hours(1));
            Ok(())
        })
        .unwrap();
    let err = manager.delete(&jd_id, "r1").unwrap_err();
    assert!(matches!(err, EngineError::Conflict(_)));

    // Close the window: delete cascades everything.
    store
        .update_jd(&jd_id, |j| {
            j.config.end_time = Some(Utc::now() - ChronoDuration::minutes(1));
            Ok(())
        })
        .unwrap();
    manager.delete(&jd_id, "r1").unwrap();
    assert!(store.get_jd(&jd_id).unwrap().is_none());
    assert!(store.get_set(&set_id).unwrap().is_none());
    assert!(store.get_candidate(&ca.id).unwrap().is_none());
}
