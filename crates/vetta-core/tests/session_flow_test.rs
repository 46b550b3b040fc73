//! Integration test: the full assessment lifecycle against a scripted
//! language model — upload, parse, configure, link generation, candidate
//! onboarding with the resume gate, the timed session, objective grading,
//! final submit with synchronous evaluation.
//!
//! ## Scenarios
//! 1. Parse populates structured content and section defaults; a second
//!    parse returns the same payload with no extra model call.
//! 2. Link generation mints a 12-char base-62 link and persists the sets.
//! 3. Onboarding gates: OTP, photo, consent, resume must all pass before
//!    start.
//! 4. Question payloads never leak correct flags, expected answers, or
//!    hidden test cases.
//! 5. Objective grading: points [1,2,3], correct [0,1,2], answers [0,0,2]
//!    score 4 of 6.
//! 6. Submit-all runs evaluation synchronously; weighted score follows the
//!    30/30/40 weights; re-submitting is a no-op.
//! 7. A session past budget + grace expires on next touch.

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use vetta_core::{
    AnswerPayload, CandidateStatus, ConfigPatch, ConsoleMailer, EngineError, EvaluationEngine,
    JdManager, JdStatus, LlmClient, LlmGateway, LlmRequest, LlmResponse, NoopPlagiarismChecker,
    OnboardingManager, ProviderError, Recommendation, Section, SectionConfig, SectionsConfig,
    SessionController, SessionLocks, Store,
};

// ---------------------------------------------------------------------------
// Scripted model: routes by prompt marker, counts calls per route
// ---------------------------------------------------------------------------

#[derive(Default)]
struct RoutedLlm {
    parse_calls: AtomicU32,
    generation_calls: AtomicU32,
    resume_calls: AtomicU32,
    scoring_calls: AtomicU32,
}

const PARSE_PAYLOAD: &str = r#"{
  "role_title": "Backend Engineer",
  "experience_level": "mid",
  "technical_skills": ["Rust", "PostgreSQL", "Kubernetes", "gRPC", "Kafka"],
  "soft_skills": ["communication"],
  "responsibilities": ["build services"],
  "qualifications": ["4+ years"],
  "summary": "Backend role"
}"#;

const OBJECTIVE_PAYLOAD: &str = r#"{"questions": [
  {"questionId": "objective_0", "text": "Q0", "points": 1,
   "options": [{"text": "a", "isCorrect": true}, {"text": "b"}, {"text": "c"}, {"text": "d"}]},
  {"questionId": "objective_1", "text": "Q1", "points": 2,
   "options": [{"text": "a"}, {"text": "b", "isCorrect": true}, {"text": "c"}, {"text": "d"}]},
  {"questionId": "objective_2", "text": "Q2", "points": 3,
   "options": [{"text": "a"}, {"text": "b"}, {"text": "c", "isCorrect": true}, {"text": "d"}]}
]}"#;

const SUBJECTIVE_PAYLOAD: &str = r#"{"questions": [
  {"questionId": "subjective_0", "text": "Explain backpressure.",
   "expectedAnswer": "Flow control that slows producers.", "rubric": "depth", "maxWords": 200, "points": 10}
]}"#;

const PROGRAMMING_PAYLOAD: &str = r#"{"questions": [
  {"questionId": "programming_0", "title": "Sum", "problemStatement": "Add two ints.",
   "testCases": [
     {"input": "1 2", "expectedOutput": "3", "isHidden": false, "weight": 1},
     {"input": "5 7", "expectedOutput": "12", "isHidden": true, "weight": 2}
   ], "points": 20}
]}"#;

const RESUME_PAYLOAD: &str = r#"{"skills_score": 32, "projects_score": 30, "fit_score": 14,
  "match_score": 76, "is_fake": false, "summary": "solid match"}"#;

const SCORE_PAYLOAD: &str = r#"{"score": 7.5, "max_score": 10, "feedback": "good depth"}"#;

#[async_trait]
impl LlmClient for RoutedLlm {
    async fn chat(&self, request: &LlmRequest) -> Result<LlmResponse, ProviderError> {
        let p = &request.prompt;
        let content = if p.contains("Extract the following from this job description") {
            self.parse_calls.fetch_add(1, Ordering::SeqCst);
            PARSE_PAYLOAD
        } else if p.contains("multiple-choice questions") {
            self.generation_calls.fetch_add(1, Ordering::SeqCst);
            OBJECTIVE_PAYLOAD
        } else if p.contains("open-ended questions") {
            self.generation_calls.fetch_add(1, Ordering::SeqCst);
            SUBJECTIVE_PAYLOAD
        } else if p.contains("programming problems") {
            self.generation_calls.fetch_add(1, Ordering::SeqCst);
            PROGRAMMING_PAYLOAD
        } else if p.contains("Score this resume") {
            self.resume_calls.fetch_add(1, Ordering::SeqCst);
            RESUME_PAYLOAD
        } else if p.contains("Score the answer from 0") {
            self.scoring_calls.fetch_add(1, Ordering::SeqCst);
            SCORE_PAYLOAD
        } else {
            return Err(ProviderError::Unavailable(format!(
                "unrouted prompt: {}",
                p.chars().take(80).collect::<String>()
            )));
        };
        Ok(LlmResponse {
            content: content.to_string(),
            prompt_tokens: None,
            completion_tokens: None,
        })
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

struct Harness {
    _dir: tempfile::TempDir,
    store: Arc<Store>,
    llm_spy: Arc<RoutedLlm>,
    jd: JdManager,
    onboarding: OnboardingManager,
    session: SessionController,
}

fn harness() -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(Store::open(dir.path()).unwrap());
    let llm_spy = Arc::new(RoutedLlm::default());
    let llm = Arc::new(LlmGateway::new(llm_spy.clone(), "test-model"));
    let locks = Arc::new(SessionLocks::new());
    let evaluation = Arc::new(EvaluationEngine::new(
        store.clone(),
        llm.clone(),
        Arc::new(NoopPlagiarismChecker),
    ));
    Harness {
        jd: JdManager::new(store.clone(), llm.clone()),
        onboarding: OnboardingManager::new(
            store.clone(),
            llm.clone(),
            Arc::new(ConsoleMailer),
            "http://localhost:5173",
        ),
        session: SessionController::new(store.clone(), locks, evaluation),
        store,
        llm_spy,
        _dir: dir,
    }
}

fn small_sections() -> SectionsConfig {
    SectionsConfig {
        objective: SectionConfig {
            enabled: true,
            question_count: 3,
            time_minutes: 10,
            weight: 30,
        },
        subjective: SectionConfig {
            enabled: true,
            question_count: 1,
            time_minutes: 10,
            weight: 30,
        },
        programming: SectionConfig {
            enabled: true,
            question_count: 1,
            time_minutes: 20,
            weight: 40,
        },
    }
}

/// Upload → parse → configure → generate link, then shift the window open.
async fn ready_jd(h: &Harness) -> (String, String) {
    let jd = h
        .jd
        .upload(
            "acme",
            "recruiter-1",
            "Backend Engineer",
            &"We need a backend engineer who knows Rust and distributed systems. ".repeat(4),
            None,
        )
        .unwrap();
    h.jd.parse(&jd.id).await.unwrap();

    let patch = ConfigPatch {
        sections: Some(small_sections()),
        num_sets: Some(1),
        start_time: Some(Utc::now() + ChronoDuration::hours(1)),
        end_time: Some(Utc::now() + ChronoDuration::hours(5)),
        ..ConfigPatch::default()
    };
    h.jd.update_config(&jd.id, "recruiter-1", &patch).unwrap();
    let jd = h.jd.generate_link(&jd.id, "recruiter-1").await.unwrap();
    assert_eq!(jd.status, JdStatus::Ready);
    let link = jd.assessment_link.clone().unwrap();
    assert_eq!(link.len(), 12);

    // Open the window without tripping the config freeze.
    h.store
        .update_jd(&jd.id, |j| {
            j.config.start_time = Some(Utc::now() - ChronoDuration::hours(1));
            Ok(())
        })
        .unwrap();
    (jd.id, link)
}

/// Full onboarding to `ready`, returning the attempt id.
async fn onboarded_candidate(h: &Harness, link: &str, email: &str) -> String {
    let (_, ca) = h.onboarding.register(link, email, "Jane Doe").await.unwrap();
    let otp = h.store.latest_otp(email, "email_verification").unwrap().unwrap();
    h.onboarding.verify_email(&ca.id, &otp.code).unwrap();
    h.onboarding.capture_photo(&ca.id, "/uploads/images/jane.png").unwrap();
    h.onboarding.accept_consent(&ca.id).unwrap();
    let ca = h
        .onboarding
        .upload_resume(
            &ca.id,
            &"Seasoned Rust engineer with five years of production services. ".repeat(3),
            Some("/uploads/resumes/jane.pdf".to_string()),
        )
        .await
        .unwrap();
    assert_eq!(ca.status, CandidateStatus::Ready);
    assert!(ca.onboarding.is_complete);
    ca.id
}

// ---------------------------------------------------------------------------
// Scenario 1: parse once
// ---------------------------------------------------------------------------

#[tokio::test]
async fn parse_is_idempotent_and_sets_defaults() {
    let h = harness();
    let jd = h
        .jd
        .upload(
            "acme",
            "recruiter-1",
            "Backend Engineer",
            &"A long enough job description about backend engineering work. ".repeat(3),
            None,
        )
        .unwrap();

    let parsed = h.jd.parse(&jd.id).await.unwrap();
    assert_eq!(parsed.status, JdStatus::Parsed);
    let content = parsed.parsed.as_ref().unwrap();
    assert!(content.technical_skills.len() >= 5);
    // Mid-level defaults: 20 + 25 + 50 minutes.
    assert_eq!(parsed.config.total_time_minutes, 95);
    assert_eq!(h.llm_spy.parse_calls.load(Ordering::SeqCst), 1);

    let again = h.jd.parse(&jd.id).await.unwrap();
    assert_eq!(
        again.parsed.as_ref().unwrap().role_title,
        content.role_title
    );
    assert_eq!(h.llm_spy.parse_calls.load(Ordering::SeqCst), 1, "no second model call");
}

// ---------------------------------------------------------------------------
// Scenarios 2-6: the full candidate journey
// ---------------------------------------------------------------------------

#[tokio::test]
async fn full_lifecycle_from_link_to_evaluation() {
    let h = harness();
    let (jd_id, link) = ready_jd(&h).await;
    assert_eq!(h.llm_spy.generation_calls.load(Ordering::SeqCst), 3);

    let info = h.onboarding.assessment_info(&link).unwrap();
    assert!(info.is_open);
    assert_eq!(info.sections.len(), 3);

    let ca_id = onboarded_candidate(&h, &link, "jane@example.com").await;
    assert_eq!(h.llm_spy.resume_calls.load(Ordering::SeqCst), 1);

    // Start is idempotent.
    let session = h.session.start(&ca_id).await.unwrap();
    assert!(session.session_token.starts_with("sess_"));
    assert_eq!(session.current_section, Some(Section::Objective));
    let again = h.session.start(&ca_id).await.unwrap();
    assert_eq!(again.session_token, session.session_token);
    let token = session.session_token;

    // Redaction: no correct flags, no expected answers, hidden cases masked.
    let questions = h.session.get_questions(&token, Section::Objective).await.unwrap();
    assert_eq!(questions.objective.len(), 3);
    let serialized = serde_json::to_string(&questions).unwrap();
    assert!(!serialized.contains("is_correct") && !serialized.contains("isCorrect"));

    let programming = h.session.get_questions(&token, Section::Programming).await.unwrap();
    let serialized = serde_json::to_string(&programming).unwrap();
    assert!(!serialized.contains("5 7"), "hidden input leaked");
    assert!(serialized.contains("[hidden]"));

    // Objective answers [0, 0, 2] against correct [0, 1, 2].
    for (i, selected) in [0usize, 0, 2].iter().enumerate() {
        h.session
            .save_answer(
                &token,
                Section::Objective,
                &format!("objective_{i}"),
                AnswerPayload::Objective {
                    selected_option_index: Some(*selected),
                },
            )
            .await
            .unwrap();
    }
    let outcome = h.session.submit_section(&token, Section::Objective).await.unwrap();
    assert_eq!(outcome.section_score, Some(4.0));
    assert_eq!(outcome.section_max_score, Some(6.0));
    assert_eq!(outcome.next_section, Some(Section::Subjective));

    h.session
        .save_answer(
            &token,
            Section::Subjective,
            "subjective_0",
            AnswerPayload::Subjective {
                text: "Backpressure lets consumers slow producers to protect memory.".to_string(),
            },
        )
        .await
        .unwrap();
    h.session.submit_section(&token, Section::Subjective).await.unwrap();

    let submitted = h.session.submit_all(&token).await.unwrap();
    assert!(submitted.evaluation_ready);
    assert_eq!(h.llm_spy.scoring_calls.load(Ordering::SeqCst), 1);

    let ca = h.store.get_candidate(&ca_id).unwrap().unwrap();
    assert_eq!(ca.status, CandidateStatus::Evaluated);

    let evaluation = h.store.get_evaluation(&ca_id).unwrap().unwrap();
    // objective 4/6, subjective 7.5/10, programming 0/20
    let expected = (4.0 / 6.0 * 100.0) * 0.3 + 75.0 * 0.3;
    assert!((evaluation.weighted_score - expected).abs() < 0.01);
    assert_eq!(evaluation.ai_recommendation, Recommendation::Fail);
    assert!((evaluation.total_score - 11.5).abs() < 1e-9);

    // Submit idempotence: no extra scoring calls, same success.
    let resubmitted = h.session.submit_all(&token).await.unwrap();
    assert!(resubmitted.evaluation_ready);
    assert_eq!(h.llm_spy.scoring_calls.load(Ordering::SeqCst), 1);

    // JD stats bumped exactly once.
    let jd = h.store.get_jd(&jd_id).unwrap().unwrap();
    assert_eq!(jd.stats.completed_assessments, 1);
}

// ---------------------------------------------------------------------------
// Scenario 7: time expiry on touch
// ---------------------------------------------------------------------------

#[tokio::test]
async fn session_expires_on_touch_after_budget_plus_grace() {
    let h = harness();
    let (_, link) = ready_jd(&h).await;
    let ca_id = onboarded_candidate(&h, &link, "late@example.com").await;
    let session = h.session.start(&ca_id).await.unwrap();
    let token = session.session_token;

    // Shrink the budget to 1 minute and backdate the start far enough that
    // budget (60 s) + grace (60 s) is exhausted.
    let ca = h.store.get_candidate(&ca_id).unwrap().unwrap();
    h.store
        .update_jd(&ca.jd_id, |j| {
            j.config.sections.objective.time_minutes = 1;
            j.config.sections.subjective.enabled = false;
            j.config.sections.programming.enabled = false;
            j.config.recompute_total_time();
            Ok(())
        })
        .unwrap();
    h.store
        .update_candidate(&ca_id, |c| {
            c.timing.started_at = Some(Utc::now() - ChronoDuration::seconds(121));
            Ok(())
        })
        .unwrap();

    let err = h.session.heartbeat(&token).await.unwrap_err();
    assert!(matches!(err, EngineError::SessionExpired));
    let ca = h.store.get_candidate(&ca_id).unwrap().unwrap();
    assert_eq!(ca.status, CandidateStatus::Submitted);
    assert!(ca.timing.submitted_at.is_some());

    // Still inside grace is still allowed.
    let ca2_link = link;
    let ca2 = onboarded_candidate(&h, &ca2_link, "ontime@example.com").await;
    let session2 = h.session.start(&ca2).await.unwrap();
    h.store
        .update_candidate(&ca2, |c| {
            c.timing.started_at = Some(Utc::now() - ChronoDuration::seconds(119));
            Ok(())
        })
        .unwrap();
    h.store
        .update_jd(&h.store.get_candidate(&ca2).unwrap().unwrap().jd_id, |j| {
            j.config.sections.objective.time_minutes = 1;
            j.config.sections.subjective.enabled = false;
            j.config.sections.programming.enabled = false;
            j.config.recompute_total_time();
            Ok(())
        })
        .unwrap();
    assert!(h.session.heartbeat(&session2.session_token).await.is_ok());
}

// ---------------------------------------------------------------------------
// Config freeze after start
// ---------------------------------------------------------------------------

#[tokio::test]
async fn config_freezes_once_the_window_opens() {
    let h = harness();
    let (jd_id, _) = ready_jd(&h).await;

    let frozen = ConfigPatch {
        cutoff_score: Some(70),
        ..ConfigPatch::default()
    };
    let err = h.jd.update_config(&jd_id, "recruiter-1", &frozen).unwrap_err();
    assert!(matches!(err, EngineError::Conflict(_)));

    let end_only = ConfigPatch {
        end_time: Some(Utc::now() + ChronoDuration::hours(8)),
        ..ConfigPatch::default()
    };
    h.jd.update_config(&jd_id, "recruiter-1", &end_only).unwrap();

    let err = h
        .jd
        .update_skills(&jd_id, "recruiter-1", vec!["Go".to_string()])
        .unwrap_err();
    assert!(matches!(err, EngineError::Conflict(_)));
}
