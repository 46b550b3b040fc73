//! Integration test: candidate onboarding — OTP limits and oracle-free
//! messages, re-registration policy, and the resume gate threshold.
//!
//! ## Scenarios
//! 1. Wrong OTP attempts 1-5 get one generic message; attempt 6 reports
//!    "maximum attempts exceeded" even with the right code.
//! 2. Re-registering an onboarding candidate reuses the attempt and
//!    invalidates the previous code.
//! 3. A resume below threshold (or flagged fake) lands in
//!    `resume_rejected` and onboarding stays incomplete.

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use std::sync::Mutex;
use std::sync::Arc;
use vetta_core::{
    CandidateStatus, ConsoleMailer, JdStatus, LlmClient, LlmGateway, LlmRequest, LlmResponse,
    OnboardingManager, ParsedContent, ProviderError, Store,
};

/// Returns one fixed resume verdict; other prompts are unrouted.
struct ResumeOnlyLlm {
    verdict: Mutex<String>,
}

#[async_trait]
impl LlmClient for ResumeOnlyLlm {
    async fn chat(&self, request: &LlmRequest) -> Result<LlmResponse, ProviderError> {
        if request.prompt.contains("Score this resume") {
            return Ok(LlmResponse {
                content: self.verdict.lock().unwrap().clone(),
                ..LlmResponse::default()
            });
        }
        Err(ProviderError::Unavailable("unrouted".to_string()))
    }
}

struct Harness {
    _dir: tempfile::TempDir,
    store: Arc<Store>,
    onboarding: OnboardingManager,
    link: String,
}

/// Seeds an open JD directly in the store; the JD pipeline has its own
/// tests.
fn harness(resume_verdict: &str) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(Store::open(dir.path()).unwrap());
    let llm = Arc::new(ResumeOnlyLlm {
        verdict: Mutex::new(resume_verdict.to_string()),
    });
    let gateway = Arc::new(LlmGateway::new(llm.clone(), "test-model"));

    let mut jd = vetta_core::JobDescription::new("acme", "r1", "Backend Engineer", "text");
    jd.status = JdStatus::Ready;
    jd.parsed = Some(ParsedContent {
        role_title: "Backend Engineer".to_string(),
        technical_skills: vec!["Rust".to_string()],
        ..ParsedContent::default()
    });
    jd.config.start_time = Some(Utc::now() - ChronoDuration::hours(1));
    jd.config.end_time = Some(Utc::now() + ChronoDuration::hours(4));
    let link = "AbCdEfGh1234".to_string();
    jd.assessment_link = Some(link.clone());
    store.insert_jd(&jd).unwrap();
    store.claim_assessment_link(&link, &jd.id).unwrap();

    Harness {
        onboarding: OnboardingManager::new(
            store.clone(),
            gateway,
            Arc::new(ConsoleMailer),
            "http://localhost:5173",
        ),
        store,
        _dir: dir,
        link,
    }
}

const GOOD_RESUME: &str = r#"{"skills_score": 32, "projects_score": 28, "fit_score": 16,
  "match_score": 76, "is_fake": false, "summary": "strong"}"#;

#[tokio::test]
async fn otp_attempts_cap_at_five_with_generic_messages() {
    let h = harness(GOOD_RESUME);
    let (_, ca) = h
        .onboarding
        .register(&h.link, "jane@example.com", "Jane")
        .await
        .unwrap();

    let mut generic_messages = std::collections::HashSet::new();
    for _ in 0..5 {
        let err = h.onboarding.verify_email(&ca.id, "000000").unwrap_err();
        generic_messages.insert(err.to_string());
    }
    assert_eq!(generic_messages.len(), 1, "same message for every wrong attempt");

    // Attempt 6 with the *correct* code still fails.
    let otp = h
        .store
        .latest_otp("jane@example.com", "email_verification")
        .unwrap()
        .unwrap();
    let err = h.onboarding.verify_email(&ca.id, &otp.code).unwrap_err();
    assert!(err.to_string().contains("maximum attempts exceeded"));
}

#[tokio::test]
async fn expired_codes_get_the_same_generic_message() {
    let h = harness(GOOD_RESUME);
    let (_, ca) = h
        .onboarding
        .register(&h.link, "jane@example.com", "Jane")
        .await
        .unwrap();
    let otp = h
        .store
        .latest_otp("jane@example.com", "email_verification")
        .unwrap()
        .unwrap();
    let expired = vetta_core::OtpRecord {
        expires_at: Utc::now() - ChronoDuration::minutes(1),
        ..otp.clone()
    };
    h.store.replace_otp(&expired).unwrap();

    let err = h.onboarding.verify_email(&ca.id, &otp.code).unwrap_err();
    assert!(err.to_string().contains("invalid or expired"));
}

#[tokio::test]
async fn reregistration_reuses_the_attempt_and_rotates_the_code() {
    let h = harness(GOOD_RESUME);
    let (_, first) = h
        .onboarding
        .register(&h.link, "jane@example.com", "Jane")
        .await
        .unwrap();
    let first_otp = h
        .store
        .latest_otp("jane@example.com", "email_verification")
        .unwrap()
        .unwrap();

    let (_, second) = h
        .onboarding
        .register(&h.link, "jane@example.com", "Jane D.")
        .await
        .unwrap();
    assert_eq!(first.id, second.id, "one attempt per (candidate, jd)");

    let second_otp = h
        .store
        .latest_otp("jane@example.com", "email_verification")
        .unwrap()
        .unwrap();
    assert_ne!(first_otp.id, second_otp.id);
    // The rotated-out code no longer verifies.
    if first_otp.code != second_otp.code {
        assert!(h.onboarding.verify_email(&first.id, &first_otp.code).is_err());
    }
}

#[tokio::test]
async fn resume_below_threshold_is_rejected_and_blocks_onboarding() {
    let h = harness(
        r#"{"skills_score": 10, "projects_score": 8, "fit_score": 5,
           "match_score": 23, "is_fake": false, "summary": "weak"}"#,
    );
    let (_, ca) = h
        .onboarding
        .register(&h.link, "weak@example.com", "Sam")
        .await
        .unwrap();
    let otp = h
        .store
        .latest_otp("weak@example.com", "email_verification")
        .unwrap()
        .unwrap();
    h.onboarding.verify_email(&ca.id, &otp.code).unwrap();
    h.onboarding.capture_photo(&ca.id, "/uploads/images/sam.png").unwrap();
    h.onboarding.accept_consent(&ca.id).unwrap();

    let ca = h
        .onboarding
        .upload_resume(&ca.id, &"resume text ".repeat(10), None)
        .await
        .unwrap();
    assert_eq!(ca.status, CandidateStatus::ResumeRejected);
    assert!(!ca.onboarding.is_complete, "resume gate holds the flag down");
    let resume = ca.resume.unwrap();
    assert_eq!(resume.match_score, 23);
    assert!(!resume.passed_threshold);
}

#[tokio::test]
async fn fake_resumes_fail_even_above_threshold() {
    let h = harness(
        r#"{"skills_score": 38, "projects_score": 36, "fit_score": 18,
           "match_score": 92, "is_fake": true, "summary": "implausible"}"#,
    );
    let (_, ca) = h
        .onboarding
        .register(&h.link, "fake@example.com", "Fax")
        .await
        .unwrap();
    let ca = h
        .onboarding
        .upload_resume(&ca.id, &"resume text ".repeat(10), None)
        .await
        .unwrap();
    assert_eq!(ca.status, CandidateStatus::ResumeRejected);
    assert!(!ca.resume.unwrap().passed_threshold);
}

#[tokio::test]
async fn short_resumes_are_rejected_before_any_model_call() {
    let h = harness(GOOD_RESUME);
    let (_, ca) = h
        .onboarding
        .register(&h.link, "short@example.com", "Stu")
        .await
        .unwrap();
    let err = h
        .onboarding
        .upload_resume(&ca.id, "too short", None)
        .await
        .unwrap_err();
    assert!(matches!(err, vetta_core::EngineError::Validation(_)));
}
