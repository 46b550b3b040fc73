//! vetta-core: assessment lifecycle engine for AI-assisted technical
//! hiring.
//!
//! Covers the JD pipeline (parse, configure, link, set generation), the
//! candidate state machine (onboarding, resume gate), the timed session
//! controller, code execution against the external sandbox, proctoring
//! ingest, the evaluation engine, and the adaptive follow-up engine. The
//! HTTP surface lives in `vetta-gateway`; this crate owns all semantics.

mod codeexec;
mod config;
mod email;
mod error;
mod evaluation;
mod export;
mod followup;
mod jd;
mod llm;
mod model;
mod onboarding;
mod proctoring;
pub mod prompts;
mod sandbox;
mod session;
mod setgen;
mod store;
mod token;

pub use config::{CoreConfig, LlmConfig, SandboxConfig, SmtpConfig};
pub use error::{EngineError, EngineResult, FieldError};

// Entity model + schema helpers
pub use model::{
    AdminDecision, AdminReview, AnswerOption, AssessmentAnswer, AssessmentConfig, AssessmentSet,
    CandidateAssessment, CandidateStatus, CandidateUser, CommunicationEntry, Difficulty,
    Evaluation, ExperienceLevel, FollowUpQuestion, IntegrityStatus, InterviewMetadata,
    InterviewStatus, JdStats, JdStatus, JobDescription, ObjectiveEntry, ObjectiveQuestion,
    OnboardingFlags, OtpRecord, ParsedContent, ParsingMeta, PlagiarismReport, ProctoringEvent,
    ProctoringEventType, ProgrammingEntry, ProgrammingQuestion, Recommendation, ResumeMatchDetails,
    ResumeReview, RunRecord, Section, SectionConfig, SectionProgress, SectionProgressMap,
    SectionResult, SectionsConfig, SessionTiming, Severity, SkillScore, SubjectiveEntry,
    SubjectiveQuestion, TestCase, TestCaseRecord,
};
pub use model::{base_sort_key, display_order, followup_sort_key, recommendation_band, word_count};
pub use model::ProctoringStats;

// Persistence
pub use store::{AuditRecord, Store};

// Gateways (LLM + code sandbox)
pub use llm::{
    extract_json, strip_fences, CallUsage, HttpLlmClient, LlmClient, LlmGateway, LlmRequest,
    LlmResponse, ProviderError, UsageTotals,
};
pub use sandbox::{
    language_name, normalize_output, outputs_match, split_batched_stdout, CaseOutcome, CaseSpec,
    HttpSandboxClient, SandboxClient, SandboxGateway, Submission, SubmissionOutcome, BATCH_SIZE,
    LANGUAGES, TEST_CASE_SEPARATOR,
};

// Services
pub use codeexec::{weighted_correctness, CodeExecutor, RunOutcome, SubmitOutcome, VisibleCaseResult};
pub use email::{ConsoleMailer, Mail, Mailer};
#[cfg(feature = "email")]
pub use email::SmtpMailer;
pub use evaluation::{
    EvaluationEngine, NoopPlagiarismChecker, PlagiarismChecker, PlagiarismFinding,
};
pub use export::{AdminReports, JdAnalytics};
pub use followup::{
    admit_followup, normalize_question, DetectorVerdict, FollowUpEngine, FollowUpOutcome,
};
pub use jd::{ConfigPatch, JdManager};
pub use onboarding::{AssessmentInfo, OnboardingManager};
pub use proctoring::ProctoringIngest;
pub use session::{
    AnswerPayload, CandidateObjectiveQuestion, CandidateOption, CandidateProgrammingQuestion,
    CandidateSubjectiveQuestion, CandidateTestCase, SectionQuestions, SectionSubmitOutcome,
    SessionController, SessionLocks, SessionView, SubmitAllOutcome, GRACE_SECONDS,
    HIDDEN_PLACEHOLDER,
};
pub use token::{
    mint_assessment_link, mint_base62, mint_otp_code, mint_session_token, ASSESSMENT_LINK_LEN,
    SESSION_TOKEN_LEN, SESSION_TOKEN_PREFIX,
};
