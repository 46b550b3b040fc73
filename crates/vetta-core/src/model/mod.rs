//! Entity value types and their schema helpers.
//!
//! Document "virtual methods" from the persistence layer (grading, point
//! sums, total-time recompute) live here as plain methods over value types,
//! invoked explicitly at the documented points (section submit, config
//! write, set finalize).

mod answer;
mod candidate;
mod evaluation;
mod interview;
mod jd;
mod otp;
mod proctoring;
mod set;
mod user;

pub use answer::{
    word_count, AssessmentAnswer, ObjectiveEntry, ProgrammingEntry, RunRecord, SubjectiveEntry,
    TestCaseRecord,
};
pub use candidate::{
    CandidateAssessment, CandidateStatus, CommunicationEntry, IntegrityStatus, OnboardingFlags,
    ProctoringStats, ResumeMatchDetails, ResumeReview, SectionProgress, SectionProgressMap,
    SessionTiming,
};
pub use evaluation::{
    recommendation_band, AdminDecision, Evaluation, PlagiarismReport, Recommendation,
    SectionResult, SkillScore,
};
pub use interview::{
    base_sort_key, display_order, followup_sort_key, FollowUpQuestion, InterviewMetadata,
    InterviewStatus,
};
pub use jd::{
    AssessmentConfig, ExperienceLevel, JdStats, JdStatus, JobDescription, ParsedContent,
    ParsingMeta, SectionConfig, SectionsConfig,
};
pub use otp::OtpRecord;
pub use proctoring::{AdminReview, ProctoringEvent, ProctoringEventType, Severity};
pub use set::{
    AnswerOption, AssessmentSet, Difficulty, ObjectiveQuestion, ProgrammingQuestion,
    SubjectiveQuestion, TestCase,
};
pub use user::CandidateUser;

use serde::{Deserialize, Serialize};

/// One of the three assessment sections, in fixed serving order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    Objective,
    Subjective,
    Programming,
}

impl Section {
    /// Fixed serving order; `next` walks this.
    pub const ORDER: [Section; 3] = [Section::Objective, Section::Subjective, Section::Programming];

    pub fn key(&self) -> &'static str {
        match self {
            Section::Objective => "objective",
            Section::Subjective => "subjective",
            Section::Programming => "programming",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "objective" => Some(Section::Objective),
            "subjective" => Some(Section::Subjective),
            "programming" => Some(Section::Programming),
            _ => None,
        }
    }

    /// The section after `self` in serving order, regardless of config.
    pub fn successor(&self) -> Option<Section> {
        let idx = Section::ORDER.iter().position(|s| s == self)?;
        Section::ORDER.get(idx + 1).copied()
    }
}

impl std::fmt::Display for Section {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}
