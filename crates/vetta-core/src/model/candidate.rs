//! Candidate assessment: one candidate's attempt at one JD, from invitation
//! through the recruiter's decision.

use super::Section;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateStatus {
    Invited,
    Onboarding,
    ResumeReview,
    ResumeRejected,
    Ready,
    InProgress,
    Submitted,
    Evaluating,
    Evaluated,
    Decided,
}

impl CandidateStatus {
    /// Position in the lifecycle ordering; transitions never decrease it
    /// (except the terminal `ResumeRejected` branch).
    pub fn rank(&self) -> u8 {
        match self {
            Self::Invited => 0,
            Self::Onboarding => 1,
            Self::ResumeReview => 2,
            Self::ResumeRejected => 3,
            Self::Ready => 3,
            Self::InProgress => 4,
            Self::Submitted => 5,
            Self::Evaluating => 6,
            Self::Evaluated => 7,
            Self::Decided => 8,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OnboardingFlags {
    pub email_verified: bool,
    pub email_verified_at: Option<DateTime<Utc>>,
    pub profile_photo_captured: bool,
    pub profile_photo_captured_at: Option<DateTime<Utc>>,
    pub consent_accepted: bool,
    pub consent_accepted_at: Option<DateTime<Utc>>,
    /// Derived: all three flags above plus a passed resume gate. Recomputed
    /// on every onboarding write; never set directly.
    pub is_complete: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResumeMatchDetails {
    /// Out of 40.
    pub skills: u32,
    /// Out of 40.
    pub projects: u32,
    /// Out of 20.
    pub fit: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResumeReview {
    pub match_score: u32,
    pub is_fake: bool,
    pub passed_threshold: bool,
    pub details: ResumeMatchDetails,
    pub summary: String,
    pub file_ref: Option<String>,
    pub reviewed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SectionProgress {
    pub started: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub completed: bool,
    pub questions_answered: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SectionProgressMap {
    pub objective: SectionProgress,
    pub subjective: SectionProgress,
    pub programming: SectionProgress,
}

impl SectionProgressMap {
    pub fn get(&self, section: Section) -> &SectionProgress {
        match section {
            Section::Objective => &self.objective,
            Section::Subjective => &self.subjective,
            Section::Programming => &self.programming,
        }
    }

    pub fn get_mut(&mut self, section: Section) -> &mut SectionProgress {
        match section {
            Section::Objective => &mut self.objective,
            Section::Subjective => &mut self.subjective,
            Section::Programming => &mut self.programming,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionTiming {
    pub started_at: Option<DateTime<Utc>>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub last_heartbeat: Option<DateTime<Utc>>,
    pub time_spent_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProctoringStats {
    pub total_events: u32,
    pub tab_switches: u32,
    pub face_detection_issues: u32,
    pub high_severity_events: u32,
}

/// Monotone integrity flag: the first high-severity proctoring event moves
/// `Clear -> FlaggedUnderReview`; only an admin review moves it back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrityStatus {
    Clear,
    FlaggedUnderReview,
}

impl Default for IntegrityStatus {
    fn default() -> Self {
        IntegrityStatus::Clear
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommunicationEntry {
    pub channel: String,
    pub subject: String,
    pub status: String,
    pub sent_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateAssessment {
    pub id: String,
    pub candidate_id: String,
    pub jd_id: String,
    pub status: CandidateStatus,
    pub onboarding: OnboardingFlags,
    pub resume: Option<ResumeReview>,
    /// Assigned exactly once, on first session start.
    pub assigned_set_id: Option<String>,
    /// Present iff `status == InProgress`.
    pub session_token: Option<String>,
    pub current_section: Option<Section>,
    pub progress: SectionProgressMap,
    pub timing: SessionTiming,
    pub proctoring: ProctoringStats,
    pub integrity_status: IntegrityStatus,
    #[serde(default)]
    pub communication_log: Vec<CommunicationEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CandidateAssessment {
    pub fn new(candidate_id: impl Into<String>, jd_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            candidate_id: candidate_id.into(),
            jd_id: jd_id.into(),
            status: CandidateStatus::Onboarding,
            onboarding: OnboardingFlags::default(),
            resume: None,
            assigned_set_id: None,
            session_token: None,
            current_section: None,
            progress: SectionProgressMap::default(),
            timing: SessionTiming::default(),
            proctoring: ProctoringStats::default(),
            integrity_status: IntegrityStatus::default(),
            communication_log: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Recomputes the derived onboarding-complete flag. Invoked after every
    /// onboarding mutation so the invariant cannot drift.
    pub fn recompute_onboarding(&mut self) {
        let resume_passed = self.resume.as_ref().map(|r| r.passed_threshold).unwrap_or(false);
        self.onboarding.is_complete = self.onboarding.email_verified
            && self.onboarding.profile_photo_captured
            && self.onboarding.consent_accepted
            && resume_passed;
    }

    pub fn log_communication(
        &mut self,
        channel: impl Into<String>,
        subject: impl Into<String>,
        status: impl Into<String>,
    ) {
        self.communication_log.push(CommunicationEntry {
            channel: channel.into(),
            subject: subject.into(),
            status: status.into(),
            sent_at: Utc::now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn onboarding_complete_requires_all_four_gates() {
        let mut ca = CandidateAssessment::new("u1", "jd1");
        ca.onboarding.email_verified = true;
        ca.onboarding.profile_photo_captured = true;
        ca.onboarding.consent_accepted = true;
        ca.recompute_onboarding();
        assert!(!ca.onboarding.is_complete, "resume gate still missing");

        ca.resume = Some(ResumeReview {
            match_score: 72,
            is_fake: false,
            passed_threshold: true,
            details: ResumeMatchDetails::default(),
            summary: String::new(),
            file_ref: None,
            reviewed_at: Utc::now(),
        });
        ca.recompute_onboarding();
        assert!(ca.onboarding.is_complete);
    }

    #[test]
    fn status_rank_is_monotone_along_the_happy_path() {
        let path = [
            CandidateStatus::Invited,
            CandidateStatus::Onboarding,
            CandidateStatus::ResumeReview,
            CandidateStatus::Ready,
            CandidateStatus::InProgress,
            CandidateStatus::Submitted,
            CandidateStatus::Evaluating,
            CandidateStatus::Evaluated,
            CandidateStatus::Decided,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].rank() <= pair[1].rank());
        }
    }
}
