//! Candidate onboarding: registration against a public assessment link,
//! email OTP, photo and consent capture, and the AI resume gate.
//!
//! The candidate state machine runs `onboarding -> resume_review ->
//! {ready | resume_rejected}` here; the session controller takes over at
//! `ready`. OTP failures return one generic message for wrong, expired and
//! missing codes so the endpoint leaks nothing about which it was.

use crate::email::{Mail, Mailer};
use crate::error::{EngineError, EngineResult};
use crate::llm::{LlmGateway, LlmRequest};
use crate::model::{
    CandidateAssessment, CandidateStatus, CandidateUser, JdStatus, JobDescription, OtpRecord,
    ResumeMatchDetails, ResumeReview,
};
use crate::prompts;
use crate::store::Store;
use crate::token;
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

const OTP_PURPOSE: &str = "email_verification";
const MIN_RESUME_CHARS: usize = 50;
const GENERIC_OTP_ERROR: &str = "invalid or expired verification code";

/// Public pre-registration summary of an assessment, resolved by link.
#[derive(Debug, Clone, Serialize)]
pub struct AssessmentInfo {
    pub jd_id: String,
    pub title: String,
    pub company_id: String,
    pub start_time: Option<chrono::DateTime<Utc>>,
    pub end_time: Option<chrono::DateTime<Utc>>,
    pub total_time_minutes: u32,
    pub sections: Vec<String>,
    pub is_open: bool,
}

pub struct OnboardingManager {
    store: Arc<Store>,
    llm: Arc<LlmGateway>,
    mailer: Arc<dyn Mailer>,
    frontend_base_url: String,
}

impl OnboardingManager {
    pub fn new(
        store: Arc<Store>,
        llm: Arc<LlmGateway>,
        mailer: Arc<dyn Mailer>,
        frontend_base_url: impl Into<String>,
    ) -> Self {
        Self {
            store,
            llm,
            mailer,
            frontend_base_url: frontend_base_url.into(),
        }
    }

    pub fn assessment_info(&self, link: &str) -> EngineResult<AssessmentInfo> {
        let jd = self
            .store
            .get_jd_by_link(link)?
            .ok_or_else(|| EngineError::not_found("assessment"))?;
        let now = Utc::now();
        Ok(AssessmentInfo {
            jd_id: jd.id.clone(),
            title: jd.title.clone(),
            company_id: jd.company_id.clone(),
            start_time: jd.config.start_time,
            end_time: jd.config.end_time,
            total_time_minutes: jd.config.total_time_minutes,
            sections: jd
                .config
                .sections
                .enabled()
                .iter()
                .map(|s| s.to_string())
                .collect(),
            is_open: jd.effective_status(now) == JdStatus::Active,
        })
    }

    /// Registers a candidate against an open assessment link. Re-registering
    /// an existing `(candidate, jd)` pair returns the existing attempt; a
    /// fresh OTP is issued only while it is still onboarding.
    pub async fn register(
        &self,
        link: &str,
        email: &str,
        name: &str,
    ) -> EngineResult<(CandidateUser, CandidateAssessment)> {
        let email = email.trim().to_lowercase();
        if !email.contains('@') || email.len() < 5 {
            return Err(EngineError::invalid("email", "a valid email is required"));
        }
        if name.trim().is_empty() {
            return Err(EngineError::invalid("name", "name is required"));
        }
        let jd = self
            .store
            .get_jd_by_link(link)?
            .ok_or_else(|| EngineError::not_found("assessment"))?;
        if jd.effective_status(Utc::now()) != JdStatus::Active {
            return Err(EngineError::invalid(
                "link",
                "this assessment is not currently open",
            ));
        }

        let user = self.store.upsert_user(&email, name.trim())?;
        if let Some(existing) = self.store.get_candidate_by_pair(&user.id, &jd.id)? {
            if existing.status == CandidateStatus::Onboarding && !existing.onboarding.email_verified
            {
                self.issue_otp(&existing, &email, &jd).await?;
            }
            return Ok((user, existing));
        }

        let ca = CandidateAssessment::new(&user.id, &jd.id);
        self.store.insert_candidate(&ca)?;
        self.store.update_jd(&jd.id, |j| {
            j.stats.total_candidates += 1;
            j.stats.last_activity_at = Some(Utc::now());
            Ok(())
        })?;
        self.issue_otp(&ca, &email, &jd).await?;
        info!(candidate = %user.id, jd_id = %jd.id, "candidate registered");
        let ca = self.store.require_candidate(&ca.id)?;
        Ok((user, ca))
    }

    /// Verifies the emailed code. Wrong attempts count toward the limit;
    /// attempt messages never reveal whether a code existed.
    pub fn verify_email(&self, ca_id: &str, code: &str) -> EngineResult<CandidateAssessment> {
        let ca = self.store.require_candidate(ca_id)?;
        let user = self
            .store
            .get_user(&ca.candidate_id)?
            .ok_or_else(|| EngineError::not_found("candidate"))?;
        let otp = self
            .store
            .latest_otp(&user.email, OTP_PURPOSE)?
            .ok_or_else(|| EngineError::invalid("otp", GENERIC_OTP_ERROR))?;

        if otp.attempts_exhausted() {
            return Err(EngineError::invalid("otp", "maximum attempts exceeded"));
        }
        if otp.verified || otp.code != code.trim() {
            self.store.update_otp(&otp, |o| {
                o.attempts += 1;
                Ok(())
            })?;
            return Err(EngineError::invalid("otp", GENERIC_OTP_ERROR));
        }
        self.store.update_otp(&otp, |o| {
            o.verified = true;
            Ok(())
        })?;
        self.store.update_candidate(ca_id, |c| {
            c.onboarding.email_verified = true;
            c.onboarding.email_verified_at = Some(Utc::now());
            c.recompute_onboarding();
            Ok(())
        })
    }

    pub fn capture_photo(&self, ca_id: &str, photo_ref: &str) -> EngineResult<CandidateAssessment> {
        if photo_ref.trim().is_empty() {
            return Err(EngineError::invalid("photo", "photo reference is required"));
        }
        let ca = self.store.require_candidate(ca_id)?;
        let photo = photo_ref.to_string();
        self.store.update_user(&ca.candidate_id, |u| {
            u.photo_ref = Some(photo.clone());
            Ok(())
        })?;
        self.store.update_candidate(ca_id, |c| {
            c.onboarding.profile_photo_captured = true;
            c.onboarding.profile_photo_captured_at = Some(Utc::now());
            c.recompute_onboarding();
            Ok(())
        })
    }

    pub fn accept_consent(&self, ca_id: &str) -> EngineResult<CandidateAssessment> {
        self.store.update_candidate(ca_id, |c| {
            c.onboarding.consent_accepted = true;
            c.onboarding.consent_accepted_at = Some(Utc::now());
            c.recompute_onboarding();
            Ok(())
        })
    }

    /// Runs the resume gate: match the extracted resume text against the JD
    /// with the skills-40 / projects-40 / fit-20 rubric, then move the
    /// candidate to `ready` or `resume_rejected`.
    pub async fn upload_resume(
        &self,
        ca_id: &str,
        resume_text: &str,
        file_ref: Option<String>,
    ) -> EngineResult<CandidateAssessment> {
        if resume_text.trim().len() < MIN_RESUME_CHARS {
            return Err(EngineError::invalid(
                "resume",
                "resume text is too short to evaluate",
            ));
        }
        let ca = self.store.require_candidate(ca_id)?;
        let jd = self.store.require_jd(&ca.jd_id)?;
        let parsed = jd
            .parsed
            .as_ref()
            .ok_or_else(|| EngineError::Infrastructure("JD missing parsed content".to_string()))?;

        self.store.update_candidate(ca_id, |c| {
            c.status = CandidateStatus::ResumeReview;
            Ok(())
        })?;

        let role = if parsed.role_title.is_empty() {
            jd.title.as_str()
        } else {
            parsed.role_title.as_str()
        };
        let level = parsed
            .experience_level
            .map(|l| format!("{l:?}").to_lowercase())
            .unwrap_or_else(|| "mid".to_string());
        let request = LlmRequest::new(prompts::resume_match_prompt(
            role,
            &level,
            &parsed.technical_skills,
            resume_text,
        ))
        .with_system(prompts::RESUME_MATCH_SYSTEM)
        .with_temperature(0.1);

        let value = self
            .llm
            .complete_json(&request, prompts::RESUME_MATCH_SCHEMA)
            .await?;

        let details = ResumeMatchDetails {
            skills: read_u32(&value, "skills_score").min(40),
            projects: read_u32(&value, "projects_score").min(40),
            fit: read_u32(&value, "fit_score").min(20),
        };
        let match_score = if value.get("match_score").is_some() {
            read_u32(&value, "match_score").min(100)
        } else {
            details.skills + details.projects + details.fit
        };
        let is_fake = value.get("is_fake").and_then(|v| v.as_bool()).unwrap_or(false);
        let passed = match_score >= jd.config.resume_match_threshold && !is_fake;
        let review = ResumeReview {
            match_score,
            is_fake,
            passed_threshold: passed,
            details,
            summary: value
                .get("summary")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
            file_ref,
            reviewed_at: Utc::now(),
        };

        if !passed {
            warn!(ca_id, match_score, is_fake, "resume gate rejected candidate");
        }
        self.store.update_candidate(ca_id, |c| {
            c.resume = Some(review.clone());
            c.status = if passed {
                CandidateStatus::Ready
            } else {
                CandidateStatus::ResumeRejected
            };
            c.recompute_onboarding();
            Ok(())
        })
    }

    pub fn status(&self, ca_id: &str) -> EngineResult<CandidateAssessment> {
        self.store.require_candidate(ca_id)
    }

    async fn issue_otp(
        &self,
        ca: &CandidateAssessment,
        email: &str,
        jd: &JobDescription,
    ) -> EngineResult<()> {
        let otp = OtpRecord::new(email, OTP_PURPOSE, token::mint_otp_code());
        self.store.replace_otp(&otp)?;
        let assess_url = format!(
            "{}/assess/{}",
            self.frontend_base_url.trim_end_matches('/'),
            jd.assessment_link.as_deref().unwrap_or_default()
        );
        let mail = Mail {
            to: email.to_string(),
            subject: format!("Your verification code for {}", jd.title),
            body: format!(
                "Your verification code is {}. It expires in 10 minutes.\n\
                 Continue your assessment at {assess_url}",
                otp.code
            ),
        };
        let delivery = match self.mailer.send(&mail).await {
            Ok(()) => "sent",
            Err(e) => {
                warn!(error = %e, "OTP mail delivery failed");
                "failed"
            }
        };
        self.store.update_candidate(&ca.id, |c| {
            c.log_communication("email", mail.subject.clone(), delivery);
            Ok(())
        })?;
        Ok(())
    }
}

fn read_u32(value: &serde_json::Value, key: &str) -> u32 {
    value
        .get(key)
        .and_then(|v| {
            v.as_u64()
                .or_else(|| v.as_f64().map(|f| f.max(0.0).round() as u64))
        })
        .unwrap_or(0) as u32
}
