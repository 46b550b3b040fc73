//! JD lifecycle manager: upload, AI parse, configuration, locking, link
//! minting, set-generation orchestration, and cascade delete.
//!
//! Parse is idempotent: a JD that already carries parsed content returns it
//! without a second model call. Once the assessment window has opened (or
//! the JD is locked), every config field except `endTime` is frozen.

use crate::error::{EngineError, EngineResult};
use crate::llm::{LlmGateway, LlmRequest};
use crate::model::{
    AssessmentConfig, ExperienceLevel, JdStatus, JobDescription, ParsedContent, SectionsConfig,
};
use crate::prompts;
use crate::setgen::SetGenerator;
use crate::store::{AuditRecord, Store};
use crate::token;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info};

/// Attempts at minting a unique assessment link before giving up.
const LINK_MINT_ATTEMPTS: u32 = 16;

/// Partial config write; `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct ConfigPatch {
    pub sections: Option<SectionsConfig>,
    pub cutoff_score: Option<u32>,
    pub resume_match_threshold: Option<u32>,
    pub num_sets: Option<u32>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

impl ConfigPatch {
    /// True when the patch touches anything beyond `endTime`.
    fn touches_frozen_fields(&self) -> bool {
        self.sections.is_some()
            || self.cutoff_score.is_some()
            || self.resume_match_threshold.is_some()
            || self.num_sets.is_some()
            || self.start_time.is_some()
    }

    fn apply(&self, config: &mut AssessmentConfig) {
        if let Some(sections) = &self.sections {
            config.sections = sections.clone();
        }
        if let Some(cutoff) = self.cutoff_score {
            config.cutoff_score = cutoff;
        }
        if let Some(threshold) = self.resume_match_threshold {
            config.resume_match_threshold = threshold;
        }
        if let Some(num_sets) = self.num_sets {
            config.num_sets = num_sets;
        }
        if let Some(start) = self.start_time {
            config.start_time = Some(start);
        }
        if let Some(end) = self.end_time {
            config.end_time = Some(end);
        }
    }
}

pub struct JdManager {
    store: Arc<Store>,
    llm: Arc<LlmGateway>,
    setgen: SetGenerator,
}

impl JdManager {
    pub fn new(store: Arc<Store>, llm: Arc<LlmGateway>) -> Self {
        let setgen = SetGenerator::new(store.clone(), llm.clone());
        Self { store, llm, setgen }
    }

    /// Creates a JD in `draft` from raw text (and an optional uploaded-file
    /// reference).
    pub fn upload(
        &self,
        company_id: &str,
        recruiter_id: &str,
        title: &str,
        raw_text: &str,
        file_ref: Option<String>,
    ) -> EngineResult<JobDescription> {
        if raw_text.trim().len() < 50 {
            return Err(EngineError::invalid(
                "rawText",
                "job description text must be at least 50 characters",
            ));
        }
        let mut jd = JobDescription::new(company_id, recruiter_id, title, raw_text);
        jd.file_ref = file_ref;
        self.store.insert_jd(&jd)?;
        self.store
            .append_audit(&AuditRecord::new(recruiter_id, "jd.upload", &jd.id))?;
        Ok(jd)
    }

    /// Parses the raw JD text into structured content. Idempotent: parsed
    /// JDs return their existing payload with no model call.
    pub async fn parse(&self, jd_id: &str) -> EngineResult<JobDescription> {
        let jd = self.store.require_jd(jd_id)?;
        if let Some(parsed) = &jd.parsed {
            if jd.status != JdStatus::Draft && !parsed.technical_skills.is_empty() {
                return Ok(jd);
            }
        }
        if jd.status == JdStatus::Parsing {
            return Err(EngineError::conflict("parse already in progress"));
        }

        self.store.update_jd(jd_id, |j| {
            j.status = JdStatus::Parsing;
            Ok(())
        })?;

        let request = LlmRequest::new(prompts::jd_parse_prompt(&jd.raw_text))
            .with_system(prompts::JD_PARSE_SYSTEM)
            .with_temperature(0.1);
        let value = match self
            .llm
            .complete_json(&request, prompts::JD_PARSE_SCHEMA)
            .await
        {
            Ok(value) => value,
            Err(e) => {
                // Recoverable: back to draft with the failure on record.
                let message = e.to_string();
                error!(jd_id, error = %message, "JD parse failed");
                self.store.update_jd(jd_id, |j| {
                    j.status = JdStatus::Draft;
                    j.parsing.parse_errors.push(message.clone());
                    Ok(())
                })?;
                return Err(e);
            }
        };

        let parsed = parsed_content_from(&value);
        let model = self.llm.default_model().to_string();
        let updated = self.store.update_jd(jd_id, move |j| {
            let level = parsed.experience_level.unwrap_or(ExperienceLevel::Mid);
            j.config.sections = level.default_sections();
            j.config.recompute_total_time();
            j.parsed = Some(parsed.clone());
            j.parsing.parsed_at = Some(Utc::now());
            j.parsing.model = Some(model.clone());
            j.status = JdStatus::Parsed;
            Ok(())
        })?;
        info!(jd_id, "JD parsed");
        Ok(updated)
    }

    /// Applies a config patch. Rejected wholesale once the window has opened
    /// or the JD is locked, except for `endTime`.
    pub fn update_config(
        &self,
        jd_id: &str,
        actor: &str,
        patch: &ConfigPatch,
    ) -> EngineResult<JobDescription> {
        let jd = self.store.require_jd(jd_id)?;
        let now = Utc::now();
        if (jd.is_locked || jd.config.started(now)) && patch.touches_frozen_fields() {
            return Err(EngineError::conflict(
                "assessment has started; only endTime may change",
            ));
        }
        let updated = self.store.update_jd(jd_id, |j| {
            patch.apply(&mut j.config);
            j.config.recompute_total_time();
            j.config.validate()?;
            Ok(())
        })?;
        self.store
            .append_audit(&AuditRecord::new(actor, "jd.update_config", jd_id))?;
        Ok(updated)
    }

    /// Replaces the skill list used for generation. Forbidden once the test
    /// has started.
    pub fn update_skills(
        &self,
        jd_id: &str,
        actor: &str,
        skills: Vec<String>,
    ) -> EngineResult<JobDescription> {
        self.reject_after_start(jd_id, "skills")?;
        if skills.is_empty() {
            return Err(EngineError::invalid("skills", "skill list cannot be empty"));
        }
        let updated = self.store.update_jd(jd_id, |j| {
            let parsed = j
                .parsed
                .as_mut()
                .ok_or_else(|| EngineError::invalid("status", "JD has not been parsed"))?;
            parsed.technical_skills = skills.clone();
            Ok(())
        })?;
        self.store
            .append_audit(&AuditRecord::new(actor, "jd.update_skills", jd_id))?;
        Ok(updated)
    }

    /// Replaces recruiter rubric guidance. Forbidden once the test has
    /// started.
    pub fn update_rubrics(
        &self,
        jd_id: &str,
        actor: &str,
        notes: Option<String>,
    ) -> EngineResult<JobDescription> {
        self.reject_after_start(jd_id, "rubrics")?;
        let updated = self.store.update_jd(jd_id, |j| {
            j.rubric_notes = notes.clone();
            Ok(())
        })?;
        self.store
            .append_audit(&AuditRecord::new(actor, "jd.update_rubrics", jd_id))?;
        Ok(updated)
    }

    pub fn set_locked(&self, jd_id: &str, actor: &str, locked: bool) -> EngineResult<JobDescription> {
        let updated = self.store.update_jd(jd_id, |j| {
            j.is_locked = locked;
            j.locked_at = if locked { Some(Utc::now()) } else { None };
            Ok(())
        })?;
        let action = if locked { "jd.lock" } else { "jd.unlock" };
        self.store.append_audit(&AuditRecord::new(actor, action, jd_id))?;
        Ok(updated)
    }

    /// Mints a unique assessment link, generates the question sets, and
    /// moves the JD to `ready`. On generation failure the JD reverts to
    /// `parsed`, the error lands in the parse-error list, and the link claim
    /// is released.
    pub async fn generate_link(&self, jd_id: &str, actor: &str) -> EngineResult<JobDescription> {
        let jd = self.store.require_jd(jd_id)?;
        if jd.assessment_link.is_some() && matches!(jd.status, JdStatus::Ready | JdStatus::Active) {
            return Ok(jd);
        }
        if !matches!(jd.status, JdStatus::Parsed | JdStatus::Ready) {
            return Err(EngineError::conflict(
                "link generation requires a parsed JD",
            ));
        }
        match (jd.config.start_time, jd.config.end_time) {
            (Some(start), Some(end)) if start < end => {}
            _ => {
                return Err(EngineError::invalid(
                    "startTime",
                    "a valid assessment window (startTime < endTime) is required",
                ))
            }
        }

        let link = self.mint_unique_link(jd_id)?;
        self.store.update_jd(jd_id, |j| {
            j.status = JdStatus::GeneratingSets;
            j.assessment_link = Some(link.clone());
            Ok(())
        })?;

        let jd = self.store.require_jd(jd_id)?;
        match self.setgen.generate_for_jd(&jd).await {
            Ok(set_ids) => {
                info!(jd_id, sets = set_ids.len(), link = %link, "assessment ready");
                let updated = self.store.update_jd(jd_id, |j| {
                    j.status = JdStatus::Ready;
                    Ok(())
                })?;
                self.store
                    .append_audit(&AuditRecord::new(actor, "jd.generate_link", jd_id))?;
                Ok(updated)
            }
            Err(e) => {
                let message = e.to_string();
                error!(jd_id, error = %message, "set generation failed");
                self.store.release_assessment_link(&link)?;
                self.store.update_jd(jd_id, |j| {
                    j.status = JdStatus::Parsed;
                    j.assessment_link = None;
                    j.parsing.parse_errors.push(format!("set generation: {message}"));
                    Ok(())
                })?;
                Err(e)
            }
        }
    }

    /// Deletes a JD and everything hanging off it. Forbidden while the
    /// assessment is live.
    pub fn delete(&self, jd_id: &str, actor: &str) -> EngineResult<()> {
        let jd = self.store.require_jd(jd_id)?;
        if jd.effective_status(Utc::now()) == JdStatus::Active {
            return Err(EngineError::conflict("cannot delete an active assessment"));
        }
        for set_id in &jd.set_ids {
            self.store.delete_set(set_id)?;
        }
        for ca in self.store.list_candidates_for_jd(jd_id)? {
            self.store.delete_answers(&ca.id)?;
            self.store.delete_events(&ca.id)?;
            self.store.delete_evaluation(&ca.id)?;
            self.store.delete_interview(&ca.id)?;
            self.store.delete_candidate(&ca)?;
        }
        self.store.delete_jd(&jd)?;
        self.store
            .append_audit(&AuditRecord::new(actor, "jd.delete", jd_id))?;
        Ok(())
    }

    pub fn get(&self, jd_id: &str) -> EngineResult<JobDescription> {
        self.store.require_jd(jd_id)
    }

    pub fn list(&self, company_id: &str) -> EngineResult<Vec<JobDescription>> {
        self.store.list_jds_by_company(company_id)
    }

    fn reject_after_start(&self, jd_id: &str, what: &str) -> EngineResult<()> {
        let jd = self.store.require_jd(jd_id)?;
        if jd.config.started(Utc::now()) {
            return Err(EngineError::conflict(format!(
                "{what} cannot change after the assessment has started"
            )));
        }
        Ok(())
    }

    fn mint_unique_link(&self, jd_id: &str) -> EngineResult<String> {
        for _ in 0..LINK_MINT_ATTEMPTS {
            let candidate = token::mint_assessment_link();
            if self.store.claim_assessment_link(&candidate, jd_id)? {
                return Ok(candidate);
            }
        }
        Err(EngineError::Infrastructure(
            "could not mint a unique assessment link".to_string(),
        ))
    }
}

/// Defensive mapping from the model's JSON to `ParsedContent`; every field
/// is optional with defaults.
fn parsed_content_from(value: &Value) -> ParsedContent {
    let strings = |key: &str| -> Vec<String> {
        value
            .get(key)
            .and_then(|v| v.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|i| i.as_str())
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    };
    ParsedContent {
        role_title: value
            .get("role_title")
            .or_else(|| value.get("roleTitle"))
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string(),
        experience_level: value
            .get("experience_level")
            .or_else(|| value.get("experienceLevel"))
            .and_then(|v| v.as_str())
            .and_then(ExperienceLevel::parse),
        technical_skills: strings("technical_skills"),
        soft_skills: strings("soft_skills"),
        responsibilities: strings("responsibilities"),
        qualifications: strings("qualifications"),
        summary: value
            .get("summary")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parsed_content_tolerates_missing_fields() {
        let parsed = parsed_content_from(&json!({"role_title": "SRE"}));
        assert_eq!(parsed.role_title, "SRE");
        assert!(parsed.technical_skills.is_empty());
        assert!(parsed.experience_level.is_none());
    }

    #[test]
    fn experience_level_aliases_parse() {
        let parsed = parsed_content_from(&json!({"experienceLevel": "Principal"}));
        assert_eq!(parsed.experience_level, Some(ExperienceLevel::Lead));
    }

    #[test]
    fn frozen_patch_detection_ignores_end_time() {
        let end_only = ConfigPatch {
            end_time: Some(Utc::now()),
            ..ConfigPatch::default()
        };
        assert!(!end_only.touches_frozen_fields());
        let with_cutoff = ConfigPatch {
            cutoff_score: Some(70),
            ..ConfigPatch::default()
        };
        assert!(with_cutoff.touches_frozen_fields());
    }
}
