//! Job description: the unit of hiring intent, with its assessment
//! configuration and lifecycle state.

use super::Section;
use crate::error::{EngineError, EngineResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// JD lifecycle. `Active` and `Expired` are derived from the assessment
/// window on read paths once the JD is `Ready`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JdStatus {
    Draft,
    Parsing,
    Parsed,
    GeneratingSets,
    Ready,
    Active,
    Expired,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExperienceLevel {
    Fresher,
    Junior,
    Mid,
    Senior,
    Lead,
    Executive,
}

impl ExperienceLevel {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "fresher" | "entry" | "intern" => Some(Self::Fresher),
            "junior" => Some(Self::Junior),
            "mid" | "mid-level" | "intermediate" => Some(Self::Mid),
            "senior" => Some(Self::Senior),
            "lead" | "principal" | "staff" => Some(Self::Lead),
            "executive" | "director" | "vp" => Some(Self::Executive),
            _ => None,
        }
    }

    /// Default section configuration per level: (question count, minutes)
    /// for objective/subjective/programming. Weights default to 30/30/40.
    pub fn default_sections(&self) -> SectionsConfig {
        let (obj, subj, prog) = match self {
            Self::Fresher => ((20, 25), (3, 20), (1, 30)),
            Self::Junior => ((20, 25), (3, 20), (2, 45)),
            Self::Mid => ((15, 20), (4, 25), (2, 50)),
            Self::Senior => ((12, 18), (4, 30), (2, 60)),
            Self::Lead => ((10, 15), (5, 35), (1, 45)),
            Self::Executive => ((10, 15), (5, 40), (0, 0)),
        };
        SectionsConfig {
            objective: SectionConfig {
                enabled: obj.0 > 0,
                question_count: obj.0,
                time_minutes: obj.1,
                weight: 30,
            },
            subjective: SectionConfig {
                enabled: subj.0 > 0,
                question_count: subj.0,
                time_minutes: subj.1,
                weight: 30,
            },
            programming: SectionConfig {
                enabled: prog.0 > 0,
                question_count: prog.0,
                time_minutes: prog.1,
                weight: 40,
            },
        }
    }
}

/// Structured content extracted from the raw JD text by the language model.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParsedContent {
    #[serde(default)]
    pub role_title: String,
    pub experience_level: Option<ExperienceLevel>,
    #[serde(default)]
    pub technical_skills: Vec<String>,
    #[serde(default)]
    pub soft_skills: Vec<String>,
    #[serde(default)]
    pub responsibilities: Vec<String>,
    #[serde(default)]
    pub qualifications: Vec<String>,
    #[serde(default)]
    pub summary: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionConfig {
    pub enabled: bool,
    pub question_count: u32,
    pub time_minutes: u32,
    /// Integer percentage weight used by the evaluation engine.
    pub weight: u32,
}

impl Default for SectionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            question_count: 0,
            time_minutes: 0,
            weight: 0,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SectionsConfig {
    pub objective: SectionConfig,
    pub subjective: SectionConfig,
    pub programming: SectionConfig,
}

impl SectionsConfig {
    pub fn get(&self, section: Section) -> &SectionConfig {
        match section {
            Section::Objective => &self.objective,
            Section::Subjective => &self.subjective,
            Section::Programming => &self.programming,
        }
    }

    pub fn get_mut(&mut self, section: Section) -> &mut SectionConfig {
        match section {
            Section::Objective => &mut self.objective,
            Section::Subjective => &mut self.subjective,
            Section::Programming => &mut self.programming,
        }
    }

    /// Enabled sections in serving order.
    pub fn enabled(&self) -> Vec<Section> {
        Section::ORDER
            .iter()
            .copied()
            .filter(|s| self.get(*s).enabled)
            .collect()
    }

    /// The first enabled section after `current` in serving order.
    pub fn next_enabled(&self, current: Section) -> Option<Section> {
        let mut cursor = current.successor();
        while let Some(s) = cursor {
            if self.get(s).enabled {
                return Some(s);
            }
            cursor = s.successor();
        }
        None
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssessmentConfig {
    pub sections: SectionsConfig,
    /// Sum of enabled sections' minutes; recomputed on every config write.
    pub total_time_minutes: u32,
    /// Percentage governing the AI recommendation banding.
    pub cutoff_score: u32,
    /// Minimum resume match score to pass the gate.
    pub resume_match_threshold: u32,
    /// Number of parallel question sets to generate (1..=10).
    pub num_sets: u32,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

impl Default for AssessmentConfig {
    fn default() -> Self {
        Self {
            sections: SectionsConfig::default(),
            total_time_minutes: 0,
            cutoff_score: 60,
            resume_match_threshold: 60,
            num_sets: 2,
            start_time: None,
            end_time: None,
        }
    }
}

impl AssessmentConfig {
    /// Recomputes `total_time_minutes` from enabled sections. Called on
    /// every config write.
    pub fn recompute_total_time(&mut self) {
        self.total_time_minutes = Section::ORDER
            .iter()
            .filter(|s| self.sections.get(**s).enabled)
            .map(|s| self.sections.get(*s).time_minutes)
            .sum();
    }

    /// Weight fraction of one section over all enabled sections. Weights
    /// are renormalized so historical partial weightings stay in [0, 1].
    pub fn weight_fraction(&self, section: Section) -> f64 {
        let total: u32 = self
            .sections
            .enabled()
            .iter()
            .map(|s| self.sections.get(*s).weight)
            .sum();
        if total == 0 {
            return 0.0;
        }
        f64::from(self.sections.get(section).weight) / f64::from(total)
    }

    /// Shape checks applied at config-write time.
    pub fn validate(&self) -> EngineResult<()> {
        let mut errors = Vec::new();
        if !(1..=10).contains(&self.num_sets) {
            errors.push(crate::error::FieldError::new(
                "numSets",
                "must be between 1 and 10",
            ));
        }
        if self.cutoff_score > 100 {
            errors.push(crate::error::FieldError::new(
                "cutoffScore",
                "must be a percentage (0-100)",
            ));
        }
        if self.resume_match_threshold > 100 {
            errors.push(crate::error::FieldError::new(
                "resumeMatchThreshold",
                "must be a percentage (0-100)",
            ));
        }
        if let (Some(start), Some(end)) = (self.start_time, self.end_time) {
            if start >= end {
                errors.push(crate::error::FieldError::new(
                    "endTime",
                    "must be after startTime",
                ));
            }
        }
        let enabled = self.sections.enabled();
        if !enabled.is_empty() {
            let weight_sum: u32 = enabled.iter().map(|s| self.sections.get(*s).weight).sum();
            if weight_sum != 100 {
                errors.push(crate::error::FieldError::new(
                    "sections",
                    "weights of enabled sections must sum to 100",
                ));
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(EngineError::Validation(errors))
        }
    }

    /// Whether `at` falls inside the assessment window.
    pub fn window_open(&self, at: DateTime<Utc>) -> bool {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => at >= start && at < end,
            _ => false,
        }
    }

    /// Once the window has opened, every field but `endTime` is frozen.
    pub fn started(&self, at: DateTime<Utc>) -> bool {
        self.start_time.map(|s| at >= s).unwrap_or(false)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParsingMeta {
    pub parsed_at: Option<DateTime<Utc>>,
    pub model: Option<String>,
    #[serde(default)]
    pub parse_errors: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JdStats {
    pub total_candidates: u64,
    pub completed_assessments: u64,
    pub last_activity_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobDescription {
    pub id: String,
    pub company_id: String,
    pub recruiter_id: String,
    pub title: String,
    pub raw_text: String,
    /// Reference to an uploaded JD file, when the text came from one.
    pub file_ref: Option<String>,
    pub status: JdStatus,
    pub parsed: Option<ParsedContent>,
    pub config: AssessmentConfig,
    pub parsing: ParsingMeta,
    pub stats: JdStats,
    /// Public 12-char base-62 token; unique across JDs when present.
    pub assessment_link: Option<String>,
    /// Ordered ids of the generated question sets.
    #[serde(default)]
    pub set_ids: Vec<String>,
    /// Recruiter guidance folded into question generation and scoring.
    #[serde(default)]
    pub rubric_notes: Option<String>,
    pub is_locked: bool,
    pub locked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobDescription {
    pub fn new(
        company_id: impl Into<String>,
        recruiter_id: impl Into<String>,
        title: impl Into<String>,
        raw_text: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            company_id: company_id.into(),
            recruiter_id: recruiter_id.into(),
            title: title.into(),
            raw_text: raw_text.into(),
            file_ref: None,
            status: JdStatus::Draft,
            parsed: None,
            config: AssessmentConfig::default(),
            parsing: ParsingMeta::default(),
            stats: JdStats::default(),
            assessment_link: None,
            set_ids: Vec::new(),
            rubric_notes: None,
            is_locked: false,
            locked_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Effective status with the assessment window applied: a `Ready` JD is
    /// `Active` inside the window and `Expired` after it.
    pub fn effective_status(&self, at: DateTime<Utc>) -> JdStatus {
        match self.status {
            JdStatus::Ready | JdStatus::Active | JdStatus::Expired => {
                if let Some(end) = self.config.end_time {
                    if at >= end {
                        return JdStatus::Expired;
                    }
                }
                if self.config.started(at) {
                    JdStatus::Active
                } else {
                    JdStatus::Ready
                }
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_time_sums_enabled_sections_only() {
        let mut config = AssessmentConfig {
            sections: ExperienceLevel::Mid.default_sections(),
            ..AssessmentConfig::default()
        };
        config.sections.programming.enabled = false;
        config.recompute_total_time();
        assert_eq!(config.total_time_minutes, 20 + 25);
    }

    #[test]
    fn weight_fraction_renormalizes_over_enabled() {
        let mut config = AssessmentConfig {
            sections: ExperienceLevel::Junior.default_sections(),
            ..AssessmentConfig::default()
        };
        config.sections.programming.enabled = false;
        // objective 30 + subjective 30 enabled -> each is half
        assert!((config.weight_fraction(Section::Objective) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn window_ordering_is_validated() {
        let now = Utc::now();
        let config = AssessmentConfig {
            sections: ExperienceLevel::Fresher.default_sections(),
            start_time: Some(now),
            end_time: Some(now),
            ..AssessmentConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn effective_status_follows_the_window() {
        let mut jd = JobDescription::new("c1", "r1", "Backend Engineer", "text");
        jd.status = JdStatus::Ready;
        let now = Utc::now();
        jd.config.start_time = Some(now - chrono::Duration::hours(1));
        jd.config.end_time = Some(now + chrono::Duration::hours(1));
        assert_eq!(jd.effective_status(now), JdStatus::Active);
        assert_eq!(
            jd.effective_status(now + chrono::Duration::hours(2)),
            JdStatus::Expired
        );
    }
}
