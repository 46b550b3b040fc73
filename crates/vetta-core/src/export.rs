//! Admin reporting: per-JD candidate exports (CSV and JSON) and aggregate
//! analytics.

use crate::error::EngineResult;
use crate::model::{CandidateStatus, Recommendation};
use crate::store::{AuditRecord, Store};
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;

const CSV_HEADER: &str = "\"Name\",\"Email\",\"Status\",\"Resume Match Score\",\"Score\",\"Submitted\"";

#[derive(Debug, Clone, Serialize)]
pub struct JdAnalytics {
    pub jd_id: String,
    pub total_candidates: u64,
    pub completed_assessments: u64,
    pub status_counts: BTreeMap<String, u64>,
    pub average_weighted_score: f64,
    pub max_weighted_score: f64,
    pub completion_rate: f64,
    /// Share of evaluated candidates the model recommended to pass.
    pub pass_rate: f64,
    pub flagged_candidates: u64,
}

pub struct AdminReports {
    store: Arc<Store>,
}

impl AdminReports {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Candidates-by-JD CSV: every value double-quote wrapped, UTF-8.
    /// Returns `(filename, body)`.
    pub fn candidates_csv(&self, jd_id: &str) -> EngineResult<(String, String)> {
        let mut out = String::from(CSV_HEADER);
        out.push('\n');
        for ca in self.store.list_candidates_for_jd(jd_id)? {
            let user = self.store.get_user(&ca.candidate_id)?;
            let (name, email) = user
                .map(|u| (u.name, u.email))
                .unwrap_or_else(|| (String::new(), String::new()));
            let resume_score = ca
                .resume
                .as_ref()
                .map(|r| r.match_score.to_string())
                .unwrap_or_default();
            let score = self
                .store
                .get_evaluation(&ca.id)?
                .map(|e| format!("{:.1}", e.weighted_score))
                .unwrap_or_default();
            let submitted = ca
                .timing
                .submitted_at
                .map(|t| t.to_rfc3339())
                .unwrap_or_default();
            let row = [
                name,
                email,
                status_label(ca.status),
                resume_score,
                score,
                submitted,
            ];
            let quoted: Vec<String> = row.iter().map(|v| csv_quote(v)).collect();
            out.push_str(&quoted.join(","));
            out.push('\n');
        }
        Ok((format!("candidates-{jd_id}.csv"), out))
    }

    pub fn candidates_json(&self, jd_id: &str) -> EngineResult<serde_json::Value> {
        let mut rows = Vec::new();
        for ca in self.store.list_candidates_for_jd(jd_id)? {
            let user = self.store.get_user(&ca.candidate_id)?;
            let evaluation = self.store.get_evaluation(&ca.id)?;
            rows.push(json!({
                "candidateAssessmentId": ca.id,
                "name": user.as_ref().map(|u| u.name.clone()),
                "email": user.as_ref().map(|u| u.email.clone()),
                "status": ca.status,
                "integrityStatus": ca.integrity_status,
                "resumeMatchScore": ca.resume.as_ref().map(|r| r.match_score),
                "weightedScore": evaluation.as_ref().map(|e| e.weighted_score),
                "recommendation": evaluation.as_ref().map(|e| e.ai_recommendation),
                "submittedAt": ca.timing.submitted_at,
            }));
        }
        Ok(serde_json::Value::Array(rows))
    }

    pub fn analytics(&self, jd_id: &str) -> EngineResult<JdAnalytics> {
        let jd = self.store.require_jd(jd_id)?;
        let candidates = self.store.list_candidates_for_jd(jd_id)?;
        let mut status_counts: BTreeMap<String, u64> = BTreeMap::new();
        let mut scores = Vec::new();
        let mut pass_recommendations = 0u64;
        let mut evaluated = 0u64;
        let mut flagged = 0u64;
        for ca in &candidates {
            *status_counts.entry(status_label(ca.status)).or_insert(0) += 1;
            if ca.integrity_status == crate::model::IntegrityStatus::FlaggedUnderReview {
                flagged += 1;
            }
            if let Some(evaluation) = self.store.get_evaluation(&ca.id)? {
                evaluated += 1;
                scores.push(evaluation.weighted_score);
                if evaluation.ai_recommendation == Recommendation::Pass {
                    pass_recommendations += 1;
                }
            }
        }
        let total = candidates.len() as u64;
        let average = if scores.is_empty() {
            0.0
        } else {
            scores.iter().sum::<f64>() / scores.len() as f64
        };
        Ok(JdAnalytics {
            jd_id: jd.id,
            total_candidates: total,
            completed_assessments: jd.stats.completed_assessments,
            status_counts,
            average_weighted_score: average,
            max_weighted_score: scores.iter().cloned().fold(0.0, f64::max),
            completion_rate: if total > 0 {
                jd.stats.completed_assessments as f64 / total as f64
            } else {
                0.0
            },
            pass_rate: if evaluated > 0 {
                pass_recommendations as f64 / evaluated as f64
            } else {
                0.0
            },
            flagged_candidates: flagged,
        })
    }

    pub fn audit_log(&self, limit: usize) -> EngineResult<Vec<AuditRecord>> {
        self.store.list_audit(limit)
    }
}

fn status_label(status: CandidateStatus) -> String {
    // snake_case serde name without the quotes
    serde_json::to_value(status)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default()
}

/// Double-quote wrapping with embedded quotes doubled.
fn csv_quote(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}
