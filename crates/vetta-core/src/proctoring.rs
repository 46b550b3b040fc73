//! Proctoring ingest: classifies events by severity, appends them to the
//! attempt's record, and maintains the integrity flag.
//!
//! A high-severity event moves `integrity_status` to `FlaggedUnderReview` —
//! one-way until an admin review. Ingest never transitions the candidate's
//! lifecycle status; flagged attempts keep running.

use crate::error::{EngineError, EngineResult};
use crate::model::{
    AdminReview, IntegrityStatus, ProctoringEvent, ProctoringEventType, Section, Severity,
};
use crate::store::{AuditRecord, Store};
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

pub struct ProctoringIngest {
    store: Arc<Store>,
}

impl ProctoringIngest {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Records one event. `event_type` must be in the closed set; severity
    /// is derived from it unless an override is supplied. Counters are
    /// bumped atomically on the attempt; the candidate's lifecycle status
    /// is never touched here.
    #[allow(clippy::too_many_arguments)]
    pub fn log_event(
        &self,
        ca_id: &str,
        event_type: &str,
        evidence: serde_json::Value,
        section: Option<Section>,
        question_id: Option<String>,
        screenshot_ref: Option<String>,
        severity_override: Option<Severity>,
    ) -> EngineResult<ProctoringEvent> {
        let event_type = ProctoringEventType::parse(event_type)
            .ok_or_else(|| EngineError::invalid("type", "unknown proctoring event type"))?;
        // Ensure the attempt exists before writing anything.
        self.store.require_candidate(ca_id)?;

        let mut event = ProctoringEvent::new(ca_id, event_type);
        event.evidence = evidence;
        event.section = section;
        event.question_id = question_id;
        event.screenshot_ref = screenshot_ref;
        if let Some(severity) = severity_override {
            event.severity = severity;
        }
        self.store.append_event(&event)?;

        let severity = event.severity;
        self.store.update_candidate(ca_id, |c| {
            c.proctoring.total_events += 1;
            if event_type == ProctoringEventType::TabSwitch {
                c.proctoring.tab_switches += 1;
            }
            if event_type.is_face_issue() {
                c.proctoring.face_detection_issues += 1;
            }
            if severity == Severity::High {
                c.proctoring.high_severity_events += 1;
                c.integrity_status = IntegrityStatus::FlaggedUnderReview;
            }
            Ok(())
        })?;

        if severity == Severity::High {
            warn!(ca_id, ?event_type, "high-severity proctoring event; attempt flagged");
        } else {
            info!(ca_id, ?event_type, ?severity, "proctoring event recorded");
        }
        Ok(event)
    }

    /// Admin review of one event: records notes, optionally dismisses it,
    /// and may restore the attempt's integrity status to `Clear`.
    pub fn review_event(
        &self,
        event_id: &str,
        reviewer: &str,
        notes: &str,
        dismissed: bool,
        restore_integrity: bool,
    ) -> EngineResult<ProctoringEvent> {
        let reviewer_owned = reviewer.to_string();
        let notes_owned = notes.to_string();
        let event = self.store.update_event(event_id, |e| {
            e.admin_review = Some(AdminReview {
                reviewed_by: reviewer_owned.clone(),
                notes: notes_owned.clone(),
                dismissed,
                reviewed_at: Utc::now(),
            });
            Ok(())
        })?;
        if restore_integrity {
            self.store
                .update_candidate(&event.candidate_assessment_id, |c| {
                    c.integrity_status = IntegrityStatus::Clear;
                    Ok(())
                })?;
        }
        self.store.append_audit(
            &AuditRecord::new(reviewer, "proctoring.review", event_id)
                .with_detail(format!("dismissed={dismissed} restore={restore_integrity}")),
        )?;
        Ok(event)
    }

    pub fn list_events(&self, ca_id: &str) -> EngineResult<Vec<ProctoringEvent>> {
        self.store.list_events(ca_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CandidateAssessment;

    fn setup() -> (tempfile::TempDir, Arc<Store>, ProctoringIngest, String) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(Store::open(dir.path()).unwrap());
        let ca = CandidateAssessment::new("u1", "jd1");
        store.insert_candidate(&ca).unwrap();
        let ingest = ProctoringIngest::new(store.clone());
        (dir, store, ingest, ca.id)
    }

    #[test]
    fn high_severity_flags_integrity_one_way() {
        let (_dir, store, ingest, ca_id) = setup();
        ingest
            .log_event(&ca_id, "tab_switch", serde_json::Value::Null, None, None, None, None)
            .unwrap();
        let ca = store.get_candidate(&ca_id).unwrap().unwrap();
        assert_eq!(ca.integrity_status, IntegrityStatus::Clear);
        assert_eq!(ca.proctoring.tab_switches, 1);

        ingest
            .log_event(&ca_id, "copy_paste", serde_json::Value::Null, None, None, None, None)
            .unwrap();
        let ca = store.get_candidate(&ca_id).unwrap().unwrap();
        assert_eq!(ca.integrity_status, IntegrityStatus::FlaggedUnderReview);
        assert_eq!(ca.proctoring.high_severity_events, 1);

        // Low-severity traffic afterwards does not clear the flag.
        ingest
            .log_event(&ca_id, "window_blur", serde_json::Value::Null, None, None, None, None)
            .unwrap();
        let ca = store.get_candidate(&ca_id).unwrap().unwrap();
        assert_eq!(ca.integrity_status, IntegrityStatus::FlaggedUnderReview);
        assert_eq!(ca.proctoring.total_events, 3);
    }

    #[test]
    fn unknown_event_types_are_rejected() {
        let (_dir, _store, ingest, ca_id) = setup();
        let err = ingest
            .log_event(&ca_id, "telepathy", serde_json::Value::Null, None, None, None, None)
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[test]
    fn face_issue_counter_covers_face_event_types() {
        let (_dir, store, ingest, ca_id) = setup();
        for kind in ["no_face", "face_not_centered", "multiple_faces"] {
            ingest
                .log_event(&ca_id, kind, serde_json::Value::Null, None, None, None, None)
                .unwrap();
        }
        let ca = store.get_candidate(&ca_id).unwrap().unwrap();
        assert_eq!(ca.proctoring.face_detection_issues, 3);
    }

    #[test]
    fn admin_review_can_restore_integrity() {
        let (_dir, store, ingest, ca_id) = setup();
        let event = ingest
            .log_event(&ca_id, "dev_tools", serde_json::Value::Null, None, None, None, None)
            .unwrap();
        ingest
            .review_event(&event.id, "admin1", "false positive", true, true)
            .unwrap();
        let ca = store.get_candidate(&ca_id).unwrap().unwrap();
        assert_eq!(ca.integrity_status, IntegrityStatus::Clear);
        let reviewed = store.get_event(&event.id).unwrap().unwrap();
        assert!(reviewed.admin_review.unwrap().dismissed);
    }
}
