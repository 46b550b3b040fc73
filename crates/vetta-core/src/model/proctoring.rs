//! Proctoring events: append-only classification records. Severity is
//! derived from the event type at ingest unless explicitly overridden.

use super::Section;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// Closed set of recognized proctoring event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProctoringEventType {
    MultipleFaces,
    DeviceDetected,
    ExternalScreen,
    CopyPaste,
    DevTools,
    TabSwitch,
    NoFace,
    KeyboardShortcut,
    #[serde(rename = "idle-long")]
    IdleLong,
    Suspicious,
    FullscreenExit,
    WindowBlur,
    FaceNotCentered,
    RightClick,
    BrowserResize,
}

impl ProctoringEventType {
    pub fn parse(s: &str) -> Option<Self> {
        serde_json::from_value(serde_json::Value::String(s.to_string())).ok()
    }

    /// Fixed type -> severity mapping.
    pub fn severity(&self) -> Severity {
        use ProctoringEventType::*;
        match self {
            MultipleFaces | DeviceDetected | ExternalScreen | CopyPaste | DevTools => {
                Severity::High
            }
            TabSwitch | NoFace | KeyboardShortcut | IdleLong | Suspicious
            | FullscreenExit => Severity::Medium,
            WindowBlur | FaceNotCentered | RightClick | BrowserResize => Severity::Low,
        }
    }

    /// Counted under `face_detection_issues`.
    pub fn is_face_issue(&self) -> bool {
        matches!(
            self,
            Self::MultipleFaces | Self::NoFace | Self::FaceNotCentered
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminReview {
    pub reviewed_by: String,
    pub notes: String,
    pub dismissed: bool,
    pub reviewed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProctoringEvent {
    pub id: String,
    pub candidate_assessment_id: String,
    pub event_type: ProctoringEventType,
    pub severity: Severity,
    pub occurred_at: DateTime<Utc>,
    pub screenshot_ref: Option<String>,
    /// Free-form evidence bag supplied by the proctoring client.
    #[serde(default)]
    pub evidence: serde_json::Value,
    pub section: Option<Section>,
    pub question_id: Option<String>,
    /// The only mutable part of an event.
    pub admin_review: Option<AdminReview>,
}

impl ProctoringEvent {
    pub fn new(
        candidate_assessment_id: impl Into<String>,
        event_type: ProctoringEventType,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            candidate_assessment_id: candidate_assessment_id.into(),
            event_type,
            severity: event_type.severity(),
            occurred_at: Utc::now(),
            screenshot_ref: None,
            evidence: serde_json::Value::Null,
            section: None,
            question_id: None,
            admin_review: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_mapping_is_total() {
        use ProctoringEventType::*;
        let all = [
            MultipleFaces,
            DeviceDetected,
            ExternalScreen,
            CopyPaste,
            DevTools,
            TabSwitch,
            NoFace,
            KeyboardShortcut,
            IdleLong,
            Suspicious,
            FullscreenExit,
            WindowBlur,
            FaceNotCentered,
            RightClick,
            BrowserResize,
        ];
        assert_eq!(all.iter().filter(|t| t.severity() == Severity::High).count(), 5);
        assert_eq!(all.iter().filter(|t| t.severity() == Severity::Medium).count(), 6);
        assert_eq!(all.iter().filter(|t| t.severity() == Severity::Low).count(), 4);
    }

    #[test]
    fn wire_names_round_trip() {
        assert_eq!(
            ProctoringEventType::parse("tab_switch"),
            Some(ProctoringEventType::TabSwitch)
        );
        assert_eq!(
            ProctoringEventType::parse("idle-long"),
            Some(ProctoringEventType::IdleLong)
        );
        assert_eq!(
            ProctoringEventType::parse("suspicious"),
            Some(ProctoringEventType::Suspicious)
        );
        assert_eq!(ProctoringEventType::parse("idle_long"), None);
        assert_eq!(ProctoringEventType::parse("unknown_kind"), None);
    }
}
