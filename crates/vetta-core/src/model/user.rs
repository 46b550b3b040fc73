//! Candidate user record. Recruiter identity comes from the external auth
//! layer and is carried as opaque ids.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateUser {
    pub id: String,
    pub email: String,
    pub name: String,
    pub photo_ref: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl CandidateUser {
    pub fn new(email: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.into(),
            name: name.into(),
            photo_ref: None,
            created_at: Utc::now(),
        }
    }
}
