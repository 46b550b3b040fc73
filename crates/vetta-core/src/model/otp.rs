//! One-time passcodes for email verification. Expiry is enforced at read
//! time by the store, so no caller ever observes a stale code.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const OTP_VALIDITY_MINUTES: i64 = 10;
pub const OTP_MAX_ATTEMPTS: u32 = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtpRecord {
    pub id: String,
    pub email: String,
    /// What the code authorizes (e.g. `email_verification`).
    pub purpose: String,
    pub code: String,
    pub expires_at: DateTime<Utc>,
    pub attempts: u32,
    pub max_attempts: u32,
    pub verified: bool,
    pub created_at: DateTime<Utc>,
}

impl OtpRecord {
    pub fn new(email: impl Into<String>, purpose: impl Into<String>, code: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.into(),
            purpose: purpose.into(),
            code: code.into(),
            expires_at: now + Duration::minutes(OTP_VALIDITY_MINUTES),
            attempts: 0,
            max_attempts: OTP_MAX_ATTEMPTS,
            verified: false,
            created_at: now,
        }
    }

    pub fn is_expired(&self, at: DateTime<Utc>) -> bool {
        at >= self.expires_at
    }

    pub fn attempts_exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }
}
