//! One-time password models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OtpPurpose {
    /// Proves ownership of a mobile number at signup.
    Signup,
    /// Confirms a withdrawal request.
    Payout,
}

impl OtpPurpose {
    pub fn as_str(self) -> &'static str {
        match self {
            OtpPurpose::Signup => "signup",
            OtpPurpose::Payout => "payout",
        }
    }
}

/// A stored OTP. Only the SHA-256 of the code is kept.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OtpCode {
    pub id: Uuid,
    pub destination: String,
    pub purpose: String,
    pub code_hash: String,
    pub attempts: i32,
    pub expires_at: DateTime<Utc>,
    pub consumed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Request body for `POST /api/auth/otp`.
///
/// Only `signup` codes are issued here. Payout codes go to the caller's
/// own mobile via `POST /api/payouts/otp`.
#[derive(Debug, Deserialize)]
pub struct OtpRequest {
    pub destination: Option<String>,
    pub purpose: OtpPurpose,
}

#[derive(Debug, Serialize)]
pub struct OtpResponse {
    pub sent: bool,
    pub expires_at: DateTime<Utc>,
    /// Present only when debug echo is enabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}
