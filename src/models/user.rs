//! User data models, auth payloads and KYC types.
//!
//! This module defines:
//! - `User`: database entity, including the sponsor link and KYC details
//! - Signup/login request and response bodies
//! - `UserResponse`: public projection returned to clients
//! - KYC submission and review types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A registered member.
///
/// # Sponsor Tree
///
/// `sponsor_id` points at the user whose referral code was used at signup.
/// Because a sponsor must already exist when a user is created, following
/// `sponsor_id` upward always terminates.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub mobile: String,

    /// Argon2 PHC string. Never serialized.
    pub password_hash: String,

    pub referral_code: String,
    pub sponsor_id: Option<Uuid>,

    /// "user" or "admin"
    pub role: String,

    pub is_active: bool,

    /// "none", "submitted", "approved" or "rejected"
    pub kyc_status: String,
    pub pan_number: Option<String>,
    pub account_holder: Option<String>,
    pub account_number: Option<String>,
    pub ifsc_code: Option<String>,
    pub kyc_document_url: Option<String>,
    pub kyc_note: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Column list matching `User`, shared by every query that loads a user.
pub const USER_COLUMNS: &str = "id, name, email, mobile, password_hash, referral_code, sponsor_id, \
     role, is_active, kyc_status, pan_number, account_holder, account_number, ifsc_code, \
     kyc_document_url, kyc_note, created_at, updated_at";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "user" => Some(Role::User),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KycStatus {
    None,
    Submitted,
    Approved,
    Rejected,
}

impl KycStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            KycStatus::None => "none",
            KycStatus::Submitted => "submitted",
            KycStatus::Approved => "approved",
            KycStatus::Rejected => "rejected",
        }
    }
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin.as_str()
    }

    pub fn kyc_approved(&self) -> bool {
        self.kyc_status == KycStatus::Approved.as_str()
    }
}

/// Request body for `POST /api/auth/signup`.
///
/// ```json
/// {
///   "name": "Asha",
///   "email": "asha@example.com",
///   "mobile": "9876543210",
///   "password": "correct horse",
///   "sponsor_code": "REF7KQ2M9XA",
///   "otp": "493021"
/// }
/// ```
#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub mobile: String,
    pub password: String,
    pub sponsor_code: Option<String>,
    /// Required when signup OTP verification is enabled.
    pub otp: Option<String>,
}

/// Request body for `POST /api/auth/login`. `login` is an email or a mobile number.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub login: String,
    pub password: String,
}

/// Session token plus the user it belongs to.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: UserResponse,
}

/// Public projection of a user. Omits the password hash and bank details.
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub mobile: String,
    pub referral_code: String,
    pub sponsor_id: Option<Uuid>,
    pub role: String,
    pub is_active: bool,
    pub kyc_status: String,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            mobile: user.mobile,
            referral_code: user.referral_code,
            sponsor_id: user.sponsor_id,
            role: user.role,
            is_active: user.is_active,
            kyc_status: user.kyc_status,
            created_at: user.created_at,
        }
    }
}

/// Response body for `GET /api/users/me`.
#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub user: UserResponse,
    pub wallet: crate::models::wallet::Wallet,
    pub direct_referrals: i64,
}

/// A member of someone's downline or upline.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct NetworkMember {
    pub id: Uuid,
    pub name: String,
    pub referral_code: String,
    pub is_active: bool,
    pub level: i32,
    pub created_at: DateTime<Utc>,
}

/// Number of downline members at one depth.
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct TeamLevelCount {
    pub level: i32,
    pub members: i64,
}

/// Request body for `POST /api/users/kyc`.
#[derive(Debug, Deserialize)]
pub struct KycSubmission {
    pub pan_number: String,
    pub account_holder: String,
    pub account_number: String,
    pub ifsc_code: String,
    pub document_url: String,
}

/// KYC details shown to admins during review.
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct KycReviewItem {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub kyc_status: String,
    pub pan_number: Option<String>,
    pub account_holder: Option<String>,
    pub account_number: Option<String>,
    pub ifsc_code: Option<String>,
    pub kyc_document_url: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Admin decision on a pending item (KYC, fund request, payment, social action).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewDecision {
    Approve,
    Reject,
}

#[derive(Debug, Deserialize)]
pub struct KycReviewRequest {
    pub decision: ReviewDecision,
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SetActiveRequest {
    pub is_active: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user() -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            name: "Asha".to_string(),
            email: "asha@example.com".to_string(),
            mobile: "9876543210".to_string(),
            password_hash: "$argon2id$v=19$...".to_string(),
            referral_code: "REFABCDEFGH".to_string(),
            sponsor_id: None,
            role: "user".to_string(),
            is_active: true,
            kyc_status: "none".to_string(),
            pan_number: None,
            account_holder: None,
            account_number: Some("1234567890".to_string()),
            ifsc_code: None,
            kyc_document_url: None,
            kyc_note: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_user_response_hides_secrets() {
        let json = serde_json::to_value(UserResponse::from(sample_user())).unwrap();

        assert!(json.get("password_hash").is_none());
        assert!(json.get("account_number").is_none());
        assert_eq!(json["referral_code"], "REFABCDEFGH");
    }

    #[test]
    fn test_role_and_kyc_helpers() {
        let mut user = sample_user();
        assert!(!user.is_admin());
        assert!(!user.kyc_approved());

        user.role = Role::Admin.as_str().to_string();
        user.kyc_status = KycStatus::Approved.as_str().to_string();
        assert!(user.is_admin());
        assert!(user.kyc_approved());
    }

    #[test]
    fn test_review_decision_deserialization() {
        assert_eq!(
            serde_json::from_str::<ReviewDecision>("\"approve\"").unwrap(),
            ReviewDecision::Approve
        );
        assert_eq!(
            serde_json::from_str::<ReviewDecision>("\"reject\"").unwrap(),
            ReviewDecision::Reject
        );
        assert!(serde_json::from_str::<ReviewDecision>("\"maybe\"").is_err());
    }

    #[test]
    fn test_role_parse() {
        assert_eq!(Role::parse("admin"), Some(Role::Admin));
        assert_eq!(Role::parse("user"), Some(Role::User));
        assert_eq!(Role::parse("root"), None);
    }
}
