//! Fund request models (user deposits awaiting admin approval).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle shared by every admin-reviewed request.
///
/// Only `Pending` may move, and only once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewStatus {
    Pending,
    Approved,
    Rejected,
}

impl ReviewStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ReviewStatus::Pending => "pending",
            ReviewStatus::Approved => "approved",
            ReviewStatus::Rejected => "rejected",
        }
    }
}

/// A deposit the user claims to have made outside the platform.
///
/// `transaction_ref` is the bank/UPI reference and is globally unique, so
/// the same payment cannot be claimed twice.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct FundRequest {
    pub id: Uuid,
    pub user_id: Uuid,
    pub amount_paise: i64,
    pub transaction_ref: String,
    pub payment_method: String,
    pub proof_url: Option<String>,
    pub status: String,
    pub admin_note: Option<String>,
    pub reviewed_by: Option<Uuid>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Request body for `POST /api/funds/requests`.
///
/// ```json
/// {
///   "amount_paise": 100000,
///   "transaction_ref": "UPI-412345678901",
///   "payment_method": "upi",
///   "proof_url": "https://res.cloudinary.com/demo/receipt.jpg"
/// }
/// ```
#[derive(Debug, Deserialize)]
pub struct CreateFundRequest {
    pub amount_paise: i64,
    pub transaction_ref: String,
    pub payment_method: String,
    pub proof_url: Option<String>,
}

/// Filter for admin list endpoints.
#[derive(Debug, Deserialize)]
pub struct StatusFilter {
    pub status: Option<String>,
}

/// Request body for admin rejections.
#[derive(Debug, Deserialize)]
pub struct RejectRequest {
    pub reason: String,
}
