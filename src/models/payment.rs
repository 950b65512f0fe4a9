//! Manual payment verification models.
//!
//! A member pays for a package outside the platform (bank transfer, UPI)
//! and submits the transaction reference. An admin verifies it; approval
//! creates the purchase and triggers commission distribution.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PaymentVerification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub package_id: Uuid,
    pub amount_paise: i64,
    pub transaction_ref: String,
    pub proof_url: Option<String>,
    /// "pending", "approved" or "rejected"
    pub status: String,
    pub admin_note: Option<String>,
    pub reviewed_by: Option<Uuid>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Request body for `POST /api/payment/verifications`.
///
/// ```json
/// {
///   "package_id": "550e8400-e29b-41d4-a716-446655440000",
///   "transaction_ref": "UTR123456789012",
///   "proof_url": "https://res.cloudinary.com/demo/payment.png"
/// }
/// ```
#[derive(Debug, Deserialize)]
pub struct SubmitPaymentRequest {
    pub package_id: Uuid,
    pub transaction_ref: String,
    pub proof_url: Option<String>,
}
