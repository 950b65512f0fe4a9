//! Withdrawal (payout) models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayoutStatus {
    Pending,
    Paid,
    Rejected,
}

impl PayoutStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PayoutStatus::Pending => "pending",
            PayoutStatus::Paid => "paid",
            PayoutStatus::Rejected => "rejected",
        }
    }
}

/// A withdrawal from the commission wallet.
///
/// The full `amount_paise` is held (debited) when the request is made; the
/// member receives `net_paise` once an admin marks it paid.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Payout {
    pub id: Uuid,
    pub user_id: Uuid,
    pub amount_paise: i64,
    pub fee_paise: i64,
    pub net_paise: i64,
    pub account_holder: String,
    pub account_number: String,
    pub ifsc_code: String,
    pub status: String,
    pub payment_reference: Option<String>,
    pub admin_note: Option<String>,
    pub reviewed_by: Option<Uuid>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Request body for `POST /api/payouts`.
#[derive(Debug, Deserialize)]
pub struct PayoutRequest {
    pub amount_paise: i64,
    /// Code from `POST /api/payouts/otp`.
    pub otp: String,
}

/// Request body for `POST /api/admin/payouts/{id}/approve`.
#[derive(Debug, Deserialize)]
pub struct ApprovePayoutRequest {
    pub payment_reference: String,
}

/// Fee and net amount for a payout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayoutBreakdown {
    pub fee_paise: i64,
    pub net_paise: i64,
}

impl PayoutBreakdown {
    /// Split `amount_paise` into fee and net at `fee_bps` basis points.
    ///
    /// The fee rounds down, so rounding always favors the member.
    pub fn compute(amount_paise: i64, fee_bps: i64) -> Self {
        let fee_bps = fee_bps.clamp(0, 10_000);
        let fee_paise = ((amount_paise as i128 * fee_bps as i128) / 10_000) as i64;
        Self {
            fee_paise,
            net_paise: amount_paise - fee_paise,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_fee() {
        let b = PayoutBreakdown::compute(50_000, 0);
        assert_eq!(b.fee_paise, 0);
        assert_eq!(b.net_paise, 50_000);
    }

    #[test]
    fn test_fee_rounds_down() {
        // 5% of Rs 500.07
        let b = PayoutBreakdown::compute(50_007, 500);
        assert_eq!(b.fee_paise, 2_500);
        assert_eq!(b.net_paise, 47_507);
        assert_eq!(b.fee_paise + b.net_paise, 50_007);
    }

    #[test]
    fn test_fee_is_clamped() {
        let b = PayoutBreakdown::compute(10_000, 25_000);
        assert_eq!(b.fee_paise, 10_000);
        assert_eq!(b.net_paise, 0);

        let b = PayoutBreakdown::compute(10_000, -3);
        assert_eq!(b.fee_paise, 0);
    }
}
