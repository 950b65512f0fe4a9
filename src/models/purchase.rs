//! Purchases and the commission credits they produce.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Where the money for a purchase came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseSource {
    Wallet,
    PaymentVerification,
}

impl PurchaseSource {
    pub fn as_str(self) -> &'static str {
        match self {
            PurchaseSource::Wallet => "wallet",
            PurchaseSource::PaymentVerification => "payment_verification",
        }
    }
}

/// State of a purchase's commission distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistributionStatus {
    Pending,
    Completed,
    Failed,
    /// The payment behind the purchase was rejected.
    Cancelled,
}

impl DistributionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DistributionStatus::Pending => "pending",
            DistributionStatus::Completed => "completed",
            DistributionStatus::Failed => "failed",
            DistributionStatus::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Purchase {
    pub id: Uuid,
    pub user_id: Uuid,
    pub package_id: Uuid,
    pub amount_paise: i64,
    pub source: String,
    pub payment_verification_id: Option<Uuid>,
    pub distribution_status: String,
    pub distribution_error: Option<String>,
    pub distributed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Purchase {
    pub fn is_distributed(&self) -> bool {
        self.distribution_status == DistributionStatus::Completed.as_str()
    }

    pub fn is_cancelled(&self) -> bool {
        self.distribution_status == DistributionStatus::Cancelled.as_str()
    }
}

/// Commission paid to one ancestor for one purchase.
///
/// `(purchase_id, level)` is unique: re-running a distribution never pays a
/// level twice.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CommissionCredit {
    pub id: Uuid,
    pub purchase_id: Uuid,
    pub beneficiary_id: Uuid,
    pub level: i32,
    pub amount_paise: i64,
    pub created_at: DateTime<Utc>,
}

/// Request body for `POST /api/purchases`.
#[derive(Debug, Deserialize)]
pub struct PurchaseRequest {
    pub package_id: Uuid,
}

/// Outcome of a purchase, including how its distribution went.
#[derive(Debug, Serialize)]
pub struct PurchaseResponse {
    pub purchase: Purchase,
    pub distribution: DistributionSummary,
}

/// Result of running (or re-running) a distribution.
#[derive(Debug, Clone, Serialize)]
pub struct DistributionSummary {
    pub purchase_id: Uuid,
    pub status: DistributionStatus,
    /// Credits newly written by this run.
    pub credits_created: usize,
    /// Total paid by this run.
    pub amount_distributed_paise: i64,
    pub error: Option<String>,
}

/// Audit of a purchase: what should have been paid versus what was.
#[derive(Debug, Serialize)]
pub struct DistributionAudit {
    pub purchase: Purchase,
    pub expected_levels: usize,
    pub expected_total_paise: i64,
    pub credited_levels: usize,
    pub credited_total_paise: i64,
    pub missing_levels: Vec<i32>,
    pub credits: Vec<CommissionCredit>,
}

/// Outcome of a repair pass over incomplete distributions.
#[derive(Debug, Serialize)]
pub struct RepairReport {
    pub examined: usize,
    pub completed: usize,
    pub failed: usize,
    pub results: Vec<DistributionSummary>,
}

/// Commission earnings grouped by level.
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct LevelEarnings {
    pub level: i32,
    pub credits: i64,
    pub total_paise: i64,
}
