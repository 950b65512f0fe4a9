//! Notification records and the payload pushed to live connections.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Categories of notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    NewReferral,
    Commission,
    FundRequest,
    Payment,
    Payout,
    Recharge,
    Kyc,
    SocialReward,
    WalletTransfer,
}

impl NotificationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NotificationKind::NewReferral => "new_referral",
            NotificationKind::Commission => "commission",
            NotificationKind::FundRequest => "fund_request",
            NotificationKind::Payment => "payment",
            NotificationKind::Payout => "payout",
            NotificationKind::Recharge => "recharge",
            NotificationKind::Kyc => "kyc",
            NotificationKind::SocialReward => "social_reward",
            NotificationKind::WalletTransfer => "wallet_transfer",
        }
    }
}

/// A stored notification.
///
/// The same shape travels through `pg_notify` and out over SSE.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: String,
    pub title: String,
    pub body: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct NotificationQuery {
    #[serde(default)]
    pub unread_only: bool,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    50
}

#[derive(Debug, Serialize)]
pub struct MarkReadResponse {
    pub updated: u64,
}
