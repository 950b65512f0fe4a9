//! Mobile and DTH recharge models and input validation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Smallest recharge accepted: Rs 10.
pub const MIN_RECHARGE_PAISE: i64 = 1_000;
/// Largest recharge accepted: Rs 10,000.
pub const MAX_RECHARGE_PAISE: i64 = 1_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RechargeKind {
    Mobile,
    Dth,
}

impl RechargeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RechargeKind::Mobile => "mobile",
            RechargeKind::Dth => "dth",
        }
    }

    /// Operator codes accepted for this kind.
    pub fn operators(self) -> &'static [Operator] {
        match self {
            RechargeKind::Mobile => MOBILE_OPERATORS,
            RechargeKind::Dth => DTH_OPERATORS,
        }
    }
}

/// A provider operator code and its display name.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Operator {
    pub code: &'static str,
    pub name: &'static str,
}

const MOBILE_OPERATORS: &[Operator] = &[
    Operator { code: "AT", name: "Airtel" },
    Operator { code: "JIO", name: "Jio" },
    Operator { code: "VI", name: "Vi" },
    Operator { code: "BSNL", name: "BSNL" },
];

const DTH_OPERATORS: &[Operator] = &[
    Operator { code: "ATV", name: "Airtel Digital TV" },
    Operator { code: "TSK", name: "Tata Play" },
    Operator { code: "DTV", name: "Dish TV" },
    Operator { code: "SUN", name: "Sun Direct" },
    Operator { code: "D2H", name: "d2h" },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RechargeStatus {
    /// Wallet debited, provider not yet answered.
    Processing,
    /// Provider accepted the order but has not confirmed it.
    Pending,
    Success,
    /// Provider failed it; the wallet has been refunded.
    Failed,
}

impl RechargeStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RechargeStatus::Processing => "processing",
            RechargeStatus::Pending => "pending",
            RechargeStatus::Success => "success",
            RechargeStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "processing" => Some(RechargeStatus::Processing),
            "pending" => Some(RechargeStatus::Pending),
            "success" => Some(RechargeStatus::Success),
            "failed" => Some(RechargeStatus::Failed),
            _ => None,
        }
    }

    pub fn is_open(self) -> bool {
        matches!(self, RechargeStatus::Processing | RechargeStatus::Pending)
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Recharge {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: String,
    pub operator: String,
    pub subscriber: String,
    pub amount_paise: i64,
    pub client_ref: String,
    pub status: String,
    pub provider_ref: Option<String>,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request body for `POST /api/recharge`.
///
/// ```json
/// {
///   "kind": "mobile",
///   "operator": "JIO",
///   "subscriber": "9876543210",
///   "amount_paise": 29900
/// }
/// ```
#[derive(Debug, Deserialize)]
pub struct RechargeRequest {
    pub kind: RechargeKind,
    pub operator: String,
    pub subscriber: String,
    pub amount_paise: i64,
}

/// Body the provider posts to `POST /api/recharge/callback`.
#[derive(Debug, Deserialize)]
pub struct RechargeCallback {
    pub client_ref: String,
    pub status: RechargeStatus,
    pub provider_ref: Option<String>,
    pub message: Option<String>,
}

/// Check a recharge request before any money moves.
pub fn validate_recharge(request: &RechargeRequest) -> Result<(), String> {
    if !request
        .kind
        .operators()
        .iter()
        .any(|op| op.code == request.operator)
    {
        return Err(format!(
            "Unknown {} operator '{}'",
            request.kind.as_str(),
            request.operator
        ));
    }

    match request.kind {
        RechargeKind::Mobile => {
            if !is_valid_mobile(&request.subscriber) {
                return Err("Mobile number must be 10 digits starting with 6-9".to_string());
            }
        }
        RechargeKind::Dth => {
            let len = request.subscriber.len();
            if !(6..=16).contains(&len)
                || !request.subscriber.chars().all(|c| c.is_ascii_alphanumeric())
            {
                return Err("DTH subscriber id must be 6-16 letters or digits".to_string());
            }
        }
    }

    if !(MIN_RECHARGE_PAISE..=MAX_RECHARGE_PAISE).contains(&request.amount_paise) {
        return Err(format!(
            "Recharge amount must be between {} and {} paise",
            MIN_RECHARGE_PAISE, MAX_RECHARGE_PAISE
        ));
    }

    Ok(())
}

/// Indian mobile number: 10 digits, first digit 6-9.
pub fn is_valid_mobile(value: &str) -> bool {
    value.len() == 10
        && value.chars().all(|c| c.is_ascii_digit())
        && matches!(value.as_bytes()[0], b'6'..=b'9')
}
