//! Wallet balances, ledger entries and transfer request types.
//!
//! # Balance Storage
//!
//! Money is stored as `i64` paise (1 rupee = 100 paise) to avoid
//! floating-point errors. Coins are whole units with no currency value until
//! redeemed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The four balances each user holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WalletKind {
    /// Deposited funds; pays for packages and peer transfers.
    Main,
    /// Referral earnings; the only source for payouts.
    Commission,
    /// Smart Wallet; pays for recharges.
    Smart,
    /// Social-task rewards, redeemable into the main wallet.
    Coin,
}

impl WalletKind {
    /// Column in the `wallets` table holding this balance.
    pub fn column(self) -> &'static str {
        match self {
            WalletKind::Main => "main_paise",
            WalletKind::Commission => "commission_paise",
            WalletKind::Smart => "smart_paise",
            WalletKind::Coin => "coins",
        }
    }

    /// Value stored in `wallet_transactions.wallet`.
    pub fn as_str(self) -> &'static str {
        match self {
            WalletKind::Main => "main",
            WalletKind::Commission => "commission",
            WalletKind::Smart => "smart",
            WalletKind::Coin => "coin",
        }
    }

    /// Whether users may move balance from `self` into `to` themselves.
    ///
    /// Earnings flow toward spending wallets, never back.
    pub fn can_transfer_to(self, to: WalletKind) -> bool {
        matches!(
            (self, to),
            (WalletKind::Commission, WalletKind::Main)
                | (WalletKind::Commission, WalletKind::Smart)
                | (WalletKind::Main, WalletKind::Smart)
        )
    }
}

/// Why a ledger entry was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerReason {
    FundDeposit,
    AdminCredit,
    PackagePurchase,
    Commission,
    InternalTransfer,
    PeerTransfer,
    CoinRedemption,
    SocialReward,
    Payout,
    PayoutRefund,
    Recharge,
    RechargeRefund,
}

impl LedgerReason {
    pub fn as_str(self) -> &'static str {
        match self {
            LedgerReason::FundDeposit => "fund_deposit",
            LedgerReason::AdminCredit => "admin_credit",
            LedgerReason::PackagePurchase => "package_purchase",
            LedgerReason::Commission => "commission",
            LedgerReason::InternalTransfer => "internal_transfer",
            LedgerReason::PeerTransfer => "peer_transfer",
            LedgerReason::CoinRedemption => "coin_redemption",
            LedgerReason::SocialReward => "social_reward",
            LedgerReason::Payout => "payout",
            LedgerReason::PayoutRefund => "payout_refund",
            LedgerReason::Recharge => "recharge",
            LedgerReason::RechargeRefund => "recharge_refund",
        }
    }
}

/// A row of the `wallets` table.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Wallet {
    pub user_id: Uuid,
    pub main_paise: i64,
    pub commission_paise: i64,
    pub smart_paise: i64,
    pub coins: i64,
    pub updated_at: DateTime<Utc>,
}

/// One balance mutation in the append-only ledger.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct WalletTransaction {
    pub id: Uuid,
    pub user_id: Uuid,
    pub wallet: String,
    /// "credit" or "debit"
    pub direction: String,
    pub amount: i64,
    pub balance_after: i64,
    pub reason: String,
    pub reference_id: Option<Uuid>,
    pub description: Option<String>,
    #[serde(skip_serializing)]
    pub idempotency_key: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Query string for `GET /api/wallet/history`.
#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub wallet: Option<WalletKind>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

/// Generic pagination for list endpoints.
#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

impl PageQuery {
    /// Clamp client-supplied paging to sane bounds.
    pub fn bounds(&self) -> (i64, i64) {
        clamp_page(self.limit, self.offset)
    }
}

impl HistoryQuery {
    pub fn bounds(&self) -> (i64, i64) {
        clamp_page(self.limit, self.offset)
    }
}

fn clamp_page(limit: i64, offset: i64) -> (i64, i64) {
    (limit.clamp(1, 200), offset.max(0))
}

/// Request body for `POST /api/wallet/transfer/internal`.
///
/// ```json
/// { "from": "commission", "to": "smart", "amount_paise": 25000 }
/// ```
#[derive(Debug, Deserialize)]
pub struct InternalTransferRequest {
    pub from: WalletKind,
    pub to: WalletKind,
    pub amount_paise: i64,
}

/// Request body for `POST /api/wallet/transfer/user`.
///
/// ```json
/// {
///   "recipient_code": "REF7KQ2M9XA",
///   "amount_paise": 10000,
///   "idempotency_key": "gift-2025-01"
/// }
/// ```
#[derive(Debug, Deserialize)]
pub struct PeerTransferRequest {
    pub recipient_code: String,
    pub amount_paise: i64,
    pub note: Option<String>,
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PeerTransferResponse {
    pub recipient_id: Uuid,
    pub amount_paise: i64,
    pub balance_after: i64,
    pub transaction_id: Uuid,
}

/// Request body for `POST /api/wallet/coins/redeem`.
#[derive(Debug, Deserialize)]
pub struct RedeemCoinsRequest {
    pub coins: i64,
}

#[derive(Debug, Serialize)]
pub struct RedeemCoinsResponse {
    pub coins_redeemed: i64,
    pub credited_paise: i64,
    pub wallet: Wallet,
}

/// Request body for `POST /api/admin/wallet/credit`.
#[derive(Debug, Deserialize)]
pub struct AdminCreditRequest {
    pub user_id: Uuid,
    pub wallet: WalletKind,
    pub amount: i64,
    pub note: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed_internal_transfers() {
        assert!(WalletKind::Commission.can_transfer_to(WalletKind::Main));
        assert!(WalletKind::Commission.can_transfer_to(WalletKind::Smart));
        assert!(WalletKind::Main.can_transfer_to(WalletKind::Smart));
    }

    #[test]
    fn test_disallowed_internal_transfers() {
        assert!(!WalletKind::Main.can_transfer_to(WalletKind::Commission));
        assert!(!WalletKind::Smart.can_transfer_to(WalletKind::Main));
        assert!(!WalletKind::Coin.can_transfer_to(WalletKind::Main));
        assert!(!WalletKind::Main.can_transfer_to(WalletKind::Main));
    }

    #[test]
    fn test_wallet_kind_wire_names() {
        assert_eq!(
            serde_json::from_str::<WalletKind>("\"commission\"").unwrap(),
            WalletKind::Commission
        );
        assert_eq!(WalletKind::Coin.column(), "coins");
        assert_eq!(WalletKind::Smart.as_str(), "smart");
    }

    #[test]
    fn test_page_bounds_are_clamped() {
        let query = PageQuery {
            limit: 10_000,
            offset: -5,
        };
        assert_eq!(query.bounds(), (200, 0));

        let query = PageQuery { limit: 0, offset: 20 };
        assert_eq!(query.bounds(), (1, 20));
    }
}
