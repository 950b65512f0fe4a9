//! Wallet service - balance mutations and the ledger.
//!
//! This service handles:
//! - Guarded balance updates (a debit never drives a balance negative)
//! - Ledger rows written in the same database transaction as the update
//! - Internal moves between a user's wallets
//! - Peer transfers with optional idempotency keys
//! - Coin redemption
//!
//! # Atomicity Guarantees
//!
//! `credit` and `debit` take a connection, not the pool, so callers compose
//! them inside their own PostgreSQL transaction. A debit is a single
//! conditional `UPDATE ... WHERE balance >= amount`; two concurrent
//! withdrawals cannot both pass the guard.

use sqlx::PgConnection;
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    models::{
        notification::NotificationKind,
        user::{USER_COLUMNS, User},
        wallet::{
            LedgerReason, PeerTransferResponse, RedeemCoinsResponse, Wallet, WalletKind,
            WalletTransaction,
        },
    },
    services::notification_service::{self, rupees},
};

/// One balance change and the ledger details that go with it.
#[derive(Debug, Clone)]
pub struct Movement {
    pub user_id: Uuid,
    pub wallet: WalletKind,
    pub amount: i64,
    pub reason: LedgerReason,
    pub reference_id: Option<Uuid>,
    pub description: Option<String>,
    pub idempotency_key: Option<String>,
}

impl Movement {
    pub fn new(user_id: Uuid, wallet: WalletKind, amount: i64, reason: LedgerReason) -> Self {
        Self {
            user_id,
            wallet,
            amount,
            reason,
            reference_id: None,
            description: None,
            idempotency_key: None,
        }
    }

    pub fn reference(mut self, reference_id: Uuid) -> Self {
        self.reference_id = Some(reference_id);
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn idempotency_key(mut self, key: Option<String>) -> Self {
        self.idempotency_key = key;
        self
    }
}

/// Add to a balance and record the ledger entry.
///
/// # Errors
///
/// - `InvalidRequest`: amount is zero or negative
/// - `NotFound`: the user has no wallet row
pub async fn credit(
    conn: &mut PgConnection,
    movement: Movement,
) -> Result<WalletTransaction, AppError> {
    validate_amount(movement.amount)?;

    let column = movement.wallet.column();
    let sql = format!(
        "UPDATE wallets SET {column} = {column} + $1, updated_at = NOW() \
         WHERE user_id = $2 RETURNING {column}"
    );
    let balance_after: i64 = sqlx::query_scalar(&sql)
        .bind(movement.amount)
        .bind(movement.user_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(AppError::NotFound("Wallet"))?;

    record(conn, &movement, "credit", balance_after).await
}

/// Subtract from a balance if, and only if, enough is there.
///
/// # Errors
///
/// - `InvalidRequest`: amount is zero or negative
/// - `NotFound`: the user has no wallet row
/// - `InsufficientBalance`: the guard rejected the update
pub async fn debit(
    conn: &mut PgConnection,
    movement: Movement,
) -> Result<WalletTransaction, AppError> {
    validate_amount(movement.amount)?;

    let column = movement.wallet.column();
    let sql = format!(
        "UPDATE wallets SET {column} = {column} - $1, updated_at = NOW() \
         WHERE user_id = $2 AND {column} >= $1 RETURNING {column}"
    );
    let balance_after: Option<i64> = sqlx::query_scalar(&sql)
        .bind(movement.amount)
        .bind(movement.user_id)
        .fetch_optional(&mut *conn)
        .await?;

    let Some(balance_after) = balance_after else {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM wallets WHERE user_id = $1)")
                .bind(movement.user_id)
                .fetch_one(&mut *conn)
                .await?;
        return Err(if exists {
            AppError::InsufficientBalance
        } else {
            AppError::NotFound("Wallet")
        });
    };

    record(conn, &movement, "debit", balance_after).await
}

async fn record(
    conn: &mut PgConnection,
    movement: &Movement,
    direction: &str,
    balance_after: i64,
) -> Result<WalletTransaction, AppError> {
    let entry = sqlx::query_as::<_, WalletTransaction>(
        r#"
        INSERT INTO wallet_transactions (
            user_id, wallet, direction, amount, balance_after,
            reason, reference_id, description, idempotency_key
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING *
        "#,
    )
    .bind(movement.user_id)
    .bind(movement.wallet.as_str())
    .bind(direction)
    .bind(movement.amount)
    .bind(balance_after)
    .bind(movement.reason.as_str())
    .bind(movement.reference_id)
    .bind(&movement.description)
    .bind(&movement.idempotency_key)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| AppError::from_unique_violation(e, "Duplicate idempotency key"))?;

    tracing::debug!(
        user_id = %movement.user_id,
        wallet = movement.wallet.as_str(),
        direction,
        amount = movement.amount,
        balance_after,
        reason = movement.reason.as_str(),
        "Wallet updated"
    );

    Ok(entry)
}

fn validate_amount(amount: i64) -> Result<(), AppError> {
    if amount <= 0 {
        return Err(AppError::InvalidRequest(
            "Amount must be positive".to_string(),
        ));
    }
    Ok(())
}

/// Create the empty wallet row for a new user.
pub async fn create_wallet(conn: &mut PgConnection, user_id: Uuid) -> Result<(), AppError> {
    sqlx::query("INSERT INTO wallets (user_id) VALUES ($1)")
        .bind(user_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub async fn get_wallet(pool: &DbPool, user_id: Uuid) -> Result<Wallet, AppError> {
    sqlx::query_as::<_, Wallet>("SELECT * FROM wallets WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("Wallet"))
}

/// Ledger entries for a user, newest first, optionally for one wallet.
pub async fn history(
    pool: &DbPool,
    user_id: Uuid,
    wallet: Option<WalletKind>,
    limit: i64,
    offset: i64,
) -> Result<Vec<WalletTransaction>, AppError> {
    let entries = sqlx::query_as::<_, WalletTransaction>(
        r#"
        SELECT * FROM wallet_transactions
        WHERE user_id = $1 AND ($2::TEXT IS NULL OR wallet = $2)
        ORDER BY created_at DESC
        LIMIT $3 OFFSET $4
        "#,
    )
    .bind(user_id)
    .bind(wallet.map(WalletKind::as_str))
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    Ok(entries)
}

/// Move balance between two of the caller's own wallets.
///
/// Both legs run in one database transaction.
pub async fn transfer_internal(
    pool: &DbPool,
    user_id: Uuid,
    from: WalletKind,
    to: WalletKind,
    amount: i64,
) -> Result<Wallet, AppError> {
    if !from.can_transfer_to(to) {
        return Err(AppError::InvalidRequest(format!(
            "Cannot move funds from {} wallet to {} wallet",
            from.as_str(),
            to.as_str()
        )));
    }

    let mut tx = pool.begin().await?;

    let description = format!("{} -> {}", from.as_str(), to.as_str());
    debit(
        &mut tx,
        Movement::new(user_id, from, amount, LedgerReason::InternalTransfer)
            .describe(description.clone()),
    )
    .await?;
    credit(
        &mut tx,
        Movement::new(user_id, to, amount, LedgerReason::InternalTransfer).describe(description),
    )
    .await?;

    tx.commit().await?;

    get_wallet(pool, user_id).await
}

/// Send main-wallet funds to another member identified by referral code.
///
/// # Idempotency
///
/// With an idempotency key, a repeated request returns the original
/// transfer instead of moving money twice.
pub async fn transfer_to_user(
    pool: &DbPool,
    sender_id: Uuid,
    recipient_code: &str,
    amount: i64,
    note: Option<String>,
    idempotency_key: Option<String>,
) -> Result<PeerTransferResponse, AppError> {
    validate_amount(amount)?;

    if let Some(ref key) = idempotency_key {
        if let Some(existing) = sqlx::query_as::<_, WalletTransaction>(
            "SELECT * FROM wallet_transactions WHERE user_id = $1 AND idempotency_key = $2",
        )
        .bind(sender_id)
        .bind(key)
        .fetch_optional(pool)
        .await?
        {
            return Ok(PeerTransferResponse {
                recipient_id: existing.reference_id.unwrap_or_default(),
                amount_paise: existing.amount,
                balance_after: existing.balance_after,
                transaction_id: existing.id,
            });
        }
    }

    let recipient = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE referral_code = $1 AND is_active = true"
    ))
    .bind(recipient_code.trim().to_uppercase())
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("Recipient"))?;

    if recipient.id == sender_id {
        return Err(AppError::InvalidRequest(
            "Cannot transfer to yourself".to_string(),
        ));
    }

    let mut tx = pool.begin().await?;

    let description = note.unwrap_or_else(|| "Peer transfer".to_string());
    let sent = debit(
        &mut tx,
        Movement::new(sender_id, WalletKind::Main, amount, LedgerReason::PeerTransfer)
            .reference(recipient.id)
            .describe(description.clone())
            .idempotency_key(idempotency_key),
    )
    .await?;
    credit(
        &mut tx,
        Movement::new(recipient.id, WalletKind::Main, amount, LedgerReason::PeerTransfer)
            .reference(sender_id)
            .describe(description),
    )
    .await?;

    tx.commit().await?;

    tracing::info!(
        sender_id = %sender_id,
        recipient_id = %recipient.id,
        amount,
        "Peer transfer completed"
    );

    notification_service::notify_best_effort(
        pool,
        recipient.id,
        NotificationKind::WalletTransfer,
        "Funds received",
        &format!("{} was added to your main wallet", rupees(amount)),
    )
    .await;

    Ok(PeerTransferResponse {
        recipient_id: recipient.id,
        amount_paise: amount,
        balance_after: sent.balance_after,
        transaction_id: sent.id,
    })
}

/// Whole paise a coin amount is worth at `coins_per_rupee`.
///
/// Only multiples of the rate are redeemable, so no fraction of a rupee
/// is ever lost to rounding.
pub fn coins_to_paise(coins: i64, coins_per_rupee: i64) -> Result<i64, String> {
    if coins_per_rupee <= 0 {
        return Err("Coin redemption is disabled".to_string());
    }
    if coins <= 0 || coins % coins_per_rupee != 0 {
        return Err(format!(
            "Coins must be a positive multiple of {}",
            coins_per_rupee
        ));
    }
    (coins / coins_per_rupee)
        .checked_mul(100)
        .ok_or_else(|| "Coin amount too large".to_string())
}

/// Convert coins into main-wallet funds.
pub async fn redeem_coins(
    pool: &DbPool,
    user_id: Uuid,
    coins: i64,
    coins_per_rupee: i64,
) -> Result<RedeemCoinsResponse, AppError> {
    let paise = coins_to_paise(coins, coins_per_rupee).map_err(AppError::InvalidRequest)?;

    let mut tx = pool.begin().await?;
    let spent = debit(
        &mut tx,
        Movement::new(user_id, WalletKind::Coin, coins, LedgerReason::CoinRedemption),
    )
    .await?;
    credit(
        &mut tx,
        Movement::new(user_id, WalletKind::Main, paise, LedgerReason::CoinRedemption)
            .reference(spent.id),
    )
    .await?;
    tx.commit().await?;

    Ok(RedeemCoinsResponse {
        coins_redeemed: coins,
        credited_paise: paise,
        wallet: get_wallet(pool, user_id).await?,
    })
}

/// Admin adjustment: credit any wallet of any user.
pub async fn admin_credit(
    pool: &DbPool,
    admin_id: Uuid,
    user_id: Uuid,
    wallet: WalletKind,
    amount: i64,
    note: Option<String>,
) -> Result<WalletTransaction, AppError> {
    let mut tx = pool.begin().await?;
    let entry = credit(
        &mut tx,
        Movement::new(user_id, wallet, amount, LedgerReason::AdminCredit)
            .reference(admin_id)
            .describe(note.unwrap_or_else(|| "Admin credit".to_string())),
    )
    .await?;
    tx.commit().await?;

    tracing::info!(
        admin_id = %admin_id,
        user_id = %user_id,
        wallet = wallet.as_str(),
        amount,
        "Admin credit applied"
    );

    Ok(entry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;

    #[test]
    fn test_coins_to_paise() {
        assert_eq!(coins_to_paise(100, 100), Ok(100));
        assert_eq!(coins_to_paise(2_500, 100), Ok(2_500));
        assert_eq!(coins_to_paise(30, 10), Ok(300));
    }

    #[test]
    fn test_coins_must_be_multiple_of_rate() {
        assert!(coins_to_paise(150, 100).is_err());
        assert!(coins_to_paise(0, 100).is_err());
        assert!(coins_to_paise(-100, 100).is_err());
    }

    #[test]
    fn test_disabled_rate() {
        assert!(coins_to_paise(100, 0).is_err());
    }

    #[test]
    fn test_movement_builder() {
        let user = Uuid::new_v4();
        let reference = Uuid::new_v4();
        let movement = Movement::new(user, WalletKind::Smart, 500, LedgerReason::Recharge)
            .reference(reference)
            .describe("JIO 9876543210")
            .idempotency_key(Some("k1".to_string()));

        assert_eq!(movement.user_id, user);
        assert_eq!(movement.reference_id, Some(reference));
        assert_eq!(movement.description.as_deref(), Some("JIO 9876543210"));
        assert_eq!(movement.idempotency_key.as_deref(), Some("k1"));
    }

    #[test]
    fn test_non_positive_amounts_rejected() {
        assert!(validate_amount(0).is_err());
        assert!(validate_amount(-1).is_err());
        assert!(validate_amount(1).is_ok());
    }

    #[tokio::test]
    async fn test_debit_never_overdraws() {
        let Some(pool) = create_test_pool().await else {
            eprintln!("Skipping test - database not available");
            return;
        };
        let user = insert_user(&pool, None).await;
        fund_wallet(&pool, user, WalletKind::Commission, 500).await;

        let mut conn = pool.acquire().await.unwrap();
        let err = debit(
            &mut conn,
            Movement::new(user, WalletKind::Commission, 501, LedgerReason::Payout),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::InsufficientBalance));
        assert_eq!(wallet_of(&pool, user).await.commission_paise, 500);

        let entry = debit(
            &mut conn,
            Movement::new(user, WalletKind::Commission, 500, LedgerReason::Payout),
        )
        .await
        .unwrap();
        assert_eq!(entry.balance_after, 0);
        assert_eq!(wallet_of(&pool, user).await.commission_paise, 0);
    }

    async fn spend(pool: &DbPool, user: Uuid, amount: i64) -> Result<WalletTransaction, AppError> {
        let mut conn = pool.acquire().await?;
        debit(
            &mut conn,
            Movement::new(user, WalletKind::Main, amount, LedgerReason::PackagePurchase),
        )
        .await
    }

    #[tokio::test]
    async fn test_concurrent_debits_cannot_both_pass() {
        let Some(pool) = create_test_pool().await else {
            eprintln!("Skipping test - database not available");
            return;
        };
        let user = insert_user(&pool, None).await;
        fund_wallet(&pool, user, WalletKind::Main, 1_000).await;

        let (a, b) = tokio::join!(spend(&pool, user, 700), spend(&pool, user, 700));

        assert_eq!(a.is_ok() as u8 + b.is_ok() as u8, 1);
        assert_eq!(wallet_of(&pool, user).await.main_paise, 300);
    }

    #[tokio::test]
    async fn test_debit_without_wallet_is_not_found() {
        let Some(pool) = create_test_pool().await else {
            eprintln!("Skipping test - database not available");
            return;
        };
        let user = insert_user(&pool, None).await;
        remove_wallet(&pool, user).await;

        let mut conn = pool.acquire().await.unwrap();
        let err = debit(
            &mut conn,
            Movement::new(user, WalletKind::Main, 1, LedgerReason::PackagePurchase),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, AppError::NotFound("Wallet")));
    }
}
