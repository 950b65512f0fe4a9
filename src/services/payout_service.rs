//! Withdrawals from the commission wallet.
//!
//! The requested amount is debited (held) when the request is made, so the
//! same earnings cannot back two requests. Rejection refunds the hold.

use uuid::Uuid;

use crate::{
    config::Config,
    db::DbPool,
    error::AppError,
    models::{
        notification::NotificationKind,
        otp::OtpPurpose,
        payout::{Payout, PayoutBreakdown, PayoutStatus},
        user::{USER_COLUMNS, User},
        wallet::{LedgerReason, PageQuery, WalletKind},
    },
    services::{
        notification_service::{self, rupees},
        otp_service::{self, OtpCheck},
        wallet_service::{self, Movement},
    },
};

pub async fn request_payout(
    pool: &DbPool,
    config: &Config,
    user_id: Uuid,
    amount_paise: i64,
    otp: &str,
) -> Result<Payout, AppError> {
    let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("User"))?;

    if !user.kyc_approved() {
        return Err(AppError::Forbidden);
    }

    if amount_paise < config.min_payout_paise {
        return Err(AppError::InvalidRequest(format!(
            "Minimum payout is {}",
            rupees(config.min_payout_paise)
        )));
    }

    let (Some(holder), Some(account), Some(ifsc)) = (
        user.account_holder.clone(),
        user.account_number.clone(),
        user.ifsc_code.clone(),
    ) else {
        return Err(AppError::InvalidRequest(
            "Bank details are missing from KYC".to_string(),
        ));
    };

    let breakdown = PayoutBreakdown::compute(amount_paise, config.payout_fee_bps);

    let mut tx = pool.begin().await?;

    // Consumed together with the hold: a request that fails below keeps the code.
    match otp_service::check_in(&mut tx, config, &user.mobile, OtpPurpose::Payout, otp).await? {
        OtpCheck::Valid => {}
        _ => {
            tx.commit().await?;
            return Err(otp_service::invalid_otp());
        }
    }

    let payout = sqlx::query_as::<_, Payout>(
        r#"
        INSERT INTO payouts (
            user_id, amount_paise, fee_paise, net_paise,
            account_holder, account_number, ifsc_code
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(amount_paise)
    .bind(breakdown.fee_paise)
    .bind(breakdown.net_paise)
    .bind(holder)
    .bind(account)
    .bind(ifsc)
    .fetch_one(&mut *tx)
    .await?;

    wallet_service::debit(
        &mut tx,
        Movement::new(user_id, WalletKind::Commission, amount_paise, LedgerReason::Payout)
            .reference(payout.id)
            .describe("Withdrawal request"),
    )
    .await?;

    tx.commit().await?;

    tracing::info!(
        payout_id = %payout.id,
        user_id = %user_id,
        amount = amount_paise,
        fee = breakdown.fee_paise,
        "Payout requested"
    );

    Ok(payout)
}

/// Mark a pending payout as paid out of band.
pub async fn approve(
    pool: &DbPool,
    admin_id: Uuid,
    payout_id: Uuid,
    payment_reference: &str,
) -> Result<Payout, AppError> {
    if payment_reference.trim().is_empty() {
        return Err(AppError::InvalidRequest(
            "Payment reference is required".to_string(),
        ));
    }

    let mut tx = pool.begin().await?;
    lock_pending(&mut tx, payout_id).await?;

    let payout = sqlx::query_as::<_, Payout>(
        r#"
        UPDATE payouts
        SET status = $2, payment_reference = $3, reviewed_by = $4, reviewed_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(payout_id)
    .bind(PayoutStatus::Paid.as_str())
    .bind(payment_reference.trim())
    .bind(admin_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(payout_id = %payout.id, admin_id = %admin_id, "Payout paid");

    notification_service::notify_best_effort(
        pool,
        payout.user_id,
        NotificationKind::Payout,
        "Payout sent",
        &format!(
            "{} was sent to your bank account (ref {})",
            rupees(payout.net_paise),
            payment_reference.trim()
        ),
    )
    .await;

    Ok(payout)
}

/// Reject a pending payout and return the held amount.
pub async fn reject(
    pool: &DbPool,
    admin_id: Uuid,
    payout_id: Uuid,
    reason: &str,
) -> Result<Payout, AppError> {
    let mut tx = pool.begin().await?;
    lock_pending(&mut tx, payout_id).await?;

    let payout = sqlx::query_as::<_, Payout>(
        r#"
        UPDATE payouts
        SET status = $2, admin_note = $3, reviewed_by = $4, reviewed_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(payout_id)
    .bind(PayoutStatus::Rejected.as_str())
    .bind(reason)
    .bind(admin_id)
    .fetch_one(&mut *tx)
    .await?;

    wallet_service::credit(
        &mut tx,
        Movement::new(
            payout.user_id,
            WalletKind::Commission,
            payout.amount_paise,
            LedgerReason::PayoutRefund,
        )
        .reference(payout.id)
        .describe(format!("Payout rejected: {}", reason)),
    )
    .await?;

    tx.commit().await?;

    tracing::info!(payout_id = %payout.id, admin_id = %admin_id, "Payout rejected and refunded");

    notification_service::notify_best_effort(
        pool,
        payout.user_id,
        NotificationKind::Payout,
        "Payout rejected",
        &format!(
            "{} was returned to your commission wallet: {}",
            rupees(payout.amount_paise),
            reason
        ),
    )
    .await;

    Ok(payout)
}

async fn lock_pending(conn: &mut sqlx::PgConnection, payout_id: Uuid) -> Result<Payout, AppError> {
    let payout = sqlx::query_as::<_, Payout>("SELECT * FROM payouts WHERE id = $1 FOR UPDATE")
        .bind(payout_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(AppError::NotFound("Payout"))?;

    if payout.status != PayoutStatus::Pending.as_str() {
        return Err(AppError::Conflict(format!(
            "Payout is already {}",
            payout.status
        )));
    }

    Ok(payout)
}

pub async fn my_payouts(pool: &DbPool, user_id: Uuid, page: &PageQuery) -> Result<Vec<Payout>, AppError> {
    let (limit, offset) = page.bounds();
    let rows = sqlx::query_as::<_, Payout>(
        r#"
        SELECT * FROM payouts
        WHERE user_id = $1
        ORDER BY created_at DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

pub async fn list(pool: &DbPool, status: Option<&str>) -> Result<Vec<Payout>, AppError> {
    let rows = sqlx::query_as::<_, Payout>(
        r#"
        SELECT * FROM payouts
        WHERE ($1::TEXT IS NULL OR status = $1)
        ORDER BY created_at
        LIMIT 500
        "#,
    )
    .bind(status)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;

    async fn kyc_approved_member(pool: &DbPool) -> User {
        let user_id = insert_user(pool, None).await;
        sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET kyc_status = 'approved', account_holder = 'Asha Rao',
                account_number = '123456789012', ifsc_code = 'SBIN0001234'
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(user_id)
        .fetch_one(pool)
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_refused_payout_keeps_the_code() {
        let Some(pool) = create_test_pool().await else {
            eprintln!("Skipping test - database not available");
            return;
        };
        let config = Config::for_tests();
        let user = kyc_approved_member(&pool).await;
        let (code, _) = otp_service::issue(&pool, &config, &user.mobile, OtpPurpose::Payout)
            .await
            .unwrap();

        let err = request_payout(&pool, &config, user.id, 60_000, &code)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InsufficientBalance));

        fund_wallet(&pool, user.id, WalletKind::Commission, 60_000).await;
        let payout = request_payout(&pool, &config, user.id, 60_000, &code)
            .await
            .unwrap();

        assert_eq!(payout.status, PayoutStatus::Pending.as_str());
        assert_eq!(wallet_of(&pool, user.id).await.commission_paise, 0);

        // Spent now.
        let err = request_payout(&pool, &config, user.id, 60_000, &code)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_wrong_code_counts_an_attempt() {
        let Some(pool) = create_test_pool().await else {
            eprintln!("Skipping test - database not available");
            return;
        };
        let config = Config::for_tests();
        let user = kyc_approved_member(&pool).await;
        let (code, _) = otp_service::issue(&pool, &config, &user.mobile, OtpPurpose::Payout)
            .await
            .unwrap();
        let wrong = if code == "000000" { "111111" } else { "000000" };

        let err = request_payout(&pool, &config, user.id, 60_000, wrong)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidRequest(_)));

        let attempts: i32 = sqlx::query_scalar(
            "SELECT attempts FROM otp_codes WHERE destination = $1 AND consumed_at IS NULL",
        )
        .bind(&user.mobile)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(attempts, 1);
    }
}
