//! Manual payment verification for package purchases.
//!
//! # Approval Flow
//!
//! 1. Lock the verification; it must be `pending`
//! 2. Mark it `approved` and upsert the purchase keyed by verification id
//! 3. Commit, then run the commission distribution
//! 4. If distribution fails, put the verification back to `pending` so an
//!    admin can approve it again; the upsert reuses the same purchase
//!
//! Step 4 is a compensating action, not a rollback: the purchase row stays
//! (marked `failed`) and any re-approval resumes it. Rejecting the payment
//! instead cancels that purchase in the same transaction, so no later repair
//! pays commission on it.

use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    models::{
        fund::ReviewStatus,
        notification::NotificationKind,
        payment::{PaymentVerification, SubmitPaymentRequest},
        purchase::{Purchase, PurchaseResponse, PurchaseSource},
        wallet::PageQuery,
    },
    services::{
        commission_service, notification_service::{self, rupees},
        package_service, social_service,
    },
};

pub async fn submit(
    pool: &DbPool,
    user_id: Uuid,
    request: SubmitPaymentRequest,
) -> Result<PaymentVerification, AppError> {
    let transaction_ref = request.transaction_ref.trim();
    if transaction_ref.is_empty() || transaction_ref.len() > 64 {
        return Err(AppError::InvalidRequest(
            "Transaction reference must be 1-64 characters".to_string(),
        ));
    }

    if let Some(ref proof) = request.proof_url {
        social_service::validate_link(proof)?;
    }

    let mut conn = pool.acquire().await?;
    let package = package_service::get_active(&mut conn, request.package_id).await?;

    let verification = sqlx::query_as::<_, PaymentVerification>(
        r#"
        INSERT INTO payment_verifications (user_id, package_id, amount_paise, transaction_ref, proof_url)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(package.id)
    .bind(package.price_paise)
    .bind(transaction_ref)
    .bind(&request.proof_url)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| AppError::from_unique_violation(e, "Transaction reference already submitted"))?;

    tracing::info!(
        verification_id = %verification.id,
        user_id = %user_id,
        package_id = %package.id,
        "Payment submitted for verification"
    );

    Ok(verification)
}

pub async fn approve(
    pool: &DbPool,
    max_levels: i32,
    admin_id: Uuid,
    verification_id: Uuid,
) -> Result<PurchaseResponse, AppError> {
    let mut tx = pool.begin().await?;

    let verification = lock_pending(&mut tx, verification_id).await?;

    sqlx::query(
        r#"
        UPDATE payment_verifications
        SET status = 'approved', reviewed_by = $2, reviewed_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(verification.id)
    .bind(admin_id)
    .execute(&mut *tx)
    .await?;

    // Re-approval after a failed distribution lands on the same purchase.
    let purchase = sqlx::query_as::<_, Purchase>(
        r#"
        INSERT INTO purchases (user_id, package_id, amount_paise, source, payment_verification_id)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (payment_verification_id)
        DO UPDATE SET distribution_status = purchases.distribution_status
        RETURNING *
        "#,
    )
    .bind(verification.user_id)
    .bind(verification.package_id)
    .bind(verification.amount_paise)
    .bind(PurchaseSource::PaymentVerification.as_str())
    .bind(verification.id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    let distribution = match commission_service::distribute(pool, max_levels, purchase.id).await {
        Ok(summary) => summary,
        Err(e) => {
            revert_to_pending(pool, verification.id).await;
            return Err(e);
        }
    };

    tracing::info!(
        verification_id = %verification.id,
        purchase_id = %purchase.id,
        admin_id = %admin_id,
        "Payment approved"
    );

    notification_service::notify_best_effort(
        pool,
        verification.user_id,
        NotificationKind::Payment,
        "Payment approved",
        &format!(
            "Your payment of {} ({}) was verified and your package is active",
            rupees(verification.amount_paise),
            verification.transaction_ref
        ),
    )
    .await;

    let purchase = sqlx::query_as::<_, Purchase>("SELECT * FROM purchases WHERE id = $1")
        .bind(purchase.id)
        .fetch_one(pool)
        .await?;

    Ok(PurchaseResponse {
        purchase,
        distribution,
    })
}

async fn revert_to_pending(pool: &DbPool, verification_id: Uuid) {
    let result = sqlx::query(
        r#"
        UPDATE payment_verifications
        SET status = 'pending', reviewed_by = NULL, reviewed_at = NULL
        WHERE id = $1 AND status = 'approved'
        "#,
    )
    .bind(verification_id)
    .execute(pool)
    .await;

    match result {
        Ok(_) => tracing::warn!(
            verification_id = %verification_id,
            "Payment verification reverted to pending after distribution failure"
        ),
        Err(e) => tracing::error!(
            verification_id = %verification_id,
            error = ?e,
            "Failed to revert payment verification"
        ),
    }
}

pub async fn reject(
    pool: &DbPool,
    admin_id: Uuid,
    verification_id: Uuid,
    reason: &str,
) -> Result<PaymentVerification, AppError> {
    let mut tx = pool.begin().await?;
    lock_pending(&mut tx, verification_id).await?;

    let verification = sqlx::query_as::<_, PaymentVerification>(
        r#"
        UPDATE payment_verifications
        SET status = 'rejected', admin_note = $2, reviewed_by = $3, reviewed_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(verification_id)
    .bind(reason)
    .bind(admin_id)
    .fetch_one(&mut *tx)
    .await?;

    // Left behind by an approval whose distribution failed.
    let cancelled = sqlx::query(
        r#"
        UPDATE purchases
        SET distribution_status = 'cancelled', distribution_error = $2
        WHERE payment_verification_id = $1 AND distribution_status IN ('pending', 'failed')
        "#,
    )
    .bind(verification_id)
    .bind(format!("Payment rejected: {}", reason))
    .execute(&mut *tx)
    .await?
    .rows_affected();

    tx.commit().await?;

    tracing::info!(
        verification_id = %verification_id,
        admin_id = %admin_id,
        cancelled_purchases = cancelled,
        "Payment rejected"
    );

    notification_service::notify_best_effort(
        pool,
        verification.user_id,
        NotificationKind::Payment,
        "Payment rejected",
        &format!("Payment {} was rejected: {}", verification.transaction_ref, reason),
    )
    .await;

    Ok(verification)
}

async fn lock_pending(
    conn: &mut sqlx::PgConnection,
    verification_id: Uuid,
) -> Result<PaymentVerification, AppError> {
    let verification = sqlx::query_as::<_, PaymentVerification>(
        "SELECT * FROM payment_verifications WHERE id = $1 FOR UPDATE",
    )
    .bind(verification_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(AppError::NotFound("Payment verification"))?;

    if verification.status != ReviewStatus::Pending.as_str() {
        return Err(AppError::Conflict(format!(
            "Payment verification is already {}",
            verification.status
        )));
    }

    Ok(verification)
}

pub async fn my_payments(
    pool: &DbPool,
    user_id: Uuid,
    page: &PageQuery,
) -> Result<Vec<PaymentVerification>, AppError> {
    let (limit, offset) = page.bounds();
    let rows = sqlx::query_as::<_, PaymentVerification>(
        r#"
        SELECT * FROM payment_verifications
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

pub async fn list(pool: &DbPool, status: Option<&str>) -> Result<Vec<PaymentVerification>, AppError> {
    let rows = sqlx::query_as::<_, PaymentVerification>(
        r#"
        SELECT * FROM payment_verifications
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
    use crate::{
        models::package::{CommissionKind, CommissionRule},
        test_support::*,
    };

    const PRICE: i64 = 100_000;

    /// sponsor <- buyer, with a 10% level-1 commission and a submitted payment.
    async fn submitted_payment(pool: &DbPool) -> (Uuid, Uuid, PaymentVerification) {
        let admin = insert_user(pool, None).await;
        let sponsor = insert_user(pool, None).await;
        let buyer = insert_user(pool, Some(sponsor)).await;
        let rule = CommissionRule {
            level: 1,
            kind: CommissionKind::Percent,
            value: 1_000,
        };
        let package = insert_package(pool, PRICE, &[rule]).await;

        let verification = submit(
            pool,
            buyer,
            SubmitPaymentRequest {
                package_id: package,
                transaction_ref: format!("UTR{}", Uuid::new_v4().simple()),
                proof_url: Some("https://files.example.com/receipt.png".to_string()),
            },
        )
        .await
        .unwrap();

        (admin, sponsor, verification)
    }

    async fn linked_purchase(pool: &DbPool, verification_id: Uuid) -> Purchase {
        sqlx::query_as::<_, Purchase>("SELECT * FROM purchases WHERE payment_verification_id = $1")
            .bind(verification_id)
            .fetch_one(pool)
            .await
            .unwrap()
    }

    async fn verification_status(pool: &DbPool, verification_id: Uuid) -> String {
        sqlx::query_scalar("SELECT status FROM payment_verifications WHERE id = $1")
            .bind(verification_id)
            .fetch_one(pool)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_proof_must_be_a_web_link() {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://localhost/unused")
            .unwrap();

        let request = SubmitPaymentRequest {
            package_id: Uuid::new_v4(),
            transaction_ref: "UTR1234".to_string(),
            proof_url: Some("javascript:alert(1)".to_string()),
        };
        let err = submit(&pool, Uuid::new_v4(), request).await.unwrap_err();

        assert!(matches!(err, AppError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_failed_approval_reverts_and_reapproval_resumes() {
        let Some(pool) = create_test_pool().await else {
            eprintln!("Skipping test - database not available");
            return;
        };
        let (admin, sponsor, verification) = submitted_payment(&pool).await;

        remove_wallet(&pool, sponsor).await;
        assert!(approve(&pool, MAX_LEVELS, admin, verification.id).await.is_err());

        assert_eq!(verification_status(&pool, verification.id).await, "pending");
        let purchase = linked_purchase(&pool, verification.id).await;
        assert_eq!(purchase.distribution_status, "failed");

        // A pending payment's purchase waits for approval, not for repair.
        let incomplete = commission_service::list_incomplete(&pool).await.unwrap();
        assert!(incomplete.iter().all(|p| p.id != purchase.id));

        restore_wallet(&pool, sponsor).await;
        let response = approve(&pool, MAX_LEVELS, admin, verification.id).await.unwrap();

        assert_eq!(response.purchase.id, purchase.id);
        assert_eq!(response.purchase.distribution_status, "completed");
        assert_eq!(verification_status(&pool, verification.id).await, "approved");
        assert_eq!(wallet_of(&pool, sponsor).await.commission_paise, 10_000);
    }

    #[tokio::test]
    async fn test_rejected_payment_never_pays_commission() {
        let Some(pool) = create_test_pool().await else {
            eprintln!("Skipping test - database not available");
            return;
        };
        let (admin, sponsor, verification) = submitted_payment(&pool).await;

        remove_wallet(&pool, sponsor).await;
        assert!(approve(&pool, MAX_LEVELS, admin, verification.id).await.is_err());

        reject(&pool, admin, verification.id, "UTR not found in statement")
            .await
            .unwrap();
        restore_wallet(&pool, sponsor).await;

        let purchase = linked_purchase(&pool, verification.id).await;
        assert!(purchase.is_cancelled());

        commission_service::repair(&pool, MAX_LEVELS).await.unwrap();
        let err = commission_service::distribute(&pool, MAX_LEVELS, purchase.id)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(verification_status(&pool, verification.id).await, "rejected");
        assert_eq!(credit_count(&pool, purchase.id).await, 0);
        assert_eq!(wallet_of(&pool, sponsor).await.commission_paise, 0);
    }
}
