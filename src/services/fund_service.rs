//! Deposit requests and their admin review.

use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    models::{
        fund::{CreateFundRequest, FundRequest, ReviewStatus},
        notification::NotificationKind,
        wallet::{LedgerReason, PageQuery, WalletKind},
    },
    services::{
        notification_service::{self, rupees},
        social_service,
        wallet_service::{self, Movement},
    },
};

pub async fn request_funds(
    pool: &DbPool,
    user_id: Uuid,
    request: CreateFundRequest,
) -> Result<FundRequest, AppError> {
    if request.amount_paise <= 0 {
        return Err(AppError::InvalidRequest(
            "Amount must be positive".to_string(),
        ));
    }

    let transaction_ref = request.transaction_ref.trim();
    if transaction_ref.is_empty() || transaction_ref.len() > 64 {
        return Err(AppError::InvalidRequest(
            "Transaction reference must be 1-64 characters".to_string(),
        ));
    }

    if let Some(ref proof) = request.proof_url {
        social_service::validate_link(proof)?;
    }

    let fund_request = sqlx::query_as::<_, FundRequest>(
        r#"
        INSERT INTO fund_requests (user_id, amount_paise, transaction_ref, payment_method, proof_url)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(request.amount_paise)
    .bind(transaction_ref)
    .bind(request.payment_method.trim())
    .bind(&request.proof_url)
    .fetch_one(pool)
    .await
    .map_err(|e| AppError::from_unique_violation(e, "Transaction reference already used"))?;

    tracing::info!(
        fund_request_id = %fund_request.id,
        user_id = %user_id,
        amount = fund_request.amount_paise,
        "Fund request submitted"
    );

    Ok(fund_request)
}

pub async fn my_requests(
    pool: &DbPool,
    user_id: Uuid,
    page: &PageQuery,
) -> Result<Vec<FundRequest>, AppError> {
    let (limit, offset) = page.bounds();
    let rows = sqlx::query_as::<_, FundRequest>(
        r#"
        SELECT * FROM fund_requests
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

pub async fn list(pool: &DbPool, status: Option<&str>) -> Result<Vec<FundRequest>, AppError> {
    let rows = sqlx::query_as::<_, FundRequest>(
        r#"
        SELECT * FROM fund_requests
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

/// Approve a pending request and credit the main wallet, exactly once.
pub async fn approve(pool: &DbPool, admin_id: Uuid, request_id: Uuid) -> Result<FundRequest, AppError> {
    let mut tx = pool.begin().await?;
    lock_pending(&mut tx, request_id).await?;

    let fund_request = sqlx::query_as::<_, FundRequest>(
        r#"
        UPDATE fund_requests
        SET status = 'approved', reviewed_by = $2, reviewed_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(request_id)
    .bind(admin_id)
    .fetch_one(&mut *tx)
    .await?;

    wallet_service::credit(
        &mut tx,
        Movement::new(
            fund_request.user_id,
            WalletKind::Main,
            fund_request.amount_paise,
            LedgerReason::FundDeposit,
        )
        .reference(fund_request.id)
        .describe(format!("Deposit {}", fund_request.transaction_ref)),
    )
    .await?;

    tx.commit().await?;

    tracing::info!(
        fund_request_id = %fund_request.id,
        admin_id = %admin_id,
        amount = fund_request.amount_paise,
        "Fund request approved"
    );

    notification_service::notify_best_effort(
        pool,
        fund_request.user_id,
        NotificationKind::FundRequest,
        "Funds added",
        &format!(
            "{} was added to your main wallet",
            rupees(fund_request.amount_paise)
        ),
    )
    .await;

    Ok(fund_request)
}

pub async fn reject(
    pool: &DbPool,
    admin_id: Uuid,
    request_id: Uuid,
    reason: &str,
) -> Result<FundRequest, AppError> {
    let mut tx = pool.begin().await?;
    lock_pending(&mut tx, request_id).await?;

    let fund_request = sqlx::query_as::<_, FundRequest>(
        r#"
        UPDATE fund_requests
        SET status = 'rejected', admin_note = $2, reviewed_by = $3, reviewed_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(request_id)
    .bind(reason)
    .bind(admin_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    notification_service::notify_best_effort(
        pool,
        fund_request.user_id,
        NotificationKind::FundRequest,
        "Fund request rejected",
        &format!(
            "Your request for {} was rejected: {}",
            rupees(fund_request.amount_paise),
            reason
        ),
    )
    .await;

    Ok(fund_request)
}

async fn lock_pending(conn: &mut sqlx::PgConnection, request_id: Uuid) -> Result<FundRequest, AppError> {
    let fund_request =
        sqlx::query_as::<_, FundRequest>("SELECT * FROM fund_requests WHERE id = $1 FOR UPDATE")
            .bind(request_id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or(AppError::NotFound("Fund request"))?;

    if fund_request.status != ReviewStatus::Pending.as_str() {
        return Err(AppError::Conflict(format!(
            "Fund request is already {}",
            fund_request.status
        )));
    }

    Ok(fund_request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;

    fn deposit(proof_url: Option<&str>) -> CreateFundRequest {
        CreateFundRequest {
            amount_paise: 250_000,
            transaction_ref: format!("UTR{}", Uuid::new_v4().simple()),
            payment_method: "upi".to_string(),
            proof_url: proof_url.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_proof_must_be_a_web_link() {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://localhost/unused")
            .unwrap();

        for proof in ["javascript:alert(1)", "data:text/html,hi", "receipt.png"] {
            let err = request_funds(&pool, Uuid::new_v4(), deposit(Some(proof)))
                .await
                .unwrap_err();
            assert!(matches!(err, AppError::InvalidRequest(_)), "{proof}");
        }
    }

    #[tokio::test]
    async fn test_deposit_is_credited_once() {
        let Some(pool) = create_test_pool().await else {
            eprintln!("Skipping test - database not available");
            return;
        };
        let admin = insert_user(&pool, None).await;
        let member = insert_user(&pool, None).await;
        let fund_request = request_funds(&pool, member, deposit(Some("https://files.example.com/r.png")))
            .await
            .unwrap();

        let (first, second) = tokio::join!(
            approve(&pool, admin, fund_request.id),
            approve(&pool, admin, fund_request.id),
        );
        assert_eq!(first.is_ok() as u8 + second.is_ok() as u8, 1);

        let late_reject = reject(&pool, admin, fund_request.id, "duplicate").await;
        assert!(matches!(late_reject, Err(AppError::Conflict(_))));
        assert_eq!(wallet_of(&pool, member).await.main_paise, 250_000);
    }
}
