//! Package purchases paid from the main wallet.

use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    models::{
        purchase::{DistributionStatus, DistributionSummary, Purchase, PurchaseResponse, PurchaseSource},
        wallet::{LedgerReason, PageQuery, WalletKind},
    },
    services::{
        commission_service, package_service,
        wallet_service::{self, Movement},
    },
};

/// Buy a package with main-wallet funds, then distribute commissions.
///
/// # Process
///
/// 1. Debit the main wallet and insert the purchase in one transaction
/// 2. Run the distribution
///
/// A failed distribution does not undo the purchase: it stays `failed`
/// and is picked up by the repair pass.
pub async fn purchase_with_wallet(
    pool: &DbPool,
    max_levels: i32,
    user_id: Uuid,
    package_id: Uuid,
) -> Result<PurchaseResponse, AppError> {
    let mut tx = pool.begin().await?;

    let package = package_service::get_active(&mut tx, package_id).await?;

    let purchase = sqlx::query_as::<_, Purchase>(
        r#"
        INSERT INTO purchases (user_id, package_id, amount_paise, source)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(package.id)
    .bind(package.price_paise)
    .bind(PurchaseSource::Wallet.as_str())
    .fetch_one(&mut *tx)
    .await?;

    wallet_service::debit(
        &mut tx,
        Movement::new(user_id, WalletKind::Main, package.price_paise, LedgerReason::PackagePurchase)
            .reference(purchase.id)
            .describe(format!("Purchase of {}", package.name)),
    )
    .await?;

    tx.commit().await?;

    tracing::info!(
        purchase_id = %purchase.id,
        user_id = %user_id,
        package_id = %package.id,
        amount = package.price_paise,
        "Package purchased"
    );

    let distribution = match commission_service::distribute(pool, max_levels, purchase.id).await {
        Ok(summary) => summary,
        Err(e) => DistributionSummary {
            purchase_id: purchase.id,
            status: DistributionStatus::Failed,
            credits_created: 0,
            amount_distributed_paise: 0,
            error: Some(e.to_string()),
        },
    };

    let purchase = get_purchase(pool, purchase.id).await?;

    Ok(PurchaseResponse {
        purchase,
        distribution,
    })
}

pub async fn get_purchase(pool: &DbPool, purchase_id: Uuid) -> Result<Purchase, AppError> {
    sqlx::query_as::<_, Purchase>("SELECT * FROM purchases WHERE id = $1")
        .bind(purchase_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("Purchase"))
}

pub async fn my_purchases(pool: &DbPool, user_id: Uuid, page: &PageQuery) -> Result<Vec<Purchase>, AppError> {
    let (limit, offset) = page.bounds();
    let purchases = sqlx::query_as::<_, Purchase>(
        r#"
        SELECT * FROM purchases
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

    Ok(purchases)
}
