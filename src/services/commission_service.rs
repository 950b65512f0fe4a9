//! Referral commission distribution.
//!
//! For every purchase, walk the buyer's sponsor chain up to the configured
//! depth and credit each ancestor's commission wallet with the amount the
//! package's commission table assigns to that ancestor's level.
//!
//! # Idempotency
//!
//! `commission_credits` has a unique `(purchase_id, level)` key. Each credit
//! row is inserted with `ON CONFLICT DO NOTHING` and the wallet is only
//! touched when the insert actually wrote a row, so running `distribute`
//! again for the same purchase never pays a level twice.
//!
//! # Failure Handling
//!
//! The whole distribution for a purchase runs in one database transaction
//! holding the purchase row lock. On error nothing is paid, the purchase is
//! marked `failed`, and `repair` can retry it later.
//!
//! A purchase backed by a payment that is not approved, or one cancelled by
//! the payment's rejection, is refused with `Conflict` and left as it is.

use std::collections::HashSet;

use sqlx::PgConnection;
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    models::{
        fund::ReviewStatus,
        notification::NotificationKind,
        package::{CommissionLevelRow, CommissionRule},
        purchase::{
            CommissionCredit, DistributionAudit, DistributionStatus, DistributionSummary,
            LevelEarnings, Purchase, RepairReport,
        },
        wallet::{LedgerReason, WalletKind},
    },
    services::{
        notification_service::{self, rupees},
        wallet_service::{self, Movement},
    },
};

/// One member of a buyer's sponsor chain.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Ancestor {
    pub user_id: Uuid,
    /// 1 is the direct sponsor.
    pub level: i32,
    pub is_active: bool,
}

/// A credit the planner wants to make.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedCredit {
    pub beneficiary_id: Uuid,
    pub level: i32,
    pub amount_paise: i64,
}

/// Decide who gets what for a purchase of `price_paise`.
///
/// # Rules
///
/// - The ancestor at depth `d` is paid by the level-`d` rule
/// - Levels without a rule, and rules yielding zero, pay nothing
/// - Inactive (blocked) ancestors are skipped; their share is not passed up
/// - The running total never exceeds the price; a rule that would cross it
///   is cut down to what remains
pub fn plan_distribution(
    price_paise: i64,
    rules: &[CommissionRule],
    ancestors: &[Ancestor],
) -> Vec<PlannedCredit> {
    let mut remaining = price_paise.max(0);
    let mut planned = Vec::new();

    for ancestor in ancestors {
        if remaining == 0 {
            break;
        }
        if !ancestor.is_active {
            continue;
        }
        let Some(rule) = rules.iter().find(|r| r.level == ancestor.level) else {
            continue;
        };

        let amount = rule.amount_for(price_paise).min(remaining);
        if amount <= 0 {
            continue;
        }

        remaining -= amount;
        planned.push(PlannedCredit {
            beneficiary_id: ancestor.user_id,
            level: ancestor.level,
            amount_paise: amount,
        });
    }

    planned
}

/// Check a commission table against a package price.
///
/// Returns the total commission the table pays out when every level is filled.
pub fn validate_structure(
    price_paise: i64,
    rules: &[CommissionRule],
    max_levels: i32,
) -> Result<i64, String> {
    if price_paise <= 0 {
        return Err("Package price must be positive".to_string());
    }

    let mut seen = HashSet::new();
    let mut total: i64 = 0;

    for rule in rules {
        if rule.level < 1 || rule.level > max_levels {
            return Err(format!(
                "Level {} is outside 1..={}",
                rule.level, max_levels
            ));
        }
        if !seen.insert(rule.level) {
            return Err(format!("Level {} appears more than once", rule.level));
        }
        if rule.value <= 0 {
            return Err(format!("Level {} must have a positive value", rule.level));
        }
        if rule.kind == crate::models::package::CommissionKind::Percent && rule.value > 10_000 {
            return Err(format!("Level {} exceeds 100%", rule.level));
        }

        total = total
            .checked_add(rule.amount_for(price_paise))
            .ok_or_else(|| "Commission total overflows".to_string())?;
    }

    if total > price_paise {
        return Err(format!(
            "Total commission {} exceeds package price {}",
            total, price_paise
        ));
    }

    Ok(total)
}

/// The buyer's ancestors, nearest first, at most `max_levels` deep.
pub async fn sponsor_chain(
    conn: &mut PgConnection,
    user_id: Uuid,
    max_levels: i32,
) -> Result<Vec<Ancestor>, AppError> {
    let chain = sqlx::query_as::<_, Ancestor>(
        r#"
        WITH RECURSIVE chain (user_id, level) AS (
            SELECT sponsor_id, 1
            FROM users
            WHERE id = $1 AND sponsor_id IS NOT NULL
            UNION ALL
            SELECT u.sponsor_id, c.level + 1
            FROM chain c
            JOIN users u ON u.id = c.user_id
            WHERE u.sponsor_id IS NOT NULL AND c.level < $2
        )
        SELECT c.user_id, c.level, u.is_active
        FROM chain c
        JOIN users u ON u.id = c.user_id
        ORDER BY c.level
        "#,
    )
    .bind(user_id)
    .bind(max_levels)
    .fetch_all(&mut *conn)
    .await?;

    Ok(chain)
}

/// Typed commission table for a package, ordered by level.
pub async fn load_rules(
    conn: &mut PgConnection,
    package_id: Uuid,
) -> Result<Vec<CommissionRule>, AppError> {
    let rows = sqlx::query_as::<_, CommissionLevelRow>(
        "SELECT * FROM package_commission_levels WHERE package_id = $1 ORDER BY level",
    )
    .bind(package_id)
    .fetch_all(&mut *conn)
    .await?;

    rows.into_iter()
        .map(|row| CommissionRule::try_from(row).map_err(AppError::Internal))
        .collect()
}

/// Distribute commissions for a purchase.
///
/// Safe to call any number of times. A completed purchase returns a summary
/// with nothing newly paid.
pub async fn distribute(
    pool: &DbPool,
    max_levels: i32,
    purchase_id: Uuid,
) -> Result<DistributionSummary, AppError> {
    match distribute_in_tx(pool, max_levels, purchase_id).await {
        Ok((summary, credits)) => {
            if summary.credits_created > 0 {
                tracing::info!(
                    purchase_id = %purchase_id,
                    credits = summary.credits_created,
                    amount = summary.amount_distributed_paise,
                    "Commission distributed"
                );
            }
            for credit in credits {
                notification_service::notify_best_effort(
                    pool,
                    credit.beneficiary_id,
                    NotificationKind::Commission,
                    "Commission credited",
                    &format!(
                        "Level {} commission of {} added to your commission wallet",
                        credit.level,
                        rupees(credit.amount_paise)
                    ),
                )
                .await;
            }
            Ok(summary)
        }
        // Nothing to mark: the purchase is gone or not payable.
        Err(e @ (AppError::NotFound("Purchase") | AppError::Conflict(_))) => Err(e),
        Err(e) => {
            tracing::error!(purchase_id = %purchase_id, error = ?e, "Commission distribution failed");
            mark_failed(pool, purchase_id, &e.to_string()).await;
            Err(e)
        }
    }
}

async fn distribute_in_tx(
    pool: &DbPool,
    max_levels: i32,
    purchase_id: Uuid,
) -> Result<(DistributionSummary, Vec<CommissionCredit>), AppError> {
    let mut tx = pool.begin().await?;

    let purchase =
        sqlx::query_as::<_, Purchase>("SELECT * FROM purchases WHERE id = $1 FOR UPDATE")
            .bind(purchase_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(AppError::NotFound("Purchase"))?;

    if purchase.is_distributed() {
        tx.rollback().await?;
        return Ok((
            DistributionSummary {
                purchase_id,
                status: DistributionStatus::Completed,
                credits_created: 0,
                amount_distributed_paise: 0,
                error: None,
            },
            Vec::new(),
        ));
    }

    ensure_payable(&mut tx, &purchase).await?;

    let rules = load_rules(&mut tx, purchase.package_id).await?;
    let chain = sponsor_chain(&mut tx, purchase.user_id, max_levels).await?;
    let plan = plan_distribution(purchase.amount_paise, &rules, &chain);

    let mut created = Vec::with_capacity(plan.len());
    for planned in &plan {
        let inserted = sqlx::query_as::<_, CommissionCredit>(
            r#"
            INSERT INTO commission_credits (purchase_id, beneficiary_id, level, amount_paise)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (purchase_id, level) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(purchase.id)
        .bind(planned.beneficiary_id)
        .bind(planned.level)
        .bind(planned.amount_paise)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(credit) = inserted else {
            continue;
        };

        wallet_service::credit(
            &mut tx,
            Movement::new(
                credit.beneficiary_id,
                WalletKind::Commission,
                credit.amount_paise,
                LedgerReason::Commission,
            )
            .reference(purchase.id)
            .describe(format!("Level {} commission", credit.level)),
        )
        .await?;

        created.push(credit);
    }

    sqlx::query(
        r#"
        UPDATE purchases
        SET distribution_status = 'completed', distribution_error = NULL, distributed_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(purchase.id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    let summary = DistributionSummary {
        purchase_id,
        status: DistributionStatus::Completed,
        credits_created: created.len(),
        amount_distributed_paise: created.iter().map(|c| c.amount_paise).sum(),
        error: None,
    };

    Ok((summary, created))
}

/// A purchase pays commission only while the payment behind it, if any, is
/// approved.
///
/// The verification is read without a lock: an approved payment only leaves
/// `approved` after its distribution has already failed.
async fn ensure_payable(conn: &mut PgConnection, purchase: &Purchase) -> Result<(), AppError> {
    if purchase.is_cancelled() {
        return Err(AppError::Conflict("Purchase was cancelled".to_string()));
    }

    let Some(verification_id) = purchase.payment_verification_id else {
        return Ok(());
    };

    let status: String =
        sqlx::query_scalar("SELECT status FROM payment_verifications WHERE id = $1")
            .bind(verification_id)
            .fetch_one(&mut *conn)
            .await?;

    if status != ReviewStatus::Approved.as_str() {
        return Err(AppError::Conflict(format!(
            "Payment for this purchase is {}",
            status
        )));
    }

    Ok(())
}

async fn mark_failed(pool: &DbPool, purchase_id: Uuid, error: &str) {
    let result = sqlx::query(
        r#"
        UPDATE purchases
        SET distribution_status = 'failed', distribution_error = $2
        WHERE id = $1 AND distribution_status IN ('pending', 'failed')
        "#,
    )
    .bind(purchase_id)
    .bind(error)
    .execute(pool)
    .await;

    if let Err(e) = result {
        tracing::error!(purchase_id = %purchase_id, error = ?e, "Failed to record distribution failure");
    }
}

/// Compare what a purchase should have paid with what it did.
///
/// The expectation uses the current sponsor chain and commission table.
pub async fn audit(
    pool: &DbPool,
    max_levels: i32,
    purchase_id: Uuid,
) -> Result<DistributionAudit, AppError> {
    let mut conn = pool.acquire().await?;

    let purchase = sqlx::query_as::<_, Purchase>("SELECT * FROM purchases WHERE id = $1")
        .bind(purchase_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(AppError::NotFound("Purchase"))?;

    let rules = load_rules(&mut conn, purchase.package_id).await?;
    let chain = sponsor_chain(&mut conn, purchase.user_id, max_levels).await?;
    let plan = plan_distribution(purchase.amount_paise, &rules, &chain);

    let credits = sqlx::query_as::<_, CommissionCredit>(
        "SELECT * FROM commission_credits WHERE purchase_id = $1 ORDER BY level",
    )
    .bind(purchase_id)
    .fetch_all(&mut *conn)
    .await?;

    let credited: HashSet<i32> = credits.iter().map(|c| c.level).collect();
    let missing_levels = plan
        .iter()
        .map(|p| p.level)
        .filter(|level| !credited.contains(level))
        .collect();

    Ok(DistributionAudit {
        expected_levels: plan.len(),
        expected_total_paise: plan.iter().map(|p| p.amount_paise).sum(),
        credited_levels: credits.len(),
        credited_total_paise: credits.iter().map(|c| c.amount_paise).sum(),
        missing_levels,
        credits,
        purchase,
    })
}

/// Purchases whose distribution has not completed, oldest first.
///
/// Purchases waiting on a payment that is not approved are left out; they
/// resume when the payment is approved again.
pub async fn list_incomplete(pool: &DbPool) -> Result<Vec<Purchase>, AppError> {
    let purchases = sqlx::query_as::<_, Purchase>(
        r#"
        SELECT p.* FROM purchases p
        LEFT JOIN payment_verifications v ON v.id = p.payment_verification_id
        WHERE p.distribution_status IN ('pending', 'failed')
          AND (p.payment_verification_id IS NULL OR v.status = 'approved')
        ORDER BY p.created_at
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(purchases)
}

/// Retry every incomplete distribution and report each outcome.
pub async fn repair(pool: &DbPool, max_levels: i32) -> Result<RepairReport, AppError> {
    let incomplete = list_incomplete(pool).await?;
    let mut results = Vec::with_capacity(incomplete.len());

    for purchase in &incomplete {
        let summary = match distribute(pool, max_levels, purchase.id).await {
            Ok(summary) => summary,
            Err(e) => DistributionSummary {
                purchase_id: purchase.id,
                status: DistributionStatus::Failed,
                credits_created: 0,
                amount_distributed_paise: 0,
                error: Some(e.to_string()),
            },
        };
        results.push(summary);
    }

    let completed = results
        .iter()
        .filter(|r| r.status == DistributionStatus::Completed)
        .count();

    tracing::info!(
        examined = incomplete.len(),
        completed,
        "Distribution repair pass finished"
    );

    Ok(RepairReport {
        examined: incomplete.len(),
        completed,
        failed: results.len() - completed,
        results,
    })
}

/// Commission credits earned by a user, newest first.
pub async fn my_commissions(
    pool: &DbPool,
    user_id: Uuid,
    limit: i64,
    offset: i64,
) -> Result<Vec<CommissionCredit>, AppError> {
    let credits = sqlx::query_as::<_, CommissionCredit>(
        r#"
        SELECT * FROM commission_credits
        WHERE beneficiary_id = $1
        ORDER BY created_at DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    Ok(credits)
}

/// Earnings totals per level for a user.
pub async fn earnings_by_level(pool: &DbPool, user_id: Uuid) -> Result<Vec<LevelEarnings>, AppError> {
    let rows = sqlx::query_as::<_, LevelEarnings>(
        r#"
        SELECT level, COUNT(*) AS credits, COALESCE(SUM(amount_paise), 0)::BIGINT AS total_paise
        FROM commission_credits
        WHERE beneficiary_id = $1
        GROUP BY level
        ORDER BY level
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{models::package::CommissionKind, test_support::*};

    fn percent(level: i32, bps: i64) -> CommissionRule {
        CommissionRule {
            level,
            kind: CommissionKind::Percent,
            value: bps,
        }
    }

    fn fixed(level: i32, paise: i64) -> CommissionRule {
        CommissionRule {
            level,
            kind: CommissionKind::Fixed,
            value: paise,
        }
    }

    fn chain(depth: i32) -> Vec<Ancestor> {
        (1..=depth)
            .map(|level| Ancestor {
                user_id: Uuid::new_v4(),
                level,
                is_active: true,
            })
            .collect()
    }

    #[test]
    fn test_mixed_percent_and_fixed_levels() {
        let ancestors = chain(3);
        let rules = vec![percent(1, 1_000), percent(2, 500), fixed(3, 2_000)];

        let plan = plan_distribution(100_000, &rules, &ancestors);

        assert_eq!(plan.len(), 3);
        assert_eq!(plan[0].beneficiary_id, ancestors[0].user_id);
        assert_eq!(plan[0].amount_paise, 10_000);
        assert_eq!(plan[1].amount_paise, 5_000);
        assert_eq!(plan[2].amount_paise, 2_000);
        assert_eq!(plan[2].level, 3);
    }

    #[test]
    fn test_short_chain_leaves_remainder_undistributed() {
        let ancestors = chain(2);
        let rules: Vec<_> = (1..=10).map(|l| percent(l, 100)).collect();

        let plan = plan_distribution(50_000, &rules, &ancestors);

        assert_eq!(plan.len(), 2);
        assert_eq!(plan.iter().map(|p| p.amount_paise).sum::<i64>(), 1_000);
    }

    #[test]
    fn test_levels_without_rule_pay_nothing() {
        let ancestors = chain(4);
        let rules = vec![percent(1, 1_000), percent(4, 1_000)];

        let plan = plan_distribution(10_000, &rules, &ancestors);

        let levels: Vec<i32> = plan.iter().map(|p| p.level).collect();
        assert_eq!(levels, vec![1, 4]);
    }

    #[test]
    fn test_inactive_ancestor_skipped_without_compression() {
        let mut ancestors = chain(3);
        ancestors[1].is_active = false;
        let rules = vec![fixed(1, 100), fixed(2, 200), fixed(3, 300)];

        let plan = plan_distribution(10_000, &rules, &ancestors);

        assert_eq!(plan.len(), 2);
        assert_eq!(plan[0].amount_paise, 100);
        assert_eq!(plan[1].level, 3);
        assert_eq!(plan[1].amount_paise, 300);
        assert_eq!(plan[1].beneficiary_id, ancestors[2].user_id);
    }

    #[test]
    fn test_total_never_exceeds_price() {
        let ancestors = chain(3);
        // Table written for a higher price than this purchase was made at.
        let rules = vec![fixed(1, 600), fixed(2, 600), fixed(3, 600)];

        let plan = plan_distribution(1_000, &rules, &ancestors);

        assert_eq!(plan.iter().map(|p| p.amount_paise).sum::<i64>(), 1_000);
        assert_eq!(plan.len(), 2);
        assert_eq!(plan[1].amount_paise, 400);
    }

    #[test]
    fn test_deep_chain_uses_all_levels() {
        let ancestors = chain(120);
        let rules: Vec<_> = (1..=120).map(|l| fixed(l, 10)).collect();

        let plan = plan_distribution(1_000_000, &rules, &ancestors);

        assert_eq!(plan.len(), 120);
        assert_eq!(plan.last().unwrap().level, 120);
        assert_eq!(plan.iter().map(|p| p.amount_paise).sum::<i64>(), 1_200);
    }

    #[test]
    fn test_no_sponsor_no_credits() {
        let plan = plan_distribution(10_000, &[percent(1, 1_000)], &[]);
        assert!(plan.is_empty());
    }

    #[test]
    fn test_tiny_percent_rounds_to_zero_and_is_dropped() {
        let plan = plan_distribution(99, &[percent(1, 1)], &chain(1));
        assert!(plan.is_empty());
    }

    #[test]
    fn test_validate_structure_totals() {
        let rules = vec![percent(1, 1_000), fixed(2, 5_000)];
        assert_eq!(validate_structure(100_000, &rules, 120), Ok(15_000));
        assert_eq!(validate_structure(100_000, &[], 120), Ok(0));
    }

    #[test]
    fn test_validate_structure_rejects_bad_tables() {
        assert!(validate_structure(0, &[], 120).is_err());
        assert!(validate_structure(10_000, &[percent(0, 100)], 120).is_err());
        assert!(validate_structure(10_000, &[percent(121, 100)], 120).is_err());
        assert!(validate_structure(10_000, &[percent(1, 100), fixed(1, 5)], 120).is_err());
        assert!(validate_structure(10_000, &[fixed(1, 0)], 120).is_err());
        assert!(validate_structure(10_000, &[percent(1, 10_001)], 120).is_err());
        assert!(validate_structure(10_000, &[percent(1, 6_000), percent(2, 5_000)], 120).is_err());
        assert!(validate_structure(10_000, &[fixed(1, 10_001)], 120).is_err());
    }

    #[test]
    fn test_validated_table_plans_within_price() {
        let price = 250_000;
        let rules = vec![percent(1, 2_000), percent(2, 1_000), fixed(3, 7_500)];
        let total = validate_structure(price, &rules, 120).unwrap();

        let plan = plan_distribution(price, &rules, &chain(5));
        assert_eq!(plan.iter().map(|p| p.amount_paise).sum::<i64>(), total);
    }

    // Database-backed: sponsor <- member <- buyer, 10% to level 1 and a fixed
    // Rs 50 to level 2 on a Rs 1000 package.

    async fn two_level_tree(pool: &DbPool) -> (Uuid, Uuid, Uuid, Uuid) {
        let sponsor = insert_user(pool, None).await;
        let member = insert_user(pool, Some(sponsor)).await;
        let buyer = insert_user(pool, Some(member)).await;
        let package = insert_package(pool, 100_000, &[percent(1, 1_000), fixed(2, 5_000)]).await;
        (sponsor, member, buyer, package)
    }

    #[tokio::test]
    async fn test_distribute_twice_pays_each_level_once() {
        let Some(pool) = create_test_pool().await else {
            eprintln!("Skipping test - database not available");
            return;
        };
        let (sponsor, member, buyer, package) = two_level_tree(&pool).await;
        let purchase = insert_purchase(&pool, buyer, package, 100_000).await;

        distribute(&pool, MAX_LEVELS, purchase).await.unwrap();
        let again = distribute(&pool, MAX_LEVELS, purchase).await.unwrap();

        assert_eq!(again.status, DistributionStatus::Completed);
        assert_eq!(again.credits_created, 0);
        assert_eq!(credit_count(&pool, purchase).await, 2);
        assert_eq!(wallet_of(&pool, member).await.commission_paise, 10_000);
        assert_eq!(wallet_of(&pool, sponsor).await.commission_paise, 5_000);
        assert_eq!(purchase_status(&pool, purchase).await.0, "completed");
    }

    #[tokio::test]
    async fn test_failed_distribution_is_marked_and_repaired() {
        let Some(pool) = create_test_pool().await else {
            eprintln!("Skipping test - database not available");
            return;
        };
        let (sponsor, member, buyer, package) = two_level_tree(&pool).await;
        remove_wallet(&pool, sponsor).await;
        let purchase = insert_purchase(&pool, buyer, package, 100_000).await;

        let err = distribute(&pool, MAX_LEVELS, purchase).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound("Wallet")));

        // Nothing from the failed run sticks, and the failure is recorded.
        let (status, error) = purchase_status(&pool, purchase).await;
        assert_eq!(status, "failed");
        assert!(error.is_some());
        assert_eq!(credit_count(&pool, purchase).await, 0);
        assert_eq!(wallet_of(&pool, member).await.commission_paise, 0);

        restore_wallet(&pool, sponsor).await;
        let incomplete = list_incomplete(&pool).await.unwrap();
        assert!(incomplete.iter().any(|p| p.id == purchase));

        repair(&pool, MAX_LEVELS).await.unwrap();

        assert_eq!(purchase_status(&pool, purchase).await.0, "completed");
        assert_eq!(credit_count(&pool, purchase).await, 2);
        assert_eq!(wallet_of(&pool, member).await.commission_paise, 10_000);
        assert_eq!(wallet_of(&pool, sponsor).await.commission_paise, 5_000);
    }

    #[tokio::test]
    async fn test_cancelled_purchase_is_refused() {
        let Some(pool) = create_test_pool().await else {
            eprintln!("Skipping test - database not available");
            return;
        };
        let (_, member, buyer, package) = two_level_tree(&pool).await;
        let purchase: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO purchases (user_id, package_id, amount_paise, source, distribution_status)
            VALUES ($1, $2, 100000, 'wallet', 'cancelled')
            RETURNING id
            "#,
        )
        .bind(buyer)
        .bind(package)
        .fetch_one(&pool)
        .await
        .unwrap();

        let err = distribute(&pool, MAX_LEVELS, purchase).await.unwrap_err();

        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(purchase_status(&pool, purchase).await.0, "cancelled");
        assert_eq!(wallet_of(&pool, member).await.commission_paise, 0);
    }
}
