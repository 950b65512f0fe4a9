//! Mobile and DTH recharges paid from the smart wallet.
//!
//! # Lifecycle
//!
//! ```text
//! processing --provider success--> success
//!     |      --provider pending--> pending --callback--> success | failed
//!     +------ provider failed / transport error --> failed (refunded)
//! ```
//!
//! The smart wallet is debited before the provider is called. Every move to
//! `failed` is a guarded update from an open status, and the refund rides in
//! the same transaction, so a recharge is refunded at most once no matter
//! how the provider response and callbacks interleave.

use hmac::{Hmac, Mac};
use rand::{Rng, distr::Alphanumeric};
use sha2::Sha256;
use uuid::Uuid;

use crate::{
    config::Config,
    db::DbPool,
    error::AppError,
    models::{
        notification::NotificationKind,
        recharge::{Recharge, RechargeCallback, RechargeRequest, RechargeStatus, validate_recharge},
        wallet::{LedgerReason, PageQuery, WalletKind},
    },
    services::{
        notification_service::{self, rupees},
        recharge_provider::{ProviderOutcome, ProviderStatus, RechargeOrder, RechargeProvider},
        wallet_service::{self, Movement},
    },
};

type HmacSha256 = Hmac<Sha256>;

/// Where a recharge lands after the provider has answered.
#[derive(Debug, PartialEq, Eq)]
pub enum Resolution {
    Success { provider_ref: Option<String> },
    Pending { provider_ref: Option<String> },
    Failed { reason: String },
}

/// Map the provider's answer, or the failure to get one, onto a resolution.
pub fn resolve(result: Result<ProviderOutcome, AppError>) -> Resolution {
    match result {
        Ok(outcome) => match outcome.status {
            ProviderStatus::Success => Resolution::Success {
                provider_ref: outcome.provider_ref,
            },
            ProviderStatus::Pending => Resolution::Pending {
                provider_ref: outcome.provider_ref,
            },
            ProviderStatus::Failed => Resolution::Failed {
                reason: outcome
                    .message
                    .unwrap_or_else(|| "Declined by operator".to_string()),
            },
        },
        Err(e) => Resolution::Failed {
            reason: e.to_string(),
        },
    }
}

/// Check an `X-Signature: sha256=<hex>` header against the raw callback body.
///
/// Comparison is constant-time.
pub fn verify_signature(secret: &str, body: &[u8], header: &str) -> bool {
    let Some(signature) = header.strip_prefix("sha256=") else {
        return false;
    };
    let Ok(expected) = hex::decode(signature) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

fn generate_client_ref() -> String {
    let suffix: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(|c| char::from(c).to_ascii_uppercase())
        .collect();
    format!("RC{}{}", chrono::Utc::now().format("%Y%m%d%H%M%S"), suffix)
}

/// Place a recharge.
///
/// # Process
///
/// 1. Validate operator, subscriber and amount
/// 2. Insert a `processing` recharge and debit the smart wallet (one transaction)
/// 3. Call the provider
/// 4. Apply the resolution; a failure refunds in the same transaction as the status change
pub async fn recharge(
    pool: &DbPool,
    provider: &dyn RechargeProvider,
    user_id: Uuid,
    request: RechargeRequest,
) -> Result<Recharge, AppError> {
    validate_recharge(&request).map_err(AppError::InvalidRequest)?;

    let mut tx = pool.begin().await?;

    let recharge = sqlx::query_as::<_, Recharge>(
        r#"
        INSERT INTO recharges (user_id, kind, operator, subscriber, amount_paise, client_ref)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(request.kind.as_str())
    .bind(&request.operator)
    .bind(&request.subscriber)
    .bind(request.amount_paise)
    .bind(generate_client_ref())
    .fetch_one(&mut *tx)
    .await?;

    wallet_service::debit(
        &mut tx,
        Movement::new(user_id, WalletKind::Smart, request.amount_paise, LedgerReason::Recharge)
            .reference(recharge.id)
            .describe(format!(
                "{} recharge {} {}",
                request.kind.as_str(),
                request.operator,
                request.subscriber
            )),
    )
    .await?;

    tx.commit().await?;

    let order = RechargeOrder {
        client_ref: recharge.client_ref.clone(),
        kind: request.kind,
        operator: request.operator,
        subscriber: request.subscriber,
        amount_paise: request.amount_paise,
    };

    let resolution = resolve(provider.submit(&order).await);

    tracing::info!(
        recharge_id = %recharge.id,
        client_ref = %recharge.client_ref,
        resolution = ?resolution,
        "Recharge submitted to provider"
    );

    apply(pool, recharge.id, resolution).await
}

/// Move an open recharge to its resolved status. Settled recharges are
/// returned unchanged.
async fn apply(pool: &DbPool, recharge_id: Uuid, resolution: Resolution) -> Result<Recharge, AppError> {
    let mut tx = pool.begin().await?;

    let current = sqlx::query_as::<_, Recharge>("SELECT * FROM recharges WHERE id = $1 FOR UPDATE")
        .bind(recharge_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(AppError::NotFound("Recharge"))?;

    if !RechargeStatus::parse(&current.status).is_some_and(RechargeStatus::is_open) {
        tracing::info!(
            recharge_id = %recharge_id,
            status = %current.status,
            "Recharge already settled, ignoring update"
        );
        return Ok(current);
    }

    let updated = match resolution {
        Resolution::Success { provider_ref } => {
            set_status(&mut tx, recharge_id, RechargeStatus::Success, provider_ref).await?
        }
        Resolution::Pending { provider_ref } => {
            set_status(&mut tx, recharge_id, RechargeStatus::Pending, provider_ref).await?
        }
        Resolution::Failed { reason } => fail_and_refund(&mut tx, recharge_id, &reason).await?,
    };

    tx.commit().await?;

    if updated.status == RechargeStatus::Success.as_str() {
        notification_service::notify_best_effort(
            pool,
            updated.user_id,
            NotificationKind::Recharge,
            "Recharge successful",
            &format!(
                "{} recharge of {} for {} succeeded",
                updated.operator,
                rupees(updated.amount_paise),
                updated.subscriber
            ),
        )
        .await;
    } else if updated.status == RechargeStatus::Failed.as_str() {
        tracing::warn!(
            recharge_id = %updated.id,
            reason = ?updated.failure_reason,
            "Recharge failed and refunded"
        );
        notification_service::notify_best_effort(
            pool,
            updated.user_id,
            NotificationKind::Recharge,
            "Recharge failed",
            &format!(
                "Recharge for {} failed; {} was returned to your smart wallet",
                updated.subscriber,
                rupees(updated.amount_paise)
            ),
        )
        .await;
    }

    Ok(updated)
}

async fn set_status(
    conn: &mut sqlx::PgConnection,
    recharge_id: Uuid,
    status: RechargeStatus,
    provider_ref: Option<String>,
) -> Result<Recharge, AppError> {
    let recharge = sqlx::query_as::<_, Recharge>(
        r#"
        UPDATE recharges
        SET status = $2, provider_ref = COALESCE($3, provider_ref), updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(recharge_id)
    .bind(status.as_str())
    .bind(provider_ref)
    .fetch_one(&mut *conn)
    .await?;

    Ok(recharge)
}

async fn fail_and_refund(
    conn: &mut sqlx::PgConnection,
    recharge_id: Uuid,
    reason: &str,
) -> Result<Recharge, AppError> {
    let failed = sqlx::query_as::<_, Recharge>(
        r#"
        UPDATE recharges
        SET status = $2, failure_reason = $3, updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(recharge_id)
    .bind(RechargeStatus::Failed.as_str())
    .bind(reason)
    .fetch_one(&mut *conn)
    .await?;

    wallet_service::credit(
        conn,
        Movement::new(
            failed.user_id,
            WalletKind::Smart,
            failed.amount_paise,
            LedgerReason::RechargeRefund,
        )
        .reference(failed.id)
        .describe(format!("Refund for failed recharge {}", failed.client_ref)),
    )
    .await?;

    Ok(failed)
}

/// Handle a signed status callback from the provider.
///
/// # Errors
///
/// - `NotConfigured`: no callback secret is set
/// - `Unauthorized`: signature missing or wrong
/// - `InvalidRequest`: malformed body, or a `processing` status
/// - `NotFound`: unknown `client_ref`
pub async fn handle_callback(
    pool: &DbPool,
    config: &Config,
    signature: Option<&str>,
    body: &[u8],
) -> Result<Recharge, AppError> {
    let secret = config
        .recharge_callback_secret
        .as_deref()
        .ok_or(AppError::NotConfigured("Recharge callback"))?;

    let Some(signature) = signature else {
        return Err(AppError::Unauthorized);
    };
    if !verify_signature(secret, body, signature) {
        tracing::warn!("Recharge callback with bad signature rejected");
        return Err(AppError::Unauthorized);
    }

    let callback: RechargeCallback = serde_json::from_slice(body)
        .map_err(|e| AppError::InvalidRequest(format!("Malformed callback: {}", e)))?;

    let resolution = match callback.status {
        RechargeStatus::Success => Resolution::Success {
            provider_ref: callback.provider_ref,
        },
        RechargeStatus::Pending => Resolution::Pending {
            provider_ref: callback.provider_ref,
        },
        RechargeStatus::Failed => Resolution::Failed {
            reason: callback
                .message
                .unwrap_or_else(|| "Failed at operator".to_string()),
        },
        RechargeStatus::Processing => {
            return Err(AppError::InvalidRequest(
                "Callback status must be success, pending or failed".to_string(),
            ));
        }
    };

    let recharge_id: Uuid = sqlx::query_scalar("SELECT id FROM recharges WHERE client_ref = $1")
        .bind(&callback.client_ref)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("Recharge"))?;

    apply(pool, recharge_id, resolution).await
}

pub async fn my_recharges(pool: &DbPool, user_id: Uuid, page: &PageQuery) -> Result<Vec<Recharge>, AppError> {
    let (limit, offset) = page.bounds();
    let rows = sqlx::query_as::<_, Recharge>(
        r#"
        SELECT * FROM recharges
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

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(secret: &str, body: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
    }

    const BODY: &[u8] = br#"{"client_ref":"RC20250101120000ABC123","status":"success"}"#;

    #[test]
    fn test_valid_signature_accepted() {
        let header = sign("callback-secret", BODY);
        assert!(verify_signature("callback-secret", BODY, &header));
    }

    #[test]
    fn test_signature_rejections() {
        let header = sign("callback-secret", BODY);

        assert!(!verify_signature("other-secret", BODY, &header));
        assert!(!verify_signature("callback-secret", b"{\"tampered\":true}", &header));
        assert!(!verify_signature("callback-secret", BODY, header.trim_start_matches("sha256=")));
        assert!(!verify_signature("callback-secret", BODY, "sha256=not-hex"));
        assert!(!verify_signature("callback-secret", BODY, ""));
    }

    #[test]
    fn test_resolution_from_provider_outcomes() {
        let ok = |status, provider_ref: Option<&str>, message: Option<&str>| {
            Ok(ProviderOutcome {
                status,
                provider_ref: provider_ref.map(String::from),
                message: message.map(String::from),
            })
        };

        assert_eq!(
            resolve(ok(ProviderStatus::Success, Some("OP1"), None)),
            Resolution::Success {
                provider_ref: Some("OP1".to_string())
            }
        );
        assert_eq!(
            resolve(ok(ProviderStatus::Pending, None, None)),
            Resolution::Pending { provider_ref: None }
        );
        assert_eq!(
            resolve(ok(ProviderStatus::Failed, None, Some("Invalid number"))),
            Resolution::Failed {
                reason: "Invalid number".to_string()
            }
        );
    }

    #[test]
    fn test_transport_error_resolves_to_failed() {
        let resolution = resolve(Err(AppError::Provider("timeout".to_string())));
        assert!(matches!(resolution, Resolution::Failed { reason } if reason.contains("timeout")));
    }

    #[test]
    fn test_client_ref_shape() {
        let a = generate_client_ref();
        let b = generate_client_ref();
        assert!(a.starts_with("RC"));
        assert_eq!(a.len(), 2 + 14 + 6);
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_callback_requires_configured_secret_before_touching_db() {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://localhost/unused")
            .unwrap();
        let mut config = Config::for_tests();

        let header = sign("callback-secret", BODY);
        let err = handle_callback(&pool, &config, None, BODY).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized));

        let err = handle_callback(&pool, &config, Some("sha256=00"), BODY)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized));

        let processing = br#"{"client_ref":"RC1","status":"processing"}"#;
        let err = handle_callback(&pool, &config, Some(&sign("callback-secret", processing)), processing)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidRequest(_)));

        config.recharge_callback_secret = None;
        let err = handle_callback(&pool, &config, Some(&header), BODY).await.unwrap_err();
        assert!(matches!(err, AppError::NotConfigured(_)));
    }
}
