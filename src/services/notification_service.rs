//! Notification persistence and cross-instance delivery.
//!
//! # Delivery Flow
//!
//! 1. `notify` inserts the row and calls `pg_notify` with its JSON
//! 2. Every server instance runs `run_listener`, which `LISTEN`s on the channel
//! 3. Each instance pushes the payload to its own hub, which owns the SSE streams
//!
//! Delivery is best-effort: the stored row is the source of truth and clients
//! catch up with `GET /api/notifications`.

use std::{sync::Arc, time::Duration};

use sqlx::postgres::PgListener;
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    models::notification::{Notification, NotificationKind},
    services::notification_hub::NotificationHub,
};

/// Postgres channel carrying notification payloads between instances.
pub const CHANNEL: &str = "user_notifications";

/// pg_notify payloads must stay under 8000 bytes.
const MAX_PAYLOAD_BYTES: usize = 7_900;

/// Store a notification and announce it to every instance.
pub async fn notify(
    pool: &DbPool,
    user_id: Uuid,
    kind: NotificationKind,
    title: &str,
    body: &str,
) -> Result<Notification, AppError> {
    let notification = sqlx::query_as::<_, Notification>(
        r#"
        INSERT INTO notifications (user_id, kind, title, body)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(kind.as_str())
    .bind(title)
    .bind(body)
    .fetch_one(pool)
    .await?;

    let payload = serde_json::to_string(&notification)
        .map_err(|e| AppError::Internal(format!("Failed to serialize notification: {}", e)))?;

    if payload.len() <= MAX_PAYLOAD_BYTES {
        sqlx::query("SELECT pg_notify($1, $2)")
            .bind(CHANNEL)
            .bind(&payload)
            .execute(pool)
            .await?;
    } else {
        tracing::warn!(
            notification_id = %notification.id,
            bytes = payload.len(),
            "Notification too large for live delivery"
        );
    }

    Ok(notification)
}

/// `notify`, logging instead of failing. Used after the business change has
/// already committed.
pub async fn notify_best_effort(
    pool: &DbPool,
    user_id: Uuid,
    kind: NotificationKind,
    title: &str,
    body: &str,
) {
    if let Err(e) = notify(pool, user_id, kind, title, body).await {
        tracing::error!(%user_id, kind = kind.as_str(), error = ?e, "Failed to send notification");
    }
}

pub async fn list(
    pool: &DbPool,
    user_id: Uuid,
    unread_only: bool,
    limit: i64,
) -> Result<Vec<Notification>, AppError> {
    let notifications = sqlx::query_as::<_, Notification>(
        r#"
        SELECT * FROM notifications
        WHERE user_id = $1 AND (NOT $2 OR is_read = false)
        ORDER BY created_at DESC
        LIMIT $3
        "#,
    )
    .bind(user_id)
    .bind(unread_only)
    .bind(limit.clamp(1, 200))
    .fetch_all(pool)
    .await?;

    Ok(notifications)
}

pub async fn mark_read(pool: &DbPool, user_id: Uuid, notification_id: Uuid) -> Result<u64, AppError> {
    let result = sqlx::query(
        "UPDATE notifications SET is_read = true WHERE id = $1 AND user_id = $2",
    )
    .bind(notification_id)
    .bind(user_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Notification"));
    }

    Ok(result.rows_affected())
}

pub async fn mark_all_read(pool: &DbPool, user_id: Uuid) -> Result<u64, AppError> {
    let result =
        sqlx::query("UPDATE notifications SET is_read = true WHERE user_id = $1 AND is_read = false")
            .bind(user_id)
            .execute(pool)
            .await?;

    Ok(result.rows_affected())
}

/// Forward `pg_notify` payloads to the local hub, forever.
///
/// Reconnects with capped exponential backoff when the listener fails.
pub async fn run_listener(pool: DbPool, hub: Arc<NotificationHub>) {
    let mut backoff = Duration::from_secs(1);

    loop {
        match listen(&pool, &hub).await {
            Ok(()) => backoff = Duration::from_secs(1),
            Err(e) => {
                tracing::error!(error = ?e, retry_in = ?backoff, "Notification listener failed");
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(Duration::from_secs(60));
            }
        }
    }
}

async fn listen(pool: &DbPool, hub: &NotificationHub) -> Result<(), sqlx::Error> {
    let mut listener = PgListener::connect_with(pool).await?;
    listener.listen(CHANNEL).await?;
    tracing::info!(channel = CHANNEL, "Notification listener started");

    loop {
        let message = listener.recv().await?;
        match serde_json::from_str::<Notification>(message.payload()) {
            Ok(notification) => {
                let delivered = hub.send_to_user(&notification);
                tracing::debug!(
                    user_id = %notification.user_id,
                    notification_id = %notification.id,
                    delivered,
                    "Notification delivered"
                );
            }
            Err(e) => tracing::warn!(error = %e, "Ignoring malformed notification payload"),
        }
    }
}

/// Format paise as rupees for human-readable messages: `Rs 1234.50`.
pub fn rupees(paise: i64) -> String {
    let sign = if paise < 0 { "-" } else { "" };
    let abs = paise.unsigned_abs();
    format!("{}Rs {}.{:02}", sign, abs / 100, abs % 100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rupees_formatting() {
        assert_eq!(rupees(0), "Rs 0.00");
        assert_eq!(rupees(5), "Rs 0.05");
        assert_eq!(rupees(123_450), "Rs 1234.50");
        assert_eq!(rupees(-250), "-Rs 2.50");
    }

    #[test]
    fn test_notification_payload_roundtrips_through_listener_format() {
        let notification = Notification {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            kind: NotificationKind::Payout.as_str().to_string(),
            title: "Payout paid".to_string(),
            body: "Rs 500.00 sent to your bank".to_string(),
            is_read: false,
            created_at: chrono::Utc::now(),
        };

        let payload = serde_json::to_string(&notification).unwrap();
        assert!(payload.len() < MAX_PAYLOAD_BYTES);
        assert_eq!(serde_json::from_str::<Notification>(&payload).unwrap(), notification);
    }
}
