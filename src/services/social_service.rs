//! Social-media tasks rewarded with coins.

use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    models::{
        fund::ReviewStatus,
        notification::NotificationKind,
        social::{CreateTaskRequest, SocialAction, SocialTask, TaskWithStatus},
        user::ReviewDecision,
        wallet::{LedgerReason, WalletKind},
    },
    services::{
        notification_service,
        wallet_service::{self, Movement},
    },
};

/// Accept only absolute http(s) URLs for task targets and proofs.
pub fn validate_link(value: &str) -> Result<(), AppError> {
    let parsed = url::Url::parse(value)
        .map_err(|_| AppError::InvalidRequest("Invalid URL format".to_string()))?;

    match parsed.scheme() {
        "http" | "https" if parsed.host_str().is_some() => Ok(()),
        _ => Err(AppError::InvalidRequest(
            "URL must use HTTP or HTTPS".to_string(),
        )),
    }
}

pub async fn create_task(
    pool: &DbPool,
    admin_id: Uuid,
    request: CreateTaskRequest,
) -> Result<SocialTask, AppError> {
    let title = request.title.trim();
    if title.is_empty() {
        return Err(AppError::InvalidRequest("Title is required".to_string()));
    }
    if request.coin_reward <= 0 {
        return Err(AppError::InvalidRequest(
            "Coin reward must be positive".to_string(),
        ));
    }
    validate_link(&request.target_url)?;

    let task = sqlx::query_as::<_, SocialTask>(
        r#"
        INSERT INTO social_tasks (platform, title, target_url, coin_reward, created_by)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(request.platform.as_str())
    .bind(title)
    .bind(&request.target_url)
    .bind(request.coin_reward)
    .bind(admin_id)
    .fetch_one(pool)
    .await?;

    tracing::info!(task_id = %task.id, platform = %task.platform, "Social task created");

    Ok(task)
}

pub async fn set_task_active(pool: &DbPool, task_id: Uuid, is_active: bool) -> Result<SocialTask, AppError> {
    sqlx::query_as::<_, SocialTask>("UPDATE social_tasks SET is_active = $2 WHERE id = $1 RETURNING *")
        .bind(task_id)
        .bind(is_active)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("Task"))
}

/// Active tasks, each with the caller's submission status if they have one.
pub async fn list_tasks(pool: &DbPool, user_id: Uuid) -> Result<Vec<TaskWithStatus>, AppError> {
    let tasks = sqlx::query_as::<_, TaskWithStatus>(
        r#"
        SELECT t.id, t.platform, t.title, t.target_url, t.coin_reward, a.status AS action_status
        FROM social_tasks t
        LEFT JOIN social_actions a ON a.task_id = t.id AND a.user_id = $1
        WHERE t.is_active = true
        ORDER BY t.created_at DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(tasks)
}

/// Claim a task. A user gets one action per task.
pub async fn submit_action(
    pool: &DbPool,
    user_id: Uuid,
    task_id: Uuid,
    proof_url: &str,
) -> Result<SocialAction, AppError> {
    validate_link(proof_url)?;

    let active: Option<bool> = sqlx::query_scalar("SELECT is_active FROM social_tasks WHERE id = $1")
        .bind(task_id)
        .fetch_optional(pool)
        .await?;
    if active != Some(true) {
        return Err(AppError::NotFound("Task"));
    }

    let action = sqlx::query_as::<_, SocialAction>(
        r#"
        INSERT INTO social_actions (task_id, user_id, proof_url)
        VALUES ($1, $2, $3)
        RETURNING *
        "#,
    )
    .bind(task_id)
    .bind(user_id)
    .bind(proof_url)
    .fetch_one(pool)
    .await
    .map_err(|e| AppError::from_unique_violation(e, "Task already submitted"))?;

    Ok(action)
}

pub async fn list_actions(pool: &DbPool, status: Option<&str>) -> Result<Vec<SocialAction>, AppError> {
    let actions = sqlx::query_as::<_, SocialAction>(
        r#"
        SELECT * FROM social_actions
        WHERE ($1::TEXT IS NULL OR status = $1)
        ORDER BY created_at
        LIMIT 500
        "#,
    )
    .bind(status)
    .fetch_all(pool)
    .await?;

    Ok(actions)
}

/// Approve or reject a pending action. Approval credits the task's coins.
pub async fn review_action(
    pool: &DbPool,
    admin_id: Uuid,
    action_id: Uuid,
    decision: ReviewDecision,
) -> Result<SocialAction, AppError> {
    let mut tx = pool.begin().await?;

    let action = sqlx::query_as::<_, SocialAction>("SELECT * FROM social_actions WHERE id = $1 FOR UPDATE")
        .bind(action_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(AppError::NotFound("Action"))?;

    if action.status != ReviewStatus::Pending.as_str() {
        return Err(AppError::Conflict(format!("Action is already {}", action.status)));
    }

    let task = sqlx::query_as::<_, SocialTask>("SELECT * FROM social_tasks WHERE id = $1")
        .bind(action.task_id)
        .fetch_one(&mut *tx)
        .await?;

    let (status, coins) = match decision {
        ReviewDecision::Approve => (ReviewStatus::Approved, task.coin_reward),
        ReviewDecision::Reject => (ReviewStatus::Rejected, 0),
    };

    let action = sqlx::query_as::<_, SocialAction>(
        r#"
        UPDATE social_actions
        SET status = $2, coins_awarded = $3, reviewed_by = $4, reviewed_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(action_id)
    .bind(status.as_str())
    .bind(coins)
    .bind(admin_id)
    .fetch_one(&mut *tx)
    .await?;

    if coins > 0 {
        wallet_service::credit(
            &mut tx,
            Movement::new(action.user_id, WalletKind::Coin, coins, LedgerReason::SocialReward)
                .reference(action.id)
                .describe(task.title.clone()),
        )
        .await?;
    }

    tx.commit().await?;

    tracing::info!(
        action_id = %action.id,
        admin_id = %admin_id,
        status = %action.status,
        coins = coins,
        "Social action reviewed"
    );

    let (title, body) = match decision {
        ReviewDecision::Approve => (
            "Task approved",
            format!("You earned {} coins for \"{}\"", coins, task.title),
        ),
        ReviewDecision::Reject => (
            "Task rejected",
            format!("Your submission for \"{}\" was not accepted", task.title),
        ),
    };
    notification_service::notify_best_effort(pool, action.user_id, NotificationKind::SocialReward, title, &body)
        .await;

    Ok(action)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{models::social::Platform, test_support::*};

    #[test]
    fn test_link_validation() {
        assert!(validate_link("https://youtube.com/watch?v=abc").is_ok());
        assert!(validate_link("http://instagram.com/p/xyz").is_ok());
        assert!(validate_link("ftp://example.com/file").is_err());
        assert!(validate_link("javascript:alert(1)").is_err());
        assert!(validate_link("not a url").is_err());
    }

    #[tokio::test]
    async fn test_action_reward_is_paid_once() {
        let Some(pool) = create_test_pool().await else {
            eprintln!("Skipping test - database not available");
            return;
        };
        let admin = insert_user(&pool, None).await;
        let member = insert_user(&pool, None).await;
        let task = create_task(
            &pool,
            admin,
            CreateTaskRequest {
                platform: Platform::Youtube,
                title: "Subscribe to the channel".to_string(),
                target_url: "https://youtube.com/@channel".to_string(),
                coin_reward: 25,
            },
        )
        .await
        .unwrap();

        let action = submit_action(&pool, member, task.id, "https://youtube.com/shot.png")
            .await
            .unwrap();
        let duplicate = submit_action(&pool, member, task.id, "https://youtube.com/shot.png").await;
        assert!(matches!(duplicate, Err(AppError::Conflict(_))));

        let (first, second) = tokio::join!(
            review_action(&pool, admin, action.id, ReviewDecision::Approve),
            review_action(&pool, admin, action.id, ReviewDecision::Approve),
        );

        assert_eq!(first.is_ok() as u8 + second.is_ok() as u8, 1);
        assert_eq!(wallet_of(&pool, member).await.coins, 25);
    }
}
