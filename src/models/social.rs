//! Social-media task and coin reward models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Youtube,
    Instagram,
    Facebook,
    Twitter,
    Telegram,
}

impl Platform {
    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Youtube => "youtube",
            Platform::Instagram => "instagram",
            Platform::Facebook => "facebook",
            Platform::Twitter => "twitter",
            Platform::Telegram => "telegram",
        }
    }
}

/// Something a member can do on a social platform for coins.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SocialTask {
    pub id: Uuid,
    pub platform: String,
    pub title: String,
    pub target_url: String,
    pub coin_reward: i64,
    pub is_active: bool,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

/// A task as listed to a member, with their own submission status if any.
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct TaskWithStatus {
    pub id: Uuid,
    pub platform: String,
    pub title: String,
    pub target_url: String,
    pub coin_reward: i64,
    pub action_status: Option<String>,
}

/// A member's claim that they completed a task.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SocialAction {
    pub id: Uuid,
    pub task_id: Uuid,
    pub user_id: Uuid,
    pub proof_url: String,
    pub status: String,
    pub coins_awarded: i64,
    pub reviewed_by: Option<Uuid>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Request body for `POST /api/admin/social/tasks`.
#[derive(Debug, Deserialize)]
pub struct CreateTaskRequest {
    pub platform: Platform,
    pub title: String,
    pub target_url: String,
    pub coin_reward: i64,
}

/// Request body for `POST /api/social/tasks/{id}/actions`.
#[derive(Debug, Deserialize)]
pub struct SubmitActionRequest {
    pub proof_url: String,
}

#[derive(Debug, Deserialize)]
pub struct ReviewActionRequest {
    pub decision: crate::models::user::ReviewDecision,
}
