//! Social tasks for members.

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use uuid::Uuid;

use crate::{
    error::AppError,
    middleware::auth::AuthUser,
    models::social::{SocialAction, SubmitActionRequest, TaskWithStatus},
    services::social_service,
    state::AppState,
};

/// `GET /api/social/tasks`
pub async fn list_tasks(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Vec<TaskWithStatus>>, AppError> {
    Ok(Json(social_service::list_tasks(&state.pool, auth.user_id).await?))
}

/// Claim a task with a link proving it was done.
///
/// # Endpoint
///
/// `POST /api/social/tasks/{id}/actions`
///
/// # Request Body
///
/// ```json
/// { "proof_url": "https://instagram.com/p/abc123" }
/// ```
///
/// # Response
///
/// - **201 Created**: the pending action
/// - **409**: already submitted for this task
pub async fn submit_action(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(task_id): Path<Uuid>,
    Json(request): Json<SubmitActionRequest>,
) -> Result<(StatusCode, Json<SocialAction>), AppError> {
    let action =
        social_service::submit_action(&state.pool, auth.user_id, task_id, &request.proof_url).await?;
    Ok((StatusCode::CREATED, Json(action)))
}
