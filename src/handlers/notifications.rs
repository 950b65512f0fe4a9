//! Notification inbox and the live SSE stream.

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::{self, Stream, StreamExt};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::{
    error::AppError,
    middleware::auth::AuthUser,
    models::notification::{MarkReadResponse, Notification, NotificationQuery},
    services::{
        notification_hub::{ConnectionGuard, STREAM_BUFFER},
        notification_service,
    },
    state::AppState,
};

/// Live notifications as Server-Sent Events.
///
/// # Endpoint
///
/// `GET /api/notifications/stream?token=<jwt>`
///
/// # Events
///
/// - `connected`: sent once, data is the user id
/// - `notification`: one per notification, data is the JSON record
///
/// The stream stays registered in the hub until the client disconnects.
pub async fn stream(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let (tx, rx) = mpsc::channel::<Notification>(STREAM_BUFFER);
    let conn_id = state.hub.add_connection(auth.user_id, tx);
    let guard = ConnectionGuard::new(state.hub.clone(), auth.user_id, conn_id);

    let connected = stream::once(async move {
        Ok::<_, axum::Error>(
            Event::default()
                .event("connected")
                .data(auth.user_id.to_string()),
        )
    });

    // The guard rides along in the stream state and unregisters on drop.
    let updates = stream::unfold((rx, guard), |(mut rx, guard)| async move {
        let notification = rx.recv().await?;
        let event = Event::default().event("notification").json_data(&notification);
        Some((event, (rx, guard)))
    });

    Sse::new(connected.chain(updates)).keep_alive(KeepAlive::default())
}

/// `GET /api/notifications?unread_only=true&limit=50`
pub async fn list(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Query(query): Query<NotificationQuery>,
) -> Result<Json<Vec<Notification>>, AppError> {
    let notifications =
        notification_service::list(&state.pool, auth.user_id, query.unread_only, query.limit).await?;
    Ok(Json(notifications))
}

/// `POST /api/notifications/{id}/read`
pub async fn mark_read(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(notification_id): Path<Uuid>,
) -> Result<Json<MarkReadResponse>, AppError> {
    let updated = notification_service::mark_read(&state.pool, auth.user_id, notification_id).await?;
    Ok(Json(MarkReadResponse { updated }))
}

/// `POST /api/notifications/read-all`
pub async fn mark_all_read(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<MarkReadResponse>, AppError> {
    let updated = notification_service::mark_all_read(&state.pool, auth.user_id).await?;
    Ok(Json(MarkReadResponse { updated }))
}
