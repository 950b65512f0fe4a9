//! Mobile/DTH recharge endpoints and the provider callback.

use axum::{
    Extension, Json,
    body::Bytes,
    extract::{Query, State},
    http::HeaderMap,
};
use serde::Deserialize;

use crate::{
    error::AppError,
    middleware::auth::AuthUser,
    models::{
        recharge::{Operator, Recharge, RechargeKind, RechargeRequest},
        wallet::PageQuery,
    },
    services::recharge_service,
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct OperatorQuery {
    pub kind: RechargeKind,
}

/// `GET /api/recharge/operators?kind=mobile`
pub async fn operators(Query(query): Query<OperatorQuery>) -> Json<&'static [Operator]> {
    Json(query.kind.operators())
}

/// Recharge a mobile number or DTH account from the smart wallet.
///
/// # Endpoint
///
/// `POST /api/recharge`
///
/// # Request Body
///
/// ```json
/// { "kind": "mobile", "operator": "JIO", "subscriber": "9876543210", "amount_paise": 29900 }
/// ```
///
/// # Response
///
/// The recharge record. `status` is `success`, `pending` (waiting on the
/// provider callback) or `failed` (already refunded).
///
/// - **422**: insufficient smart-wallet balance
/// - **503**: no provider configured
pub async fn recharge(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(request): Json<RechargeRequest>,
) -> Result<Json<Recharge>, AppError> {
    let provider = state
        .recharge_provider
        .as_deref()
        .ok_or(AppError::NotConfigured("Recharge provider"))?;

    let recharge = recharge_service::recharge(&state.pool, provider, auth.user_id, request).await?;
    Ok(Json(recharge))
}

/// `GET /api/recharge/history`
pub async fn my_recharges(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Vec<Recharge>>, AppError> {
    Ok(Json(recharge_service::my_recharges(&state.pool, auth.user_id, &page).await?))
}

/// Provider status callback.
///
/// # Endpoint
///
/// `POST /api/recharge/callback`
///
/// # Headers
///
/// `X-Signature: sha256=<hex HMAC-SHA256 of the raw body>`
///
/// The body is taken as raw bytes so the signature is checked against
/// exactly what was sent.
pub async fn callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Recharge>, AppError> {
    let signature = headers.get("X-Signature").and_then(|v| v.to_str().ok());
    let recharge =
        recharge_service::handle_callback(&state.pool, &state.config, signature, &body).await?;
    Ok(Json(recharge))
}
