//! Wallet balances, ledger and transfers.

use axum::{
    Extension, Json,
    extract::{Query, State},
};

use crate::{
    error::AppError,
    middleware::auth::AuthUser,
    models::wallet::{
        HistoryQuery, InternalTransferRequest, PeerTransferRequest, PeerTransferResponse,
        RedeemCoinsRequest, RedeemCoinsResponse, Wallet, WalletTransaction,
    },
    services::wallet_service,
    state::AppState,
};

/// `GET /api/wallet`
pub async fn balances(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Wallet>, AppError> {
    Ok(Json(wallet_service::get_wallet(&state.pool, auth.user_id).await?))
}

/// Ledger entries, newest first.
///
/// # Endpoint
///
/// `GET /api/wallet/history?wallet=commission&limit=50&offset=0`
///
/// `wallet` is optional; without it every wallet is listed.
pub async fn history(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<WalletTransaction>>, AppError> {
    let (limit, offset) = query.bounds();
    let entries =
        wallet_service::history(&state.pool, auth.user_id, query.wallet, limit, offset).await?;
    Ok(Json(entries))
}

/// Move money between the caller's own wallets.
///
/// # Endpoint
///
/// `POST /api/wallet/transfer/internal`
///
/// # Response
///
/// - **200 OK**: wallet balances after the move
/// - **400**: move not allowed (only commission->main, commission->smart, main->smart)
/// - **422**: insufficient balance
pub async fn transfer_internal(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(request): Json<InternalTransferRequest>,
) -> Result<Json<Wallet>, AppError> {
    let wallet = wallet_service::transfer_internal(
        &state.pool,
        auth.user_id,
        request.from,
        request.to,
        request.amount_paise,
    )
    .await?;
    Ok(Json(wallet))
}

/// Send main-wallet funds to another member by referral code.
///
/// # Endpoint
///
/// `POST /api/wallet/transfer/user`
///
/// Repeating a request with the same `idempotency_key` returns the
/// original result without moving money again.
pub async fn transfer_to_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(request): Json<PeerTransferRequest>,
) -> Result<Json<PeerTransferResponse>, AppError> {
    let response = wallet_service::transfer_to_user(
        &state.pool,
        auth.user_id,
        &request.recipient_code,
        request.amount_paise,
        request.note,
        request.idempotency_key,
    )
    .await?;
    Ok(Json(response))
}

/// `POST /api/wallet/redeem-coins`
pub async fn redeem_coins(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(request): Json<RedeemCoinsRequest>,
) -> Result<Json<RedeemCoinsResponse>, AppError> {
    let response = wallet_service::redeem_coins(
        &state.pool,
        auth.user_id,
        request.coins,
        state.config.coins_per_rupee,
    )
    .await?;
    Ok(Json(response))
}
