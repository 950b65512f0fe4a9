//! Withdrawal requests.

use axum::{
    Extension, Json,
    extract::{Query, State},
    http::StatusCode,
};

use crate::{
    error::AppError,
    middleware::auth::AuthUser,
    models::{
        otp::{OtpPurpose, OtpResponse},
        payout::{Payout, PayoutRequest},
        wallet::PageQuery,
    },
    services::{otp_service, payout_service, user_service},
    state::AppState,
};

/// Send a payout OTP to the caller's registered mobile.
///
/// # Endpoint
///
/// `POST /api/payouts/otp`
pub async fn request_otp(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<OtpResponse>, AppError> {
    let user = user_service::get_user(&state.pool, auth.user_id).await?;
    let (code, expires_at) =
        otp_service::issue(&state.pool, &state.config, &user.mobile, OtpPurpose::Payout).await?;

    Ok(Json(OtpResponse {
        sent: true,
        expires_at,
        code: state.config.otp_debug_echo.then_some(code),
    }))
}

/// Request a withdrawal from the commission wallet.
///
/// # Endpoint
///
/// `POST /api/payouts`
///
/// # Request Body
///
/// ```json
/// { "amount_paise": 100000, "otp": "493021" }
/// ```
///
/// # Response
///
/// - **201 Created**: pending payout with `fee_paise` and `net_paise`
/// - **400**: below the minimum, missing bank details, or bad OTP
/// - **403**: KYC not approved
/// - **422**: insufficient commission balance
pub async fn request_payout(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(request): Json<PayoutRequest>,
) -> Result<(StatusCode, Json<Payout>), AppError> {
    let payout = payout_service::request_payout(
        &state.pool,
        &state.config,
        auth.user_id,
        request.amount_paise,
        &request.otp,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(payout)))
}

/// `GET /api/payouts`
pub async fn my_payouts(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Vec<Payout>>, AppError> {
    Ok(Json(payout_service::my_payouts(&state.pool, auth.user_id, &page).await?))
}
