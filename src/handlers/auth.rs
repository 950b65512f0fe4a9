//! Public signup, login and OTP endpoints.

use axum::{Json, extract::State, http::StatusCode};

use crate::{
    error::AppError,
    models::{
        otp::{OtpPurpose, OtpRequest, OtpResponse},
        recharge::is_valid_mobile,
        user::{AuthResponse, LoginRequest, SignupRequest},
    },
    services::{auth_service, otp_service},
    state::AppState,
};

/// Send a signup OTP to a mobile number.
///
/// # Endpoint
///
/// `POST /api/auth/otp`
///
/// # Request Body
///
/// ```json
/// { "destination": "9876543210", "purpose": "signup" }
/// ```
///
/// # Response
///
/// ```json
/// { "sent": true, "expires_at": "2025-01-01T10:10:00Z" }
/// ```
///
/// `code` is included only when `OTP_DEBUG_ECHO` is set.
pub async fn request_otp(
    State(state): State<AppState>,
    Json(request): Json<OtpRequest>,
) -> Result<Json<OtpResponse>, AppError> {
    if request.purpose != OtpPurpose::Signup {
        return Err(AppError::InvalidRequest(
            "Payout codes are requested from /api/payouts/otp".to_string(),
        ));
    }

    let destination = request
        .destination
        .as_deref()
        .map(str::trim)
        .filter(|d| is_valid_mobile(d))
        .ok_or_else(|| AppError::InvalidRequest("A valid mobile number is required".to_string()))?;

    let (code, expires_at) =
        otp_service::issue(&state.pool, &state.config, destination, OtpPurpose::Signup).await?;

    Ok(Json(OtpResponse {
        sent: true,
        expires_at,
        code: state.config.otp_debug_echo.then_some(code),
    }))
}

/// Register a new member under a sponsor.
///
/// # Endpoint
///
/// `POST /api/auth/signup`
///
/// # Response
///
/// - **201 Created**: session token and the new user
/// - **400**: invalid fields, unknown sponsor code, bad OTP
/// - **409**: email or mobile already registered
pub async fn signup(
    State(state): State<AppState>,
    Json(request): Json<SignupRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    let response = auth_service::signup(&state.pool, &state.config, request).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// `POST /api/auth/login`
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let response = auth_service::login(&state.pool, &state.config, request).await?;
    Ok(Json(response))
}
