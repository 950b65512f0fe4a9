//! Profile, referral network and KYC endpoints for the signed-in user.

use axum::{
    Extension, Json,
    extract::{Query, State},
};

use crate::{
    error::AppError,
    middleware::auth::AuthUser,
    models::{
        user::{KycSubmission, NetworkMember, ProfileResponse, TeamLevelCount, UserResponse},
        wallet::PageQuery,
    },
    services::user_service,
    state::AppState,
};

/// Current user with wallet balances.
///
/// # Endpoint
///
/// `GET /api/users/me`
///
/// # Response
///
/// ```json
/// {
///   "user": { "id": "...", "name": "Asha", "referral_code": "REF7KQ2M9XA", "kyc_status": "none" },
///   "wallet": { "main_paise": 150000, "commission_paise": 4200, "smart_paise": 0, "coins": 300 },
///   "direct_referrals": 4
/// }
/// ```
pub async fn me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<ProfileResponse>, AppError> {
    Ok(Json(user_service::me(&state.pool, auth.user_id).await?))
}

/// `GET /api/users/referrals`
pub async fn direct_referrals(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Vec<NetworkMember>>, AppError> {
    let members = user_service::direct_referrals(&state.pool, auth.user_id, &page).await?;
    Ok(Json(members))
}

/// `GET /api/users/upline`
pub async fn upline(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Vec<NetworkMember>>, AppError> {
    let members =
        user_service::upline(&state.pool, auth.user_id, state.config.max_commission_levels).await?;
    Ok(Json(members))
}

/// Downline head count per level.
///
/// # Endpoint
///
/// `GET /api/users/team`
///
/// # Response
///
/// ```json
/// [ { "level": 1, "members": 4 }, { "level": 2, "members": 11 } ]
/// ```
pub async fn team_summary(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Vec<TeamLevelCount>>, AppError> {
    let counts =
        user_service::team_summary(&state.pool, auth.user_id, state.config.max_commission_levels)
            .await?;
    Ok(Json(counts))
}

/// Submit or resubmit KYC details.
///
/// # Endpoint
///
/// `POST /api/users/kyc`
///
/// # Request Body
///
/// ```json
/// {
///   "pan_number": "ABCDE1234F",
///   "account_holder": "Asha Rao",
///   "account_number": "123456789012",
///   "ifsc_code": "SBIN0001234",
///   "document_url": "https://files.example.com/kyc/asha.pdf"
/// }
/// ```
///
/// # Response
///
/// - **200 OK**: user with `kyc_status: "submitted"`
/// - **400**: malformed PAN, IFSC or account number
/// - **409**: KYC already approved
pub async fn submit_kyc(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(submission): Json<KycSubmission>,
) -> Result<Json<UserResponse>, AppError> {
    let user = user_service::submit_kyc(&state.pool, auth.user_id, submission).await?;
    Ok(Json(user))
}
