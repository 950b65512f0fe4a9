//! Deposit requests.

use axum::{
    Extension, Json,
    extract::{Query, State},
    http::StatusCode,
};

use crate::{
    error::AppError,
    middleware::auth::AuthUser,
    models::{
        fund::{CreateFundRequest, FundRequest},
        wallet::PageQuery,
    },
    services::fund_service,
    state::AppState,
};

/// Ask for a main-wallet deposit backed by an out-of-band payment.
///
/// # Endpoint
///
/// `POST /api/funds`
///
/// # Request Body
///
/// ```json
/// {
///   "amount_paise": 500000,
///   "transaction_ref": "UPI-4122-9981",
///   "payment_method": "upi",
///   "proof_url": "https://files.example.com/proofs/4122.png"
/// }
/// ```
///
/// # Response
///
/// - **201 Created**: the pending request
/// - **409**: the transaction reference was already used
pub async fn request_funds(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(request): Json<CreateFundRequest>,
) -> Result<(StatusCode, Json<FundRequest>), AppError> {
    let fund_request = fund_service::request_funds(&state.pool, auth.user_id, request).await?;
    Ok((StatusCode::CREATED, Json(fund_request)))
}

/// `GET /api/funds`
pub async fn my_requests(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Vec<FundRequest>>, AppError> {
    Ok(Json(fund_service::my_requests(&state.pool, auth.user_id, &page).await?))
}
