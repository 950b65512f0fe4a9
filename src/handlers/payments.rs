//! Manual payment submissions for package purchases.

use axum::{
    Extension, Json,
    extract::{Query, State},
    http::StatusCode,
};

use crate::{
    error::AppError,
    middleware::auth::AuthUser,
    models::{
        payment::{PaymentVerification, SubmitPaymentRequest},
        wallet::PageQuery,
    },
    services::payment_service,
    state::AppState,
};

/// Submit proof of an external payment for a package.
///
/// # Endpoint
///
/// `POST /api/payment/submit`
///
/// # Request Body
///
/// ```json
/// {
///   "package_id": "550e8400-e29b-41d4-a716-446655440000",
///   "transaction_ref": "UTR998877665544",
///   "proof_url": "https://files.example.com/proofs/utr.png"
/// }
/// ```
///
/// The amount is always the package price. An admin approval creates the
/// purchase and pays commissions.
pub async fn submit(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(request): Json<SubmitPaymentRequest>,
) -> Result<(StatusCode, Json<PaymentVerification>), AppError> {
    let verification = payment_service::submit(&state.pool, auth.user_id, request).await?;
    Ok((StatusCode::CREATED, Json(verification)))
}

/// `GET /api/payment/mine`
pub async fn my_payments(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Vec<PaymentVerification>>, AppError> {
    Ok(Json(payment_service::my_payments(&state.pool, auth.user_id, &page).await?))
}
