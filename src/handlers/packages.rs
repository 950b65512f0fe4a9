//! Package catalog, purchases and commission earnings.

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use uuid::Uuid;

use crate::{
    error::AppError,
    middleware::auth::AuthUser,
    models::{
        package::{Package, PackageDetail},
        purchase::{CommissionCredit, LevelEarnings, Purchase, PurchaseRequest, PurchaseResponse},
        wallet::PageQuery,
    },
    services::{commission_service, package_service, purchase_service},
    state::AppState,
};

/// `GET /api/packages`
pub async fn list_packages(State(state): State<AppState>) -> Result<Json<Vec<Package>>, AppError> {
    Ok(Json(package_service::list_active(&state.pool).await?))
}

/// `GET /api/packages/{id}`
pub async fn get_package(
    State(state): State<AppState>,
    Path(package_id): Path<Uuid>,
) -> Result<Json<PackageDetail>, AppError> {
    Ok(Json(package_service::get_package(&state.pool, package_id).await?))
}

/// Buy a package with main-wallet funds.
///
/// # Endpoint
///
/// `POST /api/purchases`
///
/// # Request Body
///
/// ```json
/// { "package_id": "550e8400-e29b-41d4-a716-446655440000" }
/// ```
///
/// # Response
///
/// - **201 Created**: the purchase and its commission distribution summary.
///   A `failed` distribution is reported in the body; the purchase stands
///   and is retried by the repair job.
/// - **404**: package missing or inactive
/// - **422**: insufficient main-wallet balance
///
/// ```json
/// {
///   "purchase": { "id": "...", "amount_paise": 100000, "distribution_status": "completed" },
///   "distribution": {
///     "purchase_id": "...",
///     "status": "completed",
///     "credits_created": 3,
///     "amount_distributed_paise": 17500,
///     "error": null
///   }
/// }
/// ```
pub async fn purchase(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(request): Json<PurchaseRequest>,
) -> Result<(StatusCode, Json<PurchaseResponse>), AppError> {
    let response = purchase_service::purchase_with_wallet(
        &state.pool,
        state.config.max_commission_levels,
        auth.user_id,
        request.package_id,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// `GET /api/purchases`
pub async fn my_purchases(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Vec<Purchase>>, AppError> {
    Ok(Json(purchase_service::my_purchases(&state.pool, auth.user_id, &page).await?))
}

/// `GET /api/commissions`
pub async fn my_commissions(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Vec<CommissionCredit>>, AppError> {
    let (limit, offset) = page.bounds();
    let credits = commission_service::my_commissions(&state.pool, auth.user_id, limit, offset).await?;
    Ok(Json(credits))
}

/// `GET /api/commissions/levels`
pub async fn earnings_by_level(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Vec<LevelEarnings>>, AppError> {
    Ok(Json(commission_service::earnings_by_level(&state.pool, auth.user_id).await?))
}
