//! Admin endpoints. Every route here sits behind `require_user` and
//! `require_admin`.

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    error::AppError,
    middleware::auth::AuthUser,
    models::{
        fund::{FundRequest, RejectRequest, StatusFilter},
        package::{CreatePackageRequest, Package, PackageDetail, UpdateLevelsRequest},
        payment::PaymentVerification,
        payout::{ApprovePayoutRequest, Payout},
        purchase::{DistributionAudit, Purchase, PurchaseResponse, RepairReport},
        social::{CreateTaskRequest, ReviewActionRequest, SocialAction, SocialTask},
        user::{KycReviewItem, KycReviewRequest, SetActiveRequest, UserResponse},
        wallet::{AdminCreditRequest, PageQuery, WalletTransaction},
    },
    services::{
        commission_service, fund_service, package_service, payment_service, payout_service,
        social_service, user_service, wallet_service,
    },
    state::AppState,
};

// Users and KYC

/// `GET /api/admin/users`
pub async fn list_users(
    State(state): State<AppState>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Vec<UserResponse>>, AppError> {
    Ok(Json(user_service::list_users(&state.pool, &page).await?))
}

/// Activate or deactivate a member.
///
/// # Endpoint
///
/// `PUT /api/admin/users/{id}/active`
///
/// # Request Body
///
/// ```json
/// { "is_active": false }
/// ```
///
/// Inactive members cannot sign in and earn no commission while inactive.
pub async fn set_user_active(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(user_id): Path<Uuid>,
    Json(request): Json<SetActiveRequest>,
) -> Result<Json<UserResponse>, AppError> {
    let user =
        user_service::set_user_active(&state.pool, auth.user_id, user_id, request.is_active).await?;
    Ok(Json(user))
}

/// `GET /api/admin/kyc`
pub async fn list_pending_kyc(
    State(state): State<AppState>,
) -> Result<Json<Vec<KycReviewItem>>, AppError> {
    Ok(Json(user_service::list_pending_kyc(&state.pool).await?))
}

/// `POST /api/admin/kyc/{user_id}/review`
///
/// ```json
/// { "decision": "reject", "note": "PAN image unreadable" }
/// ```
pub async fn review_kyc(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(user_id): Path<Uuid>,
    Json(request): Json<KycReviewRequest>,
) -> Result<Json<UserResponse>, AppError> {
    let user =
        user_service::review_kyc(&state.pool, auth.user_id, user_id, request.decision, request.note)
            .await?;
    Ok(Json(user))
}

// Funds and wallets

/// `GET /api/admin/funds?status=pending`
pub async fn list_fund_requests(
    State(state): State<AppState>,
    Query(filter): Query<StatusFilter>,
) -> Result<Json<Vec<FundRequest>>, AppError> {
    Ok(Json(fund_service::list(&state.pool, filter.status.as_deref()).await?))
}

/// Approve a deposit and credit the member's main wallet.
///
/// # Endpoint
///
/// `POST /api/admin/funds/{id}/approve`
///
/// # Response
///
/// - **200 OK**: the approved request
/// - **409**: the request was already reviewed
pub async fn approve_fund_request(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(request_id): Path<Uuid>,
) -> Result<Json<FundRequest>, AppError> {
    Ok(Json(fund_service::approve(&state.pool, auth.user_id, request_id).await?))
}

/// `POST /api/admin/funds/{id}/reject`
pub async fn reject_fund_request(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(request_id): Path<Uuid>,
    Json(request): Json<RejectRequest>,
) -> Result<Json<FundRequest>, AppError> {
    let fund_request =
        fund_service::reject(&state.pool, auth.user_id, request_id, &request.reason).await?;
    Ok(Json(fund_request))
}

/// Credit any wallet of a member directly.
///
/// # Endpoint
///
/// `POST /api/admin/wallet/credit`
///
/// # Request Body
///
/// ```json
/// { "user_id": "...", "wallet": "smart", "amount": 10000, "note": "Goodwill credit" }
/// ```
///
/// For the coin wallet `amount` is a coin count; otherwise it is paise.
pub async fn admin_credit(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(request): Json<AdminCreditRequest>,
) -> Result<(StatusCode, Json<WalletTransaction>), AppError> {
    let entry = wallet_service::admin_credit(
        &state.pool,
        auth.user_id,
        request.user_id,
        request.wallet,
        request.amount,
        request.note,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

// Packages

/// Create a package with its commission table.
///
/// # Endpoint
///
/// `POST /api/admin/packages`
///
/// # Request Body
///
/// ```json
/// {
///   "name": "Starter",
///   "description": "Entry package",
///   "price_paise": 100000,
///   "levels": [
///     { "level": 1, "kind": "percent", "value": 1000 },
///     { "level": 2, "kind": "fixed", "value": 5000 }
///   ]
/// }
/// ```
///
/// # Response
///
/// - **201 Created**: package with levels and total commission
/// - **400**: duplicate or out-of-range levels, or total above price
pub async fn create_package(
    State(state): State<AppState>,
    Json(request): Json<CreatePackageRequest>,
) -> Result<(StatusCode, Json<PackageDetail>), AppError> {
    let detail =
        package_service::create_package(&state.pool, state.config.max_commission_levels, request)
            .await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

/// `PUT /api/admin/packages/{id}/levels`
pub async fn update_package_levels(
    State(state): State<AppState>,
    Path(package_id): Path<Uuid>,
    Json(request): Json<UpdateLevelsRequest>,
) -> Result<Json<PackageDetail>, AppError> {
    let detail = package_service::update_levels(
        &state.pool,
        state.config.max_commission_levels,
        package_id,
        request.levels,
    )
    .await?;
    Ok(Json(detail))
}

/// `PUT /api/admin/packages/{id}/active`
pub async fn set_package_active(
    State(state): State<AppState>,
    Path(package_id): Path<Uuid>,
    Json(request): Json<SetActiveRequest>,
) -> Result<Json<Package>, AppError> {
    let package = package_service::set_active(&state.pool, package_id, request.is_active).await?;
    Ok(Json(package))
}

// Payment verifications

/// `GET /api/admin/payments?status=pending`
pub async fn list_payments(
    State(state): State<AppState>,
    Query(filter): Query<StatusFilter>,
) -> Result<Json<Vec<PaymentVerification>>, AppError> {
    Ok(Json(payment_service::list(&state.pool, filter.status.as_deref()).await?))
}

/// Approve a payment: creates the purchase and distributes commissions.
///
/// # Endpoint
///
/// `POST /api/admin/payments/{id}/approve`
///
/// # Response
///
/// - **200 OK**: the purchase and distribution summary
/// - **409**: already reviewed
/// - **500**: distribution failed; the verification is back to `pending`
///   and can be approved again
pub async fn approve_payment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(verification_id): Path<Uuid>,
) -> Result<Json<PurchaseResponse>, AppError> {
    let response = payment_service::approve(
        &state.pool,
        state.config.max_commission_levels,
        auth.user_id,
        verification_id,
    )
    .await?;
    Ok(Json(response))
}

/// `POST /api/admin/payments/{id}/reject`
pub async fn reject_payment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(verification_id): Path<Uuid>,
    Json(request): Json<RejectRequest>,
) -> Result<Json<PaymentVerification>, AppError> {
    let verification =
        payment_service::reject(&state.pool, auth.user_id, verification_id, &request.reason).await?;
    Ok(Json(verification))
}

// Payouts

/// `GET /api/admin/payouts?status=pending`
pub async fn list_payouts(
    State(state): State<AppState>,
    Query(filter): Query<StatusFilter>,
) -> Result<Json<Vec<Payout>>, AppError> {
    Ok(Json(payout_service::list(&state.pool, filter.status.as_deref()).await?))
}

/// Mark a payout as paid after the bank transfer went out.
///
/// # Endpoint
///
/// `POST /api/admin/payouts/{id}/approve`
///
/// ```json
/// { "payment_reference": "NEFT/2025/000123" }
/// ```
pub async fn approve_payout(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(payout_id): Path<Uuid>,
    Json(request): Json<ApprovePayoutRequest>,
) -> Result<Json<Payout>, AppError> {
    let payout =
        payout_service::approve(&state.pool, auth.user_id, payout_id, &request.payment_reference)
            .await?;
    Ok(Json(payout))
}

/// `POST /api/admin/payouts/{id}/reject` - refunds the held amount.
pub async fn reject_payout(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(payout_id): Path<Uuid>,
    Json(request): Json<RejectRequest>,
) -> Result<Json<Payout>, AppError> {
    let payout = payout_service::reject(&state.pool, auth.user_id, payout_id, &request.reason).await?;
    Ok(Json(payout))
}

// Commission audit

/// `GET /api/admin/commissions/{purchase_id}`
pub async fn distribution_status(
    State(state): State<AppState>,
    Path(purchase_id): Path<Uuid>,
) -> Result<Json<DistributionAudit>, AppError> {
    let audit =
        commission_service::audit(&state.pool, state.config.max_commission_levels, purchase_id)
            .await?;
    Ok(Json(audit))
}

/// `GET /api/admin/commissions/incomplete`
pub async fn list_incomplete_distributions(
    State(state): State<AppState>,
) -> Result<Json<Vec<Purchase>>, AppError> {
    Ok(Json(commission_service::list_incomplete(&state.pool).await?))
}

/// Re-run distribution for every pending or failed purchase.
///
/// # Endpoint
///
/// `POST /api/admin/commissions/repair`
///
/// # Response
///
/// ```json
/// { "examined": 2, "completed": 2, "failed": 0, "results": [ ... ] }
/// ```
pub async fn repair_distributions(
    State(state): State<AppState>,
) -> Result<Json<RepairReport>, AppError> {
    let report = commission_service::repair(&state.pool, state.config.max_commission_levels).await?;
    Ok(Json(report))
}

// Social tasks

/// `POST /api/admin/social/tasks`
pub async fn create_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(request): Json<CreateTaskRequest>,
) -> Result<(StatusCode, Json<SocialTask>), AppError> {
    let task = social_service::create_task(&state.pool, auth.user_id, request).await?;
    Ok((StatusCode::CREATED, Json(task)))
}

/// `PUT /api/admin/social/tasks/{id}/active`
pub async fn set_task_active(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
    Json(request): Json<SetActiveRequest>,
) -> Result<Json<SocialTask>, AppError> {
    Ok(Json(social_service::set_task_active(&state.pool, task_id, request.is_active).await?))
}

/// `GET /api/admin/social/actions?status=pending`
pub async fn list_actions(
    State(state): State<AppState>,
    Query(filter): Query<StatusFilter>,
) -> Result<Json<Vec<SocialAction>>, AppError> {
    Ok(Json(social_service::list_actions(&state.pool, filter.status.as_deref()).await?))
}

/// `POST /api/admin/social/actions/{id}/review`
///
/// Approval credits the task's coins to the member, once.
pub async fn review_action(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(action_id): Path<Uuid>,
    Json(request): Json<ReviewActionRequest>,
) -> Result<Json<SocialAction>, AppError> {
    let action =
        social_service::review_action(&state.pool, auth.user_id, action_id, request.decision).await?;
    Ok(Json(action))
}

// Live connections

#[derive(Debug, Serialize)]
pub struct StreamStats {
    pub users: usize,
    pub streams: usize,
}

/// `GET /api/admin/notifications/stats` - open SSE streams on this instance.
pub async fn stream_stats(State(state): State<AppState>) -> Json<StreamStats> {
    let (users, streams) = state.hub.stats();
    Json(StreamStats { users, streams })
}
