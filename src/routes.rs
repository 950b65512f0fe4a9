//! Route table.
//!
//! Three groups share one state:
//! - public: health, signup/login/OTP, the signed provider callback
//! - user: everything under `/api` that needs a session token
//! - admin: `/api/admin/*`, session token plus the admin role

use axum::{
    Router,
    http::{HeaderValue, header::InvalidHeaderValue},
    middleware as axum_middleware,
    routing::{get, post, put},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    handlers::{
        admin, auth, funds, health, notifications, packages, payments, payouts, recharge, social,
        users, wallet,
    },
    middleware::auth::{require_admin, require_user},
    state::AppState,
};

/// CORS for the web client. Without a configured origin any origin is
/// allowed; tokens travel in headers, not cookies.
pub fn cors_layer(allowed_origin: Option<&str>) -> Result<CorsLayer, InvalidHeaderValue> {
    let layer = match allowed_origin {
        Some(origin) => CorsLayer::new().allow_origin(origin.parse::<HeaderValue>()?),
        None => CorsLayer::new().allow_origin(Any),
    };

    Ok(layer.allow_methods(Any).allow_headers(Any))
}

pub fn build_router(state: AppState, cors: CorsLayer) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/api/auth/otp", post(auth::request_otp))
        .route("/api/auth/signup", post(auth::signup))
        .route("/api/auth/login", post(auth::login))
        .route("/api/recharge/callback", post(recharge::callback));

    let user_routes = Router::new()
        // Profile and network
        .route("/api/users/me", get(users::me))
        .route("/api/users/referrals", get(users::direct_referrals))
        .route("/api/users/upline", get(users::upline))
        .route("/api/users/team", get(users::team_summary))
        .route("/api/users/kyc", post(users::submit_kyc))
        // Wallets
        .route("/api/wallet", get(wallet::balances))
        .route("/api/wallet/history", get(wallet::history))
        .route("/api/wallet/transfer/internal", post(wallet::transfer_internal))
        .route("/api/wallet/transfer/user", post(wallet::transfer_to_user))
        .route("/api/wallet/redeem-coins", post(wallet::redeem_coins))
        .route("/api/funds", post(funds::request_funds).get(funds::my_requests))
        // Packages, purchases, commissions
        .route("/api/packages", get(packages::list_packages))
        .route("/api/packages/{id}", get(packages::get_package))
        .route("/api/purchases", post(packages::purchase).get(packages::my_purchases))
        .route("/api/commissions", get(packages::my_commissions))
        .route("/api/commissions/levels", get(packages::earnings_by_level))
        .route("/api/payment/submit", post(payments::submit))
        .route("/api/payment/mine", get(payments::my_payments))
        // Payouts and recharges
        .route("/api/payouts/otp", post(payouts::request_otp))
        .route("/api/payouts", post(payouts::request_payout).get(payouts::my_payouts))
        .route("/api/recharge", post(recharge::recharge))
        .route("/api/recharge/operators", get(recharge::operators))
        .route("/api/recharge/history", get(recharge::my_recharges))
        // Social and notifications
        .route("/api/social/tasks", get(social::list_tasks))
        .route("/api/social/tasks/{id}/actions", post(social::submit_action))
        .route("/api/notifications", get(notifications::list))
        .route("/api/notifications/stream", get(notifications::stream))
        .route("/api/notifications/read-all", post(notifications::mark_all_read))
        .route("/api/notifications/{id}/read", post(notifications::mark_read))
        .route_layer(axum_middleware::from_fn_with_state(state.clone(), require_user));

    let admin_routes = Router::new()
        .route("/api/admin/users", get(admin::list_users))
        .route("/api/admin/users/{id}/active", put(admin::set_user_active))
        .route("/api/admin/kyc", get(admin::list_pending_kyc))
        .route("/api/admin/kyc/{id}/review", post(admin::review_kyc))
        .route("/api/admin/funds", get(admin::list_fund_requests))
        .route("/api/admin/funds/{id}/approve", post(admin::approve_fund_request))
        .route("/api/admin/funds/{id}/reject", post(admin::reject_fund_request))
        .route("/api/admin/wallet/credit", post(admin::admin_credit))
        .route("/api/admin/packages", post(admin::create_package))
        .route("/api/admin/packages/{id}/levels", put(admin::update_package_levels))
        .route("/api/admin/packages/{id}/active", put(admin::set_package_active))
        .route("/api/admin/payments", get(admin::list_payments))
        .route("/api/admin/payments/{id}/approve", post(admin::approve_payment))
        .route("/api/admin/payments/{id}/reject", post(admin::reject_payment))
        .route("/api/admin/payouts", get(admin::list_payouts))
        .route("/api/admin/payouts/{id}/approve", post(admin::approve_payout))
        .route("/api/admin/payouts/{id}/reject", post(admin::reject_payout))
        .route("/api/admin/commissions/incomplete", get(admin::list_incomplete_distributions))
        .route("/api/admin/commissions/repair", post(admin::repair_distributions))
        .route("/api/admin/commissions/{id}", get(admin::distribution_status))
        .route("/api/admin/social/tasks", post(admin::create_task))
        .route("/api/admin/social/tasks/{id}/active", put(admin::set_task_active))
        .route("/api/admin/social/actions", get(admin::list_actions))
        .route("/api/admin/social/actions/{id}/review", post(admin::review_action))
        .route("/api/admin/notifications/stats", get(admin::stream_stats))
        // Layers run outside-in: authenticate first, then check the role.
        .route_layer(axum_middleware::from_fn(require_admin))
        .route_layer(axum_middleware::from_fn_with_state(state.clone(), require_user));

    Router::new()
        .merge(public_routes)
        .merge(user_routes)
        .merge(admin_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    use super::*;
    use crate::{config::Config, services::notification_hub::NotificationHub};

    fn test_router() -> Router {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://localhost/unused")
            .unwrap();
        let state = AppState {
            pool,
            config: Arc::new(Config::for_tests()),
            hub: Arc::new(NotificationHub::new()),
            recharge_provider: None,
        };
        build_router(state, cors_layer(None).unwrap())
    }

    async fn status_of(request: Request<Body>) -> StatusCode {
        test_router().oneshot(request).await.unwrap().status()
    }

    #[tokio::test]
    async fn test_user_routes_require_token() {
        for uri in ["/api/users/me", "/api/wallet", "/api/commissions", "/api/notifications/stream"] {
            let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
            assert_eq!(status_of(request).await, StatusCode::UNAUTHORIZED, "{uri}");
        }
    }

    #[tokio::test]
    async fn test_admin_routes_require_token() {
        let request = Request::builder()
            .method("POST")
            .uri("/api/admin/commissions/repair")
            .body(Body::empty())
            .unwrap();
        assert_eq!(status_of(request).await, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_forged_token_rejected() {
        let request = Request::builder()
            .uri("/api/users/me")
            .header("Authorization", "Bearer not.a.jwt")
            .body(Body::empty())
            .unwrap();
        assert_eq!(status_of(request).await, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_unsigned_callback_rejected() {
        let request = Request::builder()
            .method("POST")
            .uri("/api/recharge/callback")
            .header("Content-Type", "application/json")
            .body(Body::from(r#"{"client_ref":"RC1","status":"success"}"#))
            .unwrap();
        assert_eq!(status_of(request).await, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_unknown_route_is_not_found() {
        let request = Request::builder().uri("/api/nope").body(Body::empty()).unwrap();
        assert_eq!(status_of(request).await, StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_cors_origin_must_be_a_header_value() {
        assert!(cors_layer(Some("https://app.example.com")).is_ok());
        assert!(cors_layer(Some("bad\norigin")).is_err());
    }
}
