//! Session token authentication middleware.
//!
//! This middleware intercepts every protected request to:
//! 1. Extract the JWT from the Authorization header (or `?token=` for EventSource)
//! 2. Verify its signature and expiry
//! 3. Confirm the user still exists and is active
//! 4. Inject `AuthUser` into the request, or reject with HTTP 401

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::{error::AppError, models::user::Role, services::auth_service, state::AppState};

/// Identity attached to authenticated requests.
///
/// Handlers extract it with `Extension<AuthUser>`.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub role: Role,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Pull the raw token from the request.
///
/// Browsers cannot set headers on an `EventSource`, so the notification
/// stream passes the token as a query parameter instead.
pub fn extract_token(request: &Request) -> Option<String> {
    if let Some(header) = request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
    {
        return header.strip_prefix("Bearer ").map(|t| t.trim().to_string());
    }

    request.uri().query().and_then(|query| {
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(key, _)| key == "token")
            .map(|(_, value)| value.into_owned())
    })
}

/// JWT authentication middleware.
///
/// # Headers
///
/// ```text
/// Authorization: Bearer <jwt>
/// ```
///
/// # Returns
///
/// - `Ok(Response)` when the token is valid and the user is active
/// - `Err(AppError::Unauthorized)` otherwise (401)
pub async fn require_user(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = extract_token(&request).ok_or(AppError::Unauthorized)?;
    let claims = auth_service::verify_token(&state.config.jwt_secret, &token)?;
    let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AppError::Unauthorized)?;

    // Role and status come from the database so deactivation and
    // promotion apply to tokens already issued.
    let row: Option<(String, bool)> = sqlx::query_as("SELECT role, is_active FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(&state.pool)
        .await?;

    let (role, is_active) = row.ok_or(AppError::Unauthorized)?;
    if !is_active {
        return Err(AppError::Unauthorized);
    }
    let role = Role::parse(&role).ok_or(AppError::Unauthorized)?;

    request.extensions_mut().insert(AuthUser {
        user_id,
        role,
    });

    Ok(next.run(request).await)
}

/// Admin gate. Must run after `require_user`.
pub async fn require_admin(request: Request, next: Next) -> Result<Response, AppError> {
    let auth = request
        .extensions()
        .get::<AuthUser>()
        .copied()
        .ok_or(AppError::Unauthorized)?;

    if !auth.is_admin() {
        tracing::warn!(user_id = %auth.user_id, path = %request.uri().path(), "Non-admin hit admin route");
        return Err(AppError::Forbidden);
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn request(uri: &str, auth: Option<&str>) -> Request {
        let mut builder = axum::http::Request::builder().uri(uri);
        if let Some(value) = auth {
            builder = builder.header("Authorization", value);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn test_token_from_bearer_header() {
        let req = request("/api/users/me", Some("Bearer abc.def.ghi"));
        assert_eq!(extract_token(&req).as_deref(), Some("abc.def.ghi"));
    }

    #[test]
    fn test_token_from_query_string() {
        let req = request("/api/notifications/stream?token=abc.def.ghi&x=1", None);
        assert_eq!(extract_token(&req).as_deref(), Some("abc.def.ghi"));
    }

    #[test]
    fn test_non_bearer_header_is_not_a_token() {
        let req = request("/api/users/me?token=ignored", Some("Basic dXNlcjpwYXNz"));
        assert_eq!(extract_token(&req), None);
        assert_eq!(extract_token(&request("/api/users/me", None)), None);
    }
}
