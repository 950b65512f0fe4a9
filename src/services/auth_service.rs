//! Signup, login and session tokens.
//!
//! Passwords are hashed with Argon2id. Sessions are HS256 JWTs carrying the
//! user id and role.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::{Rng, distr::Alphanumeric};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    config::Config,
    db::DbPool,
    error::AppError,
    models::{
        notification::NotificationKind,
        otp::OtpPurpose,
        recharge::is_valid_mobile,
        user::{AuthResponse, LoginRequest, Role, SignupRequest, USER_COLUMNS, User},
    },
    services::{notification_service, otp_service, wallet_service},
};

/// JWT claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: String,
    pub role: Role,
    pub exp: usize,
    pub iat: usize,
}

pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("Hashing failed: {}", e)))
}

pub fn verify_password(password: &str, password_hash: &str) -> bool {
    PasswordHash::new(password_hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

/// Sign a session token for `user_id`.
pub fn issue_token(
    secret: &str,
    ttl_hours: i64,
    user_id: Uuid,
    role: Role,
) -> Result<(String, DateTime<Utc>), AppError> {
    let now = Utc::now();
    let expires_at = now + Duration::hours(ttl_hours);

    let claims = Claims {
        sub: user_id.to_string(),
        role,
        exp: expires_at.timestamp() as usize,
        iat: now.timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("Failed to generate token: {}", e)))?;

    Ok((token, expires_at))
}

/// Check signature and expiry, returning the claims.
pub fn verify_token(secret: &str, token: &str) -> Result<Claims, AppError> {
    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    let validation = Validation::new(Algorithm::HS256);
    decode::<Claims>(token, &decoding_key, &validation)
        .map(|data| data.claims)
        .map_err(|_| AppError::Unauthorized)
}

/// `REF` followed by eight upper-case letters or digits.
pub fn generate_referral_code() -> String {
    let suffix: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(|b| (b as char).to_ascii_uppercase())
        .collect();
    format!("REF{}", suffix)
}

/// Field checks for a signup request, before touching the database.
pub fn validate_signup(request: &SignupRequest) -> Result<(), AppError> {
    let name = request.name.trim();
    if name.is_empty() || name.len() > 100 {
        return Err(AppError::InvalidRequest(
            "Name must be 1-100 characters".to_string(),
        ));
    }

    let email = request.email.trim();
    let valid_email = email.len() <= 254
        && email
            .split_once('@')
            .map(|(local, domain)| !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.'))
            .unwrap_or(false);
    if !valid_email {
        return Err(AppError::InvalidRequest("Invalid email address".to_string()));
    }

    if !is_valid_mobile(request.mobile.trim()) {
        return Err(AppError::InvalidRequest(
            "Mobile number must be 10 digits starting with 6-9".to_string(),
        ));
    }

    if request.password.len() < 8 {
        return Err(AppError::InvalidRequest(
            "Password must be at least 8 characters".to_string(),
        ));
    }

    Ok(())
}

/// Register a member under their sponsor.
///
/// # Process
///
/// 1. Validate fields and (if enabled) the signup OTP
/// 2. Resolve the sponsor from the referral code
/// 3. Insert user and empty wallet in one transaction
/// 4. Notify the sponsor, return a session token
pub async fn signup(
    pool: &DbPool,
    config: &Config,
    request: SignupRequest,
) -> Result<AuthResponse, AppError> {
    validate_signup(&request)?;

    let email = request.email.trim().to_lowercase();
    let mobile = request.mobile.trim().to_string();

    if config.require_signup_otp {
        let code = request
            .otp
            .as_deref()
            .ok_or_else(|| AppError::InvalidRequest("OTP is required".to_string()))?;
        otp_service::verify(pool, config, &mobile, OtpPurpose::Signup, code).await?;
    }

    let sponsor = match request.sponsor_code.as_deref().map(str::trim) {
        Some(code) if !code.is_empty() => Some(
            sqlx::query_as::<_, User>(&format!(
                "SELECT {USER_COLUMNS} FROM users WHERE referral_code = $1 AND is_active = true"
            ))
            .bind(code.to_uppercase())
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| AppError::InvalidRequest("Unknown sponsor code".to_string()))?,
        ),
        _ if config.require_sponsor => {
            return Err(AppError::InvalidRequest(
                "Sponsor code is required".to_string(),
            ));
        }
        _ => None,
    };

    let password_hash = hash_password(&request.password)?;

    let mut tx = pool.begin().await?;
    let user = insert_user(
        &mut tx,
        request.name.trim(),
        &email,
        &mobile,
        &password_hash,
        sponsor.as_ref().map(|s| s.id),
        Role::User,
    )
    .await?;
    wallet_service::create_wallet(&mut tx, user.id).await?;
    tx.commit().await?;

    tracing::info!(
        user_id = %user.id,
        sponsor_id = ?user.sponsor_id,
        "User signed up"
    );

    if let Some(sponsor) = sponsor {
        notification_service::notify_best_effort(
            pool,
            sponsor.id,
            NotificationKind::NewReferral,
            "New referral",
            &format!("{} joined with your referral code", user.name),
        )
        .await;
    }

    let (token, expires_at) =
        issue_token(&config.jwt_secret, config.jwt_ttl_hours, user.id, Role::User)?;

    Ok(AuthResponse {
        token,
        expires_at,
        user: user.into(),
    })
}

/// Insert a user with a fresh referral code, retrying on the rare code collision.
async fn insert_user(
    conn: &mut sqlx::PgConnection,
    name: &str,
    email: &str,
    mobile: &str,
    password_hash: &str,
    sponsor_id: Option<Uuid>,
    role: Role,
) -> Result<User, AppError> {
    const ATTEMPTS: usize = 3;

    for _ in 0..ATTEMPTS {
        let code = generate_referral_code();
        let inserted = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (name, email, mobile, password_hash, referral_code, sponsor_id, role)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (referral_code) DO NOTHING
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(name)
        .bind(email)
        .bind(mobile)
        .bind(password_hash)
        .bind(&code)
        .bind(sponsor_id)
        .bind(role.as_str())
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| AppError::from_unique_violation(e, "Email or mobile already registered"))?;

        if let Some(user) = inserted {
            return Ok(user);
        }
    }

    Err(AppError::Internal(
        "Could not allocate a unique referral code".to_string(),
    ))
}

/// Authenticate by email or mobile and password.
pub async fn login(
    pool: &DbPool,
    config: &Config,
    request: LoginRequest,
) -> Result<AuthResponse, AppError> {
    let login = request.login.trim().to_lowercase();

    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE email = $1 OR mobile = $1"
    ))
    .bind(&login)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::Unauthorized)?;

    if !verify_password(&request.password, &user.password_hash) {
        tracing::info!(user_id = %user.id, "Failed login attempt");
        return Err(AppError::Unauthorized);
    }

    if !user.is_active {
        return Err(AppError::Forbidden);
    }

    let role = Role::parse(&user.role).unwrap_or(Role::User);
    let (token, expires_at) =
        issue_token(&config.jwt_secret, config.jwt_ttl_hours, user.id, role)?;

    Ok(AuthResponse {
        token,
        expires_at,
        user: user.into(),
    })
}

/// Create the configured admin account on first start. It becomes the root
/// of the sponsor tree.
pub async fn bootstrap_admin(pool: &DbPool, config: &Config) -> Result<(), AppError> {
    let (Some(email), Some(password)) = (
        config.bootstrap_admin_email.as_deref(),
        config.bootstrap_admin_password.as_deref(),
    ) else {
        return Ok(());
    };

    let email = email.trim().to_lowercase();
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)")
        .bind(&email)
        .fetch_one(pool)
        .await?;
    if exists {
        return Ok(());
    }

    let password_hash = hash_password(password)?;

    let mut tx = pool.begin().await?;
    // Admins sign in by email; the placeholder mobile only satisfies uniqueness.
    let admin = insert_user(
        &mut tx,
        "Administrator",
        &email,
        "0000000000",
        &password_hash,
        None,
        Role::Admin,
    )
    .await?;
    wallet_service::create_wallet(&mut tx, admin.id).await?;
    tx.commit().await?;

    tracing::info!(user_id = %admin.id, referral_code = %admin.referral_code, "Bootstrap admin created");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signup_request() -> SignupRequest {
        SignupRequest {
            name: "Asha".to_string(),
            email: "asha@example.com".to_string(),
            mobile: "9876543210".to_string(),
            password: "correct horse".to_string(),
            sponsor_code: Some("REFABCDEFGH".to_string()),
            otp: None,
        }
    }

    #[test]
    fn test_password_hash_and_verify() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("wrong horse", &hash));
        assert!(!verify_password("correct horse", "not-a-phc-string"));
    }

    #[test]
    fn test_token_roundtrip_carries_identity() {
        let user_id = Uuid::new_v4();
        let (token, expires_at) = issue_token("secret", 24, user_id, Role::Admin).unwrap();
        assert!(expires_at > Utc::now());

        let claims = verify_token("secret", &token).unwrap();
        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.role, Role::Admin);
    }

    #[test]
    fn test_token_with_wrong_secret_rejected() {
        let (token, _) = issue_token("secret", 24, Uuid::new_v4(), Role::User).unwrap();
        assert!(matches!(
            verify_token("other", &token),
            Err(AppError::Unauthorized)
        ));
    }

    #[test]
    fn test_expired_token_rejected() {
        let (token, _) = issue_token("secret", -2, Uuid::new_v4(), Role::User).unwrap();
        assert!(verify_token("secret", &token).is_err());
    }

    #[test]
    fn test_referral_code_shape() {
        let code = generate_referral_code();
        assert_eq!(code.len(), 11);
        assert!(code.starts_with("REF"));
        assert!(code[3..]
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }

    #[test]
    fn test_signup_validation() {
        assert!(validate_signup(&signup_request()).is_ok());

        let mut req = signup_request();
        req.email = "not-an-email".to_string();
        assert!(validate_signup(&req).is_err());

        let mut req = signup_request();
        req.mobile = "12345".to_string();
        assert!(validate_signup(&req).is_err());

        let mut req = signup_request();
        req.password = "short".to_string();
        assert!(validate_signup(&req).is_err());

        let mut req = signup_request();
        req.name = "   ".to_string();
        assert!(validate_signup(&req).is_err());
    }
}
