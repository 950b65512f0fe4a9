//! One-time password issue and verification.
//!
//! Codes are six digits, stored as SHA-256 hex, single use, and expire after
//! the configured TTL. Each code tolerates a bounded number of wrong guesses.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use sha2::{Digest, Sha256};
use sqlx::PgConnection;

use crate::{
    config::Config,
    db::DbPool,
    error::AppError,
    models::otp::{OtpCode, OtpPurpose},
};

/// Generate a fresh six-digit code, zero-padded.
pub fn generate_code() -> String {
    let n: u32 = rand::rng().random_range(0..1_000_000);
    format!("{:06}", n)
}

pub fn hash_code(code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(code.as_bytes());
    hex::encode(hasher.finalize())
}

/// Outcome of checking a submitted code against the stored record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpCheck {
    Valid,
    Mismatch,
    Expired,
    Exhausted,
    Consumed,
    /// No open code exists for the destination.
    Missing,
}

/// Pure verification against a stored code at time `now`.
pub fn check_code(record: &OtpCode, code: &str, max_attempts: i32, now: DateTime<Utc>) -> OtpCheck {
    if record.consumed_at.is_some() {
        return OtpCheck::Consumed;
    }
    if record.expires_at <= now {
        return OtpCheck::Expired;
    }
    if record.attempts >= max_attempts {
        return OtpCheck::Exhausted;
    }
    if hash_code(code.trim()) == record.code_hash {
        OtpCheck::Valid
    } else {
        OtpCheck::Mismatch
    }
}

/// Issue a code for `destination`. Earlier open codes for the same
/// destination and purpose stop being valid.
///
/// Returns the plain code (for delivery) and its expiry.
pub async fn issue(
    pool: &DbPool,
    config: &Config,
    destination: &str,
    purpose: OtpPurpose,
) -> Result<(String, DateTime<Utc>), AppError> {
    let code = generate_code();
    let expires_at = Utc::now() + Duration::minutes(config.otp_ttl_minutes);

    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        UPDATE otp_codes SET consumed_at = NOW()
        WHERE destination = $1 AND purpose = $2 AND consumed_at IS NULL
        "#,
    )
    .bind(destination)
    .bind(purpose.as_str())
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO otp_codes (destination, purpose, code_hash, expires_at)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(destination)
    .bind(purpose.as_str())
    .bind(hash_code(&code))
    .bind(expires_at)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    // No SMS gateway is wired in; delivery is the operator's concern.
    tracing::info!(destination, purpose = purpose.as_str(), "OTP issued");

    Ok((code, expires_at))
}

/// The single error every failed OTP check surfaces as, so callers learn
/// nothing about which check failed.
pub fn invalid_otp() -> AppError {
    AppError::InvalidRequest("Invalid or expired OTP".to_string())
}

/// Check the latest open code for `destination` inside the caller's
/// transaction.
///
/// A match marks the code consumed and a mismatch counts an attempt. Both
/// writes only stick if the caller commits, so a caller whose own work fails
/// after a match rolls back and leaves the code usable.
pub async fn check_in(
    conn: &mut PgConnection,
    config: &Config,
    destination: &str,
    purpose: OtpPurpose,
    code: &str,
) -> Result<OtpCheck, AppError> {
    let record = sqlx::query_as::<_, OtpCode>(
        r#"
        SELECT * FROM otp_codes
        WHERE destination = $1 AND purpose = $2 AND consumed_at IS NULL
        ORDER BY created_at DESC
        LIMIT 1
        FOR UPDATE
        "#,
    )
    .bind(destination)
    .bind(purpose.as_str())
    .fetch_optional(&mut *conn)
    .await?;

    let Some(record) = record else {
        return Ok(OtpCheck::Missing);
    };

    let check = check_code(&record, code, config.otp_max_attempts, Utc::now());
    match check {
        OtpCheck::Valid => {
            sqlx::query("UPDATE otp_codes SET consumed_at = NOW() WHERE id = $1")
                .bind(record.id)
                .execute(&mut *conn)
                .await?;
        }
        OtpCheck::Mismatch => {
            sqlx::query("UPDATE otp_codes SET attempts = attempts + 1 WHERE id = $1")
                .bind(record.id)
                .execute(&mut *conn)
                .await?;
        }
        OtpCheck::Expired | OtpCheck::Exhausted | OtpCheck::Consumed | OtpCheck::Missing => {}
    }

    Ok(check)
}

/// Verify and consume the latest code for `destination`.
pub async fn verify(
    pool: &DbPool,
    config: &Config,
    destination: &str,
    purpose: OtpPurpose,
    code: &str,
) -> Result<(), AppError> {
    let mut tx = pool.begin().await?;
    let check = check_in(&mut tx, config, destination, purpose, code).await?;
    tx.commit().await?;

    match check {
        OtpCheck::Valid => Ok(()),
        _ => Err(invalid_otp()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn record(code: &str) -> OtpCode {
        let now = Utc::now();
        OtpCode {
            id: Uuid::new_v4(),
            destination: "9876543210".to_string(),
            purpose: "signup".to_string(),
            code_hash: hash_code(code),
            attempts: 0,
            expires_at: now + Duration::minutes(10),
            consumed_at: None,
            created_at: now,
        }
    }

    #[test]
    fn test_generated_codes_are_six_digits() {
        for _ in 0..100 {
            let code = generate_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_hash_is_not_the_code() {
        let hash = hash_code("123456");
        assert_eq!(hash.len(), 64);
        assert_ne!(hash, "123456");
    }

    #[test]
    fn test_valid_and_mismatch() {
        let rec = record("482910");
        assert_eq!(check_code(&rec, "482910", 5, Utc::now()), OtpCheck::Valid);
        assert_eq!(check_code(&rec, " 482910 ", 5, Utc::now()), OtpCheck::Valid);
        assert_eq!(check_code(&rec, "000000", 5, Utc::now()), OtpCheck::Mismatch);
    }

    #[test]
    fn test_expired_code() {
        let rec = record("482910");
        let later = Utc::now() + Duration::minutes(11);
        assert_eq!(check_code(&rec, "482910", 5, later), OtpCheck::Expired);
    }

    #[test]
    fn test_attempts_exhausted_even_with_right_code() {
        let mut rec = record("482910");
        rec.attempts = 5;
        assert_eq!(check_code(&rec, "482910", 5, Utc::now()), OtpCheck::Exhausted);
    }

    #[test]
    fn test_consumed_code() {
        let mut rec = record("482910");
        rec.consumed_at = Some(Utc::now());
        assert_eq!(check_code(&rec, "482910", 5, Utc::now()), OtpCheck::Consumed);
    }
}
