//! Profiles, the referral network and KYC.

use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    models::{
        notification::NotificationKind,
        user::{
            KycReviewItem, KycStatus, KycSubmission, NetworkMember, ProfileResponse, ReviewDecision,
            TeamLevelCount, USER_COLUMNS, User, UserResponse,
        },
        wallet::PageQuery,
    },
    services::{notification_service, social_service, wallet_service},
};

pub async fn get_user(pool: &DbPool, user_id: Uuid) -> Result<User, AppError> {
    sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("User"))
}

pub async fn me(pool: &DbPool, user_id: Uuid) -> Result<ProfileResponse, AppError> {
    let user = get_user(pool, user_id).await?;
    let wallet = wallet_service::get_wallet(pool, user_id).await?;
    let direct_referrals: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE sponsor_id = $1")
        .bind(user_id)
        .fetch_one(pool)
        .await?;

    Ok(ProfileResponse {
        user: user.into(),
        wallet,
        direct_referrals,
    })
}

pub async fn direct_referrals(
    pool: &DbPool,
    user_id: Uuid,
    page: &PageQuery,
) -> Result<Vec<NetworkMember>, AppError> {
    let (limit, offset) = page.bounds();
    let members = sqlx::query_as::<_, NetworkMember>(
        r#"
        SELECT id, name, referral_code, is_active, 1 AS level, created_at
        FROM users
        WHERE sponsor_id = $1
        ORDER BY created_at DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    Ok(members)
}

/// The caller's sponsors, nearest first.
pub async fn upline(pool: &DbPool, user_id: Uuid, max_levels: i32) -> Result<Vec<NetworkMember>, AppError> {
    let members = sqlx::query_as::<_, NetworkMember>(
        r#"
        WITH RECURSIVE chain (id, level) AS (
            SELECT sponsor_id, 1
            FROM users
            WHERE id = $1 AND sponsor_id IS NOT NULL
            UNION ALL
            SELECT u.sponsor_id, c.level + 1
            FROM chain c
            JOIN users u ON u.id = c.id
            WHERE u.sponsor_id IS NOT NULL AND c.level < $2
        )
        SELECT u.id, u.name, u.referral_code, u.is_active, c.level, u.created_at
        FROM chain c
        JOIN users u ON u.id = c.id
        ORDER BY c.level
        "#,
    )
    .bind(user_id)
    .bind(max_levels)
    .fetch_all(pool)
    .await?;

    Ok(members)
}

/// Downline size at each depth below the caller.
pub async fn team_summary(
    pool: &DbPool,
    user_id: Uuid,
    max_levels: i32,
) -> Result<Vec<TeamLevelCount>, AppError> {
    let counts = sqlx::query_as::<_, TeamLevelCount>(
        r#"
        WITH RECURSIVE team (id, level) AS (
            SELECT id, 1 FROM users WHERE sponsor_id = $1
            UNION ALL
            SELECT u.id, t.level + 1
            FROM team t
            JOIN users u ON u.sponsor_id = t.id
            WHERE t.level < $2
        )
        SELECT level, COUNT(*) AS members
        FROM team
        GROUP BY level
        ORDER BY level
        "#,
    )
    .bind(user_id)
    .bind(max_levels)
    .fetch_all(pool)
    .await?;

    Ok(counts)
}

/// PAN: five letters, four digits, one letter.
pub fn is_valid_pan(value: &str) -> bool {
    let bytes = value.as_bytes();
    bytes.len() == 10
        && bytes[..5].iter().all(u8::is_ascii_uppercase)
        && bytes[5..9].iter().all(u8::is_ascii_digit)
        && bytes[9].is_ascii_uppercase()
}

/// IFSC: four letters, a zero, six letters or digits.
pub fn is_valid_ifsc(value: &str) -> bool {
    let bytes = value.as_bytes();
    bytes.len() == 11
        && bytes[..4].iter().all(u8::is_ascii_uppercase)
        && bytes[4] == b'0'
        && bytes[5..].iter().all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
}

/// Normalize and check a KYC submission.
pub fn validate_kyc(submission: &KycSubmission) -> Result<KycSubmission, AppError> {
    let pan_number = submission.pan_number.trim().to_ascii_uppercase();
    if !is_valid_pan(&pan_number) {
        return Err(AppError::InvalidRequest("Invalid PAN number".to_string()));
    }

    let ifsc_code = submission.ifsc_code.trim().to_ascii_uppercase();
    if !is_valid_ifsc(&ifsc_code) {
        return Err(AppError::InvalidRequest("Invalid IFSC code".to_string()));
    }

    let account_number = submission.account_number.trim().to_string();
    if !(9..=18).contains(&account_number.len()) || !account_number.chars().all(|c| c.is_ascii_digit()) {
        return Err(AppError::InvalidRequest(
            "Account number must be 9-18 digits".to_string(),
        ));
    }

    let account_holder = submission.account_holder.trim().to_string();
    if account_holder.is_empty() {
        return Err(AppError::InvalidRequest(
            "Account holder name is required".to_string(),
        ));
    }

    social_service::validate_link(submission.document_url.trim())?;

    Ok(KycSubmission {
        pan_number,
        account_holder,
        account_number,
        ifsc_code,
        document_url: submission.document_url.trim().to_string(),
    })
}

pub async fn submit_kyc(
    pool: &DbPool,
    user_id: Uuid,
    submission: KycSubmission,
) -> Result<UserResponse, AppError> {
    let kyc = validate_kyc(&submission)?;

    let user = sqlx::query_as::<_, User>(&format!(
        r#"
        UPDATE users
        SET kyc_status = 'submitted', pan_number = $2, account_holder = $3,
            account_number = $4, ifsc_code = $5, kyc_document_url = $6,
            kyc_note = NULL, updated_at = NOW()
        WHERE id = $1 AND kyc_status <> 'approved'
        RETURNING {USER_COLUMNS}
        "#
    ))
    .bind(user_id)
    .bind(&kyc.pan_number)
    .bind(&kyc.account_holder)
    .bind(&kyc.account_number)
    .bind(&kyc.ifsc_code)
    .bind(&kyc.document_url)
    .fetch_optional(pool)
    .await?;

    match user {
        Some(user) => {
            tracing::info!(user_id = %user_id, "KYC submitted");
            Ok(user.into())
        }
        None => {
            get_user(pool, user_id).await?;
            Err(AppError::Conflict("KYC is already approved".to_string()))
        }
    }
}

pub async fn list_users(pool: &DbPool, page: &PageQuery) -> Result<Vec<UserResponse>, AppError> {
    let (limit, offset) = page.bounds();
    let users = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC LIMIT $1 OFFSET $2"
    ))
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    Ok(users.into_iter().map(UserResponse::from).collect())
}

/// Deactivated users cannot log in and are skipped by commission distribution.
pub async fn set_user_active(
    pool: &DbPool,
    admin_id: Uuid,
    user_id: Uuid,
    is_active: bool,
) -> Result<UserResponse, AppError> {
    if admin_id == user_id {
        return Err(AppError::InvalidRequest(
            "Admins cannot change their own status".to_string(),
        ));
    }

    let user = sqlx::query_as::<_, User>(&format!(
        "UPDATE users SET is_active = $2, updated_at = NOW() WHERE id = $1 RETURNING {USER_COLUMNS}"
    ))
    .bind(user_id)
    .bind(is_active)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("User"))?;

    tracing::info!(user_id = %user_id, admin_id = %admin_id, is_active, "User status changed");

    Ok(user.into())
}

pub async fn list_pending_kyc(pool: &DbPool) -> Result<Vec<KycReviewItem>, AppError> {
    let items = sqlx::query_as::<_, KycReviewItem>(
        r#"
        SELECT id, name, email, kyc_status, pan_number, account_holder,
               account_number, ifsc_code, kyc_document_url, updated_at
        FROM users
        WHERE kyc_status = 'submitted'
        ORDER BY updated_at
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(items)
}

pub async fn review_kyc(
    pool: &DbPool,
    admin_id: Uuid,
    user_id: Uuid,
    decision: ReviewDecision,
    note: Option<String>,
) -> Result<UserResponse, AppError> {
    let status = match decision {
        ReviewDecision::Approve => KycStatus::Approved,
        ReviewDecision::Reject => KycStatus::Rejected,
    };

    let user = sqlx::query_as::<_, User>(&format!(
        r#"
        UPDATE users
        SET kyc_status = $2, kyc_note = $3, updated_at = NOW()
        WHERE id = $1 AND kyc_status = 'submitted'
        RETURNING {USER_COLUMNS}
        "#
    ))
    .bind(user_id)
    .bind(status.as_str())
    .bind(&note)
    .fetch_optional(pool)
    .await?;

    let Some(user) = user else {
        let existing = get_user(pool, user_id).await?;
        return Err(AppError::Conflict(format!(
            "KYC is {}, not awaiting review",
            existing.kyc_status
        )));
    };

    tracing::info!(
        user_id = %user_id,
        admin_id = %admin_id,
        status = status.as_str(),
        "KYC reviewed"
    );

    let body = match (decision, note.as_deref()) {
        (ReviewDecision::Approve, _) => "Your KYC was approved. You can now request payouts.".to_string(),
        (ReviewDecision::Reject, Some(note)) => format!("Your KYC was rejected: {}", note),
        (ReviewDecision::Reject, None) => "Your KYC was rejected. Please resubmit.".to_string(),
    };
    notification_service::notify_best_effort(pool, user_id, NotificationKind::Kyc, "KYC update", &body).await;

    Ok(user.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submission() -> KycSubmission {
        KycSubmission {
            pan_number: " abcde1234f ".to_string(),
            account_holder: "Asha Rao".to_string(),
            account_number: "123456789012".to_string(),
            ifsc_code: "sbin0001234".to_string(),
            document_url: "https://files.example.com/kyc/asha.pdf".to_string(),
        }
    }

    #[test]
    fn test_pan_format() {
        assert!(is_valid_pan("ABCDE1234F"));
        assert!(!is_valid_pan("ABCD01234F"));
        assert!(!is_valid_pan("ABCDE12345"));
        assert!(!is_valid_pan("ABCDE1234"));
    }

    #[test]
    fn test_ifsc_format() {
        assert!(is_valid_ifsc("SBIN0001234"));
        assert!(is_valid_ifsc("HDFC0ABC123"));
        assert!(!is_valid_ifsc("SBIN1001234"));
        assert!(!is_valid_ifsc("SBI00001234"));
        assert!(!is_valid_ifsc("SBIN000123"));
    }

    #[test]
    fn test_kyc_is_normalized() {
        let kyc = validate_kyc(&submission()).unwrap();
        assert_eq!(kyc.pan_number, "ABCDE1234F");
        assert_eq!(kyc.ifsc_code, "SBIN0001234");
    }

    #[test]
    fn test_kyc_rejects_bad_fields() {
        let mut bad = submission();
        bad.account_number = "12ab".to_string();
        assert!(validate_kyc(&bad).is_err());

        let mut bad = submission();
        bad.account_holder = "   ".to_string();
        assert!(validate_kyc(&bad).is_err());

        let mut bad = submission();
        bad.document_url = "scan.pdf".to_string();
        assert!(validate_kyc(&bad).is_err());

        let mut bad = submission();
        bad.document_url = "javascript:alert(1)".to_string();
        assert!(validate_kyc(&bad).is_err());
    }
}
