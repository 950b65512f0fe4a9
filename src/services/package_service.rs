//! Package catalog and commission table management.

use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    models::package::{CommissionRule, CreatePackageRequest, Package, PackageDetail},
    services::commission_service,
};

pub async fn create_package(
    pool: &DbPool,
    max_levels: i32,
    request: CreatePackageRequest,
) -> Result<PackageDetail, AppError> {
    let name = request.name.trim();
    if name.is_empty() {
        return Err(AppError::InvalidRequest(
            "Package name is required".to_string(),
        ));
    }

    let total = commission_service::validate_structure(request.price_paise, &request.levels, max_levels)
        .map_err(AppError::InvalidRequest)?;

    let mut tx = pool.begin().await?;

    let package = sqlx::query_as::<_, Package>(
        r#"
        INSERT INTO packages (name, description, price_paise)
        VALUES ($1, $2, $3)
        RETURNING *
        "#,
    )
    .bind(name)
    .bind(&request.description)
    .bind(request.price_paise)
    .fetch_one(&mut *tx)
    .await?;

    insert_levels(&mut tx, package.id, &request.levels).await?;

    tx.commit().await?;

    tracing::info!(
        package_id = %package.id,
        price = package.price_paise,
        levels = request.levels.len(),
        "Package created"
    );

    let mut levels = request.levels;
    levels.sort_by_key(|r| r.level);

    Ok(PackageDetail {
        package,
        levels,
        total_commission_paise: total,
    })
}

/// Replace a package's commission table. Purchases already distributed
/// keep what they were paid.
pub async fn update_levels(
    pool: &DbPool,
    max_levels: i32,
    package_id: Uuid,
    levels: Vec<CommissionRule>,
) -> Result<PackageDetail, AppError> {
    let mut tx = pool.begin().await?;

    let package = sqlx::query_as::<_, Package>("SELECT * FROM packages WHERE id = $1 FOR UPDATE")
        .bind(package_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(AppError::NotFound("Package"))?;

    let total = commission_service::validate_structure(package.price_paise, &levels, max_levels)
        .map_err(AppError::InvalidRequest)?;

    sqlx::query("DELETE FROM package_commission_levels WHERE package_id = $1")
        .bind(package_id)
        .execute(&mut *tx)
        .await?;
    insert_levels(&mut tx, package_id, &levels).await?;

    sqlx::query("UPDATE packages SET updated_at = NOW() WHERE id = $1")
        .bind(package_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::info!(package_id = %package_id, levels = levels.len(), "Commission table replaced");

    let mut levels = levels;
    levels.sort_by_key(|r| r.level);

    Ok(PackageDetail {
        package,
        levels,
        total_commission_paise: total,
    })
}

async fn insert_levels(
    conn: &mut sqlx::PgConnection,
    package_id: Uuid,
    levels: &[CommissionRule],
) -> Result<(), AppError> {
    for rule in levels {
        sqlx::query(
            r#"
            INSERT INTO package_commission_levels (package_id, level, kind, value)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(package_id)
        .bind(rule.level)
        .bind(rule.kind.as_str())
        .bind(rule.value)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

pub async fn set_active(pool: &DbPool, package_id: Uuid, is_active: bool) -> Result<Package, AppError> {
    sqlx::query_as::<_, Package>(
        "UPDATE packages SET is_active = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(package_id)
    .bind(is_active)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("Package"))
}

/// Packages on sale, cheapest first.
pub async fn list_active(pool: &DbPool) -> Result<Vec<Package>, AppError> {
    let packages = sqlx::query_as::<_, Package>(
        "SELECT * FROM packages WHERE is_active = true ORDER BY price_paise, name",
    )
    .fetch_all(pool)
    .await?;

    Ok(packages)
}

pub async fn get_package(pool: &DbPool, package_id: Uuid) -> Result<PackageDetail, AppError> {
    let package = sqlx::query_as::<_, Package>("SELECT * FROM packages WHERE id = $1")
        .bind(package_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("Package"))?;

    let mut conn = pool.acquire().await?;
    let levels = commission_service::load_rules(&mut conn, package_id).await?;
    let total_commission_paise = levels
        .iter()
        .map(|rule| rule.amount_for(package.price_paise))
        .sum();

    Ok(PackageDetail {
        package,
        levels,
        total_commission_paise,
    })
}

/// An active package, for purchase flows.
pub async fn get_active(conn: &mut sqlx::PgConnection, package_id: Uuid) -> Result<Package, AppError> {
    sqlx::query_as::<_, Package>("SELECT * FROM packages WHERE id = $1 AND is_active = true")
        .bind(package_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(AppError::NotFound("Package"))
}
