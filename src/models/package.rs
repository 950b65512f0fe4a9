//! Package and commission structure models.
//!
//! A package has a price and a commission table: one rule per sponsor level,
//! either a percentage of the price (in basis points) or a fixed amount.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A purchasable package.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Package {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price_paise: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// How a level's commission is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommissionKind {
    /// `value` is basis points of the package price (100 = 1%).
    Percent,
    /// `value` is paise.
    Fixed,
}

impl CommissionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            CommissionKind::Percent => "percent",
            CommissionKind::Fixed => "fixed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "percent" => Some(CommissionKind::Percent),
            "fixed" => Some(CommissionKind::Fixed),
            _ => None,
        }
    }
}

/// One row of a package's commission table.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CommissionLevelRow {
    pub package_id: Uuid,
    pub level: i32,
    pub kind: String,
    pub value: i64,
}

/// Typed commission rule used by the distribution planner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommissionRule {
    pub level: i32,
    pub kind: CommissionKind,
    pub value: i64,
}

impl CommissionRule {
    /// Amount this rule yields for a package of `price_paise`.
    ///
    /// Percent rules round down to whole paise.
    pub fn amount_for(&self, price_paise: i64) -> i64 {
        match self.kind {
            CommissionKind::Percent => {
                ((price_paise as i128 * self.value as i128) / 10_000) as i64
            }
            CommissionKind::Fixed => self.value,
        }
    }
}

impl TryFrom<CommissionLevelRow> for CommissionRule {
    type Error = String;

    fn try_from(row: CommissionLevelRow) -> Result<Self, Self::Error> {
        let kind = CommissionKind::parse(&row.kind)
            .ok_or_else(|| format!("unknown commission kind '{}'", row.kind))?;
        Ok(Self {
            level: row.level,
            kind,
            value: row.value,
        })
    }
}

/// Request body for `POST /api/admin/packages`.
///
/// ```json
/// {
///   "name": "Super Package",
///   "price_paise": 500000,
///   "levels": [
///     { "level": 1, "kind": "percent", "value": 1000 },
///     { "level": 2, "kind": "fixed", "value": 5000 }
///   ]
/// }
/// ```
#[derive(Debug, Deserialize)]
pub struct CreatePackageRequest {
    pub name: String,
    pub description: Option<String>,
    pub price_paise: i64,
    #[serde(default)]
    pub levels: Vec<CommissionRule>,
}

/// Request body for `PUT /api/admin/packages/{id}/levels`.
#[derive(Debug, Deserialize)]
pub struct UpdateLevelsRequest {
    pub levels: Vec<CommissionRule>,
}

/// A package together with its commission table.
#[derive(Debug, Serialize)]
pub struct PackageDetail {
    #[serde(flatten)]
    pub package: Package,
    pub levels: Vec<CommissionRule>,
    /// Sum of every level's amount at the package price.
    pub total_commission_paise: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_rule_rounds_down() {
        let rule = CommissionRule {
            level: 1,
            kind: CommissionKind::Percent,
            value: 333,
        };
        // 3.33% of Rs 99.99
        assert_eq!(rule.amount_for(9_999), 332);
    }

    #[test]
    fn test_fixed_rule_ignores_price() {
        let rule = CommissionRule {
            level: 4,
            kind: CommissionKind::Fixed,
            value: 2_500,
        };
        assert_eq!(rule.amount_for(1_000_000), 2_500);
    }

    #[test]
    fn test_large_price_does_not_overflow() {
        let rule = CommissionRule {
            level: 1,
            kind: CommissionKind::Percent,
            value: 10_000,
        };
        assert_eq!(rule.amount_for(i64::MAX / 2), i64::MAX / 2);
    }

    #[test]
    fn test_row_conversion_rejects_unknown_kind() {
        let row = CommissionLevelRow {
            package_id: Uuid::new_v4(),
            level: 1,
            kind: "bonus".to_string(),
            value: 10,
        };
        assert!(CommissionRule::try_from(row).is_err());
    }
}
