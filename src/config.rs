//! Application configuration management.
//!
//! Configuration is read from environment variables (optionally seeded from a
//! `.env` file) and deserialized into a typed struct with `envy`.

use serde::Deserialize;

/// Application configuration loaded from environment variables.
///
/// # Environment Variables
///
/// - `DATABASE_URL` (required): PostgreSQL connection string
/// - `JWT_SECRET` (required): HMAC secret for session tokens
/// - `SERVER_PORT` (optional): HTTP server port, defaults to 3000
/// - `MAX_COMMISSION_LEVELS` (optional): depth of the sponsor walk, defaults to 120
/// - `RECHARGE_PROVIDER_URL` / `RECHARGE_PROVIDER_KEY` (optional): top-up provider
/// - `RECHARGE_CALLBACK_SECRET` (optional): HMAC secret for provider callbacks
///
/// Every other field has a default; see the `default_*` functions below.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,

    #[serde(default = "default_port")]
    pub server_port: u16,

    #[serde(default = "default_max_connections")]
    pub database_max_connections: u32,

    pub jwt_secret: String,

    #[serde(default = "default_jwt_ttl_hours")]
    pub jwt_ttl_hours: i64,

    #[serde(default = "default_max_commission_levels")]
    pub max_commission_levels: i32,

    #[serde(default = "default_otp_ttl_minutes")]
    pub otp_ttl_minutes: i64,

    #[serde(default = "default_otp_max_attempts")]
    pub otp_max_attempts: i32,

    /// Return OTP codes in API responses. Development only.
    #[serde(default)]
    pub otp_debug_echo: bool,

    #[serde(default)]
    pub require_signup_otp: bool,

    #[serde(default = "default_true")]
    pub require_sponsor: bool,

    #[serde(default = "default_min_payout_paise")]
    pub min_payout_paise: i64,

    /// Payout fee in basis points (100 = 1%).
    #[serde(default)]
    pub payout_fee_bps: i64,

    #[serde(default = "default_coins_per_rupee")]
    pub coins_per_rupee: i64,

    pub recharge_provider_url: Option<String>,
    pub recharge_provider_key: Option<String>,
    pub recharge_callback_secret: Option<String>,

    pub bootstrap_admin_email: Option<String>,
    pub bootstrap_admin_password: Option<String>,

    pub cors_allowed_origin: Option<String>,
}

fn default_port() -> u16 {
    3000
}

fn default_max_connections() -> u32 {
    5
}

fn default_jwt_ttl_hours() -> i64 {
    24
}

fn default_max_commission_levels() -> i32 {
    120
}

fn default_otp_ttl_minutes() -> i64 {
    10
}

fn default_otp_max_attempts() -> i32 {
    5
}

fn default_true() -> bool {
    true
}

/// Rs 500
fn default_min_payout_paise() -> i64 {
    50_000
}

fn default_coins_per_rupee() -> i64 {
    100
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// A `.env` file is loaded first if present. Field names map to upper-case
    /// variables: `jwt_secret` -> `JWT_SECRET`.
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or a value cannot be
    /// parsed into its field type.
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();

        envy::from_env::<Config>()
    }
}

#[cfg(test)]
impl Config {
    /// Configuration with defaults for unit tests. Never touches the environment.
    pub fn for_tests() -> Self {
        Self {
            database_url: "postgres://localhost/referral_test".to_string(),
            server_port: default_port(),
            database_max_connections: default_max_connections(),
            jwt_secret: "test-secret".to_string(),
            jwt_ttl_hours: default_jwt_ttl_hours(),
            max_commission_levels: default_max_commission_levels(),
            otp_ttl_minutes: default_otp_ttl_minutes(),
            otp_max_attempts: default_otp_max_attempts(),
            otp_debug_echo: false,
            require_signup_otp: false,
            require_sponsor: true,
            min_payout_paise: default_min_payout_paise(),
            payout_fee_bps: 0,
            coins_per_rupee: default_coins_per_rupee(),
            recharge_provider_url: None,
            recharge_provider_key: None,
            recharge_callback_secret: Some("callback-secret".to_string()),
            bootstrap_admin_email: None,
            bootstrap_admin_password: None,
            cors_allowed_origin: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_applied_for_missing_optional_vars() {
        let vars = vec![
            ("DATABASE_URL".to_string(), "postgres://db".to_string()),
            ("JWT_SECRET".to_string(), "s3cret".to_string()),
        ];
        let config: Config = envy::from_iter(vars).unwrap();

        assert_eq!(config.server_port, 3000);
        assert_eq!(config.max_commission_levels, 120);
        assert_eq!(config.min_payout_paise, 50_000);
        assert!(config.require_sponsor);
        assert!(!config.otp_debug_echo);
        assert!(config.recharge_provider_url.is_none());
    }

    #[test]
    fn test_missing_jwt_secret_is_an_error() {
        let vars = vec![("DATABASE_URL".to_string(), "postgres://db".to_string())];
        assert!(envy::from_iter::<_, Config>(vars).is_err());
    }

    #[test]
    fn test_overrides_parse() {
        let vars = vec![
            ("DATABASE_URL".to_string(), "postgres://db".to_string()),
            ("JWT_SECRET".to_string(), "s3cret".to_string()),
            ("MAX_COMMISSION_LEVELS".to_string(), "10".to_string()),
            ("PAYOUT_FEE_BPS".to_string(), "500".to_string()),
            ("REQUIRE_SPONSOR".to_string(), "false".to_string()),
        ];
        let config: Config = envy::from_iter(vars).unwrap();

        assert_eq!(config.max_commission_levels, 10);
        assert_eq!(config.payout_fee_bps, 500);
        assert!(!config.require_sponsor);
    }
}
