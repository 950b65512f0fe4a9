//! Client for the external mobile/DTH top-up provider.
//!
//! `HttpRechargeProvider` is the production implementation of
//! `RechargeProvider`.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{error::AppError, models::recharge::RechargeKind};

/// What the provider says happened to an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderStatus {
    Success,
    Pending,
    Failed,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderOutcome {
    pub status: ProviderStatus,
    pub provider_ref: Option<String>,
    pub message: Option<String>,
}

/// Order sent to the provider. `client_ref` is ours and comes back on callbacks.
#[derive(Debug, Clone, Serialize)]
pub struct RechargeOrder {
    pub client_ref: String,
    pub kind: RechargeKind,
    pub operator: String,
    pub subscriber: String,
    pub amount_paise: i64,
}

#[async_trait]
pub trait RechargeProvider: Send + Sync {
    /// Place an order. An `Err` means the outcome is unknown to us
    /// (transport failure, bad response), not that the provider declined.
    async fn submit(&self, order: &RechargeOrder) -> Result<ProviderOutcome, AppError>;
}

/// JSON-over-HTTP provider authenticated with an API key header.
pub struct HttpRechargeProvider {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl HttpRechargeProvider {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, AppError> {
        let base = url::Url::parse(base_url)
            .map_err(|e| AppError::Internal(format!("Invalid recharge provider URL: {}", e)))?;
        let endpoint = base
            .join("recharge")
            .map_err(|e| AppError::Internal(format!("Invalid recharge provider URL: {}", e)))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| AppError::Internal(format!("HTTP client error: {}", e)))?;

        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            api_key: api_key.to_string(),
        })
    }
}

#[async_trait]
impl RechargeProvider for HttpRechargeProvider {
    async fn submit(&self, order: &RechargeOrder) -> Result<ProviderOutcome, AppError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("X-Api-Key", &self.api_key)
            .json(order)
            .send()
            .await
            .map_err(|e| AppError::Provider(format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(
                client_ref = %order.client_ref,
                http_status = status.as_u16(),
                body = %body,
                "Recharge provider returned an error status"
            );
            return Err(AppError::Provider(format!(
                "Provider responded with HTTP {}",
                status.as_u16()
            )));
        }

        response
            .json::<ProviderOutcome>()
            .await
            .map_err(|e| AppError::Provider(format!("Malformed provider response: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_parses_provider_json() {
        let outcome: ProviderOutcome = serde_json::from_str(
            r#"{"status":"pending","provider_ref":"OP123","message":"queued"}"#,
        )
        .unwrap();
        assert_eq!(outcome.status, ProviderStatus::Pending);
        assert_eq!(outcome.provider_ref.as_deref(), Some("OP123"));

        let outcome: ProviderOutcome = serde_json::from_str(r#"{"status":"failed"}"#).unwrap();
        assert_eq!(outcome.status, ProviderStatus::Failed);
        assert!(outcome.message.is_none());
    }

    #[test]
    fn test_order_serializes_kind_lowercase() {
        let order = RechargeOrder {
            client_ref: "RC1".to_string(),
            kind: RechargeKind::Dth,
            operator: "TSK".to_string(),
            subscriber: "1023456789".to_string(),
            amount_paise: 35_000,
        };
        let value = serde_json::to_value(&order).unwrap();
        assert_eq!(value["kind"], "dth");
        assert_eq!(value["amount_paise"], 35_000);
    }

    #[test]
    fn test_endpoint_is_joined_onto_base_url() {
        let provider = HttpRechargeProvider::new("https://api.example.com/v1/", "key").unwrap();
        assert_eq!(provider.endpoint, "https://api.example.com/v1/recharge");
        assert!(HttpRechargeProvider::new("not a url", "key").is_err());
    }
}
