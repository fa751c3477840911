// service/payment_gateway.rs
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};

use crate::{config::GatewayConfig, service::error::ServiceError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationResult {
    pub approved: bool,
    pub gateway_reference: String,
    pub failure_reason: Option<String>,
}

/// Narrow boundary to the external payment network. The engine only needs
/// authorize-with-idempotent-retry; card/ACH protocol details stay on the
/// other side of this trait. Implementations are injected, never reached
/// through process-wide state.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn authorize(
        &self,
        amount: &BigDecimal,
        currency: &str,
        idempotency_key: &str,
    ) -> Result<AuthorizationResult, ServiceError>;
}

pub struct AuthorizeNetGateway {
    client: reqwest::Client,
    config: GatewayConfig,
}

impl AuthorizeNetGateway {
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    fn endpoint(&self) -> &str {
        if self.config.sandbox {
            "https://apitest.authorize.net/xml/v1/request.api"
        } else {
            "https://api.authorize.net/xml/v1/request.api"
        }
    }
}

#[async_trait]
impl PaymentGateway for AuthorizeNetGateway {
    async fn authorize(
        &self,
        amount: &BigDecimal,
        currency: &str,
        idempotency_key: &str,
    ) -> Result<AuthorizationResult, ServiceError> {
        let payload = serde_json::json!({
            "createTransactionRequest": {
                "merchantAuthentication": {
                    "name": self.config.api_login_id,
                    "transactionKey": self.config.transaction_key,
                },
                // The gateway deduplicates on refId, which makes retries
                // with the same key safe.
                "refId": idempotency_key,
                "transactionRequest": {
                    "transactionType": "authCaptureTransaction",
                    "amount": amount.to_string(),
                    "currencyCode": currency,
                }
            }
        });

        let response = self
            .client
            .post(self.endpoint())
            .json(&payload)
            .send()
            .await
            .map_err(|e| ServiceError::Gateway(e.to_string()))?;

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ServiceError::Gateway(e.to_string()))?;

        let result_code = body["messages"]["resultCode"].as_str().unwrap_or("Error");
        let transaction_id = body["transactionResponse"]["transId"]
            .as_str()
            .unwrap_or("")
            .to_string();

        if result_code == "Ok" && !transaction_id.is_empty() {
            Ok(AuthorizationResult {
                approved: true,
                gateway_reference: transaction_id,
                failure_reason: None,
            })
        } else {
            let reason = body["transactionResponse"]["errors"][0]["errorText"]
                .as_str()
                .or_else(|| body["messages"]["message"][0]["text"].as_str())
                .unwrap_or("Authorization declined")
                .to_string();

            Ok(AuthorizationResult {
                approved: false,
                gateway_reference: transaction_id,
                failure_reason: Some(reason),
            })
        }
    }
}

/// Test double: approves everything below the configured decline floor and
/// replays the same reference for a repeated idempotency key.
pub struct MockGateway {
    pub decline_above: Option<BigDecimal>,
}

impl MockGateway {
    pub fn approving() -> Self {
        Self {
            decline_above: None,
        }
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn authorize(
        &self,
        amount: &BigDecimal,
        _currency: &str,
        idempotency_key: &str,
    ) -> Result<AuthorizationResult, ServiceError> {
        if let Some(limit) = &self.decline_above {
            if amount > limit {
                return Ok(AuthorizationResult {
                    approved: false,
                    gateway_reference: String::new(),
                    failure_reason: Some("Declined by test gateway".to_string()),
                });
            }
        }

        Ok(AuthorizationResult {
            approved: true,
            gateway_reference: format!("MOCK-{}", idempotency_key),
            failure_reason: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    #[tokio::test]
    async fn test_mock_gateway_is_idempotent_per_key() {
        let gateway = MockGateway::approving();

        let first = gateway
            .authorize(&dec("100.00"), "USD", "key-1")
            .await
            .unwrap();
        let retry = gateway
            .authorize(&dec("100.00"), "USD", "key-1")
            .await
            .unwrap();

        assert!(first.approved);
        assert_eq!(first.gateway_reference, retry.gateway_reference);
    }

    #[tokio::test]
    async fn test_mock_gateway_declines_above_limit() {
        let gateway = MockGateway {
            decline_above: Some(dec("500.00")),
        };

        let declined = gateway
            .authorize(&dec("500.01"), "USD", "key-2")
            .await
            .unwrap();

        assert!(!declined.approved);
        assert!(declined.failure_reason.is_some());
    }
}
