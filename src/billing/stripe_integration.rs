use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::core::config::StripeConfig;

/// Seconds a webhook signature timestamp may drift from now.
const WEBHOOK_TOLERANCE_SECONDS: i64 = 300;

#[derive(Debug, Clone, thiserror::Error)]
pub enum StripeError {
    #[error("Stripe API error: {0}")]
    ApiError(String),
    #[error("Network error: {0}")]
    NetworkError(String),
    #[error("Invalid webhook: {0}")]
    InvalidWebhook(String),
    #[error("Parse error: {0}")]
    ParseError(String),
    #[error("Stripe is not configured")]
    NotConfigured,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub status: String,
    pub amount: i64,
    #[serde(default)]
    pub amount_received: i64,
    pub currency: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl PaymentIntent {
    pub fn succeeded(&self) -> bool {
        self.status == "succeeded"
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripeRefund {
    pub id: String,
    pub status: String,
    pub amount: i64,
    pub currency: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectedAccount {
    pub id: String,
    #[serde(default)]
    pub charges_enabled: bool,
    #[serde(default)]
    pub details_submitted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripeWebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: StripeWebhookData,
    #[serde(default)]
    pub account: Option<String>,
    pub created: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripeWebhookData {
    pub object: serde_json::Value,
}

/// Stripe operations the app relies on. Calls made on behalf of a tenant pass
/// their Connect account id so they run against that account.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn retrieve_payment_intent(
        &self,
        payment_intent_id: &str,
        account: Option<&str>,
    ) -> Result<PaymentIntent, StripeError>;

    async fn refund_payment_intent(
        &self,
        payment_intent_id: &str,
        account: Option<&str>,
        idempotency_key: &str,
    ) -> Result<StripeRefund, StripeError>;

    /// Creates an Express account tagged with `metadata[tenant_id]`.
    async fn create_connected_account(
        &self,
        email: &str,
        tenant_id: &str,
    ) -> Result<ConnectedAccount, StripeError>;

    async fn retrieve_account(&self, account_id: &str) -> Result<ConnectedAccount, StripeError>;

    /// Returns the hosted onboarding URL.
    async fn create_account_link(
        &self,
        account_id: &str,
        refresh_url: &str,
        return_url: &str,
    ) -> Result<String, StripeError>;

    fn verify_webhook_signature(
        &self,
        payload: &str,
        signature: &str,
    ) -> Result<StripeWebhookEvent, StripeError>;
}

#[derive(Debug, Clone)]
pub struct StripeClient {
    api_key: Option<String>,
    webhook_secret: Option<String>,
    client: reqwest::Client,
    base_url: String,
}

impl StripeClient {
    pub fn new(api_key: Option<String>, webhook_secret: Option<String>, base_url: &str) -> Self {
        Self {
            api_key,
            webhook_secret,
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &StripeConfig) -> Self {
        Self::new(
            config.secret_key.clone(),
            config.webhook_secret.clone(),
            &config.api_base,
        )
    }

    fn api_key(&self) -> Result<&str, StripeError> {
        self.api_key.as_deref().ok_or(StripeError::NotConfigured)
    }

    fn request(
        &self,
        method: reqwest::Method,
        path: &str,
        account: Option<&str>,
    ) -> Result<reqwest::RequestBuilder, StripeError> {
        let mut builder = self
            .client
            .request(method, format!("{}{path}", self.base_url))
            .basic_auth(self.api_key()?, Option::<&str>::None);
        if let Some(account) = account {
            builder = builder.header("Stripe-Account", account);
        }
        Ok(builder)
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, StripeError> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| StripeError::NetworkError(e.to_string()))?;

        if !status.is_success() {
            #[derive(Deserialize)]
            struct StripeApiError {
                error: StripeApiErrorDetail,
            }

            #[derive(Deserialize)]
            struct StripeApiErrorDetail {
                message: String,
            }

            if let Ok(error) = serde_json::from_str::<StripeApiError>(&body) {
                return Err(StripeError::ApiError(error.error.message));
            }

            return Err(StripeError::ApiError(format!("HTTP {}: {}", status, body)));
        }

        serde_json::from_str(&body).map_err(|e| StripeError::ParseError(e.to_string()))
    }
}

#[async_trait]
impl PaymentGateway for StripeClient {
    async fn retrieve_payment_intent(
        &self,
        payment_intent_id: &str,
        account: Option<&str>,
    ) -> Result<PaymentIntent, StripeError> {
        let response = self
            .request(
                reqwest::Method::GET,
                &format!("/payment_intents/{payment_intent_id}"),
                account,
            )?
            .send()
            .await
            .map_err(|e| StripeError::NetworkError(e.to_string()))?;

        self.handle_response(response).await
    }

    async fn refund_payment_intent(
        &self,
        payment_intent_id: &str,
        account: Option<&str>,
        idempotency_key: &str,
    ) -> Result<StripeRefund, StripeError> {
        let response = self
            .request(reqwest::Method::POST, "/refunds", account)?
            .header("Idempotency-Key", idempotency_key)
            .form(&[("payment_intent", payment_intent_id)])
            .send()
            .await
            .map_err(|e| StripeError::NetworkError(e.to_string()))?;

        self.handle_response(response).await
    }

    async fn create_connected_account(
        &self,
        email: &str,
        tenant_id: &str,
    ) -> Result<ConnectedAccount, StripeError> {
        let response = self
            .request(reqwest::Method::POST, "/accounts", None)?
            .form(&[
                ("type", "express"),
                ("email", email),
                ("metadata[tenant_id]", tenant_id),
                ("capabilities[card_payments][requested]", "true"),
                ("capabilities[transfers][requested]", "true"),
            ])
            .send()
            .await
            .map_err(|e| StripeError::NetworkError(e.to_string()))?;

        self.handle_response(response).await
    }

    async fn retrieve_account(&self, account_id: &str) -> Result<ConnectedAccount, StripeError> {
        let response = self
            .request(reqwest::Method::GET, &format!("/accounts/{account_id}"), None)?
            .send()
            .await
            .map_err(|e| StripeError::NetworkError(e.to_string()))?;

        self.handle_response(response).await
    }

    async fn create_account_link(
        &self,
        account_id: &str,
        refresh_url: &str,
        return_url: &str,
    ) -> Result<String, StripeError> {
        let response = self
            .request(reqwest::Method::POST, "/account_links", None)?
            .form(&[
                ("account", account_id),
                ("refresh_url", refresh_url),
                ("return_url", return_url),
                ("type", "account_onboarding"),
            ])
            .send()
            .await
            .map_err(|e| StripeError::NetworkError(e.to_string()))?;

        #[derive(Deserialize)]
        struct AccountLink {
            url: String,
        }

        let link: AccountLink = self.handle_response(response).await?;
        Ok(link.url)
    }

    fn verify_webhook_signature(
        &self,
        payload: &str,
        signature: &str,
    ) -> Result<StripeWebhookEvent, StripeError> {
        let webhook_secret = self
            .webhook_secret
            .as_ref()
            .ok_or(StripeError::NotConfigured)?;
        verify_signature(webhook_secret, payload, signature, chrono::Utc::now().timestamp())
    }
}

pub fn sign_payload(secret: &str, timestamp: i64, payload: &str) -> Result<String, StripeError> {
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    type HmacSha256 = Hmac<Sha256>;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| StripeError::InvalidWebhook("Invalid webhook secret".to_string()))?;
    mac.update(format!("{timestamp}.{payload}").as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

fn verify_signature(
    secret: &str,
    payload: &str,
    signature: &str,
    now: i64,
) -> Result<StripeWebhookEvent, StripeError> {
    let mut timestamp = None;
    let mut candidates = Vec::new();
    for part in signature.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = Some(value),
            Some(("v1", value)) => candidates.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp
        .ok_or_else(|| StripeError::InvalidWebhook("Missing timestamp".to_string()))?;
    if candidates.is_empty() {
        return Err(StripeError::InvalidWebhook("Missing signature".to_string()));
    }

    let timestamp_i64: i64 = timestamp
        .parse()
        .map_err(|_| StripeError::InvalidWebhook("Invalid timestamp".to_string()))?;

    let expected_sig = sign_payload(secret, timestamp_i64, payload)?;
    if !candidates.iter().any(|sig| *sig == expected_sig) {
        return Err(StripeError::InvalidWebhook("Signature mismatch".to_string()));
    }

    if (now - timestamp_i64).abs() > WEBHOOK_TOLERANCE_SECONDS {
        return Err(StripeError::InvalidWebhook("Timestamp too old".to_string()));
    }

    serde_json::from_str(payload).map_err(|e| StripeError::ParseError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test";
    const PAYLOAD: &str = r#"{"id":"evt_1","type":"account.updated","data":{"object":{"id":"acct_1"}},"created":1700000000}"#;

    #[test]
    fn test_valid_signature() {
        let now = 1_700_000_000;
        let sig = sign_payload(SECRET, now, PAYLOAD).unwrap();
        let header = format!("t={now},v1={sig}");

        let event = verify_signature(SECRET, PAYLOAD, &header, now + 10).unwrap();
        assert_eq!(event.event_type, "account.updated");
    }

    #[test]
    fn test_rejects_tampered_and_stale() {
        let now = 1_700_000_000;
        let sig = sign_payload(SECRET, now, PAYLOAD).unwrap();
        let header = format!("t={now},v1={sig}");

        let tampered = PAYLOAD.replace("acct_1", "acct_2");
        assert!(matches!(
            verify_signature(SECRET, &tampered, &header, now),
            Err(StripeError::InvalidWebhook(_))
        ));
        assert!(matches!(
            verify_signature(SECRET, PAYLOAD, &header, now + WEBHOOK_TOLERANCE_SECONDS + 1),
            Err(StripeError::InvalidWebhook(_))
        ));
        assert!(verify_signature(SECRET, PAYLOAD, "v1=abc", now).is_err());
    }

    #[tokio::test]
    async fn test_refund_sends_idempotency_key_and_account() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/refunds")
            .match_header("idempotency-key", "refund-evt-1")
            .match_header("stripe-account", "acct_123")
            .match_body(mockito::Matcher::UrlEncoded(
                "payment_intent".into(),
                "pi_123".into(),
            ))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id":"re_1","status":"succeeded","amount":5000,"currency":"usd"}"#)
            .create_async()
            .await;

        let client = StripeClient::new(Some("sk_test".to_string()), None, &server.url());
        let refund = client
            .refund_payment_intent("pi_123", Some("acct_123"), "refund-evt-1")
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(refund.id, "re_1");
        assert_eq!(refund.amount, 5000);
    }

    #[tokio::test]
    async fn test_api_error_message_is_surfaced() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/payment_intents/pi_missing")
            .with_status(404)
            .with_body(r#"{"error":{"message":"No such payment_intent: 'pi_missing'"}}"#)
            .create_async()
            .await;

        let client = StripeClient::new(Some("sk_test".to_string()), None, &server.url());
        let err = client
            .retrieve_payment_intent("pi_missing", None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("No such payment_intent"));
    }

    #[tokio::test]
    async fn test_not_configured() {
        let client = StripeClient::new(None, None, "http://127.0.0.1:9");
        assert!(matches!(
            client.retrieve_account("acct_1").await,
            Err(StripeError::NotConfigured)
        ));
        assert!(matches!(
            client.verify_webhook_signature("{}", "t=1,v1=x"),
            Err(StripeError::NotConfigured)
        ));
    }
}
