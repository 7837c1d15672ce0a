//! Payment gateway collaborator: checkout-session API client and webhook
//! signature verification.

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::warn;

use crate::errors::ServiceError;

type HmacSha256 = Hmac<Sha256>;

/// One gateway line item: the catalog's gateway-side price handle plus the
/// ordered quantity. The gateway resolves the handle to the charged amount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutLineItem {
    pub price: String,
    pub quantity: i64,
}

/// A newly created checkout session.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewaySession {
    pub id: String,
    pub url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Open,
    Complete,
    Expired,
}

/// A session as reported by the gateway on re-fetch.
#[derive(Debug, Clone, Deserialize)]
pub struct RetrievedSession {
    pub id: String,
    pub url: Option<String>,
    pub status: SessionStatus,
}

/// External payment gateway interface. The HTTP implementation talks to a
/// Stripe-style checkout-sessions API; tests substitute a mock.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_session(
        &self,
        line_items: Vec<CheckoutLineItem>,
        success_url: &str,
        cancel_url: &str,
    ) -> Result<GatewaySession, ServiceError>;

    async fn retrieve_session(&self, session_id: &str) -> Result<RetrievedSession, ServiceError>;
}

/// Stripe-style HTTP gateway client.
pub struct StripeGateway {
    http: reqwest::Client,
    api_base: String,
    secret_key: String,
}

impl StripeGateway {
    pub fn new(api_base: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: api_base.into(),
            secret_key: secret_key.into(),
        }
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_session(
        &self,
        line_items: Vec<CheckoutLineItem>,
        success_url: &str,
        cancel_url: &str,
    ) -> Result<GatewaySession, ServiceError> {
        let mut form: Vec<(String, String)> = vec![
            ("mode".into(), "payment".into()),
            ("payment_method_types[]".into(), "card".into()),
            ("success_url".into(), success_url.to_string()),
            ("cancel_url".into(), cancel_url.to_string()),
        ];
        for (i, item) in line_items.iter().enumerate() {
            form.push((format!("line_items[{}][price]", i), item.price.clone()));
            form.push((
                format!("line_items[{}][quantity]", i),
                item.quantity.to_string(),
            ));
        }

        let response = self
            .http
            .post(format!("{}/checkout/sessions", self.api_base))
            .basic_auth(&self.secret_key, Option::<&str>::None)
            .form(&form)
            .send()
            .await
            .map_err(|e| ServiceError::ExternalServiceError(format!("gateway request: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(%status, "Gateway rejected session creation: {}", body);
            return Err(ServiceError::ExternalServiceError(format!(
                "gateway returned {}",
                status
            )));
        }

        response
            .json::<GatewaySession>()
            .await
            .map_err(|e| ServiceError::ExternalServiceError(format!("gateway response: {}", e)))
    }

    async fn retrieve_session(&self, session_id: &str) -> Result<RetrievedSession, ServiceError> {
        let response = self
            .http
            .get(format!("{}/checkout/sessions/{}", self.api_base, session_id))
            .basic_auth(&self.secret_key, Option::<&str>::None)
            .send()
            .await
            .map_err(|e| ServiceError::ExternalServiceError(format!("gateway request: {}", e)))?;

        if !response.status().is_success() {
            return Err(ServiceError::ExternalServiceError(format!(
                "gateway returned {}",
                response.status()
            )));
        }

        response
            .json::<RetrievedSession>()
            .await
            .map_err(|e| ServiceError::ExternalServiceError(format!("gateway response: {}", e)))
    }
}

/// Verifies a `Stripe-Signature`-style webhook header (`t=<unix>,v1=<hex>`)
/// against the raw payload. The timestamp must be within `tolerance_secs` of
/// now and the HMAC must match in constant time.
pub fn verify_webhook_signature(
    signature_header: Option<&str>,
    payload: &[u8],
    secret: &str,
    tolerance_secs: u64,
) -> Result<(), ServiceError> {
    let header = signature_header.ok_or(ServiceError::InvalidSignature)?;

    let mut timestamp = "";
    let mut v1 = "";
    for part in header.split(',') {
        let mut it = part.trim().splitn(2, '=');
        match (it.next(), it.next()) {
            (Some("t"), Some(val)) => timestamp = val,
            (Some("v1"), Some(val)) => v1 = val,
            _ => {}
        }
    }
    if timestamp.is_empty() || v1.is_empty() {
        return Err(ServiceError::InvalidSignature);
    }

    let ts: i64 = timestamp.parse().map_err(|_| ServiceError::InvalidSignature)?;
    let now = chrono::Utc::now().timestamp();
    if (now - ts).unsigned_abs() > tolerance_secs {
        return Err(ServiceError::InvalidSignature);
    }

    let expected = compute_signature(secret, timestamp, payload);
    if constant_time_eq(&expected, v1) {
        Ok(())
    } else {
        Err(ServiceError::InvalidSignature)
    }
}

/// HMAC-SHA256 over `"{timestamp}.{payload}"`, hex-encoded. Also used by
/// tests to construct valid webhook deliveries.
pub fn compute_signature(secret: &str, timestamp: &str, payload: &[u8]) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut res = 0u8;
    for (x, y) in a.as_bytes().iter().zip(b.as_bytes()) {
        res |= x ^ y;
    }
    res == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    const SECRET: &str = "whsec_test";

    fn signed_header(payload: &[u8]) -> String {
        let ts = chrono::Utc::now().timestamp().to_string();
        format!("t={},v1={}", ts, compute_signature(SECRET, &ts, payload))
    }

    #[test]
    fn accepts_valid_signature() {
        let payload = br#"{"type":"checkout.session.completed"}"#;
        let header = signed_header(payload);
        assert!(verify_webhook_signature(Some(&header), payload, SECRET, 300).is_ok());
    }

    #[test]
    fn rejects_tampered_payload() {
        let header = signed_header(b"original");
        assert_matches!(
            verify_webhook_signature(Some(&header), b"tampered", SECRET, 300),
            Err(ServiceError::InvalidSignature)
        );
    }

    #[test]
    fn rejects_wrong_secret() {
        let payload = b"payload";
        let header = signed_header(payload);
        assert_matches!(
            verify_webhook_signature(Some(&header), payload, "whsec_other", 300),
            Err(ServiceError::InvalidSignature)
        );
    }

    #[test]
    fn rejects_stale_timestamp() {
        let payload = b"payload";
        let ts = (chrono::Utc::now().timestamp() - 3600).to_string();
        let header = format!("t={},v1={}", ts, compute_signature(SECRET, &ts, payload));
        assert_matches!(
            verify_webhook_signature(Some(&header), payload, SECRET, 300),
            Err(ServiceError::InvalidSignature)
        );
    }

    #[test]
    fn rejects_missing_header() {
        assert_matches!(
            verify_webhook_signature(None, b"payload", SECRET, 300),
            Err(ServiceError::InvalidSignature)
        );
    }
}
