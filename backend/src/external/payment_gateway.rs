//! Card payment gateway client
//!
//! Talks to a Stripe-compatible REST API: hosted checkout sessions, refunds
//! against a payment intent, and signed webhook verification.

use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::Deserialize;
use sha2::Sha256;

use crate::config::PaymentConfig;
use crate::error::{AppError, AppResult};

type HmacSha256 = Hmac<Sha256>;

/// Payment gateway API client
#[derive(Clone)]
pub struct PaymentGatewayClient {
    client: Client,
    secret_key: String,
    base_url: String,
}

/// One priced line of a checkout session, amount in cents
#[derive(Debug, Clone)]
pub struct CheckoutLine {
    pub name: String,
    pub unit_amount_cents: i64,
    pub quantity: i32,
}

#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub order_id: String,
    pub currency: String,
    pub lines: Vec<CheckoutLine>,
    pub success_url: String,
    pub cancel_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayRefund {
    pub id: String,
    pub status: String,
}

#[derive(Debug, Deserialize)]
struct GatewayErrorBody {
    error: GatewayErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GatewayErrorDetail {
    message: String,
}

impl PaymentGatewayClient {
    pub fn new(config: &PaymentConfig) -> Self {
        Self::with_base_url(config.secret_key.clone(), config.api_base.clone())
    }

    pub fn with_base_url(secret_key: String, base_url: String) -> Self {
        Self {
            client: Client::new(),
            secret_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn ensure_configured(&self) -> AppResult<()> {
        if self.secret_key.is_empty() {
            return Err(AppError::Configuration(
                "payment.secret_key is not set".to_string(),
            ));
        }
        Ok(())
    }

    /// Create a hosted checkout session
    pub async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> AppResult<CheckoutSession> {
        self.ensure_configured()?;

        let mut form: Vec<(String, String)> = vec![
            ("mode".to_string(), "payment".to_string()),
            ("success_url".to_string(), request.success_url.clone()),
            ("cancel_url".to_string(), request.cancel_url.clone()),
            ("metadata[order_id]".to_string(), request.order_id.clone()),
            ("client_reference_id".to_string(), request.order_id.clone()),
        ];
        for (i, line) in request.lines.iter().enumerate() {
            let prefix = format!("line_items[{}]", i);
            form.push((
                format!("{}[price_data][currency]", prefix),
                request.currency.clone(),
            ));
            form.push((
                format!("{}[price_data][product_data][name]", prefix),
                line.name.clone(),
            ));
            form.push((
                format!("{}[price_data][unit_amount]", prefix),
                line.unit_amount_cents.to_string(),
            ));
            form.push((format!("{}[quantity]", prefix), line.quantity.to_string()));
        }

        let response = self
            .client
            .post(format!("{}/checkout/sessions", self.base_url))
            .bearer_auth(&self.secret_key)
            .form(&form)
            .send()
            .await
            .map_err(|e| AppError::PaymentGateway(format!("checkout request failed: {}", e)))?;

        Self::parse(response).await
    }

    /// Refund `amount_cents` of a captured payment intent
    pub async fn create_refund(
        &self,
        payment_intent_id: &str,
        amount_cents: i64,
    ) -> AppResult<GatewayRefund> {
        self.ensure_configured()?;

        let form = [
            ("payment_intent", payment_intent_id.to_string()),
            ("amount", amount_cents.to_string()),
        ];

        let response = self
            .client
            .post(format!("{}/refunds", self.base_url))
            .bearer_auth(&self.secret_key)
            .form(&form)
            .send()
            .await
            .map_err(|e| AppError::PaymentGateway(format!("refund request failed: {}", e)))?;

        Self::parse(response).await
    }

    async fn parse<T: for<'de> Deserialize<'de>>(response: reqwest::Response) -> AppResult<T> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<GatewayErrorBody>(&body)
                .map(|b| b.error.message)
                .unwrap_or(body);
            tracing::warn!("Payment gateway returned {}: {}", status, message);
            return Err(AppError::PaymentGateway(format!("{}: {}", status, message)));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| AppError::PaymentGateway(format!("unreadable gateway response: {}", e)))
    }
}

/// Split a `Stripe-Signature` header into its timestamp and every v1
/// signature it carries (more than one while a signing secret is rotated)
fn parse_signature_header(header: &str) -> Option<(i64, Vec<&str>)> {
    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse::<i64>().ok(),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }
    if signatures.is_empty() {
        return None;
    }
    Some((timestamp?, signatures))
}

/// Hex HMAC-SHA256 of `"{timestamp}.{payload}"`
pub fn sign_payload(secret: &str, timestamp: i64, payload: &[u8]) -> String {
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

/// Check a webhook's `Stripe-Signature` header against the raw body
pub fn verify_webhook_signature(
    header: &str,
    payload: &[u8],
    secret: &str,
    now: i64,
    tolerance_secs: i64,
) -> bool {
    if secret.is_empty() {
        return false;
    }
    let Some((timestamp, signatures)) = parse_signature_header(header) else {
        return false;
    };
    match now.checked_sub(timestamp) {
        Some(age) if age.unsigned_abs() <= tolerance_secs.unsigned_abs() => {}
        _ => return false,
    }
    let expected = sign_payload(secret, timestamp, payload);
    signatures
        .iter()
        .any(|signature| constant_time_eq(&expected, signature))
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

    const SECRET: &str = "whsec_test";

    #[test]
    fn test_valid_signature() {
        let body = br#"{"type":"checkout.session.completed"}"#;
        let sig = sign_payload(SECRET, 1_700_000_000, body);
        let header = format!("t=1700000000,v1={}", sig);
        assert!(verify_webhook_signature(&header, body, SECRET, 1_700_000_010, 300));
    }

    #[test]
    fn test_rejects_tampered_body_and_old_timestamps() {
        let body = b"{}";
        let sig = sign_payload(SECRET, 1_700_000_000, body);
        let header = format!("t=1700000000,v1={}", sig);
        assert!(!verify_webhook_signature(&header, b"{ }", SECRET, 1_700_000_000, 300));
        assert!(!verify_webhook_signature(&header, body, SECRET, 1_700_001_000, 300));
        assert!(!verify_webhook_signature(&header, body, "", 1_700_000_000, 300));
    }

    #[test]
    fn test_malformed_header() {
        assert!(parse_signature_header("v1=abc").is_none());
        assert!(parse_signature_header("t=notanumber,v1=abc").is_none());
        assert!(parse_signature_header("t=5").is_none());
        assert_eq!(parse_signature_header("t=5, v1=ab"), Some((5, vec!["ab"])));
    }

    #[test]
    fn test_extreme_timestamps_are_rejected() {
        let body = b"{}";
        for t in [i64::MIN, i64::MAX] {
            let header = format!("t={},v1={}", t, sign_payload(SECRET, t, body));
            assert!(!verify_webhook_signature(&header, body, SECRET, 1_700_000_000, 300));
        }
        let header = format!("t=0,v1={}", sign_payload(SECRET, 0, body));
        assert!(!verify_webhook_signature(&header, body, SECRET, i64::MIN, 300));
    }

    #[test]
    fn test_any_v1_signature_may_match() {
        let body = br#"{"type":"payment_intent.succeeded"}"#;
        let current = sign_payload(SECRET, 1_700_000_000, body);
        let previous = sign_payload("whsec_old", 1_700_000_000, body);

        let header = format!("t=1700000000,v1={},v1={}", previous, current);
        assert!(verify_webhook_signature(&header, body, SECRET, 1_700_000_000, 300));

        let header = format!("t=1700000000,v1={}", previous);
        assert!(!verify_webhook_signature(&header, body, SECRET, 1_700_000_000, 300));
    }
}
