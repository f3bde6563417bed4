//! Outgoing mail through an HTTP relay
//!
//! Messages are posted as JSON to the configured relay endpoint. With no
//! relay configured, messages are only logged.

use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

use crate::config::NotificationConfig;
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutgoingMail {
    pub to: Vec<String>,
    pub subject: String,
    pub text: String,
}

#[derive(Serialize)]
struct RelayPayload<'a> {
    from: &'a str,
    to: &'a [String],
    subject: &'a str,
    text: &'a str,
}

#[derive(Clone)]
pub struct MailRelayClient {
    client: Client,
    relay_url: String,
    from_address: String,
}

impl MailRelayClient {
    pub fn new(config: &NotificationConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            client,
            relay_url: config.relay_url.trim().to_string(),
            from_address: config.from_address.clone(),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.relay_url.is_empty()
    }

    pub async fn send(&self, mail: &OutgoingMail) -> AppResult<()> {
        if mail.to.is_empty() {
            return Ok(());
        }
        if !self.is_configured() {
            tracing::info!(
                "Mail relay not configured; skipping \"{}\" to {} recipient(s)",
                mail.subject,
                mail.to.len()
            );
            return Ok(());
        }

        let response = self
            .client
            .post(&self.relay_url)
            .json(&RelayPayload {
                from: &self.from_address,
                to: &mail.to,
                subject: &mail.subject,
                text: &mail.text,
            })
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("mail relay unreachable: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Internal(format!("mail relay returned {}", status)));
        }
        tracing::debug!("Sent \"{}\" to {} recipient(s)", mail.subject, mail.to.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(relay_url: &str) -> NotificationConfig {
        NotificationConfig {
            relay_url: relay_url.to_string(),
            from_address: "tienda@example.com".to_string(),
            timeout_secs: 1,
        }
    }

    fn mail() -> OutgoingMail {
        OutgoingMail {
            to: vec!["cliente@example.com".to_string()],
            subject: "Devolución".to_string(),
            text: "Hola".to_string(),
        }
    }

    #[tokio::test]
    async fn test_unconfigured_relay_only_logs() {
        let relay = MailRelayClient::new(&config(""));
        assert!(!relay.is_configured());
        assert!(relay.send(&mail()).await.is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_relay_is_an_error() {
        let relay = MailRelayClient::new(&config("http://127.0.0.1:9/send"));
        assert!(relay.send(&mail()).await.is_err());
    }
}
