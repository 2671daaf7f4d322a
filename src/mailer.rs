use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::time::Duration;

use crate::config::DeliveryConfig;

/// Payload accepted by a Resend-compatible `POST /emails`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutboundEmail {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub html: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachments: Option<Vec<OutboundAttachment>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutboundAttachment {
    pub filename: String,
    /// Base64-encoded file body.
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DeliveryReceipt {
    pub id: String,
}

/// A failed hand-off to the delivery provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryError {
    /// HTTP status, when the provider answered at all.
    pub status: Option<u16>,
    pub message: String,
}

impl DeliveryError {
    pub fn new(status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// Whether the provider refused the message for its size.
    pub fn is_size_related(&self) -> bool {
        if self.status == Some(413) {
            return true;
        }
        let message = self.message.to_lowercase();
        ["size", "too large", "payload", "limit"]
            .iter()
            .any(|needle| message.contains(needle))
    }
}

impl fmt::Display for DeliveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "delivery failed ({}): {}", status, self.message),
            None => write!(f, "delivery failed: {}", self.message),
        }
    }
}

impl std::error::Error for DeliveryError {}

/// Anything that can hand an e-mail to a delivery provider.
pub trait MailTransport: Send + Sync {
    fn send(
        &self,
        email: &OutboundEmail,
    ) -> impl Future<Output = Result<DeliveryReceipt, DeliveryError>> + Send;
}

#[derive(Deserialize)]
struct ProviderError {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

/// Client for the Resend HTTP API.
#[derive(Clone)]
pub struct ResendClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl ResendClient {
    pub fn new(config: &DeliveryConfig) -> Result<Self, DeliveryError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                DeliveryError::new(None, format!("Failed to create delivery client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
        })
    }
}

impl MailTransport for ResendClient {
    async fn send(&self, email: &OutboundEmail) -> Result<DeliveryReceipt, DeliveryError> {
        let url = format!("{}/emails", self.base_url);
        tracing::info!("Sending notification '{}' via {}", email.subject, url);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(email)
            .send()
            .await
            .map_err(|e| DeliveryError::new(None, format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            let message = match serde_json::from_str::<ProviderError>(&body) {
                Ok(ProviderError {
                    message: Some(message),
                    ..
                }) => message,
                Ok(ProviderError {
                    name: Some(name), ..
                }) => name,
                _ => body,
            };
            return Err(DeliveryError::new(Some(status.as_u16()), message));
        }

        response.json::<DeliveryReceipt>().await.map_err(|e| {
            DeliveryError::new(
                Some(status.as_u16()),
                format!("Failed to parse delivery response: {}", e),
            )
        })
    }
}
