use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::notifications::{NotificationSender, OutboundMessage};
use crate::error::SendError;

const RESEND_EMAILS_URL: &str = "https://api.resend.com/emails";

#[derive(Clone)]
pub struct ResendSender {
    http: Client,
    api_key: String,
    endpoint: String,
}

impl ResendSender {
    /// `None` when no API key is configured; the engine then records deliveries as failed.
    pub fn from_api_key(api_key: &str) -> Option<Self> {
        if api_key.trim().is_empty() {
            return None;
        }
        Some(Self::with_endpoint(api_key.to_string(), RESEND_EMAILS_URL.to_string()))
    }

    pub fn with_endpoint(api_key: String, endpoint: String) -> Self {
        Self {
            http: Client::new(),
            api_key,
            endpoint,
        }
    }
}

#[derive(Serialize)]
struct SendEmailRequest<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    html: &'a str,
}

#[derive(Deserialize)]
struct ErrorResponse {
    message: Option<String>,
}

#[async_trait]
impl NotificationSender for ResendSender {
    async fn send(&self, message: &OutboundMessage) -> Result<(), SendError> {
        let body = SendEmailRequest {
            from: &message.from,
            to: &message.to,
            subject: &message.subject,
            html: &message.html,
        };

        let res = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| SendError::Transport(e.to_string()))?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            let reason = serde_json::from_str::<ErrorResponse>(&text)
                .ok()
                .and_then(|e| e.message)
                .unwrap_or(text);
            return Err(SendError::Rejected(format!("Resend send failed: {status} {reason}")));
        }

        Ok(())
    }
}
