use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

pub mod mail;
pub mod webhook;

pub use mail::HttpMailRelay;
pub use webhook::HttpWebhookSender;

#[derive(Error, Debug)]
pub enum SenderError {
    #[error("Failed to send notification: {0}")]
    SendFailed(String),
    #[error("Invalid configuration for sender: {0}")]
    InvalidConfiguration(String),
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),
}

/// Delivers one plain-text email.
#[async_trait]
pub trait MailSender: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), SenderError>;
}

/// Posts one JSON payload to a webhook URL.
#[async_trait]
pub trait WebhookSender: Send + Sync {
    async fn post(
        &self,
        url: &str,
        payload: &serde_json::Value,
        timeout: Duration,
    ) -> Result<(), SenderError>;
}

/// Turn a non-2xx response into `SendFailed`, keeping the body for the log.
pub(crate) async fn ensure_success(
    response: reqwest::Response,
    what: &str,
) -> Result<(), SenderError> {
    let status = response.status();

    if !status.is_success() {
        let error_body =
            response.text().await.unwrap_or_else(|_| "Failed to read error body".to_string());
        return Err(SenderError::SendFailed(format!(
            "{what} returned non-success status: {status}. Body: {error_body}"
        )));
    }

    Ok(())
}
