use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

use super::{MailSender, SenderError, ensure_success};
use crate::config::MailConfig;

/// Sends mail through an HTTP relay that accepts
/// `{"from", "to", "subject", "text"}` as JSON.
pub struct HttpMailRelay {
    client: Client,
    endpoint: String,
    api_token: Option<String>,
    from: String,
    timeout: Duration,
}

#[derive(Serialize)]
struct RelayMessage<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
}

impl HttpMailRelay {
    pub fn new(client: Client, config: &MailConfig, timeout: Duration) -> Self {
        Self {
            client,
            endpoint: config.endpoint.clone(),
            api_token: config.api_token.clone().filter(|t| !t.is_empty()),
            from: config.from.clone(),
            timeout,
        }
    }
}

#[async_trait]
impl MailSender for HttpMailRelay {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), SenderError> {
        if to.trim().is_empty() {
            return Err(SenderError::InvalidConfiguration("empty recipient".to_string()));
        }

        let message = RelayMessage { from: &self.from, to, subject, text: body };
        let mut request = self.client.post(&self.endpoint).timeout(self.timeout).json(&message);
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        ensure_success(response, "Mail relay").await
    }
}
