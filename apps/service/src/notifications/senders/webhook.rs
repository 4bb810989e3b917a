use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use super::{SenderError, WebhookSender, ensure_success};

/// A sender for pushing alerts to an owner-configured webhook.
pub struct HttpWebhookSender {
    client: Client,
}

impl HttpWebhookSender {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl Default for HttpWebhookSender {
    fn default() -> Self {
        Self::new(Client::new())
    }
}

#[async_trait]
impl WebhookSender for HttpWebhookSender {
    async fn post(
        &self,
        url: &str,
        payload: &serde_json::Value,
        timeout: Duration,
    ) -> Result<(), SenderError> {
        let response = self.client.post(url).timeout(timeout).json(payload).send().await?;
        ensure_success(response, "Webhook").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_posts_json_payload() {
        let server = MockServer::start().await;
        let payload = json!({"url": "https://example.com", "old_status": "UP", "new_status": "DOWN"});

        Mock::given(method("POST"))
            .and(path("/hook"))
            .and(header("content-type", "application/json"))
            .and(body_json(&payload))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let sender = HttpWebhookSender::default();
        sender
            .post(&format!("{}/hook", server.uri()), &payload, Duration::from_secs(2))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_non_success_status_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let sender = HttpWebhookSender::default();
        let err = sender.post(&server.uri(), &json!({}), Duration::from_secs(2)).await.unwrap_err();

        match err {
            SenderError::SendFailed(message) => {
                assert!(message.contains("500"));
                assert!(message.contains("boom"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_timeout_is_network_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let sender = HttpWebhookSender::default();
        let err = sender.post(&server.uri(), &json!({}), Duration::from_millis(100)).await.unwrap_err();
        assert!(matches!(err, SenderError::NetworkError(_)));
    }
}
