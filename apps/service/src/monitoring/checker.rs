use anyhow::Result;
use std::time::{Duration, Instant};
use tokio::time::timeout;

use super::types::Status;
use crate::config::Config;

/// A single health check against one URL.
///
/// Implementations never fail: every failure mode is reported as `Down`.
#[async_trait::async_trait]
pub trait Probe: Send + Sync {
    async fn probe(&self, url: &str) -> Status;
}

/// HTTP(S) GET probe
pub struct HttpProbe {
    client: reqwest::Client,
    timeout_duration: Duration,
}

impl HttpProbe {
    pub fn new(timeout_duration: Duration, max_redirects: usize, user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout_duration)
            .redirect(reqwest::redirect::Policy::limited(max_redirects))
            .user_agent(user_agent)
            .build()?;

        Ok(Self { client, timeout_duration })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(config.probe_timeout(), config.probe.max_redirects, &config.probe.user_agent)
    }
}

#[async_trait::async_trait]
impl Probe for HttpProbe {
    async fn probe(&self, url: &str) -> Status {
        let start = Instant::now();

        // The client timeout covers the request; the outer one also bounds
        // anything the client does not (e.g. a stalled DNS resolver).
        let response = match timeout(self.timeout_duration, self.client.get(url).send()).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                tracing::debug!(url, error = %e, "Probe request failed");
                return Status::Down;
            }
            Err(_) => {
                tracing::debug!(url, timeout_ms = self.timeout_duration.as_millis() as u64, "Probe timed out");
                return Status::Down;
            }
        };

        let code = response.status().as_u16();
        let status = Status::from_status_code(code);
        tracing::debug!(
            url,
            code,
            %status,
            latency_ms = start.elapsed().as_millis() as u64,
            "Probe completed"
        );
        status
    }
}
