use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::StatusChange;
use super::senders::{MailSender, SenderError, WebhookSender};
use crate::database::MonitoredTarget;
use crate::monitoring::types::Status;

/// What happened on one channel for one dispatch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "lowercase")]
pub enum ChannelOutcome {
    Delivered,
    /// Channel not configured for the target (or no mail relay available)
    Skipped,
    Failed(String),
}

impl ChannelOutcome {
    fn from_result(result: Result<(), SenderError>) -> Self {
        match result {
            Ok(()) => ChannelOutcome::Delivered,
            Err(e) => ChannelOutcome::Failed(e.to_string()),
        }
    }

    pub fn attempted(&self) -> bool {
        !matches!(self, ChannelOutcome::Skipped)
    }
}

/// Per-channel result of a dispatch. Informational only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    pub email: ChannelOutcome,
    pub webhook: ChannelOutcome,
}

impl DispatchReport {
    pub fn attempted(&self) -> usize {
        [&self.email, &self.webhook].into_iter().filter(|o| o.attempted()).count()
    }
}

/// Sends one alert per configured channel for a status transition.
///
/// Channels are independent: a failure on one neither blocks the other nor
/// surfaces to the caller. It does not de-duplicate; callers only invoke it
/// when the status actually changed. Every send is bounded by its channel
/// timeout, so a stalled endpoint ends as `Failed`.
pub struct AlertDispatcher {
    mailer: Option<Arc<dyn MailSender>>,
    webhook: Arc<dyn WebhookSender>,
    webhook_timeout: Duration,
    mail_timeout: Duration,
}

impl AlertDispatcher {
    pub fn new(
        mailer: Option<Arc<dyn MailSender>>,
        webhook: Arc<dyn WebhookSender>,
        webhook_timeout: Duration,
    ) -> Self {
        Self { mailer, webhook, webhook_timeout, mail_timeout: webhook_timeout }
    }

    pub fn with_mail_timeout(mut self, mail_timeout: Duration) -> Self {
        self.mail_timeout = mail_timeout;
        self
    }

    pub async fn dispatch(
        &self,
        target: &MonitoredTarget,
        old_status: Status,
        new_status: Status,
    ) -> DispatchReport {
        let change = StatusChange {
            target_id: target.id,
            url: target.url.clone(),
            old_status,
            new_status,
        };

        let (email, webhook) = tokio::join!(
            self.send_email(target.notify_email.as_deref(), &change),
            self.send_webhook(target.webhook_url.as_deref(), &change),
        );

        let report = DispatchReport { email, webhook };
        log_outcome("email", &change, &report.email);
        log_outcome("webhook", &change, &report.webhook);
        report
    }

    async fn send_email(&self, to: Option<&str>, change: &StatusChange) -> ChannelOutcome {
        let Some(to) = to.map(str::trim).filter(|to| !to.is_empty()) else {
            return ChannelOutcome::Skipped;
        };

        let Some(mailer) = &self.mailer else {
            warn!(target_id = %change.target_id, "Email alert requested but no mail relay is configured");
            return ChannelOutcome::Skipped;
        };

        bounded(self.mail_timeout, mailer.send(to, &change.subject(), &change.body())).await
    }

    async fn send_webhook(&self, url: Option<&str>, change: &StatusChange) -> ChannelOutcome {
        let Some(url) = url.map(str::trim).filter(|url| !url.is_empty()) else {
            return ChannelOutcome::Skipped;
        };

        let payload = match serde_json::to_value(change) {
            Ok(payload) => payload,
            Err(e) => return ChannelOutcome::Failed(e.to_string()),
        };

        bounded(self.webhook_timeout, self.webhook.post(url, &payload, self.webhook_timeout)).await
    }
}

async fn bounded(limit: Duration, send: impl Future<Output = Result<(), SenderError>>) -> ChannelOutcome {
    match timeout(limit, send).await {
        Ok(result) => ChannelOutcome::from_result(result),
        Err(_) => ChannelOutcome::Failed(format!("timed out after {}ms", limit.as_millis())),
    }
}

fn log_outcome(channel: &'static str, change: &StatusChange, outcome: &ChannelOutcome) {
    let old = change.old_status.as_str();
    let new = change.new_status.as_str();

    match outcome {
        ChannelOutcome::Delivered => {
            info!(target_id = %change.target_id, url = %change.url, old, new, channel, "Alert delivered")
        }
        ChannelOutcome::Skipped => {
            debug!(target_id = %change.target_id, channel, "Alert channel not configured")
        }
        ChannelOutcome::Failed(reason) => warn!(
            target_id = %change.target_id,
            url = %change.url,
            old,
            new,
            channel,
            error = %reason,
            "Alert delivery failed"
        ),
    }
}
