//! Alert delivery for status transitions.

pub mod dispatcher;
pub mod senders;

pub use dispatcher::{AlertDispatcher, ChannelOutcome, DispatchReport};
pub use senders::{MailSender, SenderError, WebhookSender};

use serde::Serialize;
use uuid::Uuid;

use crate::monitoring::types::Status;

/// Channel-agnostic alert payload. The pair is always (old, new).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusChange {
    pub target_id: Uuid,
    pub url: String,
    pub old_status: Status,
    pub new_status: Status,
}

impl StatusChange {
    pub fn subject(&self) -> String {
        format!("Status Change Alert for {}", self.url)
    }

    pub fn body(&self) -> String {
        format!(
            "The status of {} has changed from {} to {}.",
            self.url, self.old_status, self.new_status
        )
    }
}
