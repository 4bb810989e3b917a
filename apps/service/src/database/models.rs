use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::monitoring::types::Status;
use crate::validation::{self, ValidationError};

/// A URL under monitoring, as stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitoredTarget {
    pub id: Uuid,
    pub owner_id: String,
    pub url: String,
    pub check_interval_minutes: u32,
    pub status: Status,
    /// `None` until the first check cycle commits
    pub last_checked: Option<DateTime<Utc>>,
    pub webhook_url: Option<String>,
    pub notify_email: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MonitoredTarget {
    pub fn check_interval(&self) -> TimeDelta {
        TimeDelta::minutes(i64::from(self.check_interval_minutes))
    }

    /// Never-checked targets are always due; otherwise due once the interval
    /// has fully elapsed (the boundary instant counts as due).
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        match self.last_checked {
            None => true,
            Some(last) => last + self.check_interval() <= now,
        }
    }

    /// Earliest instant at which the target becomes due again
    pub fn next_due(&self) -> Option<DateTime<Utc>> {
        self.last_checked.map(|last| last + self.check_interval())
    }
}

/// Owner-supplied fields for creating a target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTarget {
    pub owner_id: String,
    pub url: String,
    pub check_interval_minutes: u32,
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default)]
    pub notify_email: Option<String>,
}

impl NewTarget {
    pub fn new(owner_id: impl Into<String>, url: impl Into<String>, check_interval_minutes: u32) -> Self {
        Self {
            owner_id: owner_id.into(),
            url: url.into(),
            check_interval_minutes,
            webhook_url: None,
            notify_email: None,
        }
    }

    pub fn with_webhook(mut self, webhook_url: impl Into<String>) -> Self {
        self.webhook_url = Some(webhook_url.into());
        self
    }

    pub fn with_email(mut self, notify_email: impl Into<String>) -> Self {
        self.notify_email = Some(notify_email.into());
        self
    }

    /// Validate every field and return the normalised form to store
    pub fn validated(self) -> Result<Self, ValidationError> {
        if self.owner_id.trim().is_empty() {
            return Err(ValidationError::Empty { field: "owner_id" });
        }

        Ok(Self {
            owner_id: self.owner_id.trim().to_string(),
            url: validation::validate_http_url("url", &self.url)?,
            check_interval_minutes: validation::validate_interval(self.check_interval_minutes)?,
            webhook_url: validation::normalize_webhook(self.webhook_url.as_deref())?,
            notify_email: validation::normalize_email(self.notify_email.as_deref())?,
        })
    }
}

/// Partial update of the owner-writable fields.
///
/// `None` leaves a field untouched. For the two channels, a blank string
/// clears the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerEdit {
    pub url: Option<String>,
    pub check_interval_minutes: Option<u32>,
    pub webhook_url: Option<String>,
    pub notify_email: Option<String>,
}

impl OwnerEdit {
    pub fn is_empty(&self) -> bool {
        self.url.is_none()
            && self.check_interval_minutes.is_none()
            && self.webhook_url.is_none()
            && self.notify_email.is_none()
    }

    /// Merge onto the current row, validating the fields being changed
    pub fn apply_to(&self, target: &MonitoredTarget) -> Result<MonitoredTarget, ValidationError> {
        let mut updated = target.clone();

        if let Some(url) = &self.url {
            updated.url = validation::validate_http_url("url", url)?;
        }
        if let Some(minutes) = self.check_interval_minutes {
            updated.check_interval_minutes = validation::validate_interval(minutes)?;
        }
        if let Some(webhook) = &self.webhook_url {
            updated.webhook_url = validation::normalize_webhook(Some(webhook.as_str()))?;
        }
        if let Some(email) = &self.notify_email {
            updated.notify_email = validation::normalize_email(Some(email.as_str()))?;
        }

        Ok(updated)
    }
}

/// The engine-owned write for one evaluated check: a history row plus the new
/// status and last_checked, committed together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckRecord {
    pub target_id: Uuid,
    pub status: Status,
    pub checked_at: DateTime<Utc>,
    /// url and interval snapshot at check time
    pub url: String,
    pub check_interval_minutes: u32,
}

impl CheckRecord {
    pub fn for_target(target: &MonitoredTarget, status: Status, checked_at: DateTime<Utc>) -> Self {
        Self {
            target_id: target.id,
            status,
            checked_at,
            url: target.url.clone(),
            check_interval_minutes: target.check_interval_minutes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: i64,
    pub target_id: Uuid,
    pub status: Status,
    pub checked_at: DateTime<Utc>,
    pub url: String,
    pub check_interval_minutes: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryOrder {
    #[default]
    Ascending,
    Descending,
}

impl HistoryOrder {
    pub(crate) fn as_sql(&self) -> &'static str {
        match self {
            HistoryOrder::Ascending => "ASC",
            HistoryOrder::Descending => "DESC",
        }
    }
}

/// Filter for history reads. Every bound is optional; `from`/`to` are inclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryQuery {
    pub owner_id: Option<String>,
    pub target_id: Option<Uuid>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub order: HistoryOrder,
    pub limit: Option<usize>,
}

impl HistoryQuery {
    pub fn for_target(target_id: Uuid) -> Self {
        Self { target_id: Some(target_id), ..Self::default() }
    }

    pub fn for_owner(owner_id: impl Into<String>) -> Self {
        Self { owner_id: Some(owner_id.into()), ..Self::default() }
    }

    pub fn newest_first(mut self) -> Self {
        self.order = HistoryOrder::Descending;
        self
    }
}

/// History row counts per status for one owner
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    #[serde(rename = "UP")]
    pub up: u64,
    #[serde(rename = "DOWN")]
    pub down: u64,
    #[serde(rename = "UNKNOWN")]
    pub unknown: u64,
}

impl StatusCounts {
    pub fn add(&mut self, status: Status, count: u64) {
        match status {
            Status::Up => self.up += count,
            Status::Down => self.down += count,
            Status::Unknown => self.unknown += count,
        }
    }

    pub fn total(&self) -> u64 {
        self.up + self.down + self.unknown
    }
}

/// Stored timestamps are unix milliseconds
pub(crate) fn datetime_to_millis(time: DateTime<Utc>) -> i64 {
    time.timestamp_millis()
}

pub(crate) fn millis_to_datetime(millis: i64) -> anyhow::Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| anyhow::anyhow!("timestamp out of range: {millis}"))
}
