//! Test doubles shared by the engine, scheduler and dispatcher tests.

use anyhow::{Result, bail};
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::{Notify, Semaphore};
use uuid::Uuid;

use crate::clock::Clock;
use crate::database::{
    CheckRecord, Database, DatabaseImpl, HistoryQuery, HistoryRecord, MonitoredTarget, NewTarget,
    OwnerEdit, StatusCounts,
};
use crate::monitoring::checker::Probe;
use crate::monitoring::types::Status;
use crate::notifications::senders::{MailSender, SenderError, WebhookSender};

/// A fresh migrated database in a temporary directory. Keep the `TempDir`
/// alive for as long as the database is used.
pub async fn temp_database() -> (TempDir, DatabaseImpl) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("beacon-test.db");
    let db = crate::database::open(path.to_str().unwrap(), 4).await.unwrap();
    (dir, db)
}

pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap()
}

pub fn sample_target() -> MonitoredTarget {
    MonitoredTarget {
        id: Uuid::new_v4(),
        owner_id: "owner-1".into(),
        url: "https://example.com/health".into(),
        check_interval_minutes: 5,
        status: Status::Unknown,
        last_checked: None,
        webhook_url: None,
        notify_email: None,
        created_at: fixed_now(),
        updated_at: fixed_now(),
    }
}

pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(now) }
    }

    pub fn advance(&self, by: TimeDelta) {
        *self.now.lock().unwrap() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// Returns scripted statuses per URL, falling back to a default.
pub struct ScriptedProbe {
    default: Status,
    scripts: Mutex<HashMap<String, VecDeque<Status>>>,
    calls: Mutex<Vec<String>>,
    gate: Option<(Arc<Notify>, Arc<Semaphore>)>,
}

impl ScriptedProbe {
    pub fn always(status: Status) -> Self {
        Self { default: status, scripts: Mutex::default(), calls: Mutex::default(), gate: None }
    }

    /// Every probe signals `entered`, then waits for a permit on `release`.
    pub fn gated(status: Status) -> (Self, Arc<Notify>, Arc<Semaphore>) {
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Semaphore::new(0));
        let mut probe = Self::always(status);
        probe.gate = Some((entered.clone(), release.clone()));
        (probe, entered, release)
    }

    pub fn script(&self, url: &str, statuses: impl IntoIterator<Item = Status>) {
        self.scripts.lock().unwrap().entry(url.to_string()).or_default().extend(statuses);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Probe for ScriptedProbe {
    async fn probe(&self, url: &str) -> Status {
        self.calls.lock().unwrap().push(url.to_string());

        if let Some((entered, release)) = &self.gate {
            entered.notify_one();
            if let Ok(permit) = release.acquire().await {
                permit.forget();
            }
        }

        self.scripts
            .lock()
            .unwrap()
            .get_mut(url)
            .and_then(VecDeque::pop_front)
            .unwrap_or(self.default)
    }
}

#[derive(Debug, Clone)]
pub struct SentMail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<SentMail>>,
    fail: bool,
}

impl RecordingMailer {
    pub fn failing() -> Self {
        Self { sent: Mutex::default(), fail: true }
    }

    pub fn sent(&self) -> Vec<SentMail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MailSender for RecordingMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), SenderError> {
        if self.fail {
            return Err(SenderError::SendFailed("mail relay unavailable".into()));
        }
        self.sent.lock().unwrap().push(SentMail {
            to: to.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}

/// A relay that accepts the request and never answers
#[derive(Default)]
pub struct StalledMailer;

#[async_trait]
impl MailSender for StalledMailer {
    async fn send(&self, _to: &str, _subject: &str, _body: &str) -> Result<(), SenderError> {
        std::future::pending().await
    }
}

#[derive(Debug, Clone)]
pub struct WebhookPost {
    pub url: String,
    pub payload: serde_json::Value,
}

#[derive(Default)]
pub struct RecordingWebhook {
    posts: Mutex<Vec<WebhookPost>>,
    fail: bool,
}

impl RecordingWebhook {
    pub fn failing() -> Self {
        Self { posts: Mutex::default(), fail: true }
    }

    pub fn posts(&self) -> Vec<WebhookPost> {
        self.posts.lock().unwrap().clone()
    }
}

#[async_trait]
impl WebhookSender for RecordingWebhook {
    async fn post(
        &self,
        url: &str,
        payload: &serde_json::Value,
        _timeout: Duration,
    ) -> Result<(), SenderError> {
        if self.fail {
            return Err(SenderError::SendFailed("webhook endpoint returned 500".into()));
        }
        self.posts.lock().unwrap().push(WebhookPost { url: url.to_string(), payload: payload.clone() });
        Ok(())
    }
}

/// Delegates to a real database but can be told to fail `record_check`.
pub struct FlakyStore {
    inner: DatabaseImpl,
    fail_record: AtomicBool,
}

impl FlakyStore {
    pub fn new(inner: DatabaseImpl) -> Self {
        Self { inner, fail_record: AtomicBool::new(false) }
    }

    pub fn fail_record_check(&self, fail: bool) {
        self.fail_record.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl Database for FlakyStore {
    async fn list_targets(&self) -> Result<Vec<MonitoredTarget>> {
        self.inner.list_targets().await
    }

    async fn get_target(&self, id: Uuid) -> Result<Option<MonitoredTarget>> {
        self.inner.get_target(id).await
    }

    async fn insert_target(&self, new: NewTarget) -> Result<MonitoredTarget> {
        self.inner.insert_target(new).await
    }

    async fn update_owner_fields(&self, id: Uuid, edit: OwnerEdit) -> Result<Option<MonitoredTarget>> {
        self.inner.update_owner_fields(id, edit).await
    }

    async fn record_check(&self, record: &CheckRecord) -> Result<()> {
        if self.fail_record.load(Ordering::SeqCst) {
            bail!("database is locked");
        }
        self.inner.record_check(record).await
    }

    async fn delete_target(&self, id: Uuid) -> Result<bool> {
        self.inner.delete_target(id).await
    }

    async fn query_history(&self, query: &HistoryQuery) -> Result<Vec<HistoryRecord>> {
        self.inner.query_history(query).await
    }

    async fn status_counts(&self, owner_id: &str) -> Result<StatusCounts> {
        self.inner.status_counts(owner_id).await
    }
}
