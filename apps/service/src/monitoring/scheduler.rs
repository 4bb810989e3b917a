use anyhow::Result;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, watch};
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::engine::TransitionEngine;
use super::types::TickSummary;
use crate::clock::Clock;
use crate::database::models::{datetime_to_millis, millis_to_datetime};
use crate::database::{Database, MonitoredTarget};

/// What happened to one due target during a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TargetOutcome {
    Checked { transitioned: bool },
    Failed,
    SkippedInFlight,
    /// Deleted or checked elsewhere between listing and locking
    NoLongerDue,
}

/// Drives probe and transition for every due target on a fixed tick.
pub struct SchedulerLoop {
    db: Arc<dyn Database>,
    engine: Arc<TransitionEngine>,
    clock: Arc<dyn Clock>,
    tick: Duration,
    max_concurrent: usize,
    in_flight: Mutex<HashMap<Uuid, Arc<AsyncMutex<()>>>>,
}

impl SchedulerLoop {
    pub fn new(
        db: Arc<dyn Database>,
        engine: Arc<TransitionEngine>,
        clock: Arc<dyn Clock>,
        tick: Duration,
        max_concurrent: usize,
    ) -> Self {
        Self {
            db,
            engine,
            clock,
            tick,
            max_concurrent: max_concurrent.max(1),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Tick until `shutdown` fires. A tick already running is completed first.
    pub async fn run(&self, mut shutdown: watch::Receiver<()>) {
        let mut ticker = interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(tick_seconds = self.tick.as_secs(), "Scheduler loop started");

        loop {
            tokio::select! {
                biased;

                _ = shutdown.changed() => {
                    info!("Shutdown signal received, stopping scheduler loop.");
                    break;
                }

                _ = ticker.tick() => {
                    match self.run_tick().await {
                        Ok(summary) => info!(%summary, "Tick completed"),
                        Err(e) => error!(error = %e, "Tick aborted, could not list targets"),
                    }
                }
            }
        }

        info!("Scheduler loop gracefully shut down.");
    }

    /// One pass over all targets. Only a failure to list targets aborts the
    /// tick; per-target failures are counted and logged.
    pub async fn run_tick(&self) -> Result<TickSummary> {
        // one instant per tick, at the precision it is stored with
        let now = millis_to_datetime(datetime_to_millis(self.clock.now()))?;
        let targets = self.db.list_targets().await?;

        let mut summary = TickSummary { examined: targets.len(), ..TickSummary::default() };

        let due: Vec<MonitoredTarget> = targets
            .into_iter()
            .filter(|target| {
                let due = target.is_due(now);
                if !due {
                    debug!(target_id = %target.id, next_due = ?target.next_due(), "Target not due");
                }
                due
            })
            .collect();
        summary.due = due.len();

        let outcomes: Vec<TargetOutcome> = stream::iter(due)
            .map(|target| self.check_target(target, now))
            .buffer_unordered(self.max_concurrent)
            .collect()
            .await;

        for outcome in outcomes {
            match outcome {
                TargetOutcome::Checked { transitioned } => {
                    summary.checked += 1;
                    if transitioned {
                        summary.transitions += 1;
                    }
                }
                TargetOutcome::Failed => summary.failed += 1,
                TargetOutcome::SkippedInFlight => summary.skipped_in_flight += 1,
                TargetOutcome::NoLongerDue => {}
            }
        }

        self.forget_idle_locks();
        Ok(summary)
    }

    async fn check_target(&self, listed: MonitoredTarget, now: DateTime<Utc>) -> TargetOutcome {
        let lock = self.lock_for(listed.id);
        let Ok(_guard) = lock.try_lock_owned() else {
            warn!(target_id = %listed.id, url = %listed.url, "Previous check still in flight, skipping");
            return TargetOutcome::SkippedInFlight;
        };

        // Re-read under the lock so status and last_checked are current
        let target = match self.db.get_target(listed.id).await {
            Ok(Some(target)) => target,
            Ok(None) => {
                debug!(target_id = %listed.id, "Target deleted before its check");
                return TargetOutcome::NoLongerDue;
            }
            Err(e) => {
                error!(target_id = %listed.id, error = %e, "Failed to load target");
                return TargetOutcome::Failed;
            }
        };

        if !target.is_due(now) {
            debug!(target_id = %target.id, "Target checked concurrently, no longer due");
            return TargetOutcome::NoLongerDue;
        }

        match self.engine.run_cycle(&target, now).await {
            Ok(outcome) => TargetOutcome::Checked { transitioned: outcome.evaluation.transitioned },
            Err(_) => TargetOutcome::Failed,
        }
    }

    fn lock_for(&self, id: Uuid) -> Arc<AsyncMutex<()>> {
        let mut locks = self.in_flight.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        locks.entry(id).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
    }

    /// Drop lock entries nobody holds so deleted targets do not accumulate
    fn forget_idle_locks(&self) {
        let mut locks = self.in_flight.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{HistoryQuery, NewTarget};
    use crate::notifications::AlertDispatcher;
    use crate::testing::{
        FlakyStore, ManualClock, RecordingMailer, RecordingWebhook, ScriptedProbe, fixed_now,
        temp_database,
    };
    use crate::monitoring::types::Status;
    use chrono::TimeDelta;

    struct Harness {
        _dir: tempfile::TempDir,
        store: Arc<FlakyStore>,
        probe: Arc<ScriptedProbe>,
        clock: Arc<ManualClock>,
        webhook: Arc<RecordingWebhook>,
        scheduler: Arc<SchedulerLoop>,
    }

    async fn harness(probe: ScriptedProbe, max_concurrent: usize) -> Harness {
        let (dir, db) = temp_database().await;
        let store = Arc::new(FlakyStore::new(db));
        let probe = Arc::new(probe);
        let clock = Arc::new(ManualClock::new(fixed_now()));
        let webhook = Arc::new(RecordingWebhook::default());
        let dispatcher = Arc::new(AlertDispatcher::new(
            Some(Arc::new(RecordingMailer::default())),
            webhook.clone(),
            Duration::from_secs(5),
        ));
        let engine = Arc::new(TransitionEngine::new(store.clone(), probe.clone(), dispatcher));
        let scheduler = Arc::new(SchedulerLoop::new(
            store.clone(),
            engine,
            clock.clone(),
            Duration::from_secs(60),
            max_concurrent,
        ));
        Harness { _dir: dir, store, probe, clock, webhook, scheduler }
    }

    async fn add(store: &FlakyStore, url: &str, interval: u32) -> MonitoredTarget {
        store
            .insert_target(NewTarget::new("owner-1", url, interval).with_webhook("https://hooks.example.com/x"))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_tick_checks_only_due_targets() {
        let h = harness(ScriptedProbe::always(Status::Up), 4).await;
        let a = add(&h.store, "https://a.example.com", 5).await;
        let b = add(&h.store, "https://b.example.com", 15).await;

        let first = h.scheduler.run_tick().await.unwrap();
        assert_eq!(first, TickSummary { examined: 2, due: 2, checked: 2, transitions: 2, ..TickSummary::default() });

        // 5 minutes later only `a` is due again
        h.clock.advance(TimeDelta::minutes(5));
        let second = h.scheduler.run_tick().await.unwrap();
        assert_eq!(second, TickSummary { examined: 2, due: 1, checked: 1, ..TickSummary::default() });

        let a_history = h.store.query_history(&HistoryQuery::for_target(a.id)).await.unwrap();
        let b_history = h.store.query_history(&HistoryQuery::for_target(b.id)).await.unwrap();
        assert_eq!(a_history.len(), 2);
        assert_eq!(b_history.len(), 1);
        assert_eq!(h.probe.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_failed_target_does_not_abort_tick() {
        let h = harness(ScriptedProbe::always(Status::Down), 1).await;
        add(&h.store, "https://a.example.com", 5).await;
        add(&h.store, "https://b.example.com", 5).await;
        h.store.fail_record_check(true);

        let summary = h.scheduler.run_tick().await.unwrap();
        assert_eq!(summary.due, 2);
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.checked, 0);
        assert!(h.webhook.posts().is_empty());

        // still due on the next tick since nothing was committed
        h.store.fail_record_check(false);
        h.clock.advance(TimeDelta::minutes(1));
        let retry = h.scheduler.run_tick().await.unwrap();
        assert_eq!(retry.checked, 2);
        assert_eq!(retry.transitions, 2);
    }

    #[tokio::test]
    async fn test_overlapping_tick_skips_in_flight_target() {
        let (probe, entered, release) = ScriptedProbe::gated(Status::Up);
        let h = harness(probe, 4).await;
        let target = add(&h.store, "https://slow.example.com", 1).await;

        let first = tokio::spawn({
            let scheduler = h.scheduler.clone();
            async move { scheduler.run_tick().await }
        });
        entered.notified().await;

        let overlapping = h.scheduler.run_tick().await.unwrap();
        assert_eq!(overlapping.due, 1);
        assert_eq!(overlapping.skipped_in_flight, 1);
        assert_eq!(overlapping.checked, 0);

        release.add_permits(1);
        let first = first.await.unwrap().unwrap();
        assert_eq!(first.checked, 1);
        assert_eq!(first.transitions, 1);

        let history = h.store.query_history(&HistoryQuery::for_target(target.id)).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(h.webhook.posts().len(), 1);
    }

    #[tokio::test]
    async fn test_tick_instant_matches_stored_precision() {
        let h = harness(ScriptedProbe::always(Status::Up), 1).await;
        let target = add(&h.store, "https://a.example.com", 5).await;
        h.clock.advance(TimeDelta::nanoseconds(1_234_567));

        h.scheduler.run_tick().await.unwrap();

        let expected = fixed_now() + TimeDelta::milliseconds(1);
        let stored = h.store.get_target(target.id).await.unwrap().unwrap();
        let history = h.store.query_history(&HistoryQuery::for_target(target.id)).await.unwrap();
        assert_eq!(stored.last_checked, Some(expected));
        assert_eq!(history[0].checked_at, expected);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let h = harness(ScriptedProbe::always(Status::Up), 2).await;
        add(&h.store, "https://a.example.com", 5).await;

        let (shutdown_tx, shutdown_rx) = watch::channel(());
        let handle = tokio::spawn({
            let scheduler = h.scheduler.clone();
            async move { scheduler.run(shutdown_rx).await }
        });

        // the first interval tick fires immediately
        let mut waited = 0;
        while h.probe.calls().is_empty() && waited < 100 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            waited += 1;
        }
        assert_eq!(h.probe.calls().len(), 1);

        shutdown_tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();
    }
}
