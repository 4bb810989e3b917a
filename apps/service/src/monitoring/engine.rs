use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};
use uuid::Uuid;

use super::checker::Probe;
use super::types::{Evaluation, Status};
use crate::database::{CheckRecord, Database, MonitoredTarget};
use crate::notifications::{AlertDispatcher, DispatchReport};

#[derive(Debug, Error)]
pub enum CycleError {
    /// History row and status update were rolled back together; no alert was sent.
    #[error("failed to persist check for target {target_id}: {source}")]
    Persist {
        target_id: Uuid,
        #[source]
        source: anyhow::Error,
    },
}

/// Result of one committed check cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleOutcome {
    pub evaluation: Evaluation,
    pub checked_at: DateTime<Utc>,
    /// Present only when the cycle transitioned
    pub alerts: Option<DispatchReport>,
}

/// Decides whether a probe result is a transition and applies it exactly once.
pub struct TransitionEngine {
    db: Arc<dyn Database>,
    probe: Arc<dyn Probe>,
    dispatcher: Arc<AlertDispatcher>,
}

impl TransitionEngine {
    pub fn new(db: Arc<dyn Database>, probe: Arc<dyn Probe>, dispatcher: Arc<AlertDispatcher>) -> Self {
        Self { db, probe, dispatcher }
    }

    /// Compare a fresh probe result with the stored status
    pub fn evaluate(target: &MonitoredTarget, probed_status: Status) -> Evaluation {
        Evaluation {
            old_status: target.status,
            new_status: probed_status,
            transitioned: probed_status != target.status,
        }
    }

    /// Commit history, status and last_checked as one unit, then alert on
    /// transitions. `target` is the row as read before the probe; its status
    /// is the "old" side of the alert.
    pub async fn apply(
        &self,
        target: &MonitoredTarget,
        evaluation: Evaluation,
        now: DateTime<Utc>,
    ) -> Result<CycleOutcome, CycleError> {
        let record = CheckRecord::for_target(target, evaluation.new_status, now);

        if let Err(source) = self.db.record_check(&record).await {
            error!(
                target_id = %target.id,
                url = %target.url,
                old = %evaluation.old_status,
                new = %evaluation.new_status,
                error = %source,
                "Check cycle abandoned, nothing persisted"
            );
            return Err(CycleError::Persist { target_id: target.id, source });
        }

        let alerts = if evaluation.transitioned {
            info!(
                target_id = %target.id,
                url = %target.url,
                old = %evaluation.old_status,
                new = %evaluation.new_status,
                "Status changed"
            );
            Some(self.dispatcher.dispatch(target, evaluation.old_status, evaluation.new_status).await)
        } else {
            None
        };

        Ok(CycleOutcome { evaluation, checked_at: now, alerts })
    }

    /// Probe, evaluate and apply for one target
    pub async fn run_cycle(
        &self,
        target: &MonitoredTarget,
        now: DateTime<Utc>,
    ) -> Result<CycleOutcome, CycleError> {
        let probed = self.probe.probe(&target.url).await;
        let evaluation = Self::evaluate(target, probed);
        tracing::debug!(
            target_id = %target.id,
            url = %target.url,
            status = %probed,
            transitioned = evaluation.transitioned,
            "Target probed"
        );
        self.apply(target, evaluation, now).await
    }
}
