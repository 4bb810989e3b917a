use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use chrono::Utc;
use libsql::{Row, Value, params, params::Params};
use uuid::Uuid;

use super::models::{
    CheckRecord, HistoryQuery, HistoryRecord, MonitoredTarget, NewTarget, OwnerEdit, StatusCounts,
    datetime_to_millis, millis_to_datetime,
};
use crate::monitoring::types::Status;
use crate::pool::LibsqlPool;

const TARGET_COLUMNS: &str = "id, owner_id, url, check_interval_minutes, status, last_checked_ms, webhook_url, notify_email, created_at_ms, updated_at_ms";

/// Persistence for targets and their check history.
///
/// Two write paths exist and never overlap: owners change url, interval and
/// channels; the check cycle changes status and last_checked.
#[async_trait]
pub trait Database: Send + Sync {
    /// Every monitored target, in creation order
    async fn list_targets(&self) -> Result<Vec<MonitoredTarget>>;

    async fn get_target(&self, id: Uuid) -> Result<Option<MonitoredTarget>>;

    /// Validate and store a new target with status UNKNOWN
    async fn insert_target(&self, new: NewTarget) -> Result<MonitoredTarget>;

    /// Owner path. Returns `None` when the target does not exist.
    async fn update_owner_fields(&self, id: Uuid, edit: OwnerEdit) -> Result<Option<MonitoredTarget>>;

    /// Check-cycle path. Appends the history row and writes status and
    /// last_checked in one transaction; either both land or neither does.
    async fn record_check(&self, record: &CheckRecord) -> Result<()>;

    /// Remove a target and its history. Returns whether the target existed.
    async fn delete_target(&self, id: Uuid) -> Result<bool>;

    async fn query_history(&self, query: &HistoryQuery) -> Result<Vec<HistoryRecord>>;

    /// History rows per status for one owner, zero-filled
    async fn status_counts(&self, owner_id: &str) -> Result<StatusCounts>;
}

/// LibSQL database implementation
pub struct DatabaseImpl {
    pool: LibsqlPool,
}

impl DatabaseImpl {
    /// Create a new database instance from a pool
    pub fn new_from_pool(pool: LibsqlPool) -> Self {
        Self { pool }
    }

    /// Get a connection from the pool
    async fn get_conn(&self) -> Result<deadpool::managed::Object<crate::pool::LibsqlManager>> {
        Ok(self.pool.get().await?)
    }

    /// Apply pending schema migrations on a pooled connection
    pub async fn migrate(&self) -> Result<()> {
        let conn = self.get_conn().await?;
        super::migrations::run_migrations(&conn).await
    }
}

fn row_to_target(row: &Row) -> Result<MonitoredTarget> {
    let id: String = row.get(0)?;
    let status: String = row.get(4)?;
    let last_checked: Option<i64> = row.get(5)?;

    Ok(MonitoredTarget {
        id: Uuid::parse_str(&id)?,
        owner_id: row.get(1)?,
        url: row.get(2)?,
        check_interval_minutes: u32::try_from(row.get::<i64>(3)?)?,
        status: status.parse()?,
        last_checked: last_checked.map(millis_to_datetime).transpose()?,
        webhook_url: row.get(6)?,
        notify_email: row.get(7)?,
        created_at: millis_to_datetime(row.get(8)?)?,
        updated_at: millis_to_datetime(row.get(9)?)?,
    })
}

fn row_to_history(row: &Row) -> Result<HistoryRecord> {
    let target_id: String = row.get(1)?;
    let status: String = row.get(2)?;

    Ok(HistoryRecord {
        id: row.get(0)?,
        target_id: Uuid::parse_str(&target_id)?,
        status: status.parse()?,
        checked_at: millis_to_datetime(row.get(3)?)?,
        url: row.get(4)?,
        check_interval_minutes: u32::try_from(row.get::<i64>(5)?)?,
    })
}

#[async_trait]
impl Database for DatabaseImpl {
    async fn list_targets(&self) -> Result<Vec<MonitoredTarget>> {
        let conn = self.get_conn().await?;
        let mut rows = conn
            .query(&format!("SELECT {TARGET_COLUMNS} FROM targets ORDER BY created_at_ms, id"), ())
            .await?;

        let mut targets = Vec::new();
        while let Some(row) = rows.next().await? {
            targets.push(row_to_target(&row)?);
        }

        Ok(targets)
    }

    async fn get_target(&self, id: Uuid) -> Result<Option<MonitoredTarget>> {
        let conn = self.get_conn().await?;
        let mut rows = conn
            .query(&format!("SELECT {TARGET_COLUMNS} FROM targets WHERE id = ?"), params![id.to_string()])
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(row_to_target(&row)?)),
            None => Ok(None),
        }
    }

    async fn insert_target(&self, new: NewTarget) -> Result<MonitoredTarget> {
        let new = new.validated()?;
        // stored at millisecond precision
        let now = millis_to_datetime(datetime_to_millis(Utc::now()))?;
        let target = MonitoredTarget {
            id: Uuid::new_v4(),
            owner_id: new.owner_id,
            url: new.url,
            check_interval_minutes: new.check_interval_minutes,
            status: Status::Unknown,
            last_checked: None,
            webhook_url: new.webhook_url,
            notify_email: new.notify_email,
            created_at: now,
            updated_at: now,
        };

        let conn = self.get_conn().await?;
        conn.execute(
            "INSERT INTO targets (id, owner_id, url, check_interval_minutes, status, last_checked_ms, webhook_url, notify_email, created_at_ms, updated_at_ms) VALUES (?, ?, ?, ?, ?, NULL, ?, ?, ?, ?)",
            params![
                target.id.to_string(),
                target.owner_id.clone(),
                target.url.clone(),
                i64::from(target.check_interval_minutes),
                target.status.as_str(),
                target.webhook_url.clone(),
                target.notify_email.clone(),
                datetime_to_millis(target.created_at),
                datetime_to_millis(target.updated_at)
            ],
        )
        .await?;

        tracing::debug!(target_id = %target.id, url = %target.url, "Target created");
        Ok(target)
    }

    async fn update_owner_fields(&self, id: Uuid, edit: OwnerEdit) -> Result<Option<MonitoredTarget>> {
        let Some(current) = self.get_target(id).await? else {
            return Ok(None);
        };
        if edit.is_empty() {
            return Ok(Some(current));
        }

        let mut updated = edit.apply_to(&current)?;
        updated.updated_at = Utc::now();

        let conn = self.get_conn().await?;
        let changed = conn
            .execute(
                "UPDATE targets SET url = ?, check_interval_minutes = ?, webhook_url = ?, notify_email = ?, updated_at_ms = ? WHERE id = ?",
                params![
                    updated.url.clone(),
                    i64::from(updated.check_interval_minutes),
                    updated.webhook_url.clone(),
                    updated.notify_email.clone(),
                    datetime_to_millis(updated.updated_at),
                    id.to_string()
                ],
            )
            .await?;

        if changed == 0 {
            return Ok(None);
        }

        // status and last_checked may have moved under a concurrent check
        self.get_target(id).await
    }

    async fn record_check(&self, record: &CheckRecord) -> Result<()> {
        let conn = self.get_conn().await?;
        let tx = conn.transaction().await?;
        let checked_at = datetime_to_millis(record.checked_at);

        tx.execute(
            "INSERT INTO history (target_id, status, checked_at_ms, url, check_interval_minutes) VALUES (?, ?, ?, ?, ?)",
            params![
                record.target_id.to_string(),
                record.status.as_str(),
                checked_at,
                record.url.clone(),
                i64::from(record.check_interval_minutes)
            ],
        )
        .await
        .context("appending history row")?;

        let updated = tx
            .execute(
                "UPDATE targets SET status = ?, last_checked_ms = ? WHERE id = ?",
                params![record.status.as_str(), checked_at, record.target_id.to_string()],
            )
            .await
            .context("updating target status")?;

        if updated == 0 {
            tx.rollback().await?;
            bail!("target {} no longer exists", record.target_id);
        }

        tx.commit().await?;
        Ok(())
    }

    async fn delete_target(&self, id: Uuid) -> Result<bool> {
        let conn = self.get_conn().await?;
        let tx = conn.transaction().await?;

        tx.execute("DELETE FROM history WHERE target_id = ?", params![id.to_string()]).await?;
        let deleted = tx.execute("DELETE FROM targets WHERE id = ?", params![id.to_string()]).await?;

        tx.commit().await?;
        Ok(deleted > 0)
    }

    async fn query_history(&self, query: &HistoryQuery) -> Result<Vec<HistoryRecord>> {
        let mut sql = String::from(
            "SELECT h.id, h.target_id, h.status, h.checked_at_ms, h.url, h.check_interval_minutes FROM history h JOIN targets t ON t.id = h.target_id WHERE 1 = 1",
        );
        let mut values: Vec<Value> = Vec::new();

        if let Some(owner_id) = &query.owner_id {
            sql.push_str(" AND t.owner_id = ?");
            values.push(Value::Text(owner_id.clone()));
        }
        if let Some(target_id) = query.target_id {
            sql.push_str(" AND h.target_id = ?");
            values.push(Value::Text(target_id.to_string()));
        }
        if let Some(from) = query.from {
            sql.push_str(" AND h.checked_at_ms >= ?");
            values.push(Value::Integer(datetime_to_millis(from)));
        }
        if let Some(to) = query.to {
            sql.push_str(" AND h.checked_at_ms <= ?");
            values.push(Value::Integer(datetime_to_millis(to)));
        }

        let order = query.order.as_sql();
        sql.push_str(&format!(" ORDER BY h.checked_at_ms {order}, h.id {order}"));

        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            values.push(Value::Integer(i64::try_from(limit)?));
        }

        let conn = self.get_conn().await?;
        let mut rows = conn.query(&sql, Params::Positional(values)).await?;

        let mut records = Vec::new();
        while let Some(row) = rows.next().await? {
            records.push(row_to_history(&row)?);
        }

        Ok(records)
    }

    async fn status_counts(&self, owner_id: &str) -> Result<StatusCounts> {
        let conn = self.get_conn().await?;
        let mut rows = conn
            .query(
                "SELECT h.status, COUNT(*) FROM history h JOIN targets t ON t.id = h.target_id WHERE t.owner_id = ? GROUP BY h.status",
                params![owner_id],
            )
            .await?;

        let mut counts = StatusCounts::default();
        while let Some(row) = rows.next().await? {
            let status: String = row.get(0)?;
            let count: i64 = row.get(1)?;
            counts.add(status.parse()?, u64::try_from(count)?);
        }

        Ok(counts)
    }
}
