//! Storage for monitored targets and their check history (libsql).

pub mod migrations;
pub mod models;
pub mod repository;

pub use models::{
    CheckRecord, HistoryOrder, HistoryQuery, HistoryRecord, MonitoredTarget, NewTarget, OwnerEdit,
    StatusCounts,
};
pub use repository::{Database, DatabaseImpl};

use anyhow::Result;

/// Open the pool, migrate and return a ready repository
pub async fn open(path: &str, max_connections: usize) -> Result<DatabaseImpl> {
    let pool = crate::pool::build_pool(path, max_connections).await?;
    let db = DatabaseImpl::new_from_pool(pool);
    db.migrate().await?;
    Ok(db)
}
