use actix_web::{HttpResponse, get, web};
use beacon_service::database::{Database, HistoryQuery, HistoryRecord};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub owner: Option<String>,
    pub target: Option<Uuid>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

/// Check history, newest first
#[get("/history")]
pub async fn history_route(
    db: web::Data<dyn Database>,
    params: web::Query<HistoryParams>,
) -> Result<HttpResponse, AppError> {
    let params = params.into_inner();

    if let (Some(from), Some(to)) = (params.from, params.to) {
        if from > to {
            return Err(AppError::InvalidInput("from must not be after to".to_string()));
        }
    }

    let query = HistoryQuery {
        owner_id: params.owner.filter(|owner| !owner.is_empty()),
        target_id: params.target,
        from: params.from,
        to: params.to,
        limit: params.limit,
        ..HistoryQuery::default()
    }
    .newest_first();

    let records: Vec<HistoryRecord> = db.query_history(&query).await?;
    Ok(HttpResponse::Ok().json(records))
}
