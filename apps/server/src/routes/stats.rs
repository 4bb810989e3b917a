use actix_web::{HttpResponse, get, web};
use beacon_service::database::Database;
use serde::Deserialize;

use crate::error::AppError;

#[derive(Debug, Deserialize)]
pub struct StatsParams {
    pub owner: String,
}

/// History row counts per status for one owner
#[get("/stats")]
pub async fn stats_route(
    db: web::Data<dyn Database>,
    params: web::Query<StatsParams>,
) -> Result<HttpResponse, AppError> {
    let owner = params.owner.trim();
    if owner.is_empty() {
        return Err(AppError::InvalidInput("owner is required".to_string()));
    }

    let counts = db.status_counts(owner).await?;
    Ok(HttpResponse::Ok().json(counts))
}

#[cfg(test)]
mod tests {
    use crate::routes::{routes, test_support::temp_data};
    use actix_web::{App, http::StatusCode, test};
    use beacon_service::database::{CheckRecord, NewTarget};
    use beacon_service::monitoring::Status;
    use chrono::Utc;

    #[actix_web::test]
    async fn test_stats_are_zero_filled() {
        let (_dir, db, data) = temp_data().await;
        let target = db.insert_target(NewTarget::new("alice", "https://a.example.com", 1)).await.unwrap();
        db.record_check(&CheckRecord::for_target(&target, Status::Up, Utc::now())).await.unwrap();

        let app = test::init_service(App::new().app_data(data).configure(routes)).await;

        let req = test::TestRequest::get().uri("/stats?owner=alice").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body, serde_json::json!({"UP": 1, "DOWN": 0, "UNKNOWN": 0}));

        let req = test::TestRequest::get().uri("/stats?owner=%20").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
