use actix_web::web;

mod health;
mod history;
mod stats;

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(health::health_route)
        .service(history::history_route)
        .service(stats::stats_route);
}
