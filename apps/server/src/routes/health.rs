use actix_web::{HttpResponse, Responder, get};

/// Health check route
/// This route returns no content, the response status is enough.
#[get("/health")]
pub async fn health_route() -> impl Responder {
    HttpResponse::NoContent()
}
