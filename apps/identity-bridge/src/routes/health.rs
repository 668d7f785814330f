use actix_web::{web, HttpResponse};
use serde::Serialize;

#[derive(Debug, Serialize)]
struct HealthResponse {
    ok: bool,
}

async fn health() -> HttpResponse {
    HttpResponse::Ok().json(HealthResponse { ok: true })
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health));
}
