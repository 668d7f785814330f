use actix_web::web;

pub mod health;
pub mod protected;

/// Register every route under `/api`. Global middleware is wired by the
/// caller; `/api/protected` carries its own `IdentityBridge` guard.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .configure(health::configure_routes)
            .configure(protected::configure_routes),
    );
}
