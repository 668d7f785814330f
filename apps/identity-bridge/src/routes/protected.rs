use actix_web::{web, HttpResponse};
use serde::Serialize;

use crate::extractors::bridged_session::BridgedSession;
use crate::middleware::identity_bridge::IdentityBridge;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProtectedResponse {
    ok: bool,
    uid: String,
    email: Option<String>,
    bridged_token: String,
    expires_at: i64,
}

async fn protected(session: BridgedSession) -> HttpResponse {
    HttpResponse::Ok().json(ProtectedResponse {
        ok: true,
        uid: session.uid,
        email: session.email,
        bridged_token: session.token,
        expires_at: session.expires_at,
    })
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/protected")
            .route(web::get().to(protected).wrap(IdentityBridge)),
    );
}
