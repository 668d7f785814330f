use std::fmt;
use std::future::{ready, Ready};

use actix_web::dev::Payload;
use actix_web::{FromRequest, HttpMessage, HttpRequest};

use crate::error::AppError;

/// Session established by the `IdentityBridge` middleware for this request.
#[derive(Clone)]
pub struct BridgedSession {
    pub uid: String,
    pub email: Option<String>,
    pub token: String,
    /// Unix seconds
    pub expires_at: i64,
}

impl fmt::Debug for BridgedSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgedSession")
            .field("uid", &self.uid)
            .field("token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

impl FromRequest for BridgedSession {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        // Only present on resources wrapped by IdentityBridge.
        ready(
            req.extensions()
                .get::<BridgedSession>()
                .cloned()
                .ok_or_else(|| AppError::internal("BridgedSession requested outside IdentityBridge")),
        )
    }
}
