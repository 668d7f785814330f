//! Security events. Uids are logged as-is; emails and anything token-shaped
//! are redacted. Raw assertions and bridged tokens never reach the log.

use tracing::{error, info, warn};

use crate::error::InvalidReason;
use crate::extractors::assertion_token::TokenSource;
use crate::logging::pii::Redacted;
use crate::trace_ctx;

pub fn credential_missing(path: &str) {
    let trace_id = trace_ctx::trace_id();

    warn!(
        event = "SECURITY_CREDENTIAL_MISSING",
        %trace_id,
        path,
        "No identity assertion on request"
    );
}

pub fn credential_rejected(reason: InvalidReason, source: TokenSource) {
    let trace_id = trace_ctx::trace_id();

    warn!(
        event = "SECURITY_CREDENTIAL_REJECTED",
        %trace_id,
        reason = reason.as_str(),
        source = source.as_str(),
        "Identity assertion rejected"
    );
}

pub fn credential_bridged(uid: &str, email: Option<&str>, source: TokenSource, expires_at: i64) {
    let trace_id = trace_ctx::trace_id();

    info!(
        event = "SECURITY_CREDENTIAL_BRIDGED",
        %trace_id,
        uid,
        email = %email.map(Redacted).unwrap_or(Redacted("")),
        source = source.as_str(),
        expires_at,
        "Bridged credential issued"
    );
}

pub fn signing_secret_missing() {
    let trace_id = trace_ctx::trace_id();

    error!(
        event = "SECURITY_SIGNING_SECRET_MISSING",
        %trace_id,
        "Bridged-token signing secret is not configured; refusing to mint"
    );
}
