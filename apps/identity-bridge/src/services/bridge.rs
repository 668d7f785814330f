//! The identity bridge: extract the assertion, verify it, mint the bridged
//! credential.

use std::time::SystemTime;

use actix_web::HttpRequest;

use crate::auth::bridged::mint_bridged_token;
use crate::error::AppError;
use crate::extractors::assertion_token::{extract_assertion, AssertionToken};
use crate::extractors::bridged_session::BridgedSession;
use crate::logging::security;
use crate::state::app_state::AppState;

/// Run the whole bridge for one request.
///
/// The signing secret is checked first, so a misconfigured bridge answers
/// every request with a configuration error and never touches the verifier.
/// A request without an assertion is refused before verification.
pub async fn bridge_request(req: &HttpRequest, state: &AppState) -> Result<BridgedSession, AppError> {
    if let Err(e) = state.security.signing_secret() {
        security::signing_secret_missing();
        return Err(e);
    }

    let Some(assertion) = extract_assertion(req, &state.sources) else {
        security::credential_missing(req.path());
        return Err(AppError::missing_credential());
    };

    exchange(&assertion, state, SystemTime::now()).await
}

/// Verify `assertion` and mint a bridged credential valid from `now`.
pub async fn exchange(
    assertion: &AssertionToken,
    state: &AppState,
    now: SystemTime,
) -> Result<BridgedSession, AppError> {
    let identity = state
        .verifier
        .verify(&assertion.token)
        .await
        .inspect_err(|e| {
            if let Some(reason) = e.invalid_reason() {
                security::credential_rejected(reason, assertion.source);
            }
        })?;

    let minted = mint_bridged_token(
        &identity.uid,
        identity.email.as_deref(),
        now,
        &state.security,
    )?;

    security::credential_bridged(
        &identity.uid,
        identity.email.as_deref(),
        assertion.source,
        minted.claims.exp,
    );

    Ok(BridgedSession {
        uid: identity.uid,
        email: identity.email,
        token: minted.token,
        expires_at: minted.claims.exp,
    })
}
