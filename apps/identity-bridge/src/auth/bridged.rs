//! Bridged credentials: HS256 tokens the managed database backend accepts.

use std::time::SystemTime;

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::unix_seconds;
use crate::error::{AppError, InvalidReason};
use crate::state::security_config::SecurityConfig;

/// Authorization tier granted to every bridged session.
pub const BRIDGED_ROLE: &str = "authenticated";
pub const BRIDGED_AUDIENCE: &str = "authenticated";
/// One hour.
pub const BRIDGED_TTL_SECS: i64 = 3600;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct BridgedClaims {
    /// Subject copied from the verified assertion
    pub sub: String,
    /// Empty when the assertion carried no email
    pub email: String,
    pub role: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
    /// Random per mint
    pub jti: String,
}

#[derive(Debug, Clone)]
pub struct MintedToken {
    pub token: String,
    pub claims: BridgedClaims,
}

/// Mint a bridged token for `sub`, valid for [`BRIDGED_TTL_SECS`] from `now`.
pub fn mint_bridged_token(
    sub: &str,
    email: Option<&str>,
    now: SystemTime,
    security: &SecurityConfig,
) -> Result<MintedToken, AppError> {
    let secret = security.signing_secret()?;
    let iat = unix_seconds(now)?;

    let claims = BridgedClaims {
        sub: sub.to_string(),
        email: email.unwrap_or_default().to_string(),
        role: BRIDGED_ROLE.to_string(),
        aud: BRIDGED_AUDIENCE.to_string(),
        iat,
        exp: iat + BRIDGED_TTL_SECS,
        jti: Uuid::new_v4().to_string(),
    };

    let token = encode(
        &Header::new(security.algorithm),
        &claims,
        &EncodingKey::from_secret(secret),
    )
    .map_err(|e| AppError::internal(format!("failed to encode bridged token: {e}")))?;

    Ok(MintedToken { token, claims })
}

/// Verify a bridged token the way the downstream backend does.
///
/// Accepted while `now <= exp`, rejected strictly after; no leeway.
pub fn verify_bridged_token(
    token: &str,
    security: &SecurityConfig,
    now: SystemTime,
) -> Result<BridgedClaims, AppError> {
    let secret = security.signing_secret()?;

    // Expiry is checked against the caller's clock below, not the wall clock.
    let mut validation = Validation::new(security.algorithm);
    validation.validate_exp = false;
    validation.leeway = 0;
    validation.set_audience(&[BRIDGED_AUDIENCE]);
    validation.set_required_spec_claims(&["exp", "sub", "aud"]);

    let claims = decode::<BridgedClaims>(token, &DecodingKey::from_secret(secret), &validation)
        .map(|data| data.claims)
        .map_err(|e| AppError::invalid_credential(InvalidReason::from_jwt_error(&e)))?;

    if claims.role != BRIDGED_ROLE {
        return Err(AppError::invalid_credential(InvalidReason::Malformed));
    }
    if unix_seconds(now)? > claims.exp {
        return Err(AppError::invalid_credential(InvalidReason::Expired));
    }

    Ok(claims)
}
