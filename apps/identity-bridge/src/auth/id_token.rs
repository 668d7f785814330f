//! Verification of identity-provider ID tokens.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use jsonwebtoken::{decode, decode_header, Algorithm, Validation};
use serde::Deserialize;
use tracing::debug;

use super::jwks::{KeyLookupError, KeyStore};
use super::revocation::RevocationCheck;
use super::unix_seconds;
use crate::error::{AppError, InvalidReason};

/// Longest `sub` the provider issues.
pub const MAX_SUBJECT_LEN: usize = 128;

/// Largest tolerated clock drift between us and the provider.
pub const MAX_CLOCK_SKEW: Duration = Duration::from_secs(300);

/// Identity established by a successfully verified assertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    pub uid: String,
    pub email: Option<String>,
    pub issued_at: i64,
    pub expires_at: i64,
    pub auth_time: Option<i64>,
}

/// Turns a raw assertion into a verified identity.
#[async_trait]
pub trait AssertionVerifier: Send + Sync {
    async fn verify(&self, assertion: &str) -> Result<VerifiedIdentity, AppError>;
}

#[derive(Debug, Deserialize)]
struct IdTokenClaims {
    sub: String,
    iat: i64,
    exp: i64,
    #[serde(default)]
    auth_time: Option<i64>,
    #[serde(default)]
    email: Option<String>,
}

pub fn default_issuer(project_id: &str) -> String {
    format!("https://securetoken.google.com/{project_id}")
}

/// RS256 ID-token verifier bound to one provider project.
pub struct IdTokenVerifier {
    keys: Arc<KeyStore>,
    project_id: String,
    issuer: String,
    clock_skew: Duration,
    revocations: Option<Arc<dyn RevocationCheck>>,
}

impl IdTokenVerifier {
    pub fn new(keys: Arc<KeyStore>, project_id: impl Into<String>) -> Self {
        let project_id = project_id.into();
        Self {
            keys,
            issuer: default_issuer(&project_id),
            project_id,
            clock_skew: Duration::ZERO,
            revocations: None,
        }
    }

    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = issuer.into();
        self
    }

    /// Leeway for `exp`, `iat` and `auth_time`, clamped to [`MAX_CLOCK_SKEW`].
    pub fn with_clock_skew(mut self, skew: Duration) -> Self {
        self.clock_skew = skew.min(MAX_CLOCK_SKEW);
        self
    }

    pub fn with_revocations(mut self, revocations: Arc<dyn RevocationCheck>) -> Self {
        self.revocations = Some(revocations);
        self
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.set_audience(&[self.project_id.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
        validation.leeway = self.clock_skew.as_secs();
        validation
    }

    fn check_times(&self, claims: &IdTokenClaims) -> Result<(), AppError> {
        let skew = i64::try_from(self.clock_skew.as_secs()).unwrap_or(i64::MAX);
        let latest_acceptable = unix_seconds(SystemTime::now())?.saturating_add(skew);
        if claims.iat > latest_acceptable {
            return Err(AppError::invalid_credential(InvalidReason::IssuedInFuture));
        }
        if claims.auth_time.is_some_and(|t| t > latest_acceptable) {
            return Err(AppError::invalid_credential(InvalidReason::IssuedInFuture));
        }
        Ok(())
    }
}

#[async_trait]
impl AssertionVerifier for IdTokenVerifier {
    async fn verify(&self, assertion: &str) -> Result<VerifiedIdentity, AppError> {
        let header = decode_header(assertion)
            .map_err(|_| AppError::invalid_credential(InvalidReason::Malformed))?;
        if header.alg != Algorithm::RS256 {
            return Err(AppError::invalid_credential(
                InvalidReason::UnsupportedAlgorithm,
            ));
        }
        let kid = header
            .kid
            .ok_or_else(|| AppError::invalid_credential(InvalidReason::Malformed))?;

        let key = self.keys.key_for(&kid).await.map_err(|e| {
            debug!(kid = %kid, error = %e, "no verification key");
            match e {
                KeyLookupError::UnknownKey => AppError::invalid_credential(InvalidReason::UnknownKey),
                KeyLookupError::Unavailable(_) => {
                    AppError::invalid_credential(InvalidReason::KeysUnavailable)
                }
            }
        })?;

        let claims = decode::<IdTokenClaims>(assertion, &key, &self.validation())
            .map(|data| data.claims)
            .map_err(|e| AppError::invalid_credential(InvalidReason::from_jwt_error(&e)))?;

        if claims.sub.is_empty() || claims.sub.chars().count() > MAX_SUBJECT_LEN {
            return Err(AppError::invalid_credential(InvalidReason::InvalidSubject));
        }
        self.check_times(&claims)?;

        if let Some(revocations) = &self.revocations {
            if revocations.is_revoked(&claims.sub, claims.auth_time.unwrap_or(claims.iat)) {
                return Err(AppError::invalid_credential(InvalidReason::Revoked));
            }
        }

        Ok(VerifiedIdentity {
            uid: claims.sub,
            email: claims.email.filter(|e| !e.is_empty()),
            issued_at: claims.iat,
            expires_at: claims.exp,
            auth_time: claims.auth_time,
        })
    }
}
