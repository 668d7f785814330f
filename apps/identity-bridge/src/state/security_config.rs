use std::fmt;

use jsonwebtoken::Algorithm;

use crate::error::AppError;

/// Signing settings for bridged credentials.
#[derive(Clone)]
pub struct SecurityConfig {
    /// Pre-shared HMAC secret; `None` when not configured
    jwt_secret: Option<Vec<u8>>,
    /// Always HS256 for the downstream backend
    pub algorithm: Algorithm,
}

impl SecurityConfig {
    /// Configure with a secret. An empty secret counts as not configured.
    pub fn new(jwt_secret: impl Into<Vec<u8>>) -> Self {
        let secret = jwt_secret.into();
        Self {
            jwt_secret: (!secret.is_empty()).then_some(secret),
            algorithm: Algorithm::HS256,
        }
    }

    /// No secret: every mint fails with a configuration error.
    pub fn unconfigured() -> Self {
        Self {
            jwt_secret: None,
            algorithm: Algorithm::HS256,
        }
    }

    pub fn from_optional(jwt_secret: Option<Vec<u8>>) -> Self {
        jwt_secret.map_or_else(Self::unconfigured, Self::new)
    }

    pub fn is_configured(&self) -> bool {
        self.jwt_secret.is_some()
    }

    pub fn signing_secret(&self) -> Result<&[u8], AppError> {
        self.jwt_secret
            .as_deref()
            .ok_or_else(|| AppError::config("bridged-token signing secret is not configured"))
    }
}

impl fmt::Debug for SecurityConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecurityConfig")
            .field(
                "jwt_secret",
                &self.jwt_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .field("algorithm", &self.algorithm)
            .finish()
    }
}
