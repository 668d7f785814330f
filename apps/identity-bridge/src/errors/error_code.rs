//! Error codes for the identity bridge API.
//!
//! Add new codes here; never pass ad-hoc strings as error codes. Each code is
//! SCREAMING_SNAKE_CASE and appears verbatim in the `code` field of error
//! bodies.

use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// No assertion in the Authorization header, session cookie or query
    MissingCredential,
    /// Assertion failed verification (signature, expiry, issuer, revocation...)
    InvalidCredential,
    /// Server-side configuration prevents minting (e.g. no signing secret)
    ConfigError,
    InternalError,
}

impl ErrorCode {
    pub const ALL: [ErrorCode; 4] = [
        Self::MissingCredential,
        Self::InvalidCredential,
        Self::ConfigError,
        Self::InternalError,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::MissingCredential => "MISSING_CREDENTIAL",
            Self::InvalidCredential => "INVALID_CREDENTIAL",
            Self::ConfigError => "CONFIG_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
