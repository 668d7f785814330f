use std::fmt;

use actix_web::error::ResponseError;
use actix_web::http::{header, StatusCode};
use actix_web::HttpResponse;
use jsonwebtoken::errors::ErrorKind;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::errors::ErrorCode;
use crate::trace_ctx;

/// Body of every error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: String,
    pub trace_id: String,
}

/// Why a credential was refused. Logged server side, never sent to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidReason {
    Expired,
    BadSignature,
    Malformed,
    UnsupportedAlgorithm,
    WrongIssuer,
    WrongAudience,
    NotYetValid,
    UnknownKey,
    KeysUnavailable,
    InvalidSubject,
    IssuedInFuture,
    Revoked,
}

impl InvalidReason {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Expired => "token_expired",
            Self::BadSignature => "invalid_signature",
            Self::Malformed => "malformed_token",
            Self::UnsupportedAlgorithm => "unsupported_algorithm",
            Self::WrongIssuer => "wrong_issuer",
            Self::WrongAudience => "wrong_audience",
            Self::NotYetValid => "not_yet_valid",
            Self::UnknownKey => "unknown_key",
            Self::KeysUnavailable => "keys_unavailable",
            Self::InvalidSubject => "invalid_subject",
            Self::IssuedInFuture => "issued_in_future",
            Self::Revoked => "revoked",
        }
    }

    /// Classify a `jsonwebtoken` decode failure.
    pub fn from_jwt_error(err: &jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::ExpiredSignature => Self::Expired,
            ErrorKind::InvalidSignature => Self::BadSignature,
            ErrorKind::InvalidIssuer => Self::WrongIssuer,
            ErrorKind::InvalidAudience => Self::WrongAudience,
            ErrorKind::InvalidSubject => Self::InvalidSubject,
            ErrorKind::ImmatureSignature => Self::NotYetValid,
            ErrorKind::InvalidAlgorithm | ErrorKind::MissingAlgorithm => {
                Self::UnsupportedAlgorithm
            }
            _ => Self::Malformed,
        }
    }
}

impl fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Missing identity assertion")]
    MissingCredential,
    #[error("Invalid identity assertion: {reason}")]
    InvalidCredential { reason: InvalidReason },
    #[error("Configuration error: {detail}")]
    Config { detail: String },
    #[error("Internal error: {detail}")]
    Internal { detail: String },
}

impl AppError {
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::MissingCredential => ErrorCode::MissingCredential,
            AppError::InvalidCredential { .. } => ErrorCode::InvalidCredential,
            AppError::Config { .. } => ErrorCode::ConfigError,
            AppError::Internal { .. } => ErrorCode::InternalError,
        }
    }

    /// Client-facing message. Deliberately generic: details stay in the logs.
    fn public_message(&self) -> &'static str {
        match self {
            AppError::MissingCredential => "Missing identity token",
            AppError::InvalidCredential { .. } => "Invalid or expired token",
            AppError::Config { .. } | AppError::Internal { .. } => "Internal server error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::MissingCredential | AppError::InvalidCredential { .. } => {
                StatusCode::UNAUTHORIZED
            }
            AppError::Config { .. } | AppError::Internal { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn missing_credential() -> Self {
        Self::MissingCredential
    }

    pub fn invalid_credential(reason: InvalidReason) -> Self {
        Self::InvalidCredential { reason }
    }

    pub fn config(detail: impl Into<String>) -> Self {
        Self::Config {
            detail: detail.into(),
        }
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        Self::Internal {
            detail: detail.into(),
        }
    }

    /// Refusal reason, if this is an `InvalidCredential`.
    pub fn invalid_reason(&self) -> Option<InvalidReason> {
        match self {
            AppError::InvalidCredential { reason } => Some(*reason),
            _ => None,
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        self.status()
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status();
        let code = self.code();
        let trace_id = trace_ctx::trace_id();

        if status.is_server_error() {
            error!(code = %code, error = %self, trace_id = %trace_id, "request failed");
        }

        let body = ErrorBody {
            error: self.public_message().to_string(),
            code: code.to_string(),
            trace_id: trace_id.clone(),
        };

        let mut response = HttpResponse::build(status);
        response.insert_header(("x-trace-id", trace_id));
        if status == StatusCode::UNAUTHORIZED {
            response.insert_header((header::WWW_AUTHENTICATE, "Bearer"));
        }
        response.json(body)
    }
}
