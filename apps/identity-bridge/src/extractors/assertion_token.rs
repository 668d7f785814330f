//! Locating the identity assertion on a request.
//!
//! Priority: `Authorization: Bearer`, then the session cookie, then the query
//! parameter. A header with another scheme or an empty bearer value does not
//! count and the next source is tried.

use std::collections::HashMap;
use std::fmt;
use std::future::{ready, Ready};

use actix_web::dev::Payload;
use actix_web::http::header;
use actix_web::{web, FromRequest, HttpRequest};

use crate::error::AppError;
use crate::state::app_state::AppState;

pub const DEFAULT_SESSION_COOKIE: &str = "__session";
pub const DEFAULT_TOKEN_QUERY_PARAM: &str = "token";

const BEARER_PREFIX: &str = "Bearer ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSource {
    Header,
    Cookie,
    Query,
}

impl TokenSource {
    pub const fn as_str(&self) -> &'static str {
        match self {
            TokenSource::Header => "authorization_header",
            TokenSource::Cookie => "session_cookie",
            TokenSource::Query => "query_param",
        }
    }
}

/// Raw assertion plus where it was found.
#[derive(Clone, PartialEq, Eq)]
pub struct AssertionToken {
    pub token: String,
    pub source: TokenSource,
}

impl fmt::Debug for AssertionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssertionToken")
            .field("token", &"[REDACTED]")
            .field("source", &self.source)
            .finish()
    }
}

/// Cookie and query-parameter names that may carry an assertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialSources {
    pub session_cookie: String,
    pub query_param: String,
}

impl CredentialSources {
    pub fn new(session_cookie: impl Into<String>, query_param: impl Into<String>) -> Self {
        Self {
            session_cookie: session_cookie.into(),
            query_param: query_param.into(),
        }
    }
}

impl Default for CredentialSources {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_COOKIE, DEFAULT_TOKEN_QUERY_PARAM)
    }
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

fn from_header(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix(BEARER_PREFIX)
        .and_then(non_empty)
}

fn from_cookie(req: &HttpRequest, name: &str) -> Option<String> {
    req.cookie(name).and_then(|c| non_empty(c.value()))
}

fn from_query(req: &HttpRequest, name: &str) -> Option<String> {
    web::Query::<HashMap<String, String>>::from_query(req.query_string())
        .ok()?
        .get(name)
        .and_then(|v| non_empty(v))
}

/// First assertion found on `req`, if any.
pub fn extract_assertion(req: &HttpRequest, sources: &CredentialSources) -> Option<AssertionToken> {
    if let Some(token) = from_header(req) {
        return Some(AssertionToken {
            token,
            source: TokenSource::Header,
        });
    }
    if let Some(token) = from_cookie(req, &sources.session_cookie) {
        return Some(AssertionToken {
            token,
            source: TokenSource::Cookie,
        });
    }
    from_query(req, &sources.query_param).map(|token| AssertionToken {
        token,
        source: TokenSource::Query,
    })
}

impl FromRequest for AssertionToken {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let sources = req
            .app_data::<web::Data<AppState>>()
            .map(|state| state.sources.clone())
            .unwrap_or_default();
        ready(extract_assertion(req, &sources).ok_or_else(AppError::missing_credential))
    }
}
