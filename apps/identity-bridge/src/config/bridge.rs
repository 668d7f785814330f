//! Process configuration, read once from the environment at start-up.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::auth::id_token::{default_issuer, MAX_CLOCK_SKEW};
use crate::auth::jwks::{
    DEFAULT_FETCH_ATTEMPTS, DEFAULT_FETCH_TIMEOUT, DEFAULT_KEY_SET_LIFETIME,
    DEFAULT_MIN_REFRESH_INTERVAL,
};
use crate::error::AppError;
use crate::extractors::assertion_token::{DEFAULT_SESSION_COOKIE, DEFAULT_TOKEN_QUERY_PARAM};

pub const DEFAULT_JWKS_URL: &str =
    "https://www.googleapis.com/service_accounts/v1/jwk/securetoken@system.gserviceaccount.com";

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_CORS_ORIGINS: [&str; 2] = ["http://localhost:3000", "http://127.0.0.1:3000"];

/// Identity-provider settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityProviderConfig {
    pub project_id: String,
    pub issuer: String,
    pub jwks_url: String,
    pub clock_skew: Duration,
    pub keys_default_ttl: Duration,
    pub keys_min_refresh: Duration,
    pub keys_fetch_attempts: u32,
    pub keys_fetch_timeout: Duration,
    pub revocations_file: Option<PathBuf>,
}

#[derive(Clone)]
pub struct BridgeConfig {
    pub host: String,
    pub port: u16,
    /// Bridged-token signing secret; absence is reported per request
    pub jwt_secret: Option<String>,
    pub idp: IdentityProviderConfig,
    pub session_cookie: String,
    pub token_query_param: String,
    pub cors_allowed_origins: Vec<String>,
}

impl BridgeConfig {
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let host = var("BRIDGE_HOST").unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = match var("BRIDGE_PORT") {
            Some(raw) => parse_value("BRIDGE_PORT", &raw)?,
            None => parse_or("PORT", var("PORT"), DEFAULT_PORT)?,
        };

        let jwt_secret = match var("BRIDGE_JWT_SECRET") {
            Some(secret) => Some(secret),
            None => var("BRIDGE_JWT_SECRET_FILE")
                .map(|path| read_secret_file(&path))
                .transpose()?
                .flatten(),
        };

        let project_id = var("IDP_PROJECT_ID")
            .ok_or_else(|| AppError::config("IDP_PROJECT_ID must be set"))?;
        let issuer = var("IDP_ISSUER").unwrap_or_else(|| default_issuer(&project_id));
        let jwks_url = var("IDP_JWKS_URL").unwrap_or_else(|| DEFAULT_JWKS_URL.to_string());

        let idp = IdentityProviderConfig {
            clock_skew: Duration::from_secs(parse_or(
                "IDP_CLOCK_SKEW_SECS",
                var("IDP_CLOCK_SKEW_SECS"),
                0,
            )?),
            keys_default_ttl: Duration::from_secs(parse_or(
                "IDP_KEYS_DEFAULT_TTL_SECS",
                var("IDP_KEYS_DEFAULT_TTL_SECS"),
                DEFAULT_KEY_SET_LIFETIME.as_secs(),
            )?),
            keys_min_refresh: Duration::from_secs(parse_or(
                "IDP_KEYS_MIN_REFRESH_SECS",
                var("IDP_KEYS_MIN_REFRESH_SECS"),
                DEFAULT_MIN_REFRESH_INTERVAL.as_secs(),
            )?),
            keys_fetch_attempts: parse_or(
                "IDP_KEYS_FETCH_ATTEMPTS",
                var("IDP_KEYS_FETCH_ATTEMPTS"),
                DEFAULT_FETCH_ATTEMPTS,
            )?,
            keys_fetch_timeout: Duration::from_millis(parse_or(
                "IDP_KEYS_FETCH_TIMEOUT_MS",
                var("IDP_KEYS_FETCH_TIMEOUT_MS"),
                DEFAULT_FETCH_TIMEOUT.as_millis() as u64,
            )?),
            revocations_file: var("IDP_REVOCATIONS_FILE").map(PathBuf::from),
            project_id,
            issuer,
            jwks_url,
        };

        if idp.clock_skew > MAX_CLOCK_SKEW {
            return Err(AppError::config(format!(
                "IDP_CLOCK_SKEW_SECS must be at most {}",
                MAX_CLOCK_SKEW.as_secs()
            )));
        }
        if idp.keys_fetch_attempts == 0 {
            return Err(AppError::config("IDP_KEYS_FETCH_ATTEMPTS must be at least 1"));
        }

        Ok(Self {
            host,
            port,
            jwt_secret,
            idp,
            session_cookie: var("BRIDGE_SESSION_COOKIE")
                .unwrap_or_else(|| DEFAULT_SESSION_COOKIE.to_string()),
            token_query_param: var("BRIDGE_TOKEN_QUERY_PARAM")
                .unwrap_or_else(|| DEFAULT_TOKEN_QUERY_PARAM.to_string()),
            cors_allowed_origins: parse_origins(var("CORS_ALLOWED_ORIGINS").as_deref()),
        })
    }

    pub fn bind_addr(&self) -> (String, u16) {
        (self.host.clone(), self.port)
    }
}

impl fmt::Debug for BridgeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgeConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("jwt_secret", &self.jwt_secret.as_ref().map(|_| "[REDACTED]"))
            .field("idp", &self.idp)
            .field("session_cookie", &self.session_cookie)
            .field("token_query_param", &self.token_query_param)
            .field("cors_allowed_origins", &self.cors_allowed_origins)
            .finish()
    }
}

fn parse_value<T: FromStr>(name: &str, raw: &str) -> Result<T, AppError> {
    raw.trim()
        .parse::<T>()
        .map_err(|_| AppError::config(format!("{name} must be a valid number, got '{raw}'")))
}

fn parse_or<T: FromStr>(name: &str, raw: Option<String>, default: T) -> Result<T, AppError> {
    raw.map_or(Ok(default), |raw| parse_value(name, &raw))
}

/// Secret from a mounted file; trailing newline dropped, empty means unset.
fn read_secret_file(path: &str) -> Result<Option<String>, AppError> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| AppError::config(format!("cannot read BRIDGE_JWT_SECRET_FILE {path}: {e}")))?;
    let secret = contents.trim_end_matches(['\r', '\n']);
    Ok((!secret.is_empty()).then(|| secret.to_string()))
}

/// Comma-separated http(s) origins; falls back to localhost when none are valid.
fn parse_origins(raw: Option<&str>) -> Vec<String> {
    let origins: Vec<String> = raw
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty() && *s != "null")
        .filter(|s| s.starts_with("http://") || s.starts_with("https://"))
        .map(str::to_string)
        .collect();

    if origins.is_empty() {
        DEFAULT_CORS_ORIGINS.iter().map(|s| s.to_string()).collect()
    } else {
        origins
    }
}
