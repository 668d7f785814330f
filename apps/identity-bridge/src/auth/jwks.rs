//! Identity-provider signing keys.
//!
//! `KeyStore` keeps the provider's current key set in a single-entry moka
//! cache whose lifetime follows the provider's `Cache-Control: max-age`.
//! Concurrent misses share one fetch. A `kid` the cached set does not know
//! forces at most one refresh per `min_refresh_interval`, which covers key
//! rotation without letting forged `kid`s hammer the provider.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use jsonwebtoken::jwk::{AlgorithmParameters, Jwk, PublicKeyUse};
use jsonwebtoken::DecodingKey;
use moka::future::Cache;
use moka::ops::compute::{CompResult, Op};
use moka::Expiry;
use rand::random;
use serde::Deserialize;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::error::AppError;

/// Upper bound on how long a fetched key set is trusted.
pub const MAX_KEY_SET_LIFETIME: Duration = Duration::from_secs(24 * 60 * 60);

pub const DEFAULT_KEY_SET_LIFETIME: Duration = Duration::from_secs(60 * 60);
pub const DEFAULT_MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_FETCH_ATTEMPTS: u32 = 3;
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_millis(5000);

const INITIAL_RETRY_DELAY: Duration = Duration::from_millis(200);
const MAX_RETRY_DELAY: Duration = Duration::from_secs(2);
const RETRY_DELAY_MULTIPLIER: f64 = 2.0;
const JITTER_PERCENT: f64 = 0.2;

#[derive(Debug, Error)]
pub enum KeyFetchError {
    #[error("key endpoint unreachable: {0}")]
    Transport(String),
    #[error("key endpoint answered HTTP {0}")]
    Status(u16),
    #[error("malformed key document: {0}")]
    Malformed(String),
    #[error("key document holds no usable signing keys")]
    Empty,
}

impl KeyFetchError {
    /// Worth another attempt: transport failures, 5xx and 429.
    pub fn is_transient(&self) -> bool {
        match self {
            KeyFetchError::Transport(_) => true,
            KeyFetchError::Status(status) => *status >= 500 || *status == 429,
            KeyFetchError::Malformed(_) | KeyFetchError::Empty => false,
        }
    }
}

#[derive(Debug, Error)]
pub enum KeyLookupError {
    #[error("no signing key with that kid")]
    UnknownKey,
    #[error("signing keys unavailable: {0}")]
    Unavailable(Arc<KeyFetchError>),
}

#[derive(Deserialize)]
struct RawKeySet {
    keys: Vec<serde_json::Value>,
}

/// One snapshot of the provider's verification keys, indexed by `kid`.
#[derive(Clone)]
pub struct KeySet {
    keys: HashMap<String, DecodingKey>,
    fetched_at: Instant,
    lifetime: Duration,
}

impl KeySet {
    /// Parse a JWKS document. Keys that are not RSA signing keys with a
    /// `kid` are skipped; a document with none left is an error.
    pub fn from_jwks(body: &[u8], lifetime: Duration) -> Result<Self, KeyFetchError> {
        let raw: RawKeySet =
            serde_json::from_slice(body).map_err(|e| KeyFetchError::Malformed(e.to_string()))?;

        let mut keys = HashMap::new();
        for value in raw.keys {
            let jwk: Jwk = match serde_json::from_value(value) {
                Ok(jwk) => jwk,
                Err(e) => {
                    warn!(error = %e, "skipping unparseable JWK");
                    continue;
                }
            };
            let Some(kid) = jwk.common.key_id.clone() else {
                warn!("skipping JWK without kid");
                continue;
            };
            if matches!(
                jwk.common.public_key_use,
                Some(PublicKeyUse::Encryption | PublicKeyUse::Other(_))
            ) {
                debug!(kid = %kid, "skipping non-signing JWK");
                continue;
            }
            if !matches!(jwk.algorithm, AlgorithmParameters::RSA(_)) {
                warn!(kid = %kid, "skipping non-RSA JWK");
                continue;
            }
            match DecodingKey::from_jwk(&jwk) {
                Ok(key) => {
                    keys.insert(kid, key);
                }
                Err(e) => warn!(kid = %kid, error = %e, "skipping unusable JWK"),
            }
        }

        if keys.is_empty() {
            return Err(KeyFetchError::Empty);
        }

        Ok(Self {
            keys,
            fetched_at: Instant::now(),
            lifetime: lifetime.min(MAX_KEY_SET_LIFETIME),
        })
    }

    pub fn get(&self, kid: &str) -> Option<&DecodingKey> {
        self.keys.get(kid)
    }

    pub fn kids(&self) -> impl Iterator<Item = &str> {
        self.keys.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    pub fn age(&self) -> Duration {
        self.fetched_at.elapsed()
    }
}

impl fmt::Debug for KeySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kids: Vec<&str> = self.kids().collect();
        kids.sort_unstable();
        f.debug_struct("KeySet")
            .field("kids", &kids)
            .field("lifetime", &self.lifetime)
            .finish()
    }
}

/// `max-age` from a `Cache-Control` header value.
pub fn max_age(cache_control: &str) -> Option<Duration> {
    cache_control
        .split(',')
        .filter_map(|directive| directive.trim().strip_prefix("max-age="))
        .find_map(|secs| secs.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Where key sets come from.
#[async_trait]
pub trait KeySource: Send + Sync {
    async fn fetch(&self) -> Result<KeySet, KeyFetchError>;
}

/// Fetches the provider's published JWKS over HTTPS.
#[derive(Debug, Clone)]
pub struct HttpKeySource {
    client: reqwest::Client,
    url: String,
    default_lifetime: Duration,
}

impl HttpKeySource {
    pub fn new(
        url: impl Into<String>,
        timeout: Duration,
        default_lifetime: Duration,
    ) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::config(format!("failed to build key-fetch client: {e}")))?;
        Ok(Self {
            client,
            url: url.into(),
            default_lifetime,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl KeySource for HttpKeySource {
    async fn fetch(&self) -> Result<KeySet, KeyFetchError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| KeyFetchError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(KeyFetchError::Status(status.as_u16()));
        }

        let lifetime = response
            .headers()
            .get(reqwest::header::CACHE_CONTROL)
            .and_then(|v| v.to_str().ok())
            .and_then(max_age)
            .unwrap_or(self.default_lifetime);

        let body = response
            .bytes()
            .await
            .map_err(|e| KeyFetchError::Transport(e.to_string()))?;

        KeySet::from_jwks(&body, lifetime)
    }
}

/// Bounded exponential backoff for transient fetch failures.
#[derive(Debug, Clone)]
pub struct FetchRetry {
    pub attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl FetchRetry {
    pub fn new(attempts: u32) -> Self {
        Self {
            attempts: attempts.max(1),
            initial_delay: INITIAL_RETRY_DELAY,
            max_delay: MAX_RETRY_DELAY,
        }
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Delay before retry number `attempt` (1-based), with ±20% jitter.
    pub fn delay(&self, attempt: u32) -> Duration {
        let base = self.initial_delay.as_secs_f64()
            * RETRY_DELAY_MULTIPLIER.powi(attempt.saturating_sub(1) as i32);
        let capped = base.min(self.max_delay.as_secs_f64());
        let jitter = (random::<f64>() * 2.0 - 1.0) * capped * JITTER_PERCENT;
        Duration::from_secs_f64((capped + jitter).max(0.0))
    }
}

impl Default for FetchRetry {
    fn default() -> Self {
        Self::new(DEFAULT_FETCH_ATTEMPTS)
    }
}

#[derive(Debug, Clone)]
pub struct KeyCacheSettings {
    /// Minimum key-set age before an unknown `kid` may force a refresh
    pub min_refresh_interval: Duration,
    pub retry: FetchRetry,
}

impl Default for KeyCacheSettings {
    fn default() -> Self {
        Self {
            min_refresh_interval: DEFAULT_MIN_REFRESH_INTERVAL,
            retry: FetchRetry::default(),
        }
    }
}

/// Each cached key set lives exactly as long as its own lifetime.
struct KeySetExpiry;

impl Expiry<(), Arc<KeySet>> for KeySetExpiry {
    fn expire_after_create(
        &self,
        _key: &(),
        value: &Arc<KeySet>,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.lifetime())
    }

    fn expire_after_update(
        &self,
        _key: &(),
        value: &Arc<KeySet>,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.lifetime())
    }
}

pub struct KeyStore {
    source: Arc<dyn KeySource>,
    cache: Cache<(), Arc<KeySet>>,
    settings: KeyCacheSettings,
}

impl KeyStore {
    pub fn new(source: Arc<dyn KeySource>, settings: KeyCacheSettings) -> Self {
        let cache = Cache::builder()
            .max_capacity(1)
            .expire_after(KeySetExpiry)
            .build();
        Self {
            source,
            cache,
            settings,
        }
    }

    /// Verification key for `kid`, refreshing once if it looks rotated.
    pub async fn key_for(&self, kid: &str) -> Result<DecodingKey, KeyLookupError> {
        let set = self.current().await?;
        if let Some(key) = set.get(kid) {
            return Ok(key.clone());
        }

        if set.age() < self.settings.min_refresh_interval {
            debug!(kid = %kid, "unknown kid; key set too fresh to refresh");
            return Err(KeyLookupError::UnknownKey);
        }

        info!(kid = %kid, "unknown kid; refreshing signing keys");
        let fresh = self.refresh_if_current(&set).await?;
        fresh.get(kid).cloned().ok_or(KeyLookupError::UnknownKey)
    }

    /// Cached key set, fetching it if absent. Concurrent callers share a fetch.
    pub async fn current(&self) -> Result<Arc<KeySet>, KeyLookupError> {
        self.cache
            .try_get_with((), self.fetch_with_retry())
            .await
            .map_err(KeyLookupError::Unavailable)
    }

    /// Prime the cache at start-up.
    pub async fn warm(&self) -> Result<(), KeyLookupError> {
        let set = self.current().await?;
        info!(keys = set.len(), lifetime_secs = set.lifetime().as_secs(), "signing keys loaded");
        Ok(())
    }

    /// Replace `stale` with a newly fetched set unless another caller already
    /// did. `stale` stays cached until the fetch succeeds.
    async fn refresh_if_current(
        &self,
        stale: &Arc<KeySet>,
    ) -> Result<Arc<KeySet>, KeyLookupError> {
        let stale = Arc::clone(stale);
        let outcome = self
            .cache
            .entry(())
            .and_try_compute_with(|entry| async move {
                match entry {
                    Some(entry) if !Arc::ptr_eq(entry.value(), &stale) => Ok(Op::Nop),
                    _ => self.fetch_with_retry().await.map(Op::Put),
                }
            })
            .await;

        match outcome.map(CompResult::into_entry) {
            Ok(Some(entry)) => Ok(entry.into_value()),
            Ok(None) => self.current().await,
            Err(e) => {
                warn!(error = %e, "key refresh failed; keeping cached signing keys");
                Err(KeyLookupError::Unavailable(Arc::new(e)))
            }
        }
    }

    async fn fetch_with_retry(&self) -> Result<Arc<KeySet>, KeyFetchError> {
        let retry = &self.settings.retry;
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            match self.source.fetch().await {
                Ok(set) => {
                    debug!(attempt, keys = set.len(), "fetched signing keys");
                    return Ok(Arc::new(set));
                }
                Err(e) if e.is_transient() && attempt < retry.attempts => {
                    let delay = retry.delay(attempt);
                    warn!(
                        attempt,
                        max_attempts = retry.attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "signing-key fetch failed; retrying"
                    );
                    sleep(delay).await;
                }
                Err(e) => {
                    warn!(attempt, error = %e, "signing-key fetch failed");
                    return Err(e);
                }
            }
        }
    }
}

impl fmt::Debug for KeyStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyStore")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use bridge_test_support::idp::{jwks_bytes, SigningKey, PRIMARY_KID, ROTATED_KID};
    use serde_json::json;

    use super::*;

    #[test]
    fn max_age_parses_directive_lists() {
        assert_eq!(
            max_age("public, max-age=19800, must-revalidate, no-transform"),
            Some(Duration::from_secs(19800))
        );
        assert_eq!(max_age("max-age=60"), Some(Duration::from_secs(60)));
        assert_eq!(max_age("no-store"), None);
        assert_eq!(max_age("max-age=soon"), None);
    }

    #[test]
    fn key_set_indexes_by_kid() {
        let body = jwks_bytes(&[SigningKey::Primary, SigningKey::Rotated]);
        let set = KeySet::from_jwks(&body, Duration::from_secs(60)).unwrap();
        assert_eq!(set.len(), 2);
        assert!(set.get(PRIMARY_KID).is_some());
        assert!(set.get(ROTATED_KID).is_some());
        assert!(set.get("nope").is_none());
    }

    #[test]
    fn key_set_lifetime_is_capped() {
        let body = jwks_bytes(&[SigningKey::Primary]);
        let set = KeySet::from_jwks(&body, Duration::from_secs(7 * 24 * 3600)).unwrap();
        assert_eq!(set.lifetime(), MAX_KEY_SET_LIFETIME);
    }

    #[test]
    fn unusable_keys_are_skipped() {
        let mut no_kid = SigningKey::Rotated.jwk();
        no_kid.as_object_mut().unwrap().remove("kid");
        let mut encryption = SigningKey::Rotated.jwk();
        encryption["use"] = json!("enc");
        encryption["kid"] = json!("enc-key");
        let doc = json!({
            "keys": [
                SigningKey::Primary.jwk(),
                no_kid,
                encryption,
                {"kty": "weird", "kid": "odd"},
            ]
        });

        let set = KeySet::from_jwks(doc.to_string().as_bytes(), Duration::from_secs(60)).unwrap();
        assert_eq!(set.kids().collect::<Vec<_>>(), vec![PRIMARY_KID]);
    }

    #[test]
    fn empty_or_malformed_documents_are_permanent_errors() {
        let empty = KeySet::from_jwks(br#"{"keys": []}"#, Duration::from_secs(60)).unwrap_err();
        assert!(matches!(empty, KeyFetchError::Empty));
        assert!(!empty.is_transient());

        let garbage = KeySet::from_jwks(b"<html>", Duration::from_secs(60)).unwrap_err();
        assert!(matches!(garbage, KeyFetchError::Malformed(_)));
        assert!(!garbage.is_transient());
    }

    #[test]
    fn transient_classification() {
        assert!(KeyFetchError::Transport("reset".into()).is_transient());
        assert!(KeyFetchError::Status(503).is_transient());
        assert!(KeyFetchError::Status(429).is_transient());
        assert!(!KeyFetchError::Status(404).is_transient());
    }

    #[test]
    fn retry_delay_grows_and_stays_bounded() {
        let retry = FetchRetry::new(5);
        for attempt in 1..=5 {
            let delay = retry.delay(attempt).as_secs_f64();
            let base = (0.2 * 2f64.powi(attempt as i32 - 1)).min(2.0);
            assert!(delay >= base * 0.8 - 1e-9, "attempt {attempt}: {delay}");
            assert!(delay <= base * 1.2 + 1e-9, "attempt {attempt}: {delay}");
        }
    }

    #[test]
    fn retry_attempts_never_zero() {
        assert_eq!(FetchRetry::new(0).attempts, 1);
    }
}
