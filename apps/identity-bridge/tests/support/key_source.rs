//! Scriptable key source: publishes whichever test keys the test chooses,
//! counts fetches, and can fail on demand.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use bridge_test_support::idp::{jwks_bytes, SigningKey};
use identity_bridge::auth::jwks::{KeyFetchError, KeySet, KeySource};

pub struct ScriptedKeySource {
    published: Mutex<Vec<SigningKey>>,
    failures: Mutex<VecDeque<KeyFetchError>>,
    fetches: AtomicUsize,
    latency: Duration,
    lifetime: Duration,
}

impl ScriptedKeySource {
    pub fn publishing(keys: &[SigningKey]) -> Self {
        Self {
            published: Mutex::new(keys.to_vec()),
            failures: Mutex::new(VecDeque::new()),
            fetches: AtomicUsize::new(0),
            latency: Duration::ZERO,
            lifetime: Duration::from_secs(3600),
        }
    }

    /// Hold every fetch open for `latency`, widening race windows.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn with_lifetime(mut self, lifetime: Duration) -> Self {
        self.lifetime = lifetime;
        self
    }

    /// Replace the published keys, as the provider does on rotation.
    pub fn publish(&self, keys: &[SigningKey]) {
        *self.published.lock().unwrap() = keys.to_vec();
    }

    /// Queue a failure for the next fetch.
    pub fn fail_next(&self, err: KeyFetchError) {
        self.failures.lock().unwrap().push_back(err);
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeySource for ScriptedKeySource {
    async fn fetch(&self) -> Result<KeySet, KeyFetchError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let failure = self.failures.lock().unwrap().pop_front();
        if let Some(err) = failure {
            return Err(err);
        }

        let keys = self.published.lock().unwrap().clone();
        KeySet::from_jwks(&jwks_bytes(&keys), self.lifetime)
    }
}
