use std::sync::Arc;

use tracing::warn;

use crate::auth::id_token::{AssertionVerifier, IdTokenVerifier};
use crate::auth::jwks::{FetchRetry, HttpKeySource, KeyCacheSettings, KeyStore};
use crate::auth::revocation::RevocationList;
use crate::config::bridge::{BridgeConfig, IdentityProviderConfig};
use crate::error::AppError;
use crate::extractors::assertion_token::CredentialSources;
use crate::state::app_state::AppState;
use crate::state::security_config::SecurityConfig;

/// Builder for `AppState`, shared by the binary and tests.
pub struct StateBuilder {
    security: SecurityConfig,
    verifier: Option<Arc<dyn AssertionVerifier>>,
    sources: CredentialSources,
    key_store: Option<Arc<KeyStore>>,
}

impl StateBuilder {
    pub fn new() -> Self {
        Self {
            security: SecurityConfig::unconfigured(),
            verifier: None,
            sources: CredentialSources::default(),
            key_store: None,
        }
    }

    pub fn with_security(mut self, security: SecurityConfig) -> Self {
        self.security = security;
        self
    }

    pub fn with_verifier(mut self, verifier: Arc<dyn AssertionVerifier>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    pub fn with_credential_sources(mut self, sources: CredentialSources) -> Self {
        self.sources = sources;
        self
    }

    /// Wire everything from process configuration: the HTTP key source,
    /// key cache, ID-token verifier and optional revocation list.
    pub fn with_config(self, config: &BridgeConfig) -> Result<Self, AppError> {
        let key_store = Arc::new(key_store_from_config(&config.idp)?);
        let verifier = id_token_verifier(Arc::clone(&key_store), &config.idp)?;

        let mut builder = self
            .with_security(SecurityConfig::from_optional(
                config.jwt_secret.as_ref().map(|s| s.as_bytes().to_vec()),
            ))
            .with_verifier(Arc::new(verifier))
            .with_credential_sources(CredentialSources::new(
                config.session_cookie.clone(),
                config.token_query_param.clone(),
            ));
        builder.key_store = Some(key_store);
        Ok(builder)
    }

    /// Build the state. Signing keys are fetched eagerly when a key store
    /// was configured; a failed warm-up is logged and retried on first use.
    pub async fn build(self) -> Result<AppState, AppError> {
        let verifier = self
            .verifier
            .ok_or_else(|| AppError::config("no assertion verifier configured"))?;

        if let Some(key_store) = self.key_store {
            if let Err(e) = key_store.warm().await {
                warn!(error = %e, "signing keys unavailable at start-up; will retry on demand");
            }
        }

        Ok(AppState::new(self.security, verifier, self.sources))
    }
}

impl Default for StateBuilder {
    fn default() -> Self {
        Self::new()
    }
}

pub fn build_state() -> StateBuilder {
    StateBuilder::new()
}

fn key_store_from_config(idp: &IdentityProviderConfig) -> Result<KeyStore, AppError> {
    let source = HttpKeySource::new(
        idp.jwks_url.clone(),
        idp.keys_fetch_timeout,
        idp.keys_default_ttl,
    )?;
    let settings = KeyCacheSettings {
        min_refresh_interval: idp.keys_min_refresh,
        retry: FetchRetry::new(idp.keys_fetch_attempts),
    };
    Ok(KeyStore::new(Arc::new(source), settings))
}

fn id_token_verifier(
    key_store: Arc<KeyStore>,
    idp: &IdentityProviderConfig,
) -> Result<IdTokenVerifier, AppError> {
    let mut verifier = IdTokenVerifier::new(key_store, idp.project_id.clone())
        .with_issuer(idp.issuer.clone())
        .with_clock_skew(idp.clock_skew);

    if let Some(path) = &idp.revocations_file {
        verifier = verifier.with_revocations(Arc::new(RevocationList::from_json_file(path)?));
    }

    Ok(verifier)
}
