//! Test harness: state over a scripted key source, and a service wired with
//! the production middleware stack and routes.

use std::sync::Arc;
use std::time::Duration;

use actix_web::body::MessageBody;
use actix_web::dev::{Service, ServiceResponse};
use actix_web::{test, web, App};
use bridge_test_support::idp::{SigningKey, TEST_PROJECT_ID};
use identity_bridge::auth::id_token::IdTokenVerifier;
use identity_bridge::auth::jwks::{FetchRetry, KeyCacheSettings, KeyStore};
use identity_bridge::auth::revocation::RevocationCheck;
use identity_bridge::infra::state::build_state;
use identity_bridge::middleware::{
    cors_middleware, RequestTrace, SecurityHeaders, StructuredLogger, TraceSpan,
};
use identity_bridge::{routes, AppState, SecurityConfig};

use super::key_source::ScriptedKeySource;

pub const TEST_SECRET: &str = "bridge-test-secret-0123456789abcdef";

pub fn test_security() -> SecurityConfig {
    SecurityConfig::new(TEST_SECRET)
}

/// Cache settings with negligible retry delays.
pub fn fast_settings(min_refresh_interval: Duration) -> KeyCacheSettings {
    KeyCacheSettings {
        min_refresh_interval,
        retry: FetchRetry::new(3).with_initial_delay(Duration::from_millis(1)),
    }
}

pub struct TestBridge {
    pub state: AppState,
    pub keys: Arc<ScriptedKeySource>,
}

pub struct TestBridgeBuilder {
    security: SecurityConfig,
    keys: Arc<ScriptedKeySource>,
    revocations: Option<Arc<dyn RevocationCheck>>,
}

impl TestBridgeBuilder {
    pub fn new() -> Self {
        Self {
            security: test_security(),
            keys: Arc::new(ScriptedKeySource::publishing(&[SigningKey::Primary])),
            revocations: None,
        }
    }

    pub fn security(mut self, security: SecurityConfig) -> Self {
        self.security = security;
        self
    }

    pub fn revocations(mut self, revocations: Arc<dyn RevocationCheck>) -> Self {
        self.revocations = Some(revocations);
        self
    }

    pub async fn build(self) -> TestBridge {
        let store = KeyStore::new(self.keys.clone(), fast_settings(Duration::from_secs(30)));
        let mut verifier = IdTokenVerifier::new(Arc::new(store), TEST_PROJECT_ID);
        if let Some(revocations) = self.revocations {
            verifier = verifier.with_revocations(revocations);
        }

        let state = build_state()
            .with_security(self.security)
            .with_verifier(Arc::new(verifier))
            .build()
            .await
            .expect("test state builds");

        TestBridge {
            state,
            keys: self.keys,
        }
    }
}

/// Initialized service with the same middleware stack as the binary.
pub async fn create_test_app(
    state: AppState,
) -> impl Service<actix_http::Request, Response = ServiceResponse<impl MessageBody>, Error = actix_web::Error>
{
    let origins = vec!["http://localhost:3000".to_string()];
    test::init_service(
        App::new()
            .wrap(cors_middleware(&origins))
            .wrap(SecurityHeaders)
            .wrap(StructuredLogger)
            .wrap(TraceSpan)
            .wrap(RequestTrace)
            .app_data(web::Data::new(state))
            .configure(routes::configure),
    )
    .await
}
