use std::fmt;
use std::sync::Arc;

use super::security_config::SecurityConfig;
use crate::auth::id_token::AssertionVerifier;
use crate::extractors::assertion_token::CredentialSources;

/// Shared, immutable application state. Built once by `StateBuilder`.
#[derive(Clone)]
pub struct AppState {
    /// Bridged-token signing settings
    pub security: SecurityConfig,
    /// Verifies foreign identity assertions
    pub verifier: Arc<dyn AssertionVerifier>,
    /// Where assertions are looked for on a request
    pub sources: CredentialSources,
}

impl AppState {
    pub fn new(
        security: SecurityConfig,
        verifier: Arc<dyn AssertionVerifier>,
        sources: CredentialSources,
    ) -> Self {
        Self {
            security,
            verifier,
            sources,
        }
    }
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState")
            .field("security", &self.security)
            .field("sources", &self.sources)
            .finish_non_exhaustive()
    }
}
