pub mod auth;
pub mod config;
pub mod error;
pub mod errors;
pub mod extractors;
pub mod infra;
pub mod logging;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod state;
pub mod trace_ctx;

pub use auth::bridged::{mint_bridged_token, verify_bridged_token, BridgedClaims, MintedToken};
pub use auth::id_token::{AssertionVerifier, IdTokenVerifier, VerifiedIdentity};
pub use auth::jwks::{HttpKeySource, KeySet, KeySource, KeyStore};
pub use auth::revocation::{RevocationCheck, RevocationList};
pub use config::BridgeConfig;
pub use error::{AppError, InvalidReason};
pub use errors::ErrorCode;
pub use extractors::{AssertionToken, BridgedSession, CredentialSources};
pub use infra::state::{build_state, StateBuilder};
pub use middleware::IdentityBridge;
pub use state::app_state::AppState;
pub use state::security_config::SecurityConfig;
