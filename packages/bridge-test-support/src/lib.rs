//! Test support for the identity bridge
//!
//! Shared by the bridge's unit and integration tests: logging bootstrap, a
//! stand-in identity provider that signs RS256 ID tokens with fixed keys, and
//! assertions for the error-body contract. Nothing here depends on bridge types
//! so the crate can be a dev-dependency without a cycle.

pub mod error_body;
pub mod idp;
pub mod logging;
