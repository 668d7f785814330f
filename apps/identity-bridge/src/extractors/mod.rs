pub mod assertion_token;
pub mod bridged_session;

pub use assertion_token::{AssertionToken, CredentialSources, TokenSource};
pub use bridged_session::BridgedSession;
