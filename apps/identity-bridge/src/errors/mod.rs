//! Error codes for the identity bridge.

pub mod error_code;

pub use error_code::ErrorCode;
