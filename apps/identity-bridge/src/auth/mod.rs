pub mod bridged;
pub mod id_token;
pub mod jwks;
pub mod revocation;

use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::AppError;

/// Seconds since the Unix epoch.
pub fn unix_seconds(now: SystemTime) -> Result<i64, AppError> {
    now.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .map_err(|_| AppError::internal("system clock is before the Unix epoch"))
}
