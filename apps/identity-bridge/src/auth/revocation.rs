//! Session revocation.
//!
//! A revocation records, per uid, the earliest authentication time still
//! honoured. Assertions from sessions that authenticated before the cut-off
//! are refused even though their signature and expiry are fine.

use std::collections::HashMap;
use std::path::Path;

use dashmap::DashMap;
use tracing::info;

use crate::error::AppError;

pub trait RevocationCheck: Send + Sync {
    /// Earliest `auth_time` (Unix seconds) still valid for `uid`.
    fn valid_since(&self, uid: &str) -> Option<i64>;

    fn is_revoked(&self, uid: &str, auth_time: i64) -> bool {
        self.valid_since(uid)
            .is_some_and(|cutoff| auth_time < cutoff)
    }
}

#[derive(Debug, Default)]
pub struct RevocationList {
    cutoffs: DashMap<String, i64>,
}

impl RevocationList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load `{"<uid>": <unix-seconds>, ...}`.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AppError::config(format!("cannot read revocations file {}: {e}", path.display()))
        })?;
        let entries: HashMap<String, i64> = serde_json::from_str(&raw).map_err(|e| {
            AppError::config(format!("invalid revocations file {}: {e}", path.display()))
        })?;

        let list = Self::new();
        for (uid, cutoff) in entries {
            list.revoke_sessions_before(uid, cutoff);
        }
        info!(entries = list.len(), "revocation list loaded");
        Ok(list)
    }

    /// Refuse sessions for `uid` that authenticated before `cutoff`.
    /// A later cut-off replaces an earlier one; an earlier one is ignored.
    pub fn revoke_sessions_before(&self, uid: impl Into<String>, cutoff: i64) {
        self.cutoffs
            .entry(uid.into())
            .and_modify(|current| *current = (*current).max(cutoff))
            .or_insert(cutoff);
    }

    pub fn len(&self) -> usize {
        self.cutoffs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cutoffs.is_empty()
    }
}

impl RevocationCheck for RevocationList {
    fn valid_since(&self, uid: &str) -> Option<i64> {
        self.cutoffs.get(uid).map(|cutoff| *cutoff)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn sessions_before_cutoff_are_revoked() {
        let list = RevocationList::new();
        list.revoke_sessions_before("uid-1", 1_000);

        assert!(list.is_revoked("uid-1", 999));
        assert!(!list.is_revoked("uid-1", 1_000));
        assert!(!list.is_revoked("uid-2", 0));
    }

    #[test]
    fn cutoff_only_moves_forward() {
        let list = RevocationList::new();
        list.revoke_sessions_before("uid-1", 2_000);
        list.revoke_sessions_before("uid-1", 1_000);
        assert_eq!(list.valid_since("uid-1"), Some(2_000));
    }

    #[test]
    fn loads_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"uid-1": 1700000000, "uid-2": 5}}"#).unwrap();

        let list = RevocationList::from_json_file(file.path()).unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list.valid_since("uid-1"), Some(1_700_000_000));
    }

    #[test]
    fn bad_file_is_config_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(matches!(
            RevocationList::from_json_file(file.path()),
            Err(AppError::Config { .. })
        ));
        assert!(matches!(
            RevocationList::from_json_file("/definitely/not/here.json"),
            Err(AppError::Config { .. })
        ));
    }
}
