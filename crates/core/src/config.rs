//! Core runtime configuration.
//!
//! This module defines configuration that should be resolved once at process startup and then
//! passed into core services. Request handling never reads process-wide environment variables,
//! which keeps behaviour consistent across multi-threaded runtimes and test harnesses.

use crate::constants::{ACCOUNT_INDEX_DIR_NAME, DEFAULT_RECENT_LIMIT, USERS_DIR_NAME};
use crate::{EgfrError, EgfrResult};
use std::path::{Path, PathBuf};

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    data_dir: PathBuf,
    recent_limit: usize,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// # Errors
    ///
    /// Returns [`EgfrError::InvalidInput`] if `recent_limit` is zero.
    pub fn new(data_dir: PathBuf, recent_limit: usize) -> EgfrResult<Self> {
        if recent_limit == 0 {
            return Err(EgfrError::InvalidInput(
                "recent_limit must be at least 1".into(),
            ));
        }

        Ok(Self {
            data_dir,
            recent_limit,
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn users_dir(&self) -> PathBuf {
        self.data_dir.join(USERS_DIR_NAME)
    }

    pub fn account_index_dir(&self) -> PathBuf {
        self.data_dir.join(ACCOUNT_INDEX_DIR_NAME)
    }

    /// How many results the clinician dashboard shows.
    pub fn recent_limit(&self) -> usize {
        self.recent_limit
    }
}

/// Parse the dashboard limit from an optional string value.
///
/// If `value` is `None` or empty/whitespace, returns the default of 5.
pub fn recent_limit_from_env_value(value: Option<String>) -> EgfrResult<usize> {
    let value = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());

    match value {
        None => Ok(DEFAULT_RECENT_LIMIT),
        Some(v) => v.parse::<usize>().map_err(|_| {
            EgfrError::InvalidInput(format!(
                "EGFR_RECENT_LIMIT must be a positive integer, got '{v}'"
            ))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_zero_limit() {
        let result = CoreConfig::new(PathBuf::from("data"), 0);
        assert!(matches!(result, Err(EgfrError::InvalidInput(_))));
    }

    #[test]
    fn test_users_dir_is_under_data_dir() {
        let cfg = CoreConfig::new(PathBuf::from("/srv/egfr"), 5).unwrap();
        assert_eq!(cfg.users_dir(), PathBuf::from("/srv/egfr/users"));
        assert_eq!(cfg.recent_limit(), 5);
    }

    #[test]
    fn test_recent_limit_defaults_when_unset_or_blank() {
        assert_eq!(recent_limit_from_env_value(None).unwrap(), 5);
        assert_eq!(recent_limit_from_env_value(Some("  ".into())).unwrap(), 5);
    }

    #[test]
    fn test_recent_limit_parses_and_rejects() {
        assert_eq!(recent_limit_from_env_value(Some(" 12 ".into())).unwrap(), 12);
        assert!(recent_limit_from_env_value(Some("five".into())).is_err());
    }
}
