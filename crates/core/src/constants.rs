//! Constants used throughout the eGFR core crate.
//!
//! Clinical coefficients live next to the formulas in [`crate::engine`]; this module holds
//! storage layout names and service defaults.

/// Default directory for account and result storage when no explicit directory is configured.
pub const DEFAULT_DATA_DIR: &str = "egfr_data";

/// Directory name for user account storage.
pub const USERS_DIR_NAME: &str = "users";

/// Directory name for the claims that keep (identifier, role) pairs unique.
pub const ACCOUNT_INDEX_DIR_NAME: &str = "account_index";

/// Directory name, inside a user's directory, holding saved results.
pub const RESULTS_DIR_NAME: &str = "results";

/// Filename for the account JSON file.
pub const ACCOUNT_JSON_FILENAME: &str = "account.json";

/// Number of results shown on the clinician dashboard by default.
pub const DEFAULT_RECENT_LIMIT: usize = 5;

/// Oldest age accepted from an uploaded CSV row.
pub const MAX_BATCH_AGE: f64 = 110.0;
