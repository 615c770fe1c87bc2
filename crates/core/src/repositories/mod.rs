//! Repository management modules.
//!
//! File-backed storage for accounts and their saved results. Accounts live in a sharded
//! directory tree under the configured data directory; each account directory holds its
//! results.

pub mod accounts;
pub(crate) mod helpers;
pub mod results;
