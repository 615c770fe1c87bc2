//! User account management.
//!
//! Accounts are the owners of saved results. Each one lives in a sharded directory under
//! `users/`:
//!
//! ```text
//! users/
//!   <s1>/
//!     <s2>/
//!       <uuid>/
//!         account.json
//!         results/
//!           <result-uuid>.json
//! ```
//!
//! Registration first claims the (identifier, role) pair by creating
//! `account_index/<sha256 of role and identifier>.json`. The file is created exclusively, so of
//! two concurrent registrations for the same pair exactly one succeeds.
//!
//! Credentials are not handled here; callers authenticate elsewhere and present an account id.
//! An id that does not resolve to an account is treated as unauthenticated.

use crate::config::CoreConfig;
use crate::constants::ACCOUNT_JSON_FILENAME;
use crate::error::{EgfrError, EgfrResult};
use crate::repositories::helpers::{
    create_unique_shared_dir, read_json, sharded_leaf_dirs, write_new_json,
};
use crate::repositories::results::ResultsService;
use crate::text::NonEmptyText;
use crate::ShardableUuid;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Patient,
    Clinician,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Patient => f.write_str("Patient"),
            Role::Clinician => f.write_str("Clinician"),
        }
    }
}

impl FromStr for Role {
    type Err = EgfrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "patient" => Ok(Role::Patient),
            "clinician" => Ok(Role::Clinician),
            other => Err(EgfrError::InvalidInput(format!(
                "unknown role '{other}' (expected Patient or Clinician)"
            ))),
        }
    }
}

/// A stored account.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UserAccount {
    pub id: ShardableUuid,
    /// NHS number for patients, HCP ID for clinicians.
    pub identifier: NonEmptyText,
    pub role: Role,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl UserAccount {
    /// "First Last", or the identifier when no name was given.
    pub fn display_name(&self) -> String {
        let parts: Vec<&str> = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .filter(|p| !p.trim().is_empty())
            .collect();
        if parts.is_empty() {
            self.identifier.to_string()
        } else {
            parts.join(" ")
        }
    }
}

/// Contents of an account index file.
#[derive(Debug, Serialize, Deserialize)]
struct AccountClaim {
    account_id: ShardableUuid,
}

fn remove_or_warn(path: &Path, what: &str) {
    let removed = if path.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    if let Err(e) = removed {
        tracing::warn!("failed to clean up {} {}: {}", what, path.display(), e);
    }
}

// ============================================================================
// TYPE-STATE MARKERS
// ============================================================================

/// Marker type: no account is selected.
///
/// Registration, lookup and listing are available in this state.
#[derive(Clone, Copy, Debug)]
pub struct Unregistered;

/// Marker type: an existing account has been loaded.
#[derive(Clone, Debug)]
pub struct Registered {
    account: UserAccount,
}

// ============================================================================
// ACCOUNT SERVICE
// ============================================================================

/// Service for account operations.
///
/// Generic parameter `S` is either [`Unregistered`] or [`Registered`]; result operations are
/// only reachable from a `Registered` service, so every saved result belongs to an account that
/// was confirmed to exist.
#[derive(Clone, Debug)]
pub struct AccountService<S> {
    cfg: Arc<CoreConfig>,
    state: S,
}

impl AccountService<Unregistered> {
    pub fn new(cfg: Arc<CoreConfig>) -> Self {
        Self {
            cfg,
            state: Unregistered,
        }
    }

    /// Registers a new account.
    ///
    /// **This method consumes `self`** and returns the registered service on success.
    ///
    /// # Arguments
    ///
    /// * `identifier` - NHS number or HCP ID; trimmed, must not be blank
    /// * `role` - Patient or Clinician
    /// * `first_name`, `last_name` - optional display names
    ///
    /// # Errors
    ///
    /// Returns `EgfrError` if:
    /// - `identifier` is blank ([`EgfrError::InvalidInput`]),
    /// - an account with the same identifier and role exists ([`EgfrError::DuplicateAccount`]),
    /// - the account directory or file cannot be created.
    pub fn register(
        self,
        identifier: &str,
        role: Role,
        first_name: Option<String>,
        last_name: Option<String>,
    ) -> EgfrResult<AccountService<Registered>> {
        let identifier = NonEmptyText::parse(identifier, "identifier")?;
        let duplicate = || EgfrError::DuplicateAccount {
            identifier: identifier.to_string(),
            role: role.to_string(),
        };

        // Accounts written before the index existed have no claim file.
        if self.find_account(identifier.as_str(), role).is_some() {
            return Err(duplicate());
        }

        let users_dir = self.cfg.users_dir();
        let (id, account_dir) = create_unique_shared_dir(&users_dir, ShardableUuid::new)?;

        let claim_path = self.claim_path(&identifier, role);
        if let Err(e) = self.claim(&claim_path, &id) {
            remove_or_warn(&account_dir, "account directory");
            return Err(match e {
                EgfrError::FileWrite(io) if io.kind() == ErrorKind::AlreadyExists => duplicate(),
                other => other,
            });
        }

        let account = UserAccount {
            id,
            identifier,
            role,
            first_name: first_name.filter(|n| !n.trim().is_empty()),
            last_name: last_name.filter(|n| !n.trim().is_empty()),
            created_at: Utc::now(),
        };

        if let Err(e) = write_new_json(&account_dir.join(ACCOUNT_JSON_FILENAME), &account) {
            remove_or_warn(&account_dir, "account directory");
            remove_or_warn(&claim_path, "account claim");
            return Err(e);
        }

        tracing::info!(account_id = %account.id, role = %account.role, "registered account");

        Ok(AccountService {
            cfg: self.cfg,
            state: Registered { account },
        })
    }

    /// Looks up the account for an identifier and role (the login lookup).
    ///
    /// # Errors
    ///
    /// Returns [`EgfrError::NotFound`] if no such account exists.
    pub fn find(
        self,
        identifier: &str,
        role: Role,
    ) -> EgfrResult<AccountService<Registered>> {
        let account = self
            .find_account(identifier.trim(), role)
            .ok_or_else(|| EgfrError::NotFound(format!("{role} account '{}'", identifier.trim())))?;
        Ok(AccountService {
            cfg: self.cfg,
            state: Registered { account },
        })
    }

    /// Lists every stored account, ordered by creation time.
    ///
    /// Unreadable account files are logged and skipped.
    pub fn list(&self) -> Vec<UserAccount> {
        let mut accounts: Vec<UserAccount> = sharded_leaf_dirs(&self.cfg.users_dir())
            .into_iter()
            .filter_map(|dir| {
                let path = dir.join(ACCOUNT_JSON_FILENAME);
                if !path.is_file() {
                    return None;
                }
                match read_json::<UserAccount>(&path) {
                    Ok(account) => Some(account),
                    Err(e) => {
                        tracing::warn!("failed to parse account {}: {}", path.display(), e);
                        None
                    }
                }
            })
            .collect();
        accounts.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        accounts
    }

    fn claim_path(&self, identifier: &NonEmptyText, role: Role) -> PathBuf {
        let mut hasher = Sha256::new();
        hasher.update(role.to_string().as_bytes());
        hasher.update([0u8]);
        hasher.update(identifier.as_str().as_bytes());
        self.cfg
            .account_index_dir()
            .join(format!("{}.json", hex::encode(hasher.finalize())))
    }

    fn claim(&self, claim_path: &Path, account_id: &ShardableUuid) -> EgfrResult<()> {
        fs::create_dir_all(self.cfg.account_index_dir()).map_err(EgfrError::StorageDirCreation)?;
        write_new_json(
            claim_path,
            &AccountClaim {
                account_id: account_id.clone(),
            },
        )
    }

    fn find_account(&self, identifier: &str, role: Role) -> Option<UserAccount> {
        self.list()
            .into_iter()
            .find(|a| a.role == role && a.identifier.as_str() == identifier)
    }
}

impl AccountService<Registered> {
    /// Loads an existing account by id.
    ///
    /// # Errors
    ///
    /// Returns [`EgfrError::InvalidInput`] for a non-canonical id and
    /// [`EgfrError::Unauthenticated`] when no account has that id.
    pub fn with_id(cfg: Arc<CoreConfig>, account_id: &str) -> EgfrResult<Self> {
        let id = ShardableUuid::parse(account_id)?;
        let path = id
            .sharded_dir(&cfg.users_dir())
            .join(ACCOUNT_JSON_FILENAME);
        if !path.is_file() {
            return Err(EgfrError::Unauthenticated);
        }
        let account: UserAccount = read_json(&path)?;
        Ok(Self {
            cfg,
            state: Registered { account },
        })
    }

    pub fn account(&self) -> &UserAccount {
        &self.state.account
    }

    pub fn account_id(&self) -> &ShardableUuid {
        &self.state.account.id
    }

    /// Result storage for this account.
    pub fn results(&self) -> ResultsService {
        ResultsService::new(
            self.account_id()
                .sharded_dir(&self.cfg.users_dir()),
        )
    }

    /// Fails with [`EgfrError::Forbidden`] unless the account has `role`.
    pub fn require_role(&self, role: Role) -> EgfrResult<()> {
        if self.state.account.role == role {
            Ok(())
        } else {
            Err(EgfrError::Forbidden(format!(
                "this operation requires a {role} account"
            )))
        }
    }

    pub fn config(&self) -> &Arc<CoreConfig> {
        &self.cfg
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::Barrier;
    use std::thread;
    use tempfile::TempDir;

    fn test_cfg(data_dir: &Path) -> Arc<CoreConfig> {
        Arc::new(CoreConfig::new(data_dir.to_path_buf(), 5).expect("CoreConfig::new should succeed"))
    }

    #[test]
    fn test_register_creates_account_file() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let cfg = test_cfg(temp_dir.path());

        let service = AccountService::new(cfg.clone())
            .register(
                " 943 476 5919 ",
                Role::Patient,
                Some("Ada".into()),
                Some("Lovelace".into()),
            )
            .expect("register should succeed");

        let account = service.account();
        assert_eq!(account.identifier.as_str(), "943 476 5919");
        assert_eq!(account.display_name(), "Ada Lovelace");

        let path = account
            .id
            .sharded_dir(&cfg.users_dir())
            .join(ACCOUNT_JSON_FILENAME);
        assert!(path.is_file(), "account.json should exist");
    }

    #[test]
    fn test_register_rejects_duplicate_identifier_for_same_role() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let cfg = test_cfg(temp_dir.path());

        AccountService::new(cfg.clone())
            .register("HCP-1", Role::Clinician, None, None)
            .unwrap();
        let again = AccountService::new(cfg.clone()).register("HCP-1", Role::Clinician, None, None);
        assert!(matches!(again, Err(EgfrError::DuplicateAccount { .. })));

        // Same identifier under the other role is a different account.
        AccountService::new(cfg)
            .register("HCP-1", Role::Patient, None, None)
            .expect("different role should be allowed");
    }

    #[test]
    fn test_concurrent_registration_of_same_identifier_creates_one_account() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let cfg = test_cfg(temp_dir.path());
        let rounds = 10;
        let threads = 8;

        for round in 0..rounds {
            let identifier = format!("NHS-{round}");
            let barrier = Arc::new(Barrier::new(threads));
            let handles: Vec<_> = (0..threads)
                .map(|_| {
                    let cfg = cfg.clone();
                    let barrier = barrier.clone();
                    let identifier = identifier.clone();
                    thread::spawn(move || {
                        barrier.wait();
                        AccountService::new(cfg).register(&identifier, Role::Patient, None, None)
                    })
                })
                .collect();
            let results: Vec<_> = handles
                .into_iter()
                .map(|h| h.join().expect("register thread panicked"))
                .collect();

            assert_eq!(
                results.iter().filter(|r| r.is_ok()).count(),
                1,
                "round {round} should register exactly once"
            );
            assert!(results
                .iter()
                .filter_map(|r| r.as_ref().err())
                .all(|e| matches!(e, EgfrError::DuplicateAccount { .. })));
        }

        assert_eq!(AccountService::new(cfg).list().len(), rounds);
    }

    #[test]
    fn test_register_writes_claim_for_identifier_and_role() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let cfg = test_cfg(temp_dir.path());

        let service = AccountService::new(cfg.clone())
            .register("HCP-3", Role::Clinician, None, None)
            .unwrap();

        let claims: Vec<_> = fs::read_dir(cfg.account_index_dir())
            .unwrap()
            .flatten()
            .map(|entry| entry.path())
            .collect();
        assert_eq!(claims.len(), 1);
        let claim: AccountClaim = read_json(&claims[0]).unwrap();
        assert_eq!(&claim.account_id, service.account_id());
    }

    #[test]
    fn test_register_rejects_blank_identifier() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let result =
            AccountService::new(test_cfg(temp_dir.path())).register("   ", Role::Patient, None, None);
        assert!(matches!(result, Err(EgfrError::InvalidInput(_))));
        assert!(!temp_dir.path().join("users").exists());
    }

    #[test]
    fn test_with_id_round_trips_and_unknown_is_unauthenticated() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let cfg = test_cfg(temp_dir.path());
        let registered = AccountService::new(cfg.clone())
            .register("P-7", Role::Patient, None, None)
            .unwrap();

        let loaded =
            AccountService::with_id(cfg.clone(), &registered.account_id().to_string()).unwrap();
        assert_eq!(loaded.account(), registered.account());

        let missing = AccountService::with_id(cfg.clone(), "0123456789abcdef0123456789abcdef");
        assert!(matches!(missing, Err(EgfrError::Unauthenticated)));

        let malformed = AccountService::with_id(cfg, "not-an-id");
        assert!(matches!(malformed, Err(EgfrError::InvalidInput(_))));
    }

    #[test]
    fn test_find_and_list() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let cfg = test_cfg(temp_dir.path());
        assert!(AccountService::new(cfg.clone()).list().is_empty());

        AccountService::new(cfg.clone())
            .register("P-1", Role::Patient, None, None)
            .unwrap();
        AccountService::new(cfg.clone())
            .register("HCP-9", Role::Clinician, Some("Grace".into()), None)
            .unwrap();

        assert_eq!(AccountService::new(cfg.clone()).list().len(), 2);

        let found = AccountService::new(cfg.clone())
            .find("HCP-9", Role::Clinician)
            .unwrap();
        assert_eq!(found.account().display_name(), "Grace");

        let missing = AccountService::new(cfg).find("HCP-9", Role::Patient);
        assert!(matches!(missing, Err(EgfrError::NotFound(_))));
    }

    #[test]
    fn test_require_role() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let service = AccountService::new(test_cfg(temp_dir.path()))
            .register("P-1", Role::Patient, None, None)
            .unwrap();
        assert!(service.require_role(Role::Patient).is_ok());
        assert!(matches!(
            service.require_role(Role::Clinician),
            Err(EgfrError::Forbidden(_))
        ));
    }

    #[test]
    fn test_role_parses_case_insensitively() {
        assert_eq!("clinician".parse::<Role>().unwrap(), Role::Clinician);
        assert_eq!("Patient".parse::<Role>().unwrap(), Role::Patient);
        assert!("admin".parse::<Role>().is_err());
    }
}
