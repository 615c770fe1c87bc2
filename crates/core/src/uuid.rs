//! Identifier and sharded-path utilities.
//!
//! Accounts and saved results are identified by a *canonical* UUID: **32 lowercase hexadecimal
//! characters** with no hyphens, the same value `Uuid::new_v4().simple().to_string()` produces.
//! Identifiers arriving from the CLI or the REST API must already be canonical; nothing is
//! normalised.
//!
//! ## Sharded directory layout
//! For a canonical UUID `u`, account data lives under:
//! `users/<u[0..2]>/<u[2..4]>/<u>/`
//!
//! which keeps the fan-out of any single directory small.

use crate::error::{EgfrError, EgfrResult};
use std::path::{Path, PathBuf};
use std::{fmt, str::FromStr};

use ::uuid::Uuid;

/// Canonical UUID wrapper (32 lowercase hex characters, no hyphens).
///
/// Once constructed the contained value is guaranteed canonical, so path derivation and
/// display are consistent everywhere.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ShardableUuid(Uuid);

impl ShardableUuid {
    /// Generates a fresh random identifier.
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Validates an externally supplied identifier.
    ///
    /// # Errors
    ///
    /// Returns [`EgfrError::InvalidInput`] if `input` is not in canonical form. Hyphenated and
    /// uppercase forms are rejected rather than normalised.
    pub fn parse(input: &str) -> EgfrResult<Self> {
        if !Self::is_canonical(input) {
            return Err(EgfrError::InvalidInput(format!(
                "id must be 32 lowercase hex characters without hyphens, got: '{input}'"
            )));
        }
        Uuid::parse_str(input)
            .map(Self)
            .map_err(|e| EgfrError::InvalidInput(e.to_string()))
    }

    pub fn uuid(&self) -> Uuid {
        self.0
    }

    /// Purely syntactic canonical-form check.
    pub fn is_canonical(input: &str) -> bool {
        input.len() == 32
            && input
                .bytes()
                .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
    }

    /// Returns `parent_dir/<s1>/<s2>/<uuid>/` where `s1`/`s2` are the first two hex pairs.
    pub fn sharded_dir(&self, parent_dir: &Path) -> PathBuf {
        let canonical = self.0.simple().to_string();
        let s1 = &canonical[0..2];
        let s2 = &canonical[2..4];
        parent_dir.join(s1).join(s2).join(&canonical)
    }
}

impl fmt::Display for ShardableUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

impl FromStr for ShardableUuid {
    type Err = EgfrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ShardableUuid::parse(s)
    }
}

impl serde::Serialize for ShardableUuid {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> serde::Deserialize<'de> for ShardableUuid {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        ShardableUuid::parse(&s).map_err(serde::de::Error::custom)
    }
}
