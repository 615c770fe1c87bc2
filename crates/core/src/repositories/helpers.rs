//! Repository-related utilities.
//!
//! Directory allocation and JSON file I/O shared by the account and result repositories.

use crate::uuid::ShardableUuid;
use crate::{EgfrError, EgfrResult};
use serde::{de::DeserializeOwned, Serialize};
use std::{
    fs,
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};

/// Creates a unique sharded directory within `base_dir`.
///
/// Identifiers come from `uuid_source`; a candidate that already exists (a collision, or a
/// directory left behind by something else) is skipped, up to 5 attempts.
///
/// # Errors
///
/// Returns [`EgfrError::StorageDirCreation`] if:
/// - directory creation fails after 5 attempts,
/// - parent directory creation fails.
pub(crate) fn create_unique_shared_dir(
    base_dir: &Path,
    mut uuid_source: impl FnMut() -> ShardableUuid,
) -> EgfrResult<(ShardableUuid, PathBuf)> {
    for _attempt in 0..5 {
        let uuid = uuid_source();
        let candidate = uuid.sharded_dir(base_dir);

        if candidate.exists() {
            continue;
        }

        if let Some(parent) = candidate.parent() {
            fs::create_dir_all(parent).map_err(EgfrError::StorageDirCreation)?;
        }

        match fs::create_dir(&candidate) {
            Ok(()) => return Ok((uuid, candidate)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(EgfrError::StorageDirCreation(e)),
        }
    }

    Err(EgfrError::StorageDirCreation(io::Error::new(
        ErrorKind::AlreadyExists,
        "failed to allocate a unique record directory after 5 attempts",
    )))
}

/// Writes `value` as pretty JSON, refusing to overwrite an existing file.
pub(crate) fn write_new_json<T: Serialize>(path: &Path, value: &T) -> EgfrResult<()> {
    let raw = serde_json::to_vec_pretty(value).map_err(EgfrError::Serialization)?;
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(EgfrError::FileWrite)?;
    io::Write::write_all(&mut file, &raw).map_err(EgfrError::FileWrite)
}

pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> EgfrResult<T> {
    let raw = fs::read(path).map_err(EgfrError::FileRead)?;
    serde_json::from_slice(&raw).map_err(EgfrError::Deserialization)
}

/// Every leaf directory of a `<s1>/<s2>/<id>/` sharded tree. A missing base yields nothing.
pub(crate) fn sharded_leaf_dirs(base_dir: &Path) -> Vec<PathBuf> {
    fn subdirs(path: &Path) -> Vec<PathBuf> {
        match fs::read_dir(path) {
            Ok(it) => it
                .flatten()
                .map(|entry| entry.path())
                .filter(|p| p.is_dir())
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    let mut leaves = Vec::new();
    for s1 in subdirs(base_dir) {
        for s2 in subdirs(&s1) {
            leaves.extend(subdirs(&s2));
        }
    }
    leaves.sort();
    leaves
}
