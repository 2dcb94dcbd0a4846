//! JSON state files: present iff the operation is active.

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::OpsError;

pub(crate) const MERGE_STATE: &str = "MERGE_STATE";
pub(crate) const REBASE_STATE: &str = "REBASE_STATE";
pub(crate) const BISECT_STATE: &str = "BISECT_STATE";

fn io_err(path: &Path, source: std::io::Error) -> OpsError {
    OpsError::Io {
        path: path.to_path_buf(),
        source,
    }
}

pub(crate) fn state_path(meta_dir: &Path, name: &str) -> PathBuf {
    meta_dir.join(name)
}

/// Load a state file; `Ok(None)` when the operation is not active.
pub(crate) fn load<T: DeserializeOwned>(
    meta_dir: &Path,
    name: &str,
) -> Result<Option<T>, OpsError> {
    let path = state_path(meta_dir, name);
    let data = match fs::read(&path) {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(io_err(&path, e)),
    };
    Ok(Some(serde_json::from_slice(&data)?))
}

/// Write (or overwrite) a state file.
pub(crate) fn save<T: Serialize>(meta_dir: &Path, name: &str, state: &T) -> Result<(), OpsError> {
    let path = state_path(meta_dir, name);
    let data = serde_json::to_vec_pretty(state)?;
    fs::write(&path, data).map_err(|e| io_err(&path, e))
}

/// Remove a state file; missing is fine.
pub(crate) fn clear(meta_dir: &Path, name: &str) -> Result<(), OpsError> {
    let path = state_path(meta_dir, name);
    match fs::remove_file(&path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(io_err(&path, e)),
    }
}

/// Whether any interruptible operation holds the repository.
pub(crate) fn any_active(meta_dir: &Path) -> Option<&'static str> {
    for (file, name) in [
        (MERGE_STATE, "merge"),
        (REBASE_STATE, "rebase"),
        (BISECT_STATE, "bisect"),
    ] {
        if state_path(meta_dir, file).exists() {
            return Some(name);
        }
    }
    None
}
