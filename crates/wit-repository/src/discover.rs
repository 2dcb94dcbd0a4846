use std::path::{Path, PathBuf};

use crate::{RepoError, META_DIR_NAME};

/// Walk up from `start` until a directory containing `.wit/` is found.
pub fn find_root(start: &Path) -> Result<PathBuf, RepoError> {
    let start = if start.is_absolute() {
        start.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(|e| RepoError::io(start.to_path_buf(), e))?
            .join(start)
    };

    let mut current = start.as_path();
    loop {
        if current.join(META_DIR_NAME).join("HEAD").is_file() {
            return Ok(current.to_path_buf());
        }
        match current.parent() {
            Some(parent) => current = parent,
            None => return Err(RepoError::NotARepository(start)),
        }
    }
}
