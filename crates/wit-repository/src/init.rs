use std::fs;
use std::path::Path;

use wit_config::Config;
use wit_hash::HashAlgorithm;

use crate::{RepoError, META_DIR_NAME};

/// Options for repository initialization.
pub struct InitOptions {
    pub algorithm: HashAlgorithm,
    /// Branch HEAD points at; `None` uses the config default (`main`).
    pub default_branch: Option<String>,
}

impl Default for InitOptions {
    fn default() -> Self {
        Self {
            algorithm: HashAlgorithm::Sha1,
            default_branch: None,
        }
    }
}

/// Create the metadata layout:
///
/// ```text
/// .wit/
///   objects/pack/
///   refs/heads/  refs/tags/  refs/remotes/
///   HEAD          -> ref: refs/heads/<default>
///   config        -> hash algorithm + default branch
///   journal/
/// ```
///
/// HEAD points at an unborn branch; the first commit creates its ref.
pub fn init_repository(path: &Path, opts: &InitOptions) -> Result<(), RepoError> {
    let meta_dir = path.join(META_DIR_NAME);
    if meta_dir.exists() {
        return Err(RepoError::AlreadyInitialized(path.to_path_buf()));
    }

    for dir in [
        meta_dir.join("objects").join("pack"),
        meta_dir.join("refs").join("heads"),
        meta_dir.join("refs").join("tags"),
        meta_dir.join("refs").join("remotes"),
        meta_dir.join("journal"),
    ] {
        fs::create_dir_all(&dir).map_err(|e| RepoError::io(dir.clone(), e))?;
    }

    let default_branch = opts
        .default_branch
        .clone()
        .unwrap_or_else(|| wit_config::DEFAULT_BRANCH.to_string());

    let head_path = meta_dir.join("HEAD");
    fs::write(
        &head_path,
        format!("ref: refs/heads/{default_branch}\n"),
    )
    .map_err(|e| RepoError::io(head_path, e))?;

    let mut config = Config::new();
    config.set("core", wit_config::KEY_HASH_ALGORITHM, opts.algorithm.name());
    config.set("core", wit_config::KEY_DEFAULT_BRANCH, default_branch);
    config.save(meta_dir.join("config"))?;

    Ok(())
}
