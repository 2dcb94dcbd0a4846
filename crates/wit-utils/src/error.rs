use std::path::PathBuf;

/// Errors from lock-file acquisition and release.
#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("lock already held: {path}")]
    AlreadyLocked { path: PathBuf },

    #[error("cannot create lock file {path}")]
    Create {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot commit lock file {path}")]
    Commit {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Errors from the utility layer.
#[derive(Debug, thiserror::Error)]
pub enum UtilError {
    #[error(transparent)]
    Lock(#[from] LockError),

    #[error("cannot parse date: {0}")]
    DateParse(String),

    #[error("cannot parse signature: {0}")]
    SignatureParse(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
