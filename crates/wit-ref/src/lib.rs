//! Named pointers into the object graph.
//!
//! A ref lives either as a loose file under `refs/` (one ref per file) or as
//! a line in `packed-refs`; loose wins on lookup. `HEAD` is symbolic while on
//! a branch and direct when detached. All writes go through lock files.

mod loose;
mod name;
mod packed;
mod store;

pub use name::RefName;
pub use packed::{PackedRef, PackedRefs};
pub use store::{PackRefsReport, RefStore};

use std::path::PathBuf;

use wit_hash::ObjectId;

/// What a ref points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefTarget {
    /// Points directly at an object.
    Direct(ObjectId),
    /// Points at another ref.
    Symbolic(RefName),
}

/// The state of `HEAD`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Head {
    /// Symbolic: on a branch (which may be unborn).
    OnBranch(RefName),
    /// Direct: detached at a commit.
    Detached(ObjectId),
}

impl Head {
    pub fn is_detached(&self) -> bool {
        matches!(self, Self::Detached(_))
    }
}

/// Errors from the reference store.
#[derive(Debug, thiserror::Error)]
pub enum RefError {
    #[error("invalid ref name: {0}")]
    InvalidName(String),

    #[error("ref not found: {0}")]
    NotFound(String),

    #[error("ref already exists: {0}")]
    AlreadyExists(String),

    #[error("ref is locked: {path}")]
    Locked { path: PathBuf },

    #[error("symbolic ref chain too deep resolving {0}")]
    SymrefLoop(String),

    #[error("cannot parse ref data: {0}")]
    Parse(String),

    #[error("I/O error on {path}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Hash(#[from] wit_hash::HashError),
}

impl RefError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<wit_utils::UtilError> for RefError {
    fn from(e: wit_utils::UtilError) -> Self {
        match e {
            wit_utils::UtilError::Lock(wit_utils::LockError::AlreadyLocked { path }) => {
                Self::Locked { path }
            }
            wit_utils::UtilError::Lock(wit_utils::LockError::Create { path, source })
            | wit_utils::UtilError::Lock(wit_utils::LockError::Commit { path, source }) => {
                Self::io(path, source)
            }
            wit_utils::UtilError::Io(source) => Self::io(PathBuf::new(), source),
            other => Self::Parse(other.to_string()),
        }
    }
}
