//! Interruptible repository operations.
//!
//! Merge, rebase, and bisect all persist their progress to a JSON state
//! file in the metadata dir (`MERGE_STATE`, `REBASE_STATE`, `BISECT_STATE`).
//! The file's presence marks the operation as in progress: starting another
//! conflicting operation fails with `AlreadyInProgress`, and a process exit
//! mid-conflict loses nothing.

pub mod bisect;
pub mod merge;
pub mod rebase;
mod state;

pub use bisect::{BisectState, BisectStatus};
pub use merge::{MergeOptions, MergeOutcome, MergeState};
pub use rebase::{RebaseOutcome, RebaseState};

/// Errors from compound operations.
///
/// `UnresolvedConflicts` is user-actionable and leaves the state file in
/// place; most other failures warrant an abort.
#[derive(Debug, thiserror::Error)]
pub enum OpsError {
    #[error("a {0} is already in progress")]
    AlreadyInProgress(&'static str),

    #[error("no operation in progress")]
    NoOperationInProgress,

    #[error("unresolved conflicts remain: {}", .0.join(", "))]
    UnresolvedConflicts(Vec<String>),

    #[error("HEAD is detached; this operation needs a branch")]
    DetachedHead,

    #[error("no commits yet on this repository")]
    NoCommitsYet,

    #[error("no commits left to bisect between the good and bad marks")]
    NothingToBisect,

    #[error("cannot parse operation state: {0}")]
    State(#[from] serde_json::Error),

    #[error("I/O error on {path}")]
    Io {
        path: std::path::PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Repo(#[from] wit_repository::RepoError),

    #[error(transparent)]
    RevWalk(#[from] wit_revwalk::RevWalkError),

    #[error(transparent)]
    Odb(#[from] wit_odb::OdbError),

    #[error(transparent)]
    Ref(#[from] wit_ref::RefError),

    #[error(transparent)]
    Index(#[from] wit_index::IndexError),
}
