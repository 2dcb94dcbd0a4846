use std::path::PathBuf;

use bstr::BString;

/// Errors surfaced by repository operations.
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error("not a wit repository (or any parent up to the filesystem root): {0}")]
    NotARepository(PathBuf),

    #[error("repository already initialized at {0}")]
    AlreadyInitialized(PathBuf),

    #[error("revision not found: {0}")]
    RevisionNotFound(String),

    #[error("short id '{0}' is ambiguous")]
    Ambiguous(String),

    #[error("repository is corrupt: {0}")]
    Corrupt(String),

    #[error("nothing to commit (working tree matches HEAD)")]
    NothingToCommit,

    #[error("no commits yet on this repository")]
    NoCommitsYet,

    #[error("uncommitted changes would be overwritten (commit or discard them first): {}", format_paths(.0))]
    UncommittedChanges(Vec<BString>),

    #[error("branch already exists: {0}")]
    BranchExists(String),

    #[error("branch not found: {0}")]
    BranchNotFound(String),

    #[error("cannot delete the current branch: {0}")]
    BranchInUse(String),

    #[error("tag already exists: {0}")]
    TagExists(String),

    #[error("tag not found: {0}")]
    TagNotFound(String),

    #[error("file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("path is ignored: {0}")]
    IsIgnored(PathBuf),

    #[error("path escapes the work tree: {0}")]
    PathOutsideWorkTree(BString),

    #[error("HEAD is detached; this operation needs a branch")]
    DetachedHead,

    #[error("unresolved conflicts in: {}", format_paths(.0))]
    UnresolvedConflicts(Vec<BString>),

    #[error("nothing recorded in the journal")]
    JournalEmpty,

    #[error("operation cannot be undone: {0}")]
    NotUndoable(String),

    #[error("undo failed, no changes applied: {0}")]
    UndoApplyFailed(String),

    #[error("I/O error on {path}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Odb(#[from] wit_odb::OdbError),

    #[error(transparent)]
    Ref(#[from] wit_ref::RefError),

    #[error(transparent)]
    Index(#[from] wit_index::IndexError),

    #[error(transparent)]
    Config(#[from] wit_config::ConfigError),

    #[error(transparent)]
    Object(#[from] wit_object::ObjectError),

    #[error(transparent)]
    RevWalk(#[from] wit_revwalk::RevWalkError),

    #[error("cannot serialize journal entry: {0}")]
    Journal(#[from] serde_json::Error),
}

impl RepoError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

fn format_paths(paths: &[BString]) -> String {
    paths
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
