//! Error-to-exit-code mapping at the CLI boundary.
//!
//! 1 is the generic failure; 128 marks repository-state errors (the caller
//! should inspect the repository, not retry); 2 is bad usage and comes out
//! of clap before we ever run.

use wit_ops::OpsError;
use wit_repository::RepoError;

pub const GENERIC: i32 = 1;
pub const REPO_STATE: i32 = 128;

pub fn code_for(err: &anyhow::Error) -> i32 {
    if let Some(repo_err) = err.downcast_ref::<RepoError>() {
        return repo_code(repo_err);
    }
    if let Some(ops_err) = err.downcast_ref::<OpsError>() {
        return ops_code(ops_err);
    }
    if let Some(protocol_err) = err.downcast_ref::<wit_protocol::ProtocolError>() {
        return match protocol_err {
            wit_protocol::ProtocolError::Repo(repo_err) => repo_code(repo_err),
            _ => GENERIC,
        };
    }
    GENERIC
}

fn repo_code(err: &RepoError) -> i32 {
    match err {
        RepoError::NotARepository(_)
        | RepoError::AlreadyInitialized(_)
        | RepoError::NothingToCommit
        | RepoError::NoCommitsYet
        | RepoError::UncommittedChanges(_)
        | RepoError::UnresolvedConflicts(_)
        | RepoError::DetachedHead
        | RepoError::BranchExists(_)
        | RepoError::BranchInUse(_)
        | RepoError::Corrupt(_) => REPO_STATE,
        _ => GENERIC,
    }
}

fn ops_code(err: &OpsError) -> i32 {
    match err {
        OpsError::AlreadyInProgress(_)
        | OpsError::NoOperationInProgress
        | OpsError::UnresolvedConflicts(_)
        | OpsError::DetachedHead
        | OpsError::NoCommitsYet => REPO_STATE,
        OpsError::Repo(repo_err) => repo_code(repo_err),
        _ => GENERIC,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repo_state_errors_map_to_128() {
        let err = anyhow::Error::new(RepoError::NothingToCommit);
        assert_eq!(code_for(&err), REPO_STATE);

        let err = anyhow::Error::new(OpsError::AlreadyInProgress("merge"));
        assert_eq!(code_for(&err), REPO_STATE);
    }

    #[test]
    fn everything_else_is_generic() {
        let err = anyhow::anyhow!("some transport hiccup");
        assert_eq!(code_for(&err), GENERIC);
    }
}
