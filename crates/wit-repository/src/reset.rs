//! Moving the current branch (and optionally index/work tree) to a commit.

use serde_json::json;
use wit_hash::ObjectId;
use wit_index::{Index, IndexEntry};
use wit_ref::Head;

use crate::tree::commit_tree_map;
use crate::{RepoError, Repository};

/// How much state a reset touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetMode {
    /// Move the branch pointer only.
    Soft,
    /// Also rebuild the index from the target tree.
    Mixed,
    /// Also overwrite the work tree.
    Hard,
}

impl Repository {
    /// Reset the current branch (or detached HEAD) to a revision.
    pub fn reset(&self, refish: &str, mode: ResetMode) -> Result<ObjectId, RepoError> {
        let before = self.capture_state()?;
        let target = self.peel_to_commit(self.rev_parse(refish)?)?;

        match self.refs().head()? {
            Head::OnBranch(branch) => self.refs().update(&branch, target)?,
            Head::Detached(_) => self.refs().set_head_detached(target)?,
        }

        match mode {
            ResetMode::Soft => {}
            ResetMode::Mixed => {
                // Fresh entries carry no stat cache, so the next status
                // re-hashes against whatever the work tree holds.
                let map = commit_tree_map(&self.odb, Some(&target))?;
                let mut index = Index::new(self.meta_dir().join("index"), self.algorithm());
                for (path, (entry_mode, id)) in &map {
                    index.add(IndexEntry::new(path.clone(), *entry_mode, *id));
                }
                index.save()?;
            }
            ResetMode::Hard => self.reset_worktree_to(Some(target))?,
        }

        self.record_operation(
            "reset",
            vec![refish.to_string(), format!("{mode:?}").to_lowercase()],
            format!("reset to {}", target.short_hex(8)),
            before,
            Some(json!({ "target": target.to_hex() })),
        )?;
        Ok(target)
    }
}
