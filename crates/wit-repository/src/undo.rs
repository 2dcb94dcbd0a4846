//! Reversing journaled operations.

use bstr::BString;
use wit_hash::ObjectId;
use wit_index::{Index, IndexEntry};
use wit_object::FileMode;
use wit_ref::RefName;

use crate::journal::JournalEntry;
use crate::{RepoError, Repository};

/// Result of an undo run.
#[derive(Debug)]
pub struct UndoOutcome {
    /// Entries that were (or, in a dry run, would be) reversed,
    /// newest first.
    pub undone: Vec<JournalEntry>,
    pub message: String,
}

impl Repository {
    /// Undo the last `steps` journaled operations.
    ///
    /// All-or-nothing: every entry in the batch is validated as undoable
    /// before anything is applied. `dry_run` reports the batch without
    /// touching the repository.
    pub fn undo(&self, steps: usize, dry_run: bool) -> Result<UndoOutcome, RepoError> {
        let entries = self.journal().entries()?;
        if entries.is_empty() {
            return Err(RepoError::JournalEmpty);
        }
        if steps == 0 || steps > entries.len() {
            return Err(RepoError::NotUndoable(format!(
                "requested {steps} steps, journal has {}",
                entries.len()
            )));
        }

        let batch: Vec<JournalEntry> =
            entries[entries.len() - steps..].iter().rev().cloned().collect();

        for entry in &batch {
            validate_undoable(entry)?;
        }

        let message = format!(
            "undid {}: {}",
            if steps == 1 {
                "1 operation".to_string()
            } else {
                format!("{steps} operations")
            },
            batch
                .iter()
                .map(|e| e.operation.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );

        if dry_run {
            return Ok(UndoOutcome {
                undone: batch,
                message,
            });
        }

        for entry in &batch {
            self.apply_undo(entry)
                .map_err(|e| RepoError::UndoApplyFailed(e.to_string()))?;
        }
        self.journal().drop_last(steps)?;

        Ok(UndoOutcome {
            undone: batch,
            message,
        })
    }

    fn apply_undo(&self, entry: &JournalEntry) -> Result<(), RepoError> {
        match entry.operation.as_str() {
            "commit" => {
                let parent = context_str(entry, "parent")
                    .map(|hex| ObjectId::from_hex(&hex))
                    .transpose()
                    .map_err(|e| RepoError::Corrupt(e.to_string()))?;
                let parent =
                    parent.ok_or_else(|| RepoError::NotUndoable("initial commit".into()))?;
                match &entry.after_state.branch {
                    Some(branch) => {
                        self.refs().update(&RefName::branch(branch)?, parent)?;
                        self.refs()
                            .set_head_symbolic(&RefName::branch(branch)?)?;
                    }
                    None => self.refs().set_head_detached(parent)?,
                }
                self.reset_worktree_to(Some(parent))?;
            }
            "add" => {
                self.restore_index(entry)?;
            }
            "checkout" | "switch" => {
                let head = entry
                    .before_state
                    .head
                    .as_deref()
                    .map(ObjectId::from_hex)
                    .transpose()
                    .map_err(|e| RepoError::Corrupt(e.to_string()))?;
                match (&entry.before_state.branch, head) {
                    (Some(branch), head) => {
                        self.refs().set_head_symbolic(&RefName::branch(branch)?)?;
                        self.reset_worktree_to(head)?;
                    }
                    (None, Some(head)) => {
                        self.refs().set_head_detached(head)?;
                        self.reset_worktree_to(Some(head))?;
                    }
                    (None, None) => {
                        return Err(RepoError::NotUndoable(
                            "checkout with no prior state".into(),
                        ))
                    }
                }
            }
            "branch-create" => {
                let branch = context_str(entry, "branch")
                    .ok_or_else(|| RepoError::NotUndoable("missing branch context".into()))?;
                self.refs().delete(&RefName::branch(&branch)?)?;
            }
            "branch-delete" => {
                let branch = context_str(entry, "branch")
                    .ok_or_else(|| RepoError::NotUndoable("missing branch context".into()))?;
                let commit = context_str(entry, "commit")
                    .ok_or_else(|| RepoError::NotUndoable("missing commit context".into()))?;
                let id = ObjectId::from_hex(&commit)
                    .map_err(|e| RepoError::Corrupt(e.to_string()))?;
                self.refs().create(&RefName::branch(&branch)?, id)?;
            }
            "reset" => {
                let head = entry
                    .before_state
                    .head
                    .as_deref()
                    .map(ObjectId::from_hex)
                    .transpose()
                    .map_err(|e| RepoError::Corrupt(e.to_string()))?;
                if let Some(branch) = &entry.before_state.branch {
                    if let Some(head) = head {
                        self.refs().update(&RefName::branch(branch)?, head)?;
                    }
                }
                self.reset_worktree_to(head)?;
            }
            other => return Err(RepoError::NotUndoable(other.to_string())),
        }
        Ok(())
    }

    /// Rebuild the index from the entry snapshot in an add/remove record.
    fn restore_index(&self, entry: &JournalEntry) -> Result<(), RepoError> {
        let snapshot = entry
            .context
            .as_ref()
            .and_then(|c| c.get("previous_index"))
            .and_then(|v| v.as_array())
            .ok_or_else(|| RepoError::NotUndoable("missing index snapshot".into()))?;

        let mut index = Index::new(self.meta_dir().join("index"), self.algorithm());
        for row in snapshot {
            let (Some(path), Some(mode), Some(id)) = (
                row.get(0).and_then(|v| v.as_str()),
                row.get(1).and_then(|v| v.as_u64()),
                row.get(2).and_then(|v| v.as_str()),
            ) else {
                return Err(RepoError::NotUndoable("malformed index snapshot".into()));
            };
            let mode = FileMode::from_raw(mode as u32)
                .ok_or_else(|| RepoError::Corrupt(format!("bad mode {mode:o}")))?;
            let id =
                ObjectId::from_hex(id).map_err(|e| RepoError::Corrupt(e.to_string()))?;
            index.add(IndexEntry::new(BString::from(path), mode, id));
        }
        index.save()?;
        Ok(())
    }
}

fn validate_undoable(entry: &JournalEntry) -> Result<(), RepoError> {
    match entry.operation.as_str() {
        "commit" => {
            if context_str(entry, "parent").is_none() {
                return Err(RepoError::NotUndoable(
                    "the initial commit has no parent to return to".into(),
                ));
            }
        }
        "add" => {
            if entry
                .context
                .as_ref()
                .and_then(|c| c.get("previous_index"))
                .is_none()
            {
                return Err(RepoError::NotUndoable("add without index snapshot".into()));
            }
        }
        "checkout" | "switch" | "branch-create" | "branch-delete" | "reset" => {}
        other => return Err(RepoError::NotUndoable(other.to_string())),
    }
    Ok(())
}

fn context_str(entry: &JournalEntry, key: &str) -> Option<String> {
    entry
        .context
        .as_ref()
        .and_then(|c| c.get(key))
        .and_then(|v| v.as_str())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bstr::BStr;

    fn repo() -> (tempfile::TempDir, Repository) {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        (dir, repo)
    }

    fn commit_file(repo: &Repository, path: &str, content: &[u8], msg: &str) -> ObjectId {
        repo.write_work_file(BStr::new(path), FileMode::Regular, content)
            .unwrap();
        repo.add(path).unwrap();
        repo.commit(msg, None).unwrap()
    }

    #[test]
    fn undo_commit_moves_branch_back() {
        let (_dir, repo) = repo();
        let first = commit_file(&repo, "f.txt", b"1\n", "one");
        commit_file(&repo, "f.txt", b"2\n", "two");

        let outcome = repo.undo(1, false).unwrap();
        assert_eq!(outcome.undone.len(), 1);
        assert_eq!(outcome.undone[0].operation, "commit");
        assert_eq!(repo.head_commit().unwrap(), Some(first));
        assert_eq!(repo.read_work_file(BStr::new("f.txt")).unwrap(), b"1\n");
    }

    #[test]
    fn undo_initial_commit_refused() {
        let (_dir, repo) = repo();
        commit_file(&repo, "f.txt", b"1\n", "only");
        // The last entry is the commit of a parentless commit.
        assert!(matches!(
            repo.undo(1, false),
            Err(RepoError::NotUndoable(_))
        ));
    }

    #[test]
    fn undo_add_restores_previous_index() {
        let (_dir, repo) = repo();
        repo.write_work_file(BStr::new("f.txt"), FileMode::Regular, b"x\n")
            .unwrap();
        repo.add("f.txt").unwrap();
        assert_eq!(repo.index().unwrap().len(), 1);

        repo.undo(1, false).unwrap();
        assert!(repo.index().unwrap().is_empty());
    }

    #[test]
    fn undo_branch_create_deletes_it() {
        let (_dir, repo) = repo();
        commit_file(&repo, "f.txt", b"1\n", "one");
        repo.create_branch("feature").unwrap();
        assert_eq!(repo.list_branches().unwrap().len(), 2);

        repo.undo(1, false).unwrap();
        assert_eq!(repo.list_branches().unwrap().len(), 1);
    }

    #[test]
    fn undo_branch_delete_recreates_it() {
        let (_dir, repo) = repo();
        let head = commit_file(&repo, "f.txt", b"1\n", "one");
        repo.create_branch("feature").unwrap();
        repo.delete_branch("feature").unwrap();

        repo.undo(1, false).unwrap();
        assert_eq!(
            repo.refs()
                .resolve(&RefName::branch("feature").unwrap())
                .unwrap(),
            Some(head)
        );
    }

    #[test]
    fn dry_run_changes_nothing() {
        let (_dir, repo) = repo();
        commit_file(&repo, "f.txt", b"1\n", "one");
        let second = commit_file(&repo, "f.txt", b"2\n", "two");

        let outcome = repo.undo(1, true).unwrap();
        assert_eq!(outcome.undone.len(), 1);
        assert_eq!(repo.head_commit().unwrap(), Some(second));
        assert_eq!(repo.journal().entries().unwrap().len(), 4);
    }

    #[test]
    fn batch_is_all_or_nothing() {
        let (_dir, repo) = repo();
        commit_file(&repo, "f.txt", b"1\n", "one");
        // Batch of 2 = [commit two, add two]; batch of 4 includes the
        // initial commit, which is not undoable — nothing may change.
        let second = commit_file(&repo, "f.txt", b"2\n", "two");

        assert!(repo.undo(4, false).is_err());
        assert_eq!(repo.head_commit().unwrap(), Some(second));
        assert_eq!(repo.journal().entries().unwrap().len(), 4);
    }

    #[test]
    fn empty_journal_reports_empty() {
        let (_dir, repo) = repo();
        assert!(matches!(repo.undo(1, false), Err(RepoError::JournalEmpty)));
    }

    #[test]
    fn undo_checkout_returns_to_previous_branch() {
        let (_dir, repo) = repo();
        commit_file(&repo, "f.txt", b"1\n", "one");
        repo.checkout("feature", true).unwrap();
        assert_eq!(repo.refs().current_branch().unwrap(), Some("feature".into()));

        // Last journal entry is the checkout.
        repo.undo(1, false).unwrap();
        assert_eq!(repo.refs().current_branch().unwrap(), Some("main".into()));
    }
}
