//! Switching the work tree, index, and HEAD between revisions.

use bstr::ByteSlice;
use serde_json::json;
use wit_hash::ObjectId;
use wit_index::{Index, IndexEntry, StatCache};

use crate::tree::{commit_tree_map, TreeMap};
use crate::{RepoError, Repository};

impl Repository {
    /// Check out a revision.
    ///
    /// With `create`, a branch named `refish` is created at HEAD first.
    /// Branch names attach HEAD symbolically; other revisions detach it.
    /// Refuses to overwrite uncommitted changes unless the target commit
    /// equals the current one.
    pub fn checkout(&self, refish: &str, create: bool) -> Result<(), RepoError> {
        let before = self.capture_state()?;

        if create {
            self.create_branch(refish)?;
            self.refs().set_head_symbolic(&wit_ref::RefName::branch(refish)?)?;
            self.record_operation(
                "checkout",
                vec!["-b".into(), refish.to_string()],
                format!("switch to new branch {refish}"),
                before,
                None,
            )?;
            return Ok(());
        }

        // Branch short name → symbolic; anything else → detached.
        let (branch, commit_id) = match self.refs().resolve_short(refish)? {
            Some((name, id)) if name.is_branch() => (Some(name), self.peel_to_commit(id)?),
            Some((_, id)) => (None, self.peel_to_commit(id)?),
            None => {
                let id = self.rev_parse(refish)?;
                (None, self.peel_to_commit(id)?)
            }
        };

        let current = self.head_commit()?;
        if current != Some(commit_id) {
            self.ensure_clean()?;
            let current_map = commit_tree_map(&self.odb, current.as_ref())?;
            let target_map = commit_tree_map(&self.odb, Some(&commit_id))?;
            self.update_work_tree(&current_map, &target_map)?;
            self.write_index_for_tree(&target_map)?;
        }

        match &branch {
            Some(name) => self.refs().set_head_symbolic(name)?,
            None => self.refs().set_head_detached(commit_id)?,
        }

        self.record_operation(
            "checkout",
            vec![refish.to_string()],
            format!("checkout {refish}"),
            before,
            Some(json!({ "commit": commit_id.to_hex() })),
        )?;
        Ok(())
    }

    /// Detach HEAD at a commit, updating index and work tree.
    ///
    /// Plumbing for rebase and bisect; the caller checks preconditions.
    pub fn checkout_detached(&self, commit_id: ObjectId) -> Result<(), RepoError> {
        let current = self.head_commit()?;
        if current != Some(commit_id) {
            let current_map = commit_tree_map(&self.odb, current.as_ref())?;
            let target_map = commit_tree_map(&self.odb, Some(&commit_id))?;
            self.update_work_tree(&current_map, &target_map)?;
            self.write_index_for_tree(&target_map)?;
        }
        self.refs().set_head_detached(commit_id)?;
        Ok(())
    }

    /// Force the index and work tree to a commit's content, clobbering
    /// local modifications. The abort path of merge and rebase.
    pub fn reset_worktree_to(&self, commit_id: Option<ObjectId>) -> Result<(), RepoError> {
        let index = self.index()?;
        let mut tracked: TreeMap = TreeMap::new();
        for entry in index.entries() {
            tracked.insert(entry.path.clone(), (entry.mode, entry.id));
        }
        for (path, stages) in index.conflicts() {
            if let Some((mode, id)) = stages.ours.or(stages.base).or(stages.theirs) {
                tracked.insert(path.clone(), (mode, id));
            }
        }

        let target_map = commit_tree_map(&self.odb, commit_id.as_ref())?;
        // Write every target entry unconditionally; the disk cannot be
        // trusted to match anything here.
        self.materialize_tree(&target_map)?;
        for path in tracked.keys() {
            if !target_map.contains_key(path) {
                self.remove_work_file(path.as_bstr())?;
            }
        }
        self.write_index_for_tree(&target_map)?;
        Ok(())
    }

    /// Rebuild the index to mirror a flattened tree, with fresh stat data.
    pub fn write_index_for_tree(&self, map: &TreeMap) -> Result<(), RepoError> {
        let mut index = Index::new(self.meta_dir().join("index"), self.algorithm());
        for (path, (mode, id)) in map {
            let stat = std::fs::symlink_metadata(self.work_path(path.as_bstr()))
                .map(|meta| StatCache::from_metadata(&meta))
                .unwrap_or_default();
            index.add(IndexEntry::new(path.clone(), *mode, *id).with_stat(stat));
        }
        index.save()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bstr::BStr;
    use wit_object::FileMode;

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
    fn checkout_branch_switches_tree_and_head() {
        let (_dir, repo) = repo();
        commit_file(&repo, "f.txt", b"main\n", "on main");

        repo.checkout("feature", true).unwrap();
        assert_eq!(repo.refs().current_branch().unwrap(), Some("feature".into()));
        commit_file(&repo, "f.txt", b"feature\n", "on feature");

        repo.checkout("main", false).unwrap();
        assert_eq!(repo.refs().current_branch().unwrap(), Some("main".into()));
        assert_eq!(repo.read_work_file(BStr::new("f.txt")).unwrap(), b"main\n");

        repo.checkout("feature", false).unwrap();
        assert_eq!(repo.read_work_file(BStr::new("f.txt")).unwrap(), b"feature\n");
    }

    #[test]
    fn checkout_commit_detaches() {
        let (_dir, repo) = repo();
        let first = commit_file(&repo, "f.txt", b"1\n", "one");
        commit_file(&repo, "f.txt", b"2\n", "two");

        repo.checkout(&first.to_hex(), false).unwrap();
        assert_eq!(repo.refs().current_branch().unwrap(), None);
        assert_eq!(repo.head_commit().unwrap(), Some(first));
        assert_eq!(repo.read_work_file(BStr::new("f.txt")).unwrap(), b"1\n");
    }

    #[test]
    fn dirty_tree_blocks_checkout() {
        let (_dir, repo) = repo();
        commit_file(&repo, "f.txt", b"1\n", "one");
        repo.checkout("feature", true).unwrap();
        commit_file(&repo, "f.txt", b"2\n", "two");

        repo.write_work_file(BStr::new("f.txt"), FileMode::Regular, b"dirty\n")
            .unwrap();
        assert!(matches!(
            repo.checkout("main", false),
            Err(RepoError::UncommittedChanges(_))
        ));
    }

    #[test]
    fn files_absent_from_target_are_removed() {
        let (_dir, repo) = repo();
        commit_file(&repo, "keep.txt", b"k\n", "base");
        repo.checkout("feature", true).unwrap();
        commit_file(&repo, "extra.txt", b"e\n", "extra");

        repo.checkout("main", false).unwrap();
        assert!(repo.work_path(BStr::new("keep.txt")).exists());
        assert!(!repo.work_path(BStr::new("extra.txt")).exists());
    }

    #[test]
    fn reset_worktree_clobbers_local_edits() {
        let (_dir, repo) = repo();
        let first = commit_file(&repo, "f.txt", b"clean\n", "one");
        repo.write_work_file(BStr::new("f.txt"), FileMode::Regular, b"scribble\n")
            .unwrap();

        repo.reset_worktree_to(Some(first)).unwrap();
        assert_eq!(repo.read_work_file(BStr::new("f.txt")).unwrap(), b"clean\n");
        assert!(repo.status().unwrap().is_clean());
    }

    #[test]
    fn unknown_revision_fails() {
        let (_dir, repo) = repo();
        commit_file(&repo, "f.txt", b"1\n", "one");
        assert!(matches!(
            repo.checkout("no-such-thing", false),
            Err(RepoError::RevisionNotFound(_))
        ));
    }
}
