//! Comparing the work tree and index as line diffs.

use bstr::{BString, ByteSlice};
use wit_diff::{diff_hunks, is_binary, Hunk, DEFAULT_CONTEXT_LINES};

use crate::tree;
use crate::{RepoError, Repository};

/// The diff of one path.
#[derive(Debug)]
pub struct FileDiff {
    pub path: BString,
    /// Binary or over the large-file threshold: no hunks are produced.
    pub binary: bool,
    pub hunks: Vec<Hunk>,
}

impl Repository {
    /// Unstaged changes: index content against the work tree.
    ///
    /// Deleted files diff against empty content. Binary files and files at
    /// or above `core.large-file-threshold` are flagged, not line-diffed.
    pub fn diff_worktree(&self) -> Result<Vec<FileDiff>, RepoError> {
        let status = self.status()?;
        let index = self.index()?;
        let mut out = Vec::new();

        for path in status.modified.iter().chain(status.deleted.iter()) {
            let entry = index
                .get(path.as_bstr())
                .ok_or_else(|| RepoError::Corrupt(format!("status path {path} not in index")))?;
            let old = self.objects().read_blob(&entry.id)?.data;
            let new = if status.deleted.contains(path) {
                Vec::new()
            } else {
                self.read_work_file(path.as_bstr())?
            };
            out.push(self.file_diff(path.clone(), &old, &new));
        }
        Ok(out)
    }

    /// Staged changes: HEAD tree content against the index.
    pub fn diff_staged(&self) -> Result<Vec<FileDiff>, RepoError> {
        let head_map = tree::commit_tree_map(&self.odb, self.head_commit()?.as_ref())?;
        let index = self.index()?;
        let mut out = Vec::new();

        for path in self.status()?.staged {
            let old = match head_map.get(&path) {
                Some((_, id)) => self.objects().read_blob(id)?.data,
                None => Vec::new(),
            };
            let new = match index.get(path.as_bstr()) {
                Some(entry) => self.objects().read_blob(&entry.id)?.data,
                None => Vec::new(),
            };
            out.push(self.file_diff(path, &old, &new));
        }
        Ok(out)
    }

    fn file_diff(&self, path: BString, old: &[u8], new: &[u8]) -> FileDiff {
        let binary = is_binary(old)
            || is_binary(new)
            || self.is_large_file(old.len().max(new.len()) as u64);
        let hunks = if binary {
            Vec::new()
        } else {
            diff_hunks(old, new, DEFAULT_CONTEXT_LINES)
        };
        FileDiff {
            path,
            binary,
            hunks,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bstr::BStr;
    use wit_diff::DiffLineKind;
    use wit_object::FileMode;

    fn repo() -> (tempfile::TempDir, Repository) {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        (dir, repo)
    }

    #[test]
    fn worktree_diff_shows_edits_and_deletions() {
        let (_dir, repo) = repo();
        repo.write_work_file(BStr::new("a.txt"), FileMode::Regular, b"1\n2\n3\n")
            .unwrap();
        repo.write_work_file(BStr::new("b.txt"), FileMode::Regular, b"gone\n")
            .unwrap();
        repo.add_all().unwrap();
        repo.commit("base", None).unwrap();

        repo.write_work_file(BStr::new("a.txt"), FileMode::Regular, b"1\nTWO\n3\n")
            .unwrap();
        std::fs::remove_file(repo.work_path(BStr::new("b.txt"))).unwrap();

        let diffs = repo.diff_worktree().unwrap();
        assert_eq!(diffs.len(), 2);

        let a = diffs.iter().find(|d| d.path == "a.txt").unwrap();
        assert!(!a.binary);
        assert_eq!(a.hunks.len(), 1);
        let kinds: Vec<DiffLineKind> = a.hunks[0].lines.iter().map(|l| l.kind).collect();
        assert!(kinds.contains(&DiffLineKind::Remove));
        assert!(kinds.contains(&DiffLineKind::Add));

        let b = diffs.iter().find(|d| d.path == "b.txt").unwrap();
        assert!(b.hunks[0]
            .lines
            .iter()
            .all(|l| l.kind == DiffLineKind::Remove));
    }

    #[test]
    fn staged_diff_compares_head_to_index() {
        let (_dir, repo) = repo();
        repo.write_work_file(BStr::new("a.txt"), FileMode::Regular, b"old\n")
            .unwrap();
        repo.add("a.txt").unwrap();
        repo.commit("base", None).unwrap();

        repo.write_work_file(BStr::new("a.txt"), FileMode::Regular, b"new\n")
            .unwrap();
        repo.add("a.txt").unwrap();

        let diffs = repo.diff_staged().unwrap();
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].path, "a.txt");
        assert_eq!(diffs[0].hunks.len(), 1);

        // Nothing unstaged.
        assert!(repo.diff_worktree().unwrap().is_empty());
    }

    #[test]
    fn binary_content_is_flagged_not_diffed() {
        let (_dir, repo) = repo();
        repo.write_work_file(BStr::new("blob.bin"), FileMode::Regular, b"\x00\x01\x02")
            .unwrap();
        repo.add("blob.bin").unwrap();
        repo.commit("bin", None).unwrap();
        repo.write_work_file(BStr::new("blob.bin"), FileMode::Regular, b"\x00\x03")
            .unwrap();

        let diffs = repo.diff_worktree().unwrap();
        assert!(diffs[0].binary);
        assert!(diffs[0].hunks.is_empty());
    }
}
