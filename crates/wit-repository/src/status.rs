//! The staged / modified / deleted / untracked classification.

use bstr::{BString, ByteSlice};
use wit_hash::Hasher;

use crate::tree;
use crate::{RepoError, Repository};

/// Work-tree and index state relative to HEAD.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Status {
    /// Index differs from the HEAD tree (including staged deletions).
    pub staged: Vec<BString>,
    /// Work tree differs from the index.
    pub modified: Vec<BString>,
    /// In the index, missing from the work tree.
    pub deleted: Vec<BString>,
    /// In the work tree, not in the index, not ignored.
    pub untracked: Vec<BString>,
    /// Carrying unresolved merge stages.
    pub conflicted: Vec<BString>,
}

impl Status {
    pub fn is_clean(&self) -> bool {
        self.staged.is_empty()
            && self.modified.is_empty()
            && self.deleted.is_empty()
            && self.conflicted.is_empty()
    }
}

impl Repository {
    /// Compute the full status.
    ///
    /// The stat cache short-circuits unchanged files; content is hashed
    /// only when the cached metadata no longer matches.
    pub fn status(&self) -> Result<Status, RepoError> {
        let index = self.index()?;
        let head_map = tree::commit_tree_map(&self.odb, self.head_commit()?.as_ref())?;
        let ignore = self.ignore_set();

        let mut status = Status {
            conflicted: index.conflict_paths(),
            ..Default::default()
        };

        // Index vs HEAD.
        for entry in index.entries() {
            match head_map.get(&entry.path) {
                Some((mode, id)) if *mode == entry.mode && *id == entry.id => {}
                _ => status.staged.push(entry.path.clone()),
            }
        }
        for path in head_map.keys() {
            if index.get(path.as_bstr()).is_none() && index.conflict(path.as_bstr()).is_none() {
                status.staged.push(path.clone());
            }
        }
        status.staged.sort();
        status.staged.dedup();

        // Work tree vs index.
        for entry in index.entries() {
            let fs_path = self.work_path(entry.path.as_bstr());
            let meta = match std::fs::symlink_metadata(&fs_path) {
                Ok(meta) => meta,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    status.deleted.push(entry.path.clone());
                    continue;
                }
                Err(e) => return Err(RepoError::io(fs_path, e)),
            };

            if entry.stat.matches(&meta) {
                continue;
            }
            let content = self.read_work_file(entry.path.as_bstr())?;
            let id = Hasher::hash_object(self.algo, "blob", &content);
            if id != entry.id {
                status.modified.push(entry.path.clone());
            }
        }

        // Untracked files.
        for path in self.list_work_files()? {
            if index.get(path.as_bstr()).is_some() || index.conflict(path.as_bstr()).is_some() {
                continue;
            }
            if ignore.is_ignored(path.as_bstr(), false) {
                continue;
            }
            status.untracked.push(path);
        }

        Ok(status)
    }

    /// Refuse to proceed when the work tree or index has pending changes.
    pub fn ensure_clean(&self) -> Result<(), RepoError> {
        let status = self.status()?;
        if status.is_clean() {
            return Ok(());
        }
        let mut dirty = Vec::new();
        dirty.extend(status.staged);
        dirty.extend(status.modified);
        dirty.extend(status.deleted);
        dirty.extend(status.conflicted);
        dirty.sort();
        dirty.dedup();
        Err(RepoError::UncommittedChanges(dirty))
    }
}
