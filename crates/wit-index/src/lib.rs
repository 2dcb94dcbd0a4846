//! The staging area: an ordered map from path to `(mode, id, stat)`.
//!
//! The on-disk format is wit's own (`WIDX` version 1) — deterministic for a
//! given entry set, guarded by `index.lock`, and sealed with a trailing
//! content hash. Conflicted paths carry stage 1/2/3 entries in a side table.

mod entry;
mod file;

pub use entry::{ConflictStages, IndexEntry, StatCache};

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use bstr::{BStr, BString};
use wit_hash::{HashAlgorithm, ObjectId};

/// Errors from index persistence and mutation.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("index is locked: {path}")]
    Locked { path: PathBuf },

    #[error("index file is corrupt: {0}")]
    Corrupt(String),

    #[error("I/O error on {path}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl From<wit_utils::UtilError> for IndexError {
    fn from(e: wit_utils::UtilError) -> Self {
        match e {
            wit_utils::UtilError::Lock(wit_utils::LockError::AlreadyLocked { path }) => {
                Self::Locked { path }
            }
            wit_utils::UtilError::Lock(wit_utils::LockError::Create { path, source })
            | wit_utils::UtilError::Lock(wit_utils::LockError::Commit { path, source }) => {
                Self::Io { path, source }
            }
            wit_utils::UtilError::Io(source) => Self::Io {
                path: PathBuf::new(),
                source,
            },
            other => Self::Corrupt(other.to_string()),
        }
    }
}

/// The in-memory index.
///
/// Entries are kept sorted by path bytes; at most one stage-0 entry per
/// path. Conflicts live beside the entries and are cleared by a stage-0
/// add for the same path.
#[derive(Debug)]
pub struct Index {
    path: PathBuf,
    algo: HashAlgorithm,
    entries: Vec<IndexEntry>,
    conflicts: BTreeMap<BString, ConflictStages>,
}

impl Index {
    /// An empty index that will persist at `path`.
    pub fn new(path: impl Into<PathBuf>, algo: HashAlgorithm) -> Self {
        Self {
            path: path.into(),
            algo,
            entries: Vec::new(),
            conflicts: BTreeMap::new(),
        }
    }

    pub fn file_path(&self) -> &Path {
        &self.path
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algo
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sorted entries.
    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub fn get(&self, path: &BStr) -> Option<&IndexEntry> {
        self.entries
            .binary_search_by(|e| e.path.as_slice().cmp(path.as_ref()))
            .ok()
            .map(|i| &self.entries[i])
    }

    /// Insert or replace the stage-0 entry for a path.
    ///
    /// Also resolves any recorded conflict for that path.
    pub fn add(&mut self, entry: IndexEntry) {
        self.conflicts.remove(&entry.path);
        match self
            .entries
            .binary_search_by(|e| e.path.as_slice().cmp(entry.path.as_slice()))
        {
            Ok(i) => self.entries[i] = entry,
            Err(i) => self.entries.insert(i, entry),
        }
    }

    /// Remove a path (entry and any conflict). Returns whether anything
    /// was removed.
    pub fn remove(&mut self, path: &BStr) -> bool {
        let had_conflict = self.conflicts.remove(path).is_some();
        match self
            .entries
            .binary_search_by(|e| e.path.as_slice().cmp(path.as_ref()))
        {
            Ok(i) => {
                self.entries.remove(i);
                true
            }
            Err(_) => had_conflict,
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.conflicts.clear();
    }

    // ---- conflict stages ----------------------------------------------

    pub fn conflict(&self, path: &BStr) -> Option<&ConflictStages> {
        self.conflicts.get(path)
    }

    pub fn conflicts(&self) -> impl Iterator<Item = (&BString, &ConflictStages)> {
        self.conflicts.iter()
    }

    pub fn has_conflicts(&self) -> bool {
        !self.conflicts.is_empty()
    }

    pub fn conflict_paths(&self) -> Vec<BString> {
        self.conflicts.keys().cloned().collect()
    }

    /// Record stages 1/2/3 for a path, removing any stage-0 entry.
    pub fn set_conflict(&mut self, path: impl Into<BString>, stages: ConflictStages) {
        let path = path.into();
        if let Ok(i) = self
            .entries
            .binary_search_by(|e| e.path.as_slice().cmp(path.as_slice()))
        {
            self.entries.remove(i);
        }
        self.conflicts.insert(path, stages);
    }

    /// Drop the conflict record for a path (after resolution).
    pub fn clear_conflict(&mut self, path: &BStr) -> bool {
        self.conflicts.remove(path).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wit_object::FileMode;

    fn oid(n: u8) -> ObjectId {
        let mut bytes = [0u8; 20];
        bytes[0] = n;
        ObjectId::Sha1(bytes)
    }

    fn index() -> Index {
        Index::new("/nonexistent/index", HashAlgorithm::Sha1)
    }

    #[test]
    fn add_keeps_sorted_order() {
        let mut idx = index();
        idx.add(IndexEntry::new("zebra.txt", FileMode::Regular, oid(1)));
        idx.add(IndexEntry::new("alpha.txt", FileMode::Regular, oid(2)));
        idx.add(IndexEntry::new("middle.txt", FileMode::Regular, oid(3)));

        let paths: Vec<_> = idx.entries().iter().map(|e| e.path.clone()).collect();
        assert_eq!(paths, vec!["alpha.txt", "middle.txt", "zebra.txt"]);
    }

    #[test]
    fn add_replaces_same_path() {
        let mut idx = index();
        idx.add(IndexEntry::new("f.txt", FileMode::Regular, oid(1)));
        idx.add(IndexEntry::new("f.txt", FileMode::Executable, oid(2)));
        assert_eq!(idx.len(), 1);
        let entry = idx.get(BStr::new("f.txt")).unwrap();
        assert_eq!(entry.mode, FileMode::Executable);
        assert_eq!(entry.id, oid(2));
    }

    #[test]
    fn remove_and_clear() {
        let mut idx = index();
        idx.add(IndexEntry::new("a", FileMode::Regular, oid(1)));
        idx.add(IndexEntry::new("b", FileMode::Regular, oid(2)));
        assert!(idx.remove(BStr::new("a")));
        assert!(!idx.remove(BStr::new("a")));
        assert_eq!(idx.len(), 1);
        idx.clear();
        assert!(idx.is_empty());
    }

    #[test]
    fn conflict_lifecycle() {
        let mut idx = index();
        idx.add(IndexEntry::new("c.txt", FileMode::Regular, oid(1)));

        idx.set_conflict(
            "c.txt",
            ConflictStages {
                base: Some((FileMode::Regular, oid(1))),
                ours: Some((FileMode::Regular, oid(2))),
                theirs: Some((FileMode::Regular, oid(3))),
            },
        );
        // Conflict displaces the stage-0 entry.
        assert!(idx.get(BStr::new("c.txt")).is_none());
        assert!(idx.has_conflicts());
        assert_eq!(idx.conflict_paths(), vec![BString::from("c.txt")]);

        // A stage-0 add resolves it.
        idx.add(IndexEntry::new("c.txt", FileMode::Regular, oid(4)));
        assert!(!idx.has_conflicts());
        assert!(idx.get(BStr::new("c.txt")).is_some());
    }
}
