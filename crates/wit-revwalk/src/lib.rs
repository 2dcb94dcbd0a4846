//! History traversal over the commit DAG.
//!
//! All walks use an explicit queue and a visited set — parents form a DAG by
//! construction, but nothing here would loop if they did not. Ordering is
//! committer-timestamp first, object id second, so equal inputs always
//! produce equal outputs.

mod merge_base;
mod walk;

pub use merge_base::{is_ancestor, merge_base};
pub use walk::{ancestors, commits_between, log};

use wit_hash::ObjectId;

/// Errors from history traversal.
#[derive(Debug, thiserror::Error)]
pub enum RevWalkError {
    #[error("{0} is not a commit")]
    NotACommit(ObjectId),

    #[error(transparent)]
    Odb(#[from] wit_odb::OdbError),
}

#[cfg(test)]
pub(crate) mod testutil {
    //! A tiny commit-graph builder over a throwaway object store.

    use bstr::BString;
    use wit_hash::{HashAlgorithm, ObjectId};
    use wit_object::{Commit, Object, Tree};
    use wit_odb::ObjectStore;
    use wit_utils::{Signature, WitDate};

    pub struct GraphBuilder {
        pub store: ObjectStore,
        _dir: tempfile::TempDir,
    }

    impl GraphBuilder {
        pub fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let objects = dir.path().join("objects");
            std::fs::create_dir_all(&objects).unwrap();
            Self {
                store: ObjectStore::open(&objects, HashAlgorithm::Sha1).unwrap(),
                _dir: dir,
            }
        }

        /// Create a commit with the given parents at the given timestamp.
        pub fn commit(&self, message: &str, parents: &[ObjectId], timestamp: i64) -> ObjectId {
            let tree = self.store.write(&Object::Tree(Tree::new())).unwrap();
            let sig = Signature::new("Test", "test@example.com", WitDate::new(timestamp, 0));
            let commit = Commit {
                tree,
                parents: parents.to_vec(),
                author: sig.clone(),
                committer: sig,
                message: BString::from(format!("{message}\n")),
            };
            self.store.write(&Object::Commit(commit)).unwrap()
        }

        /// A linear chain `c1..cN` at timestamps `1..N`.
        pub fn chain(&self, n: usize) -> Vec<ObjectId> {
            let mut ids = Vec::with_capacity(n);
            for i in 0..n {
                let parents: Vec<ObjectId> = ids.last().copied().into_iter().collect();
                ids.push(self.commit(&format!("c{}", i + 1), &parents, (i + 1) as i64));
            }
            ids
        }
    }
}
