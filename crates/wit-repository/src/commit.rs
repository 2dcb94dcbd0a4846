//! Creating commits from the index.

use bstr::BString;
use serde_json::json;
use wit_hash::ObjectId;
use wit_object::{Commit, Object};
use wit_ref::Head;
use wit_utils::Signature;

use crate::tree::write_tree_from_index;
use crate::{RepoError, Repository};

impl Repository {
    /// Commit the staged snapshot.
    ///
    /// Builds the tree bottom-up from the index, parents it on HEAD (no
    /// parents for the first commit), and advances the current branch —
    /// or HEAD itself when detached.
    pub fn commit(&self, message: &str, author: Option<Signature>) -> Result<ObjectId, RepoError> {
        let index = self.index()?;
        if index.has_conflicts() {
            return Err(RepoError::UnresolvedConflicts(index.conflict_paths()));
        }

        let before = self.capture_state()?;
        let head = self.head_commit()?;

        let tree_id = write_tree_from_index(&self.odb, index.entries())?;
        match head {
            Some(parent) => {
                if self.odb.read_commit(&parent)?.tree == tree_id {
                    return Err(RepoError::NothingToCommit);
                }
            }
            None => {
                if index.is_empty() {
                    return Err(RepoError::NothingToCommit);
                }
            }
        }

        let parents: Vec<ObjectId> = head.into_iter().collect();
        let parent_hex = parents.first().map(|p| p.to_hex());
        let id = self.commit_tree(message, author, tree_id, parents)?;

        self.record_operation(
            "commit",
            vec![message.to_string()],
            format!("commit {}", id.short_hex(8)),
            before,
            Some(json!({
                "commit": id.to_hex(),
                "parent": parent_hex,
            })),
        )?;
        Ok(id)
    }

    /// Plumbing: write a commit object for `tree_id` with explicit parents
    /// and advance HEAD (branch or detached). Used by merge and rebase.
    pub fn commit_tree(
        &self,
        message: &str,
        author: Option<Signature>,
        tree_id: ObjectId,
        parents: Vec<ObjectId>,
    ) -> Result<ObjectId, RepoError> {
        let committer = self.default_signature();
        let author = author.unwrap_or_else(|| committer.clone());

        let mut message = BString::from(message);
        if !message.ends_with(b"\n") {
            message.push(b'\n');
        }

        let commit = Commit {
            tree: tree_id,
            parents,
            author,
            committer,
            message,
        };
        let id = self.odb.write(&Object::Commit(commit))?;

        match self.refs.head()? {
            Head::OnBranch(branch) => self.refs.update(&branch, id)?,
            Head::Detached(_) => self.refs.set_head_detached(id)?,
        }
        Ok(id)
    }
}
