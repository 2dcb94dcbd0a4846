//! Branch and tag management.

use bstr::BString;
use serde_json::json;
use wit_hash::ObjectId;
use wit_object::{Object, ObjectType, Tag};
use wit_ref::{RefError, RefName};

use crate::{RepoError, Repository};

/// One branch in a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchInfo {
    pub name: String,
    pub target: ObjectId,
    pub is_current: bool,
}

impl Repository {
    /// Create a branch at HEAD.
    pub fn create_branch(&self, name: &str) -> Result<ObjectId, RepoError> {
        let head = self.head_commit()?.ok_or(RepoError::NoCommitsYet)?;
        self.create_branch_at(name, head)?;
        Ok(head)
    }

    /// Create a branch at an explicit commit.
    pub fn create_branch_at(&self, name: &str, id: ObjectId) -> Result<(), RepoError> {
        let before = self.capture_state()?;
        let full = RefName::branch(name)?;
        match self.refs().create(&full, id) {
            Ok(()) => {}
            Err(RefError::AlreadyExists(_)) => {
                return Err(RepoError::BranchExists(name.to_string()))
            }
            Err(e) => return Err(e.into()),
        }
        self.record_operation(
            "branch-create",
            vec![name.to_string()],
            format!("create branch {name}"),
            before,
            Some(json!({ "branch": name, "commit": id.to_hex() })),
        )?;
        Ok(())
    }

    /// Delete a branch; the current branch is protected.
    pub fn delete_branch(&self, name: &str) -> Result<ObjectId, RepoError> {
        if self.refs().current_branch()?.as_deref() == Some(name) {
            return Err(RepoError::BranchInUse(name.to_string()));
        }
        let before = self.capture_state()?;
        let full = RefName::branch(name)?;
        let id = self
            .refs()
            .resolve(&full)?
            .ok_or_else(|| RepoError::BranchNotFound(name.to_string()))?;

        self.refs().delete(&full)?;
        self.record_operation(
            "branch-delete",
            vec![name.to_string()],
            format!("delete branch {name}"),
            before,
            Some(json!({ "branch": name, "commit": id.to_hex() })),
        )?;
        Ok(id)
    }

    /// All branches with their targets.
    pub fn list_branches(&self) -> Result<Vec<BranchInfo>, RepoError> {
        let current = self.refs().current_branch()?;
        let mut out = Vec::new();
        for name in self.refs().list_branches()? {
            let Some(target) = self.refs().resolve(&name)? else {
                continue;
            };
            let short = name.shorten().to_string();
            out.push(BranchInfo {
                is_current: current.as_deref() == Some(&short),
                name: short,
                target,
            });
        }
        Ok(out)
    }

    /// Create a tag at HEAD: lightweight, or annotated when a message is
    /// given (a tag object is written and the ref points at it).
    pub fn create_tag(&self, name: &str, message: Option<&str>) -> Result<ObjectId, RepoError> {
        let head = self.head_commit()?.ok_or(RepoError::NoCommitsYet)?;
        let full = RefName::tag(name)?;

        let target = match message {
            None => head,
            Some(message) => {
                let mut message = BString::from(message);
                if !message.ends_with(b"\n") {
                    message.push(b'\n');
                }
                let tag = Tag {
                    target: head,
                    target_type: ObjectType::Commit,
                    name: BString::from(name),
                    tagger: Some(self.default_signature()),
                    message,
                };
                self.objects().write(&Object::Tag(tag))?
            }
        };

        match self.refs().create(&full, target) {
            Ok(()) => Ok(target),
            Err(RefError::AlreadyExists(_)) => Err(RepoError::TagExists(name.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    pub fn delete_tag(&self, name: &str) -> Result<(), RepoError> {
        let full = RefName::tag(name)?;
        match self.refs().delete(&full) {
            Ok(()) => Ok(()),
            Err(RefError::NotFound(_)) => Err(RepoError::TagNotFound(name.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    pub fn list_tags(&self) -> Result<Vec<String>, RepoError> {
        Ok(self
            .refs()
            .list_tags()?
            .into_iter()
            .map(|n| n.shorten().to_string())
            .collect())
    }

    /// The commit a tag ultimately points at: the packed peeled value when
    /// recorded, else chased through tag objects.
    pub fn peeled_tag_target(&self, name: &str) -> Result<Option<ObjectId>, RepoError> {
        let full = RefName::tag(name)?;
        if let Some(peeled) = self.refs().get_peeled_ref(&full)? {
            return Ok(Some(peeled));
        }
        match self.refs().resolve(&full)? {
            None => Ok(None),
            Some(id) => Ok(Some(self.peel_to_commit(id)?)),
        }
    }
}
