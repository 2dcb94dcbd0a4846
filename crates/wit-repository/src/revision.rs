//! Revision lookup: short names, full refs, hash prefixes.

use bstr::BStr;
use wit_hash::ObjectId;
use wit_object::Object;
use wit_odb::OdbError;

use crate::tree::entry_at_path;
use crate::{RepoError, Repository};

/// Tag chains longer than this are treated as corrupt.
const MAX_TAG_DEPTH: usize = 10;

impl Repository {
    /// Resolve a revision string to an object id.
    ///
    /// Order: exact ref name or `HEAD`, `refs/heads/<n>`, `refs/tags/<n>`,
    /// `refs/remotes/<n>`, then a hex hash prefix (≥ 4 characters).
    pub fn rev_parse(&self, refish: &str) -> Result<ObjectId, RepoError> {
        if let Some((_, id)) = self.refs().resolve_short(refish)? {
            return Ok(id);
        }

        match self.odb.resolve_prefix(refish) {
            Ok(id) => Ok(id),
            Err(OdbError::AmbiguousPrefix(p)) => Err(RepoError::Ambiguous(p)),
            Err(OdbError::PrefixNotFound(_)) | Err(OdbError::PrefixTooShort(_)) => {
                Err(RepoError::RevisionNotFound(refish.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Follow tag objects until a commit.
    pub fn peel_to_commit(&self, id: ObjectId) -> Result<ObjectId, RepoError> {
        let mut current = id;
        for _ in 0..MAX_TAG_DEPTH {
            match self.odb.read(&current)? {
                Object::Commit(_) => return Ok(current),
                Object::Tag(tag) => current = tag.target,
                other => {
                    return Err(RepoError::Corrupt(format!(
                        "{current} is a {}, expected a commit",
                        other.object_type()
                    )))
                }
            }
        }
        Err(RepoError::Corrupt(format!("tag chain too deep at {id}")))
    }

    /// Read a file's blob content as of a revision.
    pub fn get_file_at_ref(
        &self,
        refish: &str,
        path: &BStr,
    ) -> Result<Option<Vec<u8>>, RepoError> {
        let commit_id = self.peel_to_commit(self.rev_parse(refish)?)?;
        let commit = self.odb.read_commit(&commit_id)?;
        match entry_at_path(&self.odb, &commit.tree, path)? {
            None => Ok(None),
            Some((_, blob_id)) => Ok(Some(self.odb.read_blob(&blob_id)?.data)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wit_object::FileMode;

    fn repo_with_history() -> (tempfile::TempDir, Repository, ObjectId, ObjectId) {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        repo.write_work_file(BStr::new("f.txt"), FileMode::Regular, b"one\n")
            .unwrap();
        repo.add("f.txt").unwrap();
        let first = repo.commit("one", None).unwrap();
        repo.write_work_file(BStr::new("f.txt"), FileMode::Regular, b"two\n")
            .unwrap();
        repo.add("f.txt").unwrap();
        let second = repo.commit("two", None).unwrap();
        (dir, repo, first, second)
    }

    #[test]
    fn resolves_names_and_prefixes() {
        let (_dir, repo, first, second) = repo_with_history();

        assert_eq!(repo.rev_parse("HEAD").unwrap(), second);
        assert_eq!(repo.rev_parse("main").unwrap(), second);
        assert_eq!(repo.rev_parse("refs/heads/main").unwrap(), second);
        assert_eq!(repo.rev_parse(&first.to_hex()[..8]).unwrap(), first);
        assert_eq!(repo.rev_parse(&first.to_hex()).unwrap(), first);
    }

    #[test]
    fn short_prefix_boundaries() {
        let (_dir, repo, first, _) = repo_with_history();
        assert!(matches!(
            repo.rev_parse(&first.to_hex()[..3]),
            Err(RepoError::RevisionNotFound(_))
        ));
        assert_eq!(repo.rev_parse(&first.to_hex()[..4]).unwrap(), first);
    }

    #[test]
    fn branch_name_beats_hash_prefix() {
        let (_dir, repo, _, second) = repo_with_history();
        // A branch whose name is valid hex must resolve as a ref.
        repo.create_branch("beef").unwrap();
        assert_eq!(repo.rev_parse("beef").unwrap(), second);
    }

    #[test]
    fn file_at_ref_walks_history() {
        let (_dir, repo, first, _) = repo_with_history();
        assert_eq!(
            repo.get_file_at_ref("HEAD", BStr::new("f.txt")).unwrap(),
            Some(b"two\n".to_vec())
        );
        assert_eq!(
            repo.get_file_at_ref(&first.to_hex(), BStr::new("f.txt"))
                .unwrap(),
            Some(b"one\n".to_vec())
        );
        assert_eq!(
            repo.get_file_at_ref("HEAD", BStr::new("missing.txt")).unwrap(),
            None
        );
    }

    #[test]
    fn annotated_tag_peels_to_commit() {
        let (_dir, repo, _, second) = repo_with_history();
        repo.create_tag("v1", Some("release")).unwrap();
        let tag_id = repo.rev_parse("v1").unwrap();
        assert_ne!(tag_id, second);
        assert_eq!(repo.peel_to_commit(tag_id).unwrap(), second);
    }
}
