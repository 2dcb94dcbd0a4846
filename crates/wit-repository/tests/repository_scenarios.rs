//! End-to-end scenarios over a real on-disk repository.

use bstr::BStr;
use wit_hash::ObjectId;
use wit_object::FileMode;
use wit_ref::RefName;
use wit_repository::{RepoError, Repository};

fn commit_file(repo: &Repository, path: &str, content: &[u8], msg: &str) -> ObjectId {
    repo.write_work_file(BStr::new(path), FileMode::Regular, content)
        .unwrap();
    repo.add(path).unwrap();
    repo.commit(msg, None).unwrap()
}

#[test]
fn init_and_first_commit() {
    let dir = tempfile::tempdir().unwrap();
    let repo = Repository::init(dir.path()).unwrap();

    repo.write_work_file(BStr::new("README.md"), FileMode::Regular, b"# Hi\n")
        .unwrap();
    repo.add("README.md").unwrap();
    let h = repo.commit("Init", None).unwrap();

    // HEAD and the branch resolve to the new commit.
    assert_eq!(repo.refs().resolve(&RefName::head()).unwrap(), Some(h));
    assert_eq!(
        repo.refs().resolve(&RefName::branch("main").unwrap()).unwrap(),
        Some(h)
    );

    let log = repo.log("HEAD", 10).unwrap();
    assert_eq!(log.len(), 1);

    let commit = repo.objects().read_commit(&h).unwrap();
    assert!(commit.parents.is_empty());
    let tree = repo.objects().read_tree(&commit.tree).unwrap();
    assert_eq!(tree.len(), 1);
    assert_eq!(tree.entries[0].mode, FileMode::Regular);
    assert_eq!(tree.entries[0].name, "README.md");
}

#[test]
fn empty_repository_boundaries() {
    let dir = tempfile::tempdir().unwrap();
    let repo = Repository::init(dir.path()).unwrap();

    assert!(repo.log("HEAD", 10).unwrap().is_empty());
    assert!(repo.log("main", 10).unwrap().is_empty());
    assert!(matches!(
        repo.create_branch("feature"),
        Err(RepoError::NoCommitsYet)
    ));

    repo.write_work_file(BStr::new("new.txt"), FileMode::Regular, b"x")
        .unwrap();
    let status = repo.status().unwrap();
    assert_eq!(status.untracked.len(), 1);
}

#[test]
fn commit_invariants_hold_along_a_branch() {
    let dir = tempfile::tempdir().unwrap();
    let repo = Repository::init(dir.path()).unwrap();
    commit_file(&repo, "a.txt", b"1\n", "one");
    commit_file(&repo, "b.txt", b"2\n", "two");
    let tip = commit_file(&repo, "a.txt", b"3\n", "three");

    // Every reachable commit's tree and parents are present.
    for (id, commit) in repo.log("HEAD", 100).unwrap() {
        assert!(repo.objects().has(&id));
        assert!(repo.objects().has(&commit.tree));
        for parent in &commit.parents {
            assert!(repo.objects().has(parent));
        }
    }
    assert_eq!(repo.head_commit().unwrap(), Some(tip));
}

#[test]
fn packed_refs_precedence() {
    let dir = tempfile::tempdir().unwrap();
    let repo = Repository::init(dir.path()).unwrap();
    let h1 = commit_file(&repo, "f.txt", b"1\n", "one");
    let h2 = commit_file(&repo, "f.txt", b"2\n", "two");

    // Plant a packed-refs entry pointing main at h2, while the loose ref
    // says h1.
    let main = RefName::branch("main").unwrap();
    repo.refs().update(&main, h1).unwrap();
    std::fs::write(
        repo.meta_dir().join("packed-refs"),
        format!(
            "# pack-refs with: peeled fully-peeled sorted\n{} refs/heads/main\n",
            h2.to_hex()
        ),
    )
    .unwrap();
    repo.refs().invalidate_cache();

    // Loose wins.
    assert_eq!(repo.refs().resolve(&main).unwrap(), Some(h1));

    // Deleting the loose file reveals the packed target.
    std::fs::remove_file(repo.meta_dir().join("refs/heads/main")).unwrap();
    repo.refs().invalidate_cache();
    assert_eq!(repo.refs().resolve(&main).unwrap(), Some(h2));
}

#[test]
fn pack_refs_preserves_listings() {
    let dir = tempfile::tempdir().unwrap();
    let repo = Repository::init(dir.path()).unwrap();
    commit_file(&repo, "f.txt", b"1\n", "one");
    repo.create_branch("feature").unwrap();
    repo.create_tag("v1", None).unwrap();
    repo.create_tag("v2", Some("annotated")).unwrap();

    let branches_before: Vec<String> =
        repo.list_branches().unwrap().into_iter().map(|b| b.name).collect();
    let tags_before = repo.list_tags().unwrap();

    let report = repo.refs().pack_refs(true).unwrap();
    assert!(report.packed >= 4);

    let branches_after: Vec<String> =
        repo.list_branches().unwrap().into_iter().map(|b| b.name).collect();
    assert_eq!(branches_before, branches_after);
    assert_eq!(tags_before, repo.list_tags().unwrap());
}

#[test]
fn short_hash_lookup_boundaries() {
    let dir = tempfile::tempdir().unwrap();
    let repo = Repository::init(dir.path()).unwrap();
    let h = commit_file(&repo, "f.txt", b"1\n", "one");

    assert!(matches!(
        repo.rev_parse(&h.to_hex()[..3]),
        Err(RepoError::RevisionNotFound(_))
    ));
    assert_eq!(repo.rev_parse(&h.to_hex()[..4]).unwrap(), h);
}

#[test]
fn object_write_read_roundtrip_through_repo() {
    let dir = tempfile::tempdir().unwrap();
    let repo = Repository::init(dir.path()).unwrap();
    let tip = commit_file(&repo, "dir/nested.txt", b"payload\n", "nested");

    // Re-read the tree and rebuild: byte-identical serialization.
    let commit = repo.objects().read_commit(&tip).unwrap();
    let tree = repo.objects().read_tree(&commit.tree).unwrap();
    let rewritten = repo
        .objects()
        .write(&wit_object::Object::Tree(tree))
        .unwrap();
    assert_eq!(rewritten, commit.tree);

    assert_eq!(
        repo.get_file_at_ref("HEAD", BStr::new("dir/nested.txt"))
            .unwrap(),
        Some(b"payload\n".to_vec())
    );
}

#[test]
fn detached_head_checkout_and_back() {
    let dir = tempfile::tempdir().unwrap();
    let repo = Repository::init(dir.path()).unwrap();
    let first = commit_file(&repo, "f.txt", b"1\n", "one");
    let second = commit_file(&repo, "f.txt", b"2\n", "two");

    repo.checkout(&first.to_hex(), false).unwrap();
    assert_eq!(repo.refs().current_branch().unwrap(), None);

    // Committing while detached advances HEAD only.
    repo.write_work_file(BStr::new("f.txt"), FileMode::Regular, b"detached\n")
        .unwrap();
    repo.add("f.txt").unwrap();
    let detached_commit = repo.commit("detached work", None).unwrap();
    assert_eq!(repo.head_commit().unwrap(), Some(detached_commit));
    assert_eq!(
        repo.refs().resolve(&RefName::branch("main").unwrap()).unwrap(),
        Some(second)
    );

    repo.checkout("main", false).unwrap();
    assert_eq!(repo.head_commit().unwrap(), Some(second));
}
