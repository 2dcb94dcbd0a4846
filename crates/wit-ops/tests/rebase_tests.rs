//! Rebase scenarios: replay, conflict pause, continue/skip/abort.

use bstr::BStr;
use wit_hash::ObjectId;
use wit_object::FileMode;
use wit_ops::{rebase, OpsError, RebaseOutcome};
use wit_ref::RefName;
use wit_repository::Repository;

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
fn rebase_two_commits_onto_main() {
    let (_dir, repo) = repo();
    let c0 = commit_file(&repo, "base.txt", b"base\n", "c0");

    // feature branches from c0 with two commits.
    repo.checkout("feature", true).unwrap();
    commit_file(&repo, "f1.txt", b"one\n", "feature one");
    commit_file(&repo, "f2.txt", b"two\n", "feature two");

    // main moves ahead with m.txt.
    repo.checkout("main", false).unwrap();
    let cm = commit_file(&repo, "m.txt", b"m\n", "main work");

    repo.checkout("feature", false).unwrap();
    let outcome = rebase::rebase(&repo, "main").unwrap();
    let RebaseOutcome::Completed { new_tip, applied } = outcome else {
        panic!("expected completion");
    };
    assert_eq!(applied, 2);

    // New commits chain back to main's tip; messages and authors survive.
    let log = repo.log("HEAD", 10).unwrap();
    let messages: Vec<String> = log
        .iter()
        .map(|(_, c)| c.summary().to_string())
        .collect();
    assert_eq!(
        messages,
        vec!["feature two", "feature one", "main work", "c0"]
    );
    assert_eq!(log[0].0, new_tip);
    assert_eq!(log[1].1.parents, vec![cm]);

    // The rebased commits are new objects.
    assert_ne!(log[0].0, c0);

    // Work tree has everything.
    for (path, content) in [("m.txt", "m\n"), ("f1.txt", "one\n"), ("f2.txt", "two\n")] {
        assert_eq!(
            repo.read_work_file(BStr::new(path)).unwrap(),
            content.as_bytes()
        );
    }

    // Branch moved, HEAD re-attached, state cleared.
    assert_eq!(
        repo.refs()
            .resolve(&RefName::branch("feature").unwrap())
            .unwrap(),
        Some(new_tip)
    );
    assert_eq!(repo.refs().current_branch().unwrap(), Some("feature".into()));
    assert!(rebase::get_state(&repo).unwrap().is_none());
    assert!(repo.status().unwrap().is_clean());
}

#[test]
fn rebase_with_no_own_commits_fast_forwards() {
    let (_dir, repo) = repo();
    commit_file(&repo, "base.txt", b"base\n", "c0");
    repo.checkout("feature", true).unwrap();
    repo.checkout("main", false).unwrap();
    let cm = commit_file(&repo, "m.txt", b"m\n", "ahead");

    repo.checkout("feature", false).unwrap();
    let RebaseOutcome::Completed { new_tip, applied } =
        rebase::rebase(&repo, "main").unwrap()
    else {
        panic!("expected completion");
    };
    assert_eq!(applied, 0);
    assert_eq!(new_tip, cm);
    assert_eq!(
        repo.refs()
            .resolve(&RefName::branch("feature").unwrap())
            .unwrap(),
        Some(cm)
    );
}

#[test]
fn conflicting_rebase_pauses_then_continues() {
    let (_dir, repo) = repo();
    commit_file(&repo, "shared.txt", b"original\n", "base");

    repo.checkout("feature", true).unwrap();
    commit_file(&repo, "shared.txt", b"feature version\n", "feature edit");

    repo.checkout("main", false).unwrap();
    commit_file(&repo, "shared.txt", b"main version\n", "main edit");

    repo.checkout("feature", false).unwrap();
    let outcome = rebase::rebase(&repo, "main").unwrap();
    let RebaseOutcome::Paused { conflicts } = outcome else {
        panic!("expected pause");
    };
    assert_eq!(conflicts, vec!["shared.txt".to_string()]);

    // Paused state survives on disk; markers in the work tree.
    let state = rebase::get_state(&repo).unwrap().unwrap();
    assert_eq!(state.position, 0);
    assert_eq!(state.conflicts, conflicts);
    let text = String::from_utf8_lossy(
        &repo.read_work_file(BStr::new("shared.txt")).unwrap(),
    )
    .to_string();
    assert!(text.contains("<<<<<<< HEAD"));

    // Continue without resolving: refused.
    assert!(matches!(
        rebase::continue_rebase(&repo),
        Err(OpsError::UnresolvedConflicts(_))
    ));

    // Resolve by staging, then continue.
    repo.write_work_file(
        BStr::new("shared.txt"),
        FileMode::Regular,
        b"merged version\n",
    )
    .unwrap();
    repo.add("shared.txt").unwrap();

    let RebaseOutcome::Completed { new_tip, .. } = rebase::continue_rebase(&repo).unwrap()
    else {
        panic!("expected completion");
    };
    let tip_commit = repo.objects().read_commit(&new_tip).unwrap();
    assert_eq!(tip_commit.summary(), "feature edit");
    assert_eq!(
        repo.read_work_file(BStr::new("shared.txt")).unwrap(),
        b"merged version\n"
    );
    assert!(rebase::get_state(&repo).unwrap().is_none());
    assert_eq!(repo.refs().current_branch().unwrap(), Some("feature".into()));
}

#[test]
fn skip_drops_the_conflicting_commit() {
    let (_dir, repo) = repo();
    commit_file(&repo, "shared.txt", b"original\n", "base");

    repo.checkout("feature", true).unwrap();
    commit_file(&repo, "shared.txt", b"feature version\n", "conflicting");
    commit_file(&repo, "extra.txt", b"extra\n", "non-conflicting");

    repo.checkout("main", false).unwrap();
    let cm = commit_file(&repo, "shared.txt", b"main version\n", "main edit");

    repo.checkout("feature", false).unwrap();
    let RebaseOutcome::Paused { .. } = rebase::rebase(&repo, "main").unwrap() else {
        panic!("expected pause");
    };

    let RebaseOutcome::Completed { new_tip, .. } = rebase::skip(&repo).unwrap() else {
        panic!("expected completion after skip");
    };

    // Only the non-conflicting commit was replayed.
    let tip_commit = repo.objects().read_commit(&new_tip).unwrap();
    assert_eq!(tip_commit.summary(), "non-conflicting");
    assert_eq!(tip_commit.parents, vec![cm]);
    assert_eq!(
        repo.read_work_file(BStr::new("shared.txt")).unwrap(),
        b"main version\n"
    );
    assert_eq!(
        repo.read_work_file(BStr::new("extra.txt")).unwrap(),
        b"extra\n"
    );
}

#[test]
fn abort_restores_original_branch() {
    let (_dir, repo) = repo();
    commit_file(&repo, "shared.txt", b"original\n", "base");

    repo.checkout("feature", true).unwrap();
    let original_tip = commit_file(&repo, "shared.txt", b"feature version\n", "feature edit");

    repo.checkout("main", false).unwrap();
    commit_file(&repo, "shared.txt", b"main version\n", "main edit");

    repo.checkout("feature", false).unwrap();
    let RebaseOutcome::Paused { .. } = rebase::rebase(&repo, "main").unwrap() else {
        panic!("expected pause");
    };

    rebase::abort(&repo).unwrap();
    assert_eq!(repo.head_commit().unwrap(), Some(original_tip));
    assert_eq!(repo.refs().current_branch().unwrap(), Some("feature".into()));
    assert_eq!(
        repo.read_work_file(BStr::new("shared.txt")).unwrap(),
        b"feature version\n"
    );
    assert!(rebase::get_state(&repo).unwrap().is_none());
    assert!(repo.status().unwrap().is_clean());
}

#[test]
fn rebase_refuses_dirty_tree_and_detached_head() {
    let (_dir, repo) = repo();
    let first = commit_file(&repo, "f.txt", b"1\n", "one");
    commit_file(&repo, "f.txt", b"2\n", "two");

    repo.write_work_file(BStr::new("f.txt"), FileMode::Regular, b"dirty\n")
        .unwrap();
    assert!(matches!(
        rebase::rebase(&repo, "main"),
        Err(OpsError::Repo(
            wit_repository::RepoError::UncommittedChanges(_)
        ))
    ));
    // Clean up and detach.
    repo.write_work_file(BStr::new("f.txt"), FileMode::Regular, b"2\n")
        .unwrap();
    repo.checkout(&first.to_hex(), false).unwrap();
    assert!(matches!(
        rebase::rebase(&repo, "main"),
        Err(OpsError::DetachedHead)
    ));
}
