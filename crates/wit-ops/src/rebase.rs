//! Replaying commits onto a new base, pausing on conflicts.

use bstr::{BString, ByteSlice};
use serde::{Deserialize, Serialize};
use wit_diff::{merge3, MergeLabels, MergeResult};
use wit_hash::ObjectId;
use wit_index::{ConflictStages, Index, IndexEntry, StatCache};
use wit_object::ObjectType;
use wit_ref::RefName;
use wit_repository::tree::{commit_tree_map, write_tree_from_index, TreeMap};
use wit_repository::Repository;

use crate::state::{self, REBASE_STATE};
use crate::OpsError;

/// The persisted `REBASE_STATE` file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RebaseState {
    /// Branch being rebased (short name).
    pub branch: String,
    /// Commit being rebased onto (hex).
    pub onto: String,
    /// Tip of the branch before the rebase started (hex).
    pub original_head: String,
    /// Commits to replay, oldest first (hex).
    pub commits: Vec<String>,
    /// Index of the next commit to apply.
    pub position: usize,
    /// Conflicted paths of the current pause.
    pub conflicts: Vec<String>,
}

/// How a rebase (or one resumption of it) concluded.
#[derive(Debug)]
pub enum RebaseOutcome {
    /// Every commit replayed; the branch points at the new tip.
    Completed { new_tip: ObjectId, applied: usize },
    /// A commit hit conflicts; resolve and continue, skip, or abort.
    Paused { conflicts: Vec<String> },
}

enum ApplyResult {
    Applied,
    /// The commit's changes are already present on the new base.
    NothingToApply,
    Conflicted(Vec<String>),
}

/// Rebase the current branch onto another revision.
pub fn rebase(repo: &Repository, onto: &str) -> Result<RebaseOutcome, OpsError> {
    if let Some(op) = state::any_active(repo.meta_dir()) {
        return Err(OpsError::AlreadyInProgress(op));
    }
    let branch = repo
        .refs()
        .current_branch()?
        .ok_or(OpsError::DetachedHead)?;
    let head = repo.head_commit()?.ok_or(OpsError::NoCommitsYet)?;
    repo.ensure_clean()?;

    let onto_id = repo.peel_to_commit(repo.rev_parse(onto)?)?;
    let commits = wit_revwalk::commits_between(repo.objects(), &onto_id, &head)?;

    if commits.is_empty() {
        // Nothing of ours to replay; at most a fast-forward.
        if head != onto_id {
            let current_map = commit_tree_map(repo.objects(), Some(&head))?;
            let target_map = commit_tree_map(repo.objects(), Some(&onto_id))?;
            repo.refs().update(&RefName::branch(&branch)?, onto_id)?;
            repo.update_work_tree(&current_map, &target_map)?;
            repo.write_index_for_tree(&target_map)?;
        }
        return Ok(RebaseOutcome::Completed {
            new_tip: onto_id,
            applied: 0,
        });
    }

    repo.checkout_detached(onto_id)?;

    let rebase_state = RebaseState {
        branch,
        onto: onto_id.to_hex(),
        original_head: head.to_hex(),
        commits: commits.iter().map(|id| id.to_hex()).collect(),
        position: 0,
        conflicts: Vec::new(),
    };
    state::save(repo.meta_dir(), REBASE_STATE, &rebase_state)?;

    run(repo, rebase_state)
}

/// Resume after resolving conflicts: commit the staged resolution as the
/// replayed commit, then keep applying.
pub fn continue_rebase(repo: &Repository) -> Result<RebaseOutcome, OpsError> {
    let mut rebase_state: RebaseState = state::load(repo.meta_dir(), REBASE_STATE)?
        .ok_or(OpsError::NoOperationInProgress)?;

    let index = repo.index()?;
    if index.has_conflicts() {
        return Err(OpsError::UnresolvedConflicts(
            index.conflict_paths().iter().map(|p| p.to_string()).collect(),
        ));
    }

    let original = current_commit(&rebase_state)?;
    let commit = repo.objects().read_commit(&original)?;
    let head = repo.head_commit()?.ok_or(OpsError::NoCommitsYet)?;

    let tree_id = write_tree_from_index(repo.objects(), index.entries())?;
    // An all-ours resolution can produce the identical tree; skip then.
    if repo.objects().read_commit(&head)?.tree != tree_id {
        repo.commit_tree(
            &commit.message.to_str_lossy(),
            Some(commit.author.clone()),
            tree_id,
            vec![head],
        )?;
    }

    rebase_state.position += 1;
    rebase_state.conflicts.clear();
    state::save(repo.meta_dir(), REBASE_STATE, &rebase_state)?;
    run(repo, rebase_state)
}

/// Drop the conflicted commit and keep applying the rest.
pub fn skip(repo: &Repository) -> Result<RebaseOutcome, OpsError> {
    let mut rebase_state: RebaseState = state::load(repo.meta_dir(), REBASE_STATE)?
        .ok_or(OpsError::NoOperationInProgress)?;

    let head = repo.head_commit()?.ok_or(OpsError::NoCommitsYet)?;
    repo.reset_worktree_to(Some(head))?;

    rebase_state.position += 1;
    rebase_state.conflicts.clear();
    state::save(repo.meta_dir(), REBASE_STATE, &rebase_state)?;
    run(repo, rebase_state)
}

/// Abandon the rebase and restore the original branch tip.
pub fn abort(repo: &Repository) -> Result<(), OpsError> {
    let rebase_state: RebaseState = state::load(repo.meta_dir(), REBASE_STATE)?
        .ok_or(OpsError::NoOperationInProgress)?;

    let original = parse_id(&rebase_state.original_head)?;
    repo.refs()
        .set_head_symbolic(&RefName::branch(&rebase_state.branch)?)?;
    repo.reset_worktree_to(Some(original))?;
    state::clear(repo.meta_dir(), REBASE_STATE)?;
    Ok(())
}

/// The persisted rebase state, if a rebase is in progress.
pub fn get_state(repo: &Repository) -> Result<Option<RebaseState>, OpsError> {
    state::load(repo.meta_dir(), REBASE_STATE)
}

fn run(repo: &Repository, mut st: RebaseState) -> Result<RebaseOutcome, OpsError> {
    while st.position < st.commits.len() {
        let c = parse_id(&st.commits[st.position])?;
        match apply_commit(repo, c)? {
            ApplyResult::Applied | ApplyResult::NothingToApply => {
                st.position += 1;
                state::save(repo.meta_dir(), REBASE_STATE, &st)?;
            }
            ApplyResult::Conflicted(conflicts) => {
                st.conflicts = conflicts.clone();
                state::save(repo.meta_dir(), REBASE_STATE, &st)?;
                return Ok(RebaseOutcome::Paused { conflicts });
            }
        }
    }
    finish(repo, st)
}

fn finish(repo: &Repository, st: RebaseState) -> Result<RebaseOutcome, OpsError> {
    let before = repo.capture_state()?;
    let new_tip = repo.head_commit()?.ok_or(OpsError::NoCommitsYet)?;
    let branch = RefName::branch(&st.branch)?;
    repo.refs().update(&branch, new_tip)?;
    repo.refs().set_head_symbolic(&branch)?;
    state::clear(repo.meta_dir(), REBASE_STATE)?;

    repo.record_operation(
        "rebase",
        vec![st.onto.clone()],
        format!("rebase {} onto {}", st.branch, &st.onto[..8]),
        before,
        None,
    )?;
    Ok(RebaseOutcome::Completed {
        new_tip,
        applied: st.commits.len(),
    })
}

/// Replay one commit's changes onto the current (detached) HEAD.
fn apply_commit(repo: &Repository, c: ObjectId) -> Result<ApplyResult, OpsError> {
    let odb = repo.objects();
    let commit = odb.read_commit(&c)?;

    let parent_map = commit_tree_map(odb, commit.first_parent())?;
    let new_map = commit_tree_map(odb, Some(&c))?;
    let head = repo.head_commit()?.ok_or(OpsError::NoCommitsYet)?;
    let head_map = commit_tree_map(odb, Some(&head))?;

    let label = commit.summary().to_str_lossy().into_owned();
    let labels = MergeLabels {
        ours: "HEAD",
        theirs: &label,
    };

    let mut result = head_map.clone();
    let mut stages: Vec<(BString, ConflictStages)> = Vec::new();
    let mut conflict_files: Vec<(BString, wit_object::FileMode, Vec<u8>)> = Vec::new();

    let mut changed: Vec<BString> = Vec::new();
    for path in parent_map.keys().chain(new_map.keys()) {
        if parent_map.get(path) != new_map.get(path) && !changed.contains(path) {
            changed.push(path.clone());
        }
    }

    for path in changed {
        let old = parent_map.get(&path).copied();
        let new = new_map.get(&path).copied();
        let cur = head_map.get(&path).copied();

        match (old, new) {
            // Added by the commit.
            (None, Some(new_entry)) => match cur {
                None => {
                    result.insert(path, new_entry);
                }
                Some(cur_entry) if cur_entry == new_entry => {}
                Some(cur_entry) => {
                    let content = odb.read_blob(&new_entry.1)?.data;
                    stages.push((
                        path.clone(),
                        ConflictStages {
                            base: None,
                            ours: Some(cur_entry),
                            theirs: Some(new_entry),
                        },
                    ));
                    let cur_content = odb.read_blob(&cur_entry.1)?.data;
                    let markered =
                        match merge3(&[], &cur_content, &content, &labels) {
                            MergeResult::Conflicted { content, .. } => content,
                            MergeResult::Clean(content) => content,
                        };
                    conflict_files.push((path, cur_entry.0, markered));
                }
            },
            // Modified by the commit.
            (Some(old_entry), Some(new_entry)) => match cur {
                Some(cur_entry) if cur_entry == old_entry => {
                    result.insert(path, new_entry);
                }
                Some(cur_entry) if cur_entry == new_entry => {}
                None => {
                    // Deleted on the new base but modified by the commit.
                    let content = odb.read_blob(&new_entry.1)?.data;
                    stages.push((
                        path.clone(),
                        ConflictStages {
                            base: Some(old_entry),
                            ours: None,
                            theirs: Some(new_entry),
                        },
                    ));
                    conflict_files.push((path, new_entry.0, content));
                }
                Some(cur_entry) => {
                    let base_content = odb.read_blob(&old_entry.1)?.data;
                    let ours_content = odb.read_blob(&cur_entry.1)?.data;
                    let theirs_content = odb.read_blob(&new_entry.1)?.data;
                    match merge3(&base_content, &ours_content, &theirs_content, &labels) {
                        MergeResult::Clean(content) => {
                            let id = odb.write_raw(ObjectType::Blob, &content)?;
                            result.insert(path, (cur_entry.0, id));
                        }
                        MergeResult::Conflicted { content, .. } => {
                            stages.push((
                                path.clone(),
                                ConflictStages {
                                    base: Some(old_entry),
                                    ours: Some(cur_entry),
                                    theirs: Some(new_entry),
                                },
                            ));
                            conflict_files.push((path, cur_entry.0, content));
                        }
                    }
                }
            },
            // Deleted by the commit.
            (Some(old_entry), None) => match cur {
                Some(cur_entry) if cur_entry == old_entry => {
                    result.remove(&path);
                }
                None => {}
                Some(cur_entry) => {
                    let content = odb.read_blob(&cur_entry.1)?.data;
                    stages.push((
                        path.clone(),
                        ConflictStages {
                            base: Some(old_entry),
                            ours: Some(cur_entry),
                            theirs: None,
                        },
                    ));
                    conflict_files.push((path, cur_entry.0, content));
                }
            },
            (None, None) => unreachable!("path listed as changed"),
        }
    }

    if stages.is_empty() {
        if result == head_map {
            return Ok(ApplyResult::NothingToApply);
        }
        let entries: Vec<IndexEntry> = result
            .iter()
            .map(|(path, (mode, id))| IndexEntry::new(path.clone(), *mode, *id))
            .collect();
        let tree_id = write_tree_from_index(odb, &entries)?;
        repo.update_work_tree(&head_map, &result)?;
        repo.write_index_for_tree(&result)?;
        repo.commit_tree(
            &commit.message.to_str_lossy(),
            Some(commit.author.clone()),
            tree_id,
            vec![head],
        )?;
        return Ok(ApplyResult::Applied);
    }

    // Conflicts: land the clean part, marker files, and index stages.
    apply_conflicted_state(repo, &head_map, &result, &stages, &conflict_files)?;
    Ok(ApplyResult::Conflicted(
        stages.iter().map(|(path, _)| path.to_string()).collect(),
    ))
}

fn apply_conflicted_state(
    repo: &Repository,
    head_map: &TreeMap,
    result: &TreeMap,
    stages: &[(BString, ConflictStages)],
    conflict_files: &[(BString, wit_object::FileMode, Vec<u8>)],
) -> Result<(), OpsError> {
    let odb = repo.objects();
    for (path, entry) in result {
        if head_map.get(path) != Some(entry) {
            let blob = odb.read_blob(&entry.1)?;
            repo.write_work_file(path.as_bstr(), entry.0, &blob.data)?;
        }
    }
    let conflicted: Vec<&BString> = stages.iter().map(|(path, _)| path).collect();
    for path in head_map.keys() {
        if !result.contains_key(path) && !conflicted.iter().any(|p| *p == path) {
            repo.remove_work_file(path.as_bstr())?;
        }
    }
    for (path, mode, content) in conflict_files {
        repo.write_work_file(path.as_bstr(), *mode, content)?;
    }

    let mut index = Index::new(repo.meta_dir().join("index"), repo.algorithm());
    for (path, (mode, id)) in result {
        let stat = std::fs::symlink_metadata(repo.work_path(path.as_bstr()))
            .map(|meta| StatCache::from_metadata(&meta))
            .unwrap_or_default();
        index.add(IndexEntry::new(path.clone(), *mode, *id).with_stat(stat));
    }
    for (path, conflict_stages) in stages {
        index.set_conflict(path.clone(), conflict_stages.clone());
    }
    index.save()?;
    Ok(())
}

fn current_commit(st: &RebaseState) -> Result<ObjectId, OpsError> {
    parse_id(&st.commits[st.position])
}

fn parse_id(hex: &str) -> Result<ObjectId, OpsError> {
    ObjectId::from_hex(hex)
        .map_err(|e| OpsError::Repo(wit_repository::RepoError::Corrupt(e.to_string())))
}
