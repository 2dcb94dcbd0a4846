//! Branch merging: fast-forward, three-way, and the conflict state machine.

use std::collections::BTreeSet;

use bstr::{BString, ByteSlice};
use serde::{Deserialize, Serialize};
use wit_diff::{is_binary, merge3, FileConflict, MergeLabels, MergeResult};
use wit_hash::ObjectId;
use wit_index::{ConflictStages, Index, IndexEntry, StatCache};
use wit_object::{FileMode, ObjectType};
use wit_ref::RefName;
use wit_repository::tree::{commit_tree_map, write_tree_from_index, TreeMap};
use wit_repository::Repository;
use wit_revwalk::merge_base;

use crate::state::{self, MERGE_STATE};
use crate::OpsError;

/// Options for [`merge`].
#[derive(Debug, Default, Clone)]
pub struct MergeOptions {
    /// Create a merge commit even when a fast-forward would do.
    pub no_fast_forward: bool,
}

/// The persisted `MERGE_STATE` file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeState {
    pub source_branch: String,
    pub target_branch: String,
    pub source_commit: String,
    pub target_commit: String,
    pub base_commit: Option<String>,
    pub conflicts: Vec<String>,
    pub resolved: Vec<String>,
    pub started_at: i64,
}

impl MergeState {
    /// Conflicts not yet marked resolved.
    pub fn unresolved(&self) -> Vec<String> {
        self.conflicts
            .iter()
            .filter(|c| !self.resolved.contains(c))
            .cloned()
            .collect()
    }
}

/// How a merge concluded.
#[derive(Debug)]
pub enum MergeOutcome {
    /// The source is already reachable from HEAD.
    AlreadyUpToDate,
    /// HEAD was an ancestor of the source; the branch moved up.
    FastForward(ObjectId),
    /// A merge commit was created cleanly.
    Merged(ObjectId),
    /// Conflicts were written to the tree; resolution pending.
    Conflicted(Vec<FileConflict>),
}

/// Merge `source` into the current branch.
pub fn merge(
    repo: &Repository,
    source: &str,
    opts: &MergeOptions,
) -> Result<MergeOutcome, OpsError> {
    let meta_dir = repo.meta_dir().to_path_buf();
    if let Some(op) = state::any_active(&meta_dir) {
        return Err(OpsError::AlreadyInProgress(op));
    }
    let target_branch = repo
        .refs()
        .current_branch()?
        .ok_or(OpsError::DetachedHead)?;
    let head = repo.head_commit()?.ok_or(OpsError::NoCommitsYet)?;
    repo.ensure_clean()?;
    let before = repo.capture_state()?;

    let source_id = repo.peel_to_commit(repo.rev_parse(source)?)?;
    let base = merge_base(repo.objects(), &head, &source_id)?;

    if head == source_id || base == Some(source_id) {
        return Ok(MergeOutcome::AlreadyUpToDate);
    }

    if base == Some(head) && !opts.no_fast_forward {
        let current_map = commit_tree_map(repo.objects(), Some(&head))?;
        let target_map = commit_tree_map(repo.objects(), Some(&source_id))?;
        repo.refs()
            .update(&RefName::branch(&target_branch)?, source_id)?;
        repo.update_work_tree(&current_map, &target_map)?;
        repo.write_index_for_tree(&target_map)?;
        record(repo, source, &format!("fast-forward to {source}"), before)?;
        return Ok(MergeOutcome::FastForward(source_id));
    }

    three_way(repo, source, &target_branch, head, source_id, base, before)
}

#[allow(clippy::too_many_arguments)]
fn three_way(
    repo: &Repository,
    source: &str,
    target_branch: &str,
    head: ObjectId,
    source_id: ObjectId,
    base: Option<ObjectId>,
    before: wit_repository::RepoState,
) -> Result<MergeOutcome, OpsError> {
    let odb = repo.objects();
    let base_map = commit_tree_map(odb, base.as_ref())?;
    let ours_map = commit_tree_map(odb, Some(&head))?;
    let theirs_map = commit_tree_map(odb, Some(&source_id))?;

    let labels = MergeLabels {
        ours: "HEAD",
        theirs: source,
    };

    let mut paths: BTreeSet<BString> = BTreeSet::new();
    paths.extend(base_map.keys().cloned());
    paths.extend(ours_map.keys().cloned());
    paths.extend(theirs_map.keys().cloned());

    let mut result = TreeMap::new();
    let mut conflicts: Vec<FileConflict> = Vec::new();
    let mut stages: Vec<(BString, ConflictStages)> = Vec::new();
    // Conflicted file content to place in the work tree.
    let mut conflict_files: Vec<(BString, FileMode, Vec<u8>)> = Vec::new();

    for path in paths {
        let b = base_map.get(&path).copied();
        let o = ours_map.get(&path).copied();
        let t = theirs_map.get(&path).copied();

        // Trivial resolutions.
        if o == t {
            if let Some(entry) = o {
                result.insert(path, entry);
            }
            continue;
        }
        if b == o {
            if let Some(entry) = t {
                result.insert(path, entry);
            }
            continue;
        }
        if b == t {
            if let Some(entry) = o {
                result.insert(path, entry);
            }
            continue;
        }

        // Both sides changed the path in different ways.
        match (o, t) {
            (Some((ours_mode, ours_id)), Some((theirs_mode, theirs_id))) => {
                let base_content = match b {
                    Some((_, id)) => odb.read_blob(&id)?.data,
                    None => Vec::new(),
                };
                let ours_content = odb.read_blob(&ours_id)?.data;
                let theirs_content = odb.read_blob(&theirs_id)?.data;

                let text = !is_binary(&base_content)
                    && !is_binary(&ours_content)
                    && !is_binary(&theirs_content)
                    && !repo.is_large_file(ours_content.len().max(theirs_content.len()) as u64);

                let merged = if text {
                    merge3(&base_content, &ours_content, &theirs_content, &labels)
                } else {
                    MergeResult::Conflicted {
                        content: ours_content.clone(),
                        regions: Vec::new(),
                    }
                };

                match merged {
                    MergeResult::Clean(content) => {
                        let id = odb.write_raw(ObjectType::Blob, &content)?;
                        result.insert(path, (ours_mode, id));
                    }
                    MergeResult::Conflicted { content, regions } => {
                        stages.push((
                            path.clone(),
                            ConflictStages {
                                base: b,
                                ours: Some((ours_mode, ours_id)),
                                theirs: Some((theirs_mode, theirs_id)),
                            },
                        ));
                        conflict_files.push((path.clone(), ours_mode, content));
                        conflicts.push(FileConflict {
                            path,
                            ours_content,
                            theirs_content,
                            regions,
                        });
                    }
                }
            }
            // Modify on one side, delete on the other: keep the surviving
            // content in the tree, record the conflict.
            (one, other) => {
                let survivor = one.or(other).expect("one side present");
                let content = odb.read_blob(&survivor.1)?.data;
                stages.push((
                    path.clone(),
                    ConflictStages {
                        base: b,
                        ours: o,
                        theirs: t,
                    },
                ));
                conflict_files.push((path.clone(), survivor.0, content.clone()));
                conflicts.push(FileConflict {
                    path,
                    ours_content: if o.is_some() { content.clone() } else { Vec::new() },
                    theirs_content: if t.is_some() { content } else { Vec::new() },
                    regions: Vec::new(),
                });
            }
        }
    }

    if conflicts.is_empty() {
        let entries = entries_from_map(&result);
        let tree_id = write_tree_from_index(odb, &entries)?;
        let message = format!("Merge branch '{source}'");
        let id = repo.commit_tree(&message, None, tree_id, vec![head, source_id])?;
        repo.update_work_tree(&ours_map, &result)?;
        repo.write_index_for_tree(&result)?;
        record(repo, source, &message, before)?;
        return Ok(MergeOutcome::Merged(id));
    }

    // Conflicted: update the work tree and index, persist the state file.
    let conflict_paths: BTreeSet<BString> =
        stages.iter().map(|(path, _)| path.clone()).collect();
    for (path, entry) in &result {
        if ours_map.get(path) != Some(entry) {
            let blob = odb.read_blob(&entry.1)?;
            repo.write_work_file(path.as_bstr(), entry.0, &blob.data)?;
        }
    }
    for path in ours_map.keys() {
        if !result.contains_key(path) && !conflict_paths.contains(path) {
            repo.remove_work_file(path.as_bstr())?;
        }
    }
    for (path, mode, content) in &conflict_files {
        repo.write_work_file(path.as_bstr(), *mode, content)?;
    }

    let mut index = Index::new(repo.meta_dir().join("index"), repo.algorithm());
    for (path, (mode, id)) in &result {
        let stat = std::fs::symlink_metadata(repo.work_path(path.as_bstr()))
            .map(|meta| StatCache::from_metadata(&meta))
            .unwrap_or_default();
        index.add(IndexEntry::new(path.clone(), *mode, *id).with_stat(stat));
    }
    for (path, conflict_stages) in stages {
        index.set_conflict(path, conflict_stages);
    }
    index.save()?;

    let merge_state = MergeState {
        source_branch: source.to_string(),
        target_branch: target_branch.to_string(),
        source_commit: source_id.to_hex(),
        target_commit: head.to_hex(),
        base_commit: base.map(|id| id.to_hex()),
        conflicts: conflicts.iter().map(|c| c.path.to_string()).collect(),
        resolved: Vec::new(),
        started_at: wit_utils::WitDate::now().timestamp,
    };
    state::save(repo.meta_dir(), MERGE_STATE, &merge_state)?;

    Ok(MergeOutcome::Conflicted(conflicts))
}

/// Mark one conflicted path as resolved, staging its current content.
pub fn resolve(repo: &Repository, path: &str) -> Result<(), OpsError> {
    let mut merge_state: MergeState = state::load(repo.meta_dir(), MERGE_STATE)?
        .ok_or(OpsError::NoOperationInProgress)?;
    if !merge_state.conflicts.iter().any(|c| c == path) {
        return Err(OpsError::Repo(wit_repository::RepoError::FileNotFound(
            repo.work_path(bstr::BStr::new(path)),
        )));
    }

    repo.add(path)?;
    if !merge_state.resolved.iter().any(|r| r == path) {
        merge_state.resolved.push(path.to_string());
    }
    state::save(repo.meta_dir(), MERGE_STATE, &merge_state)?;
    Ok(())
}

/// Finish a conflicted merge once every conflict is resolved.
pub fn continue_merge(repo: &Repository) -> Result<MergeOutcome, OpsError> {
    let merge_state: MergeState = state::load(repo.meta_dir(), MERGE_STATE)?
        .ok_or(OpsError::NoOperationInProgress)?;

    let unresolved = merge_state.unresolved();
    if !unresolved.is_empty() {
        return Err(OpsError::UnresolvedConflicts(unresolved));
    }
    let index = repo.index()?;
    if index.has_conflicts() {
        return Err(OpsError::UnresolvedConflicts(
            index.conflict_paths().iter().map(|p| p.to_string()).collect(),
        ));
    }

    let head = ObjectId::from_hex(&merge_state.target_commit)
        .map_err(|e| OpsError::Repo(wit_repository::RepoError::Corrupt(e.to_string())))?;
    let source_id = ObjectId::from_hex(&merge_state.source_commit)
        .map_err(|e| OpsError::Repo(wit_repository::RepoError::Corrupt(e.to_string())))?;

    let before = repo.capture_state()?;
    let tree_id = write_tree_from_index(repo.objects(), index.entries())?;
    let message = format!("Merge branch '{}'", merge_state.source_branch);
    let id = repo.commit_tree(&message, None, tree_id, vec![head, source_id])?;

    state::clear(repo.meta_dir(), MERGE_STATE)?;
    record(repo, &merge_state.source_branch, &message, before)?;
    Ok(MergeOutcome::Merged(id))
}

/// Abandon a conflicted merge and restore the pre-merge state.
pub fn abort(repo: &Repository) -> Result<(), OpsError> {
    let merge_state: MergeState = state::load(repo.meta_dir(), MERGE_STATE)?
        .ok_or(OpsError::NoOperationInProgress)?;

    let head = ObjectId::from_hex(&merge_state.target_commit)
        .map_err(|e| OpsError::Repo(wit_repository::RepoError::Corrupt(e.to_string())))?;
    repo.reset_worktree_to(Some(head))?;
    state::clear(repo.meta_dir(), MERGE_STATE)?;
    Ok(())
}

/// The persisted merge state, if a merge is in progress.
pub fn get_state(repo: &Repository) -> Result<Option<MergeState>, OpsError> {
    state::load(repo.meta_dir(), MERGE_STATE)
}

/// Conflicts still awaiting resolution.
pub fn unresolved_conflicts(repo: &Repository) -> Result<Vec<String>, OpsError> {
    Ok(get_state(repo)?.map(|s| s.unresolved()).unwrap_or_default())
}

fn entries_from_map(map: &TreeMap) -> Vec<IndexEntry> {
    map.iter()
        .map(|(path, (mode, id))| IndexEntry::new(path.clone(), *mode, *id))
        .collect()
}

fn record(
    repo: &Repository,
    source: &str,
    description: &str,
    before: wit_repository::RepoState,
) -> Result<(), OpsError> {
    repo.record_operation(
        "merge",
        vec![source.to_string()],
        description.to_string(),
        before,
        None,
    )?;
    Ok(())
}
