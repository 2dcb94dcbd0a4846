//! Binary search over an ancestry range bracketed by good/bad marks.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use wit_hash::ObjectId;
use wit_repository::Repository;
use wit_revwalk::ancestors;

use crate::state::{self, BISECT_STATE};
use crate::OpsError;

/// The persisted `BISECT_STATE` file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BisectState {
    pub active: bool,
    /// Branch we started from, if any (else detached commit hex).
    pub original_branch: Option<String>,
    /// Commit HEAD pointed at when bisect started (hex).
    pub original_head: String,
    pub good: Vec<String>,
    pub bad: Vec<String>,
    pub skipped: Vec<String>,
    /// Commit currently checked out for testing (hex).
    pub current: Option<String>,
    /// Human-readable record of every mark.
    pub log: Vec<String>,
}

/// Where the search stands after a mark.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BisectStatus {
    /// Need at least one good and one bad mark.
    WaitingForMarks,
    /// A candidate is checked out for testing.
    Bisecting {
        current: ObjectId,
        remaining: usize,
        steps: usize,
    },
    /// The search converged.
    FirstBad(ObjectId),
}

/// Begin a bisect session.
pub fn start(repo: &Repository) -> Result<(), OpsError> {
    if let Some(op) = state::any_active(repo.meta_dir()) {
        return Err(OpsError::AlreadyInProgress(op));
    }
    let head = repo.head_commit()?.ok_or(OpsError::NoCommitsYet)?;

    let bisect_state = BisectState {
        active: true,
        original_branch: repo.refs().current_branch()?,
        original_head: head.to_hex(),
        good: Vec::new(),
        bad: Vec::new(),
        skipped: Vec::new(),
        current: None,
        log: vec!["bisect start".to_string()],
    };
    state::save(repo.meta_dir(), BISECT_STATE, &bisect_state)?;
    Ok(())
}

/// Mark a revision (default: the current commit) as good.
pub fn mark_good(repo: &Repository, rev: Option<&str>) -> Result<BisectStatus, OpsError> {
    mark(repo, rev, Mark::Good)
}

/// Mark a revision (default: the current commit) as bad.
pub fn mark_bad(repo: &Repository, rev: Option<&str>) -> Result<BisectStatus, OpsError> {
    mark(repo, rev, Mark::Bad)
}

/// Skip a revision that cannot be tested.
pub fn skip(repo: &Repository, rev: Option<&str>) -> Result<BisectStatus, OpsError> {
    mark(repo, rev, Mark::Skip)
}

enum Mark {
    Good,
    Bad,
    Skip,
}

fn mark(repo: &Repository, rev: Option<&str>, mark: Mark) -> Result<BisectStatus, OpsError> {
    let mut st: BisectState = state::load(repo.meta_dir(), BISECT_STATE)?
        .ok_or(OpsError::NoOperationInProgress)?;

    let id = match rev {
        Some(rev) => repo.peel_to_commit(repo.rev_parse(rev)?)?,
        None => match &st.current {
            Some(hex) => parse_id(hex)?,
            None => repo.head_commit()?.ok_or(OpsError::NoCommitsYet)?,
        },
    };
    let hex = id.to_hex();
    match mark {
        Mark::Good => {
            st.log.push(format!("bisect good {hex}"));
            push_unique(&mut st.good, hex);
        }
        Mark::Bad => {
            st.log.push(format!("bisect bad {hex}"));
            push_unique(&mut st.bad, hex);
        }
        Mark::Skip => {
            st.log.push(format!("bisect skip {hex}"));
            push_unique(&mut st.skipped, hex);
        }
    }

    advance(repo, &mut st)
}

/// The persisted bisect state, if a session is active.
pub fn get_state(repo: &Repository) -> Result<Option<BisectState>, OpsError> {
    state::load(repo.meta_dir(), BISECT_STATE)
}

/// Where the search currently stands.
pub fn status(repo: &Repository) -> Result<BisectStatus, OpsError> {
    let st: BisectState = state::load(repo.meta_dir(), BISECT_STATE)?
        .ok_or(OpsError::NoOperationInProgress)?;
    if st.good.is_empty() || st.bad.is_empty() {
        return Ok(BisectStatus::WaitingForMarks);
    }
    let candidates = candidate_set(repo, &st)?;
    match candidates.len() {
        0 => Err(OpsError::NothingToBisect),
        1 => Ok(BisectStatus::FirstBad(candidates[0])),
        n => {
            let current = st
                .current
                .as_deref()
                .map(parse_id)
                .transpose()?
                .unwrap_or(candidates[0]);
            Ok(BisectStatus::Bisecting {
                current,
                remaining: n,
                steps: estimate_steps(n),
            })
        }
    }
}

/// Commits still under suspicion.
pub fn remaining_count(repo: &Repository) -> Result<usize, OpsError> {
    let st: BisectState = state::load(repo.meta_dir(), BISECT_STATE)?
        .ok_or(OpsError::NoOperationInProgress)?;
    if st.good.is_empty() || st.bad.is_empty() {
        return Ok(0);
    }
    Ok(candidate_set(repo, &st)?.len())
}

/// `ceil(log2(n))` tests left, roughly.
pub fn estimate_steps(candidates: usize) -> usize {
    if candidates <= 1 {
        0
    } else {
        (usize::BITS - (candidates - 1).leading_zeros()) as usize
    }
}

/// End the session and restore the original HEAD.
pub fn reset(repo: &Repository) -> Result<(), OpsError> {
    let st: BisectState = state::load(repo.meta_dir(), BISECT_STATE)?
        .ok_or(OpsError::NoOperationInProgress)?;

    // Clear the state first so checkout is not blocked by the session.
    state::clear(repo.meta_dir(), BISECT_STATE)?;
    match &st.original_branch {
        Some(branch) => repo.checkout(branch, false)?,
        None => {
            let head = parse_id(&st.original_head)?;
            repo.checkout_detached(head)?;
        }
    }
    Ok(())
}

/// Pick and check out the next candidate, or report convergence.
fn advance(repo: &Repository, st: &mut BisectState) -> Result<BisectStatus, OpsError> {
    if st.good.is_empty() || st.bad.is_empty() {
        state::save(repo.meta_dir(), BISECT_STATE, st)?;
        return Ok(BisectStatus::WaitingForMarks);
    }

    let candidates = candidate_set(repo, st)?;
    match candidates.len() {
        0 => Err(OpsError::NothingToBisect),
        1 => {
            let first_bad = candidates[0];
            st.current = Some(first_bad.to_hex());
            st.log.push(format!("first bad commit is {first_bad}"));
            state::save(repo.meta_dir(), BISECT_STATE, st)?;
            repo.checkout_detached(first_bad)?;
            Ok(BisectStatus::FirstBad(first_bad))
        }
        n => {
            let pick = pick_candidate(repo, &candidates)?;
            st.current = Some(pick.to_hex());
            state::save(repo.meta_dir(), BISECT_STATE, st)?;
            repo.checkout_detached(pick)?;
            Ok(BisectStatus::Bisecting {
                current: pick,
                remaining: n,
                steps: estimate_steps(n),
            })
        }
    }
}

/// Suspects: ancestors of every bad commit, minus ancestors of any good
/// commit, minus skips. Sorted by timestamp then id for determinism.
fn candidate_set(repo: &Repository, st: &BisectState) -> Result<Vec<ObjectId>, OpsError> {
    let odb = repo.objects();

    let mut suspects: Option<HashSet<ObjectId>> = None;
    for hex in &st.bad {
        let set = ancestors(odb, &parse_id(hex)?)?;
        suspects = Some(match suspects {
            None => set,
            Some(prev) => prev.intersection(&set).copied().collect(),
        });
    }
    let mut suspects = suspects.unwrap_or_default();

    for hex in &st.good {
        for id in ancestors(odb, &parse_id(hex)?)? {
            suspects.remove(&id);
        }
    }
    for hex in &st.skipped {
        suspects.remove(&parse_id(hex)?);
    }

    let mut out: Vec<(i64, ObjectId)> = Vec::with_capacity(suspects.len());
    for id in suspects {
        let commit = odb.read_commit(&id)?;
        out.push((commit.timestamp(), id));
    }
    out.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
    Ok(out.into_iter().map(|(_, id)| id).collect())
}

/// The commit splitting the suspect set most evenly: minimize
/// `max(|reachable within set|, |rest|)`; earliest timestamp wins ties.
fn pick_candidate(
    repo: &Repository,
    candidates: &[ObjectId],
) -> Result<ObjectId, OpsError> {
    let odb = repo.objects();
    let candidate_set: HashSet<ObjectId> = candidates.iter().copied().collect();
    let total = candidates.len();

    let mut best: Option<(usize, ObjectId)> = None;
    // Candidates are timestamp-sorted, so the first strictly-better hit
    // is also the tie-break winner.
    for &id in candidates {
        let reachable = ancestors(odb, &id)?;
        let left = reachable.intersection(&candidate_set).count();
        let right = total - left;
        let worst = left.max(right);
        if best.is_none() || worst < best.expect("checked").0 {
            best = Some((worst, id));
        }
    }
    Ok(best.expect("nonempty candidate set").1)
}

fn push_unique(list: &mut Vec<String>, value: String) {
    if !list.contains(&value) {
        list.push(value);
    }
}

fn parse_id(hex: &str) -> Result<ObjectId, OpsError> {
    ObjectId::from_hex(hex)
        .map_err(|e| OpsError::Repo(wit_repository::RepoError::Corrupt(e.to_string())))
}
