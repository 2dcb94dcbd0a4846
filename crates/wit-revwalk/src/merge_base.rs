//! Common-ancestor computation.

use std::collections::{BinaryHeap, HashSet};

use wit_hash::ObjectId;
use wit_odb::ObjectStore;

use crate::walk::ancestors;
use crate::RevWalkError;

/// Find the best merge base of `a` and `b`.
///
/// Collects the ancestor set of `a`, then walks `b`'s history newest-first
/// and returns the first commit found in the set. With several minimal
/// common ancestors (criss-cross histories), the newest-first walk makes
/// the highest committer timestamp win, ids breaking exact ties — the
/// result is symmetric and deterministic.
pub fn merge_base(
    store: &ObjectStore,
    a: &ObjectId,
    b: &ObjectId,
) -> Result<Option<ObjectId>, RevWalkError> {
    if a == b {
        return Ok(Some(*a));
    }

    let reachable_from_a = ancestors(store, a)?;
    if reachable_from_a.contains(b) {
        return Ok(Some(*b));
    }

    // Newest-first walk of b's history.
    let mut heap: BinaryHeap<(i64, ObjectId)> = BinaryHeap::new();
    let mut seen: HashSet<ObjectId> = HashSet::new();

    let start = store.read_commit(b).map_err(wrap_not_commit)?;
    heap.push((start.timestamp(), *b));
    seen.insert(*b);

    while let Some((_, id)) = heap.pop() {
        if reachable_from_a.contains(&id) {
            return Ok(Some(id));
        }
        let commit = store.read_commit(&id).map_err(wrap_not_commit)?;
        for parent in &commit.parents {
            if seen.insert(*parent) {
                let parent_commit = store.read_commit(parent).map_err(wrap_not_commit)?;
                heap.push((parent_commit.timestamp(), *parent));
            }
        }
    }

    Ok(None)
}

/// Is `ancestor` an ancestor of (or equal to) `descendant`?
pub fn is_ancestor(
    store: &ObjectStore,
    ancestor: &ObjectId,
    descendant: &ObjectId,
) -> Result<bool, RevWalkError> {
    if ancestor == descendant {
        return Ok(true);
    }
    Ok(ancestors(store, descendant)?.contains(ancestor))
}

fn wrap_not_commit(e: wit_odb::OdbError) -> RevWalkError {
    match e {
        wit_odb::OdbError::WrongType { id, .. } => RevWalkError::NotACommit(id),
        other => RevWalkError::Odb(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::GraphBuilder;

    #[test]
    fn base_of_self_is_self() {
        let g = GraphBuilder::new();
        let chain = g.chain(2);
        assert_eq!(
            merge_base(&g.store, &chain[1], &chain[1]).unwrap(),
            Some(chain[1])
        );
    }

    #[test]
    fn base_of_linear_history_is_older_commit() {
        let g = GraphBuilder::new();
        let chain = g.chain(3);
        assert_eq!(
            merge_base(&g.store, &chain[0], &chain[2]).unwrap(),
            Some(chain[0])
        );
        assert_eq!(
            merge_base(&g.store, &chain[2], &chain[0]).unwrap(),
            Some(chain[0])
        );
    }

    #[test]
    fn base_of_diverged_branches_is_fork_point() {
        let g = GraphBuilder::new();
        let root = g.commit("root", &[], 1);
        let fork = g.commit("fork", &[root], 2);
        let left = g.commit("left", &[fork], 3);
        let right = g.commit("right", &[fork], 4);

        assert_eq!(merge_base(&g.store, &left, &right).unwrap(), Some(fork));
        assert_eq!(merge_base(&g.store, &right, &left).unwrap(), Some(fork));
    }

    #[test]
    fn unrelated_histories_have_no_base() {
        let g = GraphBuilder::new();
        let a = g.commit("a", &[], 1);
        let b = g.commit("b", &[], 2);
        assert_eq!(merge_base(&g.store, &a, &b).unwrap(), None);
    }

    #[test]
    fn criss_cross_picks_newest_base_symmetrically() {
        // root ── x1 ── m1 ── tip_a
        //    \  ╳      /
        //     ─ x2 ── m2 ── tip_b
        // m1 has parents (x1, x2); m2 has parents (x2, x1).
        // Both x1 and x2 are minimal common ancestors of tip_a/tip_b.
        let g = GraphBuilder::new();
        let root = g.commit("root", &[], 1);
        let x1 = g.commit("x1", &[root], 2);
        let x2 = g.commit("x2", &[root], 3);
        let m1 = g.commit("m1", &[x1, x2], 4);
        let m2 = g.commit("m2", &[x2, x1], 5);
        let tip_a = g.commit("tip_a", &[m1], 6);
        let tip_b = g.commit("tip_b", &[m2], 7);

        // x2 has the higher timestamp, so it must win — in both directions.
        assert_eq!(merge_base(&g.store, &tip_a, &tip_b).unwrap(), Some(x2));
        assert_eq!(merge_base(&g.store, &tip_b, &tip_a).unwrap(), Some(x2));
    }

    #[test]
    fn is_ancestor_basics() {
        let g = GraphBuilder::new();
        let chain = g.chain(3);
        assert!(is_ancestor(&g.store, &chain[0], &chain[2]).unwrap());
        assert!(is_ancestor(&g.store, &chain[2], &chain[2]).unwrap());
        assert!(!is_ancestor(&g.store, &chain[2], &chain[0]).unwrap());
    }
}
