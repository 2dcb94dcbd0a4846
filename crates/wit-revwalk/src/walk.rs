//! Log ordering, ancestor sets, and range walks.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet, VecDeque};

use wit_hash::ObjectId;
use wit_object::Commit;
use wit_odb::ObjectStore;

use crate::RevWalkError;

/// Heap entry ordered newest-first, object id as the tie-break.
struct QueueEntry {
    timestamp: i64,
    id: ObjectId,
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.timestamp == other.timestamp && self.id == other.id
    }
}

impl Eq for QueueEntry {}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.timestamp
            .cmp(&other.timestamp)
            .then_with(|| self.id.cmp(&other.id))
    }
}

fn read_commit(store: &ObjectStore, id: &ObjectId) -> Result<Commit, RevWalkError> {
    store
        .read_commit(id)
        .map_err(|e| match e {
            wit_odb::OdbError::WrongType { id, .. } => RevWalkError::NotACommit(id),
            other => RevWalkError::Odb(other),
        })
}

/// Commits reachable from `start`, newest first, up to `limit`.
///
/// Traversal pops the highest committer timestamp first (ids break ties),
/// deduplicating by id, so merged histories interleave chronologically.
pub fn log(
    store: &ObjectStore,
    start: &ObjectId,
    limit: usize,
) -> Result<Vec<(ObjectId, Commit)>, RevWalkError> {
    let mut out = Vec::new();
    if limit == 0 {
        return Ok(out);
    }

    let mut heap = BinaryHeap::new();
    let mut seen: HashSet<ObjectId> = HashSet::new();

    let first = read_commit(store, start)?;
    heap.push(QueueEntry {
        timestamp: first.timestamp(),
        id: *start,
    });
    seen.insert(*start);

    while let Some(entry) = heap.pop() {
        let commit = read_commit(store, &entry.id)?;
        for parent in &commit.parents {
            if seen.insert(*parent) {
                let parent_commit = read_commit(store, parent)?;
                heap.push(QueueEntry {
                    timestamp: parent_commit.timestamp(),
                    id: *parent,
                });
            }
        }
        out.push((entry.id, commit));
        if out.len() == limit {
            break;
        }
    }

    Ok(out)
}

/// Every commit reachable from `start`, including `start` itself.
pub fn ancestors(
    store: &ObjectStore,
    start: &ObjectId,
) -> Result<HashSet<ObjectId>, RevWalkError> {
    let mut seen: HashSet<ObjectId> = HashSet::new();
    let mut queue: VecDeque<ObjectId> = VecDeque::new();

    seen.insert(*start);
    queue.push_back(*start);

    while let Some(id) = queue.pop_front() {
        let commit = read_commit(store, &id)?;
        for parent in &commit.parents {
            if seen.insert(*parent) {
                queue.push_back(*parent);
            }
        }
    }

    Ok(seen)
}

/// Commits reachable from `head` but not from `base`, oldest first.
///
/// The order is topological — a commit always follows its parents — with
/// ascending committer timestamp (then id) breaking ties among commits
/// whose parents are all emitted. This is the order rebase replays and
/// bisect bisects over.
pub fn commits_between(
    store: &ObjectStore,
    base: &ObjectId,
    head: &ObjectId,
) -> Result<Vec<ObjectId>, RevWalkError> {
    let excluded = ancestors(store, base)?;
    let reachable = ancestors(store, head)?;
    let range: HashSet<ObjectId> = reachable.difference(&excluded).copied().collect();

    // In-degree within the range, and the reverse (parent → children) edges.
    let mut pending: std::collections::HashMap<ObjectId, usize> = std::collections::HashMap::new();
    let mut children: std::collections::HashMap<ObjectId, Vec<ObjectId>> =
        std::collections::HashMap::new();
    let mut timestamps: std::collections::HashMap<ObjectId, i64> =
        std::collections::HashMap::new();

    for id in &range {
        let commit = read_commit(store, id)?;
        timestamps.insert(*id, commit.timestamp());
        let in_range_parents: Vec<ObjectId> = commit
            .parents
            .iter()
            .filter(|p| range.contains(p))
            .copied()
            .collect();
        pending.insert(*id, in_range_parents.len());
        for parent in in_range_parents {
            children.entry(parent).or_default().push(*id);
        }
    }

    // Kahn's algorithm; the min-heap keeps ready commits oldest-first.
    let mut ready: BinaryHeap<std::cmp::Reverse<(i64, ObjectId)>> = pending
        .iter()
        .filter(|(_, &degree)| degree == 0)
        .map(|(id, _)| std::cmp::Reverse((timestamps[id], *id)))
        .collect();

    let mut out = Vec::with_capacity(range.len());
    while let Some(std::cmp::Reverse((_, id))) = ready.pop() {
        out.push(id);
        for child in children.get(&id).into_iter().flatten() {
            let degree = pending.get_mut(child).expect("child is in range");
            *degree -= 1;
            if *degree == 0 {
                ready.push(std::cmp::Reverse((timestamps[child], *child)));
            }
        }
    }
    Ok(out)
}
