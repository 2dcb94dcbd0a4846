//! Building trees from the index and flattening trees back to paths.

use std::collections::BTreeMap;

use bstr::{BStr, BString, ByteSlice};
use wit_hash::ObjectId;
use wit_index::IndexEntry;
use wit_object::{FileMode, Object, Tree, TreeEntry};
use wit_odb::ObjectStore;

use crate::RepoError;

/// A flattened tree: work-relative path to `(mode, blob id)`.
pub type TreeMap = BTreeMap<BString, (FileMode, ObjectId)>;

/// Intermediate nested directory used while building trees bottom-up.
#[derive(Default)]
struct DirNode {
    files: Vec<(BString, FileMode, ObjectId)>,
    subdirs: BTreeMap<BString, DirNode>,
}

impl DirNode {
    fn insert(&mut self, path: &BStr, mode: FileMode, id: ObjectId) {
        match path.find_byte(b'/') {
            None => self.files.push((BString::from(path), mode, id)),
            Some(pos) => {
                let dir = BString::from(&path[..pos]);
                let rest = BStr::new(&path[pos + 1..]);
                self.subdirs.entry(dir).or_default().insert(rest, mode, id);
            }
        }
    }

    /// Write subtrees first, then this tree; returns its id.
    fn write(&self, odb: &ObjectStore) -> Result<ObjectId, RepoError> {
        let mut entries = Vec::with_capacity(self.files.len() + self.subdirs.len());
        for (name, node) in &self.subdirs {
            let id = node.write(odb)?;
            entries.push(TreeEntry {
                mode: FileMode::Dir,
                name: name.clone(),
                id,
            });
        }
        for (name, mode, id) in &self.files {
            entries.push(TreeEntry {
                mode: *mode,
                name: name.clone(),
                id: *id,
            });
        }
        let tree = Tree { entries };
        Ok(odb.write(&Object::Tree(tree))?)
    }
}

/// Build the root tree for a set of index entries. Deterministic: the same
/// entry set always produces the same root id.
pub fn write_tree_from_index(
    odb: &ObjectStore,
    entries: &[IndexEntry],
) -> Result<ObjectId, RepoError> {
    let mut root = DirNode::default();
    for entry in entries {
        root.insert(entry.path.as_bstr(), entry.mode, entry.id);
    }
    root.write(odb)
}

/// Flatten a tree recursively into path → `(mode, id)`.
pub fn read_tree_fully(odb: &ObjectStore, tree_id: &ObjectId) -> Result<TreeMap, RepoError> {
    let mut map = TreeMap::new();
    collect(odb, tree_id, BString::from(""), &mut map)?;
    Ok(map)
}

fn collect(
    odb: &ObjectStore,
    tree_id: &ObjectId,
    prefix: BString,
    map: &mut TreeMap,
) -> Result<(), RepoError> {
    let tree = odb.read_tree(tree_id)?;
    for entry in tree.iter() {
        let mut path = prefix.clone();
        if !path.is_empty() {
            path.push(b'/');
        }
        path.extend_from_slice(&entry.name);

        if entry.mode.is_dir() {
            collect(odb, &entry.id, path, map)?;
        } else {
            map.insert(path, (entry.mode, entry.id));
        }
    }
    Ok(())
}

/// Walk a tree down a `/`-separated path to one entry.
pub fn entry_at_path(
    odb: &ObjectStore,
    tree_id: &ObjectId,
    path: &BStr,
) -> Result<Option<(FileMode, ObjectId)>, RepoError> {
    let mut current = *tree_id;
    let components: Vec<&[u8]> = path.split_str("/").collect();

    for (i, component) in components.iter().enumerate() {
        let tree = odb.read_tree(&current)?;
        let Some(entry) = tree.find(BStr::new(component)) else {
            return Ok(None);
        };
        if i + 1 == components.len() {
            return Ok(if entry.mode.is_dir() {
                None
            } else {
                Some((entry.mode, entry.id))
            });
        }
        if !entry.mode.is_dir() {
            return Ok(None);
        }
        current = entry.id;
    }
    Ok(None)
}

/// The flattened tree of a commit, or empty for `None` (unborn branch).
pub fn commit_tree_map(
    odb: &ObjectStore,
    commit_id: Option<&ObjectId>,
) -> Result<TreeMap, RepoError> {
    match commit_id {
        None => Ok(TreeMap::new()),
        Some(id) => {
            let commit = odb.read_commit(id)?;
            read_tree_fully(odb, &commit.tree)
        }
    }
}
