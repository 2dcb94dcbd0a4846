use std::cmp::Ordering;

use bstr::{BStr, BString, ByteSlice};
use wit_hash::{HashAlgorithm, ObjectId};

use crate::ObjectError;

/// File mode of a tree entry.
///
/// Only the four modes the store accepts; anything else fails parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileMode {
    /// Regular file (100644)
    Regular,
    /// Executable file (100755)
    Executable,
    /// Symbolic link (120000)
    Symlink,
    /// Subdirectory (040000)
    Dir,
}

impl FileMode {
    /// Parse from octal ASCII bytes (e.g. `b"100644"`).
    pub fn from_bytes(s: &[u8]) -> Result<Self, ObjectError> {
        match s {
            b"100644" => Ok(Self::Regular),
            b"100755" => Ok(Self::Executable),
            b"120000" => Ok(Self::Symlink),
            b"40000" | b"040000" => Ok(Self::Dir),
            other => Err(ObjectError::InvalidFileMode(
                String::from_utf8_lossy(other).into(),
            )),
        }
    }

    /// Serialize to octal ASCII (canonical form, no leading zero for dirs).
    pub fn as_bytes(&self) -> &'static [u8] {
        match self {
            Self::Regular => b"100644",
            Self::Executable => b"100755",
            Self::Symlink => b"120000",
            Self::Dir => b"40000",
        }
    }

    /// The raw numeric value.
    pub fn raw(&self) -> u32 {
        match self {
            Self::Regular => 0o100644,
            Self::Executable => 0o100755,
            Self::Symlink => 0o120000,
            Self::Dir => 0o040000,
        }
    }

    /// Inverse of [`raw`](FileMode::raw).
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0o100644 => Some(Self::Regular),
            0o100755 => Some(Self::Executable),
            0o120000 => Some(Self::Symlink),
            0o040000 => Some(Self::Dir),
            _ => None,
        }
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, Self::Dir)
    }

    pub fn is_file(&self) -> bool {
        matches!(self, Self::Regular | Self::Executable)
    }

    pub fn is_symlink(&self) -> bool {
        matches!(self, Self::Symlink)
    }
}

/// A single tree entry: `(mode, name, id)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub mode: FileMode,
    pub name: BString,
    pub id: ObjectId,
}

impl TreeEntry {
    /// Git's tree ordering: subtree names compare as if they had a
    /// trailing `/`, so `foo` < `foo/` (dir) < `foo.txt` does NOT hold —
    /// the dir `foo` sorts after `foo.txt` because `/` > `.`.
    pub fn cmp_entries(a: &TreeEntry, b: &TreeEntry) -> Ordering {
        sort_key_compare(&a.name, a.mode.is_dir(), &b.name, b.mode.is_dir())
    }
}

impl PartialOrd for TreeEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TreeEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        Self::cmp_entries(self, other)
    }
}

/// Byte-wise name comparison with the implicit trailing `/` on directories.
fn sort_key_compare(name1: &[u8], is_dir1: bool, name2: &[u8], is_dir2: bool) -> Ordering {
    let min_len = name1.len().min(name2.len());
    let cmp = name1[..min_len].cmp(&name2[..min_len]);
    if cmp != Ordering::Equal {
        return cmp;
    }
    let c1 = if name1.len() > min_len {
        name1[min_len]
    } else if is_dir1 {
        b'/'
    } else {
        0
    };
    let c2 = if name2.len() > min_len {
        name2[min_len]
    } else if is_dir2 {
        b'/'
    } else {
        0
    };
    c1.cmp(&c2)
}

/// A directory listing.
///
/// Entries are held in canonical order; [`Tree::parse`] rejects bodies whose
/// entries are out of order (a reordered serialization would change the
/// tree's hash).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Tree {
    pub entries: Vec<TreeEntry>,
}

impl Tree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a tree body: repeated `<mode> <name>\0<id-bytes>`.
    pub fn parse(body: &[u8], algo: HashAlgorithm) -> Result<Self, ObjectError> {
        let id_len = algo.digest_len();
        let mut entries = Vec::new();
        let mut pos = 0;

        while pos < body.len() {
            let space_pos = body[pos..]
                .iter()
                .position(|&b| b == b' ')
                .ok_or_else(|| ObjectError::InvalidTreeEntry {
                    offset: pos,
                    reason: "missing space after mode".into(),
                })?
                + pos;

            let mode = FileMode::from_bytes(&body[pos..space_pos])?;

            let name_start = space_pos + 1;
            let null_pos = body[name_start..]
                .iter()
                .position(|&b| b == 0)
                .ok_or_else(|| ObjectError::InvalidTreeEntry {
                    offset: name_start,
                    reason: "missing null after name".into(),
                })?
                + name_start;

            let name = BString::from(&body[name_start..null_pos]);
            if name.is_empty() || name.contains(&b'/') {
                return Err(ObjectError::InvalidTreeEntry {
                    offset: name_start,
                    reason: "invalid entry name".into(),
                });
            }

            let id_start = null_pos + 1;
            if id_start + id_len > body.len() {
                return Err(ObjectError::InvalidTreeEntry {
                    offset: id_start,
                    reason: "truncated object id".into(),
                });
            }
            let id = ObjectId::from_bytes(&body[id_start..id_start + id_len], algo)?;

            let entry = TreeEntry { mode, name, id };
            if let Some(prev) = entries.last() {
                if TreeEntry::cmp_entries(prev, &entry) != Ordering::Less {
                    return Err(ObjectError::UnsortedTree {
                        name: entry.name.clone(),
                    });
                }
            }
            entries.push(entry);
            pos = id_start + id_len;
        }

        Ok(Self { entries })
    }

    /// Serialize the body with entries in canonical order.
    pub fn serialize_body(&self) -> Vec<u8> {
        let mut sorted: Vec<&TreeEntry> = self.entries.iter().collect();
        sorted.sort_by(|a, b| TreeEntry::cmp_entries(a, b));

        let mut out = Vec::new();
        for entry in sorted {
            out.extend_from_slice(entry.mode.as_bytes());
            out.push(b' ');
            out.extend_from_slice(&entry.name);
            out.push(0);
            out.extend_from_slice(entry.id.as_bytes());
        }
        out
    }

    /// Sort entries in place into canonical order.
    pub fn sort(&mut self) {
        self.entries.sort();
    }

    /// Look up an entry by name.
    pub fn find(&self, name: &BStr) -> Option<&TreeEntry> {
        self.entries.iter().find(|e| e.name.as_bstr() == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TreeEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oid(n: u8) -> ObjectId {
        let mut bytes = [0u8; 20];
        bytes[19] = n;
        ObjectId::Sha1(bytes)
    }

    fn entry(mode: FileMode, name: &str, n: u8) -> TreeEntry {
        TreeEntry {
            mode,
            name: BString::from(name),
            id: oid(n),
        }
    }

    #[test]
    fn mode_roundtrip() {
        for mode in [
            FileMode::Regular,
            FileMode::Executable,
            FileMode::Symlink,
            FileMode::Dir,
        ] {
            assert_eq!(FileMode::from_bytes(mode.as_bytes()).unwrap(), mode);
        }
        assert!(FileMode::from_bytes(b"160000").is_err());
        assert!(FileMode::from_bytes(b"100664").is_err());
    }

    #[test]
    fn dir_sorts_with_implicit_slash() {
        // "foo" (dir) compares as "foo/": after "foo.txt" ('/' > '.') and
        // after "foo-bar" ('/' > '-').
        let dir = entry(FileMode::Dir, "foo", 1);
        let dotted = entry(FileMode::Regular, "foo.txt", 2);
        let hyphenated = entry(FileMode::Regular, "foo-bar", 3);
        assert_eq!(TreeEntry::cmp_entries(&dir, &dotted), Ordering::Greater);
        assert_eq!(TreeEntry::cmp_entries(&dir, &hyphenated), Ordering::Greater);

        // A plain file "foo" still sorts before both.
        let plain = entry(FileMode::Regular, "foo", 4);
        assert_eq!(TreeEntry::cmp_entries(&plain, &dotted), Ordering::Less);
        assert_eq!(TreeEntry::cmp_entries(&plain, &dir), Ordering::Less);
    }

    #[test]
    fn serialize_orders_entries() {
        let tree = Tree {
            entries: vec![
                entry(FileMode::Regular, "b.txt", 1),
                entry(FileMode::Dir, "a-dir", 2),
            ],
        };
        let body = tree.serialize_body();
        let parsed = Tree::parse(&body, HashAlgorithm::Sha1).unwrap();
        assert_eq!(parsed.entries[0].name, "a-dir");
        assert_eq!(parsed.entries[1].name, "b.txt");
        // Reserializing the parsed form is byte-identical.
        assert_eq!(parsed.serialize_body(), body);
    }

    #[test]
    fn unsorted_body_rejected() {
        let tree = Tree {
            entries: vec![
                entry(FileMode::Regular, "z.txt", 1),
                entry(FileMode::Regular, "a.txt", 2),
            ],
        };
        // Build a body bypassing the canonical sort.
        let mut body = Vec::new();
        for e in &tree.entries {
            body.extend_from_slice(e.mode.as_bytes());
            body.push(b' ');
            body.extend_from_slice(&e.name);
            body.push(0);
            body.extend_from_slice(e.id.as_bytes());
        }
        assert!(matches!(
            Tree::parse(&body, HashAlgorithm::Sha1),
            Err(ObjectError::UnsortedTree { .. })
        ));
    }

    #[test]
    fn duplicate_name_rejected() {
        let mut body = Vec::new();
        for e in [
            entry(FileMode::Regular, "same", 1),
            entry(FileMode::Regular, "same", 2),
        ] {
            body.extend_from_slice(e.mode.as_bytes());
            body.push(b' ');
            body.extend_from_slice(&e.name);
            body.push(0);
            body.extend_from_slice(e.id.as_bytes());
        }
        assert!(Tree::parse(&body, HashAlgorithm::Sha1).is_err());
    }

    #[test]
    fn empty_tree() {
        let tree = Tree::parse(b"", HashAlgorithm::Sha1).unwrap();
        assert!(tree.is_empty());
        assert!(tree.serialize_body().is_empty());
    }

    #[test]
    fn find_entry() {
        let tree = Tree {
            entries: vec![
                entry(FileMode::Regular, "README.md", 1),
                entry(FileMode::Dir, "src", 2),
            ],
        };
        assert!(tree.find(BStr::new("README.md")).is_some());
        assert!(tree.find(BStr::new("missing")).is_none());
    }

    #[test]
    fn truncated_id_rejected() {
        let mut body = Vec::new();
        body.extend_from_slice(b"100644 f\0");
        body.extend_from_slice(&[0u8; 10]);
        assert!(Tree::parse(&body, HashAlgorithm::Sha1).is_err());
    }
}
