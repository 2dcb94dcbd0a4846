//! The `packed-refs` file: many refs in one sorted file.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use bstr::ByteSlice;
use wit_hash::ObjectId;
use wit_utils::LockFile;

use crate::name::RefName;
use crate::RefError;

pub(crate) const PACKED_REFS_HEADER: &str = "# pack-refs with: peeled fully-peeled sorted";

/// One packed ref line, with the optional `^` peeled continuation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedRef {
    pub name: RefName,
    pub id: ObjectId,
    /// For annotated tags: the commit the tag object points at.
    pub peeled: Option<ObjectId>,
}

/// Parsed contents of `packed-refs`.
#[derive(Debug, Clone, Default)]
pub struct PackedRefs {
    refs: Vec<PackedRef>,
}

impl PackedRefs {
    /// Parse file contents.
    ///
    /// Blank lines and `#` comments are ignored; a `^<hex>` line attaches a
    /// peeled id to the ref on the preceding line.
    pub fn parse(data: &[u8]) -> Result<Self, RefError> {
        let mut refs: Vec<PackedRef> = Vec::new();

        for line in data.lines() {
            if line.is_empty() || line.starts_with(b"#") {
                continue;
            }

            if let Some(peeled_hex) = line.strip_prefix(b"^") {
                let hex = std::str::from_utf8(peeled_hex)
                    .map_err(|_| RefError::Parse("non-UTF-8 peeled line".into()))?;
                let peeled = ObjectId::from_hex(hex.trim())?;
                let last = refs
                    .last_mut()
                    .ok_or_else(|| RefError::Parse("peeled line without a ref".into()))?;
                last.peeled = Some(peeled);
                continue;
            }

            let space_pos = line
                .find_byte(b' ')
                .ok_or_else(|| RefError::Parse("packed-refs line without space".into()))?;
            let hex = std::str::from_utf8(&line[..space_pos])
                .map_err(|_| RefError::Parse("non-UTF-8 object id".into()))?;
            let id = ObjectId::from_hex(hex)?;

            let name_str = std::str::from_utf8(&line[space_pos + 1..])
                .map_err(|_| RefError::Parse("non-UTF-8 ref name".into()))?;
            let name = RefName::new(name_str.trim())?;

            refs.push(PackedRef {
                name,
                id,
                peeled: None,
            });
        }

        Ok(Self { refs })
    }

    /// Load from disk; an absent file is an empty set.
    pub fn load(meta_dir: &Path) -> Result<Self, RefError> {
        let path = packed_refs_path(meta_dir);
        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default())
            }
            Err(e) => return Err(RefError::io(path, e)),
        };
        Self::parse(&data)
    }

    /// Serialize in the normative format, sorted by name.
    pub fn serialize(&self) -> Vec<u8> {
        let mut sorted = self.refs.clone();
        sorted.sort_by(|a, b| a.name.cmp(&b.name));

        let mut out = Vec::new();
        out.extend_from_slice(PACKED_REFS_HEADER.as_bytes());
        out.push(b'\n');
        for pr in &sorted {
            out.extend_from_slice(format!("{} {}\n", pr.id.to_hex(), pr.name).as_bytes());
            if let Some(peeled) = &pr.peeled {
                out.extend_from_slice(format!("^{}\n", peeled.to_hex()).as_bytes());
            }
        }
        out
    }

    /// Rewrite the file atomically under `packed-refs.lock`.
    ///
    /// An empty set removes the file instead.
    pub fn write(&self, meta_dir: &Path) -> Result<(), RefError> {
        let path = packed_refs_path(meta_dir);
        if self.refs.is_empty() {
            let lock = LockFile::acquire(&path)?;
            let _ = fs::remove_file(&path);
            lock.rollback()?;
            return Ok(());
        }

        let mut lock = LockFile::acquire(&path)?;
        lock.write_all(&self.serialize())
            .map_err(|e| RefError::io(&path, e))?;
        lock.commit()?;
        Ok(())
    }

    pub fn find(&self, name: &RefName) -> Option<&PackedRef> {
        self.refs.iter().find(|pr| pr.name == *name)
    }

    /// Insert or replace a ref.
    pub fn upsert(&mut self, name: RefName, id: ObjectId, peeled: Option<ObjectId>) {
        if let Some(existing) = self.refs.iter_mut().find(|pr| pr.name == name) {
            existing.id = id;
            existing.peeled = peeled;
        } else {
            self.refs.push(PackedRef { name, id, peeled });
            self.refs.sort_by(|a, b| a.name.cmp(&b.name));
        }
    }

    /// Remove a ref; returns whether it was present.
    pub fn remove(&mut self, name: &RefName) -> bool {
        let before = self.refs.len();
        self.refs.retain(|pr| pr.name != *name);
        self.refs.len() < before
    }

    pub fn refs(&self) -> &[PackedRef] {
        &self.refs
    }

    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }
}

pub(crate) fn packed_refs_path(meta_dir: &Path) -> PathBuf {
    meta_dir.join("packed-refs")
}
