//! On-disk index format (`WIDX` version 1).
//!
//! Big-endian throughout. Layout:
//!
//! ```text
//! "WIDX" | u32 version | u8 algo | u32 entries | u32 conflicts
//! entry*:    u32 path_len | path | u32 mode | id | stat (9×u32 + u16)
//! conflict*: u32 path_len | path | u8 stage_mask | (u32 mode | id)*
//! trailer:   digest of everything above
//! ```
//!
//! Entries and conflicts are written in path order, so equal entry sets
//! serialize identically.

use std::fs;
use std::io::Write;
use std::path::Path;

use bstr::BString;
use wit_hash::{HashAlgorithm, Hasher, ObjectId};
use wit_object::FileMode;
use wit_utils::LockFile;

use crate::entry::{ConflictStages, IndexEntry, StatCache};
use crate::{Index, IndexError};

const MAGIC: &[u8; 4] = b"WIDX";
const VERSION: u32 = 1;

impl Index {
    /// Load the index at `path`; an absent file is an empty index.
    pub fn load(path: impl AsRef<Path>, algo: HashAlgorithm) -> Result<Self, IndexError> {
        let path = path.as_ref();
        let data = match fs::read(path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::new(path, algo))
            }
            Err(e) => {
                return Err(IndexError::Io {
                    path: path.to_path_buf(),
                    source: e,
                })
            }
        };

        let mut index = Self::new(path, algo);
        parse(&data, algo, &mut index)?;
        Ok(index)
    }

    /// Persist under `index.lock`, then rename into place.
    pub fn save(&self) -> Result<(), IndexError> {
        let body = self.serialize();
        let mut lock = LockFile::acquire(self.file_path())?;
        lock.write_all(&body).map_err(|e| IndexError::Io {
            path: self.file_path().to_path_buf(),
            source: e,
        })?;
        lock.commit()?;
        Ok(())
    }

    /// Serialized bytes, trailer included.
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&VERSION.to_be_bytes());
        out.push(match self.algorithm() {
            HashAlgorithm::Sha1 => 1,
            HashAlgorithm::Sha256 => 2,
        });
        out.extend_from_slice(&(self.entries().len() as u32).to_be_bytes());
        out.extend_from_slice(&(self.conflicts().count() as u32).to_be_bytes());

        for entry in self.entries() {
            write_path(&mut out, &entry.path);
            out.extend_from_slice(&entry.mode.raw().to_be_bytes());
            out.extend_from_slice(entry.id.as_bytes());
            let s = &entry.stat;
            for field in [
                s.ctime_sec,
                s.ctime_nsec,
                s.mtime_sec,
                s.mtime_nsec,
                s.dev,
                s.ino,
                s.uid,
                s.gid,
                s.size,
            ] {
                out.extend_from_slice(&field.to_be_bytes());
            }
            out.extend_from_slice(&s.flags.to_be_bytes());
        }

        for (path, stages) in self.conflicts() {
            write_path(&mut out, path);
            let mut mask = 0u8;
            for (bit, stage) in [
                (1u8, &stages.base),
                (2, &stages.ours),
                (4, &stages.theirs),
            ] {
                if stage.is_some() {
                    mask |= bit;
                }
            }
            out.push(mask);
            for stage in [&stages.base, &stages.ours, &stages.theirs] {
                if let Some((mode, id)) = stage {
                    out.extend_from_slice(&mode.raw().to_be_bytes());
                    out.extend_from_slice(id.as_bytes());
                }
            }
        }

        let trailer = Hasher::digest(self.algorithm(), &out);
        out.extend_from_slice(trailer.as_bytes());
        out
    }

    /// Hash of the serialized entry set (the journal's `index_hash`).
    pub fn content_hash(&self) -> ObjectId {
        Hasher::digest(self.algorithm(), &self.serialize())
    }
}

fn write_path(out: &mut Vec<u8>, path: &BString) {
    out.extend_from_slice(&(path.len() as u32).to_be_bytes());
    out.extend_from_slice(path);
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], IndexError> {
        if self.pos + n > self.data.len() {
            return Err(IndexError::Corrupt("unexpected end of index".into()));
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn u32(&mut self) -> Result<u32, IndexError> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn u16(&mut self) -> Result<u16, IndexError> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u8(&mut self) -> Result<u8, IndexError> {
        Ok(self.take(1)?[0])
    }

    fn path(&mut self) -> Result<BString, IndexError> {
        let len = self.u32()? as usize;
        Ok(BString::from(self.take(len)?))
    }

    fn mode(&mut self) -> Result<FileMode, IndexError> {
        let raw = self.u32()?;
        FileMode::from_raw(raw)
            .ok_or_else(|| IndexError::Corrupt(format!("bad file mode {raw:o}")))
    }

    fn id(&mut self, algo: HashAlgorithm) -> Result<ObjectId, IndexError> {
        let bytes = self.take(algo.digest_len())?;
        ObjectId::from_bytes(bytes, algo)
            .map_err(|e| IndexError::Corrupt(e.to_string()))
    }
}

fn parse(data: &[u8], algo: HashAlgorithm, index: &mut Index) -> Result<(), IndexError> {
    let digest_len = algo.digest_len();
    if data.len() < digest_len {
        return Err(IndexError::Corrupt("index too small".into()));
    }
    let (body, trailer) = data.split_at(data.len() - digest_len);
    let actual = Hasher::digest(algo, body);
    if actual.as_bytes() != trailer {
        return Err(IndexError::Corrupt("index checksum mismatch".into()));
    }

    let mut r = Reader { data: body, pos: 0 };
    if r.take(4)? != MAGIC {
        return Err(IndexError::Corrupt("bad index magic".into()));
    }
    let version = r.u32()?;
    if version != VERSION {
        return Err(IndexError::Corrupt(format!("unsupported index version {version}")));
    }
    let algo_byte = r.u8()?;
    let file_algo = match algo_byte {
        1 => HashAlgorithm::Sha1,
        2 => HashAlgorithm::Sha256,
        other => {
            return Err(IndexError::Corrupt(format!("unknown algorithm tag {other}")))
        }
    };
    if file_algo != algo {
        return Err(IndexError::Corrupt(format!(
            "index hashed with {file_algo}, repository uses {algo}"
        )));
    }

    let entry_count = r.u32()?;
    let conflict_count = r.u32()?;

    let mut prev_path: Option<BString> = None;
    for _ in 0..entry_count {
        let path = r.path()?;
        if let Some(prev) = &prev_path {
            if prev.as_slice() >= path.as_slice() {
                return Err(IndexError::Corrupt("index entries out of order".into()));
            }
        }
        let mode = r.mode()?;
        let id = r.id(algo)?;
        let stat = StatCache {
            ctime_sec: r.u32()?,
            ctime_nsec: r.u32()?,
            mtime_sec: r.u32()?,
            mtime_nsec: r.u32()?,
            dev: r.u32()?,
            ino: r.u32()?,
            uid: r.u32()?,
            gid: r.u32()?,
            size: r.u32()?,
            flags: r.u16()?,
        };
        index.add(IndexEntry {
            path: path.clone(),
            mode,
            id,
            stat,
        });
        prev_path = Some(path);
    }

    for _ in 0..conflict_count {
        let path = r.path()?;
        let mask = r.u8()?;
        let mut stages = ConflictStages::default();
        if mask & 1 != 0 {
            stages.base = Some((r.mode()?, r.id(algo)?));
        }
        if mask & 2 != 0 {
            stages.ours = Some((r.mode()?, r.id(algo)?));
        }
        if mask & 4 != 0 {
            stages.theirs = Some((r.mode()?, r.id(algo)?));
        }
        index.set_conflict(path, stages);
    }

    if r.pos != body.len() {
        return Err(IndexError::Corrupt("trailing bytes in index".into()));
    }
    Ok(())
}
