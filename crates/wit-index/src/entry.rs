use bstr::BString;
use wit_hash::ObjectId;
use wit_object::FileMode;

/// Cached filesystem metadata for change detection.
///
/// Purely an optimization hint: a stat match means "almost certainly
/// unchanged", a mismatch forces a content hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatCache {
    pub ctime_sec: u32,
    pub ctime_nsec: u32,
    pub mtime_sec: u32,
    pub mtime_nsec: u32,
    pub dev: u32,
    pub ino: u32,
    pub uid: u32,
    pub gid: u32,
    pub size: u32,
    pub flags: u16,
}

impl StatCache {
    /// Capture from filesystem metadata.
    #[cfg(unix)]
    pub fn from_metadata(meta: &std::fs::Metadata) -> Self {
        use std::os::unix::fs::MetadataExt;
        Self {
            ctime_sec: meta.ctime() as u32,
            ctime_nsec: meta.ctime_nsec() as u32,
            mtime_sec: meta.mtime() as u32,
            mtime_nsec: meta.mtime_nsec() as u32,
            dev: meta.dev() as u32,
            ino: meta.ino() as u32,
            uid: meta.uid(),
            gid: meta.gid(),
            size: meta.len() as u32,
            flags: 0,
        }
    }

    #[cfg(not(unix))]
    pub fn from_metadata(meta: &std::fs::Metadata) -> Self {
        let mtime = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .unwrap_or_default();
        Self {
            mtime_sec: mtime.as_secs() as u32,
            mtime_nsec: mtime.subsec_nanos(),
            size: meta.len() as u32,
            ..Default::default()
        }
    }

    /// Whether current metadata still matches the cached snapshot.
    pub fn matches(&self, meta: &std::fs::Metadata) -> bool {
        let fresh = Self::from_metadata(meta);
        self.mtime_sec == fresh.mtime_sec
            && self.mtime_nsec == fresh.mtime_nsec
            && self.size == fresh.size
            && self.ino == fresh.ino
            && self.dev == fresh.dev
    }
}

/// One staged path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    /// Path relative to the work root, `/`-separated.
    pub path: BString,
    pub mode: FileMode,
    pub id: ObjectId,
    pub stat: StatCache,
}

impl IndexEntry {
    pub fn new(path: impl Into<BString>, mode: FileMode, id: ObjectId) -> Self {
        Self {
            path: path.into(),
            mode,
            id,
            stat: StatCache::default(),
        }
    }

    pub fn with_stat(mut self, stat: StatCache) -> Self {
        self.stat = stat;
        self
    }
}

/// The unresolved sides of a conflicted path (stages 1/2/3).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConflictStages {
    /// Stage 1: common ancestor.
    pub base: Option<(FileMode, ObjectId)>,
    /// Stage 2: ours.
    pub ours: Option<(FileMode, ObjectId)>,
    /// Stage 3: theirs.
    pub theirs: Option<(FileMode, ObjectId)>,
}
