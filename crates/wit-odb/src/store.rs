//! Unified read/write over loose objects and packs.

use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use lru::LruCache;
use wit_hash::{HashAlgorithm, ObjectId};
use wit_object::{Blob, Commit, Object, ObjectType, Tag, Tree};
use wit_pack::{parse_pack, PackFile};

use crate::{LooseStore, OdbError};

/// Default capacity of the decompressed-object cache.
const DEFAULT_CACHE_SIZE: usize = 256;

/// The object database for one repository.
///
/// Writes are loose-only and content-addressed; reads fall back from the
/// loose store to any packs present at open time. The cache holds parsed
/// bodies and is purely an optimization.
pub struct ObjectStore {
    loose: LooseStore,
    packs: Vec<PackFile>,
    cache: Mutex<LruCache<ObjectId, (ObjectType, Vec<u8>)>>,
    algo: HashAlgorithm,
}

impl ObjectStore {
    /// Open the store rooted at `objects_dir`, indexing `pack/*.pack`.
    pub fn open(objects_dir: impl AsRef<Path>, algo: HashAlgorithm) -> Result<Self, OdbError> {
        let objects_dir = objects_dir.as_ref().to_path_buf();
        let loose = LooseStore::new(&objects_dir, algo);

        let mut packs = Vec::new();
        let pack_dir = objects_dir.join("pack");
        if pack_dir.is_dir() {
            let mut paths: Vec<PathBuf> = fs::read_dir(&pack_dir)
                .map_err(|e| OdbError::io(pack_dir.clone(), e))?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.extension().is_some_and(|ext| ext == "pack"))
                .collect();
            paths.sort();
            for path in paths {
                let resolver = |id: &ObjectId| loose.read(id).ok().flatten();
                packs.push(PackFile::open(&path, algo, &resolver)?);
            }
        }

        Ok(Self {
            loose,
            packs,
            cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(DEFAULT_CACHE_SIZE).expect("nonzero cache size"),
            )),
            algo,
        })
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algo
    }

    pub fn loose(&self) -> &LooseStore {
        &self.loose
    }

    /// Whether the object exists in any source.
    pub fn has(&self, id: &ObjectId) -> bool {
        self.loose.contains(id) || self.packs.iter().any(|p| p.contains(id))
    }

    /// Read `(type, body)` from loose storage or a pack.
    pub fn read_raw(&self, id: &ObjectId) -> Result<(ObjectType, Vec<u8>), OdbError> {
        if let Some(hit) = self.cache.lock().expect("odb cache lock").get(id) {
            return Ok(hit.clone());
        }

        let found = match self.loose.read(id)? {
            Some(found) => Some(found),
            None => {
                let resolver = |base: &ObjectId| self.loose.read(base).ok().flatten();
                let mut found = None;
                for pack in &self.packs {
                    if let Some(hit) = pack.read(id, &resolver)? {
                        found = Some(hit);
                        break;
                    }
                }
                found
            }
        };

        let (obj_type, body) = found.ok_or(OdbError::NotFound(*id))?;
        self.cache
            .lock()
            .expect("odb cache lock")
            .put(*id, (obj_type, body.clone()));
        Ok((obj_type, body))
    }

    /// Read and parse an object.
    pub fn read(&self, id: &ObjectId) -> Result<Object, OdbError> {
        let (obj_type, body) = self.read_raw(id)?;
        Object::parse_body(obj_type, &body, self.algo).map_err(|e| OdbError::Corrupt {
            id: *id,
            reason: e.to_string(),
        })
    }

    pub fn read_blob(&self, id: &ObjectId) -> Result<Blob, OdbError> {
        match self.read(id)? {
            Object::Blob(b) => Ok(b),
            other => Err(self.wrong_type(id, ObjectType::Blob, &other)),
        }
    }

    pub fn read_tree(&self, id: &ObjectId) -> Result<Tree, OdbError> {
        match self.read(id)? {
            Object::Tree(t) => Ok(t),
            other => Err(self.wrong_type(id, ObjectType::Tree, &other)),
        }
    }

    pub fn read_commit(&self, id: &ObjectId) -> Result<Commit, OdbError> {
        match self.read(id)? {
            Object::Commit(c) => Ok(c),
            other => Err(self.wrong_type(id, ObjectType::Commit, &other)),
        }
    }

    pub fn read_tag(&self, id: &ObjectId) -> Result<Tag, OdbError> {
        match self.read(id)? {
            Object::Tag(t) => Ok(t),
            other => Err(self.wrong_type(id, ObjectType::Tag, &other)),
        }
    }

    fn wrong_type(&self, id: &ObjectId, expected: ObjectType, got: &Object) -> OdbError {
        OdbError::WrongType {
            id: *id,
            expected,
            actual: got.object_type(),
        }
    }

    /// Write a parsed object. Idempotent.
    pub fn write(&self, object: &Object) -> Result<ObjectId, OdbError> {
        self.write_raw(object.object_type(), &object.serialize_body())
    }

    /// Write a raw body with a known type (the pack-import path).
    pub fn write_raw(&self, obj_type: ObjectType, body: &[u8]) -> Result<ObjectId, OdbError> {
        self.loose.write_raw(obj_type, body)
    }

    /// Import every object of a pack byte stream into loose storage.
    ///
    /// REF_DELTA bases missing from the pack are looked up loose.
    pub fn import_pack(&self, pack: &[u8]) -> Result<Vec<ObjectId>, OdbError> {
        let resolver = |id: &ObjectId| self.loose.read(id).ok().flatten();
        let objects = parse_pack(pack, self.algo, &resolver)?;
        let mut ids = Vec::with_capacity(objects.len());
        for obj in objects {
            let id = self.write_raw(obj.obj_type, &obj.data)?;
            debug_assert_eq!(id, obj.id);
            ids.push(id);
        }
        Ok(ids)
    }

    /// Ids of every object held by a pack.
    pub(crate) fn pack_ids(&self) -> Vec<ObjectId> {
        self.packs
            .iter()
            .flat_map(|p| p.object_ids().copied())
            .collect()
    }

    /// All object ids across loose and pack sources.
    pub fn enumerate(&self) -> Result<Vec<ObjectId>, OdbError> {
        let mut ids = self.loose.enumerate()?;
        for pack in &self.packs {
            ids.extend(pack.object_ids().copied());
        }
        ids.sort();
        ids.dedup();
        Ok(ids)
    }
}

impl std::fmt::Debug for ObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStore")
            .field("loose", &self.loose)
            .field("packs", &self.packs.len())
            .finish_non_exhaustive()
    }
}
