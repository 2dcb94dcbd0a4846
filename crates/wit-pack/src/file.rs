//! Memory-mapped access to packs under `objects/pack/`.

use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};

use flate2::bufread::ZlibDecoder;
use memmap2::Mmap;
use wit_hash::{HashAlgorithm, ObjectId};
use wit_object::ObjectType;

use crate::entry::{parse_entry_header, EntryType};
use crate::parse::{resolve_entries, scan_entries};
use crate::{PackError, MAX_DELTA_CHAIN_DEPTH};

/// A read-only on-disk pack.
///
/// Opening scans the whole pack once to index object ids by record offset
/// (there is no separate index file format in wit); reads then resolve
/// delta chains on demand against the mapped bytes.
pub struct PackFile {
    data: Mmap,
    path: PathBuf,
    algo: HashAlgorithm,
    by_id: HashMap<ObjectId, u64>,
}

impl PackFile {
    /// Open and index a pack.
    ///
    /// `resolve_external` answers REF_DELTA bases stored outside the pack.
    pub fn open(
        path: impl AsRef<Path>,
        algo: HashAlgorithm,
        resolve_external: &dyn Fn(&ObjectId) -> Option<(ObjectType, Vec<u8>)>,
    ) -> Result<Self, PackError> {
        let path = path.as_ref().to_path_buf();
        let file = std::fs::File::open(&path)?;
        let data = unsafe { Mmap::map(&file)? };

        let entries = scan_entries(&data, algo)?;
        let resolved = resolve_entries(entries, algo, resolve_external)?;
        let by_id = resolved
            .into_iter()
            .map(|(offset, obj)| (obj.id, offset))
            .collect();

        Ok(Self {
            data,
            path,
            algo,
            by_id,
        })
    }

    pub fn contains(&self, id: &ObjectId) -> bool {
        self.by_id.contains_key(id)
    }

    pub fn num_objects(&self) -> usize {
        self.by_id.len()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Iterate all object ids in this pack.
    pub fn object_ids(&self) -> impl Iterator<Item = &ObjectId> {
        self.by_id.keys()
    }

    /// Read an object, resolving any delta chain.
    ///
    /// Returns `Ok(None)` when the id is not in this pack.
    pub fn read(
        &self,
        id: &ObjectId,
        resolve_external: &dyn Fn(&ObjectId) -> Option<(ObjectType, Vec<u8>)>,
    ) -> Result<Option<(ObjectType, Vec<u8>)>, PackError> {
        let Some(&offset) = self.by_id.get(id) else {
            return Ok(None);
        };
        self.read_at(offset, resolve_external).map(Some)
    }

    /// Resolve the record at `offset` into `(type, bytes)`.
    fn read_at(
        &self,
        start: u64,
        resolve_external: &dyn Fn(&ObjectId) -> Option<(ObjectType, Vec<u8>)>,
    ) -> Result<(ObjectType, Vec<u8>), PackError> {
        // Collect the delta chain innermost-first, then unwind onto the base.
        let mut chain: Vec<Vec<u8>> = Vec::new();
        let mut offset = start;

        for _ in 0..MAX_DELTA_CHAIN_DEPTH {
            let header = parse_entry_header(&self.data, offset, self.algo)?;
            let inflated = self.inflate(header.data_offset, header.size, offset)?;

            match header.entry_type {
                EntryType::OfsDelta { base_offset } => {
                    chain.push(inflated);
                    offset = base_offset;
                }
                EntryType::RefDelta { base_id } => {
                    chain.push(inflated);
                    if let Some(&base_offset) = self.by_id.get(&base_id) {
                        offset = base_offset;
                    } else if let Some((obj_type, base)) = resolve_external(&base_id) {
                        return unwind(obj_type, base, chain);
                    } else {
                        return Err(PackError::MissingBase(base_id));
                    }
                }
                other => {
                    let obj_type = other.to_object_type().expect("non-delta entry");
                    return unwind(obj_type, inflated, chain);
                }
            }
        }

        Err(PackError::DeltaChainTooDeep {
            offset: start,
            max_depth: MAX_DELTA_CHAIN_DEPTH,
        })
    }

    fn inflate(&self, data_offset: u64, size: usize, offset: u64) -> Result<Vec<u8>, PackError> {
        let mut decoder = ZlibDecoder::new(&self.data[data_offset as usize..]);
        let mut out = Vec::with_capacity(size);
        decoder
            .read_to_end(&mut out)
            .map_err(|e| PackError::Decompress { offset, source: e })?;
        if out.len() != size {
            return Err(PackError::InvalidEntry {
                offset,
                reason: format!("inflated size {} does not match declared {size}", out.len()),
            });
        }
        Ok(out)
    }
}

fn unwind(
    obj_type: ObjectType,
    base: Vec<u8>,
    chain: Vec<Vec<u8>>,
) -> Result<(ObjectType, Vec<u8>), PackError> {
    let mut data = base;
    for delta in chain.iter().rev() {
        data = crate::delta::apply_delta(&data, delta)?;
    }
    Ok((obj_type, data))
}
