//! Whole-pack parsing: scan records, then resolve deltas to a fixpoint.

use std::collections::HashMap;
use std::io::Read;

use flate2::bufread::ZlibDecoder;
use wit_hash::{HashAlgorithm, Hasher, ObjectId};
use wit_object::ObjectType;

use crate::entry::{parse_entry_header, EntryType};
use crate::{PackError, PACK_HEADER_SIZE, PACK_SIGNATURE, PACK_VERSION};

/// A fully reconstructed object out of a pack.
#[derive(Debug, Clone)]
pub struct PackedObject {
    pub id: ObjectId,
    pub obj_type: ObjectType,
    pub data: Vec<u8>,
}

/// One scanned record, deltas still unresolved.
pub(crate) struct RawEntry {
    pub offset: u64,
    pub entry_type: EntryType,
    pub data: Vec<u8>,
}

/// Validate the fixed header and return the object count.
pub(crate) fn check_header(data: &[u8]) -> Result<u32, PackError> {
    if data.len() < PACK_HEADER_SIZE {
        return Err(PackError::InvalidHeader("pack too small".into()));
    }
    if &data[0..4] != PACK_SIGNATURE {
        return Err(PackError::InvalidHeader("bad PACK signature".into()));
    }
    let version = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);
    if version != PACK_VERSION {
        return Err(PackError::UnsupportedVersion(version));
    }
    Ok(u32::from_be_bytes([data[8], data[9], data[10], data[11]]))
}

/// Scan all records and verify the trailing checksum.
pub(crate) fn scan_entries(
    data: &[u8],
    algo: HashAlgorithm,
) -> Result<Vec<RawEntry>, PackError> {
    let count = check_header(data)?;

    let digest_len = algo.digest_len();
    if data.len() < PACK_HEADER_SIZE + digest_len {
        return Err(PackError::InvalidHeader("pack too small for checksum".into()));
    }
    let body_end = data.len() - digest_len;

    let expected = &data[body_end..];
    let actual = Hasher::digest(algo, &data[..body_end]);
    if actual.as_bytes() != expected {
        return Err(PackError::ChecksumMismatch {
            expected: wit_hash::hex::hex_to_string(expected),
            actual: actual.to_hex(),
        });
    }

    let mut entries = Vec::with_capacity(count as usize);
    let mut offset = PACK_HEADER_SIZE as u64;

    for _ in 0..count {
        if offset as usize >= body_end {
            return Err(PackError::InvalidEntry {
                offset,
                reason: "record starts past end of pack".into(),
            });
        }
        let header = parse_entry_header(data, offset, algo)?;

        let mut decoder = ZlibDecoder::new(&data[header.data_offset as usize..body_end]);
        let mut inflated = Vec::with_capacity(header.size);
        decoder
            .read_to_end(&mut inflated)
            .map_err(|e| PackError::Decompress { offset, source: e })?;
        if inflated.len() != header.size {
            return Err(PackError::InvalidEntry {
                offset,
                reason: format!(
                    "inflated size {} does not match declared {}",
                    inflated.len(),
                    header.size
                ),
            });
        }

        entries.push(RawEntry {
            offset,
            entry_type: header.entry_type,
            data: inflated,
        });
        offset = header.data_offset + decoder.total_in();
    }

    Ok(entries)
}

/// Resolve deltas breadth-first until every record is materialized.
///
/// `resolve_external` answers REF_DELTA bases that live outside this pack
/// (typically the loose store). Returns `(offset, object)` pairs in pack
/// order.
pub(crate) fn resolve_entries(
    entries: Vec<RawEntry>,
    algo: HashAlgorithm,
    resolve_external: &dyn Fn(&ObjectId) -> Option<(ObjectType, Vec<u8>)>,
) -> Result<Vec<(u64, PackedObject)>, PackError> {
    let total = entries.len();
    let mut resolved: HashMap<u64, (ObjectType, Vec<u8>)> = HashMap::new();
    let mut by_id: HashMap<ObjectId, u64> = HashMap::new();
    let mut order: Vec<(u64, ObjectId)> = Vec::with_capacity(total);
    let mut pending: Vec<RawEntry> = Vec::new();

    // First pass: everything that is not a delta.
    for entry in entries {
        match entry.entry_type {
            EntryType::OfsDelta { .. } | EntryType::RefDelta { .. } => pending.push(entry),
            other => {
                let obj_type = other.to_object_type().expect("non-delta entry");
                let id = hash_object(algo, obj_type, &entry.data);
                by_id.insert(id, entry.offset);
                order.push((entry.offset, id));
                resolved.insert(entry.offset, (obj_type, entry.data));
            }
        }
    }

    // Delta passes: keep going while at least one entry resolves.
    while !pending.is_empty() {
        let mut next_round = Vec::with_capacity(pending.len());
        let mut progressed = false;

        for entry in pending {
            let base = match entry.entry_type {
                EntryType::OfsDelta { base_offset } => {
                    resolved.get(&base_offset).cloned()
                }
                EntryType::RefDelta { base_id } => match by_id.get(&base_id) {
                    Some(offset) => resolved.get(offset).cloned(),
                    None => resolve_external(&base_id),
                },
                _ => unreachable!("only deltas are pending"),
            };

            match base {
                Some((obj_type, base_data)) => {
                    let data = crate::delta::apply_delta(&base_data, &entry.data)?;
                    let id = hash_object(algo, obj_type, &data);
                    by_id.insert(id, entry.offset);
                    order.push((entry.offset, id));
                    resolved.insert(entry.offset, (obj_type, data));
                    progressed = true;
                }
                None => next_round.push(entry),
            }
        }

        if !progressed {
            // Nothing left can resolve; report the first missing base.
            let entry = &next_round[0];
            return Err(match entry.entry_type {
                EntryType::RefDelta { base_id } => PackError::MissingBase(base_id),
                _ => PackError::InvalidEntry {
                    offset: entry.offset,
                    reason: "unresolvable delta chain".into(),
                },
            });
        }
        pending = next_round;
    }

    order.sort_by_key(|(offset, _)| *offset);
    let mut out = Vec::with_capacity(total);
    for (offset, id) in order {
        let (obj_type, data) = resolved
            .remove(&offset)
            .expect("resolved entry for recorded offset");
        out.push((offset, PackedObject { id, obj_type, data }));
    }
    Ok(out)
}

/// Parse a complete pack byte stream into reconstructed objects.
pub fn parse_pack(
    data: &[u8],
    algo: HashAlgorithm,
    resolve_external: &dyn Fn(&ObjectId) -> Option<(ObjectType, Vec<u8>)>,
) -> Result<Vec<PackedObject>, PackError> {
    let entries = scan_entries(data, algo)?;
    let resolved = resolve_entries(entries, algo, resolve_external)?;
    Ok(resolved.into_iter().map(|(_, obj)| obj).collect())
}

fn hash_object(algo: HashAlgorithm, obj_type: ObjectType, data: &[u8]) -> ObjectId {
    Hasher::hash_object(algo, obj_type.as_str(), data)
}


#[cfg(test)]
mod tests {
    use super::testutil::*;
    use super::*;

    fn no_external(_: &ObjectId) -> Option<(ObjectType, Vec<u8>)> {
        None
    }

    #[test]
    fn parse_simple_pack() {
        let pack = build_pack(&[
            (ObjectType::Blob, b"hello world\n"),
            (ObjectType::Blob, b"second blob"),
        ]);
        let objects = parse_pack(&pack, HashAlgorithm::Sha1, &no_external).unwrap();
        assert_eq!(objects.len(), 2);
        assert_eq!(objects[0].data, b"hello world\n");
        assert_eq!(
            objects[0].id.to_hex(),
            "3b18e512dba79e4c8300dd08aeb37f8e728b8dad"
        );
    }

    #[test]
    fn corrupted_checksum_rejected() {
        let mut pack = build_pack(&[(ObjectType::Blob, b"data")]);
        let last = pack.len() - 1;
        pack[last] ^= 0xff;
        assert!(matches!(
            parse_pack(&pack, HashAlgorithm::Sha1, &no_external),
            Err(PackError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn bad_signature_rejected() {
        let mut pack = build_pack(&[(ObjectType::Blob, b"data")]);
        pack[0] = b'J';
        assert!(matches!(
            parse_pack(&pack, HashAlgorithm::Sha1, &no_external),
            Err(PackError::InvalidHeader(_))
        ));
    }

    #[test]
    fn ref_delta_resolves_against_in_pack_base() {
        let base: &[u8] = b"the base object content";
        let base_id = Hasher::hash_object(HashAlgorithm::Sha1, "blob", base);
        let delta = delta_stream(base.len(), b"rebuilt");

        let pack = build_pack_raw(vec![
            (3, Vec::new(), base.to_vec()),
            (7, base_id.as_bytes().to_vec(), delta),
        ]);
        let objects = parse_pack(&pack, HashAlgorithm::Sha1, &no_external).unwrap();
        assert_eq!(objects.len(), 2);
        assert_eq!(objects[1].data, b"rebuilt");
        assert_eq!(objects[1].obj_type, ObjectType::Blob);
    }

    #[test]
    fn ref_delta_missing_base_names_the_hash() {
        let missing =
            ObjectId::from_hex("00000000000000000000000000000000000000aa").unwrap();
        let delta = delta_stream(5, b"x");
        let pack = build_pack_raw(vec![(7, missing.as_bytes().to_vec(), delta)]);
        match parse_pack(&pack, HashAlgorithm::Sha1, &no_external) {
            Err(PackError::MissingBase(id)) => assert_eq!(id, missing),
            other => panic!("expected MissingBase, got {other:?}"),
        }
    }

    #[test]
    fn ref_delta_resolves_through_external_store() {
        let base: &[u8] = b"loose base";
        let base_id = Hasher::hash_object(HashAlgorithm::Sha1, "blob", base);
        let delta = delta_stream(base.len(), b"from loose");
        let pack = build_pack_raw(vec![(7, base_id.as_bytes().to_vec(), delta)]);

        let external = move |id: &ObjectId| {
            (*id == base_id).then(|| (ObjectType::Blob, base.to_vec()))
        };
        let objects = parse_pack(&pack, HashAlgorithm::Sha1, &external).unwrap();
        assert_eq!(objects[0].data, b"from loose");
    }

    #[test]
    fn ofs_delta_resolves_by_offset() {
        // Build manually so we know the base's offset (12, right after the header).
        let base: &[u8] = b"offset base bytes";
        let delta = delta_stream(base.len(), b"target!");

        // First record: blob at offset 12.
        let mut pack = Vec::new();
        pack.extend_from_slice(b"PACK");
        pack.extend_from_slice(&2u32.to_be_bytes());
        pack.extend_from_slice(&2u32.to_be_bytes());
        pack.extend_from_slice(&entry_header(3, base.len()));
        {
            use flate2::write::ZlibEncoder;
            use flate2::Compression;
            use std::io::Write;
            let mut enc = ZlibEncoder::new(&mut pack, Compression::default());
            enc.write_all(base).unwrap();
            enc.finish().unwrap();
        }
        let delta_offset = pack.len() as u64;
        let distance = delta_offset - 12;
        assert!(distance < 0x80, "test assumes single-byte distance");
        pack.extend_from_slice(&entry_header(6, delta.len()));
        pack.push(distance as u8);
        {
            use flate2::write::ZlibEncoder;
            use flate2::Compression;
            use std::io::Write;
            let mut enc = ZlibEncoder::new(&mut pack, Compression::default());
            enc.write_all(&delta).unwrap();
            enc.finish().unwrap();
        }
        let checksum = Hasher::digest(HashAlgorithm::Sha1, &pack);
        pack.extend_from_slice(checksum.as_bytes());

        let objects = parse_pack(&pack, HashAlgorithm::Sha1, &no_external).unwrap();
        assert_eq!(objects.len(), 2);
        assert_eq!(objects[1].data, b"target!");
    }
}
