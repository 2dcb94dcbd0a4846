//! One-object-per-file storage, zlib-compressed, fanned out by hex prefix.

use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use wit_hash::{HashAlgorithm, Hasher, ObjectId};
use wit_object::{header, ObjectType};

use crate::OdbError;

/// The loose half of the object database.
#[derive(Debug)]
pub struct LooseStore {
    objects_dir: PathBuf,
    algo: HashAlgorithm,
}

impl LooseStore {
    pub fn new(objects_dir: impl Into<PathBuf>, algo: HashAlgorithm) -> Self {
        Self {
            objects_dir: objects_dir.into(),
            algo,
        }
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algo
    }

    /// Path of the file an object would live at: `objects/xx/rest`.
    pub fn object_path(&self, id: &ObjectId) -> PathBuf {
        self.objects_dir.join(id.loose_path())
    }

    pub fn contains(&self, id: &ObjectId) -> bool {
        self.object_path(id).is_file()
    }

    /// Read and validate an object, returning `(type, body)`.
    ///
    /// `Ok(None)` when absent; `Corrupt` when inflate fails, the header is
    /// malformed, or the declared length does not match the body.
    pub fn read(&self, id: &ObjectId) -> Result<Option<(ObjectType, Vec<u8>)>, OdbError> {
        let path = self.object_path(id);
        let compressed = match fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(OdbError::io(path, e)),
        };

        let mut decoder = ZlibDecoder::new(&compressed[..]);
        let mut raw = Vec::new();
        decoder.read_to_end(&mut raw).map_err(|e| OdbError::Corrupt {
            id: *id,
            reason: format!("zlib inflate failed: {e}"),
        })?;

        let (obj_type, body_size, header_len) =
            header::parse_header(&raw).map_err(|e| OdbError::Corrupt {
                id: *id,
                reason: e.to_string(),
            })?;
        let body = &raw[header_len..];
        if body.len() != body_size {
            return Err(OdbError::Corrupt {
                id: *id,
                reason: format!(
                    "declared length {body_size} does not match body length {}",
                    body.len()
                ),
            });
        }

        Ok(Some((obj_type, body.to_vec())))
    }

    /// Write raw body bytes with a known type. Idempotent; returns the id.
    ///
    /// The compressed object is written to a temp file in the objects
    /// directory and renamed into place; losing the rename race to another
    /// writer of the same content is success.
    pub fn write_raw(&self, obj_type: ObjectType, body: &[u8]) -> Result<ObjectId, OdbError> {
        let id = Hasher::hash_object(self.algo, obj_type.as_str(), body);

        if self.contains(&id) {
            return Ok(id);
        }

        let final_path = self.object_path(&id);
        if let Some(parent) = final_path.parent() {
            fs::create_dir_all(parent).map_err(|e| OdbError::io(parent.to_path_buf(), e))?;
        }

        let hdr = header::write_header(obj_type, body.len());
        let tmp_path = self.write_to_temp(&hdr, body)?;

        match fs::rename(&tmp_path, &final_path) {
            Ok(()) => Ok(id),
            Err(_) if final_path.exists() => {
                // Another writer produced the identical object first.
                let _ = fs::remove_file(&tmp_path);
                Ok(id)
            }
            Err(e) => {
                let _ = fs::remove_file(&tmp_path);
                Err(OdbError::io(final_path, e))
            }
        }
    }

    fn write_to_temp(&self, hdr: &[u8], body: &[u8]) -> Result<PathBuf, OdbError> {
        let nonce = std::process::id() as u64
            ^ std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .subsec_nanos() as u64;
        let tmp_path = self.objects_dir.join(format!("tmp_obj_{nonce:x}"));

        let result = (|| -> std::io::Result<()> {
            let file = fs::File::create(&tmp_path)?;
            let mut encoder = ZlibEncoder::new(file, Compression::default());
            encoder.write_all(hdr)?;
            encoder.write_all(body)?;
            encoder.finish()?;
            Ok(())
        })();

        match result {
            Ok(()) => Ok(tmp_path),
            Err(e) => {
                let _ = fs::remove_file(&tmp_path);
                Err(OdbError::io(tmp_path, e))
            }
        }
    }

    /// Enumerate every loose object id.
    pub fn enumerate(&self) -> Result<Vec<ObjectId>, OdbError> {
        let mut ids = Vec::new();
        let entries = match fs::read_dir(&self.objects_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(ids),
            Err(e) => return Err(OdbError::io(self.objects_dir.clone(), e)),
        };

        for entry in entries {
            let entry = entry.map_err(|e| OdbError::io(self.objects_dir.clone(), e))?;
            let fan = entry.file_name();
            let Some(fan) = fan.to_str() else { continue };
            if fan.len() != 2 || !fan.bytes().all(|b| b.is_ascii_hexdigit()) {
                continue;
            }
            let subdir = entry.path();
            for file in fs::read_dir(&subdir).map_err(|e| OdbError::io(subdir.clone(), e))? {
                let file = file.map_err(|e| OdbError::io(subdir.clone(), e))?;
                let Some(rest) = file.file_name().to_str().map(str::to_owned) else {
                    continue;
                };
                let hex = format!("{fan}{rest}");
                if hex.len() == self.algo.hex_len() {
                    if let Ok(id) = ObjectId::from_hex(&hex) {
                        ids.push(id);
                    }
                }
            }
        }
        Ok(ids)
    }

    /// Enumerate ids under one fan-out directory (for prefix lookup).
    pub fn enumerate_fanout(&self, fan: &str) -> Result<Vec<ObjectId>, OdbError> {
        let subdir = self.objects_dir.join(fan);
        let mut ids = Vec::new();
        let entries = match fs::read_dir(&subdir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(ids),
            Err(e) => return Err(OdbError::io(subdir, e)),
        };
        for file in entries {
            let file = file.map_err(|e| OdbError::io(subdir.clone(), e))?;
            let Some(rest) = file.file_name().to_str().map(str::to_owned) else {
                continue;
            };
            let hex = format!("{fan}{rest}");
            if hex.len() == self.algo.hex_len() {
                if let Ok(id) = ObjectId::from_hex(&hex) {
                    ids.push(id);
                }
            }
        }
        Ok(ids)
    }
}
