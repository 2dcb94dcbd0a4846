//! Loose refs: one file per ref under the metadata directory.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use wit_hash::ObjectId;
use wit_utils::LockFile;

use crate::name::RefName;
use crate::{RefError, RefTarget};

/// Filesystem path of a ref inside the metadata dir.
pub(crate) fn ref_path(meta_dir: &Path, name: &RefName) -> PathBuf {
    meta_dir.join(name.as_str())
}

/// Parse ref file contents: `ref: <target>\n` or a bare hex id.
pub(crate) fn parse_target(data: &[u8], name: &RefName) -> Result<RefTarget, RefError> {
    let text = std::str::from_utf8(data)
        .map_err(|_| RefError::Parse(format!("non-UTF-8 ref file for {name}")))?
        .trim();

    if let Some(target) = text.strip_prefix("ref:") {
        let target = RefName::new(target.trim())?;
        return Ok(RefTarget::Symbolic(target));
    }

    let id = ObjectId::from_hex(text)
        .map_err(|_| RefError::Parse(format!("bad object id in ref {name}: {text:?}")))?;
    Ok(RefTarget::Direct(id))
}

/// Serialize a ref target for a loose file (always newline-terminated).
pub(crate) fn format_target(target: &RefTarget) -> String {
    match target {
        RefTarget::Direct(id) => format!("{}\n", id.to_hex()),
        RefTarget::Symbolic(name) => format!("ref: {name}\n"),
    }
}

/// Read a loose ref. `Ok(None)` when the file does not exist.
pub(crate) fn read(meta_dir: &Path, name: &RefName) -> Result<Option<RefTarget>, RefError> {
    let path = ref_path(meta_dir, name);
    let data = match fs::read(&path) {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(RefError::io(path, e)),
    };
    parse_target(&data, name).map(Some)
}

/// Write a loose ref under its lock file.
pub(crate) fn write(meta_dir: &Path, name: &RefName, target: &RefTarget) -> Result<(), RefError> {
    let path = ref_path(meta_dir, name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| RefError::io(parent.to_path_buf(), e))?;
    }
    let mut lock = LockFile::acquire(&path)?;
    lock.write_all(format_target(target).as_bytes())
        .map_err(|e| RefError::io(&path, e))?;
    lock.commit()?;
    Ok(())
}

/// Remove a loose ref file. Returns whether it existed.
pub(crate) fn delete(meta_dir: &Path, name: &RefName) -> Result<bool, RefError> {
    let path = ref_path(meta_dir, name);
    match fs::remove_file(&path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(RefError::io(path, e)),
    }
}

/// List all loose refs under a category prefix (e.g. `refs/heads`).
pub(crate) fn list(meta_dir: &Path, prefix: &str) -> Result<Vec<RefName>, RefError> {
    let root = meta_dir.join(prefix);
    let mut out = Vec::new();
    walk(&root, prefix, &mut out)?;
    out.sort();
    Ok(out)
}

fn walk(dir: &Path, prefix: &str, out: &mut Vec<RefName>) -> Result<(), RefError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(RefError::io(dir.to_path_buf(), e)),
    };

    for entry in entries {
        let entry = entry.map_err(|e| RefError::io(dir.to_path_buf(), e))?;
        let Some(file_name) = entry.file_name().to_str().map(str::to_owned) else {
            continue;
        };
        if file_name.ends_with(".lock") {
            continue;
        }
        let child = format!("{prefix}/{file_name}");
        let file_type = entry
            .file_type()
            .map_err(|e| RefError::io(entry.path(), e))?;
        if file_type.is_dir() {
            walk(&entry.path(), &child, out)?;
        } else if let Ok(name) = RefName::new(child) {
            out.push(name);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_ref_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let name = RefName::branch("main").unwrap();
        let id = ObjectId::from_hex("2aae6c35c94fcfb415dbe95f408b9ce91ee846ed").unwrap();

        write(dir.path(), &name, &RefTarget::Direct(id)).unwrap();
        let data = fs::read(dir.path().join("refs/heads/main")).unwrap();
        assert_eq!(data, b"2aae6c35c94fcfb415dbe95f408b9ce91ee846ed\n");

        assert_eq!(
            read(dir.path(), &name).unwrap(),
            Some(RefTarget::Direct(id))
        );
    }

    #[test]
    fn symbolic_ref_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let head = RefName::head();
        let target = RefName::branch("main").unwrap();

        write(dir.path(), &head, &RefTarget::Symbolic(target.clone())).unwrap();
        let data = fs::read(dir.path().join("HEAD")).unwrap();
        assert_eq!(data, b"ref: refs/heads/main\n");

        assert_eq!(
            read(dir.path(), &head).unwrap(),
            Some(RefTarget::Symbolic(target))
        );
    }

    #[test]
    fn missing_ref_reads_none() {
        let dir = tempfile::tempdir().unwrap();
        let name = RefName::branch("absent").unwrap();
        assert_eq!(read(dir.path(), &name).unwrap(), None);
    }

    #[test]
    fn held_lock_blocks_write() {
        let dir = tempfile::tempdir().unwrap();
        let name = RefName::branch("main").unwrap();
        fs::create_dir_all(dir.path().join("refs/heads")).unwrap();
        let _held = LockFile::acquire(dir.path().join("refs/heads/main")).unwrap();

        let id = ObjectId::NULL_SHA1;
        assert!(matches!(
            write(dir.path(), &name, &RefTarget::Direct(id)),
            Err(RefError::Locked { .. })
        ));
    }

    #[test]
    fn delete_reports_existence() {
        let dir = tempfile::tempdir().unwrap();
        let name = RefName::branch("gone").unwrap();
        write(dir.path(), &name, &RefTarget::Direct(ObjectId::NULL_SHA1)).unwrap();
        assert!(delete(dir.path(), &name).unwrap());
        assert!(!delete(dir.path(), &name).unwrap());
    }

    #[test]
    fn list_walks_nested_dirs() {
        let dir = tempfile::tempdir().unwrap();
        for short in ["main", "feature/one", "feature/two"] {
            let name = RefName::branch(short).unwrap();
            write(dir.path(), &name, &RefTarget::Direct(ObjectId::NULL_SHA1)).unwrap();
        }
        let names = list(dir.path(), "refs/heads").unwrap();
        let shorts: Vec<&str> = names.iter().map(|n| n.shorten()).collect();
        assert_eq!(shorts, vec!["feature/one", "feature/two", "main"]);
    }

    #[test]
    fn garbage_contents_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let name = RefName::branch("bad").unwrap();
        fs::create_dir_all(dir.path().join("refs/heads")).unwrap();
        fs::write(dir.path().join("refs/heads/bad"), b"not a hash\n").unwrap();
        assert!(matches!(
            read(dir.path(), &name),
            Err(RefError::Parse(_))
        ));
    }
}
