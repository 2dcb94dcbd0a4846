//! Reading and writing the working tree.

use std::fs;
use std::path::{Path, PathBuf};

use bstr::{BStr, BString, ByteSlice};
use wit_object::FileMode;

use crate::tree::TreeMap;
use crate::{IgnoreSet, RepoError, Repository, META_DIR_NAME};

/// Turn a work-relative byte path into a filesystem path.
#[cfg(unix)]
pub fn rel_to_path(work_dir: &Path, rel: &BStr) -> PathBuf {
    use std::os::unix::ffi::OsStrExt;
    work_dir.join(std::ffi::OsStr::from_bytes(rel.as_bytes()))
}

#[cfg(not(unix))]
pub fn rel_to_path(work_dir: &Path, rel: &BStr) -> PathBuf {
    work_dir.join(String::from_utf8_lossy(rel.as_bytes()).as_ref())
}

/// Normalize a user-supplied path to a work-relative `/`-separated one.
///
/// Rejects absolute paths outside the work tree and any `..` escape.
pub fn normalize_rel(work_dir: &Path, input: &Path) -> Result<BString, RepoError> {
    let rel = if input.is_absolute() {
        input
            .strip_prefix(work_dir)
            .map_err(|_| RepoError::PathOutsideWorkTree(BString::from(input.to_string_lossy().as_bytes())))?
    } else {
        input
    };

    let mut parts: Vec<String> = Vec::new();
    for component in rel.components() {
        use std::path::Component;
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            Component::CurDir => {}
            _ => {
                return Err(RepoError::PathOutsideWorkTree(BString::from(
                    input.to_string_lossy().as_bytes(),
                )))
            }
        }
    }
    if parts.is_empty() || parts[0] == META_DIR_NAME {
        return Err(RepoError::PathOutsideWorkTree(BString::from(
            input.to_string_lossy().as_bytes(),
        )));
    }
    Ok(BString::from(parts.join("/")))
}

impl Repository {
    /// Filesystem path of a work-relative path.
    pub fn work_path(&self, rel: &BStr) -> PathBuf {
        rel_to_path(self.work_dir(), rel)
    }

    /// Read a work-tree file.
    pub fn read_work_file(&self, rel: &BStr) -> Result<Vec<u8>, RepoError> {
        let path = self.work_path(rel);
        if path.is_symlink() {
            let target = fs::read_link(&path).map_err(|e| RepoError::io(&path, e))?;
            return Ok(target.to_string_lossy().into_owned().into_bytes());
        }
        fs::read(&path).map_err(|e| RepoError::io(path, e))
    }

    /// Write blob content to a work-tree path, creating parent directories.
    ///
    /// The executable bit follows the mode; symlink entries become OS
    /// symlinks where supported, else plain files holding the target.
    pub fn write_work_file(
        &self,
        rel: &BStr,
        mode: FileMode,
        content: &[u8],
    ) -> Result<(), RepoError> {
        let path = self.work_path(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| RepoError::io(parent.to_path_buf(), e))?;
        }

        if mode.is_symlink() {
            return write_symlink(&path, content);
        }

        // A stale symlink at the target would redirect the write.
        if path.is_symlink() {
            fs::remove_file(&path).map_err(|e| RepoError::io(&path, e))?;
        }
        fs::write(&path, content).map_err(|e| RepoError::io(&path, e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perm = if mode == FileMode::Executable { 0o755 } else { 0o644 };
            fs::set_permissions(&path, fs::Permissions::from_mode(perm))
                .map_err(|e| RepoError::io(&path, e))?;
        }

        Ok(())
    }

    /// Remove a work-tree file and prune any directories it empties.
    pub fn remove_work_file(&self, rel: &BStr) -> Result<(), RepoError> {
        let path = self.work_path(rel);
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(RepoError::io(path, e)),
        }

        let mut dir = path.parent();
        while let Some(d) = dir {
            if d == self.work_dir() {
                break;
            }
            if fs::remove_dir(d).is_err() {
                break; // not empty (or already gone)
            }
            dir = d.parent();
        }
        Ok(())
    }

    /// Materialize every entry of a flattened tree onto disk.
    pub fn materialize_tree(&self, tree: &TreeMap) -> Result<(), RepoError> {
        for (path, (mode, id)) in tree {
            let blob = self.objects().read_blob(id)?;
            self.write_work_file(path.as_bstr(), *mode, &blob.data)?;
        }
        Ok(())
    }

    /// Replace `current`'s files with `target`'s: write target entries,
    /// delete tracked paths that vanish.
    pub fn update_work_tree(
        &self,
        current: &TreeMap,
        target: &TreeMap,
    ) -> Result<(), RepoError> {
        for (path, (mode, id)) in target {
            let unchanged = current.get(path).is_some_and(|(m, i)| m == mode && i == id);
            if !unchanged || !self.work_path(path.as_bstr()).exists() {
                let blob = self.objects().read_blob(id)?;
                self.write_work_file(path.as_bstr(), *mode, &blob.data)?;
            }
        }
        for path in current.keys() {
            if !target.contains_key(path) {
                self.remove_work_file(path.as_bstr())?;
            }
        }
        Ok(())
    }

    /// All files under the work tree (ignored ones included), sorted,
    /// as work-relative `/`-separated paths. The metadata dir is skipped.
    pub fn list_work_files(&self) -> Result<Vec<BString>, RepoError> {
        let mut out = Vec::new();
        walk_files(self.work_dir(), self.work_dir(), &mut out)?;
        out.sort();
        Ok(out)
    }

    /// The ignore set for this work tree.
    pub fn ignore_set(&self) -> IgnoreSet {
        IgnoreSet::load(self.work_dir())
    }
}

fn write_symlink(path: &Path, target: &[u8]) -> Result<(), RepoError> {
    if path.exists() || path.is_symlink() {
        fs::remove_file(path).map_err(|e| RepoError::io(path.to_path_buf(), e))?;
    }
    #[cfg(unix)]
    {
        use std::os::unix::ffi::OsStrExt;
        let target = std::ffi::OsStr::from_bytes(target);
        std::os::unix::fs::symlink(target, path)
            .map_err(|e| RepoError::io(path.to_path_buf(), e))?;
        Ok(())
    }
    #[cfg(not(unix))]
    {
        fs::write(path, target).map_err(|e| RepoError::io(path.to_path_buf(), e))?;
        Ok(())
    }
}

fn walk_files(work_dir: &Path, dir: &Path, out: &mut Vec<BString>) -> Result<(), RepoError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(RepoError::io(dir.to_path_buf(), e)),
    };

    for entry in entries {
        let entry = entry.map_err(|e| RepoError::io(dir.to_path_buf(), e))?;
        let path = entry.path();
        let name = entry.file_name();
        if dir == work_dir && name.to_str() == Some(META_DIR_NAME) {
            continue;
        }
        let file_type = entry.file_type().map_err(|e| RepoError::io(&path, e))?;
        if file_type.is_dir() {
            walk_files(work_dir, &path, out)?;
        } else {
            let rel = path
                .strip_prefix(work_dir)
                .expect("walked path under work dir");
            let rel = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/");
            out.push(BString::from(rel));
        }
    }
    Ok(())
}
