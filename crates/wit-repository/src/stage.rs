//! Staging files into the index.

use std::path::Path;

use bstr::{BString, ByteSlice};
use serde_json::json;
use wit_index::{Index, IndexEntry, StatCache};
use wit_object::FileMode;

use crate::worktree::normalize_rel;
use crate::{RepoError, Repository};

impl Repository {
    /// Stage one file: hash it into a blob and record it in the index.
    pub fn add(&self, path: impl AsRef<Path>) -> Result<BString, RepoError> {
        let rel = normalize_rel(self.work_dir(), path.as_ref())?;
        let before = self.capture_state()?;

        let mut index = self.index()?;
        let fs_path = self.work_path(rel.as_bstr());
        if !fs_path.exists() && !fs_path.is_symlink() {
            return Err(RepoError::FileNotFound(fs_path));
        }

        let tracked = index.get(rel.as_bstr()).is_some();
        if !tracked && self.ignore_set().is_ignored(rel.as_bstr(), false) {
            return Err(RepoError::IsIgnored(fs_path));
        }

        let previous = snapshot_entries(&index);
        self.stage_file(&mut index, &rel)?;
        index.save()?;

        self.record_operation(
            "add",
            vec![rel.to_string()],
            format!("add {rel}"),
            before,
            Some(json!({ "previous_index": previous })),
        )?;
        Ok(rel)
    }

    /// Stage every change: new and modified files, and deletions of
    /// tracked files that are gone. Returns the number of paths touched.
    pub fn add_all(&self) -> Result<usize, RepoError> {
        let before = self.capture_state()?;
        let mut index = self.index()?;
        let previous = snapshot_entries(&index);
        let ignore = self.ignore_set();
        let mut touched = 0usize;

        for rel in self.list_work_files()? {
            let tracked = index.get(rel.as_bstr()).is_some();
            if !tracked && ignore.is_ignored(rel.as_bstr(), false) {
                continue;
            }
            let had = index.get(rel.as_bstr()).cloned();
            self.stage_file(&mut index, &rel)?;
            if had.as_ref() != index.get(rel.as_bstr()) {
                touched += 1;
            }
        }

        // Stage deletions.
        let missing: Vec<BString> = index
            .entries()
            .iter()
            .map(|e| e.path.clone())
            .filter(|p| {
                let path = self.work_path(p.as_bstr());
                !path.exists() && !path.is_symlink()
            })
            .collect();
        for path in missing {
            index.remove(path.as_bstr());
            touched += 1;
        }

        index.save()?;
        self.record_operation(
            "add",
            vec!["--all".into()],
            format!("add {touched} paths"),
            before,
            Some(json!({ "previous_index": previous })),
        )?;
        Ok(touched)
    }

    /// Remove a path from the index (and optionally from disk).
    pub fn remove(&self, path: impl AsRef<Path>, delete_file: bool) -> Result<(), RepoError> {
        let rel = normalize_rel(self.work_dir(), path.as_ref())?;
        let before = self.capture_state()?;

        let mut index = self.index()?;
        if !index.remove(rel.as_bstr()) {
            return Err(RepoError::FileNotFound(self.work_path(rel.as_bstr())));
        }
        index.save()?;
        if delete_file {
            self.remove_work_file(rel.as_bstr())?;
        }

        self.record_operation(
            "remove",
            vec![rel.to_string()],
            format!("remove {rel}"),
            before,
            None,
        )?;
        Ok(())
    }

    /// Hash one work-tree file into the odb and upsert its index entry.
    fn stage_file(&self, index: &mut Index, rel: &BString) -> Result<(), RepoError> {
        let fs_path = self.work_path(rel.as_bstr());
        let meta = std::fs::symlink_metadata(&fs_path)
            .map_err(|e| RepoError::io(fs_path.clone(), e))?;

        let mode = entry_mode(&meta);
        let content = self.read_work_file(rel.as_bstr())?;
        let id = self
            .objects()
            .write_raw(wit_object::ObjectType::Blob, &content)?;

        index.add(
            IndexEntry::new(rel.clone(), mode, id).with_stat(StatCache::from_metadata(&meta)),
        );
        Ok(())
    }
}

fn entry_mode(meta: &std::fs::Metadata) -> FileMode {
    if meta.file_type().is_symlink() {
        return FileMode::Symlink;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if meta.permissions().mode() & 0o111 != 0 {
            return FileMode::Executable;
        }
    }
    FileMode::Regular
}

/// Entries as a JSON-friendly `[path, mode, id]` list (for undo).
fn snapshot_entries(index: &Index) -> Vec<(String, u32, String)> {
    index
        .entries()
        .iter()
        .map(|e| (e.path.to_string(), e.mode.raw(), e.id.to_hex()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bstr::BStr;

    fn repo() -> (tempfile::TempDir, Repository) {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        (dir, repo)
    }

    #[test]
    fn add_stages_blob_and_entry() {
        let (_dir, repo) = repo();
        repo.write_work_file(BStr::new("f.txt"), FileMode::Regular, b"data\n")
            .unwrap();
        repo.add("f.txt").unwrap();

        let index = repo.index().unwrap();
        let entry = index.get(BStr::new("f.txt")).unwrap();
        assert_eq!(entry.mode, FileMode::Regular);
        assert!(repo.objects().has(&entry.id));
        assert_eq!(repo.objects().read_blob(&entry.id).unwrap().data, b"data\n");
    }

    #[test]
    fn add_missing_file_fails() {
        let (_dir, repo) = repo();
        assert!(matches!(
            repo.add("absent.txt"),
            Err(RepoError::FileNotFound(_))
        ));
    }

    #[test]
    fn add_ignored_file_fails() {
        let (_dir, repo) = repo();
        std::fs::write(repo.work_dir().join(".witignore"), "*.tmp\n").unwrap();
        repo.write_work_file(BStr::new("x.tmp"), FileMode::Regular, b"x")
            .unwrap();
        assert!(matches!(repo.add("x.tmp"), Err(RepoError::IsIgnored(_))));
    }

    #[test]
    fn add_all_stages_everything_including_deletions() {
        let (_dir, repo) = repo();
        repo.write_work_file(BStr::new("a.txt"), FileMode::Regular, b"a")
            .unwrap();
        repo.write_work_file(BStr::new("b.txt"), FileMode::Regular, b"b")
            .unwrap();
        assert_eq!(repo.add_all().unwrap(), 2);
        repo.commit("both", None).unwrap();

        std::fs::remove_file(repo.work_path(BStr::new("a.txt"))).unwrap();
        repo.write_work_file(BStr::new("b.txt"), FileMode::Regular, b"B!")
            .unwrap();
        assert_eq!(repo.add_all().unwrap(), 2);

        let index = repo.index().unwrap();
        assert!(index.get(BStr::new("a.txt")).is_none());
        assert!(index.get(BStr::new("b.txt")).is_some());
    }

    #[test]
    fn remove_unstages() {
        let (_dir, repo) = repo();
        repo.write_work_file(BStr::new("f.txt"), FileMode::Regular, b"x")
            .unwrap();
        repo.add("f.txt").unwrap();
        repo.remove("f.txt", false).unwrap();
        assert!(repo.index().unwrap().is_empty());
        // File still on disk.
        assert!(repo.work_path(BStr::new("f.txt")).exists());
    }

    #[cfg(unix)]
    #[test]
    fn executable_mode_detected() {
        use std::os::unix::fs::PermissionsExt;
        let (_dir, repo) = repo();
        repo.write_work_file(BStr::new("run.sh"), FileMode::Regular, b"#!/bin/sh\n")
            .unwrap();
        let p = repo.work_path(BStr::new("run.sh"));
        std::fs::set_permissions(&p, std::fs::Permissions::from_mode(0o755)).unwrap();
        repo.add("run.sh").unwrap();
        assert_eq!(
            repo.index().unwrap().get(BStr::new("run.sh")).unwrap().mode,
            FileMode::Executable
        );
    }
}
