//! The repository-facing reference store.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use wit_hash::ObjectId;

use crate::name::{RefName, HEADS_PREFIX, REMOTES_PREFIX, TAGS_PREFIX};
use crate::{loose, packed::PackedRefs, Head, RefError, RefTarget};

/// How far a symbolic ref chain is followed before giving up.
const MAX_SYMREF_DEPTH: usize = 5;

/// Outcome of a `pack_refs` maintenance run.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct PackRefsReport {
    /// Refs now present in `packed-refs`.
    pub packed: usize,
    /// Loose files removed (prune mode).
    pub pruned: usize,
    /// Refs skipped with the reason.
    pub errors: Vec<String>,
}

/// Loose + packed reference storage under one metadata directory.
///
/// The parsed `packed-refs` file is cached; every mutation through this
/// store invalidates the cache.
pub struct RefStore {
    meta_dir: PathBuf,
    packed_cache: Mutex<Option<PackedRefs>>,
}

impl RefStore {
    pub fn new(meta_dir: impl Into<PathBuf>) -> Self {
        Self {
            meta_dir: meta_dir.into(),
            packed_cache: Mutex::new(None),
        }
    }

    pub fn meta_dir(&self) -> &Path {
        &self.meta_dir
    }

    // ---- reading -------------------------------------------------------

    /// Read a ref without following symbolic targets.
    ///
    /// Loose storage wins over packed.
    pub fn read(&self, name: &RefName) -> Result<Option<RefTarget>, RefError> {
        if let Some(target) = loose::read(&self.meta_dir, name)? {
            return Ok(Some(target));
        }
        let found = self.with_packed(|packed| packed.find(name).map(|pr| pr.id))?;
        Ok(found.map(RefTarget::Direct))
    }

    /// Resolve a ref to an object id, following symbolic refs.
    ///
    /// `Ok(None)` for an unborn branch (HEAD points at a branch with no
    /// ref yet) or an absent ref.
    pub fn resolve(&self, name: &RefName) -> Result<Option<ObjectId>, RefError> {
        let mut current = name.clone();
        for _ in 0..MAX_SYMREF_DEPTH {
            match self.read(&current)? {
                Some(RefTarget::Direct(id)) => return Ok(Some(id)),
                Some(RefTarget::Symbolic(next)) => current = next,
                None => return Ok(None),
            }
        }
        Err(RefError::SymrefLoop(name.to_string()))
    }

    /// The state of HEAD. A missing HEAD file is a corrupt repository.
    pub fn head(&self) -> Result<Head, RefError> {
        match loose::read(&self.meta_dir, &RefName::head())? {
            Some(RefTarget::Symbolic(name)) => Ok(Head::OnBranch(name)),
            Some(RefTarget::Direct(id)) => Ok(Head::Detached(id)),
            None => Err(RefError::NotFound("HEAD".into())),
        }
    }

    /// Short name of the current branch; `None` when detached.
    pub fn current_branch(&self) -> Result<Option<String>, RefError> {
        match self.head()? {
            Head::OnBranch(name) => Ok(Some(name.shorten().to_string())),
            Head::Detached(_) => Ok(None),
        }
    }

    /// Resolve a short name in the standard order: exact (full name or
    /// HEAD), then heads, tags, remotes. Hash-prefix fallback is layered on
    /// by the repository facade, which owns the object store.
    pub fn resolve_short(&self, short: &str) -> Result<Option<(RefName, ObjectId)>, RefError> {
        let mut candidates: Vec<RefName> = Vec::new();
        if short == "HEAD" || short.starts_with("refs/") {
            if let Ok(name) = RefName::new(short) {
                candidates.push(name);
            }
        }
        let categories: [fn(&str) -> Result<RefName, RefError>; 2] =
            [RefName::branch, RefName::tag];
        for make in categories {
            if let Ok(name) = make(short) {
                candidates.push(name);
            }
        }
        if let Ok(name) = RefName::new(format!("{REMOTES_PREFIX}{short}")) {
            candidates.push(name);
        }

        for name in candidates {
            if let Some(id) = self.resolve(&name)? {
                return Ok(Some((name, id)));
            }
        }
        Ok(None)
    }

    /// Union of loose and packed branches, deduplicated and sorted.
    pub fn list_branches(&self) -> Result<Vec<RefName>, RefError> {
        self.list_prefix(HEADS_PREFIX)
    }

    /// Union of loose and packed tags, deduplicated and sorted.
    pub fn list_tags(&self) -> Result<Vec<RefName>, RefError> {
        self.list_prefix(TAGS_PREFIX)
    }

    fn list_prefix(&self, prefix: &str) -> Result<Vec<RefName>, RefError> {
        let trimmed = prefix.trim_end_matches('/');
        let mut names = loose::list(&self.meta_dir, trimmed)?;
        self.with_packed(|packed| {
            for pr in packed.refs() {
                if pr.name.as_str().starts_with(prefix) {
                    names.push(pr.name.clone());
                }
            }
        })?;
        names.sort();
        names.dedup();
        Ok(names)
    }

    /// The peeled target of an annotated tag ref, if recorded or derivable
    /// from packed-refs. Tag-object chasing through the odb lives in the
    /// repository facade.
    pub fn get_peeled_ref(&self, name: &RefName) -> Result<Option<ObjectId>, RefError> {
        self.with_packed(|packed| packed.find(name).and_then(|pr| pr.peeled))
    }

    // ---- writing -------------------------------------------------------

    /// Create a ref that must not already exist.
    pub fn create(&self, name: &RefName, id: ObjectId) -> Result<(), RefError> {
        if self.read(name)?.is_some() {
            return Err(RefError::AlreadyExists(name.to_string()));
        }
        self.update(name, id)
    }

    /// Write a direct ref (loose), shadowing any packed entry.
    pub fn update(&self, name: &RefName, id: ObjectId) -> Result<(), RefError> {
        loose::write(&self.meta_dir, name, &RefTarget::Direct(id))?;
        self.invalidate_cache();
        Ok(())
    }

    /// Write a symbolic ref.
    pub fn update_symbolic(&self, name: &RefName, target: &RefName) -> Result<(), RefError> {
        loose::write(
            &self.meta_dir,
            name,
            &RefTarget::Symbolic(target.clone()),
        )?;
        self.invalidate_cache();
        Ok(())
    }

    /// Delete a ref from both loose and packed storage.
    pub fn delete(&self, name: &RefName) -> Result<(), RefError> {
        let loose_existed = loose::delete(&self.meta_dir, name)?;
        let packed_existed = self.remove_from_packed_refs(name)?;
        if !loose_existed && !packed_existed {
            return Err(RefError::NotFound(name.to_string()));
        }
        Ok(())
    }

    /// Point HEAD at a branch.
    pub fn set_head_symbolic(&self, target: &RefName) -> Result<(), RefError> {
        loose::write(
            &self.meta_dir,
            &RefName::head(),
            &RefTarget::Symbolic(target.clone()),
        )?;
        Ok(())
    }

    /// Detach HEAD at a commit.
    pub fn set_head_detached(&self, id: ObjectId) -> Result<(), RefError> {
        loose::write(&self.meta_dir, &RefName::head(), &RefTarget::Direct(id))?;
        Ok(())
    }

    // ---- packed-refs maintenance --------------------------------------

    /// Read packed-refs through the cache.
    pub fn read_packed_refs(&self) -> Result<PackedRefs, RefError> {
        self.with_packed(|packed| packed.clone())
    }

    fn with_packed<T>(&self, f: impl FnOnce(&PackedRefs) -> T) -> Result<T, RefError> {
        let mut cache = self.packed_cache.lock().expect("packed-refs cache lock");
        if cache.is_none() {
            *cache = Some(PackedRefs::load(&self.meta_dir)?);
        }
        Ok(f(cache.as_ref().expect("cache populated above")))
    }

    pub fn invalidate_cache(&self) {
        *self.packed_cache.lock().expect("packed-refs cache lock") = None;
    }

    /// Fold every loose ref into `packed-refs`; with `prune`, remove the
    /// loose files afterwards.
    pub fn pack_refs(&self, prune: bool) -> Result<PackRefsReport, RefError> {
        let mut report = PackRefsReport::default();
        let mut packed = PackedRefs::load(&self.meta_dir)?;

        let mut loose_names = Vec::new();
        for prefix in ["refs/heads", "refs/tags", "refs/remotes"] {
            loose_names.extend(loose::list(&self.meta_dir, prefix)?);
        }

        for name in &loose_names {
            match loose::read(&self.meta_dir, name)? {
                Some(RefTarget::Direct(id)) => {
                    let peeled = packed.find(name).and_then(|pr| pr.peeled);
                    packed.upsert(name.clone(), id, peeled);
                }
                Some(RefTarget::Symbolic(_)) => {
                    report
                        .errors
                        .push(format!("{name}: symbolic refs are not packed"));
                }
                None => {}
            }
        }

        packed.write(&self.meta_dir)?;
        report.packed = packed.refs().len();
        self.invalidate_cache();

        if prune {
            for name in &loose_names {
                if packed.find(name).is_some() && loose::delete(&self.meta_dir, name)? {
                    report.pruned += 1;
                }
            }
        }

        Ok(report)
    }

    /// Rewrite `packed-refs` without the named ref.
    ///
    /// Returns whether it was present; deletes the file when it empties.
    pub fn remove_from_packed_refs(&self, name: &RefName) -> Result<bool, RefError> {
        let mut packed = PackedRefs::load(&self.meta_dir)?;
        let removed = packed.remove(name);
        if removed {
            packed.write(&self.meta_dir)?;
            self.invalidate_cache();
        }
        Ok(removed)
    }
}

impl std::fmt::Debug for RefStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefStore")
            .field("meta_dir", &self.meta_dir)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const H1: &str = "1111111111111111111111111111111111111111";
    const H2: &str = "2222222222222222222222222222222222222222";

    fn store() -> (tempfile::TempDir, RefStore) {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("refs/heads")).unwrap();
        fs::create_dir_all(dir.path().join("refs/tags")).unwrap();
        let store = RefStore::new(dir.path());
        store
            .set_head_symbolic(&RefName::branch("main").unwrap())
            .unwrap();
        (dir, store)
    }

    fn oid(hex: &str) -> ObjectId {
        ObjectId::from_hex(hex).unwrap()
    }

    #[test]
    fn create_resolve_delete() {
        let (_dir, store) = store();
        let main = RefName::branch("main").unwrap();
        store.create(&main, oid(H1)).unwrap();
        assert_eq!(store.resolve(&main).unwrap(), Some(oid(H1)));

        assert!(matches!(
            store.create(&main, oid(H2)),
            Err(RefError::AlreadyExists(_))
        ));

        store.delete(&main).unwrap();
        assert_eq!(store.resolve(&main).unwrap(), None);
        assert!(matches!(store.delete(&main), Err(RefError::NotFound(_))));
    }

    #[test]
    fn head_follows_branch() {
        let (_dir, store) = store();
        let main = RefName::branch("main").unwrap();

        // Unborn branch: HEAD is symbolic but resolves to nothing.
        assert_eq!(store.head().unwrap(), Head::OnBranch(main.clone()));
        assert_eq!(store.resolve(&RefName::head()).unwrap(), None);
        assert_eq!(store.current_branch().unwrap(), Some("main".into()));

        store.update(&main, oid(H1)).unwrap();
        assert_eq!(store.resolve(&RefName::head()).unwrap(), Some(oid(H1)));

        store.set_head_detached(oid(H2)).unwrap();
        assert!(store.head().unwrap().is_detached());
        assert_eq!(store.current_branch().unwrap(), None);
        assert_eq!(store.resolve(&RefName::head()).unwrap(), Some(oid(H2)));
    }

    #[test]
    fn loose_wins_over_packed() {
        let (dir, store) = store();
        let main = RefName::branch("main").unwrap();

        fs::write(
            dir.path().join("packed-refs"),
            format!("# pack-refs with: peeled fully-peeled sorted\n{H2} refs/heads/main\n"),
        )
        .unwrap();
        store.invalidate_cache();

        // Packed only.
        assert_eq!(store.resolve(&main).unwrap(), Some(oid(H2)));

        // Loose shadows packed.
        store.update(&main, oid(H1)).unwrap();
        assert_eq!(store.resolve(&main).unwrap(), Some(oid(H1)));

        // Removing the loose file reveals the packed value again.
        fs::remove_file(dir.path().join("refs/heads/main")).unwrap();
        store.invalidate_cache();
        assert_eq!(store.resolve(&main).unwrap(), Some(oid(H2)));
    }

    #[test]
    fn list_unions_and_dedups() {
        let (dir, store) = store();
        store
            .update(&RefName::branch("alpha").unwrap(), oid(H1))
            .unwrap();
        store
            .update(&RefName::branch("beta").unwrap(), oid(H1))
            .unwrap();
        fs::write(
            dir.path().join("packed-refs"),
            format!(
                "# pack-refs with: peeled fully-peeled sorted\n\
                 {H2} refs/heads/beta\n{H2} refs/heads/gamma\n{H2} refs/tags/v1\n"
            ),
        )
        .unwrap();
        store.invalidate_cache();

        let names = store.list_branches().unwrap();
        let shorts: Vec<&str> = names.iter().map(|n| n.shorten()).collect();
        assert_eq!(shorts, vec!["alpha", "beta", "gamma"]);

        let tags = store.list_tags().unwrap();
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].shorten(), "v1");
    }

    #[test]
    fn resolve_short_order() {
        let (_dir, store) = store();
        // A tag and a branch with the same short name: the branch wins.
        store
            .update(&RefName::branch("release").unwrap(), oid(H1))
            .unwrap();
        store
            .update(&RefName::tag("release").unwrap(), oid(H2))
            .unwrap();

        let (name, id) = store.resolve_short("release").unwrap().unwrap();
        assert!(name.is_branch());
        assert_eq!(id, oid(H1));

        // Tag resolves by full name.
        let (name, id) = store.resolve_short("refs/tags/release").unwrap().unwrap();
        assert!(name.is_tag());
        assert_eq!(id, oid(H2));

        assert!(store.resolve_short("absent").unwrap().is_none());
    }

    #[test]
    fn pack_refs_moves_loose_entries() {
        let (dir, store) = store();
        store
            .update(&RefName::branch("main").unwrap(), oid(H1))
            .unwrap();
        store
            .update(&RefName::tag("v1").unwrap(), oid(H2))
            .unwrap();

        let before_branches = store.list_branches().unwrap();
        let before_tags = store.list_tags().unwrap();

        let report = store.pack_refs(true).unwrap();
        assert_eq!(report.packed, 2);
        assert_eq!(report.pruned, 2);
        assert!(report.errors.is_empty());

        // Loose files gone, resolution and listings unchanged.
        assert!(!dir.path().join("refs/heads/main").exists());
        assert_eq!(
            store.resolve(&RefName::branch("main").unwrap()).unwrap(),
            Some(oid(H1))
        );
        assert_eq!(store.list_branches().unwrap(), before_branches);
        assert_eq!(store.list_tags().unwrap(), before_tags);
    }

    #[test]
    fn remove_from_packed_refs_rewrites_file() {
        let (dir, store) = store();
        store
            .update(&RefName::branch("main").unwrap(), oid(H1))
            .unwrap();
        store.pack_refs(true).unwrap();
        assert!(dir.path().join("packed-refs").exists());

        assert!(store
            .remove_from_packed_refs(&RefName::branch("main").unwrap())
            .unwrap());
        // Last entry removed: the file disappears with it.
        assert!(!dir.path().join("packed-refs").exists());
        assert!(!store
            .remove_from_packed_refs(&RefName::branch("main").unwrap())
            .unwrap());
    }

    #[test]
    fn symref_loop_detected() {
        let (dir, store) = store();
        // a -> b -> a, reachable from a.
        fs::write(dir.path().join("refs/heads/a"), "ref: refs/heads/b\n").unwrap();
        fs::write(dir.path().join("refs/heads/b"), "ref: refs/heads/a\n").unwrap();
        assert!(matches!(
            store.resolve(&RefName::branch("a").unwrap()),
            Err(RefError::SymrefLoop(_))
        ));
    }

    #[test]
    fn peeled_ref_surfaces_from_packed() {
        let (dir, store) = store();
        fs::write(
            dir.path().join("packed-refs"),
            format!("# pack-refs with: peeled fully-peeled sorted\n{H1} refs/tags/v1\n^{H2}\n"),
        )
        .unwrap();
        store.invalidate_cache();
        assert_eq!(
            store
                .get_peeled_ref(&RefName::tag("v1").unwrap())
                .unwrap(),
            Some(oid(H2))
        );
    }
}
