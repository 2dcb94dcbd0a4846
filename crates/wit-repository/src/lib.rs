//! The repository facade: every subsystem composed behind one handle.
//!
//! A `Repository` owns the object store, ref store, and config for one
//! on-disk repository rooted at a work directory with a `.wit/` metadata
//! dir. Mutating operations follow a fixed order: write objects, update
//! refs, update the index, touch the work tree, then append a journal
//! entry — a crash between steps leaves the repository recoverable.

mod branch;
mod checkout;
mod commit;
mod diff;
mod discover;
mod error;
mod ignore;
mod init;
mod journal;
mod reset;
mod revision;
mod stage;
mod status;
pub mod tree;
mod undo;
pub mod worktree;

pub use branch::BranchInfo;
pub use diff::FileDiff;
pub use error::RepoError;
// Re-exported so FileDiff consumers need not depend on wit-diff directly.
pub use wit_diff::{DiffLine, DiffLineKind, Hunk};
pub use ignore::IgnoreSet;
pub use init::InitOptions;
pub use journal::{Journal, JournalEntry, RepoState};
pub use reset::ResetMode;
pub use status::Status;
pub use undo::UndoOutcome;

use std::path::{Path, PathBuf};

use wit_config::Config;
use wit_hash::{HashAlgorithm, ObjectId};
use wit_index::Index;
use wit_odb::ObjectStore;
use wit_ref::RefStore;
use wit_utils::Signature;

/// Name of the metadata directory at the work-tree root.
pub const META_DIR_NAME: &str = ".wit";

/// Name of the ignore file at the work-tree root.
pub const IGNORE_FILE_NAME: &str = ".witignore";

/// An opened repository.
pub struct Repository {
    work_dir: PathBuf,
    meta_dir: PathBuf,
    odb: ObjectStore,
    refs: RefStore,
    config: Config,
    algo: HashAlgorithm,
}

impl Repository {
    /// Open the repository whose work tree root is `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RepoError> {
        let work_dir = path.as_ref().to_path_buf();
        let meta_dir = work_dir.join(META_DIR_NAME);
        if !meta_dir.join("HEAD").is_file() {
            return Err(RepoError::NotARepository(work_dir));
        }

        let config = Config::load(meta_dir.join("config"))?;
        let algo = config.hash_algorithm()?;
        let odb = ObjectStore::open(meta_dir.join("objects"), algo)?;
        let refs = RefStore::new(&meta_dir);

        Ok(Self {
            work_dir,
            meta_dir,
            odb,
            refs,
            config,
            algo,
        })
    }

    /// Walk upward from `start` to find a repository root.
    pub fn discover(start: impl AsRef<Path>) -> Result<Self, RepoError> {
        let root = discover::find_root(start.as_ref())?;
        Self::open(root)
    }

    /// Initialize a new repository, then open it.
    pub fn init(path: impl AsRef<Path>) -> Result<Self, RepoError> {
        Self::init_opts(path, &InitOptions::default())
    }

    /// Initialize with explicit options, then open.
    pub fn init_opts(path: impl AsRef<Path>, opts: &InitOptions) -> Result<Self, RepoError> {
        init::init_repository(path.as_ref(), opts)?;
        Self::open(path)
    }

    // ---- accessors -----------------------------------------------------

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    pub fn meta_dir(&self) -> &Path {
        &self.meta_dir
    }

    pub fn objects(&self) -> &ObjectStore {
        &self.odb
    }

    pub fn refs(&self) -> &RefStore {
        &self.refs
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algo
    }

    /// Load the index from disk.
    pub fn index(&self) -> Result<Index, RepoError> {
        Ok(Index::load(self.meta_dir.join("index"), self.algo)?)
    }

    /// The journal of mutating operations.
    pub fn journal(&self) -> Journal {
        Journal::new(&self.meta_dir)
    }

    /// Id of the commit HEAD resolves to; `None` on an unborn branch.
    pub fn head_commit(&self) -> Result<Option<ObjectId>, RepoError> {
        Ok(self.refs.resolve(&wit_ref::RefName::head())?)
    }

    /// Committer identity: configured `user` section or a fixed fallback.
    pub fn default_signature(&self) -> Signature {
        let name = self
            .config
            .get("user", "name")
            .unwrap_or("wit")
            .to_string();
        let email = self
            .config
            .get("user", "email")
            .unwrap_or("wit@localhost")
            .to_string();
        Signature::new(name, email, wit_utils::WitDate::now())
    }

    /// Whether `len` crosses the configured large-file threshold.
    pub fn is_large_file(&self, len: u64) -> bool {
        match self.config.large_file_threshold() {
            Ok(Some(threshold)) => len >= threshold,
            _ => false,
        }
    }

    /// Reverse-chronological history from a revision.
    ///
    /// An unborn branch (empty repository) has no history: asking for it
    /// by name, or via HEAD, yields an empty list rather than an error.
    pub fn log(
        &self,
        refish: &str,
        limit: usize,
    ) -> Result<Vec<(ObjectId, wit_object::Commit)>, RepoError> {
        let start = match self.rev_parse(refish) {
            Ok(id) => id,
            Err(RepoError::RevisionNotFound(name)) => {
                if self.names_unborn_head(refish)? {
                    return Ok(Vec::new());
                }
                return Err(RepoError::RevisionNotFound(name));
            }
            Err(e) => return Err(e),
        };
        let start = self.peel_to_commit(start)?;
        Ok(wit_revwalk::log(&self.odb, &start, limit)?)
    }

    /// Whether `refish` names HEAD's unborn branch.
    fn names_unborn_head(&self, refish: &str) -> Result<bool, RepoError> {
        if self.head_commit()?.is_some() {
            return Ok(false);
        }
        if refish == "HEAD" {
            return Ok(true);
        }
        match self.refs.current_branch()? {
            Some(branch) => Ok(refish == branch || refish == format!("refs/heads/{branch}")),
            None => Ok(false),
        }
    }
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("work_dir", &self.work_dir)
            .finish_non_exhaustive()
    }
}
