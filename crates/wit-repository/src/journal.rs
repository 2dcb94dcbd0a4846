//! The append-only journal of mutating operations.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{RepoError, Repository};

/// A snapshot of the repository's pointers around one operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoState {
    /// Commit HEAD resolved to (hex), if any.
    pub head: Option<String>,
    /// Current branch short name; `None` when detached.
    pub branch: Option<String>,
    /// Hash of the serialized index.
    pub index_hash: String,
}

/// One journal record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub operation: String,
    pub args: Vec<String>,
    pub description: String,
    pub before_state: RepoState,
    pub after_state: RepoState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<serde_json::Value>,
    pub timestamp: i64,
}

/// JSON-lines journal under `journal/log`.
pub struct Journal {
    log_path: PathBuf,
}

impl Journal {
    pub(crate) fn new(meta_dir: &Path) -> Self {
        Self {
            log_path: meta_dir.join("journal").join("log"),
        }
    }

    /// Append one entry.
    pub fn record(&self, entry: &JournalEntry) -> Result<(), RepoError> {
        if let Some(parent) = self.log_path.parent() {
            fs::create_dir_all(parent).map_err(|e| RepoError::io(parent.to_path_buf(), e))?;
        }
        let mut line = serde_json::to_string(entry)?;
        line.push('\n');
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .map_err(|e| RepoError::io(&self.log_path, e))?;
        file.write_all(line.as_bytes())
            .map_err(|e| RepoError::io(&self.log_path, e))?;
        Ok(())
    }

    /// All entries, oldest first. Unparseable lines are skipped.
    pub fn entries(&self) -> Result<Vec<JournalEntry>, RepoError> {
        let text = match fs::read_to_string(&self.log_path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(RepoError::io(&self.log_path, e)),
        };
        Ok(text
            .lines()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect())
    }

    /// Rewrite the log without its last `count` entries (after an undo).
    pub(crate) fn drop_last(&self, count: usize) -> Result<(), RepoError> {
        let entries = self.entries()?;
        let keep = entries.len().saturating_sub(count);
        let mut out = String::new();
        for entry in &entries[..keep] {
            out.push_str(&serde_json::to_string(entry)?);
            out.push('\n');
        }
        fs::write(&self.log_path, out).map_err(|e| RepoError::io(&self.log_path, e))
    }
}

impl Repository {
    /// Capture the current head/branch/index pointers.
    pub fn capture_state(&self) -> Result<RepoState, RepoError> {
        Ok(RepoState {
            head: self.head_commit()?.map(|id| id.to_hex()),
            branch: self.refs().current_branch()?,
            index_hash: self.index()?.content_hash().to_hex(),
        })
    }

    /// Record an operation that just completed. `before_state` must have
    /// been captured before the operation mutated anything.
    pub fn record_operation(
        &self,
        operation: &str,
        args: Vec<String>,
        description: String,
        before_state: RepoState,
        context: Option<serde_json::Value>,
    ) -> Result<(), RepoError> {
        let entry = JournalEntry {
            operation: operation.to_string(),
            args,
            description,
            before_state,
            after_state: self.capture_state()?,
            context,
            timestamp: wit_utils::WitDate::now().timestamp,
        };
        self.journal().record(&entry)
    }
}
