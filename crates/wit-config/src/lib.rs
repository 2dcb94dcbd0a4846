//! Repository configuration: an INI-style `config` file in the metadata dir.
//!
//! Only repo scope exists; there is no user/system cascade. The core
//! recognizes four keys under `[core]` — `hash-algorithm`, `default-branch`,
//! `large-file-threshold`, `auto-stash-on-switch` — and preserves anything
//! else it finds on rewrite.

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use wit_hash::HashAlgorithm;

/// Errors from configuration parsing.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot parse config line {line}: {reason}")]
    Parse { line: usize, reason: String },

    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },

    #[error("I/O error on {path}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Recognized keys (section `core`).
pub const KEY_HASH_ALGORITHM: &str = "hash-algorithm";
pub const KEY_DEFAULT_BRANCH: &str = "default-branch";
pub const KEY_LARGE_FILE_THRESHOLD: &str = "large-file-threshold";
pub const KEY_AUTO_STASH_ON_SWITCH: &str = "auto-stash-on-switch";

/// Fallback branch name used at init.
pub const DEFAULT_BRANCH: &str = "main";

/// A parsed config file.
///
/// Sections keep their original order and unknown keys, so a
/// read-modify-write cycle does not destroy anything.
#[derive(Debug, Clone, Default)]
pub struct Config {
    sections: Vec<Section>,
}

#[derive(Debug, Clone)]
struct Section {
    name: String,
    entries: Vec<(String, String)>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse file contents.
    ///
    /// `[section]` headers, `key = value` lines, `#`/`;` comments.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let mut sections: Vec<Section> = Vec::new();

        for (lineno, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }

            if let Some(name) = line.strip_prefix('[') {
                let name = name.strip_suffix(']').ok_or_else(|| ConfigError::Parse {
                    line: lineno + 1,
                    reason: "unterminated section header".into(),
                })?;
                sections.push(Section {
                    name: name.trim().to_ascii_lowercase(),
                    entries: Vec::new(),
                });
                continue;
            }

            let (key, value) = line.split_once('=').ok_or_else(|| ConfigError::Parse {
                line: lineno + 1,
                reason: "expected 'key = value'".into(),
            })?;
            let section = sections.last_mut().ok_or_else(|| ConfigError::Parse {
                line: lineno + 1,
                reason: "key outside of a section".into(),
            })?;
            section
                .entries
                .push((key.trim().to_ascii_lowercase(), value.trim().to_string()));
        }

        Ok(Self { sections })
    }

    /// Load from disk; an absent file is an empty config.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(text) => Self::parse(&text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::new()),
            Err(e) => Err(ConfigError::Io {
                path: path.to_path_buf(),
                source: e,
            }),
        }
    }

    /// Serialize in the conventional tab-indented form.
    pub fn serialize(&self) -> String {
        let mut out = String::new();
        for section in &self.sections {
            out.push('[');
            out.push_str(&section.name);
            out.push_str("]\n");
            for (key, value) in &section.entries {
                out.push('\t');
                out.push_str(key);
                out.push_str(" = ");
                out.push_str(value);
                out.push('\n');
            }
        }
        out
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        fs::write(path, self.serialize()).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })
    }

    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        let section = section.to_ascii_lowercase();
        let key = key.to_ascii_lowercase();
        self.sections
            .iter()
            .filter(|s| s.name == section)
            .flat_map(|s| s.entries.iter())
            .rev()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn set(&mut self, section: &str, key: &str, value: impl Into<String>) {
        let section_name = section.to_ascii_lowercase();
        let key = key.to_ascii_lowercase();
        let value = value.into();

        let section = match self.sections.iter_mut().find(|s| s.name == section_name) {
            Some(s) => s,
            None => {
                self.sections.push(Section {
                    name: section_name,
                    entries: Vec::new(),
                });
                self.sections.last_mut().expect("just pushed")
            }
        };
        if let Some(entry) = section.entries.iter_mut().find(|(k, _)| *k == key) {
            entry.1 = value;
        } else {
            section.entries.push((key, value));
        }
    }

    // ---- typed accessors ----------------------------------------------

    /// `core.hash-algorithm`, defaulting to SHA-1.
    pub fn hash_algorithm(&self) -> Result<HashAlgorithm, ConfigError> {
        match self.get("core", KEY_HASH_ALGORITHM) {
            None => Ok(HashAlgorithm::Sha1),
            Some(value) => {
                HashAlgorithm::from_str(value).map_err(|_| ConfigError::InvalidValue {
                    key: format!("core.{KEY_HASH_ALGORITHM}"),
                    value: value.to_string(),
                })
            }
        }
    }

    /// `core.default-branch`, defaulting to `main`.
    pub fn default_branch(&self) -> String {
        self.get("core", KEY_DEFAULT_BRANCH)
            .unwrap_or(DEFAULT_BRANCH)
            .to_string()
    }

    /// `core.large-file-threshold` in bytes; `None` means no threshold.
    pub fn large_file_threshold(&self) -> Result<Option<u64>, ConfigError> {
        match self.get("core", KEY_LARGE_FILE_THRESHOLD) {
            None => Ok(None),
            Some(value) => value.parse().map(Some).map_err(|_| {
                ConfigError::InvalidValue {
                    key: format!("core.{KEY_LARGE_FILE_THRESHOLD}"),
                    value: value.to_string(),
                }
            }),
        }
    }

    /// `core.auto-stash-on-switch`; informational, defaults to false.
    pub fn auto_stash_on_switch(&self) -> bool {
        matches!(
            self.get("core", KEY_AUTO_STASH_ON_SWITCH),
            Some("true") | Some("yes") | Some("1") | Some("on")
        )
    }
}
