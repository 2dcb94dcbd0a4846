//! `.witignore` handling.

use std::fs;
use std::path::Path;

use bstr::{BStr, ByteSlice};
use glob::Pattern;

use crate::{IGNORE_FILE_NAME, META_DIR_NAME};

/// The parsed ignore set for a work tree.
///
/// One pattern per line; `#` comments; a trailing `/` restricts the pattern
/// to directories; a pattern containing `/` is anchored at the work root,
/// otherwise it matches any path component. The metadata dir is always
/// ignored.
#[derive(Debug, Default)]
pub struct IgnoreSet {
    patterns: Vec<IgnorePattern>,
}

#[derive(Debug)]
struct IgnorePattern {
    pattern: Pattern,
    dir_only: bool,
    anchored: bool,
}

impl IgnoreSet {
    /// Load from `<work_dir>/.witignore`; absent file means empty set.
    pub fn load(work_dir: &Path) -> Self {
        let Ok(text) = fs::read_to_string(work_dir.join(IGNORE_FILE_NAME)) else {
            return Self::default();
        };
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Self {
        let mut patterns = Vec::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (body, dir_only) = match line.strip_suffix('/') {
                Some(body) => (body, true),
                None => (line, false),
            };
            let anchored = body.contains('/');
            let body = body.strip_prefix('/').unwrap_or(body);
            if let Ok(pattern) = Pattern::new(body) {
                patterns.push(IgnorePattern {
                    pattern,
                    dir_only,
                    anchored,
                });
            }
        }
        Self { patterns }
    }

    /// Whether a work-relative `/`-separated path is ignored.
    pub fn is_ignored(&self, path: &BStr, is_dir: bool) -> bool {
        let Ok(path) = std::str::from_utf8(path.as_bytes()) else {
            return false;
        };
        if path == META_DIR_NAME || path.starts_with(&format!("{META_DIR_NAME}/")) {
            return true;
        }

        for ignore in &self.patterns {
            if ignore.dir_only && !is_dir && !self.matches_parent(ignore, path) {
                continue;
            }
            if self.matches(ignore, path) || self.matches_parent(ignore, path) {
                return true;
            }
        }
        false
    }

    fn matches(&self, ignore: &IgnorePattern, path: &str) -> bool {
        if ignore.anchored {
            ignore.pattern.matches(path)
        } else {
            path.split('/').any(|part| ignore.pattern.matches(part))
        }
    }

    /// A pattern matching any parent directory ignores everything below it.
    fn matches_parent(&self, ignore: &IgnorePattern, path: &str) -> bool {
        let mut prefix = String::new();
        for part in path.split('/') {
            if !prefix.is_empty() {
                prefix.push('/');
            }
            prefix.push_str(part);
            if prefix == path {
                break;
            }
            let hit = if ignore.anchored {
                ignore.pattern.matches(&prefix)
            } else {
                ignore.pattern.matches(part)
            };
            if hit {
                return true;
            }
        }
        false
    }
}
