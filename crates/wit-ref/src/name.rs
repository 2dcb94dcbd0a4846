use std::fmt;

use crate::RefError;

/// A validated full ref name (`HEAD` or `refs/<category>/<name>`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RefName(String);

pub const HEADS_PREFIX: &str = "refs/heads/";
pub const TAGS_PREFIX: &str = "refs/tags/";
pub const REMOTES_PREFIX: &str = "refs/remotes/";

impl RefName {
    /// Validate and wrap a full ref name.
    pub fn new(name: impl Into<String>) -> Result<Self, RefError> {
        let name = name.into();
        if !is_valid(&name) {
            return Err(RefError::InvalidName(name));
        }
        Ok(Self(name))
    }

    /// `refs/heads/<name>`.
    pub fn branch(short: &str) -> Result<Self, RefError> {
        Self::new(format!("{HEADS_PREFIX}{short}"))
    }

    /// `refs/tags/<name>`.
    pub fn tag(short: &str) -> Result<Self, RefError> {
        Self::new(format!("{TAGS_PREFIX}{short}"))
    }

    /// `refs/remotes/<remote>/<name>`.
    pub fn remote(remote: &str, short: &str) -> Result<Self, RefError> {
        Self::new(format!("{REMOTES_PREFIX}{remote}/{short}"))
    }

    pub fn head() -> Self {
        Self("HEAD".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_head(&self) -> bool {
        self.0 == "HEAD"
    }

    pub fn is_branch(&self) -> bool {
        self.0.starts_with(HEADS_PREFIX)
    }

    pub fn is_tag(&self) -> bool {
        self.0.starts_with(TAGS_PREFIX)
    }

    pub fn is_remote(&self) -> bool {
        self.0.starts_with(REMOTES_PREFIX)
    }

    /// The human-facing short form: strips the category prefix.
    pub fn shorten(&self) -> &str {
        for prefix in [HEADS_PREFIX, TAGS_PREFIX, REMOTES_PREFIX] {
            if let Some(rest) = self.0.strip_prefix(prefix) {
                return rest;
            }
        }
        &self.0
    }
}

/// Name rules, a practical subset of git-check-ref-format:
/// no empty components, no `..`, no control chars or ` ~^:?*[\`,
/// no leading/trailing `/` or `.`, no trailing `.lock`.
fn is_valid(name: &str) -> bool {
    if name == "HEAD" {
        return true;
    }
    if name.is_empty() || !name.starts_with("refs/") {
        return false;
    }
    if name.ends_with('/') || name.ends_with('.') || name.ends_with(".lock") {
        return false;
    }
    if name.contains("..") || name.contains("//") || name.contains("@{") {
        return false;
    }
    for component in name.split('/') {
        if component.is_empty() || component.starts_with('.') {
            return false;
        }
    }
    name.bytes().all(|b| {
        !b.is_ascii_control() && !matches!(b, b' ' | b'~' | b'^' | b':' | b'?' | b'*' | b'[' | b'\\')
    })
}

impl fmt::Display for RefName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RefName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors() {
        assert_eq!(RefName::branch("main").unwrap().as_str(), "refs/heads/main");
        assert_eq!(RefName::tag("v1.0").unwrap().as_str(), "refs/tags/v1.0");
        assert_eq!(
            RefName::remote("origin", "main").unwrap().as_str(),
            "refs/remotes/origin/main"
        );
        assert!(RefName::head().is_head());
    }

    #[test]
    fn shorten_strips_category() {
        assert_eq!(RefName::branch("feature/x").unwrap().shorten(), "feature/x");
        assert_eq!(RefName::tag("v1").unwrap().shorten(), "v1");
        assert_eq!(RefName::head().shorten(), "HEAD");
    }

    #[test]
    fn category_predicates() {
        assert!(RefName::branch("b").unwrap().is_branch());
        assert!(RefName::tag("t").unwrap().is_tag());
        assert!(RefName::remote("o", "b").unwrap().is_remote());
        assert!(!RefName::tag("t").unwrap().is_branch());
    }

    #[test]
    fn invalid_names_rejected() {
        for bad in [
            "",
            "main",                  // not under refs/
            "refs/heads/",           // empty leaf
            "refs/heads/a..b",       // double dot
            "refs/heads/a b",        // space
            "refs/heads/a:b",        // colon
            "refs/heads/.hidden",    // leading dot component
            "refs/heads/x.lock",     // lock suffix
            "refs//heads/x",         // empty component
            "refs/heads/a^b",        // caret
        ] {
            assert!(RefName::new(bad).is_err(), "{bad:?} should be invalid");
        }
    }

    #[test]
    fn nested_branch_names_allowed() {
        assert!(RefName::branch("feature/deep/nesting").is_ok());
    }
}
