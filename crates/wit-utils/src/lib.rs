//! Shared plumbing for the wit version control core.
//!
//! Provides the lock-file protocol used by every on-disk mutation and the
//! `Signature`/`WitDate` identity types embedded in commit and tag objects.

mod error;
pub mod date;
pub mod lockfile;

pub use date::{Signature, WitDate};
pub use error::{LockError, UtilError};
pub use lockfile::LockFile;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, UtilError>;
