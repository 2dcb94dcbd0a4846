//! The object database: loose objects with packfile fallback.
//!
//! Writes always land in the loose store (pack writing is out of scope);
//! reads consult the loose store first, then any packs found under
//! `objects/pack/`. Recently decompressed objects are kept in a small LRU.

mod loose;
mod prefix;
mod store;

pub use loose::LooseStore;
pub use store::ObjectStore;

use std::path::PathBuf;

use wit_hash::ObjectId;
use wit_object::ObjectType;

/// Errors from the object database.
#[derive(Debug, thiserror::Error)]
pub enum OdbError {
    #[error("object not found: {0}")]
    NotFound(ObjectId),

    #[error("object {id} is corrupt: {reason}")]
    Corrupt { id: ObjectId, reason: String },

    #[error("object {id} is a {actual}, expected {expected}")]
    WrongType {
        id: ObjectId,
        expected: ObjectType,
        actual: ObjectType,
    },

    #[error("short id '{0}' is ambiguous")]
    AmbiguousPrefix(String),

    #[error("short id '{0}' does not match any object")]
    PrefixNotFound(String),

    #[error("short id '{0}' is too short (minimum 4 hex characters)")]
    PrefixTooShort(String),

    #[error("I/O error on {path}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Object(#[from] wit_object::ObjectError),

    #[error(transparent)]
    Pack(#[from] wit_pack::PackError),

    #[error(transparent)]
    Hash(#[from] wit_hash::HashError),
}

impl OdbError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
