//! Reading packfiles (version 2).
//!
//! A pack is a header, a sequence of zlib-deflated object records (possibly
//! expressed as deltas against other objects), and a trailing checksum.
//! This crate parses packs received over the wire or found under
//! `objects/pack/`, resolves OFS_DELTA/REF_DELTA chains, and hands back
//! fully reconstructed objects. Pack *writing* is intentionally absent.

mod delta;
mod entry;
mod file;
mod parse;

pub use delta::apply_delta;
pub use entry::{parse_entry_header, read_size_varint, EntryHeader, EntryType};
pub use file::PackFile;
pub use parse::{parse_pack, PackedObject};

use wit_hash::ObjectId;

/// Magic bytes at the start of every pack.
pub const PACK_SIGNATURE: &[u8; 4] = b"PACK";
/// The only supported pack version.
pub const PACK_VERSION: u32 = 2;
/// Fixed header size: signature + version + object count.
pub const PACK_HEADER_SIZE: usize = 12;
/// Upper bound on delta chain length before giving up.
pub const MAX_DELTA_CHAIN_DEPTH: usize = 64;

/// Errors from pack parsing and delta resolution.
#[derive(Debug, thiserror::Error)]
pub enum PackError {
    #[error("invalid pack header: {0}")]
    InvalidHeader(String),

    #[error("unsupported pack version: {0}")]
    UnsupportedVersion(u32),

    #[error("invalid pack entry at offset {offset}: {reason}")]
    InvalidEntry { offset: u64, reason: String },

    #[error("invalid delta at offset {offset}: {reason}")]
    InvalidDelta { offset: u64, reason: String },

    #[error("delta base object not found: {0}")]
    MissingBase(ObjectId),

    #[error("delta chain at offset {offset} exceeds depth {max_depth}")]
    DeltaChainTooDeep { offset: u64, max_depth: usize },

    #[error("pack checksum mismatch: expected {expected}, computed {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("cannot decompress entry at offset {offset}")]
    Decompress {
        offset: u64,
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Object(#[from] wit_object::ObjectError),

    #[error(transparent)]
    Hash(#[from] wit_hash::HashError),
}
