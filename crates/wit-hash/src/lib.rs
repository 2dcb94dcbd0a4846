//! Content addresses for the wit object database.
//!
//! Provides the [`ObjectId`] type, the [`HashAlgorithm`] selector recorded in
//! repository config, hex encoding/decoding, and the streaming [`Hasher`]
//! that computes `H("type len\0body")` object identities.

mod algorithm;
mod error;
pub mod hasher;
pub mod hex;
mod oid;

pub use algorithm::HashAlgorithm;
pub use error::HashError;
pub use hasher::Hasher;
pub use oid::ObjectId;

/// Shortest accepted hex prefix for abbreviated object lookup.
pub const MIN_PREFIX_LEN: usize = 4;
