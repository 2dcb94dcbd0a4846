use std::fmt;
use std::str::FromStr;

use crate::hex::{hex_decode, hex_to_string};
use crate::{HashAlgorithm, HashError};

/// A content address — the hash of an object's canonical serialization.
///
/// The variant carries both the algorithm and the digest bytes inline, so an
/// `ObjectId` is self-describing and `Copy`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ObjectId {
    Sha1([u8; 20]),
    Sha256([u8; 32]),
}

impl ObjectId {
    /// The all-zeros SHA-1 id.
    pub const NULL_SHA1: Self = Self::Sha1([0u8; 20]);
    /// The all-zeros SHA-256 id.
    pub const NULL_SHA256: Self = Self::Sha256([0u8; 32]);

    /// Build from raw digest bytes for a known algorithm.
    pub fn from_bytes(bytes: &[u8], algo: HashAlgorithm) -> Result<Self, HashError> {
        let expected = algo.digest_len();
        if bytes.len() != expected {
            return Err(HashError::InvalidHashLength {
                expected,
                actual: bytes.len(),
            });
        }
        match algo {
            HashAlgorithm::Sha1 => {
                let mut arr = [0u8; 20];
                arr.copy_from_slice(bytes);
                Ok(Self::Sha1(arr))
            }
            HashAlgorithm::Sha256 => {
                let mut arr = [0u8; 32];
                arr.copy_from_slice(bytes);
                Ok(Self::Sha256(arr))
            }
        }
    }

    /// Parse a full hex string; the algorithm is inferred from its length
    /// (40 chars ⇒ SHA-1, 64 ⇒ SHA-256).
    pub fn from_hex(hex: &str) -> Result<Self, HashError> {
        let algo =
            HashAlgorithm::from_hex_len(hex.len()).ok_or(HashError::InvalidHexLength {
                expected: 40,
                actual: hex.len(),
            })?;
        match algo {
            HashAlgorithm::Sha1 => {
                let mut bytes = [0u8; 20];
                hex_decode(hex, &mut bytes)?;
                Ok(Self::Sha1(bytes))
            }
            HashAlgorithm::Sha256 => {
                let mut bytes = [0u8; 32];
                hex_decode(hex, &mut bytes)?;
                Ok(Self::Sha256(bytes))
            }
        }
    }

    /// The raw digest bytes.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Sha1(b) => b,
            Self::Sha256(b) => b,
        }
    }

    /// The algorithm this id was produced by.
    pub fn algorithm(&self) -> HashAlgorithm {
        match self {
            Self::Sha1(_) => HashAlgorithm::Sha1,
            Self::Sha256(_) => HashAlgorithm::Sha256,
        }
    }

    pub fn is_null(&self) -> bool {
        self.as_bytes().iter().all(|&b| b == 0)
    }

    /// Lowercase hex form.
    pub fn to_hex(&self) -> String {
        hex_to_string(self.as_bytes())
    }

    /// Abbreviated hex form (first `len` characters).
    pub fn short_hex(&self, len: usize) -> String {
        let mut hex = self.to_hex();
        hex.truncate(len);
        hex
    }

    /// Whether the hex form starts with `prefix` (case-insensitive).
    pub fn starts_with_hex(&self, prefix: &str) -> bool {
        self.to_hex().starts_with(&prefix.to_ascii_lowercase())
    }

    /// Loose-object path component: `"xx/rest..."`.
    pub fn loose_path(&self) -> String {
        let hex = self.to_hex();
        format!("{}/{}", &hex[..2], &hex[2..])
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", &self.to_hex()[..8])
    }
}

impl FromStr for ObjectId {
    type Err = HashError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}
