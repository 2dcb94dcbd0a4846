//! Streaming digest computation over object payloads.

use digest::Digest;

use crate::{HashAlgorithm, ObjectId};

enum HasherInner {
    Sha1(sha1::Sha1),
    Sha256(sha2::Sha256),
}

/// Incremental hasher producing an [`ObjectId`].
///
/// Feed bytes with [`update`](Hasher::update) or through the
/// [`std::io::Write`] impl, then [`finalize`](Hasher::finalize).
pub struct Hasher {
    inner: HasherInner,
}

impl Hasher {
    pub fn new(algo: HashAlgorithm) -> Self {
        let inner = match algo {
            HashAlgorithm::Sha1 => HasherInner::Sha1(sha1::Sha1::new()),
            HashAlgorithm::Sha256 => HasherInner::Sha256(sha2::Sha256::new()),
        };
        Self { inner }
    }

    pub fn update(&mut self, data: &[u8]) {
        match &mut self.inner {
            HasherInner::Sha1(h) => h.update(data),
            HasherInner::Sha256(h) => h.update(data),
        }
    }

    pub fn finalize(self) -> ObjectId {
        match self.inner {
            HasherInner::Sha1(h) => {
                let mut bytes = [0u8; 20];
                bytes.copy_from_slice(&h.finalize());
                ObjectId::Sha1(bytes)
            }
            HasherInner::Sha256(h) => {
                let mut bytes = [0u8; 32];
                bytes.copy_from_slice(&h.finalize());
                ObjectId::Sha256(bytes)
            }
        }
    }

    /// Hash a byte slice in one call.
    pub fn digest(algo: HashAlgorithm, data: &[u8]) -> ObjectId {
        let mut h = Self::new(algo);
        h.update(data);
        h.finalize()
    }

    /// Hash an object: `H("<type> <len>\0<body>")`.
    pub fn hash_object(algo: HashAlgorithm, obj_type: &str, body: &[u8]) -> ObjectId {
        let mut h = Self::new(algo);
        h.update(obj_type.as_bytes());
        h.update(b" ");
        h.update(body.len().to_string().as_bytes());
        h.update(b"\0");
        h.update(body);
        h.finalize()
    }
}

impl std::io::Write for Hasher {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_blob_matches_git() {
        // `git hash-object -t blob /dev/null`
        let oid = Hasher::hash_object(HashAlgorithm::Sha1, "blob", b"");
        assert_eq!(oid.to_hex(), "e69de29bb2d1d6434b8b29ae775ad8c2e48c5391");
    }

    #[test]
    fn hello_blob_matches_git() {
        // `echo 'hello world' | git hash-object --stdin`
        let oid = Hasher::hash_object(HashAlgorithm::Sha1, "blob", b"hello world\n");
        assert_eq!(oid.to_hex(), "3b18e512dba79e4c8300dd08aeb37f8e728b8dad");
    }

    #[test]
    fn streaming_equals_one_shot() {
        let mut h = Hasher::new(HashAlgorithm::Sha256);
        h.update(b"foo");
        h.update(b"bar");
        assert_eq!(
            h.finalize(),
            Hasher::digest(HashAlgorithm::Sha256, b"foobar")
        );
    }

    #[test]
    fn determinism() {
        let a = Hasher::hash_object(HashAlgorithm::Sha1, "blob", b"same bytes");
        let b = Hasher::hash_object(HashAlgorithm::Sha1, "blob", b"same bytes");
        assert_eq!(a, b);
    }

    #[test]
    fn write_impl_feeds_hasher() {
        use std::io::Write;
        let mut h = Hasher::new(HashAlgorithm::Sha1);
        h.write_all(b"data").unwrap();
        assert_eq!(h.finalize(), Hasher::digest(HashAlgorithm::Sha1, b"data"));
    }
}
