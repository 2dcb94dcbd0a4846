/// Opaque file content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub data: Vec<u8>,
}

impl Blob {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    /// A blob body is just its raw bytes.
    pub fn parse(body: &[u8]) -> Self {
        Self {
            data: body.to_vec(),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preserves_arbitrary_bytes() {
        let data = b"hello\0world\xff";
        let blob = Blob::parse(data);
        assert_eq!(blob.data, data);
        assert_eq!(blob.len(), data.len());
    }
}
