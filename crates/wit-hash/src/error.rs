/// Errors from hash parsing and construction.
#[derive(Debug, thiserror::Error)]
pub enum HashError {
    #[error("invalid hex length {actual} (expected {expected})")]
    InvalidHexLength { expected: usize, actual: usize },

    #[error("invalid hex byte {byte:#04x} at position {position}")]
    InvalidHex { byte: u8, position: usize },

    #[error("invalid hash length {actual} (expected {expected})")]
    InvalidHashLength { expected: usize, actual: usize },

    #[error("unknown hash algorithm: {0}")]
    UnknownAlgorithm(String),
}
