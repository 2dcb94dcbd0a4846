//! Carrying bytes to and from Smart HTTP remotes.
//!
//! The protocol layer above builds and parses pkt-line payloads; this crate
//! only moves them: URL normalization, the two HTTP requests of a fetch
//! (GET `info/refs`, POST `git-upload-pack`), and cancellation. Requests
//! ride a curl subprocess, keeping the whole core synchronous.

mod cancel;
mod http;
mod url;

pub use cancel::CancelFlag;
pub use http::{http_get, http_post};
pub use url::WitUrl;

/// `User-Agent` sent on every request.
pub const USER_AGENT: &str = concat!("wit/", env!("CARGO_PKG_VERSION"));

/// Errors from the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("cannot reach remote: {0}")]
    ConnectionFailed(String),

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("transfer cancelled")]
    Cancelled,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
