//! The Smart HTTP v1 client protocol.
//!
//! Pkt-line framing, ref advertisement parsing, the minimal want/done
//! negotiation, sideband demultiplexing, and the clone drivers (HTTP and
//! local filesystem). Only the client half exists; serving is someone
//! else's job.

mod advert;
mod clone;
mod fetch;
mod pktline;
mod sideband;

pub use advert::{parse_advertisement, Advertisement};
pub use clone::{http_clone, local_clone, CloneOptions};
pub use fetch::{build_upload_pack_request, read_pack_response};
pub use pktline::{PktLine, PktLineReader, PktLineWriter};
pub use sideband::read_sideband_pack;

/// Errors from protocol framing and transfer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed pkt-line: {0}")]
    InvalidPktLine(String),

    #[error("protocol violation: {0}")]
    Protocol(String),

    #[error("remote error: {0}")]
    ServerError(String),

    #[error(transparent)]
    Transport(#[from] wit_transport::TransportError),

    #[error(transparent)]
    Pack(#[from] wit_pack::PackError),

    #[error(transparent)]
    Odb(#[from] wit_odb::OdbError),

    #[error(transparent)]
    Ref(#[from] wit_ref::RefError),

    #[error(transparent)]
    Repo(#[from] wit_repository::RepoError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
