//! Sideband demultiplexing: band 1 pack data, band 2 progress, band 3 fatal.

use std::io::Read;

use crate::pktline::{PktLine, PktLineReader};
use crate::ProtocolError;

/// Reassemble the band-1 pack stream, dispatching progress text.
///
/// Progress messages (band 2) go to `progress`; a band-3 message aborts
/// with the server's text. Ends at the flush packet.
pub fn read_sideband_pack<R: Read>(
    reader: &mut PktLineReader<R>,
    mut progress: impl FnMut(&[u8]),
) -> Result<Vec<u8>, ProtocolError> {
    let mut pack = Vec::new();

    loop {
        match reader.read_pkt() {
            Ok(PktLine::Flush) => break,
            Ok(PktLine::Data(data)) => {
                let Some((&band, payload)) = data.split_first() else {
                    continue;
                };
                match band {
                    1 => pack.extend_from_slice(payload),
                    2 => progress(payload),
                    3 => {
                        return Err(ProtocolError::ServerError(
                            String::from_utf8_lossy(payload).trim().to_string(),
                        ))
                    }
                    other => {
                        return Err(ProtocolError::Protocol(format!(
                            "unknown sideband channel {other}"
                        )))
                    }
                }
            }
            // Servers may close the connection instead of flushing.
            Err(ProtocolError::Protocol(_)) if !pack.is_empty() => break,
            Err(e) => return Err(e),
        }
    }

    Ok(pack)
}
