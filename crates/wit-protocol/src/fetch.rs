//! Building the upload-pack request and consuming its response.

use std::io::Read;

use wit_hash::ObjectId;

use crate::pktline::{PktLine, PktLineReader, PktLineWriter};
use crate::ProtocolError;

/// Capabilities requested on the first `want` line.
fn client_capabilities() -> String {
    format!("side-band-64k agent={}", wit_transport::USER_AGENT)
}

/// Serialize the minimal negotiation: every `want`, optional `deepen`,
/// flush, `done`. No `have` lines — the server sends a full pack.
pub fn build_upload_pack_request(
    wants: &[ObjectId],
    deepen: Option<u32>,
) -> Result<Vec<u8>, ProtocolError> {
    if wants.is_empty() {
        return Err(ProtocolError::Protocol("nothing to want".into()));
    }

    let mut buf = Vec::new();
    let mut writer = PktLineWriter::new(&mut buf);
    for (i, want) in wants.iter().enumerate() {
        if i == 0 {
            writer.write_text(&format!("want {} {}", want.to_hex(), client_capabilities()))?;
        } else {
            writer.write_text(&format!("want {}", want.to_hex()))?;
        }
    }
    if let Some(depth) = deepen {
        writer.write_text(&format!("deepen {depth}"))?;
    }
    writer.write_flush()?;
    writer.write_text("done")?;
    Ok(buf)
}

/// Extract the packfile bytes from an upload-pack response.
///
/// Skips `NAK`/`ACK`/`shallow` chatter, then reassembles the sideband
/// pack stream. A server that negotiated no sideband sends the pack as
/// raw bytes after the chatter; both shapes are accepted.
pub fn read_pack_response<R: Read>(
    reader: &mut PktLineReader<R>,
) -> Result<Vec<u8>, ProtocolError> {
    loop {
        match reader.read_pkt()? {
            PktLine::Flush => continue,
            PktLine::Data(data) => {
                let line = data.strip_suffix(b"\n").unwrap_or(&data);
                if line == b"NAK"
                    || line.starts_with(b"ACK ")
                    || line.starts_with(b"shallow ")
                    || line.starts_with(b"unshallow ")
                {
                    continue;
                }

                // Not chatter: either a sideband frame or raw pack bytes.
                return match data.first() {
                    Some(1) | Some(2) | Some(3) => {
                        let mut pack = Vec::new();
                        consume_sideband_frame(&data, &mut pack)?;
                        let rest = crate::sideband::read_sideband_pack(reader, |msg| {
                            eprint!("remote: {}", String::from_utf8_lossy(msg));
                        })?;
                        pack.extend_from_slice(&rest);
                        Ok(pack)
                    }
                    _ => {
                        // No sideband: this packet starts the pack and the
                        // remaining bytes follow unframed.
                        let mut pack = data.clone();
                        reader.inner_mut().read_to_end(&mut pack)?;
                        Ok(pack)
                    }
                };
            }
        }
    }
}

fn consume_sideband_frame(data: &[u8], pack: &mut Vec<u8>) -> Result<(), ProtocolError> {
    match data.split_first() {
        Some((1, payload)) => {
            pack.extend_from_slice(payload);
            Ok(())
        }
        Some((2, payload)) => {
            eprint!("remote: {}", String::from_utf8_lossy(payload));
            Ok(())
        }
        Some((3, payload)) => Err(ProtocolError::ServerError(
            String::from_utf8_lossy(payload).trim().to_string(),
        )),
        _ => Err(ProtocolError::Protocol("empty sideband frame".into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pktline::PktLineWriter;
    use std::io::Cursor;

    const H1: &str = "1111111111111111111111111111111111111111";
    const H2: &str = "2222222222222222222222222222222222222222";

    #[test]
    fn request_shape() {
        let wants = vec![
            ObjectId::from_hex(H1).unwrap(),
            ObjectId::from_hex(H2).unwrap(),
        ];
        let request = build_upload_pack_request(&wants, None).unwrap();
        let text = String::from_utf8_lossy(&request).to_string();

        // First want carries capabilities; later ones are bare.
        assert!(text.contains(&format!("want {H1} side-band-64k agent=wit/")));
        assert!(text.contains(&format!("want {H2}\n")));
        assert!(text.contains("0000"));
        assert!(text.ends_with("0009done\n"));
    }

    #[test]
    fn request_with_deepen() {
        let wants = vec![ObjectId::from_hex(H1).unwrap()];
        let request = build_upload_pack_request(&wants, Some(1)).unwrap();
        assert!(String::from_utf8_lossy(&request).contains("deepen 1"));
    }

    #[test]
    fn empty_wants_rejected() {
        assert!(build_upload_pack_request(&[], None).is_err());
    }

    #[test]
    fn response_with_sideband() {
        let mut buf = Vec::new();
        {
            let mut writer = PktLineWriter::new(&mut buf);
            writer.write_text("NAK").unwrap();
            let mut frame = vec![1u8];
            frame.extend_from_slice(b"PACKbytes");
            writer.write_data(&frame).unwrap();
            writer.write_flush().unwrap();
        }
        let pack = read_pack_response(&mut PktLineReader::new(Cursor::new(buf))).unwrap();
        assert_eq!(pack, b"PACKbytes");
    }

    #[test]
    fn response_without_sideband() {
        let mut buf = Vec::new();
        {
            let mut writer = PktLineWriter::new(&mut buf);
            writer.write_text("NAK").unwrap();
            writer.write_data(b"PACKraw-first-chunk").unwrap();
        }
        buf.extend_from_slice(b"rest-of-pack-unframed");
        let pack = read_pack_response(&mut PktLineReader::new(Cursor::new(buf))).unwrap();
        assert_eq!(pack, b"PACKraw-first-chunkrest-of-pack-unframed");
    }

    #[test]
    fn server_error_band_surfaces() {
        let mut buf = Vec::new();
        {
            let mut writer = PktLineWriter::new(&mut buf);
            writer.write_text("NAK").unwrap();
            let mut frame = vec![3u8];
            frame.extend_from_slice(b"out of memory");
            writer.write_data(&frame).unwrap();
        }
        assert!(matches!(
            read_pack_response(&mut PktLineReader::new(Cursor::new(buf))),
            Err(ProtocolError::ServerError(_))
        ));
    }
}
