//! Pkt-line framing: 4 hex length digits, then payload.
//!
//! The length includes its own four bytes; `0000` is a flush (section
//! terminator). The v2-only delimiter packets never appear on this wire
//! and are rejected.

use std::io::{Read, Write};

use crate::ProtocolError;

/// Largest payload a single packet may carry.
pub const MAX_PKT_DATA_LEN: usize = 65516;

/// One parsed packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PktLine {
    Data(Vec<u8>),
    Flush,
}

/// Reads pkt-lines off any byte stream.
pub struct PktLineReader<R> {
    reader: R,
}

impl<R: Read> PktLineReader<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    pub fn into_inner(self) -> R {
        self.reader
    }

    /// The raw stream, for hand-off once framing ends (raw pack bytes).
    pub fn inner_mut(&mut self) -> &mut R {
        &mut self.reader
    }

    /// Read one packet.
    pub fn read_pkt(&mut self) -> Result<PktLine, ProtocolError> {
        let mut len_buf = [0u8; 4];
        self.reader.read_exact(&mut len_buf).map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                ProtocolError::Protocol("unexpected EOF reading pkt-line length".into())
            } else {
                ProtocolError::Io(e)
            }
        })?;

        let len_str = std::str::from_utf8(&len_buf).map_err(|_| {
            ProtocolError::InvalidPktLine(format!("non-hex length bytes: {len_buf:?}"))
        })?;
        let len = u16::from_str_radix(len_str, 16).map_err(|_| {
            ProtocolError::InvalidPktLine(format!("bad length: {len_str:?}"))
        })? as usize;

        match len {
            0 => Ok(PktLine::Flush),
            1..=3 => Err(ProtocolError::InvalidPktLine(format!(
                "reserved pkt-line length {len}"
            ))),
            _ => {
                let data_len = len - 4;
                if data_len > MAX_PKT_DATA_LEN {
                    return Err(ProtocolError::InvalidPktLine(format!(
                        "pkt-line too long: {data_len} bytes"
                    )));
                }
                let mut data = vec![0u8; data_len];
                self.reader.read_exact(&mut data)?;
                Ok(PktLine::Data(data))
            }
        }
    }

    /// Read data packets until the next flush.
    pub fn read_until_flush(&mut self) -> Result<Vec<Vec<u8>>, ProtocolError> {
        let mut lines = Vec::new();
        while let PktLine::Data(data) = self.read_pkt()? {
            lines.push(data);
        }
        Ok(lines)
    }
}

/// Writes pkt-lines onto any byte sink.
pub struct PktLineWriter<W> {
    writer: W,
}

impl<W: Write> PktLineWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    /// Write one data packet.
    pub fn write_data(&mut self, data: &[u8]) -> Result<(), ProtocolError> {
        if data.len() > MAX_PKT_DATA_LEN {
            return Err(ProtocolError::InvalidPktLine(format!(
                "payload too long for one pkt-line: {} bytes",
                data.len()
            )));
        }
        write!(self.writer, "{:04x}", data.len() + 4)?;
        self.writer.write_all(data)?;
        Ok(())
    }

    /// Write a text line, ensuring the conventional trailing newline.
    pub fn write_text(&mut self, text: &str) -> Result<(), ProtocolError> {
        if text.ends_with('\n') {
            self.write_data(text.as_bytes())
        } else {
            let mut data = Vec::with_capacity(text.len() + 1);
            data.extend_from_slice(text.as_bytes());
            data.push(b'\n');
            self.write_data(&data)
        }
    }

    /// Write a flush packet.
    pub fn write_flush(&mut self) -> Result<(), ProtocolError> {
        self.writer.write_all(b"0000")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn data_roundtrip() {
        let mut buf = Vec::new();
        PktLineWriter::new(&mut buf).write_data(b"hello").unwrap();
        assert_eq!(&buf, b"0009hello");

        let pkt = PktLineReader::new(Cursor::new(buf)).read_pkt().unwrap();
        assert_eq!(pkt, PktLine::Data(b"hello".to_vec()));
    }

    #[test]
    fn text_appends_newline() {
        let mut buf = Vec::new();
        PktLineWriter::new(&mut buf).write_text("hello").unwrap();
        assert_eq!(&buf, b"000ahello\n");
    }

    #[test]
    fn flush_roundtrip() {
        let mut buf = Vec::new();
        PktLineWriter::new(&mut buf).write_flush().unwrap();
        assert_eq!(&buf, b"0000");
        let pkt = PktLineReader::new(Cursor::new(buf)).read_pkt().unwrap();
        assert_eq!(pkt, PktLine::Flush);
    }

    #[test]
    fn empty_payload_allowed() {
        let mut reader = PktLineReader::new(Cursor::new(&b"0004"[..]));
        assert_eq!(reader.read_pkt().unwrap(), PktLine::Data(Vec::new()));
    }

    #[test]
    fn reserved_lengths_rejected() {
        for bad in [&b"0001"[..], b"0002", b"0003"] {
            let mut reader = PktLineReader::new(Cursor::new(bad));
            assert!(matches!(
                reader.read_pkt(),
                Err(ProtocolError::InvalidPktLine(_))
            ));
        }
    }

    #[test]
    fn non_hex_length_rejected() {
        let mut reader = PktLineReader::new(Cursor::new(&b"zzzzpayload"[..]));
        assert!(reader.read_pkt().is_err());
    }

    #[test]
    fn truncated_stream_rejected() {
        let mut reader = PktLineReader::new(Cursor::new(&b"0009he"[..]));
        assert!(reader.read_pkt().is_err());
    }

    #[test]
    fn sections_until_flush() {
        let mut buf = Vec::new();
        {
            let mut writer = PktLineWriter::new(&mut buf);
            writer.write_text("one").unwrap();
            writer.write_text("two").unwrap();
            writer.write_flush().unwrap();
            writer.write_text("after").unwrap();
        }
        let mut reader = PktLineReader::new(Cursor::new(buf));
        let section = reader.read_until_flush().unwrap();
        assert_eq!(section, vec![b"one\n".to_vec(), b"two\n".to_vec()]);
        assert_eq!(reader.read_pkt().unwrap(), PktLine::Data(b"after\n".to_vec()));
    }
}
