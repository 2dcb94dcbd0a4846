//! Parsing the v1 ref advertisement.

use std::collections::HashMap;
use std::io::Read;

use bstr::{BString, ByteSlice};
use wit_hash::ObjectId;

use crate::pktline::{PktLine, PktLineReader};
use crate::ProtocolError;

/// The server's advertised refs and capabilities.
#[derive(Debug, Default)]
pub struct Advertisement {
    /// `(id, refname)` in advertisement order; `^{}` peel lines excluded.
    pub refs: Vec<(ObjectId, BString)>,
    /// Peeled values of annotated tags (`<name>^{}` lines).
    pub peeled: HashMap<BString, ObjectId>,
    /// Capability tokens from the first ref line.
    pub capabilities: Vec<String>,
    /// Branch HEAD points at, from the `symref=HEAD:…` capability.
    pub head_symref: Option<String>,
}

impl Advertisement {
    /// Target of an advertised ref.
    pub fn resolve(&self, name: &str) -> Option<ObjectId> {
        self.refs
            .iter()
            .find(|(_, n)| n == name)
            .map(|(id, _)| *id)
    }

    /// Advertised branches as `(short_name, id)`.
    pub fn branches(&self) -> Vec<(String, ObjectId)> {
        self.refs
            .iter()
            .filter_map(|(id, name)| {
                name.to_str()
                    .ok()
                    .and_then(|n| n.strip_prefix("refs/heads/"))
                    .map(|n| (n.to_string(), *id))
            })
            .collect()
    }

    /// Advertised tags as `(short_name, id)`, peeled where possible.
    pub fn tags(&self) -> Vec<(String, ObjectId)> {
        self.refs
            .iter()
            .filter_map(|(id, name)| {
                name.to_str()
                    .ok()
                    .and_then(|n| n.strip_prefix("refs/tags/"))
                    .map(|short| {
                        let id = self.peeled.get(name).copied().unwrap_or(*id);
                        (short.to_string(), id)
                    })
            })
            .collect()
    }
}

/// Parse a `GET info/refs?service=git-upload-pack` response.
///
/// The body opens with a `# service=git-upload-pack` comment packet and a
/// flush, then one packet per ref; the first carries the capability list
/// after a NUL. `<name>^{}` lines attach peeled ids to their tag.
pub fn parse_advertisement<R: Read>(
    reader: &mut PktLineReader<R>,
) -> Result<Advertisement, ProtocolError> {
    let mut advert = Advertisement::default();
    let mut saw_service = false;
    let mut saw_ref = false;

    loop {
        match reader.read_pkt() {
            Ok(PktLine::Flush) => {
                // One flush ends the service header; the next ends the refs.
                if saw_service && !saw_ref {
                    saw_service = false;
                    continue;
                }
                break;
            }
            Ok(PktLine::Data(data)) => {
                let line = data.strip_suffix(b"\n").unwrap_or(&data);
                if line.is_empty() {
                    continue;
                }
                if line.starts_with(b"#") {
                    if line != b"# service=git-upload-pack" {
                        return Err(ProtocolError::Protocol(format!(
                            "unexpected service announcement: {}",
                            line.as_bstr()
                        )));
                    }
                    saw_service = true;
                    continue;
                }

                let line = if !saw_ref {
                    // First ref line: capabilities after NUL.
                    match line.find_byte(0) {
                        Some(nul) => {
                            parse_capabilities(&line[nul + 1..], &mut advert);
                            &line[..nul]
                        }
                        None => line,
                    }
                } else {
                    line
                };
                parse_ref_line(line, &mut advert)?;
                saw_ref = true;
            }
            Err(ProtocolError::Protocol(_)) if saw_ref || saw_service => break, // EOF after data
            Err(e) => return Err(e),
        }
    }

    Ok(advert)
}

fn parse_capabilities(caps: &[u8], advert: &mut Advertisement) {
    for token in caps.split(|&b| b == b' ') {
        let Ok(token) = std::str::from_utf8(token) else {
            continue;
        };
        if token.is_empty() {
            continue;
        }
        if let Some(symref) = token.strip_prefix("symref=HEAD:refs/heads/") {
            advert.head_symref = Some(symref.to_string());
        }
        advert.capabilities.push(token.to_string());
    }
}

fn parse_ref_line(line: &[u8], advert: &mut Advertisement) -> Result<(), ProtocolError> {
    let space = line.find_byte(b' ').ok_or_else(|| {
        ProtocolError::Protocol(format!("ref line without space: {}", line.as_bstr()))
    })?;

    let hex = std::str::from_utf8(&line[..space])
        .map_err(|_| ProtocolError::Protocol("non-UTF-8 object id".into()))?;
    let id = ObjectId::from_hex(hex)
        .map_err(|e| ProtocolError::Protocol(format!("bad id in advertisement: {e}")))?;

    let name = &line[space + 1..];
    if let Some(base) = name.strip_suffix(b"^{}") {
        advert.peeled.insert(BString::from(base), id);
    } else {
        advert.refs.push((id, BString::from(name)));
    }
    Ok(())
}
