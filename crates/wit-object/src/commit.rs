use bstr::{BStr, BString, ByteSlice};
use wit_hash::ObjectId;
use wit_utils::Signature;

use crate::ObjectError;

/// A commit: a tree, its parents, and who made it when.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    /// Id of the root tree.
    pub tree: ObjectId,
    /// Parent commits (empty for a root commit).
    pub parents: Vec<ObjectId>,
    pub author: Signature,
    pub committer: Signature,
    /// Message bytes (everything after the blank separator line).
    pub message: BString,
}

impl Commit {
    /// Parse a commit body (no object header).
    ///
    /// Unknown headers (and their space-indented continuation lines) are
    /// skipped so commits written by other tools still load.
    pub fn parse(body: &[u8]) -> Result<Self, ObjectError> {
        let mut tree: Option<ObjectId> = None;
        let mut parents = Vec::new();
        let mut author: Option<Signature> = None;
        let mut committer: Option<Signature> = None;

        let data = body;
        let mut pos = 0;

        loop {
            if pos >= data.len() {
                break;
            }
            // Blank line separates headers from the message.
            if data[pos] == b'\n' {
                pos += 1;
                break;
            }

            let line_end = data[pos..]
                .iter()
                .position(|&b| b == b'\n')
                .map(|p| p + pos)
                .unwrap_or(data.len());
            let line = &data[pos..line_end];

            if let Some(space_pos) = line.iter().position(|&b| b == b' ') {
                let key = &line[..space_pos];
                let value = &line[space_pos + 1..];

                match key {
                    b"tree" => {
                        tree = Some(parse_id(value, "tree")?);
                    }
                    b"parent" => {
                        parents.push(parse_id(value, "parent")?);
                    }
                    b"author" => {
                        author = Some(parse_signature(value)?);
                    }
                    b"committer" => {
                        committer = Some(parse_signature(value)?);
                    }
                    _ => {
                        // Unknown header; swallow continuation lines too.
                        let mut next = line_end + 1;
                        while next < data.len() && data[next] == b' ' {
                            next += data[next..]
                                .iter()
                                .position(|&b| b == b'\n')
                                .map(|p| p + 1)
                                .unwrap_or(data.len() - next);
                        }
                        pos = next;
                        continue;
                    }
                }
            }

            pos = line_end + 1;
        }

        let tree = tree.ok_or(ObjectError::MissingCommitField { field: "tree" })?;
        let author = author.ok_or(ObjectError::MissingCommitField { field: "author" })?;
        let committer =
            committer.ok_or(ObjectError::MissingCommitField { field: "committer" })?;

        Ok(Self {
            tree,
            parents,
            author,
            committer,
            message: BString::from(&data[pos.min(data.len())..]),
        })
    }

    /// Serialize the commit body (no object header).
    pub fn serialize_body(&self) -> Vec<u8> {
        let mut out = Vec::new();

        out.extend_from_slice(b"tree ");
        out.extend_from_slice(self.tree.to_hex().as_bytes());
        out.push(b'\n');

        for parent in &self.parents {
            out.extend_from_slice(b"parent ");
            out.extend_from_slice(parent.to_hex().as_bytes());
            out.push(b'\n');
        }

        out.extend_from_slice(b"author ");
        out.extend_from_slice(&self.author.to_bytes());
        out.push(b'\n');

        out.extend_from_slice(b"committer ");
        out.extend_from_slice(&self.committer.to_bytes());
        out.push(b'\n');

        out.push(b'\n');
        out.extend_from_slice(&self.message);
        out
    }

    pub fn first_parent(&self) -> Option<&ObjectId> {
        self.parents.first()
    }

    pub fn is_merge(&self) -> bool {
        self.parents.len() > 1
    }

    pub fn is_root(&self) -> bool {
        self.parents.is_empty()
    }

    /// Committer timestamp, the ordering key for history traversal.
    pub fn timestamp(&self) -> i64 {
        self.committer.date.timestamp
    }

    /// First line of the message.
    pub fn summary(&self) -> &BStr {
        let msg: &[u8] = self.message.as_ref();
        match msg.find_byte(b'\n') {
            Some(pos) => BStr::new(&msg[..pos]),
            None => BStr::new(msg),
        }
    }
}

fn parse_id(value: &[u8], field: &'static str) -> Result<ObjectId, ObjectError> {
    let hex = std::str::from_utf8(value)
        .map_err(|_| ObjectError::InvalidHeader(format!("non-UTF8 {field} id")))?;
    Ok(ObjectId::from_hex(hex)?)
}

fn parse_signature(data: &[u8]) -> Result<Signature, ObjectError> {
    Signature::parse(BStr::new(data))
        .map_err(|e| ObjectError::InvalidSignature(e.to_string()))
}
