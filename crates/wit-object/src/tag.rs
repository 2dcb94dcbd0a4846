use bstr::{BStr, BString};
use wit_hash::ObjectId;
use wit_utils::Signature;

use crate::{ObjectError, ObjectType};

/// An annotated tag: a named, messaged pointer to another object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    /// Id of the tagged object.
    pub target: ObjectId,
    /// Type of the tagged object.
    pub target_type: ObjectType,
    /// Tag name.
    pub name: BString,
    /// Tagger identity (optional in some historical tags).
    pub tagger: Option<Signature>,
    /// Tag message.
    pub message: BString,
}

impl Tag {
    /// Parse a tag body (no object header).
    pub fn parse(body: &[u8]) -> Result<Self, ObjectError> {
        let mut target: Option<ObjectId> = None;
        let mut target_type: Option<ObjectType> = None;
        let mut name: Option<BString> = None;
        let mut tagger: Option<Signature> = None;

        let data = body;
        let mut pos = 0;

        loop {
            if pos >= data.len() {
                break;
            }
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
                    b"object" => {
                        let hex = std::str::from_utf8(value).map_err(|_| {
                            ObjectError::InvalidHeader("non-UTF8 target id".into())
                        })?;
                        target = Some(ObjectId::from_hex(hex)?);
                    }
                    b"type" => {
                        target_type = Some(ObjectType::from_bytes(value)?);
                    }
                    b"tag" => {
                        name = Some(BString::from(value));
                    }
                    b"tagger" => {
                        tagger = Some(
                            Signature::parse(BStr::new(value))
                                .map_err(|e| ObjectError::InvalidSignature(e.to_string()))?,
                        );
                    }
                    _ => {}
                }
            }

            pos = line_end + 1;
        }

        let target = target.ok_or(ObjectError::MissingTagField { field: "object" })?;
        let target_type = target_type.ok_or(ObjectError::MissingTagField { field: "type" })?;
        let name = name.ok_or(ObjectError::MissingTagField { field: "tag" })?;

        Ok(Self {
            target,
            target_type,
            name,
            tagger,
            message: BString::from(&data[pos.min(data.len())..]),
        })
    }

    /// Serialize the tag body (no object header).
    pub fn serialize_body(&self) -> Vec<u8> {
        let mut out = Vec::new();

        out.extend_from_slice(b"object ");
        out.extend_from_slice(self.target.to_hex().as_bytes());
        out.push(b'\n');

        out.extend_from_slice(b"type ");
        out.extend_from_slice(self.target_type.as_bytes());
        out.push(b'\n');

        out.extend_from_slice(b"tag ");
        out.extend_from_slice(&self.name);
        out.push(b'\n');

        if let Some(ref tagger) = self.tagger {
            out.extend_from_slice(b"tagger ");
            out.extend_from_slice(&tagger.to_bytes());
            out.push(b'\n');
        }

        out.push(b'\n');
        out.extend_from_slice(&self.message);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tag_bytes() -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(b"object 2aae6c35c94fcfb415dbe95f408b9ce91ee846ed\n");
        out.extend_from_slice(b"type commit\n");
        out.extend_from_slice(b"tag v1.0\n");
        out.extend_from_slice(b"tagger Rel Eng <rel@example.com> 1700000000 +0000\n");
        out.extend_from_slice(b"\nRelease 1.0\n");
        out
    }

    #[test]
    fn parse_fields() {
        let tag = Tag::parse(&sample_tag_bytes()).unwrap();
        assert_eq!(tag.name, "v1.0");
        assert_eq!(tag.target_type, ObjectType::Commit);
        assert_eq!(tag.tagger.as_ref().unwrap().name, "Rel Eng");
        assert_eq!(tag.message, "Release 1.0\n");
    }

    #[test]
    fn serialize_roundtrip() {
        let bytes = sample_tag_bytes();
        let tag = Tag::parse(&bytes).unwrap();
        assert_eq!(tag.serialize_body(), bytes);
    }

    #[test]
    fn tagger_optional() {
        let data = b"object 2aae6c35c94fcfb415dbe95f408b9ce91ee846ed\ntype commit\ntag old\n\nmsg\n";
        let tag = Tag::parse(data).unwrap();
        assert!(tag.tagger.is_none());
        assert_eq!(tag.serialize_body(), data);
    }

    #[test]
    fn missing_fields_rejected() {
        assert!(matches!(
            Tag::parse(b"type commit\ntag x\n\nm\n"),
            Err(ObjectError::MissingTagField { field: "object" })
        ));
        assert!(Tag::parse(b"object 2aae6c35c94fcfb415dbe95f408b9ce91ee846ed\ntag x\n\nm\n").is_err());
    }
}
