//! Abbreviated object id lookup.

use wit_hash::{ObjectId, MIN_PREFIX_LEN};

use crate::{ObjectStore, OdbError};

impl ObjectStore {
    /// Resolve a hex prefix to the unique matching object id.
    ///
    /// Prefixes shorter than 4 characters are rejected; multiple matches
    /// fail with `AmbiguousPrefix`.
    pub fn resolve_prefix(&self, prefix: &str) -> Result<ObjectId, OdbError> {
        if prefix.len() < MIN_PREFIX_LEN {
            return Err(OdbError::PrefixTooShort(prefix.to_string()));
        }
        if prefix.len() > self.algorithm().hex_len()
            || !prefix.bytes().all(|b| b.is_ascii_hexdigit())
        {
            return Err(OdbError::PrefixNotFound(prefix.to_string()));
        }

        // A full-length prefix is just a hash.
        if prefix.len() == self.algorithm().hex_len() {
            let id = ObjectId::from_hex(prefix)?;
            return if self.has(&id) {
                Ok(id)
            } else {
                Err(OdbError::PrefixNotFound(prefix.to_string()))
            };
        }

        let fan = prefix[..2].to_ascii_lowercase();
        let mut matched: Option<ObjectId> = None;

        let mut consider = |id: ObjectId| -> Result<(), OdbError> {
            if !id.starts_with_hex(prefix) {
                return Ok(());
            }
            match matched {
                None => {
                    matched = Some(id);
                    Ok(())
                }
                Some(existing) if existing == id => Ok(()),
                Some(_) => Err(OdbError::AmbiguousPrefix(prefix.to_string())),
            }
        };

        for id in self.loose().enumerate_fanout(&fan)? {
            consider(id)?;
        }
        for id in self.pack_ids() {
            consider(id)?;
        }

        matched.ok_or_else(|| OdbError::PrefixNotFound(prefix.to_string()))
    }
}
