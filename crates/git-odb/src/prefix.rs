//! OID prefix resolution (short hex -> full OID with ambiguity detection).
//!
//! Enumerates the loose-object store and matches any OID whose hex form
//! starts with the given prefix.

use git_hash::ObjectId;

use crate::{ObjectDatabase, OdbError};

/// Resolve a hex prefix to a full OID.
///
/// Returns an error if the prefix is ambiguous (matches multiple distinct
/// objects) or if no object matches. There is no minimum prefix length: a
/// one-character prefix is resolved the same way as a full OID, by
/// enumerating and counting matches.
pub fn resolve_prefix(odb: &ObjectDatabase, prefix: &str) -> Result<ObjectId, OdbError> {
    if prefix.is_empty() || !prefix.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(OdbError::NotFound(ObjectId::NULL));
    }

    // If it's a full hex OID, just check existence.
    let algo = odb.hash_algo();
    if prefix.len() == algo.hex_len() {
        if let Ok(oid) = ObjectId::from_hex(prefix) {
            if odb.contains(&oid) {
                return Ok(oid);
            }
            return Err(OdbError::NotFound(oid));
        }
    }

    let mut matches: Vec<ObjectId> = Vec::new();
    for result in odb.loose.iter()? {
        let oid = result?;
        if oid.starts_with_hex(prefix) {
            matches.push(oid);
        }
    }

    match matches.len() {
        0 => Err(OdbError::NotFound(ObjectId::NULL)),
        1 => Ok(matches[0]),
        n => Err(OdbError::Ambiguous {
            prefix: prefix.to_string(),
            count: n,
        }),
    }
}
